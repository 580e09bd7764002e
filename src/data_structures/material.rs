//! Surface materials.
//!
//! A material keeps a non-owning set of the entities that currently use it so
//! an edit can be fanned out to the instance rows those entities occupy.

use std::collections::BTreeSet;

use crate::data_structures::{instance::AttributeMask, registry::EntityId};

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub ambient: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub shininess: f32,
    pub roughness: f32,
    pub metallic: f32,
    users: BTreeSet<EntityId>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: [0.1, 0.1, 0.1],
            diffuse: [1.0, 1.0, 1.0],
            specular: [0.5, 0.5, 0.5],
            shininess: 32.0,
            roughness: 0.5,
            metallic: 0.0,
            users: BTreeSet::new(),
        }
    }
}

/// One settable material property with its value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaterialProperty {
    Ambient([f32; 3]),
    Diffuse([f32; 3]),
    Specular([f32; 3]),
    Shininess(f32),
    Roughness(f32),
    Metallic(f32),
}

impl MaterialProperty {
    /// The instance attribute the property feeds.
    pub fn mask(&self) -> AttributeMask {
        match self {
            MaterialProperty::Ambient(_) => AttributeMask::AMBIENT,
            MaterialProperty::Diffuse(_) => AttributeMask::DIFFUSE,
            MaterialProperty::Specular(_) => AttributeMask::SPECULAR,
            MaterialProperty::Shininess(_) => AttributeMask::SHININESS,
            MaterialProperty::Roughness(_) => AttributeMask::ROUGHNESS,
            MaterialProperty::Metallic(_) => AttributeMask::METALLIC,
        }
    }
}

impl Material {
    pub fn new(diffuse: [f32; 3], roughness: f32, metallic: f32) -> Self {
        Self {
            diffuse,
            roughness,
            metallic,
            ..Default::default()
        }
    }

    /// Applies `property`, returning whether the stored value changed.
    pub fn set(&mut self, property: MaterialProperty) -> bool {
        match property {
            MaterialProperty::Ambient(v) => replace(&mut self.ambient, v),
            MaterialProperty::Diffuse(v) => replace(&mut self.diffuse, v),
            MaterialProperty::Specular(v) => replace(&mut self.specular, v),
            MaterialProperty::Shininess(v) => replace(&mut self.shininess, v),
            MaterialProperty::Roughness(v) => replace(&mut self.roughness, v),
            MaterialProperty::Metallic(v) => replace(&mut self.metallic, v),
        }
    }

    pub fn users(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.users.iter().copied()
    }

    pub(crate) fn attach(&mut self, entity: EntityId) {
        self.users.insert(entity);
    }

    pub(crate) fn detach(&mut self, entity: EntityId) {
        self.users.remove(&entity);
    }

    /// Shininess, roughness and metallic packed as one attribute.
    pub fn surface(&self) -> [f32; 3] {
        [self.shininess, self.roughness, self.metallic]
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::registry::Id;

    #[test]
    fn setting_the_same_value_reports_no_change() {
        let mut m = Material::default();
        assert!(!m.set(MaterialProperty::Diffuse([1.0, 1.0, 1.0])));
        assert!(m.set(MaterialProperty::Diffuse([0.0, 0.0, 0.0])));
        assert_eq!(m.diffuse, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn users_are_tracked_without_duplicates() {
        let mut m = Material::default();
        let e = EntityId::from_index(3);
        m.attach(e);
        m.attach(e);
        assert_eq!(m.users().collect::<Vec<_>>(), [e]);
        m.detach(e);
        assert_eq!(m.users().count(), 0);
    }

    #[test]
    fn each_property_maps_to_its_own_attribute_bit() {
        assert_eq!(
            MaterialProperty::Metallic(1.0).mask(),
            AttributeMask::METALLIC
        );
        assert_eq!(
            MaterialProperty::Ambient([0.0; 3]).mask(),
            AttributeMask::AMBIENT
        );
    }
}
