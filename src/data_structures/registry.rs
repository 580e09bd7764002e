//! Dense, name-indexed resource storage.
//!
//! Every resource table (meshes, textures, shaders, materials, models, ...)
//! is a [`Registry`]: values live in insertion order at a stable dense index,
//! and a name lookup resolves to that index. Entries are never removed during
//! a session, so an id minted by a registry stays valid for its lifetime.

use std::{fmt::Debug, hash::Hash, marker::PhantomData};

use indexmap::IndexMap;

use crate::error::{EngineError, ResourceKind, Result};

/// A typed dense index into a [`Registry`].
pub trait Id: Copy + Eq + Ord + Hash + Debug {
    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

macro_rules! define_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
            pub struct $name(u32);

            impl Id for $name {
                fn from_index(index: usize) -> Self {
                    Self(index as u32)
                }

                fn index(self) -> usize {
                    self.0 as usize
                }
            }
        )*
    };
}

define_id!(
    MeshId,
    TextureId,
    ShaderId,
    MaterialId,
    /// A renderable entity ("model").
    EntityId,
    LightId,
    GroupId,
    EffectId,
);

#[derive(Debug)]
pub struct Registry<I, T> {
    kind: ResourceKind,
    entries: IndexMap<String, T>,
    _id: PhantomData<I>,
}

impl<I: Id, T> Registry<I, T> {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            entries: IndexMap::new(),
            _id: PhantomData,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn insert(&mut self, name: &str, value: T) -> Result<I> {
        if self.entries.contains_key(name) {
            return Err(EngineError::duplicate(self.kind, name));
        }
        let (index, _) = self.entries.insert_full(name.to_string(), value);
        Ok(I::from_index(index))
    }

    /// Resolve a name, failing with a named not-found error.
    pub fn lookup(&self, name: &str) -> Result<I> {
        self.find(name)
            .ok_or_else(|| EngineError::not_found(self.kind, name))
    }

    pub fn find(&self, name: &str) -> Option<I> {
        self.entries.get_index_of(name).map(I::from_index)
    }

    pub fn get(&self, id: I) -> &T {
        &self.entries[id.index()]
    }

    pub fn get_mut(&mut self, id: I) -> &mut T {
        &mut self.entries[id.index()]
    }

    pub fn by_name(&self, name: &str) -> Result<&T> {
        self.lookup(name).map(|id| self.get(id))
    }

    pub fn by_name_mut(&mut self, name: &str) -> Result<&mut T> {
        let id = self.lookup(name)?;
        Ok(self.get_mut(id))
    }

    pub fn name(&self, id: I) -> &str {
        self.entries
            .get_index(id.index())
            .map(|(name, _)| name.as_str())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (I, &str, &T)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, (name, value))| (I::from_index(index), name.as_str(), value))
    }

    pub fn ids(&self) -> impl Iterator<Item = I> + use<I, T> {
        (0..self.entries.len()).map(I::from_index)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_dense_and_stable() {
        let mut reg: Registry<MeshId, u32> = Registry::new(ResourceKind::Mesh);
        let a = reg.insert("a", 1).unwrap();
        let b = reg.insert("b", 2).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(reg.lookup("b").unwrap(), b);
        assert_eq!(*reg.get(a), 1);
        assert_eq!(reg.name(b), "b");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut reg: Registry<MaterialId, ()> = Registry::new(ResourceKind::Material);
        reg.insert("m", ()).unwrap();
        let err = reg.insert("m", ()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Duplicate {
                kind: ResourceKind::Material,
                ..
            }
        ));
    }

    #[test]
    fn unknown_name_is_a_named_not_found() {
        let reg: Registry<ShaderId, ()> = Registry::new(ResourceKind::Shader);
        match reg.lookup("basic") {
            Err(EngineError::NotFound { kind, name }) => {
                assert_eq!(kind, ResourceKind::Shader);
                assert_eq!(name, "basic");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let mut reg: Registry<EntityId, char> = Registry::new(ResourceKind::Model);
        for (name, c) in [("z", 'z'), ("a", 'a'), ("m", 'm')] {
            reg.insert(name, c).unwrap();
        }
        let names: Vec<_> = reg.iter().map(|(_, name, _)| name).collect();
        assert_eq!(names, ["z", "a", "m"]);
    }
}
