//! Dense per-entity transform storage.
//!
//! Entity ids index straight into the arrays. Dirty entities are queued
//! once and recomputed in [`SceneStore::update`].

use cgmath::{Matrix4, SquareMatrix, Vector3};

use crate::{
    data_structures::{
        mesh::BoundingSphere,
        registry::{EntityId, Id},
    },
    scene::transform::Transform,
};

/// State derived from a transform during [`SceneStore::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derived {
    pub matrix: Matrix4<f32>,
    pub bounds: BoundingSphere,
    /// Update generation that last recomputed this entry.
    pub generation: u64,
}

/// Transform components of every entity plus their derived state.
///
/// Setters only record the new value and mark the entity dirty. `update`
/// walks the dirty list once, so an entity is recomputed at most once per
/// frame no matter how many setters touched it.
#[derive(Debug, Default)]
pub struct SceneStore {
    transforms: Vec<Transform>,
    local_bounds: Vec<BoundingSphere>,
    derived: Vec<Derived>,
    dirty: Vec<bool>,
    dirty_list: Vec<EntityId>,
    changed: Vec<EntityId>,
    generation: u64,
}

impl SceneStore {
    /// Adds the next entity. Entities are inserted in id order.
    pub fn insert(&mut self, entity: EntityId, local_bounds: BoundingSphere) {
        debug_assert_eq!(entity.index(), self.transforms.len());
        self.transforms.push(Transform::default());
        self.local_bounds.push(local_bounds);
        self.derived.push(Derived {
            matrix: Matrix4::identity(),
            bounds: local_bounds,
            generation: 0,
        });
        self.dirty.push(false);
        self.mark_dirty(entity);
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    fn mark_dirty(&mut self, entity: EntityId) {
        let flag = &mut self.dirty[entity.index()];
        if !*flag {
            *flag = true;
            self.dirty_list.push(entity);
        }
    }

    pub fn place(&mut self, entity: EntityId, position: Vector3<f32>) {
        self.transforms[entity.index()].position = position;
        self.mark_dirty(entity);
    }

    pub fn translate(&mut self, entity: EntityId, delta: Vector3<f32>) {
        self.transforms[entity.index()].position += delta;
        self.mark_dirty(entity);
    }

    /// Sets the Euler rotation in degrees.
    pub fn rotate(&mut self, entity: EntityId, rotation: Vector3<f32>) {
        self.transforms[entity.index()].rotation = rotation;
        self.mark_dirty(entity);
    }

    pub fn scale(&mut self, entity: EntityId, scale: Vector3<f32>) {
        self.transforms[entity.index()].scale = scale;
        self.mark_dirty(entity);
    }

    /// Replaces the mesh-space bounds, e.g. after a mesh swap.
    pub fn set_local_bounds(&mut self, entity: EntityId, bounds: BoundingSphere) {
        self.local_bounds[entity.index()] = bounds;
        self.mark_dirty(entity);
    }

    pub fn transform(&self, entity: EntityId) -> &Transform {
        &self.transforms[entity.index()]
    }

    pub fn derived(&self, entity: EntityId) -> &Derived {
        &self.derived[entity.index()]
    }

    pub fn all_derived(&self) -> &[Derived] {
        &self.derived
    }

    pub fn is_dirty(&self, entity: EntityId) -> bool {
        self.dirty[entity.index()]
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty_list.len()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Entities recomputed by the last `update`.
    pub fn changed(&self) -> &[EntityId] {
        &self.changed
    }

    /// Recomputes matrices and world bounds of dirty entities only, then
    /// clears the dirty set. Returns the recomputed entities.
    pub fn update(&mut self) -> &[EntityId] {
        self.generation += 1;
        self.changed.clear();
        for entity in self.dirty_list.drain(..) {
            let index = entity.index();
            let transform = &self.transforms[index];
            let local = self.local_bounds[index];
            self.derived[index] = Derived {
                matrix: transform.to_matrix(),
                bounds: BoundingSphere {
                    center: local.center + transform.position,
                    radius: local.radius * transform.max_scale(),
                },
                generation: self.generation,
            };
            self.dirty[index] = false;
            self.changed.push(entity);
        }
        log::trace!(
            "scene update {}: {} entities recomputed",
            self.generation,
            self.changed.len()
        );
        &self.changed
    }
}
