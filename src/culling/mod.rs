//! Camera frustum culling.
//!
//! The culler keeps one frustum, rebuilt only when the camera pose or the
//! projection parameters change, and a per-entity visibility bitset that is
//! re-evaluated every frame after the scene store update.

pub mod frustum;

pub use frustum::{Frustum, Plane, Side};

use crate::{
    camera::{Camera, Projection},
    data_structures::registry::{EntityId, Id},
    scene::SceneStore,
};

#[derive(Debug)]
pub struct Culler {
    frustum: Frustum,
    built_for: Option<(Camera, Projection)>,
    visible: Vec<bool>,
    visible_count: usize,
}

impl Culler {
    pub fn new(camera: &Camera, projection: &Projection) -> Self {
        Self {
            frustum: Frustum::from_camera(camera, projection),
            built_for: Some((*camera, *projection)),
            visible: Vec::new(),
            visible_count: 0,
        }
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Rebuilds the planes if the camera or projection differ from the
    /// ones they were built for. Returns whether a rebuild happened.
    pub fn update_frustum(&mut self, camera: &Camera, projection: &Projection) -> bool {
        if self.built_for == Some((*camera, *projection)) {
            return false;
        }
        self.frustum = Frustum::from_camera(camera, projection);
        self.built_for = Some((*camera, *projection));
        log::trace!("frustum rebuilt");
        true
    }

    /// Tests every entity's world bounding sphere against the frustum.
    pub fn evaluate(&mut self, scene: &SceneStore) {
        self.visible.clear();
        self.visible.extend(
            scene
                .all_derived()
                .iter()
                .map(|derived| self.frustum.contains_sphere(&derived.bounds)),
        );
        self.visible_count = self.visible.iter().filter(|&&v| v).count();
    }

    pub fn visible(&self, entity: EntityId) -> bool {
        self.visible.get(entity.index()).copied().unwrap_or(false)
    }

    pub fn visible_count(&self) -> usize {
        self.visible_count
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Vector3};

    use super::*;
    use crate::data_structures::mesh::BoundingSphere;

    fn setup() -> (Camera, Projection, SceneStore) {
        let camera = Camera::new((0.0, 0.0, 10.0), Deg(-90.0), Deg(0.0));
        let projection = Projection::new(4, 3, Deg(45.0), 0.1, 100.0);
        let mut scene = SceneStore::default();
        for i in 0..2 {
            scene.insert(EntityId::from_index(i), BoundingSphere::new([0.0; 3], 1.0));
        }
        (camera, projection, scene)
    }

    #[test]
    fn visibility_tracks_moved_entities() {
        let (camera, projection, mut scene) = setup();
        let mut culler = Culler::new(&camera, &projection);
        scene.update();
        culler.evaluate(&scene);
        assert_eq!(culler.visible_count(), 2);

        scene.place(EntityId::from_index(1), Vector3::new(0.0, 0.0, 50.0));
        scene.update();
        culler.evaluate(&scene);
        assert!(culler.visible(EntityId::from_index(0)));
        assert!(!culler.visible(EntityId::from_index(1)));
        assert_eq!(culler.visible_count(), 1);
    }

    #[test]
    fn frustum_rebuilds_only_on_camera_change() {
        let (mut camera, mut projection, _) = setup();
        let mut culler = Culler::new(&camera, &projection);
        assert!(!culler.update_frustum(&camera, &projection));
        camera.yaw = Deg(90.0).into();
        assert!(culler.update_frustum(&camera, &projection));
        projection.resize(16, 9);
        assert!(culler.update_frustum(&camera, &projection));
        assert!(!culler.update_frustum(&camera, &projection));
    }

    #[test]
    fn unknown_entities_are_not_visible() {
        let (camera, projection, _) = setup();
        let culler = Culler::new(&camera, &projection);
        assert!(!culler.visible(EntityId::from_index(7)));
    }
}
