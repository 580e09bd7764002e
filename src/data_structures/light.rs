//! Point lights and the sun's shadow cube.
//!
//! Lights live in three parallel dense arrays (positions, colors, strengths)
//! so they upload as homogeneous uniform arrays. A light's index is assigned
//! at creation and never changes; lights are not removed mid-session.

use cgmath::{Deg, Matrix4, Point3, Vector3, perspective};
use indexmap::IndexSet;

use crate::{
    camera::OPENGL_TO_WGPU_MATRIX,
    data_structures::registry::{Id, LightId},
    error::{EngineError, ResourceKind, Result},
};

/// Upper bound of lights the forward shaders see.
pub const MAX_LIGHTS: usize = 16;

/// Near plane of the shadow cube projection.
pub const SHADOW_NEAR: f32 = 0.05;

#[derive(Debug, Default)]
pub struct Lights {
    names: IndexSet<String>,
    positions: Vec<[f32; 3]>,
    colors: Vec<[f32; 3]>,
    strengths: Vec<f32>,
    sun: Option<LightId>,
    sun_dirty: bool,
    shadow: Option<ShadowCube>,
}

impl Lights {
    pub fn insert(
        &mut self,
        name: &str,
        position: [f32; 3],
        color: [f32; 3],
        strength: f32,
    ) -> Result<LightId> {
        if self.names.contains(name) {
            return Err(EngineError::duplicate(ResourceKind::Light, name));
        }
        if self.names.len() == MAX_LIGHTS {
            log::warn!("light '{name}' exceeds {MAX_LIGHTS} lights and will not be uploaded");
        }
        let (index, _) = self.names.insert_full(name.to_string());
        self.positions.push(position);
        self.colors.push(color);
        self.strengths.push(strength);
        if self.sun.is_none() {
            self.sun = Some(LightId::from_index(index));
            self.sun_dirty = true;
        }
        Ok(LightId::from_index(index))
    }

    pub fn lookup(&self, name: &str) -> Result<LightId> {
        self.find(name)
            .ok_or_else(|| EngineError::not_found(ResourceKind::Light, name))
    }

    pub fn find(&self, name: &str) -> Option<LightId> {
        self.names.get_index_of(name).map(LightId::from_index)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn position(&self, id: LightId) -> [f32; 3] {
        self.positions[id.index()]
    }

    pub fn color(&self, id: LightId) -> [f32; 3] {
        self.colors[id.index()]
    }

    pub fn strength(&self, id: LightId) -> f32 {
        self.strengths[id.index()]
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn colors(&self) -> &[[f32; 3]] {
        &self.colors
    }

    pub fn strengths(&self) -> &[f32] {
        &self.strengths
    }

    pub fn set_position(&mut self, id: LightId, position: [f32; 3]) {
        self.positions[id.index()] = position;
        if self.sun == Some(id) {
            self.sun_dirty = true;
        }
    }

    pub fn translate(&mut self, id: LightId, delta: [f32; 3]) {
        let p = self.positions[id.index()];
        self.set_position(id, [p[0] + delta[0], p[1] + delta[1], p[2] + delta[2]]);
    }

    pub fn set_color(&mut self, id: LightId, color: [f32; 3]) {
        self.colors[id.index()] = color;
    }

    pub fn set_strength(&mut self, id: LightId, strength: f32) {
        self.strengths[id.index()] = strength;
    }

    /// The shadow-casting light. Defaults to the first light created.
    pub fn sun(&self) -> Option<LightId> {
        self.sun
    }

    pub fn set_sun(&mut self, id: LightId) {
        self.sun = Some(id);
        self.sun_dirty = true;
    }

    /// Shadow settings changed; the cube has to be rebuilt.
    pub fn invalidate_shadow(&mut self) {
        self.sun_dirty = true;
    }

    pub fn shadow(&self) -> Option<&ShadowCube> {
        self.shadow.as_ref()
    }

    /// Recomputes the shadow cube if the sun moved. Returns whether it did.
    pub fn update(&mut self, resolution: u32, far: f32) -> bool {
        if !self.sun_dirty {
            return false;
        }
        self.sun_dirty = false;
        self.shadow = self
            .sun
            .map(|sun| ShadowCube::new(self.positions[sun.index()].into(), resolution, far));
        true
    }
}

/// View-projections of the six cube faces around the snapped sun position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCube {
    pub position: Vector3<f32>,
    pub far: f32,
    pub view_proj: [Matrix4<f32>; 6],
}

/// Face directions and up vectors in cube layer order (+X, -X, +Y, -Y, +Z, -Z).
const CUBE_FACES: [([f32; 3], [f32; 3]); 6] = [
    ([1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
    ([-1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
    ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
    ([0.0, -1.0, 0.0], [0.0, 0.0, -1.0]),
    ([0.0, 0.0, 1.0], [0.0, -1.0, 0.0]),
    ([0.0, 0.0, -1.0], [0.0, -1.0, 0.0]),
];

/// World size of one shadow texel at the far plane.
pub fn shadow_texel(resolution: u32, far: f32) -> f32 {
    2.0 * far / resolution.max(1) as f32
}

pub fn snap_to_texel(position: Vector3<f32>, step: f32) -> Vector3<f32> {
    if step <= 0.0 {
        return position;
    }
    position.map(|c| (c / step).round() * step)
}

/// Rendering into a cube face puts row 0 at the top, so the conventional
/// face table is flipped vertically.
pub fn cube_face_views(eye: Vector3<f32>) -> [Matrix4<f32>; 6] {
    let eye = Point3::new(eye.x, eye.y, eye.z);
    let flip = Matrix4::from_nonuniform_scale(1.0, -1.0, 1.0);
    CUBE_FACES.map(|(dir, up)| flip * Matrix4::look_to_rh(eye, dir.into(), up.into()))
}

pub fn cube_projection(near: f32, far: f32) -> Matrix4<f32> {
    OPENGL_TO_WGPU_MATRIX * perspective(Deg(90.0), 1.0, near, far)
}

impl ShadowCube {
    pub fn new(position: Vector3<f32>, resolution: u32, far: f32) -> Self {
        let position = snap_to_texel(position, shadow_texel(resolution, far));
        let projection = cube_projection(SHADOW_NEAR, far);
        Self {
            position,
            far,
            view_proj: cube_face_views(position).map(|view| projection * view),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use cgmath::{EuclideanSpace, Transform};

    use super::*;

    fn lights_with_sun() -> Lights {
        let mut lights = Lights::default();
        lights
            .insert("sun", [1.0, 10.0, 1.0], [1.0; 3], 5.0)
            .unwrap();
        lights
    }

    #[test]
    fn indices_are_stable_and_dense() {
        let mut lights = lights_with_sun();
        let fill = lights.insert("fill", [0.0; 3], [0.5; 3], 1.0).unwrap();
        assert_eq!(fill.index(), 1);
        assert_eq!(lights.lookup("fill").unwrap(), fill);
        assert_eq!(lights.strengths(), &[5.0, 1.0]);
        assert!(lights.insert("fill", [0.0; 3], [0.0; 3], 0.0).is_err());
    }

    #[test]
    fn first_light_becomes_the_sun() {
        let lights = lights_with_sun();
        assert_eq!(lights.sun(), lights.find("sun"));
    }

    #[test]
    fn shadow_cube_recomputes_only_when_the_sun_moves() {
        let mut lights = lights_with_sun();
        assert!(lights.update(1024, 100.0));
        assert!(!lights.update(1024, 100.0));

        let fill = lights.insert("fill", [0.0; 3], [1.0; 3], 1.0).unwrap();
        lights.set_position(fill, [3.0, 3.0, 3.0]);
        assert!(!lights.update(1024, 100.0));

        let sun = lights.lookup("sun").unwrap();
        lights.translate(sun, [0.0, 1.0, 0.0]);
        assert!(lights.update(1024, 100.0));
    }

    #[test]
    fn small_moves_snap_to_the_same_position() {
        let step = shadow_texel(1024, 100.0);
        let a = snap_to_texel(Vector3::new(1.0, 2.0, 3.0), step);
        let b = snap_to_texel(Vector3::new(1.0 + step * 0.2, 2.0, 3.0 - step * 0.3), step);
        assert_eq!(a, b);
        let c = snap_to_texel(Vector3::new(1.0 + step * 1.2, 2.0, 3.0), step);
        assert_ne!(a, c);
    }

    #[test]
    fn snapped_position_is_a_texel_multiple() {
        let step = shadow_texel(512, 64.0);
        let snapped = snap_to_texel(Vector3::new(0.77, -3.1, 12.49), step);
        for c in [snapped.x, snapped.y, snapped.z] {
            assert_relative_eq!((c / step).round() * step, c, epsilon = 1e-5);
        }
    }

    #[test]
    fn each_face_centers_its_axis() {
        let cube = ShadowCube::new(Vector3::new(0.0, 0.0, 0.0), 1024, 10.0);
        let dirs = CUBE_FACES.map(|(dir, _)| Point3::from_vec(Vector3::from(dir) * 5.0));
        for (face, target) in dirs.iter().enumerate() {
            let clip = cube.view_proj[face].transform_point(*target);
            assert_relative_eq!(clip.x, 0.0, epsilon = 1e-5);
            assert_relative_eq!(clip.y, 0.0, epsilon = 1e-5);
            assert!(clip.z > 0.0 && clip.z < 1.0);
        }
    }
}
