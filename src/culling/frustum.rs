use cgmath::{InnerSpace, Matrix4, Vector3, Vector4};

use crate::{
    camera::{Camera, Projection},
    data_structures::mesh::BoundingSphere,
};

/// A half-space `dot(normal, x) - distance >= 0` with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f32>,
    pub distance: f32,
}

impl Plane {
    /// Plane through `point` facing `normal` (normalised here).
    pub fn from_point_normal(point: Vector3<f32>, normal: Vector3<f32>) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            distance: normal.dot(point),
        }
    }

    /// From `(a, b, c, w)` where `a*x + b*y + c*z + w >= 0` is inside.
    fn from_coefficients(c: Vector4<f32>) -> Self {
        let normal = c.truncate();
        let length = normal.magnitude();
        Self {
            normal: normal / length,
            distance: -c.w / length,
        }
    }

    pub fn signed_distance(&self, point: Vector3<f32>) -> f32 {
        self.normal.dot(point) - self.distance
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Near,
    Far,
    Left,
    Right,
    Top,
    Bottom,
}

/// Six inward-facing planes in [`Side`] order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    pub const SIDES: [Side; 6] = [
        Side::Near,
        Side::Far,
        Side::Left,
        Side::Right,
        Side::Top,
        Side::Bottom,
    ];

    /// Builds the frustum from the camera basis and projection parameters.
    pub fn from_camera(camera: &Camera, projection: &Projection) -> Self {
        let (forward, right, up) = camera.basis();
        let eye = Vector3::new(camera.position.x, camera.position.y, camera.position.z);
        let half_v = projection.zfar * (projection.fovy.0 * 0.5).tan();
        let half_h = half_v * projection.aspect;
        let to_far = forward * projection.zfar;

        let near = Plane::from_point_normal(eye + forward * projection.znear, forward);
        let far = Plane::from_point_normal(eye + to_far, -forward);
        let left = Plane::from_point_normal(eye, (to_far - right * half_h).cross(up));
        let right_plane = Plane::from_point_normal(eye, up.cross(to_far + right * half_h));
        let top = Plane::from_point_normal(eye, (to_far + up * half_v).cross(right));
        let bottom = Plane::from_point_normal(eye, right.cross(to_far - up * half_v));

        Self {
            planes: [near, far, left, right_plane, top, bottom],
        }
    }

    /// Extracts the planes of a wgpu-style (0..1 depth) view-projection.
    pub fn from_view_projection(m: &Matrix4<f32>) -> Self {
        let row = |i: usize| Vector4::new(m.x[i], m.y[i], m.z[i], m.w[i]);
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        Self {
            planes: [
                Plane::from_coefficients(r2),
                Plane::from_coefficients(r3 - r2),
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r3 + r1),
            ],
        }
    }

    pub fn plane(&self, side: Side) -> &Plane {
        &self.planes[side as usize]
    }

    /// True unless the sphere lies wholly outside one of the planes.
    pub fn contains_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(sphere.center) > -sphere.radius)
    }
}
