//! Entity transform component.

use cgmath::{Deg, Matrix4, Vector3};

/// Position, Euler rotation in degrees and per-axis scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
}

impl Transform {
    /// Identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Translate · RotateX · RotateY · RotateZ · Scale.
    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from_angle_x(Deg(self.rotation.x))
            * Matrix4::from_angle_y(Deg(self.rotation.y))
            * Matrix4::from_angle_z(Deg(self.rotation.z))
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Largest scale component; bounding radii grow by this factor.
    pub fn max_scale(&self) -> f32 {
        self.scale.x.max(self.scale.y).max(self.scale.z)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vector3<f32>> for Transform {
    fn from(position: Vector3<f32>) -> Self {
        Transform {
            position,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use cgmath::{Point3, SquareMatrix, Transform as _};

    use super::*;

    #[test]
    fn default_is_identity() {
        assert_eq!(Transform::default().to_matrix(), Matrix4::identity());
    }

    #[test]
    fn scale_applies_before_rotation_and_translation() {
        let t = Transform {
            position: Vector3::new(10.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 90.0),
            scale: Vector3::new(2.0, 1.0, 1.0),
        };
        // x scaled to 2, rotated onto +y, then shifted by 10 along x
        let p = t.to_matrix().transform_point(Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(10.0, 2.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn rotation_order_is_x_then_y_then_z_outermost_first() {
        let t = Transform {
            rotation: Vector3::new(90.0, 90.0, 0.0),
            ..Default::default()
        };
        let expected = Matrix4::from_angle_x(Deg(90.0)) * Matrix4::from_angle_y(Deg(90.0));
        assert_relative_eq!(t.to_matrix(), expected, epsilon = 1e-6);
    }
}
