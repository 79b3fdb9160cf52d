//! Local transformation of a scene graph node.
//!
//! A [`Transform`] is stored as translation, rotation and non-uniform scale and
//! turned into a 4x4 matrix (`T * R * S`) when the renderer needs it.

use cgmath::{Deg, InnerSpace, Matrix4, One, Quaternion, Rotation3, Vector3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Transform {
    /// Identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn from_position(position: Vector3<f32>) -> Self {
        Self {
            position,
            ..Self::new()
        }
    }

    pub fn with_rotation(mut self, rotation: Quaternion<f32>) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vector3<f32>) -> Self {
        self.scale = scale;
        self
    }

    pub fn translate(&mut self, offset: Vector3<f32>) {
        self.position += offset;
    }

    /// Rotates about `axis` (in local space) by `angle`.
    pub fn rotate(&mut self, axis: Vector3<f32>, angle: Deg<f32>) {
        if axis.magnitude2() == 0.0 {
            return;
        }
        self.rotation = self.rotation * Quaternion::from_axis_angle(axis.normalize(), angle);
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}
