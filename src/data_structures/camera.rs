//! The viewer. The renderer only reads it.

use cgmath::{Deg, Matrix4, Point3, SquareMatrix, Vector3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vector3<f32>,
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
}

impl Camera {
    /// A camera at `position` looking at `target` with `+Y` as up and an
    /// identity projection.
    pub fn look_at(position: Vector3<f32>, target: Vector3<f32>) -> Self {
        let view = Matrix4::look_at_rh(
            Point3::new(position.x, position.y, position.z),
            Point3::new(target.x, target.y, target.z),
            Vector3::unit_y(),
        );
        Self {
            position,
            view,
            projection: Matrix4::identity(),
        }
    }

    pub fn with_perspective(mut self, fovy: Deg<f32>, aspect: f32, near: f32, far: f32) -> Self {
        self.projection = cgmath::perspective(fovy, aspect, near, far);
        self
    }

    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection * self.view
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            view: Matrix4::identity(),
            projection: Matrix4::identity(),
        }
    }
}
