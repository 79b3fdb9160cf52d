//! Per-node animation hooks driven by [`crate::data_structures::scene::Scene::update`].

use cgmath::{Deg, Vector3};

use crate::data_structures::transform::Transform;

pub trait Behavior {
    /// Advances the behavior by `elapsed_seconds` and applies it to `transform`.
    fn update(&mut self, transform: &mut Transform, elapsed_seconds: f64);

    /// Returns to the initial state.
    fn reset(&mut self) {}
}

/// Spins the node about a fixed local axis.
#[derive(Clone, Debug)]
pub struct RotateBehavior {
    pub axis: Vector3<f32>,
    /// Degrees per second.
    pub speed: f32,
    pub enabled: bool,
}

impl RotateBehavior {
    pub fn new(axis: Vector3<f32>, speed: f32) -> Self {
        Self {
            axis,
            speed,
            enabled: true,
        }
    }
}

impl Behavior for RotateBehavior {
    fn update(&mut self, transform: &mut Transform, elapsed_seconds: f64) {
        if !self.enabled {
            return;
        }
        let angle = Deg(self.speed * elapsed_seconds as f32);
        transform.rotate(self.axis, angle);
    }

    fn reset(&mut self) {
        self.enabled = true;
    }
}
