//! The two light sources a scene can carry.

use cgmath::Vector3;

/// Scene-wide light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlobalLight {
    pub position: Vector3<f32>,
    pub color: Vector3<f32>,
    pub intensity: f32,
}

impl Default for GlobalLight {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 100.0, 0.0),
            color: Vector3::new(1.0, 1.0, 1.0),
            intensity: 0.5,
        }
    }
}

/// Point-like light whose contribution falls off with distance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalLight {
    pub position: Vector3<f32>,
    pub color: Vector3<f32>,
    pub intensity: f32,
    pub attenuation_coef: f32,
}

impl Default for LocalLight {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            color: Vector3::new(1.0, 1.0, 1.0),
            intensity: 0.5,
            attenuation_coef: 0.0,
        }
    }
}
