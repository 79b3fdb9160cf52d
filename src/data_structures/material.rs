/// Surface response to lighting, sent to the shader once per drawn node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub ambient_intensity: f32,
    pub specular_intensity: f32,
    pub shininess: f32,
}

impl Material {
    pub fn new(ambient_intensity: f32, specular_intensity: f32, shininess: f32) -> Self {
        Self {
            ambient_intensity,
            specular_intensity,
            shininess,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new(0.1, 0.5, 16.0)
    }
}
