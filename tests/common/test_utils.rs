#![allow(dead_code)]

use std::rc::Rc;

use cgmath::{Matrix4, Vector2, Vector3};
use scene_ngin::{
    config::RendererConfig,
    data_structures::{
        camera::Camera, mesh::Mesh, scene::Scene, scene_graph::GameObject, shader::Shader,
        vertex_buffer::VertexBuffer,
    },
    diagnostics::DiagnosticLog,
    gpu::{Topology, UniformValue, headless::HeadlessApi},
    render::{RenderContext, Renderer},
    resources::generate,
};

pub(crate) const VERTEX_SHADER: &str = r#"
#version 430
layout(location = 0) in vec3 position;
layout(location = 1) in vec3 vertexColor;
layout(location = 2) in vec2 texCoord;
uniform mat4 world;
uniform mat4 view;
uniform mat4 projection;
out vec3 fragPosition;
out vec4 fragColor;
out vec2 fragTexCoord;
void main()
{
    vec4 worldPosition = world * vec4(position, 1.0);
    gl_Position = projection * view * worldPosition;
    fragPosition = worldPosition.xyz;
    fragColor = vec4(vertexColor, 1.0);
    fragTexCoord = texCoord;
}
"#;

pub(crate) const FRAGMENT_SHADER: &str = r#"
#version 430
in vec3 fragPosition;
in vec4 fragColor;
in vec2 fragTexCoord;
out vec4 color;
uniform sampler2D tex;
uniform float materialAmbientIntensity;
uniform float materialSpecularIntensity;
uniform float materialShininess;
uniform vec3 globalLightPosition;
uniform vec3 globalLightColor;
uniform float globalLightIntensity;
uniform vec3 localLightPosition;
uniform vec3 localLightColor;
uniform float localLightIntensity;
uniform float localLightAttenuationCoef;
uniform vec3 viewPosition;
void main()
{
    color = fragColor * texture(tex, fragTexCoord);
}
"#;

/// A shader that only knows its world transform.
pub(crate) const BARE_FRAGMENT_SHADER: &str = r#"
#version 430
in vec4 fragColor;
out vec4 color;
void main()
{
    color = fragColor;
}
"#;

/// A headless device, a renderer and the diagnostics it reports to.
pub(crate) struct Harness {
    pub api: HeadlessApi,
    pub diagnostics: DiagnosticLog,
    pub renderer: Renderer,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(RendererConfig::default())
    }

    pub fn with_config(config: RendererConfig) -> Self {
        scene_ngin::init_logger();
        let mut api = HeadlessApi::new();
        let renderer = Renderer::new(&mut api, config);
        Self {
            api,
            diagnostics: DiagnosticLog::new(),
            renderer,
        }
    }

    /// The full lighting shader, linked.
    pub fn shader(&mut self) -> Rc<Shader> {
        self.shader_from(VERTEX_SHADER, FRAGMENT_SHADER)
    }

    pub fn shader_from(&mut self, vertex: &str, fragment: &str) -> Rc<Shader> {
        let shader = Shader::new(vertex, fragment);
        shader.create(&mut self.api).expect("test shader links");
        Rc::new(shader)
    }

    pub fn render(&mut self, scene: &Scene, shader: &Shader, camera: &Camera) {
        let mut ctx = RenderContext::new(&mut self.api, &mut self.diagnostics);
        self.renderer.render_scene(&mut ctx, scene, shader, camera);
    }

    pub fn render_object(&mut self, shader: &Shader, object: &GameObject, parent: &Matrix4<f32>) {
        let mut ctx = RenderContext::new(&mut self.api, &mut self.diagnostics);
        self.renderer.render_object(&mut ctx, shader, object, parent);
    }

    pub fn allocate(&mut self, scene: &Scene) -> usize {
        let mut ctx = RenderContext::new(&mut self.api, &mut self.diagnostics);
        self.renderer.static_allocate_buffers(&mut ctx, scene)
    }
}

/// One non-indexed triangle with the standard 8-float layout.
pub(crate) fn triangle() -> Rc<Mesh> {
    let mut buffer = VertexBuffer::new(generate::STRIDE);
    buffer.add_vertex_attribute("position", 0, 3, 0).unwrap();
    buffer.add_vertex_attribute("vertexColor", 1, 3, 3).unwrap();
    buffer.add_vertex_attribute("texCoord", 2, 2, 6).unwrap();
    for vertex in [
        [0.0, 0.5, 0.0, 1.0, 0.0, 0.0, 0.5, 1.0],
        [-0.5, -0.5, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
        [0.5, -0.5, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0],
    ] {
        buffer.add_vertex_data(generate::STRIDE, &vertex).unwrap();
    }
    Rc::new(Mesh::new("triangle", buffer, Topology::Triangles))
}

pub(crate) fn quad() -> Rc<Mesh> {
    Rc::new(
        generate::indexed_quad(
            "quad",
            1.0,
            1.0,
            Vector3::new(1.0, 1.0, 1.0),
            Vector2::new(1.0, 1.0),
        )
        .unwrap(),
    )
}

pub(crate) fn assert_matrix_eq(actual: Matrix4<f32>, expected: Matrix4<f32>) {
    let actual: [[f32; 4]; 4] = actual.into();
    let expected: [[f32; 4]; 4] = expected.into();
    for (column, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        for row in 0..4 {
            assert!(
                (a[row] - e[row]).abs() < 1e-5,
                "column {column} row {row}: {actual:?} != {expected:?}"
            );
        }
    }
}

/// The `world` uniform a draw call was issued with.
pub(crate) fn world_of(uniforms: &std::collections::BTreeMap<String, UniformValue>) -> Matrix4<f32> {
    match uniforms.get("world") {
        Some(UniformValue::Mat4(m)) => (*m).into(),
        other => panic!("draw has no world matrix: {other:?}"),
    }
}
