#![cfg(all(feature = "wgpu-backend", feature = "integration-tests"))]

use std::rc::Rc;

use cgmath::{Vector2, Vector3};
use scene_ngin::{
    config::RendererConfig,
    data_structures::{
        camera::Camera, scene::Scene, scene_graph::GameObject, shader::Shader, texture::Texture,
    },
    diagnostics::DiagnosticLog,
    gpu::{TextureFormat, wgpu_api::WgpuApi},
    render::{RenderContext, Renderer},
    resources::generate,
};

const SHADER: &str = r#"
struct Uniforms {
    world: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(0) var t_unit0: texture_2d<f32>;
@group(1) @binding(1) var s_unit0: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec3<f32>,
    @location(2) tex_coords: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec3<f32>,
    @location(1) tex_coords: vec2<f32>,
}

@vertex
fn vs_main(model: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = u.projection * u.view * u.world * vec4<f32>(model.position, 1.0);
    out.color = model.color;
    out.tex_coords = model.tex_coords;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(in.color, 1.0) * textureSample(t_unit0, s_unit0, in.tex_coords);
}
"#;

const SIZE: u32 = 16;

/// A quad filling the whole viewport with an identity camera.
fn fullscreen_scene(color: Vector3<f32>, texture: Option<Rc<Texture>>) -> Scene {
    let quad = generate::indexed_quad("fullscreen", 2.0, 2.0, color, Vector2::new(1.0, 1.0))
        .expect("quad builds");
    let mut object = GameObject::new("fullscreen").with_mesh(Rc::new(quad));
    if let Some(texture) = texture {
        object = object.with_texture(texture);
    }
    let mut scene = Scene::new();
    scene.add_object(object);
    scene
}

fn render(scene: &Scene) -> image::RgbaImage {
    scene_ngin::init_logger();
    let mut api = WgpuApi::new(SIZE, SIZE).expect("a GPU adapter is available");
    let mut diagnostics = DiagnosticLog::new();
    let renderer = Renderer::new(&mut api, RendererConfig::default());
    let shader = Shader::new(SHADER, SHADER);
    shader.create(&mut api).expect("shader compiles");
    {
        let mut ctx = RenderContext::new(&mut api, &mut diagnostics);
        renderer.static_allocate_buffers(&mut ctx, scene);
        renderer.render_scene(&mut ctx, scene, &shader, &Camera::default());
    }
    assert!(diagnostics.is_empty(), "{diagnostics}");
    api.submit().expect("frame submits");
    api.read_pixels().expect("readback works")
}

#[test]
fn should_render_clear_colour() {
    scene_ngin::init_logger();
    let mut api = WgpuApi::new(SIZE, SIZE).expect("a GPU adapter is available");
    let config = RendererConfig {
        clear_color: [1.0, 1.0, 1.0, 1.0],
        ..RendererConfig::default()
    };
    Renderer::new(&mut api, config);

    api.submit().unwrap();
    let texture = api.read_pixels().unwrap();

    for pixel in texture.pixels() {
        assert_eq!(*pixel, image::Rgba([255, 255, 255, 255]));
    }
}

#[test]
fn should_render_vertex_colours() {
    let texture = render(&fullscreen_scene(Vector3::new(1.0, 0.0, 0.0), None));

    for pixel in texture.pixels() {
        assert_eq!(*pixel, image::Rgba([255, 0, 0, 255]));
    }
}

#[test]
fn should_sample_the_bound_texture() {
    let green = Texture::from_pixels("green", 1, 1, TextureFormat::Rgba8, vec![0, 255, 0, 255])
        .expect("valid texture");
    let texture = render(&fullscreen_scene(
        Vector3::new(1.0, 1.0, 1.0),
        Some(Rc::new(green)),
    ));

    for pixel in texture.pixels() {
        assert_eq!(*pixel, image::Rgba([0, 255, 0, 255]));
    }
}
