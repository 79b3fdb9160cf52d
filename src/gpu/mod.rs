//! Immediate-mode graphics API.
//!
//! Everything above this module talks to the GPU through [`GraphicsApi`], a
//! small command surface in the spirit of classic immediate-mode APIs: create
//! a resource, bind it, set uniforms on a program, issue a draw. Two devices
//! implement it:
//!
//! - [`headless::HeadlessApi`] records every command and tracks the bound
//!   state in process. Used for tests and dry runs.
//! - `wgpu_api::WgpuApi` (feature `wgpu-backend`) renders for real on top of
//!   wgpu.

use cgmath::{Matrix4, Vector2, Vector3, Vector4};

pub mod headless;
#[cfg(feature = "wgpu-backend")]
pub mod wgpu_api;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// A linked program. Id `0` is never handed out, matching the "no program"
/// convention of immediate-mode APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// A resolved uniform slot inside one program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Vertex,
    Index,
}

/// How a flat vertex/index list is interpreted for rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Topology {
    #[default]
    Triangles,
    TriangleStrip,
    Lines,
    LineStrip,
    Points,
}

/// One typed value for a uniform upload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    UInt(u32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Column-major, like cgmath stores it.
    Mat4([[f32; 4]; 4]),
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<u32> for UniformValue {
    fn from(value: u32) -> Self {
        UniformValue::UInt(value)
    }
}

impl From<Vector2<f32>> for UniformValue {
    fn from(value: Vector2<f32>) -> Self {
        UniformValue::Vec2(value.into())
    }
}

impl From<Vector3<f32>> for UniformValue {
    fn from(value: Vector3<f32>) -> Self {
        UniformValue::Vec3(value.into())
    }
}

impl From<Vector4<f32>> for UniformValue {
    fn from(value: Vector4<f32>) -> Self {
        UniformValue::Vec4(value.into())
    }
}

impl From<Matrix4<f32>> for UniformValue {
    fn from(value: Matrix4<f32>) -> Self {
        UniformValue::Mat4(value.into())
    }
}

/// Describes how one attribute is read from the bound vertex buffer.
///
/// `stride` and `offset` are counted in `f32` elements, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributePointer {
    pub location: u32,
    pub components: u32,
    pub stride: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
    MirrorClampToEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    // color
    Rgb,
    Rgba,
    Rgb8,
    Rgba8,
    Srgb8,
    Srgb8Alpha8,
    // depth and stencil
    DepthComponent16,
    DepthComponent24,
    DepthComponent32F,
    Depth24Stencil8,
    Depth32FStencil8,
    // compressed
    CompressedRgb,
    CompressedRgba,
    CompressedSrgb,
    CompressedSrgbAlpha,
}

impl TextureFormat {
    /// Bytes per texel of uncompressed source data, `None` for compressed formats.
    pub fn bytes_per_texel(&self) -> Option<u32> {
        match self {
            TextureFormat::Rgb | TextureFormat::Rgb8 | TextureFormat::Srgb8 => Some(3),
            TextureFormat::Rgba | TextureFormat::Rgba8 | TextureFormat::Srgb8Alpha8 => Some(4),
            TextureFormat::DepthComponent16 => Some(2),
            TextureFormat::DepthComponent24
            | TextureFormat::DepthComponent32F
            | TextureFormat::Depth24Stencil8 => Some(4),
            TextureFormat::Depth32FStencil8 => Some(8),
            TextureFormat::CompressedRgb
            | TextureFormat::CompressedRgba
            | TextureFormat::CompressedSrgb
            | TextureFormat::CompressedSrgbAlpha => None,
        }
    }

    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::DepthComponent16
                | TextureFormat::DepthComponent24
                | TextureFormat::DepthComponent32F
                | TextureFormat::Depth24Stencil8
                | TextureFormat::Depth32FStencil8
        )
    }
}

/// Filter and wrap state of one texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerState {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub wrap_u: WrapMode,
    pub wrap_v: WrapMode,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self {
            min_filter: FilterMode::Nearest,
            mag_filter: FilterMode::Nearest,
            wrap_u: WrapMode::Repeat,
            wrap_v: WrapMode::Repeat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    pub internal_format: TextureFormat,
    pub source_format: TextureFormat,
}

/// The command surface of an immediate-mode graphics device.
///
/// Calls take effect in order. Binding calls change device-global state that
/// later calls (attribute pointers, draws) read, so callers are responsible for
/// pairing every bind with an unbind.
pub trait GraphicsApi {
    /// Colour the render target is cleared to at the start of each frame.
    fn set_clear_color(&mut self, color: [f64; 4]);

    fn create_vertex_array(&mut self) -> VertexArrayId;

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>);

    /// Creates a buffer initialised with `data`. The contents never change afterwards.
    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> BufferId;

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>);

    /// Configures `pointer.location` to read from the currently bound vertex buffer.
    fn set_attribute_pointer(&mut self, pointer: AttributePointer);

    fn enable_attribute(&mut self, location: u32);

    fn disable_attribute(&mut self, location: u32);

    fn create_texture(&mut self) -> TextureId;

    /// Allocates storage for `texture` and fills it with `pixels`. `None`
    /// reserves storage only (render targets). Replaces earlier content.
    fn upload_texture(
        &mut self,
        texture: TextureId,
        descriptor: &TextureDescriptor,
        pixels: Option<&[u8]>,
    ) -> anyhow::Result<()>;

    fn set_sampler_state(&mut self, texture: TextureId, sampler: SamplerState);

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>);

    /// Compiles both stages and links them into one program.
    fn create_program(&mut self, vertex_source: &str, fragment_source: &str)
    -> anyhow::Result<ProgramId>;

    fn use_program(&mut self, program: Option<ProgramId>);

    /// `None` if the program declares no uniform called `name`.
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    fn set_uniform(&mut self, program: ProgramId, location: UniformLocation, value: UniformValue);

    /// Non-indexed draw of `count` vertices starting at `first`.
    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32);

    /// Indexed draw of `count` `u16` indices from the bound index buffer.
    fn draw_elements(&mut self, topology: Topology, count: u32);
}
