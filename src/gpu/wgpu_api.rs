//! [`GraphicsApi`] on top of wgpu.
//!
//! wgpu has no global binding state, so the immediate-mode calls are captured
//! instead of executed: every draw snapshots the current program's uniform
//! block, the texture units and the vertex layout. [`WgpuApi::submit`] replays
//! the captured draws into one render pass over an offscreen colour target,
//! which [`WgpuApi::read_pixels`] copies back to the CPU.
//!
//! Shaders are WGSL. Both stages see the same bind groups:
//!
//! - `@group(0) @binding(0)`: `var<uniform> u: Uniforms`, where the fields of
//!   `struct Uniforms` are the program's uniforms (location = field index)
//! - `@group(1) @binding(2n)` / `@binding(2n + 1)`: texture and sampler of
//!   texture unit `n`, for `n < 4`. Empty units read a white texel.
//!
//! The vertex stage is `vs_main`, the fragment stage `fs_main`.

use std::{collections::HashMap, iter, num::NonZeroU64};

use anyhow::{Context, Result, bail, ensure};
use wgpu::util::DeviceExt;

use crate::gpu::{
    AttributePointer, BufferId, BufferTarget, FilterMode, GraphicsApi, ProgramId, SamplerState,
    TextureDescriptor, TextureFormat, TextureId, Topology, UniformLocation, UniformValue,
    VertexArrayId, WrapMode,
};

pub const TEXTURE_UNITS: usize = 4;
const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UniformKind {
    F32,
    I32,
    U32,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformKind {
    fn parse(ty: &str) -> Option<Self> {
        let ty: String = ty.chars().filter(|c| !c.is_whitespace()).collect();
        Some(match ty.as_str() {
            "f32" => UniformKind::F32,
            "i32" => UniformKind::I32,
            "u32" => UniformKind::U32,
            "vec2<f32>" | "vec2f" => UniformKind::Vec2,
            "vec3<f32>" | "vec3f" => UniformKind::Vec3,
            "vec4<f32>" | "vec4f" => UniformKind::Vec4,
            "mat4x4<f32>" | "mat4x4f" => UniformKind::Mat4,
            _ => return None,
        })
    }

    /// (alignment, size) in the WGSL uniform address space.
    fn layout(self) -> (u64, u64) {
        match self {
            UniformKind::F32 | UniformKind::I32 | UniformKind::U32 => (4, 4),
            UniformKind::Vec2 => (8, 8),
            UniformKind::Vec3 => (16, 12),
            UniformKind::Vec4 => (16, 16),
            UniformKind::Mat4 => (16, 64),
        }
    }

    /// Converts scalars between number types; vectors and matrices must match.
    fn encode(self, value: UniformValue) -> Option<Vec<u8>> {
        let scalar = match value {
            UniformValue::Float(v) => Some(v as f64),
            UniformValue::Int(v) => Some(v as f64),
            UniformValue::UInt(v) => Some(v as f64),
            _ => None,
        };
        match (self, value) {
            (UniformKind::F32, _) => scalar.map(|v| (v as f32).to_le_bytes().to_vec()),
            (UniformKind::I32, _) => scalar.map(|v| (v as i32).to_le_bytes().to_vec()),
            (UniformKind::U32, _) => scalar.map(|v| (v as u32).to_le_bytes().to_vec()),
            (UniformKind::Vec2, UniformValue::Vec2(v)) => Some(bytemuck::bytes_of(&v).to_vec()),
            (UniformKind::Vec3, UniformValue::Vec3(v)) => Some(bytemuck::bytes_of(&v).to_vec()),
            (UniformKind::Vec4, UniformValue::Vec4(v)) => Some(bytemuck::bytes_of(&v).to_vec()),
            (UniformKind::Mat4, UniformValue::Mat4(m)) => Some(bytemuck::bytes_of(&m).to_vec()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct UniformField {
    name: String,
    kind: UniformKind,
    offset: u64,
}

fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

fn strip_line_comments(source: &str) -> String {
    source
        .lines()
        .map(|line| line.split("//").next().unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reads the fields of `struct Uniforms` and lays them out like WGSL does.
/// Returns the fields and the size of the whole block.
fn reflect_uniforms(source: &str) -> Result<(Vec<UniformField>, u64)> {
    let source = strip_line_comments(source);
    let Some(start) = source.find("struct Uniforms") else {
        return Ok((Vec::new(), 0));
    };
    let body = &source[start..];
    let open = body.find('{').context("struct Uniforms has no body")?;
    let close = body.find('}').context("struct Uniforms is not closed")?;
    let mut fields = Vec::new();
    let mut offset = 0;
    for member in body[open + 1..close].split(',') {
        let member = member.trim();
        if member.is_empty() {
            continue;
        }
        let (name, ty) = member
            .split_once(':')
            .with_context(|| format!("malformed uniform field {member:?}"))?;
        let name = name.split_whitespace().last().unwrap_or_default();
        let kind = UniformKind::parse(ty)
            .with_context(|| format!("unsupported uniform type {:?} for {name:?}", ty.trim()))?;
        let (alignment, size) = kind.layout();
        offset = align_up(offset, alignment);
        fields.push(UniformField {
            name: name.to_string(),
            kind,
            offset,
        });
        offset += size;
    }
    Ok((fields, align_up(offset, 16)))
}

struct Program {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    fields: Vec<UniformField>,
    values: Vec<u8>,
}

struct TextureStorage {
    view: wgpu::TextureView,
    sampleable: bool,
    _texture: wgpu::Texture,
}

#[derive(Default)]
struct GpuTexture {
    sampler: SamplerState,
    storage: Option<TextureStorage>,
}

struct GpuBuffer {
    target: BufferTarget,
    buffer: wgpu::Buffer,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    /// In `f32` elements.
    stride: u32,
    attributes: Vec<(u32, u32, u32)>,
    topology: Topology,
}

struct PendingDraw {
    pipeline: PipelineKey,
    uniforms: Vec<u8>,
    textures: [Option<TextureId>; TEXTURE_UNITS],
    vertex_buffer: BufferId,
    index_buffer: Option<BufferId>,
    first: u32,
    count: u32,
    indexed: bool,
}

fn texture_format(format: TextureFormat) -> Result<wgpu::TextureFormat> {
    Ok(match format {
        TextureFormat::Rgb | TextureFormat::Rgba | TextureFormat::Rgb8 | TextureFormat::Rgba8 => {
            wgpu::TextureFormat::Rgba8Unorm
        }
        TextureFormat::Srgb8 | TextureFormat::Srgb8Alpha8 => wgpu::TextureFormat::Rgba8UnormSrgb,
        TextureFormat::DepthComponent16 => wgpu::TextureFormat::Depth16Unorm,
        TextureFormat::DepthComponent24 => wgpu::TextureFormat::Depth24Plus,
        TextureFormat::DepthComponent32F => wgpu::TextureFormat::Depth32Float,
        TextureFormat::Depth24Stencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
        TextureFormat::Depth32FStencil8
        | TextureFormat::CompressedRgb
        | TextureFormat::CompressedRgba
        | TextureFormat::CompressedSrgb
        | TextureFormat::CompressedSrgbAlpha => {
            bail!("texture format {format:?} is not supported by the wgpu backend")
        }
    })
}

/// RGB sources are widened to RGBA with an opaque alpha.
fn rgba_pixels(format: TextureFormat, pixels: &[u8]) -> Vec<u8> {
    match format.bytes_per_texel() {
        Some(3) => pixels
            .chunks_exact(3)
            .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
            .collect(),
        _ => pixels.to_vec(),
    }
}

fn filter(mode: FilterMode) -> (wgpu::FilterMode, wgpu::FilterMode) {
    match mode {
        FilterMode::Nearest => (wgpu::FilterMode::Nearest, wgpu::FilterMode::Nearest),
        FilterMode::Linear => (wgpu::FilterMode::Linear, wgpu::FilterMode::Nearest),
        FilterMode::NearestMipmapNearest => (wgpu::FilterMode::Nearest, wgpu::FilterMode::Nearest),
        FilterMode::LinearMipmapNearest => (wgpu::FilterMode::Linear, wgpu::FilterMode::Nearest),
        FilterMode::NearestMipmapLinear => (wgpu::FilterMode::Nearest, wgpu::FilterMode::Linear),
        FilterMode::LinearMipmapLinear => (wgpu::FilterMode::Linear, wgpu::FilterMode::Linear),
    }
}

/// Border clamping needs an optional device feature; edge clamping stands in.
fn address_mode(mode: WrapMode) -> wgpu::AddressMode {
    match mode {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::MirroredRepeat | WrapMode::MirrorClampToEdge => wgpu::AddressMode::MirrorRepeat,
        WrapMode::ClampToEdge | WrapMode::ClampToBorder => wgpu::AddressMode::ClampToEdge,
    }
}

fn primitive_topology(topology: Topology) -> wgpu::PrimitiveTopology {
    match topology {
        Topology::Triangles => wgpu::PrimitiveTopology::TriangleList,
        Topology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        Topology::Lines => wgpu::PrimitiveTopology::LineList,
        Topology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        Topology::Points => wgpu::PrimitiveTopology::PointList,
    }
}

fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

pub struct WgpuApi {
    device: wgpu::Device,
    queue: wgpu::Queue,
    width: u32,
    height: u32,
    clear_color: wgpu::Color,
    color_target: wgpu::Texture,
    depth_view: wgpu::TextureView,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    white_view: wgpu::TextureView,
    next_id: u32,
    buffers: HashMap<BufferId, GpuBuffer>,
    textures: HashMap<TextureId, GpuTexture>,
    programs: HashMap<ProgramId, Program>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    samplers: HashMap<SamplerState, wgpu::Sampler>,
    vertex_array: Option<VertexArrayId>,
    vertex_buffer: Option<BufferId>,
    index_buffer: Option<BufferId>,
    attribute_pointers: HashMap<u32, AttributePointer>,
    enabled_attributes: Vec<u32>,
    texture_units: [Option<TextureId>; TEXTURE_UNITS],
    program: Option<ProgramId>,
    pending: Vec<PendingDraw>,
}

impl WgpuApi {
    /// Opens the default adapter and renders into a `width` x `height` target.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        futures::executor::block_on(Self::new_async(width, height))
    }

    async fn new_async(width: u32, height: u32) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable GPU adapter")?;
        log::info!("rendering with {:?}", adapter.get_info().name);
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("scene-ngin device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("could not open the GPU device")?;

        let width = width.max(1);
        let height = height.max(1);
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let color_target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("color target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth_target.create_view(&wgpu::TextureViewDescriptor::default());

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let texture_entries: Vec<wgpu::BindGroupLayoutEntry> = (0..TEXTURE_UNITS as u32)
            .flat_map(|unit| {
                [
                    wgpu::BindGroupLayoutEntry {
                        binding: 2 * unit,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2 * unit + 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ]
            })
            .collect();
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture_unit_bind_group_layout"),
            entries: &texture_entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let white = device.create_texture_with_data(
            &queue,
            &wgpu::TextureDescriptor {
                label: Some("white"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[255, 255, 255, 255],
        );
        let white_view = white.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            device,
            queue,
            width,
            height,
            clear_color: wgpu::Color::BLACK,
            color_target,
            depth_view,
            uniform_layout,
            texture_layout,
            pipeline_layout,
            white_view,
            next_id: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            programs: HashMap::new(),
            pipelines: HashMap::new(),
            samplers: HashMap::new(),
            vertex_array: None,
            vertex_buffer: None,
            index_buffer: None,
            attribute_pointers: HashMap::new(),
            enabled_attributes: Vec::new(),
            texture_units: [None; TEXTURE_UNITS],
            program: None,
            pending: Vec::new(),
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Draws captured since the last [`WgpuApi::submit`].
    pub fn pending_draws(&self) -> usize {
        self.pending.len()
    }

    pub fn vertex_array(&self) -> Option<VertexArrayId> {
        self.vertex_array
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn uniform_block_size(&self) -> u64 {
        self.programs
            .values()
            .map(|program| program.values.len() as u64)
            .max()
            .unwrap_or(0)
            .max(16)
    }

    fn ensure_pipeline(&mut self, key: &PipelineKey) -> Result<()> {
        if self.pipelines.contains_key(key) {
            return Ok(());
        }
        let program = self
            .programs
            .get(&key.program)
            .with_context(|| format!("unknown program {:?}", key.program))?;
        let attributes: Vec<wgpu::VertexAttribute> = key
            .attributes
            .iter()
            .map(|&(location, components, offset)| wgpu::VertexAttribute {
                format: vertex_format(components),
                offset: offset as u64 * 4,
                shader_location: location,
            })
            .collect();
        let strip = matches!(key.topology, Topology::TriangleStrip | Topology::LineStrip);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                cache: None,
                label: Some("Render Pipeline"),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &program.vertex,
                    entry_point: Some("vs_main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: key.stride as u64 * 4,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &program.fragment,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: COLOR_FORMAT,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: primitive_topology(key.topology),
                    strip_index_format: strip.then_some(wgpu::IndexFormat::Uint16),
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
            });
        log::debug!("created pipeline for {:?} ({:?})", key.program, key.topology);
        self.pipelines.insert(key.clone(), pipeline);
        Ok(())
    }

    fn ensure_sampler(&mut self, state: SamplerState) {
        if self.samplers.contains_key(&state) {
            return;
        }
        let (min_filter, mipmap_filter) = filter(state.min_filter);
        let (mag_filter, _) = filter(state.mag_filter);
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: address_mode(state.wrap_u),
            address_mode_v: address_mode(state.wrap_v),
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter,
            min_filter,
            mipmap_filter,
            ..Default::default()
        });
        self.samplers.insert(state, sampler);
    }

    /// View and sampler state for one unit; empty units and depth textures
    /// read the white texture.
    fn unit_binding(&self, texture: Option<TextureId>) -> (&wgpu::TextureView, SamplerState) {
        let bound = texture.and_then(|id| self.textures.get(&id));
        match bound {
            Some(GpuTexture {
                sampler,
                storage: Some(storage),
            }) if storage.sampleable => (&storage.view, *sampler),
            _ => (&self.white_view, SamplerState::default()),
        }
    }

    /// Captures the current state as one draw.
    fn capture_draw(&mut self, topology: Topology, first: u32, count: u32, indexed: bool) {
        let Some(program) = self.program else {
            log::warn!("draw without a program in use, ignored");
            return;
        };
        let Some(vertex_buffer) = self.vertex_buffer else {
            log::warn!("draw without a vertex buffer bound, ignored");
            return;
        };
        if indexed && self.index_buffer.is_none() {
            log::warn!("indexed draw without an index buffer bound, ignored");
            return;
        }
        let mut enabled: Vec<AttributePointer> = self
            .enabled_attributes
            .iter()
            .filter_map(|location| self.attribute_pointers.get(location).copied())
            .collect();
        enabled.sort_by_key(|pointer| pointer.location);
        let Some(stride) = enabled.first().map(|pointer| pointer.stride) else {
            log::warn!("draw without enabled vertex attributes, ignored");
            return;
        };
        let key = PipelineKey {
            program,
            stride,
            attributes: enabled
                .iter()
                .map(|p| (p.location, p.components, p.offset))
                .collect(),
            topology,
        };
        if let Err(e) = self.ensure_pipeline(&key) {
            log::warn!("draw ignored: {e:#}");
            return;
        }
        let uniforms = self
            .programs
            .get(&program)
            .map(|p| p.values.clone())
            .unwrap_or_default();
        self.pending.push(PendingDraw {
            pipeline: key,
            uniforms,
            textures: self.texture_units,
            vertex_buffer,
            index_buffer: self.index_buffer,
            first,
            count,
            indexed,
        });
    }

    /// Replays every captured draw into one render pass and waits for the GPU.
    pub fn submit(&mut self) -> Result<()> {
        let draws = std::mem::take(&mut self.pending);

        let block_size = self.uniform_block_size();
        let alignment = self.device.limits().min_uniform_buffer_offset_alignment as u64;
        let slot = align_up(block_size, alignment);
        let mut uniform_data = vec![0u8; (slot * draws.len().max(1) as u64) as usize];
        for (i, draw) in draws.iter().enumerate() {
            let start = i * slot as usize;
            uniform_data[start..start + draw.uniforms.len()].copy_from_slice(&draw.uniforms);
        }
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Uniform Buffer"),
                contents: &uniform_data,
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let uniform_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform_bind_group"),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniform_buffer,
                    offset: 0,
                    size: NonZeroU64::new(block_size),
                }),
            }],
        });

        let sampler_states: Vec<SamplerState> = draws
            .iter()
            .flat_map(|draw| draw.textures)
            .map(|texture| self.unit_binding(texture).1)
            .collect();
        for state in sampler_states {
            self.ensure_sampler(state);
        }
        let mut texture_groups = Vec::with_capacity(draws.len());
        for draw in &draws {
            let bindings: Vec<(&wgpu::TextureView, &wgpu::Sampler)> = draw
                .textures
                .iter()
                .map(|&texture| {
                    let (view, state) = self.unit_binding(texture);
                    self.samplers
                        .get(&state)
                        .map(|sampler| (view, sampler))
                        .context("sampler missing")
                })
                .collect::<Result<_>>()?;
            let entries: Vec<wgpu::BindGroupEntry> = bindings
                .iter()
                .enumerate()
                .flat_map(|(unit, (view, sampler))| {
                    [
                        wgpu::BindGroupEntry {
                            binding: 2 * unit as u32,
                            resource: wgpu::BindingResource::TextureView(view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2 * unit as u32 + 1,
                            resource: wgpu::BindingResource::Sampler(sampler),
                        },
                    ]
                })
                .collect();
            texture_groups.push(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("texture_unit_bind_group"),
                layout: &self.texture_layout,
                entries: &entries,
            }));
        }

        let color_view = self
            .color_target
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for (i, draw) in draws.iter().enumerate() {
                let Some(pipeline) = self.pipelines.get(&draw.pipeline) else {
                    continue;
                };
                let Some(vertex) = self.buffers.get(&draw.vertex_buffer) else {
                    log::warn!("draw references a deleted vertex buffer, skipped");
                    continue;
                };
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, &uniform_group, &[(i as u64 * slot) as u32]);
                render_pass.set_bind_group(1, &texture_groups[i], &[]);
                render_pass.set_vertex_buffer(0, vertex.buffer.slice(..));
                if draw.indexed {
                    let Some(index) = draw.index_buffer.and_then(|id| self.buffers.get(&id))
                    else {
                        continue;
                    };
                    render_pass.set_index_buffer(index.buffer.slice(..), wgpu::IndexFormat::Uint16);
                    render_pass.draw_indexed(0..draw.count, 0, 0..1);
                } else {
                    render_pass.draw(draw.first..draw.first + draw.count, 0..1);
                }
            }
        }
        self.queue.submit(iter::once(encoder.finish()));
        log::debug!("submitted {} draws", draws.len());
        Ok(())
    }

    /// Copies the colour target back to the CPU.
    pub fn read_pixels(&self) -> Result<image::RgbaImage> {
        let bytes_per_pixel = 4;
        let unpadded_row = bytes_per_pixel * self.width;
        let padded_row = align_up(
            unpadded_row as u64,
            wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64,
        ) as u32;
        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback buffer"),
            size: (padded_row * self.height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &self.color_target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(iter::once(encoder.finish()));

        // Map before polling, otherwise the wait never completes.
        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .context("waiting for the GPU failed")?;
        futures::executor::block_on(rx.receive())
            .context("readback was cancelled")?
            .context("could not map the readback buffer")?;

        let pixels = {
            let data = buffer_slice.get_mapped_range();
            data.chunks(padded_row as usize)
                .flat_map(|row| &row[..unpadded_row as usize])
                .copied()
                .collect::<Vec<u8>>()
        };
        output_buffer.unmap();
        image::RgbaImage::from_raw(self.width, self.height, pixels)
            .context("readback has the wrong size")
    }
}

impl GraphicsApi for WgpuApi {
    fn set_clear_color(&mut self, color: [f64; 4]) {
        let [r, g, b, a] = color;
        self.clear_color = wgpu::Color { r, g, b, a };
    }

    fn create_vertex_array(&mut self) -> VertexArrayId {
        VertexArrayId(self.next_id())
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        self.vertex_array = vertex_array;
    }

    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> BufferId {
        let id = BufferId(self.next_id());
        let usage = match target {
            BufferTarget::Vertex => wgpu::BufferUsages::VERTEX,
            BufferTarget::Index => wgpu::BufferUsages::INDEX,
        };
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(match target {
                    BufferTarget::Vertex => "Vertex Buffer",
                    BufferTarget::Index => "Index Buffer",
                }),
                contents: data,
                usage,
            });
        self.buffers.insert(id, GpuBuffer { target, buffer });
        id
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        if let Some(id) = buffer {
            match self.buffers.get(&id) {
                Some(gpu) if gpu.target == target => {}
                _ => {
                    log::warn!("buffer {id:?} is not a {target:?} buffer, bind ignored");
                    return;
                }
            }
        }
        match target {
            BufferTarget::Vertex => self.vertex_buffer = buffer,
            BufferTarget::Index => self.index_buffer = buffer,
        }
    }

    fn set_attribute_pointer(&mut self, pointer: AttributePointer) {
        self.attribute_pointers.insert(pointer.location, pointer);
    }

    fn enable_attribute(&mut self, location: u32) {
        if !self.enabled_attributes.contains(&location) {
            self.enabled_attributes.push(location);
        }
    }

    fn disable_attribute(&mut self, location: u32) {
        self.enabled_attributes.retain(|&l| l != location);
    }

    fn create_texture(&mut self) -> TextureId {
        let id = TextureId(self.next_id());
        self.textures.insert(id, GpuTexture::default());
        id
    }

    fn upload_texture(
        &mut self,
        texture: TextureId,
        descriptor: &TextureDescriptor,
        pixels: Option<&[u8]>,
    ) -> Result<()> {
        ensure!(
            self.textures.contains_key(&texture),
            "unknown texture {texture:?}"
        );
        let format = texture_format(descriptor.internal_format)?;
        let depth = descriptor.internal_format.is_depth();
        ensure!(
            !(depth && pixels.is_some()),
            "depth texture {texture:?} cannot be filled with pixel data"
        );
        let size = wgpu::Extent3d {
            width: descriptor.width.max(1),
            height: descriptor.height.max(1),
            depth_or_array_layers: 1,
        };
        let usage = if depth {
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
        } else {
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::RENDER_ATTACHMENT
        };
        let gpu_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("scene texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        if let Some(pixels) = pixels {
            let data = rgba_pixels(descriptor.source_format, pixels);
            ensure!(
                data.len() == (4 * size.width * size.height) as usize,
                "texture {texture:?} expects {} bytes of RGBA data, got {}",
                4 * size.width * size.height,
                data.len()
            );
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &gpu_texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                },
                &data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * size.width),
                    rows_per_image: Some(size.height),
                },
                size,
            );
        }
        let view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());
        if let Some(entry) = self.textures.get_mut(&texture) {
            entry.storage = Some(TextureStorage {
                view,
                sampleable: !depth,
                _texture: gpu_texture,
            });
        }
        log::debug!(
            "uploaded {texture:?}: {}x{} {:?}",
            size.width,
            size.height,
            descriptor.internal_format
        );
        Ok(())
    }

    fn set_sampler_state(&mut self, texture: TextureId, sampler: SamplerState) {
        if let Some(entry) = self.textures.get_mut(&texture) {
            entry.sampler = sampler;
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match self.texture_units.get_mut(unit as usize) {
            Some(slot) => *slot = texture,
            None => log::warn!("texture unit {unit} is out of range (max {TEXTURE_UNITS})"),
        }
    }

    fn create_program(&mut self, vertex_source: &str, fragment_source: &str) -> Result<ProgramId> {
        ensure!(
            vertex_source.contains("fn vs_main"),
            "vertex shader has no vs_main entry point"
        );
        ensure!(
            fragment_source.contains("fn fs_main"),
            "fragment shader has no fs_main entry point"
        );
        let (fields, block_size) = match reflect_uniforms(vertex_source)? {
            (fields, _) if fields.is_empty() => reflect_uniforms(fragment_source)?,
            reflected => reflected,
        };
        let vertex = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("vertex shader"),
                source: wgpu::ShaderSource::Wgsl(vertex_source.into()),
            });
        let fragment = if fragment_source == vertex_source {
            vertex.clone()
        } else {
            self.device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("fragment shader"),
                    source: wgpu::ShaderSource::Wgsl(fragment_source.into()),
                })
        };
        let id = ProgramId(self.next_id());
        log::debug!("{id:?} declares {} uniforms", fields.len());
        self.programs.insert(
            id,
            Program {
                vertex,
                fragment,
                fields,
                values: vec![0; block_size as usize],
            },
        );
        Ok(id)
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.program = program;
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let program = self.programs.get(&program)?;
        program
            .fields
            .iter()
            .position(|field| field.name == name)
            .map(|index| UniformLocation(index as u32))
    }

    fn set_uniform(&mut self, program: ProgramId, location: UniformLocation, value: UniformValue) {
        let Some(program) = self.programs.get_mut(&program) else {
            return;
        };
        let Some(field) = program.fields.get(location.0 as usize) else {
            return;
        };
        let Some(bytes) = field.kind.encode(value) else {
            log::warn!(
                "uniform {:?} is a {:?}, cannot store {value:?}",
                field.name,
                field.kind
            );
            return;
        };
        let start = field.offset as usize;
        program.values[start..start + bytes.len()].copy_from_slice(&bytes);
    }

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) {
        self.capture_draw(topology, first, count, false);
    }

    fn draw_elements(&mut self, topology: Topology, count: u32) {
        self.capture_draw(topology, 0, count, true);
    }
}
