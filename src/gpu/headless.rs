//! A device that never touches a GPU.
//!
//! [`HeadlessApi`] validates and records every call it receives and keeps the
//! same binding state a real immediate-mode device would (bound program,
//! vertex array, buffers, texture units, enabled attributes, uniform values).
//! Tests read that state back to check what the renderer did.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::{bail, ensure};
use log::warn;

use super::{
    AttributePointer, BufferId, BufferTarget, GraphicsApi, ProgramId, SamplerState,
    TextureDescriptor, TextureId, Topology, UniformLocation, UniformValue, VertexArrayId,
};

/// Everything the device has been asked to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetClearColor([f64; 4]),
    CreateVertexArray(VertexArrayId),
    BindVertexArray(Option<VertexArrayId>),
    CreateBuffer {
        buffer: BufferId,
        target: BufferTarget,
        len: usize,
    },
    BindBuffer {
        target: BufferTarget,
        buffer: Option<BufferId>,
    },
    AttributePointer(AttributePointer),
    EnableAttribute(u32),
    DisableAttribute(u32),
    CreateTexture(TextureId),
    UploadTexture {
        texture: TextureId,
        descriptor: TextureDescriptor,
        has_pixels: bool,
    },
    SetSamplerState {
        texture: TextureId,
        sampler: SamplerState,
    },
    BindTexture {
        unit: u32,
        texture: Option<TextureId>,
    },
    CreateProgram(ProgramId),
    UseProgram(Option<ProgramId>),
    SetUniform {
        program: ProgramId,
        location: UniformLocation,
        value: UniformValue,
    },
    Draw(DrawCall),
}

/// The device state captured at the moment of a draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub program: Option<ProgramId>,
    pub vertex_array: Option<VertexArrayId>,
    pub topology: Topology,
    pub first: u32,
    pub count: u32,
    pub indexed: bool,
    pub vertex_buffer: Option<BufferId>,
    pub index_buffer: Option<BufferId>,
    pub textures: BTreeMap<u32, TextureId>,
    pub enabled_attributes: Vec<u32>,
    /// Uniform values of `program` at draw time, by name.
    pub uniforms: BTreeMap<String, UniformValue>,
}

#[derive(Debug, Default)]
struct ProgramState {
    /// Declared uniform names; the index is the location.
    uniforms: Vec<String>,
    values: HashMap<UniformLocation, UniformValue>,
}

#[derive(Debug)]
struct TextureState {
    descriptor: Option<TextureDescriptor>,
    sampler: SamplerState,
    uploads: usize,
}

#[derive(Debug)]
struct BufferState {
    target: BufferTarget,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct HeadlessApi {
    next_id: u32,
    commands: Vec<Command>,
    draws: Vec<DrawCall>,
    programs: HashMap<ProgramId, ProgramState>,
    textures: HashMap<TextureId, TextureState>,
    buffers: HashMap<BufferId, BufferState>,
    current_program: Option<ProgramId>,
    vertex_array: Option<VertexArrayId>,
    vertex_buffer: Option<BufferId>,
    index_buffer: Option<BufferId>,
    attribute_pointers: BTreeMap<u32, (BufferId, AttributePointer)>,
    enabled_attributes: BTreeSet<u32>,
    texture_units: BTreeMap<u32, TextureId>,
    clear_color: Option<[f64; 4]>,
}

impl HeadlessApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u32 {
        // zero is reserved for "nothing bound"
        self.next_id += 1;
        self.next_id
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draws
    }

    /// Forgets recorded commands and draws; resources and bindings stay.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
        self.draws.clear();
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.current_program
    }

    pub fn bound_vertex_array(&self) -> Option<VertexArrayId> {
        self.vertex_array
    }

    pub fn bound_buffer(&self, target: BufferTarget) -> Option<BufferId> {
        match target {
            BufferTarget::Vertex => self.vertex_buffer,
            BufferTarget::Index => self.index_buffer,
        }
    }

    /// Last clear colour set, if any.
    pub fn clear_color(&self) -> Option<[f64; 4]> {
        self.clear_color
    }

    pub fn texture_binding(&self, unit: u32) -> Option<TextureId> {
        self.texture_units.get(&unit).copied()
    }

    pub fn enabled_attributes(&self) -> Vec<u32> {
        self.enabled_attributes.iter().copied().collect()
    }

    /// The pointer configured for `location` and the buffer it reads from.
    pub fn attribute_pointer(&self, location: u32) -> Option<(BufferId, AttributePointer)> {
        self.attribute_pointers.get(&location).copied()
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn buffer_data(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.data.as_slice())
    }

    pub fn texture_descriptor(&self, texture: TextureId) -> Option<TextureDescriptor> {
        self.textures.get(&texture).and_then(|t| t.descriptor)
    }

    pub fn sampler_state(&self, texture: TextureId) -> Option<SamplerState> {
        self.textures.get(&texture).map(|t| t.sampler)
    }

    pub fn texture_uploads(&self, texture: TextureId) -> usize {
        self.textures.get(&texture).map_or(0, |t| t.uploads)
    }

    /// Current value of `name` in `program`, if it was ever set.
    pub fn uniform(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        let state = self.programs.get(&program)?;
        let location = state.uniforms.iter().position(|u| u == name)?;
        state
            .values
            .get(&UniformLocation(location as u32))
            .copied()
    }

    /// Number of `SetUniform` commands that targeted `name` in `program`.
    pub fn uniform_writes(&self, program: ProgramId, name: &str) -> usize {
        let Some(location) = self
            .programs
            .get(&program)
            .and_then(|s| s.uniforms.iter().position(|u| u == name))
        else {
            return 0;
        };
        self.commands
            .iter()
            .filter(|c| {
                matches!(c, Command::SetUniform { program: p, location: l, .. }
                    if *p == program && l.0 as usize == location)
            })
            .count()
    }

    fn snapshot_uniforms(&self) -> BTreeMap<String, UniformValue> {
        let Some(state) = self.current_program.and_then(|p| self.programs.get(&p)) else {
            return BTreeMap::new();
        };
        state
            .values
            .iter()
            .filter_map(|(location, value)| {
                state
                    .uniforms
                    .get(location.0 as usize)
                    .map(|name| (name.clone(), *value))
            })
            .collect()
    }

    fn record_draw(&mut self, topology: Topology, first: u32, count: u32, indexed: bool) {
        if self.current_program.is_none() {
            warn!("draw issued without a program in use");
        }
        let draw = DrawCall {
            program: self.current_program,
            vertex_array: self.vertex_array,
            topology,
            first,
            count,
            indexed,
            vertex_buffer: self.vertex_buffer,
            index_buffer: if indexed { self.index_buffer } else { None },
            textures: self.texture_units.clone(),
            enabled_attributes: self.enabled_attributes(),
            uniforms: self.snapshot_uniforms(),
        };
        self.commands.push(Command::Draw(draw.clone()));
        self.draws.push(draw);
    }
}

/// Collects the names of GLSL-style uniform declarations such as
/// `uniform mat4 world;` or `layout(location = 0) uniform float x;`.
fn declared_uniforms(source: &str) -> Vec<String> {
    source
        .split(';')
        .filter_map(|statement| {
            let mut tokens = statement.split_whitespace().skip_while(|t| *t != "uniform");
            tokens.next()?;
            let _ty = tokens.next()?;
            let name = tokens.next()?;
            let name = name.split('[').next().unwrap_or(name);
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

impl GraphicsApi for HeadlessApi {
    fn set_clear_color(&mut self, color: [f64; 4]) {
        self.clear_color = Some(color);
        self.commands.push(Command::SetClearColor(color));
    }

    fn create_vertex_array(&mut self) -> VertexArrayId {
        let id = VertexArrayId(self.next_id());
        self.commands.push(Command::CreateVertexArray(id));
        id
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        self.vertex_array = vertex_array;
        self.commands.push(Command::BindVertexArray(vertex_array));
    }

    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> BufferId {
        let buffer = BufferId(self.next_id());
        self.buffers.insert(
            buffer,
            BufferState {
                target,
                data: data.to_vec(),
            },
        );
        self.commands.push(Command::CreateBuffer {
            buffer,
            target,
            len: data.len(),
        });
        buffer
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        if let Some(state) = buffer.and_then(|b| self.buffers.get(&b)) {
            if state.target != target {
                warn!(
                    "buffer {:?} was created as {:?} but bound as {:?}",
                    buffer, state.target, target
                );
            }
        }
        match target {
            BufferTarget::Vertex => self.vertex_buffer = buffer,
            BufferTarget::Index => self.index_buffer = buffer,
        }
        self.commands.push(Command::BindBuffer { target, buffer });
    }

    fn set_attribute_pointer(&mut self, pointer: AttributePointer) {
        match self.vertex_buffer {
            Some(buffer) => {
                self.attribute_pointers
                    .insert(pointer.location, (buffer, pointer));
            }
            None => warn!(
                "attribute pointer for location {} set without a bound vertex buffer",
                pointer.location
            ),
        }
        self.commands.push(Command::AttributePointer(pointer));
    }

    fn enable_attribute(&mut self, location: u32) {
        self.enabled_attributes.insert(location);
        self.commands.push(Command::EnableAttribute(location));
    }

    fn disable_attribute(&mut self, location: u32) {
        self.enabled_attributes.remove(&location);
        self.commands.push(Command::DisableAttribute(location));
    }

    fn create_texture(&mut self) -> TextureId {
        let texture = TextureId(self.next_id());
        self.textures.insert(
            texture,
            TextureState {
                descriptor: None,
                sampler: SamplerState::default(),
                uploads: 0,
            },
        );
        self.commands.push(Command::CreateTexture(texture));
        texture
    }

    fn upload_texture(
        &mut self,
        texture: TextureId,
        descriptor: &TextureDescriptor,
        pixels: Option<&[u8]>,
    ) -> anyhow::Result<()> {
        let Some(state) = self.textures.get_mut(&texture) else {
            bail!("texture {:?} does not exist", texture);
        };
        if let (Some(pixels), Some(bpp)) = (pixels, descriptor.source_format.bytes_per_texel()) {
            let expected = (descriptor.width * descriptor.height * bpp) as usize;
            ensure!(
                pixels.len() == expected,
                "texture {:?}: expected {} bytes of {:?} data, got {}",
                texture,
                expected,
                descriptor.source_format,
                pixels.len()
            );
        }
        state.descriptor = Some(*descriptor);
        state.uploads += 1;
        self.commands.push(Command::UploadTexture {
            texture,
            descriptor: *descriptor,
            has_pixels: pixels.is_some(),
        });
        Ok(())
    }

    fn set_sampler_state(&mut self, texture: TextureId, sampler: SamplerState) {
        match self.textures.get_mut(&texture) {
            Some(state) => state.sampler = sampler,
            None => warn!("sampler state set on unknown texture {:?}", texture),
        }
        self.commands
            .push(Command::SetSamplerState { texture, sampler });
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match texture {
            Some(texture) => {
                self.texture_units.insert(unit, texture);
            }
            None => {
                self.texture_units.remove(&unit);
            }
        }
        self.commands.push(Command::BindTexture { unit, texture });
    }

    fn create_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> anyhow::Result<ProgramId> {
        ensure!(
            vertex_source.contains("main"),
            "vertex shader has no main function"
        );
        ensure!(
            fragment_source.contains("main"),
            "fragment shader has no main function"
        );
        let mut uniforms = declared_uniforms(vertex_source);
        for name in declared_uniforms(fragment_source) {
            if !uniforms.contains(&name) {
                uniforms.push(name);
            }
        }
        let program = ProgramId(self.next_id());
        self.programs.insert(
            program,
            ProgramState {
                uniforms,
                values: HashMap::new(),
            },
        );
        self.commands.push(Command::CreateProgram(program));
        Ok(program)
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.current_program = program;
        self.commands.push(Command::UseProgram(program));
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.programs
            .get(&program)?
            .uniforms
            .iter()
            .position(|u| u == name)
            .map(|idx| UniformLocation(idx as u32))
    }

    fn set_uniform(&mut self, program: ProgramId, location: UniformLocation, value: UniformValue) {
        match self.programs.get_mut(&program) {
            Some(state) if (location.0 as usize) < state.uniforms.len() => {
                state.values.insert(location, value);
            }
            Some(_) => warn!("uniform location {:?} out of range for {:?}", location, program),
            None => warn!("uniform set on unknown program {:?}", program),
        }
        self.commands.push(Command::SetUniform {
            program,
            location,
            value,
        });
    }

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) {
        self.record_draw(topology, first, count, false);
    }

    fn draw_elements(&mut self, topology: Topology, count: u32) {
        if self.index_buffer.is_none() {
            warn!("indexed draw without a bound index buffer");
        }
        self.record_draw(topology, 0, count, true);
    }
}
