//! Drawable geometry: a vertex buffer, optional `u16` indices and a topology.
//!
//! Meshes are built on the CPU, wrapped in an `Rc` and shared between scene
//! nodes. Their GPU buffers are created once, the first time the mesh is
//! allocated or bound, and never change afterwards.

use std::cell::OnceCell;

use anyhow::Result;

use crate::{
    data_structures::vertex_buffer::VertexBuffer,
    gpu::{AttributePointer, BufferId, BufferTarget, GraphicsApi, Topology},
};

/// GPU buffers backing one mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshAllocation {
    pub vertex_buffer: BufferId,
    pub index_buffer: Option<BufferId>,
}

#[derive(Debug)]
pub struct Mesh {
    name: String,
    vertex_buffer: VertexBuffer,
    indices: Option<Vec<u16>>,
    topology: Topology,
    allocation: OnceCell<MeshAllocation>,
}

impl Mesh {
    pub fn new(name: &str, vertex_buffer: VertexBuffer, topology: Topology) -> Self {
        Self {
            name: name.to_string(),
            vertex_buffer,
            indices: None,
            topology,
            allocation: OnceCell::new(),
        }
    }

    /// Attaches an index list. Every index must address an existing vertex.
    pub fn with_indices(mut self, indices: Vec<u16>) -> Result<Self> {
        let vertex_count = self.vertex_buffer.vertex_count();
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            anyhow::bail!(
                "mesh {:?}: index {} is out of range for {} vertices",
                self.name,
                bad,
                vertex_count
            );
        }
        self.indices = Some(indices);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertex_buffer(&self) -> &VertexBuffer {
        &self.vertex_buffer
    }

    pub fn indices(&self) -> Option<&[u16]> {
        self.indices.as_deref()
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_buffer.vertex_count() as u32
    }

    /// Number of indices, `0` for non-indexed meshes.
    pub fn index_count(&self) -> u32 {
        self.indices.as_ref().map_or(0, |i| i.len() as u32)
    }

    pub fn is_allocated(&self) -> bool {
        self.allocation.get().is_some()
    }

    pub fn allocation(&self) -> Option<MeshAllocation> {
        self.allocation.get().copied()
    }

    /// Uploads vertex and index data. Only the first call talks to the GPU.
    pub fn static_allocate(&self, api: &mut dyn GraphicsApi) -> MeshAllocation {
        *self.allocation.get_or_init(|| {
            let vertex_buffer = api.create_buffer(
                BufferTarget::Vertex,
                bytemuck::cast_slice(self.vertex_buffer.data()),
            );
            let index_buffer = self.indices.as_ref().map(|indices| {
                api.create_buffer(BufferTarget::Index, bytemuck::cast_slice(indices))
            });
            log::debug!(
                "allocated mesh {:?}: {} vertices, {} indices",
                self.name,
                self.vertex_count(),
                self.index_count()
            );
            MeshAllocation {
                vertex_buffer,
                index_buffer,
            }
        })
    }

    /// Makes this mesh the source of the next draw: binds its buffers and
    /// configures one attribute pointer per vertex attribute.
    pub fn bind(&self, api: &mut dyn GraphicsApi) {
        let allocation = self.static_allocate(api);
        api.bind_buffer(BufferTarget::Vertex, Some(allocation.vertex_buffer));
        api.bind_buffer(BufferTarget::Index, allocation.index_buffer);
        let stride = self.vertex_buffer.stride();
        for attribute in self.vertex_buffer.attributes() {
            api.set_attribute_pointer(AttributePointer {
                location: attribute.location,
                components: attribute.components,
                stride,
                offset: attribute.offset,
            });
            api.enable_attribute(attribute.location);
        }
    }

    pub fn unbind(&self, api: &mut dyn GraphicsApi) {
        for attribute in self.vertex_buffer.attributes() {
            api.disable_attribute(attribute.location);
        }
        api.bind_buffer(BufferTarget::Index, None);
        api.bind_buffer(BufferTarget::Vertex, None);
    }

    /// Issues one draw call; indexed if the mesh has indices.
    pub fn draw(&self, api: &mut dyn GraphicsApi) {
        match &self.indices {
            Some(indices) => api.draw_elements(self.topology, indices.len() as u32),
            None => api.draw_arrays(self.topology, 0, self.vertex_count()),
        }
    }
}

