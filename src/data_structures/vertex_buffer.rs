//! Interleaved vertex data and the description of its attributes.

use anyhow::{Result, ensure};

/// One attribute inside an interleaved vertex, e.g. `position` at location 0
/// with 3 components starting at element 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: String,
    pub location: u32,
    pub components: u32,
    /// Offset in `f32` elements from the start of the vertex.
    pub offset: u32,
}

/// A CPU-side list of interleaved `f32` vertices with a fixed stride.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexBuffer {
    stride: u32,
    data: Vec<f32>,
    attributes: Vec<VertexAttribute>,
}

impl VertexBuffer {
    /// `stride` is the number of `f32` values per vertex.
    pub fn new(stride: u32) -> Self {
        Self {
            stride,
            data: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn vertex_count(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.data.len() / self.stride as usize
        }
    }

    /// Appends one vertex. The caller states the stride it assumed, which has
    /// to match the buffer's.
    pub fn add_vertex_data(&mut self, stride: u32, values: &[f32]) -> Result<()> {
        ensure!(
            stride == self.stride,
            "vertex stride {} does not match the buffer stride {}",
            stride,
            self.stride
        );
        ensure!(
            values.len() == self.stride as usize,
            "expected {} values for one vertex, got {}",
            self.stride,
            values.len()
        );
        self.data.extend_from_slice(values);
        Ok(())
    }

    pub fn add_vertex_attribute(
        &mut self,
        name: &str,
        location: u32,
        components: u32,
        offset: u32,
    ) -> Result<()> {
        ensure!(
            (1..=4).contains(&components),
            "attribute {name:?} has {components} components, expected 1 to 4"
        );
        ensure!(
            offset
                .checked_add(components)
                .is_some_and(|end| end <= self.stride),
            "attribute {name:?} at offset {offset} with {components} components does not fit the stride {}",
            self.stride
        );
        ensure!(
            self.attributes.iter().all(|a| a.location != location),
            "attribute location {location} is already used by {:?}",
            self.attributes
                .iter()
                .find(|a| a.location == location)
                .map(|a| a.name.as_str())
                .unwrap_or_default()
        );
        self.attributes.push(VertexAttribute {
            name: name.to_string(),
            location,
            components,
            offset,
        });
        Ok(())
    }
}
