//! Procedural geometry.
//!
//! Every generator produces interleaved vertices with a stride of 8 floats:
//! `position` (location 0, 3 floats), `vertexColor` (location 1, 3 floats) and
//! `texCoord` (location 2, 2 floats). `tex` is the texture coordinate of the
//! far corner of every face, so values above 1 tile a repeating texture.

use anyhow::Result;
use cgmath::{Vector2, Vector3};

use crate::{
    data_structures::{mesh::Mesh, vertex_buffer::VertexBuffer},
    gpu::Topology,
};

pub const STRIDE: u32 = 8;

/// Corners of one face: top-left, bottom-left, bottom-right, top-right.
type Face = [[f32; 3]; 4];

fn textured_layout() -> Result<VertexBuffer> {
    let mut buffer = VertexBuffer::new(STRIDE);
    buffer.add_vertex_attribute("position", 0, 3, 0)?;
    buffer.add_vertex_attribute("vertexColor", 1, 3, 3)?;
    buffer.add_vertex_attribute("texCoord", 2, 2, 6)?;
    Ok(buffer)
}

fn face_tex_coords(tex: Vector2<f32>) -> [[f32; 2]; 4] {
    [[0.0, tex.y], [0.0, 0.0], [tex.x, 0.0], [tex.x, tex.y]]
}

fn push_vertex(
    buffer: &mut VertexBuffer,
    position: [f32; 3],
    color: Vector3<f32>,
    tex_coord: [f32; 2],
) -> Result<()> {
    buffer.add_vertex_data(
        STRIDE,
        &[
            position[0],
            position[1],
            position[2],
            color.x,
            color.y,
            color.z,
            tex_coord[0],
            tex_coord[1],
        ],
    )
}

/// Two triangles per face, counter-clockwise when seen from outside.
fn push_faces(
    buffer: &mut VertexBuffer,
    faces: &[Face],
    color: Vector3<f32>,
    tex: Vector2<f32>,
) -> Result<()> {
    let tex_coords = face_tex_coords(tex);
    for face in faces {
        for corner in [0, 1, 2, 0, 2, 3] {
            push_vertex(buffer, face[corner], color, tex_coords[corner])?;
        }
    }
    Ok(())
}

/// A box centred on the origin: 6 faces, 36 vertices, no indices.
pub fn cuboid(
    width: f32,
    height: f32,
    depth: f32,
    color: Vector3<f32>,
    tex: Vector2<f32>,
) -> Result<VertexBuffer> {
    let (hw, hh, hd) = (width / 2.0, height / 2.0, depth / 2.0);
    let faces: [Face; 6] = [
        // front
        [[-hw, hh, hd], [-hw, -hh, hd], [hw, -hh, hd], [hw, hh, hd]],
        // right
        [[hw, hh, hd], [hw, -hh, hd], [hw, -hh, -hd], [hw, hh, -hd]],
        // back
        [[hw, hh, -hd], [hw, -hh, -hd], [-hw, -hh, -hd], [-hw, hh, -hd]],
        // left
        [[-hw, hh, -hd], [-hw, -hh, -hd], [-hw, -hh, hd], [-hw, hh, hd]],
        // top
        [[-hw, hh, -hd], [-hw, hh, hd], [hw, hh, hd], [hw, hh, -hd]],
        // bottom
        [[hw, -hh, -hd], [hw, -hh, hd], [-hw, -hh, hd], [-hw, -hh, -hd]],
    ];
    let mut buffer = textured_layout()?;
    push_faces(&mut buffer, &faces, color, tex)?;
    Ok(buffer)
}

/// A horizontal plane at `y = 0` facing up: 6 vertices, no indices.
pub fn plane(width: f32, depth: f32, color: Vector3<f32>, tex: Vector2<f32>) -> Result<VertexBuffer> {
    let (hw, hd) = (width / 2.0, depth / 2.0);
    let face: Face = [[-hw, 0.0, -hd], [-hw, 0.0, hd], [hw, 0.0, hd], [hw, 0.0, -hd]];
    let mut buffer = textured_layout()?;
    push_faces(&mut buffer, &[face], color, tex)?;
    Ok(buffer)
}

/// A quad in the XY plane facing +Z, sharing its 4 corners through the
/// indices `[0, 1, 2, 0, 2, 3]`.
pub fn indexed_quad(
    name: &str,
    width: f32,
    height: f32,
    color: Vector3<f32>,
    tex: Vector2<f32>,
) -> Result<Mesh> {
    let (hw, hh) = (width / 2.0, height / 2.0);
    let corners: Face = [[-hw, hh, 0.0], [-hw, -hh, 0.0], [hw, -hh, 0.0], [hw, hh, 0.0]];
    let tex_coords = face_tex_coords(tex);
    let mut buffer = textured_layout()?;
    for (corner, tex_coord) in corners.into_iter().zip(tex_coords) {
        push_vertex(&mut buffer, corner, color, tex_coord)?;
    }
    Mesh::new(name, buffer, Topology::Triangles).with_indices(vec![0, 1, 2, 0, 2, 3])
}
