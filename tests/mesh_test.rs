mod common;

use common::test_utils::{quad, triangle};
use scene_ngin::{
    data_structures::{mesh::Mesh, vertex_buffer::VertexBuffer},
    gpu::{AttributePointer, BufferTarget, Topology, headless::HeadlessApi},
};

#[test]
fn vertex_data_must_match_the_stride() {
    let mut buffer = VertexBuffer::new(3);

    assert!(buffer.add_vertex_data(3, &[0.0, 1.0, 2.0]).is_ok());
    assert!(buffer.add_vertex_data(4, &[0.0, 1.0, 2.0, 3.0]).is_err());
    assert!(buffer.add_vertex_data(3, &[0.0, 1.0]).is_err());
    assert_eq!(buffer.vertex_count(), 1);
    assert_eq!(buffer.data(), &[0.0, 1.0, 2.0]);
}

#[test]
fn attributes_must_fit_inside_the_stride() {
    let mut buffer = VertexBuffer::new(5);

    assert!(buffer.add_vertex_attribute("position", 0, 3, 0).is_ok());
    assert!(buffer.add_vertex_attribute("texCoord", 1, 2, 3).is_ok());
    assert!(buffer.add_vertex_attribute("overflow", 2, 2, 4).is_err());
    assert!(buffer.add_vertex_attribute("empty", 3, 0, 0).is_err());
    assert!(buffer.add_vertex_attribute("wide", 4, 5, 0).is_err());
    assert_eq!(buffer.attributes().len(), 2);
}

#[test]
fn huge_attribute_offsets_are_rejected() {
    let mut buffer = VertexBuffer::new(8);

    assert!(buffer.add_vertex_attribute("far", 0, 4, u32::MAX).is_err());
    assert!(buffer.add_vertex_attribute("far", 0, 1, u32::MAX - 1).is_err());
    assert!(buffer.attributes().is_empty());
}

#[test]
fn attribute_locations_are_unique() {
    let mut buffer = VertexBuffer::new(6);
    buffer.add_vertex_attribute("position", 0, 3, 0).unwrap();

    let err = buffer.add_vertex_attribute("normal", 0, 3, 3).unwrap_err();

    assert!(err.to_string().contains("position"));
}

#[test]
fn indices_must_address_existing_vertices() {
    let mut buffer = VertexBuffer::new(3);
    for _ in 0..3 {
        buffer.add_vertex_data(3, &[0.0, 0.0, 0.0]).unwrap();
    }

    let mesh = Mesh::new("ok", buffer.clone(), Topology::Triangles).with_indices(vec![0, 1, 2]);
    assert_eq!(mesh.unwrap().index_count(), 3);

    let bad = Mesh::new("bad", buffer, Topology::Triangles).with_indices(vec![0, 1, 3]);
    assert!(bad.is_err());
}

#[test]
fn static_allocate_uploads_once() {
    let mut api = HeadlessApi::new();
    let mesh = quad();

    let first = mesh.static_allocate(&mut api);
    let second = mesh.static_allocate(&mut api);

    assert_eq!(first, second);
    assert_eq!(api.buffer_count(), 2);
    let vertex_bytes = api.buffer_data(first.vertex_buffer).unwrap();
    assert_eq!(vertex_bytes.len(), 4 * 8 * 4);
    let index_bytes = api.buffer_data(first.index_buffer.unwrap()).unwrap();
    assert_eq!(index_bytes, bytemuck::cast_slice::<u16, u8>(&[0, 1, 2, 0, 2, 3]));
}

#[test]
fn bind_configures_every_attribute() {
    let mut api = HeadlessApi::new();
    let mesh = triangle();

    mesh.bind(&mut api);

    let allocation = mesh.allocation().unwrap();
    assert_eq!(api.bound_buffer(BufferTarget::Vertex), Some(allocation.vertex_buffer));
    assert_eq!(api.bound_buffer(BufferTarget::Index), None);
    assert_eq!(api.enabled_attributes(), vec![0, 1, 2]);
    assert_eq!(
        api.attribute_pointer(2),
        Some((
            allocation.vertex_buffer,
            AttributePointer {
                location: 2,
                components: 2,
                stride: 8,
                offset: 6,
            }
        ))
    );

    mesh.unbind(&mut api);

    assert!(api.enabled_attributes().is_empty());
    assert_eq!(api.bound_buffer(BufferTarget::Vertex), None);
}

#[test]
fn draw_uses_the_mesh_topology() {
    let mut api = HeadlessApi::new();
    let mut buffer = VertexBuffer::new(3);
    buffer.add_vertex_attribute("position", 0, 3, 0).unwrap();
    for x in [0.0, 1.0, 2.0, 3.0] {
        buffer.add_vertex_data(3, &[x, 0.0, 0.0]).unwrap();
    }
    let mesh = Mesh::new("line", buffer, Topology::LineStrip);

    mesh.bind(&mut api);
    mesh.draw(&mut api);

    let draw = &api.draw_calls()[0];
    assert_eq!(draw.topology, Topology::LineStrip);
    assert_eq!(draw.count, 4);
    assert!(!draw.indexed);
}
