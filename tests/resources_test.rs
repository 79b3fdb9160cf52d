use std::io::Cursor;

use cgmath::{Vector2, Vector3};
use scene_ngin::{
    data_structures::mesh::Mesh,
    diagnostics::DiagnosticLog,
    gpu::{TextureFormat, Topology},
    resources::{
        generate::{self, STRIDE},
        texture::{load_texture, load_texture_or_fallback, texture_from_bytes},
    },
};

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([x as u8 * 100, y as u8 * 100, 7, 255])
    });
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}

#[test]
fn cuboid_has_six_faces_of_two_triangles() {
    let color = Vector3::new(0.5, 0.25, 1.0);
    let buffer = generate::cuboid(2.0, 4.0, 6.0, color, Vector2::new(1.0, 1.0)).unwrap();

    assert_eq!(buffer.stride(), STRIDE);
    assert_eq!(buffer.vertex_count(), 36);
    let names: Vec<&str> = buffer.attributes().iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["position", "vertexColor", "texCoord"]);

    for vertex in buffer.data().chunks(STRIDE as usize) {
        assert_eq!(vertex[0].abs(), 1.0);
        assert_eq!(vertex[1].abs(), 2.0);
        assert_eq!(vertex[2].abs(), 3.0);
        assert_eq!(&vertex[3..6], &[0.5, 0.25, 1.0]);
    }
}

#[test]
fn plane_lies_flat_and_tiles_its_texture() {
    let buffer =
        generate::plane(10.0, 4.0, Vector3::new(1.0, 1.0, 1.0), Vector2::new(5.0, 2.0)).unwrap();

    assert_eq!(buffer.vertex_count(), 6);
    let data = buffer.data();
    assert!(data.chunks(STRIDE as usize).all(|v| v[1] == 0.0));
    let max_u = data
        .chunks(STRIDE as usize)
        .map(|v| v[6])
        .fold(f32::MIN, f32::max);
    assert_eq!(max_u, 5.0);
}

#[test]
fn indexed_quad_shares_its_corners() {
    let mesh: Mesh =
        generate::indexed_quad("quad", 1.0, 1.0, Vector3::new(1.0, 0.0, 0.0), Vector2::new(1.0, 1.0))
            .unwrap();

    assert_eq!(mesh.vertex_count(), 4);
    assert_eq!(mesh.indices(), Some(&[0u16, 1, 2, 0, 2, 3][..]));
    assert_eq!(mesh.index_count(), 6);
    assert_eq!(mesh.topology(), Topology::Triangles);
}

#[test]
fn decodes_encoded_images_into_rgba() {
    let texture = texture_from_bytes("gradient", &png(3, 2), None).unwrap();

    assert_eq!((texture.width(), texture.height()), (3, 2));
    assert_eq!(texture.source_format(), TextureFormat::Rgba8);
    let pixels = texture.pixels().unwrap();
    assert_eq!(pixels.len(), 3 * 2 * 4);
    // pixel (1, 1)
    assert_eq!(&pixels[16..20], &[100, 100, 7, 255]);
}

#[test]
fn format_hint_selects_the_decoder() {
    assert!(texture_from_bytes("hinted", &png(1, 1), Some("png")).is_ok());
    assert!(texture_from_bytes("wrong", &png(1, 1), Some("jpg")).is_err());
    assert!(texture_from_bytes("unknown", &png(1, 1), Some("nope")).is_err());
}

#[test]
fn load_texture_reads_files() {
    let path = std::env::temp_dir().join(format!("scene-ngin-{}.png", std::process::id()));
    std::fs::write(&path, png(4, 4)).unwrap();

    let texture = load_texture(&path);
    std::fs::remove_file(&path).unwrap();

    assert_eq!(texture.unwrap().width(), 4);
}

#[test]
fn missing_files_fall_back_with_a_diagnostic() {
    let mut diagnostics = DiagnosticLog::new();

    let texture = load_texture_or_fallback("does/not/exist.png", &mut diagnostics);

    assert!(texture.is_fallback());
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics.lines()[0].contains("exist.png"));
}
