use scene_ngin::{
    data_structures::texture::Texture,
    gpu::{FilterMode, SamplerState, TextureFormat, WrapMode, headless::HeadlessApi},
};

fn checker() -> Texture {
    Texture::from_pixels("checker", 2, 1, TextureFormat::Rgb8, vec![255, 0, 0, 0, 255, 0]).unwrap()
}

#[test]
fn pixel_data_must_match_the_size() {
    assert!(Texture::from_pixels("short", 2, 2, TextureFormat::Rgba8, vec![0; 15]).is_err());
    assert!(Texture::from_pixels("empty", 0, 2, TextureFormat::Rgba8, vec![]).is_err());
    assert!(Texture::from_pixels("ok", 2, 2, TextureFormat::Rgba8, vec![0; 16]).is_ok());
}

#[test]
fn upload_creates_the_gpu_texture_once() {
    let mut api = HeadlessApi::new();
    let texture = checker();
    assert!(!texture.is_uploaded());

    let first = texture.upload(&mut api).unwrap();
    let second = texture.upload(&mut api).unwrap();

    assert_eq!(first, second);
    assert_eq!(api.texture_uploads(first), 2);
    let descriptor = api.texture_descriptor(first).unwrap();
    assert_eq!((descriptor.width, descriptor.height), (2, 1));
    assert_eq!(descriptor.source_format, TextureFormat::Rgb8);
}

#[test]
fn internal_format_can_differ_from_the_source() {
    let mut api = HeadlessApi::new();
    let texture = checker().with_internal_format(TextureFormat::Srgb8Alpha8);

    let id = texture.upload(&mut api).unwrap();

    let descriptor = api.texture_descriptor(id).unwrap();
    assert_eq!(descriptor.internal_format, TextureFormat::Srgb8Alpha8);
    assert_eq!(descriptor.source_format, TextureFormat::Rgb8);
}

#[test]
fn sampler_changes_before_upload_are_applied_by_upload() {
    let mut api = HeadlessApi::new();
    let texture = checker();
    texture.set_min_filter(FilterMode::LinearMipmapLinear);
    texture.set_wrap_u(WrapMode::ClampToEdge);

    let id = texture.upload(&mut api).unwrap();

    let sampler = api.sampler_state(id).unwrap();
    assert_eq!(sampler.min_filter, FilterMode::LinearMipmapLinear);
    assert_eq!(sampler.wrap_u, WrapMode::ClampToEdge);
    assert_eq!(sampler.wrap_v, WrapMode::Repeat);
}

#[test]
fn sampler_changes_after_upload_reach_the_gpu_on_bind() {
    let mut api = HeadlessApi::new();
    let texture = checker();
    let id = texture.upload(&mut api).unwrap();
    assert!(!texture.has_pending_sampler());

    texture.set_mag_filter(FilterMode::Linear);
    texture.set_wrap_u(WrapMode::ClampToEdge);
    assert!(texture.has_pending_sampler());

    texture.bind(&mut api).unwrap();
    let sampler = api.sampler_state(id).unwrap();
    assert_eq!(sampler.mag_filter, FilterMode::Linear);
    assert_eq!(sampler.wrap_u, WrapMode::ClampToEdge);
    assert!(!texture.has_pending_sampler());
}

#[test]
fn apply_sampler_pushes_changes_without_a_bind() {
    let mut api = HeadlessApi::new();
    let texture = checker();
    let id = texture.upload(&mut api).unwrap();

    texture.set_wrap_v(WrapMode::MirroredRepeat);
    assert_eq!(api.sampler_state(id), Some(SamplerState::default()));

    texture.apply_sampler(&mut api);
    assert_eq!(api.sampler_state(id).unwrap().wrap_v, WrapMode::MirroredRepeat);
    assert!(!texture.has_pending_sampler());
}

#[test]
fn bind_uploads_on_first_use() {
    let mut api = HeadlessApi::new();
    let texture = checker();
    texture.set_texture_unit(3);

    texture.bind(&mut api).unwrap();

    assert!(texture.is_uploaded());
    assert_eq!(api.texture_binding(3), texture.id());
    texture.unbind(&mut api);
    assert_eq!(api.texture_binding(3), None);
}

#[test]
fn render_targets_reserve_storage_only() {
    let mut api = HeadlessApi::new();
    let target = Texture::render_target("shadow", 512, 512, TextureFormat::DepthComponent24);

    let id = target.upload(&mut api).unwrap();

    assert!(target.is_render_target());
    assert!(target.pixels().is_none());
    assert_eq!(api.texture_descriptor(id).unwrap().width, 512);
}

#[test]
fn fallback_is_a_small_checkerboard() {
    let fallback = Texture::fallback();

    assert!(fallback.is_fallback());
    assert_eq!((fallback.width(), fallback.height()), (2, 2));
    let pixels = fallback.pixels().unwrap();
    assert_eq!(&pixels[0..4], &[255, 0, 255, 255]);
    assert_eq!(&pixels[4..8], &[0, 0, 0, 255]);
}
