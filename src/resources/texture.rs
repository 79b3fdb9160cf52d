//! Loading textures from image files.

use std::path::Path;

use anyhow::{Context, Result};
use image::{GenericImageView, ImageFormat, load_from_memory_with_format};

use crate::{
    data_structures::texture::Texture, diagnostics::DiagnosticLog, gpu::TextureFormat,
};

pub fn load_binary(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    std::fs::read(path).with_context(|| format!("could not read {}", path.display()))
}

/**
 * Decodes an encoded image (PNG, JPEG, ...) into an RGBA8 texture.
 *
 * `format` is a file extension used to pick the decoder; when absent the
 * format is guessed from the content.
 */
pub fn texture_from_bytes(label: &str, bytes: &[u8], format: Option<&str>) -> Result<Texture> {
    let img = match format {
        None => image::load_from_memory(bytes),
        Some(ext) => {
            let format = ImageFormat::from_extension(ext)
                .with_context(|| format!("unknown image format {ext:?} for {label:?}"))?;
            load_from_memory_with_format(bytes, format)
        }
    }
    .with_context(|| format!("could not decode image {label:?}"))?;

    let (width, height) = img.dimensions();
    let rgba = img.to_rgba8();
    Texture::from_pixels(label, width, height, TextureFormat::Rgba8, rgba.into_raw())
}

pub fn load_texture(path: impl AsRef<Path>) -> Result<Texture> {
    let path = path.as_ref();
    let bytes = load_binary(path)?;
    let format = path.extension().and_then(|ext| ext.to_str());
    texture_from_bytes(&path.to_string_lossy(), &bytes, format)
}

/// Like [`load_texture`], but any failure yields the fallback checkerboard and
/// one diagnostic line.
pub fn load_texture_or_fallback(path: impl AsRef<Path>, diagnostics: &mut DiagnosticLog) -> Texture {
    let path = path.as_ref();
    match load_texture(path) {
        Ok(texture) => texture,
        Err(e) => {
            diagnostics.log(format!(
                "using fallback texture for {}: {e:#}",
                path.display()
            ));
            Texture::fallback()
        }
    }
}
