//! GPU textures and their sampling configuration.
//!
//! A [`Texture`] keeps its pixel data on the CPU until [`Texture::upload`] is
//! called. Textures are shared between nodes through `Rc`, so the mutable
//! parts (sampling state, texture unit, GPU id) live in cells.

use std::cell::{Cell, OnceCell};

use anyhow::{Result, ensure};

use crate::gpu::{
    FilterMode, GraphicsApi, SamplerState, TextureDescriptor, TextureFormat, TextureId, WrapMode,
};

#[derive(Debug)]
pub struct Texture {
    label: String,
    width: u32,
    height: u32,
    internal_format: TextureFormat,
    source_format: TextureFormat,
    pixels: Option<Vec<u8>>,
    is_fallback: bool,
    sampler: Cell<SamplerState>,
    sampler_dirty: Cell<bool>,
    unit: Cell<u32>,
    id: OnceCell<TextureId>,
}

impl Texture {
    /// A texture backed by raw pixel data laid out row by row in `format`.
    pub fn from_pixels(
        label: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
        pixels: Vec<u8>,
    ) -> Result<Self> {
        ensure!(width > 0 && height > 0, "texture {label:?} has an empty size");
        if let Some(bpp) = format.bytes_per_texel() {
            let expected = width as usize * height as usize * bpp as usize;
            ensure!(
                pixels.len() == expected,
                "texture {label:?}: {width}x{height} {format:?} needs {expected} bytes, got {}",
                pixels.len()
            );
        }
        Ok(Self::with_storage(label, width, height, format, Some(pixels)))
    }

    /// Storage without content, e.g. a colour or depth attachment.
    pub fn render_target(label: &str, width: u32, height: u32, format: TextureFormat) -> Self {
        Self::with_storage(label, width.max(1), height.max(1), format, None)
    }

    /// A 2x2 magenta/black checkerboard used when a texture could not be loaded.
    pub fn fallback() -> Self {
        let magenta = [255, 0, 255, 255];
        let black = [0, 0, 0, 255];
        let pixels = [magenta, black, black, magenta].concat();
        let mut texture =
            Self::with_storage("fallback", 2, 2, TextureFormat::Rgba8, Some(pixels));
        texture.is_fallback = true;
        texture
    }

    fn with_storage(
        label: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
        pixels: Option<Vec<u8>>,
    ) -> Self {
        Self {
            label: label.to_string(),
            width,
            height,
            internal_format: format,
            source_format: format,
            pixels,
            is_fallback: false,
            sampler: Cell::new(SamplerState::default()),
            sampler_dirty: Cell::new(false),
            unit: Cell::new(0),
            id: OnceCell::new(),
        }
    }

    /// Stores the pixels on the GPU in `format` while keeping the source format.
    pub fn with_internal_format(mut self, format: TextureFormat) -> Self {
        self.internal_format = format;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn internal_format(&self) -> TextureFormat {
        self.internal_format
    }

    pub fn source_format(&self) -> TextureFormat {
        self.source_format
    }

    pub fn pixels(&self) -> Option<&[u8]> {
        self.pixels.as_deref()
    }

    pub fn is_fallback(&self) -> bool {
        self.is_fallback
    }

    pub fn is_render_target(&self) -> bool {
        self.pixels.is_none()
    }

    /// GPU id, once uploaded.
    pub fn id(&self) -> Option<TextureId> {
        self.id.get().copied()
    }

    pub fn is_uploaded(&self) -> bool {
        self.id.get().is_some()
    }

    pub fn sampler(&self) -> SamplerState {
        self.sampler.get()
    }

    pub fn texture_unit(&self) -> u32 {
        self.unit.get()
    }

    pub fn set_texture_unit(&self, unit: u32) {
        self.unit.set(unit);
    }

    pub fn set_min_filter(&self, filter: FilterMode) {
        self.update_sampler(|s| s.min_filter = filter);
    }

    pub fn set_mag_filter(&self, filter: FilterMode) {
        self.update_sampler(|s| s.mag_filter = filter);
    }

    pub fn set_wrap_u(&self, wrap: WrapMode) {
        self.update_sampler(|s| s.wrap_u = wrap);
    }

    pub fn set_wrap_v(&self, wrap: WrapMode) {
        self.update_sampler(|s| s.wrap_v = wrap);
    }

    fn update_sampler(&self, change: impl FnOnce(&mut SamplerState)) {
        let mut sampler = self.sampler.get();
        change(&mut sampler);
        self.sampler.set(sampler);
        self.sampler_dirty.set(self.is_uploaded());
    }

    /**
     * Pushes the current filter and wrap modes to the GPU right away.
     * Changes made after upload are otherwise sent by the next
     * [`Texture::bind`], changes made before it by [`Texture::upload`].
     */
    pub fn apply_sampler(&self, api: &mut dyn GraphicsApi) {
        if let Some(id) = self.id() {
            api.set_sampler_state(id, self.sampler.get());
            self.sampler_dirty.set(false);
        }
    }

    /// Whether sampling changes are waiting to be sent to the GPU.
    pub fn has_pending_sampler(&self) -> bool {
        self.sampler_dirty.get()
    }

    pub fn descriptor(&self) -> TextureDescriptor {
        TextureDescriptor {
            width: self.width,
            height: self.height,
            internal_format: self.internal_format,
            source_format: self.source_format,
        }
    }

    /// Sends the pixel data (or reserves storage) and the sampling state to
    /// the GPU. Calling it again replaces the GPU content.
    pub fn upload(&self, api: &mut dyn GraphicsApi) -> Result<TextureId> {
        let id = *self.id.get_or_init(|| api.create_texture());
        api.upload_texture(id, &self.descriptor(), self.pixels.as_deref())?;
        api.set_sampler_state(id, self.sampler.get());
        self.sampler_dirty.set(false);
        log::debug!(
            "uploaded texture {:?} ({}x{} {:?})",
            self.label,
            self.width,
            self.height,
            self.internal_format
        );
        Ok(id)
    }

    /// Binds the texture to its unit, uploading it first if needed.
    pub fn bind(&self, api: &mut dyn GraphicsApi) -> Result<()> {
        let id = match self.id() {
            Some(id) => id,
            None => self.upload(api)?,
        };
        if self.sampler_dirty.get() {
            self.apply_sampler(api);
        }
        api.bind_texture(self.unit.get(), Some(id));
        Ok(())
    }

    pub fn unbind(&self, api: &mut dyn GraphicsApi) {
        api.bind_texture(self.unit.get(), None);
    }
}
