//! Renderer settings.

use std::env;

use anyhow::Context as _;

pub const STRICT_UNIFORMS_ENV: &str = "SCENE_NGIN_STRICT_UNIFORMS";
pub const MAX_DEPTH_ENV: &str = "SCENE_NGIN_MAX_DEPTH";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererConfig {
    /// Report uniform names a shader does not declare instead of ignoring them.
    pub strict_uniforms: bool,
    /// Nodes nested deeper than this are not rendered.
    pub max_depth: usize,
    /// Clear colour that `Renderer::new` sets on the device.
    pub clear_color: [f64; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            strict_uniforms: false,
            max_depth: 64,
            clear_color: [0.1, 0.2, 0.3, 1.0],
        }
    }
}

impl RendererConfig {
    /// Defaults overridden by `SCENE_NGIN_STRICT_UNIFORMS` (`1`/`true`/`0`/`false`)
    /// and `SCENE_NGIN_MAX_DEPTH`.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Ok(strict) = env::var(STRICT_UNIFORMS_ENV) {
            config.strict_uniforms = parse_flag(&strict)
                .with_context(|| format!("invalid value for {STRICT_UNIFORMS_ENV}"))?;
        }
        if let Ok(depth) = env::var(MAX_DEPTH_ENV) {
            config.max_depth = depth
                .trim()
                .parse()
                .with_context(|| format!("invalid value for {MAX_DEPTH_ENV}: {depth:?}"))?;
        }
        Ok(config)
    }

    pub fn with_strict_uniforms(mut self, strict: bool) -> Self {
        self.strict_uniforms = strict;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

fn parse_flag(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {other:?}"),
    }
}
