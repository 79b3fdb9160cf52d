//! scene-ngin
//!
//! A small scene-graph renderer that sits on top of an immediate-mode
//! graphics API. Scenes are trees of objects carrying a transform and shared
//! meshes, textures, materials and shaders; the renderer walks the tree once
//! per frame and issues uniform uploads and draw calls.
//!
//! High-level modules
//! - `gpu`: the `GraphicsApi` command surface, a headless recording device and
//!   (feature `wgpu-backend`) a wgpu implementation
//! - `data_structures`: meshes, textures, shaders, transforms and the scene graph
//! - `render`: the per-frame traversal and the uniform name contract
//! - `resources`: procedural geometry and image loading
//! - `config`, `diagnostics`: renderer settings and the render-time problem log
//!

pub mod config;
pub mod data_structures;
pub mod diagnostics;
pub mod gpu;
pub mod render;
pub mod resources;

pub use cgmath;

/// Initialises `env_logger` once, honouring `RUST_LOG`. Later calls are no-ops.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(cfg!(test))
        .try_init();
}
