//! Engine data structures: geometry, textures, shaders and the scene graph.
//!
//! - `vertex_buffer` and `mesh` hold drawable geometry
//! - `texture` wraps GPU images and their sampling state
//! - `shader` owns linked programs and the uniform upload surface
//! - `transform` is the local transform of a node
//! - `scene_graph` is the node hierarchy, `scene` the roots plus lights
//! - `material`, `light`, `camera` are the plain values the renderer reads
//! - `behavior` animates nodes between frames

pub mod behavior;
pub mod camera;
pub mod light;
pub mod material;
pub mod mesh;
pub mod scene;
pub mod scene_graph;
pub mod shader;
pub mod texture;
pub mod transform;
pub mod vertex_buffer;
