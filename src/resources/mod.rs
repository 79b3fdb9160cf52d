/**
 * Everything that turns external data or parameters into engine resources:
 * image files into textures and dimensions into ready-made meshes.
 */
pub mod generate;
pub mod texture;
