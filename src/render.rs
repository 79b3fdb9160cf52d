//! Per-frame scene traversal.
//!
//! [`Renderer`] walks the scene graph once per frame and turns it into
//! immediate-mode commands: it uploads the camera and light uniforms, then
//! for every node uploads the node's world transform, texture unit and
//! material and issues one draw call per node that has a mesh.
//!
//! # Failure handling
//!
//! Nothing in here fails. An unlinked shader skips the frame, a node without a
//! mesh is skipped together with its children; both record a line in the
//! [`DiagnosticLog`] of the [`RenderContext`].

use std::collections::BTreeSet;

use cgmath::{Matrix4, SquareMatrix};

use crate::{
    config::RendererConfig,
    data_structures::{
        camera::Camera,
        light::{GlobalLight, LocalLight},
        mesh::Mesh,
        scene::Scene,
        scene_graph::GameObject,
        shader::Shader,
    },
    diagnostics::DiagnosticLog,
    gpu::{GraphicsApi, ProgramId, VertexArrayId},
};

/// Uniform names shared between the renderer and every shader it draws with.
/// A shader that does not declare one of them simply does not receive it.
pub mod uniforms {
    pub const WORLD: &str = "world";
    pub const TEXTURE_UNIT: &str = "tex";
    pub const MATERIAL_AMBIENT_INTENSITY: &str = "materialAmbientIntensity";
    pub const MATERIAL_SPECULAR_INTENSITY: &str = "materialSpecularIntensity";
    pub const MATERIAL_SHININESS: &str = "materialShininess";
    pub const GLOBAL_LIGHT_POSITION: &str = "globalLightPosition";
    pub const GLOBAL_LIGHT_COLOR: &str = "globalLightColor";
    pub const GLOBAL_LIGHT_INTENSITY: &str = "globalLightIntensity";
    pub const LOCAL_LIGHT_POSITION: &str = "localLightPosition";
    pub const LOCAL_LIGHT_COLOR: &str = "localLightColor";
    pub const LOCAL_LIGHT_INTENSITY: &str = "localLightIntensity";
    pub const LOCAL_LIGHT_ATTENUATION_COEF: &str = "localLightAttenuationCoef";
    pub const VIEW: &str = "view";
    pub const PROJECTION: &str = "projection";
    pub const VIEW_POSITION: &str = "viewPosition";
}

/// What the renderer needs from the application for one call: the device to
/// talk to and the log to report problems to.
pub struct RenderContext<'a> {
    pub api: &'a mut dyn GraphicsApi,
    pub diagnostics: &'a mut DiagnosticLog,
}

impl<'a> RenderContext<'a> {
    pub fn new(api: &'a mut dyn GraphicsApi, diagnostics: &'a mut DiagnosticLog) -> Self {
        Self { api, diagnostics }
    }
}

/// Per-frame uniforms: sent once to every program used during the frame.
#[derive(Clone, Copy, Default)]
struct FrameUniforms<'s> {
    camera: Option<&'s Camera>,
    global_light: Option<&'s GlobalLight>,
    local_light: Option<&'s LocalLight>,
}

impl FrameUniforms<'_> {
    fn upload(&self, api: &mut dyn GraphicsApi, shader: &Shader) {
        if let Some(camera) = self.camera {
            shader.set_uniform(api, uniforms::VIEW, camera.view);
            shader.set_uniform(api, uniforms::PROJECTION, camera.projection);
            shader.set_uniform(api, uniforms::VIEW_POSITION, camera.position);
        }
        if let Some(light) = self.global_light {
            shader.set_uniform(api, uniforms::GLOBAL_LIGHT_POSITION, light.position);
            shader.set_uniform(api, uniforms::GLOBAL_LIGHT_COLOR, light.color);
            shader.set_uniform(api, uniforms::GLOBAL_LIGHT_INTENSITY, light.intensity);
        }
        if let Some(light) = self.local_light {
            shader.set_uniform(api, uniforms::LOCAL_LIGHT_POSITION, light.position);
            shader.set_uniform(api, uniforms::LOCAL_LIGHT_COLOR, light.color);
            shader.set_uniform(api, uniforms::LOCAL_LIGHT_INTENSITY, light.intensity);
            shader.set_uniform(
                api,
                uniforms::LOCAL_LIGHT_ATTENUATION_COEF,
                light.attenuation_coef,
            );
        }
    }
}

/// Explicit traversal stack entries, so scene depth never touches the call stack.
enum Step<'n> {
    Enter {
        node: &'n GameObject,
        parent: Matrix4<f32>,
        depth: usize,
    },
    Leave(&'n Mesh),
}

/// A program used during the frame and how many misses it had before.
struct UsedShader<'s> {
    shader: &'s Shader,
    unresolved_before: usize,
}

impl<'s> UsedShader<'s> {
    fn new(shader: &'s Shader) -> Self {
        Self {
            shader,
            unresolved_before: shader.unresolved_uniforms().len(),
        }
    }
}

/// Binding state tracked across one traversal.
struct Traversal<'s> {
    frame: FrameUniforms<'s>,
    current: Option<ProgramId>,
    used: Vec<UsedShader<'s>>,
    texture_units: BTreeSet<u32>,
}

impl<'s> Traversal<'s> {
    fn new(frame: FrameUniforms<'s>, shader: &'s Shader) -> Self {
        Self {
            frame,
            current: shader.program(),
            used: vec![UsedShader::new(shader)],
            texture_units: BTreeSet::new(),
        }
    }

    /// Switches the device to `shader` if a different program is in use and
    /// sends it the frame uniforms the first time it is seen.
    fn activate(&mut self, api: &mut dyn GraphicsApi, shader: &'s Shader) {
        let program = shader.program();
        if program == self.current {
            return;
        }
        shader.use_program(api);
        self.current = program;
        if program.is_some() && !self.used.iter().any(|u| u.shader.program() == program) {
            self.used.push(UsedShader::new(shader));
            self.frame.upload(api, shader);
        }
    }

    /// Names looked up this frame that the shader using them does not declare.
    fn new_misses(&self) -> impl Iterator<Item = String> + '_ {
        self.used.iter().flat_map(|used| {
            used.shader
                .unresolved_uniforms()
                .into_iter()
                .skip(used.unresolved_before)
        })
    }
}

pub struct Renderer {
    vertex_array: VertexArrayId,
    config: RendererConfig,
}

impl Renderer {
    /// Creates the renderer's vertex array and applies the configured clear colour.
    pub fn new(api: &mut dyn GraphicsApi, config: RendererConfig) -> Self {
        api.set_clear_color(config.clear_color);
        Self {
            vertex_array: api.create_vertex_array(),
            config,
        }
    }

    pub fn vertex_array(&self) -> VertexArrayId {
        self.vertex_array
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /**
     * Creates the GPU buffers of every mesh in the scene, children included.
     * Meshes shared by several nodes are allocated once.
     *
     * Returns how many meshes were allocated by this call.
     */
    pub fn static_allocate_buffers(&self, ctx: &mut RenderContext, scene: &Scene) -> usize {
        ctx.api.bind_vertex_array(Some(self.vertex_array));
        let mut allocated = 0;
        let mut stack: Vec<&GameObject> = scene.objects().iter().rev().collect();
        while let Some(node) = stack.pop() {
            if let Some(mesh) = node.mesh() {
                if !mesh.is_allocated() {
                    mesh.static_allocate(ctx.api);
                    allocated += 1;
                }
            }
            stack.extend(node.children().iter().rev());
        }
        ctx.api.bind_vertex_array(None);
        log::debug!("statically allocated {allocated} meshes");
        allocated
    }

    /**
     * Draws `object` and its subtree with `shader`, placing it under
     * `parent_world`.
     *
     * Per node, in order: the world transform is uploaded, nodes without a
     * mesh are reported and skipped along with their children, the mesh is
     * bound, the texture is bound to its unit and the unit sent to `"tex"`,
     * the material is sent, one draw is issued, the children are drawn and
     * finally the mesh is unbound.
     *
     * The caller is responsible for the program and vertex array being bound;
     * [`Renderer::render_scene`] does that.
     */
    pub fn render_object(
        &self,
        ctx: &mut RenderContext,
        shader: &Shader,
        object: &GameObject,
        parent_world: &Matrix4<f32>,
    ) {
        let mut traversal = Traversal::new(FrameUniforms::default(), shader);
        self.traverse(ctx, shader, object, parent_world, &mut traversal);
        self.finish(ctx, &mut traversal);
    }

    /// Draws the whole scene. Does nothing but log if `shader` is not linked.
    pub fn render_scene(
        &self,
        ctx: &mut RenderContext,
        scene: &Scene,
        shader: &Shader,
        camera: &Camera,
    ) {
        if !shader.is_created() {
            ctx.diagnostics
                .log("shader program is not linked, skipping frame");
            return;
        }
        shader.use_program(ctx.api);
        ctx.api.bind_vertex_array(Some(self.vertex_array));

        let frame = FrameUniforms {
            camera: Some(camera),
            global_light: scene.global_light(),
            local_light: scene.local_light(),
        };
        let mut traversal = Traversal::new(frame, shader);
        frame.upload(ctx.api, shader);

        let identity = Matrix4::identity();
        for object in scene.objects() {
            self.traverse(ctx, shader, object, &identity, &mut traversal);
        }

        self.finish(ctx, &mut traversal);
        ctx.api.use_program(None);
        ctx.api.bind_vertex_array(None);
    }

    fn traverse<'s>(
        &self,
        ctx: &mut RenderContext,
        frame_shader: &'s Shader,
        root: &'s GameObject,
        parent_world: &Matrix4<f32>,
        traversal: &mut Traversal<'s>,
    ) {
        let mut stack = vec![Step::Enter {
            node: root,
            parent: *parent_world,
            depth: 0,
        }];
        while let Some(step) = stack.pop() {
            let (node, parent, depth) = match step {
                Step::Leave(mesh) => {
                    mesh.unbind(ctx.api);
                    continue;
                }
                Step::Enter {
                    node,
                    parent,
                    depth,
                } => (node, parent, depth),
            };
            if depth > self.config.max_depth {
                ctx.diagnostics.log(format!(
                    "object {:?} is nested deeper than {} levels, skipping it",
                    node.name(),
                    self.config.max_depth
                ));
                continue;
            }

            let shader = match node.shader() {
                Some(own) if own.is_created() => own.as_ref(),
                _ => frame_shader,
            };
            traversal.activate(ctx.api, shader);

            let world = node.update_global(&parent);
            shader.set_uniform(ctx.api, uniforms::WORLD, world);

            let Some(mesh) = node.mesh() else {
                ctx.diagnostics.log(format!(
                    "object {:?} has no mesh, skipping it and its children",
                    node.name()
                ));
                continue;
            };
            mesh.bind(ctx.api);

            if let Some(texture) = node.texture() {
                match texture.bind(ctx.api) {
                    Ok(()) => {
                        traversal.texture_units.insert(texture.texture_unit());
                        shader.set_uniform(
                            ctx.api,
                            uniforms::TEXTURE_UNIT,
                            texture.texture_unit() as i32,
                        );
                    }
                    Err(e) => ctx.diagnostics.log(format!(
                        "texture {:?} of object {:?} could not be bound: {e:#}",
                        texture.label(),
                        node.name()
                    )),
                }
            }

            if let Some(material) = node.material() {
                shader.set_uniform(
                    ctx.api,
                    uniforms::MATERIAL_AMBIENT_INTENSITY,
                    material.ambient_intensity,
                );
                shader.set_uniform(
                    ctx.api,
                    uniforms::MATERIAL_SPECULAR_INTENSITY,
                    material.specular_intensity,
                );
                shader.set_uniform(ctx.api, uniforms::MATERIAL_SHININESS, material.shininess);
            }

            mesh.draw(ctx.api);

            stack.push(Step::Leave(mesh.as_ref()));
            stack.extend(node.children().iter().rev().map(|child| Step::Enter {
                node: child,
                parent: world,
                depth: depth + 1,
            }));
        }
    }

    /// Releases the texture units the traversal bound and, in strict mode,
    /// reports the uniforms its shaders lacked.
    fn finish(&self, ctx: &mut RenderContext, traversal: &mut Traversal) {
        for unit in std::mem::take(&mut traversal.texture_units) {
            ctx.api.bind_texture(unit, None);
        }
        if self.config.strict_uniforms {
            for name in traversal.new_misses() {
                ctx.diagnostics
                    .log(format!("uniform {name:?} is not declared by the shader"));
            }
        }
    }
}
