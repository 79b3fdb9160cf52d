//! Scene graph nodes.
//!
//! A [`GameObject`] is one transformable entity. It exclusively owns its
//! children and holds shared (`Rc`) handles to the resources it is drawn with,
//! since the same mesh, texture or shader is commonly reused by many nodes.
//!
//! The global transform of a node is `parent global * local` and is
//! recomputed top-down on every traversal. Nodes marked static keep the first
//! global transform they were given.

use std::{
    cell::Cell,
    fmt,
    rc::Rc,
};

use cgmath::{Matrix4, SquareMatrix};

use crate::data_structures::{
    behavior::Behavior, material::Material, mesh::Mesh, shader::Shader, texture::Texture,
    transform::Transform,
};

pub struct GameObject {
    name: String,
    local: Transform,
    global: Cell<Matrix4<f32>>,
    is_static: bool,
    frozen: Cell<bool>,
    children: Vec<GameObject>,
    mesh: Option<Rc<Mesh>>,
    material: Option<Rc<Material>>,
    texture: Option<Rc<Texture>>,
    shader: Option<Rc<Shader>>,
    behavior: Option<Box<dyn Behavior>>,
}

impl GameObject {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            local: Transform::new(),
            global: Cell::new(Matrix4::identity()),
            is_static: false,
            frozen: Cell::new(false),
            children: Vec::new(),
            mesh: None,
            material: None,
            texture: None,
            shader: None,
            behavior: None,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.local = transform;
        self
    }

    pub fn with_mesh(mut self, mesh: Rc<Mesh>) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn with_material(mut self, material: Rc<Material>) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_texture(mut self, texture: Rc<Texture>) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn with_shader(mut self, shader: Rc<Shader>) -> Self {
        self.shader = Some(shader);
        self
    }

    pub fn with_behavior(mut self, behavior: impl Behavior + 'static) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }

    pub fn with_child(mut self, child: GameObject) -> Self {
        self.children.push(child);
        self
    }

    /// Static nodes compute their global transform once and keep it.
    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_transform(&self) -> &Transform {
        &self.local
    }

    pub fn local_transform_mut(&mut self) -> &mut Transform {
        &mut self.local
    }

    pub fn set_local_transform(&mut self, transform: Transform) {
        self.local = transform;
    }

    /// The global transform computed by the last traversal.
    pub fn global_reference_frame(&self) -> Matrix4<f32> {
        self.global.get()
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn mesh(&self) -> Option<&Rc<Mesh>> {
        self.mesh.as_ref()
    }

    pub fn material(&self) -> Option<&Rc<Material>> {
        self.material.as_ref()
    }

    pub fn texture(&self) -> Option<&Rc<Texture>> {
        self.texture.as_ref()
    }

    pub fn shader(&self) -> Option<&Rc<Shader>> {
        self.shader.as_ref()
    }

    pub fn set_mesh(&mut self, mesh: Option<Rc<Mesh>>) {
        self.mesh = mesh;
    }

    pub fn set_material(&mut self, material: Option<Rc<Material>>) {
        self.material = material;
    }

    pub fn set_texture(&mut self, texture: Option<Rc<Texture>>) {
        self.texture = texture;
    }

    pub fn set_shader(&mut self, shader: Option<Rc<Shader>>) {
        self.shader = shader;
    }

    pub fn set_behavior(&mut self, behavior: Option<Box<dyn Behavior>>) {
        self.behavior = behavior;
    }

    pub fn children(&self) -> &[GameObject] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<GameObject> {
        &mut self.children
    }

    pub fn add_child(&mut self, child: GameObject) {
        self.children.push(child);
    }

    /// Recomputes the global transform as `parent * local` and returns it.
    pub fn update_global(&self, parent: &Matrix4<f32>) -> Matrix4<f32> {
        if self.is_static && self.frozen.get() {
            return self.global.get();
        }
        let global = *parent * self.local.to_matrix();
        self.global.set(global);
        self.frozen.set(self.is_static);
        global
    }

    /// Recomputes the global transforms of this node and its whole subtree.
    pub fn update_transforms(&self, parent: &Matrix4<f32>) {
        let mut stack = vec![(self, *parent)];
        while let Some((node, parent)) = stack.pop() {
            let global = node.update_global(&parent);
            stack.extend(node.children.iter().rev().map(|child| (child, global)));
        }
    }

    /// Runs the behaviors of this node and of every descendant.
    pub fn update(&mut self, elapsed_seconds: f64) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            let GameObject {
                local,
                behavior,
                children,
                ..
            } = node;
            if let Some(behavior) = behavior {
                behavior.update(local, elapsed_seconds);
            }
            stack.extend(children.iter_mut());
        }
    }

    /// Resets the behaviors of this node and of every descendant.
    pub fn reset_behaviors(&mut self) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if let Some(behavior) = node.behavior.as_mut() {
                behavior.reset();
            }
            stack.extend(node.children.iter_mut());
        }
    }

    /// Depth-first, pre-order search of this subtree.
    pub fn find(&self, name: &str) -> Option<&GameObject> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.name == name {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut GameObject> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.name == name {
                return Some(node);
            }
            stack.extend(node.children.iter_mut().rev());
        }
        None
    }

    /// Number of nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

// Children are flattened into a work list so deep chains never recurse.
impl Drop for GameObject {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

impl fmt::Debug for GameObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameObject")
            .field("name", &self.name)
            .field("local", &self.local)
            .field("is_static", &self.is_static)
            .field("mesh", &self.mesh.as_ref().map(|m| m.name().to_string()))
            .field("material", &self.material)
            .field("texture", &self.texture.as_ref().map(|t| t.label().to_string()))
            .field("has_shader", &self.shader.is_some())
            .field("has_behavior", &self.behavior.is_some())
            .field("children", &self.children)
            .finish()
    }
}
