//! A scene: the root objects and the lights they are lit by.

use cgmath::{Matrix4, SquareMatrix};

use crate::data_structures::{
    light::{GlobalLight, LocalLight},
    scene_graph::GameObject,
};

#[derive(Debug, Default)]
pub struct Scene {
    objects: Vec<GameObject>,
    global_light: Option<GlobalLight>,
    local_light: Option<LocalLight>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, object: GameObject) {
        self.objects.push(object);
    }

    pub fn objects(&self) -> &[GameObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut Vec<GameObject> {
        &mut self.objects
    }

    /// First node called `name`, searching the roots in order.
    pub fn find(&self, name: &str) -> Option<&GameObject> {
        self.objects.iter().find_map(|object| object.find(name))
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut GameObject> {
        self.objects
            .iter_mut()
            .find_map(|object| object.find_mut(name))
    }

    pub fn global_light(&self) -> Option<&GlobalLight> {
        self.global_light.as_ref()
    }

    pub fn set_global_light(&mut self, light: Option<GlobalLight>) {
        self.global_light = light;
    }

    pub fn local_light(&self) -> Option<&LocalLight> {
        self.local_light.as_ref()
    }

    pub fn set_local_light(&mut self, light: Option<LocalLight>) {
        self.local_light = light;
    }

    /// Recomputes the global transform of every node from the roots down.
    pub fn update_transforms(&self) {
        let identity = Matrix4::identity();
        for object in &self.objects {
            object.update_transforms(&identity);
        }
    }

    /// Advances every node's behavior.
    pub fn update(&mut self, elapsed_seconds: f64) {
        for object in &mut self.objects {
            object.update(elapsed_seconds);
        }
    }

    pub fn reset_behaviors(&mut self) {
        for object in &mut self.objects {
            object.reset_behaviors();
        }
    }

    pub fn node_count(&self) -> usize {
        self.objects.iter().map(GameObject::node_count).sum()
    }
}
