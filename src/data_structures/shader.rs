//! Shader programs and named uniform uploads.

use std::{
    cell::{OnceCell, RefCell},
    collections::HashMap,
};

use anyhow::{Context, Result};

use crate::gpu::{GraphicsApi, ProgramId, UniformLocation, UniformValue};

/// A vertex + fragment program with a lazily filled uniform location cache.
///
/// Until [`Shader::create`] succeeds the program is unlinked and the renderer
/// refuses to draw with it.
#[derive(Debug)]
pub struct Shader {
    vertex_source: String,
    fragment_source: String,
    program: OnceCell<ProgramId>,
    locations: RefCell<HashMap<String, Option<UniformLocation>>>,
    unresolved: RefCell<Vec<String>>,
}

impl Shader {
    pub fn new(vertex_source: impl Into<String>, fragment_source: impl Into<String>) -> Self {
        Self {
            vertex_source: vertex_source.into(),
            fragment_source: fragment_source.into(),
            program: OnceCell::new(),
            locations: RefCell::new(HashMap::new()),
            unresolved: RefCell::new(Vec::new()),
        }
    }

    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    /// Compiles and links the program. Does nothing if it is already linked.
    pub fn create(&self, api: &mut dyn GraphicsApi) -> Result<ProgramId> {
        if let Some(program) = self.program.get() {
            return Ok(*program);
        }
        let program = api
            .create_program(&self.vertex_source, &self.fragment_source)
            .context("failed to create shader program")?;
        log::debug!("linked shader program {:?}", program);
        Ok(*self.program.get_or_init(|| program))
    }

    pub fn is_created(&self) -> bool {
        self.program.get().is_some()
    }

    pub fn program(&self) -> Option<ProgramId> {
        self.program.get().copied()
    }

    pub fn use_program(&self, api: &mut dyn GraphicsApi) {
        api.use_program(self.program());
    }

    /// Location of `name`, resolved through the device on first use and
    /// cached afterwards. Misses are cached as well.
    pub fn uniform_location(
        &self,
        api: &mut dyn GraphicsApi,
        name: &str,
    ) -> Option<UniformLocation> {
        let program = self.program()?;
        if let Some(location) = self.locations.borrow().get(name) {
            return *location;
        }
        let location = api.uniform_location(program, name);
        if location.is_none() {
            log::debug!("uniform {name:?} is not declared by program {program:?}");
            self.unresolved.borrow_mut().push(name.to_string());
        }
        self.locations
            .borrow_mut()
            .insert(name.to_string(), location);
        location
    }

    /// The cached location of `name` without asking the device.
    pub fn cached_location(&self, name: &str) -> Option<Option<UniformLocation>> {
        self.locations.borrow().get(name).copied()
    }

    /// Names that were looked up but are not declared by the program.
    pub fn unresolved_uniforms(&self) -> Vec<String> {
        self.unresolved.borrow().clone()
    }

    /// Uploads `value` to `name`. Unknown names are ignored; returns whether
    /// the value was sent.
    pub fn set_uniform(
        &self,
        api: &mut dyn GraphicsApi,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> bool {
        let (Some(program), Some(location)) = (self.program(), self.uniform_location(api, name))
        else {
            return false;
        };
        api.set_uniform(program, location, value.into());
        true
    }
}
