//! Append-only diagnostic log.
//!
//! Components that hit a non-fatal problem (an unlinked shader, a node without
//! a mesh, a texture that failed to load) record one line here instead of
//! failing. The log is owned by the application and handed to the renderer
//! through [`crate::render::RenderContext`]; every line is mirrored to the
//! `log` facade as a warning.

use std::fmt;

#[derive(Debug, Default, Clone)]
pub struct DiagnosticLog {
    lines: Vec<String>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.lines.push(message);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// All lines joined with newlines, each line terminated.
    pub fn contents(&self) -> String {
        self.to_string()
    }

    /// Hands the collected lines to the caller and starts over.
    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl fmt::Display for DiagnosticLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
