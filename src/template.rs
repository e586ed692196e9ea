//! `{{name}}` placeholder rendering.
//!
//! Step URLs, JSON bodies and variable rules are rendered from the worker's current
//! variables right before each use. Rendering uses [`minijinja`](https://docs.rs/minijinja/)
//! with Jinja defaults: an unknown variable renders as an empty string, and a
//! template without placeholders comes back unchanged.

use minijinja::Environment;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::GanderError;

/// A scenario's variable set: name to current value.
pub type Variables = BTreeMap<String, Value>;

/// Renders templates against a [`Variables`] set.
pub struct Renderer {
    environment: Environment<'static>,
}
impl Default for Renderer {
    fn default() -> Self {
        Renderer::new()
    }
}
impl Renderer {
    pub fn new() -> Self {
        let mut environment = Environment::new();
        // Rendering must never alter text outside placeholders.
        environment.set_keep_trailing_newline(true);
        Renderer { environment }
    }

    /// Render a string template.
    pub fn render(&self, template: &str, variables: &Variables) -> Result<String, GanderError> {
        // Skip the template engine entirely when there's nothing to substitute.
        if !template.contains("{{") && !template.contains("{%") && !template.contains("{#") {
            return Ok(template.to_string());
        }
        Ok(self.environment.render_str(template, variables)?)
    }

    /// Render every string inside a JSON value by rendering its serialized form,
    /// then parse the result back into JSON.
    pub fn render_json(&self, template: &Value, variables: &Variables) -> Result<Value, GanderError> {
        let source = serde_json::to_string(template)?;
        let rendered = self.render(&source, variables)?;
        Ok(serde_json::from_str(&rendered)?)
    }
}
