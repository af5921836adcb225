// ABOUTME: Immutable, named, parsed script template backed by handlebars
// ABOUTME: Parsing happens once at load time and rendering is a pure function of its input

use handlebars::Handlebars;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use super::error::{Result, TemplateError};
use super::helpers;

/// A parsed script template.
///
/// Cloning is cheap and every clone refers to the same parsed template, so the
/// store can hand out copies without giving anyone a mutable handle. Rendering
/// runs in strict mode: a field referenced by the template but absent from the
/// data is a render error rather than an empty string.
#[derive(Clone)]
pub struct ScriptTemplate {
    name: Arc<str>,
    handlebars: Arc<Handlebars<'static>>,
}

impl ScriptTemplate {
    /// Parse a template from source text
    pub fn parse(name: impl Into<String>, source: &str) -> Result<Self> {
        let name: String = name.into();
        let mut handlebars = Handlebars::new();

        handlebars.set_strict_mode(true);
        handlebars.set_dev_mode(false);

        // Scripts, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        helpers::register_helpers(&mut handlebars);

        handlebars
            .register_template_string(&name, source)
            .map_err(|e| TemplateError::SyntaxError {
                name: name.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            name: name.into(),
            handlebars: Arc::new(handlebars),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render the script body from serializable data
    pub fn render<T: Serialize>(&self, data: &T) -> Result<String> {
        self.handlebars
            .render(&self.name, data)
            .map_err(|source| TemplateError::RenderError {
                name: self.name.to_string(),
                source,
            })
    }

    /// Whether both handles point at the same parsed template
    pub fn ptr_eq(&self, other: &ScriptTemplate) -> bool {
        Arc::ptr_eq(&self.handlebars, &other.handlebars)
    }
}

impl fmt::Debug for ScriptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptTemplate")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_substitutes_fields() {
        let template = ScriptTemplate::parse("greet", "echo {{name}} on {{port}}").unwrap();
        let script = template
            .render(&json!({ "name": "node-1", "port": "22" }))
            .unwrap();
        assert_eq!(script, "echo node-1 on 22");
    }

    #[test]
    fn test_render_does_not_escape_shell_characters() {
        let template = ScriptTemplate::parse("redirect", "echo {{line}}").unwrap();
        let script = template.render(&json!({ "line": "a > b && c" })).unwrap();
        assert_eq!(script, "echo a > b && c");
    }

    #[test]
    fn test_missing_field_is_a_render_error() {
        let template = ScriptTemplate::parse("strict", "curl {{endpoint}}").unwrap();
        let err = template.render(&json!({})).unwrap_err();
        assert!(matches!(err, TemplateError::RenderError { ref name, .. } if name == "strict"));
    }

    #[test]
    fn test_flag_toggles_section() {
        let template =
            ScriptTemplate::parse("flag", "base\n{{#if enabled}}extra\n{{/if}}done").unwrap();

        let on = template.render(&json!({ "enabled": true })).unwrap();
        let off = template.render(&json!({ "enabled": false })).unwrap();

        assert!(on.contains("extra"));
        assert!(!off.contains("extra"));
    }

    #[test]
    fn test_syntax_error_is_reported_at_parse_time() {
        let err = ScriptTemplate::parse("broken", "echo {{#if x}}a{{/each}}").unwrap_err();
        assert!(matches!(err, TemplateError::SyntaxError { .. }));
    }

    #[test]
    fn test_clones_share_the_parsed_template() {
        let template = ScriptTemplate::parse("shared", "").unwrap();
        let copy = template.clone();
        let other = ScriptTemplate::parse("shared", "").unwrap();

        assert!(template.ptr_eq(&copy));
        assert!(!template.ptr_eq(&other));
    }
}
