// ABOUTME: Handlebars helper functions available to every script template
// ABOUTME: Only pure helpers are registered so rendering stays deterministic

use handlebars::{Context, Handlebars, Helper, Output, RenderContext, RenderError};
use serde_json::Value;

/// `{{join ", " master_ips}}` renders a list of scalars with a separator.
///
/// Numbers and booleans are written as-is, nested values are rejected.
pub fn join_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    let (separator, items) = match (h.param(0), h.param(1)) {
        (Some(sep), Some(items)) => (sep.value(), items.value()),
        _ => return Err(RenderError::new("join expects a separator and a list")),
    };

    let separator = separator
        .as_str()
        .ok_or_else(|| RenderError::new("join separator must be a string"))?;
    let items = items
        .as_array()
        .ok_or_else(|| RenderError::new("join expects a list as its second argument"))?;

    let mut rendered = Vec::with_capacity(items.len());
    for item in items {
        rendered.push(scalar_text(item).ok_or_else(|| {
            RenderError::new(format!("join cannot render list element {}", item))
        })?);
    }

    out.write(&rendered.join(separator))?;
    Ok(())
}

/// Shell quote helper - wraps a value in single quotes for POSIX shells
pub fn shell_quote_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    let input = h
        .param(0)
        .and_then(|v| scalar_text(v.value()))
        .ok_or_else(|| RenderError::new("shell_quote needs a scalar value"))?;

    out.write(&shell_quote(&input))?;
    Ok(())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn shell_quote(input: &str) -> String {
    format!("'{}'", input.replace('\'', r"'\''"))
}

/// Register all helpers on a handlebars registry
pub fn register_helpers(handlebars: &mut Handlebars) {
    handlebars.register_helper("join", Box::new(join_helper));
    handlebars.register_helper("shell_quote", Box::new(shell_quote_helper));
}

#[cfg(test)]
mod tests {
    use super::*;
    use handlebars::Handlebars;
    use serde_json::json;

    fn create_test_handlebars() -> Handlebars<'static> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        register_helpers(&mut handlebars);
        handlebars
    }

    #[test]
    fn test_join_addresses() {
        let handlebars = create_test_handlebars();
        let result = handlebars
            .render_template(
                "{{join \", \" master_ips}}",
                &json!({ "master_ips": ["10.0.0.1", "10.0.0.2"] }),
            )
            .unwrap();
        assert_eq!(result, "10.0.0.1, 10.0.0.2");

        let empty = handlebars
            .render_template("[{{join \",\" master_ips}}]", &json!({ "master_ips": [] }))
            .unwrap();
        assert_eq!(empty, "[]");
    }

    #[test]
    fn test_join_scalars_and_rejects_nested() {
        let handlebars = create_test_handlebars();
        let ports = handlebars
            .render_template("{{join \" \" ports}}", &json!({ "ports": [80, 443] }))
            .unwrap();
        assert_eq!(ports, "80 443");

        let nested = handlebars.render_template(
            "{{join \",\" nodes}}",
            &json!({ "nodes": [{ "id": "m1" }] }),
        );
        assert!(nested.is_err());
    }

    #[test]
    fn test_shell_quote_helper() {
        let handlebars = create_test_handlebars();
        let quoted = handlebars
            .render_template("{{shell_quote value}}", &json!({ "value": "it's here" }))
            .unwrap();
        assert_eq!(quoted, r"'it'\''s here'");

        let number = handlebars
            .render_template("{{shell_quote port}}", &json!({ "port": 30900 }))
            .unwrap();
        assert_eq!(number, "'30900'");
    }
}
