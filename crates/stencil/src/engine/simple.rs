//! Format-string style substitution engine.
//!
//! [`SimpleEngine`] replaces `{variable}` placeholders and nothing else. It is
//! registered for `.txt` by default.
//!
//! # Syntax
//!
//! - `{name}` - variable substitution
//! - `{user.name}` - nested property access via dot notation
//! - `{items.0}` - array index access
//! - `{{` and `}}` - escaped braces (render as `{` and `}`)
//!
//! Partials are plain data here: with merged partials, `{partials.header}`
//! inserts the header partial's content verbatim.
//!
//! # Example
//!
//! ```rust
//! use stencil::{Context, Engine, SimpleEngine};
//! use serde_json::json;
//!
//! let data = json!({"name": "World", "user": {"email": "test@example.com"}});
//! let ctx = Context::new(data.as_object().unwrap().clone());
//!
//! let output = SimpleEngine::new()
//!     .render_sync("Hello, {name}! Contact: {user.email}", &ctx)
//!     .unwrap();
//! assert_eq!(output, "Hello, World! Contact: test@example.com");
//! ```
//!
//! The engine has no compile step; [`Stencil::compile`](crate::Stencil::compile)
//! on a `.txt` template reports [`Error::EngineCapability`](crate::Error::EngineCapability).

use serde_json::Value;

use super::Engine;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::util::get_path;

/// A lightweight engine using `{variable}` substitution.
///
/// Loops, conditionals, filters and includes are not supported; Jinja-style
/// tags pass through with their doubled braces unescaped.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleEngine;

impl SimpleEngine {
    pub fn new() -> Self {
        Self
    }

    fn format_value(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => String::new(),
            Value::Array(_) | Value::Object(_) => value.to_string(),
        }
    }
}

impl Engine for SimpleEngine {
    fn name(&self) -> &str {
        "simple"
    }

    fn render_sync(&self, content: &str, context: &Context) -> Result<String> {
        let mut result = String::with_capacity(content.len());
        let mut chars = content.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    result.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        name.push(inner);
                    }

                    if !closed {
                        return Err(Error::Engine(format!(
                            "unclosed variable substitution: {{{}",
                            name
                        )));
                    }
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(Error::Engine("empty variable name in template".into()));
                    }

                    match get_path(context.data(), name) {
                        Some(value) => result.push_str(&Self::format_value(value)),
                        None => {
                            // Left in place so missing data is visible in the output.
                            result.push('{');
                            result.push_str(name);
                            result.push('}');
                        }
                    }
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    result.push('}');
                }
                _ => result.push(ch),
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineOptions;
    use serde_json::json;

    fn render(template: &str, data: Value) -> Result<String> {
        let ctx = match data {
            Value::Object(map) => Context::new(map),
            _ => Context::default(),
        };
        SimpleEngine::new().render_sync(template, &ctx)
    }

    #[test]
    fn test_simple_substitution() {
        let output = render("Hello, {name}!", json!({"name": "World"})).unwrap();
        assert_eq!(output, "Hello, World!");
    }

    #[test]
    fn test_nested_access() {
        let data = json!({
            "user": {
                "name": "Alice",
                "profile": {"email": "alice@example.com"}
            }
        });
        let output = render("Name: {user.name}, Email: {user.profile.email}", data).unwrap();
        assert_eq!(output, "Name: Alice, Email: alice@example.com");
    }

    #[test]
    fn test_array_index() {
        let data = json!({"users": [{"name": "Alice"}, {"name": "Bob"}]});
        let output = render("{users.0.name} and {users.1.name}", data).unwrap();
        assert_eq!(output, "Alice and Bob");
    }

    #[test]
    fn test_scalar_values() {
        let data = json!({"count": 42, "active": true, "none": null});
        let output = render("{count} {active} [{none}]", data).unwrap();
        assert_eq!(output, "42 true []");
    }

    #[test]
    fn test_escaped_braces() {
        let output = render("Use {{name}} for {name}", json!({"name": "test"})).unwrap();
        assert_eq!(output, "Use {name} for test");
    }

    #[test]
    fn test_missing_variable_is_left_in_place() {
        let output = render("Hello {missing}!", json!({})).unwrap();
        assert_eq!(output, "Hello {missing}!");
    }

    #[test]
    fn test_unclosed_variable() {
        let err = render("Hello {name", json!({})).unwrap_err();
        assert!(matches!(err, Error::Engine(_)));
        assert!(err.to_string().contains("unclosed"));
    }

    #[test]
    fn test_empty_variable_name() {
        let err = render("Hello { }!", json!({})).unwrap_err();
        assert!(err.to_string().contains("empty variable"));
    }

    #[test]
    fn test_partials_as_data() {
        let output = render(
            "{partials.header}\nbody",
            json!({"partials": {"header": "== Title =="}}),
        )
        .unwrap();
        assert_eq!(output, "== Title ==\nbody");
    }

    #[test]
    fn test_no_template_logic() {
        let output = render("{% for i in items %}{{i}}{% endfor %}", json!({})).unwrap();
        assert_eq!(output, "{% for i in items %}{i}{% endfor %}");
    }

    #[test]
    fn test_no_compile_support() {
        let err = SimpleEngine::new()
            .compile("{x}", &EngineOptions::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::EngineCapability {
                method: "compile",
                ..
            }
        ));
    }
}
