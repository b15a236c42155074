//! Template records and the collections that hold them.
//!
//! A [`Template`] is one renderable unit: a page, a partial or a layout. What
//! role it plays is decided by the [`Collection`] it is registered in, not by
//! the record itself, so the same struct serves every role.
//!
//! ## Record Shape
//!
//! | Field     | Meaning                                                   |
//! |-----------|-----------------------------------------------------------|
//! | `path`    | Identifier, also the default cache key and engine source  |
//! | `content` | Body text with front matter already stripped              |
//! | `locals`  | Call-time data                                            |
//! | `data`    | Front-matter or programmatic data                         |
//! | `options` | `layout`, `engine`, delimiters and free-form extras       |
//!
//! Records placed in a collection are never modified by rendering; every
//! render works on a clone.

pub mod collection;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::settings::Delims;
use crate::util::extension_of;

pub use collection::{Collection, Collections, ViewType};

/// Per-template options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateOptions {
    /// Start layout: a name, `true` for the default layout, `false` for none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Value>,

    /// Explicit engine extension, overriding the path extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,

    /// Body tag delimiters for this template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delims: Option<Delims>,

    /// Body tag delimiters used when this record wraps other content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_delims: Option<Delims>,

    /// Free-form options; visible to the context merge.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A template record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub path: String,

    /// Cache key; `path` is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    pub content: String,

    #[serde(default)]
    pub locals: Map<String, Value>,

    #[serde(default)]
    pub data: Map<String, Value>,

    #[serde(default)]
    pub options: TemplateOptions,
}

impl Template {
    /// Creates a record with empty locals, data and options.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: None,
            content: content.into(),
            locals: Map::new(),
            data: Map::new(),
            options: TemplateOptions::default(),
        }
    }

    /// Builds a record from untyped JSON, validating `path` and `content`.
    ///
    /// ```rust
    /// use stencil::Template;
    /// use serde_json::json;
    ///
    /// let tpl = Template::from_value(json!({"path": "a.md", "content": "b"})).unwrap();
    /// assert_eq!(tpl.content, "b");
    ///
    /// assert!(Template::from_value(json!({"path": "a.md", "content": 1})).is_err());
    /// ```
    pub fn from_value(value: Value) -> Result<Self> {
        const METHOD: &str = "Template::from_value";

        let Some(obj) = value.as_object() else {
            return Err(Error::validation(METHOD, "template", &value));
        };
        match obj.get("path") {
            Some(Value::String(path)) if !path.is_empty() => {}
            other => {
                return Err(Error::validation(
                    METHOD,
                    "path",
                    other.unwrap_or(&Value::Null),
                ))
            }
        }
        match obj.get("content") {
            Some(Value::String(_)) => {}
            other => {
                return Err(Error::validation(
                    METHOD,
                    "content",
                    other.unwrap_or(&Value::Null),
                ))
            }
        }

        Ok(serde_json::from_value(value)?)
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the start layout (`"name"`, `true` or `false`).
    pub fn with_layout(mut self, layout: impl Into<Value>) -> Self {
        self.options.layout = Some(layout.into());
        self
    }

    pub fn with_engine(mut self, ext: impl Into<String>) -> Self {
        self.options.engine = Some(ext.into());
        self
    }

    pub fn with_delims(mut self, delims: Delims) -> Self {
        self.options.delims = Some(delims);
        self
    }

    pub fn with_layout_delims(mut self, delims: Delims) -> Self {
        self.options.layout_delims = Some(delims);
        self
    }

    /// Replaces locals with the entries of a JSON object.
    pub fn with_locals(mut self, locals: Value) -> Self {
        self.locals = into_object("with_locals", locals);
        self
    }

    /// Replaces data with the entries of a JSON object.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = into_object("with_data", data);
        self
    }

    pub fn with_local(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.locals.insert(key.into(), value.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.extra.insert(key.into(), value.into());
        self
    }

    /// The cache key: explicit `key`, else `path`.
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.path)
    }

    /// Normalized extension of `path`.
    pub fn ext(&self) -> Option<String> {
        extension_of(&self.path)
    }

    /// The raw layout pointer: `options.layout`, then `data.layout`, then
    /// `locals.layout`.
    pub fn layout(&self) -> Option<&Value> {
        self.options
            .layout
            .as_ref()
            .or_else(|| self.data.get("layout"))
            .or_else(|| self.locals.get("layout"))
    }

    /// Delimiters for the body tag when this record wraps content.
    pub fn layout_delims(&self) -> Option<&Delims> {
        self.options
            .layout_delims
            .as_ref()
            .or(self.options.delims.as_ref())
    }

    /// Checks the invariants a record must hold before it is registered or
    /// rendered.
    pub fn validate(&self, method: &'static str) -> Result<()> {
        if self.path.is_empty() {
            return Err(Error::validation(method, "path", &Value::from("")));
        }
        Ok(())
    }

    /// Options serialized as a flat map, for the context merge.
    pub fn options_map(&self) -> Map<String, Value> {
        match serde_json::to_value(&self.options) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

fn into_object(method: &str, value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            tracing::warn!("{method}: ignoring non-object value {other}");
            Map::new()
        }
    }
}
