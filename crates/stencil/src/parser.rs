//! Front-matter parsing.
//!
//! A [`Parser`] turns raw template text into a record: it moves leading
//! metadata into [`Template::data`] and strips it from the content. Parsers
//! run when a template is registered through
//! [`Stencil::add_view_parsed`](crate::Stencil::add_view_parsed), selected by
//! the template's path extension.
//!
//! [`FrontMatterParser`] handles YAML between `---` fences:
//!
//! ```text
//! ---
//! title: Hello
//! layout: base
//! ---
//! # {{ title }}
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::template::Template;
use crate::util::{extend, normalize_ext};

const FENCE: &str = "---";

/// Extracts metadata from a template's content.
pub trait Parser: Send + Sync {
    /// Moves metadata from `template.content` into `template.data`.
    fn parse(&self, template: &mut Template) -> Result<()>;
}

/// YAML front matter between `---` fences.
///
/// Content without an opening fence on its first line is left untouched.
/// An opening fence with no closing fence is not front matter either.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrontMatterParser;

impl FrontMatterParser {
    pub fn new() -> Self {
        Self
    }

    /// Splits `content` into `(front matter, body)`.
    pub fn split(content: &str) -> Option<(&str, &str)> {
        let rest = content.strip_prefix('\u{feff}').unwrap_or(content);
        let first_end = rest.find('\n')?;
        if rest[..first_end].trim_end() != FENCE {
            return None;
        }
        let after_open = &rest[first_end + 1..];

        let mut offset = 0;
        for line in after_open.split_inclusive('\n') {
            if line.trim_end() == FENCE {
                let matter = &after_open[..offset];
                let body = &after_open[offset + line.len()..];
                return Some((matter, body));
            }
            offset += line.len();
        }
        None
    }
}

impl Parser for FrontMatterParser {
    fn parse(&self, template: &mut Template) -> Result<()> {
        let Some((matter, body)) = Self::split(&template.content) else {
            return Ok(());
        };

        let parsed: Value = if matter.trim().is_empty() {
            Value::Null
        } else {
            serde_yaml::from_str(matter)?
        };
        let data = match parsed {
            Value::Object(map) => map,
            Value::Null => Default::default(),
            other => return Err(Error::validation("FrontMatterParser::parse", "front matter", &other)),
        };

        tracing::trace!(path = %template.path, keys = data.len(), "parsed front matter");
        extend(&mut template.data, &data);
        template.content = body.to_string();
        Ok(())
    }
}

/// Parsers keyed by normalized extension.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: IndexMap<String, Arc<dyn Parser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Front matter for the extensions the default engines handle.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let front_matter: Arc<dyn Parser> = Arc::new(FrontMatterParser);
        for ext in [".md", ".html", ".jinja", ".j2"] {
            registry.register(ext, Arc::clone(&front_matter));
        }
        registry
    }

    pub fn register(&mut self, ext: &str, parser: Arc<dyn Parser>) {
        let ext = normalize_ext(ext);
        if !ext.is_empty() {
            self.parsers.insert(ext, parser);
        }
    }

    pub fn get(&self, ext: &str) -> Option<Arc<dyn Parser>> {
        self.parsers.get(&normalize_ext(ext)).cloned()
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.parsers.keys()).finish()
    }
}
