//! Instance-wide settings.
//!
//! [`Settings`] gathers the switches that steer context merging and layout
//! application. It deserializes from YAML so applications can keep it next to
//! their templates:
//!
//! ```rust
//! use stencil::Settings;
//!
//! let settings = Settings::from_yaml(r#"
//! prefer_locals: true
//! default_layout: base
//! layout_delims:
//!   open: "<%"
//!   close: "%>"
//! "#).unwrap();
//!
//! assert!(settings.prefer_locals);
//! assert_eq!(settings.default_layout.as_deref(), Some("base"));
//! assert_eq!(settings.layout_delims.open, "<%");
//! ```

use serde::{Deserialize, Serialize};

use crate::context::MergeOrder;
use crate::error::Result;
use crate::layout::BodyTag;

/// Opening and closing delimiters around the layout body tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delims {
    pub open: String,
    pub close: String,
}

impl Delims {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }
}

impl Default for Delims {
    fn default() -> Self {
        Self::new("{{", "}}")
    }
}

/// Settings shared by every render on a [`Stencil`](crate::Stencil).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Let locals override front-matter data instead of the reverse.
    pub prefer_locals: bool,

    /// Flatten every partial collection into one `partials` object.
    ///
    /// When disabled, each partial collection is exposed under its own
    /// plural name.
    pub merge_partials: bool,

    /// Name of the body tag inside layouts (`{{ body }}`).
    pub layout_tag: String,

    /// Delimiters around the body tag.
    pub layout_delims: Delims,

    /// Layout used when a layout pointer is `true`.
    pub default_layout: Option<String>,

    /// Engine extension used when nothing else selects one.
    pub default_engine: String,

    /// Normalize whitespace in rendered output.
    pub pretty: bool,

    /// Explicit merge order, overriding the one derived from `prefer_locals`.
    pub merge_order: Option<MergeOrder>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prefer_locals: false,
            merge_partials: true,
            layout_tag: "body".to_string(),
            layout_delims: Delims::default(),
            default_layout: None,
            default_engine: ".jinja".to_string(),
            pretty: false,
            merge_order: None,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses settings from YAML. Missing keys keep their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn with_prefer_locals(mut self, enabled: bool) -> Self {
        self.prefer_locals = enabled;
        self
    }

    pub fn with_merge_partials(mut self, enabled: bool) -> Self {
        self.merge_partials = enabled;
        self
    }

    pub fn with_layout_tag(mut self, tag: impl Into<String>) -> Self {
        self.layout_tag = tag.into();
        self
    }

    pub fn with_layout_delims(mut self, delims: Delims) -> Self {
        self.layout_delims = delims;
        self
    }

    pub fn with_default_layout(mut self, name: impl Into<String>) -> Self {
        self.default_layout = Some(name.into());
        self
    }

    pub fn with_default_engine(mut self, ext: impl Into<String>) -> Self {
        self.default_engine = ext.into();
        self
    }

    pub fn with_pretty(mut self, enabled: bool) -> Self {
        self.pretty = enabled;
        self
    }

    pub fn with_merge_order(mut self, order: MergeOrder) -> Self {
        self.merge_order = Some(order);
        self
    }

    /// The merge order in effect: the explicit one if set, otherwise the
    /// standard order flipped by `prefer_locals`.
    pub fn effective_merge_order(&self) -> MergeOrder {
        match &self.merge_order {
            Some(order) => order.clone(),
            None if self.prefer_locals => MergeOrder::prefer_locals(),
            None => MergeOrder::standard(),
        }
    }

    /// Builds the body tag matcher, using `delims` when given.
    pub fn body_tag(&self, delims: Option<&Delims>) -> BodyTag {
        BodyTag::new(&self.layout_tag, delims.unwrap_or(&self.layout_delims))
    }
}
