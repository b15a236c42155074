//! # Stencil - Template Collections, Layouts and Layered Contexts
//!
//! `stencil` organizes templates into named collections, wraps them in chains
//! of layouts, builds a render context from several precedence-ordered data
//! sources, and hands the result to a pluggable template engine.
//!
//! ## Core Concepts
//!
//! - [`Template`]: a record with a path, content, locals, front-matter data
//!   and options
//! - [`Collection`]: a named set of templates classified as renderable,
//!   layout or partial ([`ViewType`])
//! - Layouts: templates with a body tag (`{{ body }}`) that wrap other
//!   content; a layout may itself point at a parent layout
//! - Partials: fragments exposed to every render under `partials`
//! - [`Context`]: the merged data for one render, see [`context`]
//! - [`Engine`]: the backend that turns content plus context into output
//!
//! ## Quick Start
//!
//! ```rust
//! use stencil::{Stencil, Template};
//! use serde_json::json;
//!
//! let mut stencil = Stencil::new();
//! stencil.data(json!({"site": "Docs"})).unwrap();
//!
//! stencil.layout("base", "<title>{{ site }}</title>\n{{ body }}", None).unwrap();
//! stencil.layout("post", "<article>{{ body }}</article>", Some("base")).unwrap();
//! stencil
//!     .add_view("partials", Template::new("byline", "by {{ author }}"))
//!     .unwrap();
//! stencil
//!     .add_view(
//!         "pages",
//!         Template::new("hello.md", "Hello {% include \"byline\" %}")
//!             .with_layout("post")
//!             .with_data(json!({"author": "Ada"})),
//!     )
//!     .unwrap();
//!
//! let out = stencil.render_sync("hello.md", None).unwrap();
//! assert_eq!(out, "<title>Docs</title>\n<article>Hello by Ada</article>");
//! ```
//!
//! ## Front Matter
//!
//! Templates registered with [`Stencil::add_view_parsed`] have YAML front
//! matter moved into their data:
//!
//! ```rust
//! use stencil::{Stencil, Template};
//!
//! let mut stencil = Stencil::new();
//! stencil.layout("base", "[{{ body }}]", None).unwrap();
//! stencil
//!     .add_view_parsed("pages", Template::new("a.md", "---\nlayout: base\ntitle: A\n---\n{{ title }}"))
//!     .unwrap();
//!
//! assert_eq!(stencil.render_sync("a.md", None).unwrap(), "[A]");
//! ```
//!
//! ## Settings
//!
//! [`Settings`] can be built in code or loaded from YAML:
//!
//! ```rust
//! use stencil::{Settings, Stencil};
//!
//! let settings = Settings::from_yaml("prefer_locals: true\nmerge_partials: false\n").unwrap();
//! let stencil = Stencil::with_settings(settings);
//! assert!(stencil.settings().prefer_locals);
//! ```

pub mod context;
pub mod engine;
mod error;
pub mod layout;
pub mod parser;
pub mod partials;
pub mod prelude;
pub mod render;
mod settings;
mod stencil;
pub mod template;
mod util;

pub use error::{Error, Result};

pub use settings::{Delims, Settings};

pub use stencil::Stencil;

pub use template::{Collection, Collections, Template, TemplateOptions, ViewType};

pub use context::{Context, ContextFn, ContextSource, MergeOrder};

pub use partials::{PartialSet, PartialsFn};

pub use layout::{BodyTag, LayoutRegistry, LayoutStack};

pub use engine::{
    CompiledFn, Engine, EngineOptions, EngineRegistry, MiniJinjaEngine, RenderCallback,
    SimpleEngine,
};

pub use parser::{FrontMatterParser, Parser, ParserRegistry};

pub use render::{Compiled, RenderEachCallback, Target};

pub use util::{normalize_ext, prettify};
