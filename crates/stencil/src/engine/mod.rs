//! Template engine abstraction.
//!
//! This module defines the [`Engine`] trait which lets stencil hand the final,
//! layout-wrapped content to different template backends, and the
//! [`EngineRegistry`] that maps file extensions to engines.
//!
//! Engines implement any subset of three capabilities:
//!
//! | Method        | Convention                                         |
//! |---------------|----------------------------------------------------|
//! | `render_sync` | Returns the rendered string                        |
//! | `render`      | Passes the result to a callback, possibly later    |
//! | `compile`     | Returns a reusable render function                 |
//!
//! Unimplemented capabilities answer with [`Error::EngineCapability`].
//! `render` falls back to `render_sync`, so a purely synchronous engine
//! serves both calling conventions.
//!
//! Two engines ship with the crate: [`MiniJinjaEngine`] (registered for
//! `.jinja`, `.j2`, `.html` and `.md`) and [`SimpleEngine`] (`.txt`).

mod jinja;
mod simple;

use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::util::normalize_ext;

pub use self::jinja::MiniJinjaEngine;
pub use self::simple::SimpleEngine;

/// Receives the outcome of an asynchronous render.
pub type RenderCallback = Box<dyn FnOnce(Result<String>) + Send + 'static>;

/// A compiled template, callable with a context.
pub type CompiledFn = Arc<dyn Fn(&Context) -> Result<String> + Send + Sync>;

static DEFAULT_OPTIONS: Lazy<EngineOptions> = Lazy::new(EngineOptions::default);

/// Engine-level options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Keep a final newline in the template source.
    pub keep_trailing_newline: bool,

    /// Engine-specific settings.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            keep_trailing_newline: true,
            extra: Map::new(),
        }
    }
}

/// A rendering backend.
pub trait Engine: Send + Sync {
    /// Name used in error messages and logs.
    fn name(&self) -> &str;

    /// Engine-level options, also passed to [`compile`](Self::compile) by
    /// the dispatcher.
    fn options(&self) -> &EngineOptions {
        &DEFAULT_OPTIONS
    }

    /// Renders `content` with `context` and returns the output.
    fn render_sync(&self, _content: &str, _context: &Context) -> Result<String> {
        Err(Error::capability(self.name(), "render_sync"))
    }

    /// Renders `content` and hands the result to `done`.
    ///
    /// The default calls [`render_sync`](Self::render_sync) and invokes
    /// `done` before returning. Engines doing real asynchronous work may
    /// invoke `done` later, from any thread.
    fn render(&self, content: String, context: Context, done: RenderCallback) {
        done(self.render_sync(&content, &context))
    }

    /// Compiles `content` into a reusable function.
    fn compile(&self, _content: &str, _options: &EngineOptions) -> Result<CompiledFn> {
        Err(Error::capability(self.name(), "compile"))
    }
}

/// Engines keyed by normalized extension.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: IndexMap<String, Arc<dyn Engine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in engines.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            &[".jinja", ".j2", ".html", ".md"],
            Arc::new(MiniJinjaEngine::new()),
        );
        registry.register(&[".txt"], Arc::new(SimpleEngine::new()));
        registry
    }

    /// Registers `engine` for every extension in `exts`. Extensions are
    /// normalized, so `"md"` and `".MD"` are the same key.
    pub fn register(&mut self, exts: &[&str], engine: Arc<dyn Engine>) {
        for ext in exts {
            let ext = normalize_ext(ext);
            if ext.is_empty() {
                continue;
            }
            tracing::debug!(ext = %ext, engine = %engine.name(), "registering engine");
            self.engines.insert(ext, Arc::clone(&engine));
        }
    }

    pub fn get(&self, ext: &str) -> Option<Arc<dyn Engine>> {
        self.engines.get(&normalize_ext(ext)).cloned()
    }

    pub fn contains(&self, ext: &str) -> bool {
        self.engines.contains_key(&normalize_ext(ext))
    }

    pub fn remove(&mut self, ext: &str) -> Option<Arc<dyn Engine>> {
        self.engines.shift_remove(&normalize_ext(ext))
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.engines.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.engines.iter().map(|(ext, e)| (ext, e.name())))
            .finish()
    }
}
