//! The [`Stencil`] instance: collections, engines, parsers, global data and
//! settings for one rendering setup.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::context::ContextFn;
use crate::engine::{Engine, EngineRegistry};
use crate::error::{Error, Result};
use crate::parser::{Parser, ParserRegistry};
use crate::partials::PartialsFn;
use crate::settings::Settings;
use crate::template::{Collection, Collections, Template, ViewType};
use crate::util::{extend, get_path, set_path};

/// A template rendering instance.
///
/// Owns every registry a render consults. Registration takes `&mut self`;
/// rendering takes `&self` and never modifies a registered record, so a
/// configured instance can be shared behind an `Arc`.
///
/// # Example
///
/// ```rust
/// use stencil::{Stencil, Template};
/// use serde_json::json;
///
/// let mut stencil = Stencil::new();
/// stencil.layout("base", "<main>{{ body }}</main>", None).unwrap();
/// stencil
///     .add_view("pages", Template::new("home.jinja", "Hi {{ name }}").with_layout("base"))
///     .unwrap();
///
/// let out = stencil.render_sync("home.jinja", json!({"name": "you"}).as_object()).unwrap();
/// assert_eq!(out, "<main>Hi you</main>");
/// ```
pub struct Stencil {
    pub(crate) settings: Settings,
    pub(crate) collections: Collections,
    pub(crate) engines: EngineRegistry,
    pub(crate) parsers: ParserRegistry,
    /// Global data, the lowest-precedence context source.
    pub(crate) data: Map<String, Value>,
    pub(crate) context_fn: Option<ContextFn>,
    pub(crate) partials_fn: Option<PartialsFn>,
}

impl Stencil {
    /// Creates an instance with default settings, the `pages`, `layouts` and
    /// `partials` collections and the built-in engines and parsers.
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            collections: Collections::with_defaults(),
            engines: EngineRegistry::with_defaults(),
            parsers: ParserRegistry::with_defaults(),
            data: Map::new(),
            context_fn: None,
            partials_fn: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    // ---- collections ----

    /// Creates a collection, or re-classifies an existing one.
    ///
    /// An empty `types` slice classifies the collection as renderable.
    pub fn create(
        &mut self,
        singular: impl Into<String>,
        plural: impl Into<String>,
        types: &[ViewType],
    ) -> &mut Collection {
        self.collections.create(singular, plural, types)
    }

    /// Registers a template in a collection, by singular or plural name.
    /// A later registration under the same key replaces the earlier one.
    pub fn add_view(&mut self, collection: &str, template: Template) -> Result<()> {
        tracing::debug!(collection = %collection, key = %template.key(), "adding view");
        self.collections.add(collection, template)
    }

    /// Like [`add_view`](Self::add_view), first running the parser registered
    /// for the template's extension.
    pub fn add_view_parsed(&mut self, collection: &str, mut template: Template) -> Result<()> {
        let ext = template
            .options
            .engine
            .clone()
            .or_else(|| template.ext());
        if let Some(parser) = ext.as_deref().and_then(|ext| self.parsers.get(ext)) {
            parser.parse(&mut template)?;
        }
        self.add_view(collection, template)
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    pub fn collections(&self) -> &Collections {
        &self.collections
    }

    pub fn get_view(&self, collection: &str, key: &str) -> Option<&Template> {
        self.collections.get_view(collection, key)
    }

    /// Plural names of every collection with the given classification.
    pub fn view_types(&self, view_type: ViewType) -> Vec<&str> {
        self.collections.view_types(view_type)
    }

    // ---- layouts ----

    /// Registers a layout in `layouts`, optionally pointing at a parent.
    pub fn layout(
        &mut self,
        name: &str,
        content: impl Into<String>,
        parent: Option<&str>,
    ) -> Result<()> {
        let mut layout = Template::new(name, content);
        if let Some(parent) = parent {
            layout = layout.with_layout(parent);
        }
        self.add_view("layouts", layout)
    }

    /// Registers a layout carrying its own data.
    ///
    /// `data` must be a JSON object. Its entries are merged under the page
    /// context when the layout wraps a page, and a `layout` entry names the
    /// parent layout.
    pub fn layout_with_data(
        &mut self,
        name: &str,
        content: impl Into<String>,
        data: Value,
    ) -> Result<()> {
        match data {
            Value::Object(map) => {
                let mut layout = Template::new(name, content);
                layout.data = map;
                self.add_view("layouts", layout)
            }
            other => Err(Error::validation("Stencil::layout_with_data", "data", &other)),
        }
    }

    /// Registers several layouts at once, keyed by map key.
    pub fn layouts(&mut self, layouts: IndexMap<String, Template>) -> Result<()> {
        for (name, layout) in layouts {
            let layout = if layout.key() == name {
                layout
            } else {
                layout.with_key(name)
            };
            self.add_view("layouts", layout)?;
        }
        Ok(())
    }

    // ---- global data ----

    /// Merges the entries of a JSON object into the global data.
    pub fn data(&mut self, value: Value) -> Result<&mut Self> {
        match value {
            Value::Object(map) => {
                extend(&mut self.data, &map);
                Ok(self)
            }
            other => Err(Error::validation("Stencil::data", "data", &other)),
        }
    }

    /// Sets a dotted path (`site.title`) in the global data.
    pub fn set_data(&mut self, path: &str, value: impl Into<Value>) -> &mut Self {
        set_path(&mut self.data, path, value.into());
        self
    }

    /// Reads a dotted path from the global data.
    pub fn get_data(&self, path: &str) -> Option<&Value> {
        get_path(&self.data, path)
    }

    pub fn global_data(&self) -> &Map<String, Value> {
        &self.data
    }

    // ---- engines and parsers ----

    /// Registers `engine` for each extension in `exts`.
    pub fn engine<E>(&mut self, exts: &[&str], engine: E) -> &mut Self
    where
        E: Engine + 'static,
    {
        self.engines.register(exts, Arc::new(engine));
        self
    }

    pub fn get_engine(&self, ext: &str) -> Option<Arc<dyn Engine>> {
        self.engines.get(ext)
    }

    /// Registers `parser` for an extension, replacing any previous one.
    pub fn parser<P>(&mut self, ext: &str, parser: P) -> &mut Self
    where
        P: Parser + 'static,
    {
        self.parsers.register(ext, Arc::new(parser));
        self
    }

    // ---- overrides ----

    /// Replaces the whole context merge. The closure receives the template
    /// and the call-time locals; its result is used verbatim.
    pub fn set_context_fn<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Template, &Map<String, Value>) -> Map<String, Value> + Send + Sync + 'static,
    {
        self.context_fn = Some(Arc::new(f));
        self
    }

    /// Replaces the partials step of the context merge.
    pub fn set_partials_fn<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Map<String, Value>) -> Map<String, Value> + Send + Sync + 'static,
    {
        self.partials_fn = Some(Arc::new(f));
        self
    }
}

impl Default for Stencil {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Stencil {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stencil")
            .field("settings", &self.settings)
            .field("collections", &self.collections)
            .field("engines", &self.engines)
            .field("parsers", &self.parsers)
            .field("data", &self.data)
            .field("context_fn", &self.context_fn.is_some())
            .field("partials_fn", &self.partials_fn.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stencil_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Stencil>();
    }

    #[test]
    fn data_merges_objects() {
        let mut stencil = Stencil::new();
        stencil.data(json!({"a": 1, "b": 1})).unwrap();
        stencil.data(json!({"b": 2})).unwrap();
        assert_eq!(stencil.get_data("a"), Some(&json!(1)));
        assert_eq!(stencil.get_data("b"), Some(&json!(2)));
    }

    #[test]
    fn data_rejects_non_objects() {
        let mut stencil = Stencil::new();
        let err = stencil.data(json!([1, 2])).err().unwrap();
        assert!(matches!(
            err,
            Error::Validation {
                method: "Stencil::data",
                ..
            }
        ));
    }

    #[test]
    fn dotted_data_paths() {
        let mut stencil = Stencil::new();
        stencil.set_data("site.author.name", "Ada");
        assert_eq!(stencil.get_data("site.author.name"), Some(&json!("Ada")));
        assert_eq!(stencil.get_data("site.author"), Some(&json!({"name": "Ada"})));
        assert!(stencil.get_data("site.missing").is_none());
    }

    #[test]
    fn add_view_to_unknown_collection() {
        let mut stencil = Stencil::new();
        let err = stencil
            .add_view("posts", Template::new("a.md", ""))
            .unwrap_err();
        assert!(matches!(err, Error::CollectionNotFound { .. }));
    }

    #[test]
    fn add_view_parsed_strips_front_matter() {
        let mut stencil = Stencil::new();
        stencil
            .add_view_parsed("pages", Template::new("a.md", "---\ntitle: T\n---\nbody"))
            .unwrap();
        let tpl = stencil.get_view("pages", "a.md").unwrap();
        assert_eq!(tpl.content, "body");
        assert_eq!(tpl.data.get("title"), Some(&json!("T")));
    }

    #[test]
    fn add_view_parsed_without_parser_keeps_content() {
        let mut stencil = Stencil::new();
        stencil
            .add_view_parsed("pages", Template::new("a.txt", "---\nk: v\n---\n"))
            .unwrap();
        assert_eq!(stencil.get_view("page", "a.txt").unwrap().content, "---\nk: v\n---\n");
    }

    #[test]
    fn layout_with_parent() {
        let mut stencil = Stencil::new();
        stencil.layout("post", "{{ body }}", Some("base")).unwrap();
        let post = stencil.get_view("layouts", "post").unwrap();
        assert_eq!(post.layout(), Some(&json!("base")));
    }

    #[test]
    fn layout_data_reaches_the_page_context() {
        let mut stencil = Stencil::new();
        stencil
            .layout_with_data("base", "<{{ site }}>{{ body }}", json!({"site": "Docs"}))
            .unwrap();
        stencil
            .layout_with_data("post", "[{{ body }}]", json!({"layout": "base", "site": "Blog"}))
            .unwrap();
        stencil
            .add_view("pages", Template::new("a.jinja", "{{ site }}").with_layout("post"))
            .unwrap();

        assert_eq!(stencil.layout_stack("a.jinja"), vec!["base", "post"]);
        assert_eq!(stencil.render_sync("a.jinja", None).unwrap(), "<Blog>[Blog]");

        let page = json!({"site": "Page"});
        assert_eq!(
            stencil.render_sync("a.jinja", page.as_object()).unwrap(),
            "<Page>[Page]"
        );
    }

    #[test]
    fn layout_with_data_rejects_non_objects() {
        let mut stencil = Stencil::new();
        let err = stencil
            .layout_with_data("base", "{{ body }}", json!("nope"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation {
                method: "Stencil::layout_with_data",
                ..
            }
        ));
        assert!(stencil.get_view("layouts", "base").is_none());
    }

    #[test]
    fn bulk_layouts_use_map_keys() {
        let mut stencil = Stencil::new();
        let mut layouts = IndexMap::new();
        layouts.insert("base".to_string(), Template::new("layouts/base.html", "{{ body }}"));
        stencil.layouts(layouts).unwrap();
        assert!(stencil.get_view("layouts", "base").is_some());
    }

    #[test]
    fn custom_collections_are_listed_by_type() {
        let mut stencil = Stencil::new();
        stencil.create("post", "posts", &[]);
        stencil.create("include", "includes", &[ViewType::Partial]);
        assert_eq!(stencil.view_types(ViewType::Renderable), vec!["pages", "posts"]);
        assert_eq!(stencil.view_types(ViewType::Partial), vec!["partials", "includes"]);
    }

    #[test]
    fn engine_registration() {
        let mut stencil = Stencil::new();
        stencil.engine(&["hbs"], crate::engine::SimpleEngine::new());
        assert_eq!(stencil.get_engine(".hbs").unwrap().name(), "simple");
    }
}
