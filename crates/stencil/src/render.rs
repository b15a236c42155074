//! Render and compile dispatch.
//!
//! Every entry point runs the same pipeline:
//!
//! 1. Resolve the [`Target`] to a template record (a clone; registered
//!    records are never touched).
//! 2. Select the engine: `options.engine`, then the path extension, then
//!    the cache key's extension, then [`Settings::default_engine`](crate::Settings::default_engine).
//! 3. Merge the context (see [`crate::context`]).
//! 4. Resolve the layout chain and fold it around the content. Layout data
//!    is merged under the context so page values win.
//! 5. Hand content and context to the engine: [`Stencil::render_sync`]
//!    returns the output, [`Stencil::render_async`] passes it to a callback,
//!    [`Stencil::compile`] returns a reusable [`Compiled`] handle.
//! 6. With [`Settings::pretty`](crate::Settings::pretty), normalize
//!    whitespace.
//!
//! # Example
//!
//! ```rust
//! use stencil::{Stencil, Template};
//! use serde_json::json;
//!
//! let mut stencil = Stencil::new();
//! stencil
//!     .add_view("pages", Template::new("note.txt", "Dear {name},"))
//!     .unwrap();
//!
//! let out = stencil.render_sync("note.txt", json!({"name": "Ada"}).as_object()).unwrap();
//! assert_eq!(out, "Dear Ada,");
//!
//! // Unknown names are rendered as inline content with the default engine.
//! let out = stencil.render_sync("{{ 1 + 1 }}", None).unwrap();
//! assert_eq!(out, "2");
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use crate::context::Context;
use crate::engine::{CompiledFn, Engine, RenderCallback};
use crate::error::{Error, Result};
use crate::layout::{apply_stack, resolve_chain};
use crate::template::Template;
use crate::util::{extension_of, normalize_ext, prettify};
use crate::Stencil;

/// Path given to inline content.
pub const INLINE_PATH: &str = "<inline>";

/// Receives the outcome of [`Stencil::render_each_async`].
pub type RenderEachCallback = Box<dyn FnOnce(Result<Vec<String>>) + Send + 'static>;

/// What to render.
#[derive(Debug, Clone)]
pub enum Target<'a> {
    /// Key of a registered renderable template. Falls back to treating the
    /// string as inline content when no renderable collection holds it.
    Name(&'a str),
    /// Inline template content.
    Content(&'a str),
    /// A template record that need not be registered.
    Record(Template),
}

impl<'a> From<&'a str> for Target<'a> {
    fn from(name: &'a str) -> Self {
        Target::Name(name)
    }
}

impl<'a> From<&'a String> for Target<'a> {
    fn from(name: &'a String) -> Self {
        Target::Name(name)
    }
}

impl From<Template> for Target<'_> {
    fn from(template: Template) -> Self {
        Target::Record(template)
    }
}

impl From<&Template> for Target<'_> {
    fn from(template: &Template) -> Self {
        Target::Record(template.clone())
    }
}

/// A template with layouts applied and context merged, ready for its engine.
struct Prepared {
    engine: Arc<dyn Engine>,
    content: String,
    context: Context,
    stack: Vec<String>,
}

/// A compiled template.
///
/// Layouts are applied and the context is captured at compile time; each
/// call to [`render`](Self::render) may add locals on top of it.
#[derive(Clone)]
pub struct Compiled {
    func: CompiledFn,
    context: Context,
    layout_stack: Vec<String>,
    pretty: bool,
}

impl Compiled {
    /// Renders with the captured context, plus `locals` when given.
    pub fn render(&self, locals: Option<&Map<String, Value>>) -> Result<String> {
        let output = match locals {
            Some(locals) if !locals.is_empty() => {
                let mut context = self.context.clone();
                context.extend(locals);
                (self.func)(&context)?
            }
            _ => (self.func)(&self.context)?,
        };
        Ok(finish(output, self.pretty))
    }

    /// The context captured at compile time.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Names of the applied layouts, outermost-first.
    pub fn layout_stack(&self) -> &[String] {
        &self.layout_stack
    }
}

impl std::fmt::Debug for Compiled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiled")
            .field("context", &self.context)
            .field("layout_stack", &self.layout_stack)
            .field("pretty", &self.pretty)
            .finish_non_exhaustive()
    }
}

fn finish(output: String, pretty: bool) -> String {
    if pretty {
        prettify(&output)
    } else {
        output
    }
}

impl Stencil {
    /// Renders `target`, synchronously when `done` is `None`.
    ///
    /// Without a callback the output is returned as `Some(result)`. With a
    /// callback the result goes to `done` and `None` is returned.
    pub fn render<'a>(
        &self,
        target: impl Into<Target<'a>>,
        locals: Option<&Map<String, Value>>,
        done: Option<RenderCallback>,
    ) -> Option<Result<String>> {
        match done {
            Some(done) => {
                self.render_async(target, locals, done);
                None
            }
            None => Some(self.render_sync(target, locals)),
        }
    }

    /// Renders `target` and returns the output.
    pub fn render_sync<'a>(
        &self,
        target: impl Into<Target<'a>>,
        locals: Option<&Map<String, Value>>,
    ) -> Result<String> {
        let prepared = self.prepare(self.resolve_target(target.into()), locals)?;
        let output = prepared
            .engine
            .render_sync(&prepared.content, &prepared.context)?;
        Ok(finish(output, self.settings.pretty))
    }

    /// Renders `target` through the engine's callback interface.
    ///
    /// Errors found before the engine runs are passed to `done` as well, so
    /// `done` is always called exactly once.
    pub fn render_async<'a>(
        &self,
        target: impl Into<Target<'a>>,
        locals: Option<&Map<String, Value>>,
        done: RenderCallback,
    ) {
        let prepared = match self.prepare(self.resolve_target(target.into()), locals) {
            Ok(prepared) => prepared,
            Err(err) => return done(Err(err)),
        };
        let pretty = self.settings.pretty;
        let Prepared {
            engine,
            content,
            context,
            ..
        } = prepared;
        engine.render(
            content,
            context,
            Box::new(move |result| done(result.map(|output| finish(output, pretty)))),
        );
    }

    /// Compiles `target` into a reusable [`Compiled`] handle.
    pub fn compile<'a>(
        &self,
        target: impl Into<Target<'a>>,
        locals: Option<&Map<String, Value>>,
    ) -> Result<Compiled> {
        let prepared = self.prepare(self.resolve_target(target.into()), locals)?;
        let func = prepared
            .engine
            .compile(&prepared.content, prepared.engine.options())?;
        Ok(Compiled {
            func,
            context: prepared.context,
            layout_stack: prepared.stack,
            pretty: self.settings.pretty,
        })
    }

    /// Renders every record of a collection, in insertion order.
    ///
    /// Stops at the first failure.
    pub fn render_each(
        &self,
        collection: &str,
        locals: Option<&Map<String, Value>>,
    ) -> Result<Vec<String>> {
        let collection = self.find_collection(collection)?;
        collection
            .iter()
            .map(|(_, template)| self.render_sync(template, locals))
            .collect()
    }

    /// Renders every record of a collection through the engines' callback
    /// interface, one after another, passing all outputs to `done`.
    ///
    /// Stops at the first failure and passes that error to `done`.
    pub fn render_each_async(
        &self,
        collection: &str,
        locals: Option<&Map<String, Value>>,
        done: RenderEachCallback,
    ) {
        let prepared: Result<Vec<Prepared>> = self.find_collection(collection).and_then(|c| {
            c.iter()
                .map(|(_, template)| self.prepare(template.clone(), locals))
                .collect()
        });
        match prepared {
            Ok(items) => {
                let capacity = items.len();
                run_each(
                    items.into_iter(),
                    Vec::with_capacity(capacity),
                    self.settings.pretty,
                    done,
                )
            }
            Err(err) => done(Err(err)),
        }
    }

    /// Names of the layouts that would wrap `target`, outermost-first.
    pub fn layout_stack<'a>(&self, target: impl Into<Target<'a>>) -> Vec<String> {
        let template = self.resolve_target(target.into());
        resolve_chain(
            template.layout(),
            &self.collections,
            self.settings.default_layout.as_deref(),
        )
    }

    fn find_collection(&self, name: &str) -> Result<&crate::template::Collection> {
        self.collections
            .get(name)
            .ok_or_else(|| Error::CollectionNotFound {
                name: name.to_string(),
            })
    }

    fn resolve_target(&self, target: Target<'_>) -> Template {
        match target {
            Target::Name(name) => match self.collections.find_renderable(name) {
                Some(template) => template.clone(),
                None => {
                    tracing::trace!("no renderable template named {name:?}, rendering inline");
                    Template::new(INLINE_PATH, name)
                }
            },
            Target::Content(content) => Template::new(INLINE_PATH, content),
            Target::Record(template) => template,
        }
    }

    /// Picks the engine for `template`.
    ///
    /// An explicit `options.engine` must be registered. Extensions derived
    /// from the path or key fall through to the next candidate when no
    /// engine claims them.
    pub(crate) fn resolve_engine(&self, template: &Template) -> Result<Arc<dyn Engine>> {
        if let Some(ext) = &template.options.engine {
            let ext = normalize_ext(ext);
            return self.engines.get(&ext).ok_or_else(|| Error::EngineNotFound {
                ext,
                template: template.path.clone(),
            });
        }

        let derived = [template.ext(), extension_of(template.key())];
        for ext in derived.iter().flatten() {
            if let Some(engine) = self.engines.get(ext) {
                return Ok(engine);
            }
            tracing::trace!(template = %template.path, ext = %ext, "no engine for extension");
        }

        let ext = normalize_ext(&self.settings.default_engine);
        self.engines.get(&ext).ok_or_else(|| Error::EngineNotFound {
            ext,
            template: template.path.clone(),
        })
    }

    fn prepare(
        &self,
        template: Template,
        locals: Option<&Map<String, Value>>,
    ) -> Result<Prepared> {
        template.validate("render")?;
        let engine = self.resolve_engine(&template)?;
        tracing::debug!(template = %template.path, engine = %engine.name(), "rendering");

        let mut context = self.merge_context(&template, locals);

        let start = template
            .layout()
            .or_else(|| locals.and_then(|l| l.get("layout")));
        let chain = resolve_chain(
            start,
            &self.collections,
            self.settings.default_layout.as_deref(),
        );
        let tag = self.settings.body_tag(template.layout_delims());
        let stack = apply_stack(&chain, &self.collections, &template.content, &tag);
        context.extend_missing(&stack.data);

        Ok(Prepared {
            engine,
            content: stack.content,
            context,
            stack: stack.stack,
        })
    }
}

/// Where one item of [`run_each`] stands between the engine and the loop.
enum Step {
    /// The engine has not reported yet.
    Pending,
    /// The engine reported before `render` returned.
    Ready(Result<String>),
    /// `render` returned first; the engine hands its result to this.
    Waiting(RenderCallback),
    Taken,
}

fn lock_step(step: &Mutex<Step>) -> MutexGuard<'_, Step> {
    step.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives the queue in a loop while engines report inline, so the stack
/// stays flat however long the collection is. When an engine reports after
/// `render` returns, the rest of the queue continues from its callback.
fn run_each(
    mut queue: std::vec::IntoIter<Prepared>,
    mut outputs: Vec<String>,
    pretty: bool,
    done: RenderEachCallback,
) {
    while let Some(Prepared {
        engine,
        content,
        context,
        ..
    }) = queue.next()
    {
        let step = Arc::new(Mutex::new(Step::Pending));
        let reported = Arc::clone(&step);
        engine.render(
            content,
            context,
            Box::new(move |result| {
                let mut guard = lock_step(&reported);
                match std::mem::replace(&mut *guard, Step::Taken) {
                    Step::Waiting(next) => {
                        drop(guard);
                        next(result);
                    }
                    _ => *guard = Step::Ready(result),
                }
            }),
        );

        let mut guard = lock_step(&step);
        match std::mem::replace(&mut *guard, Step::Taken) {
            Step::Ready(Ok(output)) => outputs.push(finish(output, pretty)),
            Step::Ready(Err(err)) => return done(Err(err)),
            _ => {
                *guard = Step::Waiting(Box::new(move |result| match result {
                    Ok(output) => {
                        outputs.push(finish(output, pretty));
                        run_each(queue, outputs, pretty, done);
                    }
                    Err(err) => done(Err(err)),
                }));
                return;
            }
        }
    }
    done(Ok(outputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SimpleEngine;
    use crate::settings::Settings;
    use serde_json::json;
    use std::sync::Mutex;

    fn locals(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn engine_from_explicit_option() {
        let stencil = Stencil::new();
        let tpl = Template::new("a.md", "").with_engine("txt");
        assert_eq!(stencil.resolve_engine(&tpl).unwrap().name(), "simple");
    }

    #[test]
    fn unknown_explicit_engine_is_an_error() {
        let stencil = Stencil::new();
        let tpl = Template::new("a.md", "").with_engine(".hbs");
        let err = stencil.resolve_engine(&tpl).err().unwrap();
        assert!(matches!(err, Error::EngineNotFound { ref ext, .. } if ext == ".hbs"));
    }

    #[test]
    fn engine_falls_back_from_path_to_key_to_default() {
        let stencil = Stencil::new();
        let by_key = Template::new("notes/a.unknown", "").with_key("a.txt");
        assert_eq!(stencil.resolve_engine(&by_key).unwrap().name(), "simple");

        let by_default = Template::new("a.unknown", "");
        assert_eq!(stencil.resolve_engine(&by_default).unwrap().name(), "minijinja");
    }

    #[test]
    fn missing_default_engine_is_an_error() {
        let stencil = Stencil::with_settings(Settings::new().with_default_engine("hbs"));
        let err = stencil.resolve_engine(&Template::new("a", "")).err().unwrap();
        assert!(matches!(err, Error::EngineNotFound { ref ext, .. } if ext == ".hbs"));
    }

    #[test]
    fn name_falls_back_to_inline_content() {
        let stencil = Stencil::new();
        assert_eq!(stencil.render_sync("plain", None).unwrap(), "plain");
    }

    #[test]
    fn explicit_content_target() {
        let mut stencil = Stencil::new();
        stencil.add_view("pages", Template::new("x", "registered")).unwrap();
        assert_eq!(
            stencil.render_sync(Target::Content("x"), None).unwrap(),
            "x"
        );
        assert_eq!(stencil.render_sync("x", None).unwrap(), "registered");
    }

    #[test]
    fn layout_data_sits_under_page_data() {
        let mut stencil = Stencil::new();
        stencil
            .add_view(
                "layouts",
                Template::new("base", "{{ title }}|{{ site }}|{{ body }}")
                    .with_data(json!({"title": "layout", "site": "S"})),
            )
            .unwrap();
        let page = Template::new("p.jinja", "x")
            .with_layout("base")
            .with_data(json!({"title": "page"}));
        assert_eq!(stencil.render_sync(page, None).unwrap(), "page|S|x");
    }

    #[test]
    fn layout_from_call_locals() {
        let mut stencil = Stencil::new();
        stencil.layout("box", "[{{ body }}]", None).unwrap();
        let out = stencil
            .render_sync(Target::Content("x"), Some(&locals(json!({"layout": "box"}))))
            .unwrap();
        assert_eq!(out, "[x]");
    }

    #[test]
    fn render_without_callback_returns_output() {
        let stencil = Stencil::new();
        let out = stencil.render("a", None, None);
        assert_eq!(out.unwrap().unwrap(), "a");
    }

    #[test]
    fn render_with_callback_returns_none() {
        let stencil = Stencil::new();
        let slot = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&slot);
        let out = stencil.render(
            "a",
            None,
            Some(Box::new(move |result| {
                *sink.lock().unwrap() = Some(result.unwrap());
            })),
        );
        assert!(out.is_none());
        assert_eq!(slot.lock().unwrap().as_deref(), Some("a"));
    }

    #[test]
    fn async_errors_reach_the_callback() {
        let stencil = Stencil::new();
        let slot = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&slot);
        stencil.render_async(
            Template::new("a", "").with_engine("hbs"),
            None,
            Box::new(move |result| {
                *sink.lock().unwrap() = Some(result.is_err());
            }),
        );
        assert_eq!(*slot.lock().unwrap(), Some(true));
    }

    #[test]
    fn compile_captures_context_and_accepts_locals() {
        let mut stencil = Stencil::new();
        stencil.data(json!({"greeting": "hi"})).unwrap();
        stencil.layout("box", "[{{ body }}]", None).unwrap();
        let page = Template::new("p.jinja", "{{ greeting }} {{ who }}").with_layout("box");

        let compiled = stencil.compile(page, None).unwrap();
        assert_eq!(compiled.layout_stack(), ["box"]);
        assert_eq!(
            compiled.render(Some(&locals(json!({"who": "you"})))).unwrap(),
            "[hi you]"
        );
        assert_eq!(compiled.render(None).unwrap(), "[hi ]");
    }

    #[test]
    fn compile_without_engine_support() {
        let stencil = Stencil::new();
        let err = stencil.compile(Template::new("a.txt", "{x}"), None).unwrap_err();
        assert!(matches!(err, Error::EngineCapability { .. }));
    }

    #[test]
    fn pretty_output() {
        let stencil = Stencil::with_settings(Settings::new().with_pretty(true));
        let out = stencil.render_sync("a  \n\n\n\nb", None).unwrap();
        assert_eq!(out, "a\n\nb\n");
    }

    #[test]
    fn render_each_in_insertion_order() {
        let mut stencil = Stencil::new();
        stencil.create("post", "posts", &[]);
        for (key, body) in [("b.txt", "B {n}"), ("a.txt", "A {n}")] {
            stencil.add_view("posts", Template::new(key, body)).unwrap();
        }
        let out = stencil
            .render_each("posts", Some(&locals(json!({"n": 1}))))
            .unwrap();
        assert_eq!(out, vec!["B 1", "A 1"]);
    }

    #[test]
    fn render_each_unknown_collection() {
        let stencil = Stencil::new();
        assert!(matches!(
            stencil.render_each("nope", None),
            Err(Error::CollectionNotFound { .. })
        ));
    }

    #[test]
    fn render_each_is_fail_fast() {
        let mut stencil = Stencil::new();
        stencil.add_view("pages", Template::new("ok.txt", "ok")).unwrap();
        stencil.add_view("pages", Template::new("bad.txt", "{oops")).unwrap();
        stencil.add_view("pages", Template::new("later.txt", "later")).unwrap();
        assert!(stencil.render_each("pages", None).is_err());
    }

    #[test]
    fn render_each_async_collects_outputs() {
        let mut stencil = Stencil::new();
        stencil.engine(&["txt"], SimpleEngine::new());
        stencil.add_view("pages", Template::new("1.txt", "one")).unwrap();
        stencil.add_view("pages", Template::new("2.txt", "two")).unwrap();

        let slot = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&slot);
        stencil.render_each_async(
            "pages",
            None,
            Box::new(move |result| {
                *sink.lock().unwrap() = Some(result);
            }),
        );
        let result = slot.lock().unwrap().take().unwrap();
        assert_eq!(result.unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn render_each_async_stops_at_first_error() {
        let mut stencil = Stencil::new();
        stencil.add_view("pages", Template::new("bad.txt", "{")).unwrap();
        stencil.add_view("pages", Template::new("ok.txt", "ok")).unwrap();

        let slot = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&slot);
        stencil.render_each_async(
            "pages",
            None,
            Box::new(move |result| {
                *sink.lock().unwrap() = Some(result.is_err());
            }),
        );
        assert_eq!(*slot.lock().unwrap(), Some(true));
    }

    #[test]
    fn layout_stack_reports_chain() {
        let mut stencil = Stencil::new();
        stencil.layout("base", "{{ body }}", None).unwrap();
        stencil.layout("post", "{{ body }}", Some("base")).unwrap();
        let page = Template::new("p", "").with_layout("post");
        assert_eq!(stencil.layout_stack(page), vec!["base", "post"]);
        assert!(stencil.layout_stack("nothing").is_empty());
    }
}
