//! MiniJinja-backed engine.
//!
//! This is the default engine, providing full Jinja2-compatible templates.
//! Every render works on a clone of the configured environment whose loader
//! serves the render's partials by name, so both `{% include "header" %}`
//! and the `partial("header")` function resolve them. A partial is only
//! parsed when a template asks for it. Context values are installed as
//! globals, which makes them visible inside partials as well.
//!
//! The two ways of pulling in a partial differ in the data it sees:
//!
//! - `partial("nav")` renders with the partial's own merged context
//!   (`contexts.nav`) layered over the page context.
//! - `{% include "nav" %}` sees the page context only. Hand it partial data
//!   explicitly: `{% with active = contexts.nav.active %}{% include "nav" %}{% endwith %}`.

use std::sync::Arc;

use minijinja::value::ValueKind;
use minijinja::{AutoEscape, Environment, ErrorKind, State, Value};

use super::{CompiledFn, Engine, EngineOptions};
use crate::context::Context;
use crate::error::Result;
use crate::partials::CONTEXTS_KEY;

/// MiniJinja-based template engine.
///
/// # Example
///
/// ```rust
/// use stencil::{Context, Engine, MiniJinjaEngine};
///
/// let engine = MiniJinjaEngine::new();
/// let mut ctx = Context::default();
/// ctx.insert("name", "World");
///
/// let output = engine.render_sync("Hello, {{ name }}!", &ctx).unwrap();
/// assert_eq!(output, "Hello, World!");
/// ```
#[derive(Clone)]
pub struct MiniJinjaEngine {
    env: Environment<'static>,
    options: EngineOptions,
}

impl MiniJinjaEngine {
    /// Creates an engine with default options.
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        let mut env = Environment::new();
        configure(&mut env, &options);
        Self { env, options }
    }

    /// Returns a reference to the underlying MiniJinja environment.
    pub fn environment(&self) -> &Environment<'static> {
        &self.env
    }

    /// Returns a mutable reference to the underlying MiniJinja environment.
    ///
    /// Filters, functions and globals registered here are available to every
    /// render.
    pub fn environment_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }

    /// The environment for one render: partials served by the loader,
    /// context installed as globals.
    ///
    /// Templates added through [`environment_mut`](Self::environment_mut)
    /// shadow partials of the same name.
    fn prepare(&self, context: &Context) -> Environment<'static> {
        let mut env = self.env.clone();
        let partials = context.partials().clone();
        env.set_loader(move |name| Ok(partials.get(name).cloned()));
        for (key, value) in context.data() {
            env.add_global(key.clone(), Value::from_serialize(value));
        }
        env
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for MiniJinjaEngine {
    fn name(&self) -> &str {
        "minijinja"
    }

    fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn render_sync(&self, content: &str, context: &Context) -> Result<String> {
        let env = self.prepare(context);
        Ok(env.render_str(content, ())?)
    }

    fn compile(&self, content: &str, options: &EngineOptions) -> Result<CompiledFn> {
        let engine = if *options == self.options {
            self.clone()
        } else {
            let mut engine = self.clone();
            configure(&mut engine.env, options);
            engine.options = options.clone();
            engine
        };

        // Surface syntax errors at compile time rather than on first call.
        engine.env.template_from_str(content)?;

        let engine = Arc::new(engine);
        let source: Arc<str> = Arc::from(content);
        Ok(Arc::new(move |ctx: &Context| engine.render_sync(&source, ctx)))
    }
}

fn configure(env: &mut Environment<'static>, options: &EngineOptions) {
    env.set_keep_trailing_newline(options.keep_trailing_newline);
    // Partials are registered under their own names, some ending in `.html`;
    // escaping stays off for all of them so output does not depend on naming.
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.add_function("partial", partial);
}

/// `partial(name)`: renders a registered partial with its own context over
/// the page context, or nothing if it is unknown.
fn partial(state: &State, name: &str) -> std::result::Result<String, minijinja::Error> {
    let template = match state.env().get_template(name) {
        Ok(template) => template,
        Err(err) if err.kind() == ErrorKind::TemplateNotFound => {
            tracing::warn!(partial = %name, "partial not found, rendering nothing");
            return Ok(String::new());
        }
        Err(err) => return Err(err),
    };
    let own = state
        .lookup(CONTEXTS_KEY)
        .and_then(|contexts| contexts.get_attr(name).ok())
        .filter(|ctx| ctx.kind() == ValueKind::Map);
    match own {
        Some(ctx) => template.render(ctx),
        None => template.render(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use indexmap::IndexMap;
    use serde_json::json;

    fn context(data: serde_json::Value) -> Context {
        match data {
            serde_json::Value::Object(map) => Context::new(map),
            _ => Context::default(),
        }
    }

    fn with_partials(ctx: Context, partials: &[(&str, &str)]) -> Context {
        let partials: IndexMap<String, String> = partials
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ctx.with_partials(partials)
    }

    #[test]
    fn test_minijinja_engine_simple() {
        let engine = MiniJinjaEngine::new();
        let output = engine
            .render_sync("Hello, {{ name }}!", &context(json!({"name": "World"})))
            .unwrap();
        assert_eq!(output, "Hello, World!");
    }

    #[test]
    fn test_minijinja_engine_with_loop() {
        let engine = MiniJinjaEngine::new();
        let output = engine
            .render_sync(
                "{% for item in items %}{{ item }},{% endfor %}",
                &context(json!({"items": ["a", "b", "c"]})),
            )
            .unwrap();
        assert_eq!(output, "a,b,c,");
    }

    #[test]
    fn test_trailing_newline_is_kept() {
        let engine = MiniJinjaEngine::new();
        let output = engine.render_sync("line\n", &Context::default()).unwrap();
        assert_eq!(output, "line\n");
    }

    #[test]
    fn test_template_error_passes_through() {
        let engine = MiniJinjaEngine::new();
        let err = engine
            .render_sync("{{ unclosed", &Context::default())
            .unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }

    #[test]
    fn test_include_and_partial_function() {
        let engine = MiniJinjaEngine::new();
        let ctx = with_partials(
            context(json!({"who": "you"})),
            &[("greet", "hi {{ who }}")],
        );
        let output = engine
            .render_sync("{% include \"greet\" %} / {{ partial(\"greet\") }}", &ctx)
            .unwrap();
        assert_eq!(output, "hi you / hi you");
    }

    #[test]
    fn test_partial_function_uses_partial_context() {
        let engine = MiniJinjaEngine::new();
        let ctx = with_partials(
            context(json!({
                "active": "page",
                "site": "S",
                "contexts": {"nav": {"active": "home"}},
            })),
            &[("nav", "[{{ active }} {{ site }}]")],
        );
        let output = engine
            .render_sync(
                concat!(
                    "{{ partial(\"nav\") }} ",
                    "{% include \"nav\" %} ",
                    "{% with active = contexts.nav.active %}{% include \"nav\" %}{% endwith %}",
                ),
                &ctx,
            )
            .unwrap();
        assert_eq!(output, "[home S] [page S] [home S]");
    }

    #[test]
    fn test_unused_broken_partial_is_never_parsed() {
        let engine = MiniJinjaEngine::new();
        let ctx = with_partials(Context::default(), &[("bad", "{% if %}"), ("ok", "fine")]);
        assert_eq!(engine.render_sync("hello", &ctx).unwrap(), "hello");
        assert_eq!(
            engine.render_sync("{% include \"ok\" %}", &ctx).unwrap(),
            "fine"
        );

        let err = engine
            .render_sync("{% include \"bad\" %}", &ctx)
            .unwrap_err();
        assert!(matches!(err, Error::Template(_)));
        let err = engine
            .render_sync("{{ partial(\"bad\") }}", &ctx)
            .unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }

    #[test]
    fn test_environment_templates_shadow_partials() {
        let mut engine = MiniJinjaEngine::new();
        engine
            .environment_mut()
            .add_template("greet", "from env")
            .unwrap();
        let ctx = with_partials(Context::default(), &[("greet", "from partial")]);
        let output = engine.render_sync("{% include \"greet\" %}", &ctx).unwrap();
        assert_eq!(output, "from env");
    }

    #[test]
    fn test_missing_partial_renders_nothing() {
        let engine = MiniJinjaEngine::new();
        let output = engine
            .render_sync("[{{ partial(\"nope\") }}]", &Context::default())
            .unwrap();
        assert_eq!(output, "[]");
    }

    #[test]
    fn test_no_html_escaping() {
        let engine = MiniJinjaEngine::new();
        let ctx = with_partials(
            context(json!({"tag": "<b>"})),
            &[("row.html", "{{ tag }}")],
        );
        let output = engine.render_sync("{% include \"row.html\" %}", &ctx).unwrap();
        assert_eq!(output, "<b>");
    }

    #[test]
    fn test_compile_reuses_source() {
        let engine = MiniJinjaEngine::new();
        let func = engine
            .compile("{{ n }}!", &EngineOptions::default())
            .unwrap();
        assert_eq!(func(&context(json!({"n": 1}))).unwrap(), "1!");
        assert_eq!(func(&context(json!({"n": 2}))).unwrap(), "2!");
    }

    #[test]
    fn test_compile_reports_syntax_errors() {
        let engine = MiniJinjaEngine::new();
        assert!(engine
            .compile("{% if %}", &EngineOptions::default())
            .is_err());
    }

    #[test]
    fn test_compile_honors_options() {
        let engine = MiniJinjaEngine::new();
        let options = EngineOptions {
            keep_trailing_newline: false,
            ..EngineOptions::default()
        };
        let func = engine.compile("x\n", &options).unwrap();
        assert_eq!(func(&Context::default()).unwrap(), "x");
    }

    #[test]
    fn test_custom_filters_survive_per_render_clone() {
        let mut engine = MiniJinjaEngine::new();
        engine
            .environment_mut()
            .add_filter("shout", |v: String| v.to_uppercase());
        let output = engine
            .render_sync("{{ w | shout }}", &context(json!({"w": "hey"})))
            .unwrap();
        assert_eq!(output, "HEY");
    }
}
