//! Context merging for template rendering.
//!
//! Every render builds a fresh [`Context`] by layering several sources on top
//! of each other. Which source wins is not hard-coded: it is an explicit
//! [`MergeOrder`], a list of [`ContextSource`]s applied left to right where
//! later sources overwrite keys from earlier ones.
//!
//! # Default Order
//!
//! | # | Source            | Contents                                          |
//! |---|-------------------|---------------------------------------------------|
//! | 1 | `Global`          | Instance-wide data set with `Stencil::data`       |
//! | 2 | `Options`         | The template's options (`layout`, `engine`, ...)  |
//! | 3 | `Locals`          | Template locals, then call-time locals            |
//! | 4 | `Data`            | Front matter                                      |
//! | 5 | `Partials`        | Partial content (`partials.<name>`)               |
//! | 6 | `PartialContexts` | Each partial's own merged context (`contexts.<name>`) |
//!
//! With `prefer_locals` enabled, `Locals` and `Data` swap places so call-time
//! data beats front matter. Global data is unaffected by that switch.
//!
//! # Overrides
//!
//! [`Stencil::set_context_fn`](crate::Stencil::set_context_fn) replaces the
//! whole merge with a closure; [`Stencil::set_partials_fn`](crate::Stencil::set_partials_fn)
//! replaces only the partials step.
//!
//! # Example
//!
//! ```rust
//! use stencil::{Stencil, Template};
//! use serde_json::json;
//!
//! let mut stencil = Stencil::new();
//! stencil.data(json!({"letter": "b"})).unwrap();
//!
//! let page = Template::new("a.md", "").with_locals(json!({"letter": "bbb"}));
//! let ctx = stencil.merge_context(&page, None);
//! assert_eq!(ctx.get("letter"), Some(&json!("bbb")));
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::partials::PartialSet;
use crate::template::Template;
use crate::util::{extend, extend_missing};
use crate::Stencil;

/// Replaces the whole context merge.
pub type ContextFn =
    Arc<dyn Fn(&Template, &Map<String, Value>) -> Map<String, Value> + Send + Sync>;

/// One layer of the merged context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    Global,
    Options,
    Locals,
    Data,
    Partials,
    PartialContexts,
}

/// Ordered list of context sources, lowest precedence first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergeOrder(Vec<ContextSource>);

impl MergeOrder {
    pub fn new(sources: impl IntoIterator<Item = ContextSource>) -> Self {
        Self(sources.into_iter().collect())
    }

    /// Front matter beats locals.
    pub fn standard() -> Self {
        use ContextSource::*;
        Self(vec![Global, Options, Locals, Data, Partials, PartialContexts])
    }

    /// Locals beat front matter.
    pub fn prefer_locals() -> Self {
        use ContextSource::*;
        Self(vec![Global, Options, Data, Locals, Partials, PartialContexts])
    }

    pub fn sources(&self) -> &[ContextSource] {
        &self.0
    }

    pub fn contains(&self, source: ContextSource) -> bool {
        self.0.contains(&source)
    }

    /// The same order without the partial-related sources.
    pub fn without_partials(&self) -> Self {
        Self(
            self.0
                .iter()
                .copied()
                .filter(|s| {
                    !matches!(s, ContextSource::Partials | ContextSource::PartialContexts)
                })
                .collect(),
        )
    }
}

impl Default for MergeOrder {
    fn default() -> Self {
        Self::standard()
    }
}

/// The merged data handed to an engine for one render.
///
/// `data` is the flat mapping templates see. `partials` carries every
/// partial's content by name so engines that support includes can register
/// them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    data: Map<String, Value>,
    partials: IndexMap<String, String>,
}

impl Context {
    pub fn new(data: Map<String, Value>) -> Self {
        Self {
            data,
            partials: IndexMap::new(),
        }
    }

    pub fn with_partials(mut self, partials: IndexMap<String, String>) -> Self {
        self.partials = partials;
        self
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.data
    }

    pub fn into_data(self) -> Map<String, Value> {
        self.data
    }

    pub fn partials(&self) -> &IndexMap<String, String> {
        &self.partials
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Overwrites keys with the entries of `other`.
    pub fn extend(&mut self, other: &Map<String, Value>) {
        extend(&mut self.data, other);
    }

    /// Adds entries of `base` only where no key exists yet.
    pub fn extend_missing(&mut self, base: &Map<String, Value>) {
        extend_missing(&mut self.data, base);
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.data.clone())
    }
}

/// Inputs to one merge.
pub(crate) struct Sources<'a> {
    pub global: &'a Map<String, Value>,
    pub template: &'a Template,
    pub call_locals: Option<&'a Map<String, Value>>,
    pub partials: Option<&'a PartialSet>,
}

/// Folds `sources` in `order` into a new map. No input map is aliased.
pub(crate) fn merge_sources(
    order: &MergeOrder,
    sources: &Sources<'_>,
    partials_fn: Option<&crate::partials::PartialsFn>,
) -> Map<String, Value> {
    let mut out = Map::new();
    for source in order.sources() {
        match source {
            ContextSource::Global => extend(&mut out, sources.global),
            ContextSource::Options => extend(&mut out, &sources.template.options_map()),
            ContextSource::Locals => {
                extend(&mut out, &sources.template.locals);
                if let Some(call) = sources.call_locals {
                    extend(&mut out, call);
                }
            }
            ContextSource::Data => extend(&mut out, &sources.template.data),
            ContextSource::Partials => match partials_fn {
                Some(f) => out = f(out),
                None => {
                    if let Some(set) = sources.partials {
                        set.apply(&mut out);
                    }
                }
            },
            ContextSource::PartialContexts => {
                if partials_fn.is_none() {
                    if let Some(set) = sources.partials {
                        set.apply_contexts(&mut out);
                    }
                }
            }
        }
    }
    out
}

impl Stencil {
    /// Builds the context for rendering `template`.
    ///
    /// `call_locals` are merged over the template's own locals. The result
    /// is a new map; neither the template nor the global data is touched.
    pub fn merge_context(
        &self,
        template: &Template,
        call_locals: Option<&Map<String, Value>>,
    ) -> Context {
        if let Some(f) = &self.context_fn {
            let empty = Map::new();
            return Context::new(f(template, call_locals.unwrap_or(&empty)));
        }

        let order = self.settings.effective_merge_order();
        let wants_partials = order.contains(ContextSource::Partials)
            || order.contains(ContextSource::PartialContexts);
        let partials = (wants_partials && self.partials_fn.is_none())
            .then(|| self.merge_partials(template.layout_delims()));

        let data = merge_sources(
            &order,
            &Sources {
                global: &self.data,
                template,
                call_locals,
                partials: partials.as_ref(),
            },
            self.partials_fn.as_ref(),
        );

        let includes = partials.map(|set| set.flattened()).unwrap_or_default();
        Context::new(data).with_partials(includes)
    }
}
