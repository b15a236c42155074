//! Partial aggregation.
//!
//! Every collection classified as [`ViewType::Partial`] contributes its
//! members to the render context. Two layouts of the result are supported,
//! selected by [`Settings::merge_partials`](crate::Settings::merge_partials):
//!
//! ```text
//! merged (default)             namespaced
//! partials:                    partials:
//!   header: "..."                header: "..."
//!   sidebar: "..."             includes:
//!                                sidebar: "..."
//! ```
//!
//! In merged mode a name present in several collections resolves to the
//! collection created last.
//!
//! A partial with a layout is wrapped before it is exposed, so templates
//! never see a partial's unresolved body tag.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::context::{merge_sources, Sources};
use crate::layout::{apply_stack, resolve_chain};
use crate::settings::Delims;
use crate::template::{Template, ViewType};
use crate::Stencil;

/// Key under which merged partials are exposed.
pub const PARTIALS_KEY: &str = "partials";

/// Key under which each partial's own merged context is exposed.
pub const CONTEXTS_KEY: &str = "contexts";

/// Replaces the partials step of the context merge.
///
/// Receives the context merged so far and returns the context to continue
/// with.
pub type PartialsFn = Arc<dyn Fn(Map<String, Value>) -> Map<String, Value> + Send + Sync>;

/// Partial content gathered for one render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialSet {
    merged: bool,
    /// collection plural name -> partial name -> content
    collections: IndexMap<String, IndexMap<String, String>>,
    /// partial name -> that partial's merged context
    contexts: Map<String, Value>,
}

impl PartialSet {
    pub fn is_merged(&self) -> bool {
        self.merged
    }

    /// Content of a partial, searching the most recently created
    /// collection first.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.collections
            .values()
            .rev()
            .find_map(|items| items.get(name))
            .map(|s| s.as_str())
    }

    /// Partials of one collection.
    pub fn collection(&self, plural: &str) -> Option<&IndexMap<String, String>> {
        self.collections.get(plural)
    }

    /// Every partial in one map; later collections win on name clashes.
    pub fn flattened(&self) -> IndexMap<String, String> {
        let mut out = IndexMap::new();
        for items in self.collections.values() {
            for (name, content) in items {
                out.insert(name.clone(), content.clone());
            }
        }
        out
    }

    /// Merged context of a partial.
    pub fn context(&self, name: &str) -> Option<&Value> {
        self.contexts.get(name)
    }

    /// Writes partial content onto `ctx`, merged or namespaced.
    pub fn apply(&self, ctx: &mut Map<String, Value>) {
        if self.merged {
            let flat = self
                .flattened()
                .into_iter()
                .map(|(name, content)| (name, Value::String(content)))
                .collect();
            ctx.insert(PARTIALS_KEY.to_string(), Value::Object(flat));
        } else {
            for (plural, items) in &self.collections {
                let items = items
                    .iter()
                    .map(|(name, content)| (name.clone(), Value::String(content.clone())))
                    .collect();
                ctx.insert(plural.clone(), Value::Object(items));
            }
        }
    }

    /// Writes every partial's merged context onto `ctx` under `contexts`.
    pub fn apply_contexts(&self, ctx: &mut Map<String, Value>) {
        if !self.contexts.is_empty() {
            ctx.insert(CONTEXTS_KEY.to_string(), Value::Object(self.contexts.clone()));
        }
    }
}

impl Stencil {
    /// Gathers every partial for one render.
    ///
    /// `call_delims` are the calling template's body tag delimiters; a
    /// partial's own `layout_delims` take precedence over them.
    pub fn merge_partials(&self, call_delims: Option<&Delims>) -> PartialSet {
        let order = self.settings.effective_merge_order().without_partials();
        let mut set = PartialSet {
            merged: self.settings.merge_partials,
            ..PartialSet::default()
        };

        for collection in self.collections.of_type(ViewType::Partial) {
            let mut items = IndexMap::with_capacity(collection.len());
            for (name, partial) in collection.iter() {
                let ctx = merge_sources(
                    &order,
                    &Sources {
                        global: &self.data,
                        template: partial,
                        call_locals: None,
                        partials: None,
                    },
                    None,
                );
                set.contexts.insert(name.to_string(), Value::Object(ctx));
                items.insert(name.to_string(), self.partial_content(partial, call_delims));
            }
            set.collections.insert(collection.plural().to_string(), items);
        }

        tracing::trace!(
            collections = set.collections.len(),
            merged = set.merged,
            "aggregated partials"
        );
        set
    }

    /// A partial's content with its own layout chain applied.
    fn partial_content(&self, partial: &Template, call_delims: Option<&Delims>) -> String {
        let chain = resolve_chain(
            partial.layout(),
            &self.collections,
            self.settings.default_layout.as_deref(),
        );
        if chain.is_empty() {
            return partial.content.clone();
        }
        let tag = self
            .settings
            .body_tag(partial.layout_delims().or(call_delims));
        apply_stack(&chain, &self.collections, &partial.content, &tag).content
    }
}
