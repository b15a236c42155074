//! Named template collections and their role classification.
//!
//! Every template lives in a [`Collection`]. A collection has a singular and a
//! plural name (`"page"` / `"pages"`) and one or more [`ViewType`]s that
//! decide how its members take part in rendering:
//!
//! | ViewType     | Effect                                                  |
//! |--------------|---------------------------------------------------------|
//! | `Renderable` | Members can be rendered by key                          |
//! | `Layout`     | Members can wrap other templates by name                |
//! | `Partial`    | Members are injected into every render context          |
//!
//! [`Collections`] is owned by a single [`Stencil`](crate::Stencil); creating a
//! new type never affects other instances.
//!
//! # Resolution
//!
//! Collections can be addressed by either name. Within a collection, records
//! are keyed by [`Template::key`] and keep insertion order; re-registering a
//! key replaces the record in place.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::Template;
use crate::error::{Error, Result};
use crate::layout::LayoutRegistry;

/// Role a collection plays during rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewType {
    Renderable,
    Layout,
    Partial,
}

/// A named, ordered set of templates.
#[derive(Debug, Clone)]
pub struct Collection {
    singular: String,
    plural: String,
    types: Vec<ViewType>,
    views: IndexMap<String, Template>,
}

impl Collection {
    pub fn new(
        singular: impl Into<String>,
        plural: impl Into<String>,
        types: &[ViewType],
    ) -> Self {
        let mut types = types.to_vec();
        if types.is_empty() {
            types.push(ViewType::Renderable);
        }
        Self {
            singular: singular.into(),
            plural: plural.into(),
            types,
            views: IndexMap::new(),
        }
    }

    pub fn singular(&self) -> &str {
        &self.singular
    }

    pub fn plural(&self) -> &str {
        &self.plural
    }

    pub fn types(&self) -> &[ViewType] {
        &self.types
    }

    pub fn is(&self, view_type: ViewType) -> bool {
        self.types.contains(&view_type)
    }

    /// Adds a record under its key, replacing any previous record.
    pub fn insert(&mut self, template: Template) -> Result<()> {
        template.validate("Collection::insert")?;
        let key = template.key().to_string();
        tracing::trace!(collection = %self.plural, key = %key, "registering template");
        self.views.insert(key, template);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Template> {
        self.views.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Template> {
        self.views.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Template)> {
        self.views.iter().map(|(key, tpl)| (key.as_str(), tpl))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

/// Registry of every collection owned by one instance.
#[derive(Debug, Clone, Default)]
pub struct Collections {
    /// Keyed by plural name, in creation order.
    collections: IndexMap<String, Collection>,
    /// singular -> plural
    aliases: IndexMap<String, String>,
}

impl Collections {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in `pages`, `layouts` and `partials` collections.
    pub fn with_defaults() -> Self {
        let mut collections = Self::new();
        collections.create("page", "pages", &[ViewType::Renderable]);
        collections.create("layout", "layouts", &[ViewType::Layout]);
        collections.create("partial", "partials", &[ViewType::Partial]);
        collections
    }

    /// Creates a collection, or re-classifies an existing one of the same
    /// plural name while keeping its records.
    pub fn create(
        &mut self,
        singular: impl Into<String>,
        plural: impl Into<String>,
        types: &[ViewType],
    ) -> &mut Collection {
        let singular = singular.into();
        let plural = plural.into();
        tracing::debug!(singular = %singular, plural = %plural, ?types, "creating collection");

        self.aliases.insert(singular.clone(), plural.clone());
        let fresh = Collection::new(singular, plural.clone(), types);
        let entry = self
            .collections
            .entry(plural)
            .and_modify(|existing| {
                existing.singular = fresh.singular.clone();
                existing.types = fresh.types.clone();
            });
        entry.or_insert(fresh)
    }

    fn resolve_name<'a>(&'a self, name: &'a str) -> &'a str {
        if self.collections.contains_key(name) {
            return name;
        }
        self.aliases.get(name).map(|s| s.as_str()).unwrap_or(name)
    }

    /// Looks up a collection by singular or plural name.
    pub fn get(&self, name: &str) -> Option<&Collection> {
        self.collections.get(self.resolve_name(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Collection> {
        let plural = self.resolve_name(name).to_string();
        self.collections.get_mut(&plural)
    }

    /// Adds a record to the named collection.
    pub fn add(&mut self, name: &str, template: Template) -> Result<()> {
        self.get_mut(name)
            .ok_or_else(|| Error::CollectionNotFound {
                name: name.to_string(),
            })?
            .insert(template)
    }

    /// Looks up a record in the named collection.
    pub fn get_view(&self, name: &str, key: &str) -> Option<&Template> {
        self.get(name)?.get(key)
    }

    /// Collections with the given classification, in creation order.
    pub fn of_type(&self, view_type: ViewType) -> impl Iterator<Item = &Collection> {
        self.collections.values().filter(move |c| c.is(view_type))
    }

    /// Plural names of the collections with the given classification.
    pub fn view_types(&self, view_type: ViewType) -> Vec<&str> {
        self.of_type(view_type).map(|c| c.plural()).collect()
    }

    /// Finds a renderable record by key, searching collections in creation
    /// order.
    pub fn find_renderable(&self, key: &str) -> Option<&Template> {
        self.of_type(ViewType::Renderable).find_map(|c| c.get(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Collection> {
        self.collections.values()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

/// Layouts are looked up across every layout collection; a later collection
/// shadows an earlier one.
impl LayoutRegistry for Collections {
    fn get_layout(&self, name: &str) -> Option<&Template> {
        self.collections
            .values()
            .rev()
            .filter(|c| c.is(ViewType::Layout))
            .find_map(|c| c.get(name))
    }
}
