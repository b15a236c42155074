//! Layout chains: resolution and stacking.
//!
//! A layout is a template containing a body tag (`{{ body }}` by default)
//! where wrapped content is injected. Layouts may point at a parent layout,
//! forming a chain that is applied from the innermost layout outwards.
//!
//! ## Two Steps
//!
//! **Resolve** ([`resolve_chain`]): follow layout pointers from a start name,
//! producing names ordered outermost-first.
//! ```text
//! page (layout: post) -> post (layout: base) -> base
//! chain: ["base", "post"]
//! ```
//!
//! **Stack** ([`apply_stack`]): fold the chain into one string.
//! ```text
//! base: <html>{{ body }}</html>
//! post: <article>{{ body }}</article>
//! page: Hello
//! out:  <html><article>Hello</article></html>
//! ```
//!
//! Missing layouts end the chain silently. Self references and longer cycles
//! end it at the first repeated name.

mod resolve;
mod stack;

use std::collections::HashMap;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use serde_json::Value;

use crate::settings::Delims;
use crate::template::Template;
use crate::util::is_falsey_str;

pub use resolve::resolve_chain;
pub use stack::{apply_stack, LayoutStack};

/// Lookup of layout records by name.
pub trait LayoutRegistry {
    fn get_layout(&self, name: &str) -> Option<&Template>;
}

impl LayoutRegistry for IndexMap<String, Template> {
    fn get_layout(&self, name: &str) -> Option<&Template> {
        self.get(name)
    }
}

impl LayoutRegistry for HashMap<String, Template> {
    fn get_layout(&self, name: &str) -> Option<&Template> {
        self.get(name)
    }
}

/// Interprets a layout pointer.
///
/// * absent, `null`, `false`, `""` or a falsey string such as `"none"` → no layout
/// * `true` → `default_layout`
/// * any other string → that name
///
/// ```rust
/// use stencil::layout::assert_layout;
/// use serde_json::json;
///
/// assert_eq!(assert_layout(Some(&json!("base")), None).as_deref(), Some("base"));
/// assert_eq!(assert_layout(Some(&json!(true)), Some("default")).as_deref(), Some("default"));
/// assert_eq!(assert_layout(Some(&json!("none")), Some("default")), None);
/// assert_eq!(assert_layout(None, Some("default")), None);
/// ```
pub fn assert_layout(value: Option<&Value>, default_layout: Option<&str>) -> Option<String> {
    match value? {
        Value::Bool(true) => default_layout.map(str::to_string),
        Value::String(name) if name.trim().is_empty() || is_falsey_str(name) => None,
        Value::String(name) => Some(name.clone()),
        Value::Null | Value::Bool(false) => None,
        other => {
            tracing::debug!("ignoring non-string layout pointer {other}");
            None
        }
    }
}

static DEFAULT_TAG: Lazy<BodyTag> = Lazy::new(|| BodyTag::new("body", &Delims::default()));

/// Matcher for the body tag inside layouts.
///
/// Whitespace between the delimiters and the tag name is optional, so
/// `{{body}}` and `{{  body }}` both match.
#[derive(Debug, Clone)]
pub struct BodyTag {
    name: String,
    delims: Delims,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    Pattern(Regex),
    /// Exact spellings, tried in order: `{{ body }}` then `{{body}}`.
    Literal([String; 2]),
}

impl BodyTag {
    /// Builds the matcher for `name` between `delims`.
    ///
    /// The pattern only fails to compile when it exceeds the regex size
    /// limit; the tag then matches the spaced and compact spellings exactly.
    pub fn new(name: &str, delims: &Delims) -> Self {
        let pattern = format!(
            r"{}\s*{}\s*{}",
            regex::escape(&delims.open),
            regex::escape(name),
            regex::escape(&delims.close)
        );
        match Regex::new(&pattern) {
            Ok(regex) => Self {
                name: name.to_string(),
                delims: delims.clone(),
                matcher: Matcher::Pattern(regex),
            },
            Err(err) => {
                tracing::warn!("body tag {name:?} matched literally: {err}");
                Self::literal(name, delims)
            }
        }
    }

    fn literal(name: &str, delims: &Delims) -> Self {
        Self {
            name: name.to_string(),
            delims: delims.clone(),
            matcher: Matcher::Literal([
                format!("{} {} {}", delims.open, name, delims.close),
                format!("{}{}{}", delims.open, name, delims.close),
            ]),
        }
    }

    /// The same tag name with different delimiters.
    pub fn with_delims(&self, delims: &Delims) -> Self {
        if delims == &self.delims {
            return self.clone();
        }
        Self::new(&self.name, delims)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn delims(&self) -> &Delims {
        &self.delims
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        match &self.matcher {
            Matcher::Pattern(regex) => regex.is_match(haystack),
            Matcher::Literal(spellings) => spellings.iter().any(|s| haystack.contains(s.as_str())),
        }
    }

    /// Replaces every tag occurrence with `replacement`, taken literally.
    ///
    /// Returns `None` when the haystack has no tag.
    pub fn replace(&self, haystack: &str, replacement: &str) -> Option<String> {
        if !self.is_match(haystack) {
            return None;
        }
        let out = match &self.matcher {
            Matcher::Pattern(regex) => regex
                .replace_all(haystack, NoExpand(replacement))
                .into_owned(),
            Matcher::Literal(spellings) => replace_spellings(haystack, spellings, replacement),
        };
        Some(out)
    }
}

/// Replaces each spelling in turn. The replacement is never rescanned, so a
/// tag inside it survives.
fn replace_spellings(haystack: &str, spellings: &[String], replacement: &str) -> String {
    let Some((first, rest)) = spellings.split_first() else {
        return haystack.to_string();
    };
    haystack
        .split(first.as_str())
        .map(|part| replace_spellings(part, rest, replacement))
        .collect::<Vec<_>>()
        .join(replacement)
}

impl Default for BodyTag {
    fn default() -> Self {
        DEFAULT_TAG.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assert_layout_cases() {
        assert_eq!(assert_layout(None, Some("d")), None);
        assert_eq!(assert_layout(Some(&Value::Null), Some("d")), None);
        assert_eq!(assert_layout(Some(&json!(false)), Some("d")), None);
        assert_eq!(assert_layout(Some(&json!("")), Some("d")), None);
        assert_eq!(assert_layout(Some(&json!("false")), Some("d")), None);
        assert_eq!(assert_layout(Some(&json!(true)), None), None);
        assert_eq!(
            assert_layout(Some(&json!(true)), Some("d")).as_deref(),
            Some("d")
        );
        assert_eq!(
            assert_layout(Some(&json!("base")), Some("d")).as_deref(),
            Some("base")
        );
        assert_eq!(assert_layout(Some(&json!(3)), Some("d")), None);
    }

    #[test]
    fn body_tag_tolerates_whitespace() {
        let tag = BodyTag::default();
        assert!(tag.is_match("{{body}}"));
        assert!(tag.is_match("{{ body }}"));
        assert!(tag.is_match("{{   body\t}}"));
        assert!(!tag.is_match("{{ bodies }}"));
        assert!(!tag.is_match("{ body }"));
    }

    #[test]
    fn body_tag_replace_is_literal() {
        let tag = BodyTag::default();
        let out = tag.replace("<main>{{ body }}</main>", "costs $1").unwrap();
        assert_eq!(out, "<main>costs $1</main>");
    }

    #[test]
    fn body_tag_replace_all_occurrences() {
        let tag = BodyTag::default();
        assert_eq!(tag.replace("{{body}}|{{ body }}", "x").unwrap(), "x|x");
    }

    #[test]
    fn body_tag_replace_without_tag() {
        assert_eq!(BodyTag::default().replace("no tag here", "x"), None);
    }

    #[test]
    fn body_tag_custom_delims_and_name() {
        let tag = BodyTag::new("contents", &Delims::new("<%", "%>"));
        assert!(tag.is_match("<% contents %>"));
        assert!(!tag.is_match("{{ contents }}"));

        let swapped = tag.with_delims(&Delims::new("[[", "]]"));
        assert_eq!(swapped.name(), "contents");
        assert!(swapped.is_match("[[contents]]"));
    }

    #[test]
    fn delims_with_regex_metacharacters() {
        let tag = BodyTag::new("body", &Delims::new("(*", "*)"));
        assert!(tag.is_match("(* body *)"));
    }

    #[test]
    fn literal_body_tag_matches_exact_spellings() {
        let tag = BodyTag::literal("body", &Delims::default());
        assert!(tag.is_match("<{{ body }}>"));
        assert!(tag.is_match("<{{body}}>"));
        assert!(!tag.is_match("<{{  body }}>"));
        assert_eq!(
            tag.replace("{{ body }}|{{body}}", "{{body}} $1").unwrap(),
            "{{body}} $1|{{body}} $1"
        );
        assert_eq!(tag.replace("none", "x"), None);
    }

    #[test]
    fn oversized_delims_still_build_a_tag() {
        let open = "<".repeat(1 << 20);
        let tag = BodyTag::new("body", &Delims::new(open.as_str(), ">"));
        let layout = format!("[{open} body >]");
        assert!(tag.is_match(&layout));
        assert_eq!(tag.replace(&layout, "x").unwrap(), "[x]");
    }

    #[test]
    fn map_registries() {
        let mut map = IndexMap::new();
        map.insert("base".to_string(), Template::new("base", "{{ body }}"));
        assert!(map.get_layout("base").is_some());

        let hash: HashMap<String, Template> = map.into_iter().collect();
        assert!(hash.get_layout("base").is_some());
        assert!(hash.get_layout("other").is_none());
    }
}
