use serde_json::{Map, Value};

use super::{BodyTag, LayoutRegistry};
use crate::util::extend;

/// Result of folding a layout chain around some content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutStack {
    /// Fully wrapped content. No body tag from the chain remains.
    pub content: String,

    /// Locals and data of every applied layout; inner layouts win.
    pub data: Map<String, Value>,

    /// Names of the applied layouts, outermost-first.
    pub stack: Vec<String>,
}

/// Folds `chain` (outermost-first) around `content`.
///
/// The outermost layout's body becomes the skeleton; each inner layout
/// replaces the body tag of the skeleton, and `content` finally replaces the
/// innermost tag. A layout whose body has no tag gets the inner text appended
/// on a new line instead of silently dropping it.
///
/// Each layout is matched with its own `layout_delims` when set, falling back
/// to `tag`. Names missing from `registry` are skipped.
pub fn apply_stack<R>(
    chain: &[String],
    registry: &R,
    content: &str,
    tag: &BodyTag,
) -> LayoutStack
where
    R: LayoutRegistry + ?Sized,
{
    let mut data = Map::new();
    let mut stack = Vec::with_capacity(chain.len());
    // The skeleton so far and the tag its innermost layout uses.
    let mut skeleton: Option<(String, BodyTag)> = None;

    for name in chain {
        let Some(layout) = registry.get_layout(name) else {
            tracing::debug!(layout = %name, "layout vanished from registry, skipping");
            continue;
        };

        extend(&mut data, &layout.locals);
        extend(&mut data, &layout.data);

        let layout_tag = match layout.layout_delims() {
            Some(delims) => tag.with_delims(delims),
            None => tag.clone(),
        };
        let next = match skeleton.take() {
            None => layout.content.clone(),
            Some((outer, outer_tag)) => wrap(&outer, &outer_tag, &layout.content, name),
        };
        skeleton = Some((next, layout_tag));
        stack.push(name.clone());
    }

    let content = match skeleton {
        Some((outer, outer_tag)) => {
            let innermost = stack.last().map(String::as_str).unwrap_or_default();
            wrap(&outer, &outer_tag, content, innermost)
        }
        None => content.to_string(),
    };

    LayoutStack {
        content,
        data,
        stack,
    }
}

fn wrap(outer: &str, tag: &BodyTag, inner: &str, name: &str) -> String {
    match tag.replace(outer, inner) {
        Some(wrapped) => wrapped,
        None => {
            tracing::debug!(
                layout = %name,
                tag = %tag.name(),
                "no body tag found, appending content"
            );
            if outer.is_empty() {
                inner.to_string()
            } else if outer.ends_with('\n') {
                format!("{outer}{inner}")
            } else {
                format!("{outer}\n{inner}")
            }
        }
    }
}
