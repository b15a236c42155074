use std::collections::{HashSet, VecDeque};

use serde_json::Value;

use super::{assert_layout, LayoutRegistry};

/// Resolves the chain of layouts starting at `start`.
///
/// The result is ordered outermost-first: index 0 is the layout applied
/// last, the final entry is the layout closest to the content. An empty
/// vector means no layout applies.
///
/// The walk stops when a pointer is falsey, a name is missing from the
/// registry, or a name would repeat. A repeat is a cycle: `a -> a` stops
/// with `a` included once, `a -> b -> a` stops with both included once.
pub fn resolve_chain<R>(
    start: Option<&Value>,
    registry: &R,
    default_layout: Option<&str>,
) -> Vec<String>
where
    R: LayoutRegistry + ?Sized,
{
    let mut chain = VecDeque::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut current = assert_layout(start, default_layout);

    while let Some(name) = current.take() {
        let Some(layout) = registry.get_layout(&name) else {
            tracing::debug!(layout = %name, "layout not found, ending chain");
            break;
        };

        visited.insert(name.clone());
        chain.push_front(name.clone());

        match assert_layout(layout.layout(), default_layout) {
            Some(next) if next == name => {
                tracing::trace!(layout = %name, "layout points at itself");
            }
            Some(next) if visited.contains(&next) => {
                let path: Vec<&str> = chain.iter().rev().map(|s| s.as_str()).collect();
                tracing::warn!(
                    "layout cycle detected: {} -> {}",
                    path.join(" -> "),
                    next
                );
            }
            next => current = next,
        }
    }

    chain.into()
}
