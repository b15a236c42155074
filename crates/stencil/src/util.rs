//! Small helpers shared across modules: extension handling, dotted paths,
//! shallow map merging and output prettifying.

use serde_json::{Map, Value};
use std::path::Path;

/// Strings that read as "no" when used as a layout pointer.
const FALSEY: &[&str] = &["false", "none", "nil", "null", "undefined", "0"];

/// Normalizes an extension to its lowercase, leading-dot form.
///
/// ```rust
/// use stencil::normalize_ext;
///
/// assert_eq!(normalize_ext("md"), ".md");
/// assert_eq!(normalize_ext(".HTML"), ".html");
/// assert_eq!(normalize_ext(""), "");
/// ```
pub fn normalize_ext(ext: &str) -> String {
    let ext = ext.trim().trim_start_matches('.');
    if ext.is_empty() {
        return String::new();
    }
    format!(".{}", ext.to_ascii_lowercase())
}

/// Returns the normalized extension of a path-like string, if it has one.
pub fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(normalize_ext)
        .filter(|ext| !ext.is_empty())
}

/// Returns true for strings that spell out a negative (`"false"`, `"none"`, ...).
pub fn is_falsey_str(value: &str) -> bool {
    let value = value.trim();
    FALSEY.iter().any(|f| f.eq_ignore_ascii_case(value))
}

/// Looks up a dotted path (`site.author.name`) in a map.
pub fn get_path<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = map.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(inner) => inner.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Sets a dotted path, creating (or replacing non-object) intermediate levels.
pub fn set_path(map: &mut Map<String, Value>, path: &str, value: Value) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let Some(last) = parts.pop() else {
        return;
    };

    let mut current = map;
    for part in parts {
        let slot = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(inner) = slot else {
            return;
        };
        current = inner;
    }
    current.insert(last.to_string(), value);
}

/// Copies every key of `source` onto `target`, overwriting existing keys.
pub fn extend(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }
}

/// Copies keys of `source` that `target` does not have yet.
pub fn extend_missing(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        if !target.contains_key(key) {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Normalizes whitespace in rendered output.
///
/// Line endings become `\n`, trailing whitespace is stripped from every line,
/// runs of blank lines collapse to one, leading blank lines are dropped and
/// the result ends with exactly one newline.
pub fn prettify(output: &str) -> String {
    let mut result = String::with_capacity(output.len());
    let mut blank_run = false;

    for line in output.replace("\r\n", "\n").lines() {
        let line = line.trim_end();
        if line.is_empty() {
            if !result.is_empty() {
                blank_run = true;
            }
            continue;
        }
        if blank_run {
            result.push('\n');
            blank_run = false;
        }
        result.push_str(line);
        result.push('\n');
    }

    result
}
