//! Minimal JSONPath subset: `$.a.b`, `$.items[0]`, `$['odd key']`.
//! A path without a leading `$` is read as if it had one.
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

fn parse_path(path: &str) -> Option<Vec<Segment>> {
    let trimmed = path.trim();
    let normalized = match trimmed.strip_prefix('$') {
        Some(rest) => rest.to_owned(),
        None if trimmed.starts_with(['.', '[']) => trimmed.to_owned(),
        None => format!(".{trimmed}"),
    };

    let mut segments = Vec::new();
    let mut rest = normalized.as_str();
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let end = after.find(['.', '[']).unwrap_or(after.len());
            let key = after.get(..end)?;
            if key.is_empty() {
                return None;
            }
            segments.push(Segment::Key(key.to_owned()));
            rest = after.get(end..)?;
        } else if let Some(after) = rest.strip_prefix('[') {
            let end = after.find(']')?;
            let inner = after.get(..end)?.trim();
            let quoted = inner
                .strip_prefix('\'')
                .and_then(|value| value.strip_suffix('\''))
                .or_else(|| {
                    inner
                        .strip_prefix('"')
                        .and_then(|value| value.strip_suffix('"'))
                });
            match quoted {
                Some(key) => segments.push(Segment::Key(key.to_owned())),
                None => segments.push(Segment::Index(inner.parse().ok()?)),
            }
            rest = after.get(end.saturating_add(1)..)?;
        } else {
            return None;
        }
    }
    Some(segments)
}

/// Looks `path` up in `root`. Malformed paths and missing members give
/// `None`.
#[must_use]
pub fn lookup<'value>(root: &'value Value, path: &str) -> Option<&'value Value> {
    let segments = parse_path(path)?;
    segments
        .iter()
        .try_fold(root, |current, segment| match segment {
            Segment::Key(key) => current.get(key.as_str()),
            Segment::Index(index) => current.get(*index),
        })
}

/// Text form used for comparison and variable extraction: strings without
/// quotes, everything else as compact JSON.
#[must_use]
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => {
            value.to_string()
        }
    }
}
