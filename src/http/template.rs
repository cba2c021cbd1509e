use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

/// Names filled in per request by the load scheduler.
pub const BUILTIN_VARIABLES: [&str; 4] = ["seq", "lane", "timestamp_ms", "timestamp_s"];

/// Replaces every `{{name}}` with `vars[name]`. Placeholders with no value
/// are copied through untouched so the caller can see what did not resolve.
#[must_use]
pub fn render_template(input: &str, vars: &BTreeMap<String, String>) -> String {
    let mut missing = BTreeSet::new();
    render_tracked(input, vars, &mut missing)
}

/// Same as [`render_template`], recording the names that had no value.
pub(crate) fn render_tracked(
    input: &str,
    vars: &BTreeMap<String, String>,
    missing: &mut BTreeSet<String>,
) -> String {
    let mut rest = input;
    let mut output = String::with_capacity(input.len());

    loop {
        let Some(start) = rest.find("{{") else {
            output.push_str(rest);
            break;
        };
        let (before, after_start) = rest.split_at(start);
        output.push_str(before);
        let Some(after) = after_start.strip_prefix("{{") else {
            output.push_str(after_start);
            break;
        };
        let Some(end) = after.find("}}") else {
            output.push_str(after_start);
            break;
        };
        let (key_part, after_end) = after.split_at(end);
        let key = key_part.trim();
        if let Some(value) = vars.get(key) {
            output.push_str(value);
        } else {
            if !key.is_empty() {
                missing.insert(key.to_owned());
            }
            output.push_str("{{");
            output.push_str(key_part);
            output.push_str("}}");
        }
        rest = match after_end.strip_prefix("}}") {
            Some(remaining) => remaining,
            None => {
                output.push_str(after_end);
                break;
            }
        };
    }

    output
}

/// Lists the trimmed placeholder names appearing in `input`, in order.
pub(crate) fn placeholder_names(input: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = input;
    while let Some(start) = rest.find("{{") {
        let after = rest.get(start.saturating_add(2)..).unwrap_or_default();
        let Some(end) = after.find("}}") else {
            break;
        };
        let name = after.get(..end).unwrap_or_default().trim();
        if !name.is_empty() {
            names.push(name.to_owned());
        }
        rest = after.get(end.saturating_add(2)..).unwrap_or_default();
    }
    names
}

pub(crate) fn uses_builtin_variables(input: &str) -> bool {
    placeholder_names(input)
        .iter()
        .any(|name| BUILTIN_VARIABLES.contains(&name.as_str()))
}

pub(crate) fn builtin_variables(seq: u64, lane: usize) -> BTreeMap<String, String> {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis());

    let mut vars = BTreeMap::new();
    vars.insert("seq".to_owned(), seq.to_string());
    vars.insert("lane".to_owned(), lane.to_string());
    vars.insert("timestamp_ms".to_owned(), now_ms.to_string());
    vars.insert("timestamp_s".to_owned(), (now_ms / 1000).to_string());
    vars
}
