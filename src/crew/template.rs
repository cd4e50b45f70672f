//! `{name}` placeholder interpolation for agent and task templates.
//!
//! Only identifier-shaped placeholders are recognised, so braces that occur in
//! prose or code samples (`{ "json": true }`, `{}`) are copied verbatim.

use std::collections::BTreeMap;

use anyhow::Result;

pub type TemplateInputs = BTreeMap<String, String>;

pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Byte span `(start, end)` of the next `{identifier}` at or after `from`,
/// where `end` is one past the closing brace.
fn next_placeholder(template: &str, from: usize) -> Option<(usize, usize)> {
    let mut cursor = from;
    while let Some(offset) = template[cursor..].find('{') {
        let start = cursor + offset;
        let Some(close) = template[start + 1..].find('}') else {
            return None;
        };
        let end = start + 1 + close;
        if is_identifier(&template[start + 1..end]) {
            return Some((start, end + 1));
        }
        cursor = start + 1;
    }
    None
}

/// Unique placeholder names in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names = Vec::<String>::new();
    let mut cursor = 0usize;
    while let Some((start, end)) = next_placeholder(template, cursor) {
        let name = &template[start + 1..end - 1];
        if !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
        }
        cursor = end;
    }
    names
}

pub fn interpolate(template: &str, inputs: &TemplateInputs) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut cursor = 0usize;

    while let Some((start, end)) = next_placeholder(template, cursor) {
        let name = &template[start + 1..end - 1];
        let value = inputs.get(name).ok_or_else(|| {
            let mut known = inputs.keys().cloned().collect::<Vec<String>>();
            known.sort();
            anyhow::anyhow!(
                "missing template input '{}'. Provided inputs: {}",
                name,
                if known.is_empty() {
                    "<none>".to_string()
                } else {
                    known.join(", ")
                }
            )
        })?;
        out.push_str(&template[cursor..start]);
        out.push_str(value);
        cursor = end;
    }

    out.push_str(&template[cursor..]);
    Ok(out)
}

fn is_state_key_char(c: char) -> bool {
    c == '_' || c == ':' || c == '.' || c.is_ascii_alphanumeric()
}

/// Span of the next brace group the session-state templating would resolve:
/// `{key}`, `{user:key}`, `{artifact.name}`, optionally ending in `?`.
fn next_state_reference(text: &str, from: usize) -> Option<(usize, usize)> {
    let mut cursor = from;
    while let Some(offset) = text[cursor..].find('{') {
        let start = cursor + offset;
        let close = text[start + 1..].find('}')? + start + 1;
        let body = &text[start + 1..close];
        let key = body.strip_suffix('?').unwrap_or(body);
        let starts_ok = key
            .chars()
            .next()
            .is_some_and(|c| c == '_' || c.is_ascii_alphabetic());
        if starts_ok && key.chars().all(is_state_key_char) {
            return Some((start, close + 1));
        }
        cursor = start + 1;
    }
    None
}

/// Pads state references (`{name}` becomes `{ name }`) so downstream
/// state templating leaves already-resolved text alone.
pub fn shield_placeholders(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    while let Some((start, end)) = next_state_reference(text, cursor) {
        out.push_str(&text[cursor..start]);
        out.push_str("{ ");
        out.push_str(&text[start + 1..end - 1]);
        out.push_str(" }");
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}
