//! Cleanup for the flow designer's Mermaid output.
//!
//! This is line-level text surgery. Malformed diagrams pass through with the
//! same edits applied and are not validated.

pub const START_CLASS: &str = "start";
pub const END_CLASS: &str = "end";

const START_STYLE: &str = "fill:#d4f4dd,stroke:#2e7d32,stroke-width:2px";
const END_STYLE: &str = "fill:#fde0dc,stroke:#c62828,stroke-width:2px";
const DEFAULT_STYLE: &str = "fill:#eef3fb,stroke:#4a6fa5";

pub fn class_style(name: &str) -> &'static str {
    match name {
        START_CLASS => START_STYLE,
        END_CLASS => END_STYLE,
        _ => DEFAULT_STYLE,
    }
}

pub fn clean_diagram(raw: &str) -> String {
    let body = extract_fenced_block(raw).unwrap_or_else(|| raw.trim().to_string());
    let with_inline = declare_inline_classes(&body);
    append_tag_declarations(&with_inline)
}

fn fence_tag(line: &str) -> Option<&str> {
    line.trim().strip_prefix("```").map(str::trim)
}

fn is_mermaid_opener(line: &str) -> bool {
    fence_tag(line).is_some_and(|tag| tag.eq_ignore_ascii_case("mermaid"))
}

fn is_tagged_opener(line: &str) -> bool {
    fence_tag(line).is_some_and(|tag| !tag.is_empty())
}

fn is_bare_fence(line: &str) -> bool {
    fence_tag(line).is_some_and(str::is_empty)
}

/// Moves `start` inward while another opener matching `is_opener` appears
/// before the first bare closing fence.
fn innermost_opener(lines: &[&str], mut start: usize, is_opener: fn(&str) -> bool) -> usize {
    loop {
        let nested = lines[start + 1..]
            .iter()
            .take_while(|line| !is_bare_fence(line))
            .position(|line| is_opener(line));
        match nested {
            Some(offset) => start = start + 1 + offset,
            None => return start,
        }
    }
}

/// Inner content of the preferred fenced block, `None` when there is no fence.
pub fn extract_fenced_block(raw: &str) -> Option<String> {
    let lines = raw.lines().collect::<Vec<&str>>();

    let start = match lines.iter().position(|line| is_mermaid_opener(line)) {
        Some(first) => innermost_opener(&lines, first, is_mermaid_opener),
        None => {
            let first = lines.iter().position(|line| fence_tag(line).is_some())?;
            innermost_opener(&lines, first, is_tagged_opener)
        }
    };

    let inner = lines[start + 1..]
        .iter()
        .take_while(|line| !is_bare_fence(line))
        .copied()
        .collect::<Vec<&str>>();

    Some(inner.join("\n").trim_matches('\n').to_string())
}

fn is_class_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Class name at the start of `text`. A hyphen that opens an edge
/// (`-->`, `-.->`, `->`) ends the name.
fn class_name_prefix(text: &str) -> &str {
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if !is_class_char(c) {
            return &text[..idx];
        }
        if c == '-' && chars.peek().is_some_and(|(_, next)| matches!(next, '-' | '.' | '>')) {
            return &text[..idx];
        }
    }
    text
}

/// Class names used through `:::name`, in order of first use.
fn inline_class_uses(line: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = line;
    while let Some(idx) = rest.find(":::") {
        let after = &rest[idx + 3..];
        let name = class_name_prefix(after).trim_end_matches('-');
        if !name.is_empty() && !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
        }
        rest = &after[name.len()..];
    }
    names
}

pub fn declared_classes(diagram: &str) -> Vec<String> {
    diagram
        .lines()
        .filter_map(|line| line.trim().strip_prefix("classDef "))
        .filter_map(|rest| rest.split_whitespace().next())
        .flat_map(|names| names.split(','))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

fn class_statement_uses(line: &str, class: &str) -> bool {
    let Some(rest) = line.trim().strip_prefix("class ") else {
        return false;
    };
    rest.split_whitespace()
        .last()
        .map(|name| name.trim_end_matches(';'))
        .is_some_and(|name| name == class)
}

fn declare_inline_classes(diagram: &str) -> String {
    let declared = declared_classes(diagram);
    let mut injected = Vec::<String>::new();
    let mut out = Vec::<String>::new();

    for line in diagram.lines() {
        let indent = &line[..line.len() - line.trim_start().len()];
        for name in inline_class_uses(line) {
            if declared.contains(&name) || injected.contains(&name) {
                continue;
            }
            out.push(format!("{indent}classDef {name} {}", class_style(&name)));
            injected.push(name);
        }
        out.push(line.to_string());
    }

    out.join("\n")
}

fn append_tag_declarations(diagram: &str) -> String {
    let declared = declared_classes(diagram);
    let mut out = diagram.to_string();

    for tag in [START_CLASS, END_CLASS] {
        if declared.iter().any(|name| name == tag) {
            continue;
        }
        let referenced = diagram.lines().any(|line| {
            class_statement_uses(line, tag) || inline_class_uses(line).iter().any(|n| n == tag)
        });
        if referenced {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&format!("classDef {tag} {}", class_style(tag)));
        }
    }

    out
}
