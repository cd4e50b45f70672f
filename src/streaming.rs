use std::collections::HashMap;

use adk_rust::prelude::*;
use serde_json::{Value, json};

use crate::telemetry::TelemetrySink;

/// Accumulates streamed text per event author (one author per crew task).
#[derive(Default, Debug)]
pub struct AuthorTextTracker {
    pub by_author: HashMap<String, String>,
    pub final_by_author: HashMap<String, String>,
}

impl AuthorTextTracker {
    pub fn ingest(&mut self, author: &str, text: &str, partial: bool, is_final: bool) {
        if text.is_empty() {
            return;
        }

        let buffer = self.by_author.entry(author.to_string()).or_default();
        ingest_author_text(buffer, text, partial, is_final);

        if is_final && !text.trim().is_empty() {
            self.final_by_author
                .insert(author.to_string(), text.to_string());
        }
    }

    /// Final snapshot for `author` when one arrived, otherwise the streamed text.
    pub fn text_for(&self, author: &str) -> Option<String> {
        let text = self
            .final_by_author
            .get(author)
            .or_else(|| self.by_author.get(author))?;
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// Merges `text` into `buffer`. Partial chunks append, snapshots that extend
/// the buffer replace it, and overlapping snapshots only add their new suffix.
pub fn ingest_author_text(buffer: &mut String, text: &str, partial: bool, is_final: bool) {
    if text.is_empty() || text == buffer.as_str() {
        return;
    }

    if partial || buffer.is_empty() {
        buffer.push_str(text);
        return;
    }

    // A final snapshot replaces whatever was streamed for the author.
    if is_final || text.starts_with(buffer.as_str()) {
        *buffer = text.to_string();
        return;
    }

    let overlap = suffix_prefix_overlap(buffer, text);
    if overlap < text.len() {
        buffer.push_str(&text[overlap..]);
    }
}

pub fn suffix_prefix_overlap(existing: &str, incoming: &str) -> usize {
    let max_len = existing.len().min(incoming.len());
    let mut boundaries = incoming
        .char_indices()
        .map(|(idx, _)| idx)
        .collect::<Vec<usize>>();
    boundaries.push(incoming.len());

    boundaries
        .into_iter()
        .rev()
        .filter(|boundary| *boundary > 0 && *boundary <= max_len)
        .find(|boundary| existing.ends_with(&incoming[..*boundary]))
        .unwrap_or(0)
}

pub fn event_text(event: &Event) -> String {
    match event.content() {
        Some(content) => content
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(""),
        None => String::new(),
    }
}

pub fn extract_tool_failure_message(response: &Value) -> Option<String> {
    if let Some(message) = response.get("error").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    let status = response
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if status.eq_ignore_ascii_case("error") || status.eq_ignore_ascii_case("failed") {
        return Some(
            response
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("tool reported failure")
                .to_string(),
        );
    }
    None
}

pub fn emit_tool_lifecycle_events(event: &Event, telemetry: &TelemetrySink) {
    let Some(content) = event.content() else {
        return;
    };

    for part in &content.parts {
        match part {
            Part::FunctionCall { name, .. } => {
                tracing::info!(tool = %name, task = %event.author, lifecycle = "requested", "Tool call requested");
                telemetry.emit("tool.requested", json!({ "tool": name, "task": event.author }));
            }
            Part::FunctionResponse {
                function_response, ..
            } => match extract_tool_failure_message(&function_response.response) {
                Some(error_message) => {
                    tracing::warn!(
                        tool = %function_response.name,
                        task = %event.author,
                        lifecycle = "failed",
                        error = %error_message,
                        "Tool execution failed"
                    );
                    telemetry.emit(
                        "tool.failed",
                        json!({
                            "tool": function_response.name,
                            "task": event.author,
                            "error": error_message
                        }),
                    );
                }
                None => {
                    tracing::info!(
                        tool = %function_response.name,
                        task = %event.author,
                        lifecycle = "succeeded",
                        "Tool execution completed"
                    );
                    telemetry.emit(
                        "tool.succeeded",
                        json!({ "tool": function_response.name, "task": event.author }),
                    );
                }
            },
            _ => {}
        }
    }
}
