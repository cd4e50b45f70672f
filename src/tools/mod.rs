pub mod github_search;
pub mod website_search;

use std::sync::Arc;

use adk_rust::prelude::*;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::cli::Provider;

pub const WEBSITE_SEARCH_TOOL_NAME: &str = "website_search";
pub const GITHUB_SEARCH_TOOL_NAME: &str = "github_search";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchToolKind {
    WebsiteSearch,
    GithubSearch,
}

impl SearchToolKind {
    pub fn name(self) -> &'static str {
        match self {
            SearchToolKind::WebsiteSearch => WEBSITE_SEARCH_TOOL_NAME,
            SearchToolKind::GithubSearch => GITHUB_SEARCH_TOOL_NAME,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchToolError {
    pub code: &'static str,
    pub message: String,
}

impl SearchToolError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

pub fn error_payload(kind: &str, err: SearchToolError) -> Value {
    json!({
        "status": "error",
        "kind": kind,
        "code": err.code,
        "error": err.message
    })
}

pub fn required_string_arg(args: &Value, key: &str) -> std::result::Result<String, SearchToolError> {
    optional_string_arg(args, key)
        .ok_or_else(|| SearchToolError::new("invalid_args", format!("'{key}' is required")))
}

pub fn optional_string_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn bounded_usize_arg(args: &Value, key: &str, default: usize, max: usize) -> usize {
    args.get(key)
        .and_then(Value::as_u64)
        .map(|value| value as usize)
        .unwrap_or(default)
        .clamp(1, max)
}

fn build_website_search_tool() -> Arc<dyn Tool> {
    Arc::new(FunctionTool::new(
        WEBSITE_SEARCH_TOOL_NAME,
        "Searches the web or a single website and returns the most relevant Markdown passages. \
         Args: query (required), website (optional http(s) URL to search within), max_chunks.",
        |_ctx, args| async move { Ok(website_search::website_search_tool_response(&args).await) },
    ))
}

fn build_github_search_tool() -> Arc<dyn Tool> {
    Arc::new(FunctionTool::new(
        GITHUB_SEARCH_TOOL_NAME,
        "Searches GitHub code and repositories through the gh CLI. \
         Args: query (required), content_types (array of code|repositories, default both), limit.",
        |_ctx, args| async move { Ok(github_search::github_search_tool_response(&args)) },
    ))
}

/// Framework tools for the given kinds. Gemini gets its native Google search in
/// place of `website_search`.
pub fn build_search_tools(kinds: &[SearchToolKind], provider: Provider) -> Vec<Arc<dyn Tool>> {
    let mut unique = kinds.to_vec();
    unique.sort();
    unique.dedup();
    tracing::debug!(
        tools = ?unique.iter().map(|kind| kind.name()).collect::<Vec<&str>>(),
        provider = ?provider,
        "Attaching search tools"
    );

    unique
        .into_iter()
        .map(|kind| match kind {
            SearchToolKind::WebsiteSearch if provider == Provider::Gemini => {
                Arc::new(adk_tool::builtin::GoogleSearchTool::new()) as Arc<dyn Tool>
            }
            SearchToolKind::WebsiteSearch => build_website_search_tool(),
            SearchToolKind::GithubSearch => build_github_search_tool(),
        })
        .collect()
}
