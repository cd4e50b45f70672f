use std::time::Duration;

use reqwest::Url;
use serde_json::{Value, json};

use super::{SearchToolError, bounded_usize_arg, error_payload, optional_string_arg, required_string_arg};

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const DEFAULT_MAX_CHUNKS: usize = 5;
const MAX_CHUNKS_LIMIT: usize = 20;
const MAX_CHUNK_CHARS: usize = 1_200;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedChunk {
    pub text: String,
    pub score: usize,
}

pub fn query_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .filter(|token| token.len() > 2)
        .collect::<Vec<String>>()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Paragraphs of `markdown` ranked by how often they mention the query terms.
pub fn rank_chunks(markdown: &str, query: &str, max_chunks: usize) -> Vec<RankedChunk> {
    let terms = query_terms(query);
    if terms.is_empty() {
        return Vec::new();
    }

    let mut scored = markdown
        .split("\n\n")
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .filter_map(|chunk| {
            let body = chunk.to_ascii_lowercase();
            let score = terms
                .iter()
                .map(|term| body.matches(term.as_str()).count())
                .sum::<usize>();
            (score > 0).then(|| RankedChunk {
                text: truncate_chars(chunk, MAX_CHUNK_CHARS),
                score,
            })
        })
        .collect::<Vec<RankedChunk>>();

    scored.sort_by_key(|chunk| std::cmp::Reverse(chunk.score));
    scored.truncate(max_chunks.max(1));
    scored
}

/// Page to fetch: the given website, or a web search results page.
pub fn search_url(query: &str, website: Option<&str>) -> Result<Url, SearchToolError> {
    match website {
        Some(site) => {
            let url = Url::parse(site).map_err(|err| {
                SearchToolError::new("invalid_args", format!("'website' is not a valid URL: {err}"))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(SearchToolError::new(
                    "invalid_args",
                    "'website' must be an http or https URL",
                ));
            }
            Ok(url)
        }
        None => Url::parse_with_params(SEARCH_ENDPOINT, &[("q", query)]).map_err(|err| {
            SearchToolError::new("internal", format!("failed to build search URL: {err}"))
        }),
    }
}

async fn fetch_markdown(url: &Url) -> Result<String, SearchToolError> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("research-crew/", env!("CARGO_PKG_VERSION")))
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|err| SearchToolError::new("http_error", format!("failed to build client: {err}")))?;

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|err| SearchToolError::new("http_error", format!("request to {url} failed: {err}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SearchToolError::new(
            "http_status",
            format!("{url} returned HTTP {status}"),
        ));
    }

    let html = response
        .text()
        .await
        .map_err(|err| SearchToolError::new("http_error", format!("failed to read body: {err}")))?;

    htmd::convert(&html)
        .map_err(|err| SearchToolError::new("convert_failed", format!("html conversion failed: {err}")))
}

pub async fn website_search_tool_response(args: &Value) -> Value {
    let query = match required_string_arg(args, "query") {
        Ok(query) => query,
        Err(err) => return error_payload(super::WEBSITE_SEARCH_TOOL_NAME, err),
    };
    let website = optional_string_arg(args, "website");
    let max_chunks = bounded_usize_arg(args, "max_chunks", DEFAULT_MAX_CHUNKS, MAX_CHUNKS_LIMIT);

    let url = match search_url(&query, website.as_deref()) {
        Ok(url) => url,
        Err(err) => return error_payload(super::WEBSITE_SEARCH_TOOL_NAME, err),
    };

    tracing::debug!(query = %query, url = %url, "website search");
    let markdown = match fetch_markdown(&url).await {
        Ok(markdown) => markdown,
        Err(err) => return error_payload(super::WEBSITE_SEARCH_TOOL_NAME, err),
    };

    let chunks = rank_chunks(&markdown, &query, max_chunks);
    json!({
        "status": "ok",
        "kind": super::WEBSITE_SEARCH_TOOL_NAME,
        "query": query,
        "source": url.to_string(),
        "results": chunks
            .iter()
            .map(|chunk| json!({ "score": chunk.score, "text": chunk.text }))
            .collect::<Vec<Value>>()
    })
}
