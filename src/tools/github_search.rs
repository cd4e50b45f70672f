use std::io;

use serde_json::{Value, json};

use super::{
    GITHUB_SEARCH_TOOL_NAME, SearchToolError, bounded_usize_arg, error_payload,
    required_string_arg,
};

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Code,
    Repositories,
}

impl ContentType {
    pub fn label(self) -> &'static str {
        match self {
            ContentType::Code => "code",
            ContentType::Repositories => "repositories",
        }
    }

    fn parse(value: &str) -> Result<Self, SearchToolError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "code" => Ok(ContentType::Code),
            "repositories" | "repos" | "repo" => Ok(ContentType::Repositories),
            other => Err(SearchToolError::new(
                "invalid_args",
                format!("unsupported content type '{other}'. Use code or repositories"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubCliOutput {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

pub fn github_token() -> Option<String> {
    ["GITHUB_TOKEN", "GH_TOKEN"].iter().find_map(|key| {
        std::env::var(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

pub fn parse_content_types(args: &Value) -> Result<Vec<ContentType>, SearchToolError> {
    let Some(raw) = args.get("content_types") else {
        return Ok(vec![ContentType::Code, ContentType::Repositories]);
    };
    let Some(values) = raw.as_array() else {
        return Err(SearchToolError::new(
            "invalid_args",
            "'content_types' must be an array of strings",
        ));
    };

    let mut types = Vec::new();
    for value in values.iter().filter_map(Value::as_str) {
        let parsed = ContentType::parse(value)?;
        if !types.contains(&parsed) {
            types.push(parsed);
        }
    }
    if types.is_empty() {
        return Err(SearchToolError::new(
            "invalid_args",
            "'content_types' must name at least one of code, repositories",
        ));
    }
    Ok(types)
}

/// `gh` argument lists, one per requested content type.
pub fn build_search_commands(args: &Value) -> Result<Vec<(ContentType, Vec<String>)>, SearchToolError> {
    let query = required_string_arg(args, "query")?;
    let limit = bounded_usize_arg(args, "limit", DEFAULT_LIMIT, MAX_LIMIT).to_string();

    Ok(parse_content_types(args)?
        .into_iter()
        .map(|content_type| {
            let (subcommand, fields) = match content_type {
                ContentType::Code => ("code", "path,repository,url"),
                ContentType::Repositories => ("repos", "fullName,description,url,stargazersCount"),
            };
            let command = vec![
                "search".to_string(),
                subcommand.to_string(),
                query.clone(),
                "--limit".to_string(),
                limit.clone(),
                "--json".to_string(),
                fields.to_string(),
            ];
            (content_type, command)
        })
        .collect())
}

pub fn run_gh_command(args: &[String]) -> Result<GitHubCliOutput, SearchToolError> {
    let mut command = std::process::Command::new("gh");
    command.args(args);
    if let Some(token) = github_token() {
        command.env("GH_TOKEN", token);
    }

    let output = command.output().map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            SearchToolError::new(
                "gh_missing",
                "GitHub CLI 'gh' was not found. Install gh and retry.",
            )
        } else {
            SearchToolError::new("io_error", format!("failed to run gh command: {err}"))
        }
    })?;

    Ok(GitHubCliOutput {
        success: output.status.success(),
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

pub fn github_search_tool_response_with_runner<F>(
    args: &Value,
    token_present: bool,
    mut runner: F,
) -> Value
where
    F: FnMut(&[String]) -> Result<GitHubCliOutput, SearchToolError>,
{
    let commands = match build_search_commands(args) {
        Ok(commands) => commands,
        Err(err) => return error_payload(GITHUB_SEARCH_TOOL_NAME, err),
    };

    if !token_present {
        let auth_command = vec!["auth".to_string(), "status".to_string()];
        let auth_ok = runner(&auth_command).map(|out| out.success).unwrap_or(false);
        if !auth_ok {
            return error_payload(
                GITHUB_SEARCH_TOOL_NAME,
                SearchToolError::new(
                    "auth_required",
                    "GitHub auth not detected. Set GITHUB_TOKEN or run `gh auth login`.",
                ),
            );
        }
    }

    let mut results = serde_json::Map::new();
    for (content_type, command) in commands {
        let output = match runner(&command) {
            Ok(output) => output,
            Err(err) => return error_payload(GITHUB_SEARCH_TOOL_NAME, err),
        };
        if !output.success {
            return json!({
                "status": "error",
                "kind": GITHUB_SEARCH_TOOL_NAME,
                "code": "github_command_failed",
                "error": format!("gh command exited with non-zero status: {}", output.exit_code),
                "command": format!("gh {}", command.join(" ")),
                "stderr": output.stderr
            });
        }
        let parsed = serde_json::from_str::<Value>(output.stdout.trim())
            .unwrap_or_else(|_| Value::String(output.stdout.clone()));
        results.insert(content_type.label().to_string(), parsed);
    }

    json!({
        "status": "ok",
        "kind": GITHUB_SEARCH_TOOL_NAME,
        "query": args.get("query").and_then(Value::as_str).unwrap_or_default().trim(),
        "results": Value::Object(results)
    })
}

pub fn github_search_tool_response(args: &Value) -> Value {
    github_search_tool_response_with_runner(args, github_token().is_some(), run_gh_command)
}
