#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Provider,
    Config,
    Tooling,
    Input,
    Internal,
}

impl ErrorCategory {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::Provider => "PROVIDER",
            ErrorCategory::Config => "CONFIG",
            ErrorCategory::Tooling => "TOOLING",
            ErrorCategory::Input => "INPUT",
            ErrorCategory::Internal => "INTERNAL",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            ErrorCategory::Provider => {
                "Set provider credentials (for example OPENAI_API_KEY) or run with --provider ollama."
            }
            ErrorCategory::Config => {
                "Check agents.yaml/tasks.yaml (--agents-config, --tasks-config) and .crew/config.toml."
            }
            ErrorCategory::Tooling => {
                "Review search tool setup (GITHUB_TOKEN, gh CLI) and retry with RUST_LOG=info."
            }
            ErrorCategory::Input => "Run research-crew --help and correct command arguments.",
            ErrorCategory::Internal => {
                "Retry with RUST_LOG=debug. If it persists, capture logs and open an issue."
            }
        }
    }
}

pub fn categorize_error(err: &anyhow::Error) -> ErrorCategory {
    let msg = format!("{err:#}").to_ascii_lowercase();

    if msg.contains("api_key")
        || msg.contains("no provider could be auto-detected")
        || msg.contains("provider")
    {
        return ErrorCategory::Provider;
    }

    if msg.contains("yaml")
        || msg.contains("template input")
        || msg.contains("crew config")
        || msg.contains("unknown agent")
    {
        return ErrorCategory::Config;
    }

    if msg.contains("invalid value")
        || msg.contains("unknown argument")
        || msg.contains("failed to read input")
        || msg.contains("profile")
        || msg.contains("task id")
        || msg.contains("iterations")
    {
        return ErrorCategory::Input;
    }

    if msg.contains("tool") || msg.contains("github") || msg.contains("search") {
        return ErrorCategory::Tooling;
    }

    ErrorCategory::Internal
}

pub fn format_cli_error(err: &anyhow::Error) -> String {
    let category = categorize_error(err);
    format!("[{}] {:#}\nHint: {}", category.code(), err, category.hint())
}
