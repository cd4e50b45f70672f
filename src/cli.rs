use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Auto,
    Gemini,
    Openai,
    Anthropic,
    Deepseek,
    Groq,
    Ollama,
}

const CLI_EXAMPLES: &str = "Examples:\n\
  research-crew run \"Format api for agentic agents for netlify endpoints.\"\n\
  research-crew --provider openai --model gpt-4.1 run \"Design a webhook relay\"\n\
  research-crew train 3 trained_agents_data.json\n\
  research-crew outputs\n\
  research-crew replay search_github_task\n\
  research-crew test 2 gpt-4.1-mini\n\
  research-crew doctor\n\
\n\
Configuration:\n\
  - Agents and tasks are read from agents.yaml / tasks.yaml (see --agents-config, --tasks-config).\n\
  - Profiles live in .crew/config.toml; select one with --profile <name>.\n\
  - The github_search tool reads GITHUB_TOKEN.";

#[derive(Debug, Parser)]
#[command(name = "research-crew")]
#[command(about = "Sequential research crew built on ADK-Rust")]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    #[arg(long, env = "CREW_PROVIDER", value_enum, default_value_t = Provider::Auto)]
    pub provider: Provider,

    #[arg(long, env = "CREW_MODEL")]
    pub model: Option<String>,

    #[arg(long, env = "CREW_PROFILE", default_value = "default")]
    pub profile: String,

    #[arg(long, env = "CREW_CONFIG", default_value = ".crew/config.toml")]
    pub config_path: String,

    #[arg(long, env = "CREW_AGENTS_CONFIG")]
    pub agents_config: Option<String>,

    #[arg(long, env = "CREW_TASKS_CONFIG")]
    pub tasks_config: Option<String>,

    #[arg(long, env = "CREW_NAME")]
    pub crew_name: Option<String>,

    #[arg(long, env = "CREW_REPORT_DIR")]
    pub report_dir: Option<String>,

    #[arg(long, env = "CREW_OUTPUTS_PATH")]
    pub outputs_path: Option<String>,

    #[arg(long, env = "CREW_TRAINING_FILE")]
    pub training_file: Option<String>,

    #[arg(long, env = "CREW_USER_ID")]
    pub user_id: Option<String>,

    #[arg(long, env = "CREW_TELEMETRY_ENABLED", action = clap::ArgAction::Set)]
    pub telemetry_enabled: Option<bool>,

    #[arg(long, env = "CREW_TELEMETRY_PATH")]
    pub telemetry_path: Option<String>,

    #[arg(long, env = "RUST_LOG", default_value = "error")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Run the crew once for a goal and write the Markdown report")]
    Run {
        goal: Vec<String>,
    },
    #[command(about = "Run the crew N times and collect human feedback into a training file")]
    Train {
        n_iterations: u32,
        filename: String,
        #[arg(long)]
        goal: Option<String>,
    },
    #[command(about = "Re-run the latest kickoff starting from a task (name or 1-based position)")]
    Replay {
        task_id: String,
    },
    #[command(about = "Run the crew N times and score every task with an evaluator model")]
    Test {
        n_iterations: u32,
        model_name: String,
        #[arg(long)]
        goal: Option<String>,
    },
    #[command(about = "List task outputs stored by the latest kickoff")]
    Outputs,
    #[command(about = "Validate provider environment, GitHub token and crew configuration files")]
    Doctor,
}

pub fn command_label(command: &Commands) -> &'static str {
    match command {
        Commands::Run { .. } => "run",
        Commands::Train { .. } => "train",
        Commands::Replay { .. } => "replay",
        Commands::Test { .. } => "test",
        Commands::Outputs => "outputs",
        Commands::Doctor => "doctor",
    }
}

/// Exit status for a failed parse: help and version output succeed, every
/// other parse error exits 1 like any other command failure.
pub fn parse_error_exit_code(err: &clap::Error) -> i32 {
    match err.kind() {
        clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}
