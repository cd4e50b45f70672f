use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing::level_filters::LevelFilter;

use research_crew::cli::{Cli, parse_error_exit_code};
use research_crew::commands::run_cli;
use research_crew::error::{categorize_error, format_cli_error};

fn init_tracing(log_filter: &str) -> Result<()> {
    let level = log_filter
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(log_filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = parse_error_exit_code(&err);
            if code == 0 {
                err.exit();
            }
            let _ = err.print();
            std::process::exit(code);
        }
    };
    if cli.command.is_none() {
        let _ = Cli::command().print_help();
        println!();
        std::process::exit(1);
    }

    let result = match init_tracing(&cli.log_filter) {
        Ok(()) => run_cli(cli).await,
        Err(err) => Err(err),
    };
    if let Err(err) = result {
        eprintln!("{}", format_cli_error(&err));
        tracing::error!(category = %categorize_error(&err).code(), error = %format!("{err:#}"), "command failed");
        std::process::exit(1);
    }

    Ok(())
}
