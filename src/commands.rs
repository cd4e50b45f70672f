use std::path::Path;
use std::sync::Arc;

use adk_rust::prelude::Llm;
use anyhow::Result;
use serde_json::json;

use crate::cli::{Cli, Commands, Provider, command_label};
use crate::config::{RuntimeConfig, load_profiles, resolve_runtime_config, resolve_user_goal};
use crate::crew::definitions::CrewDefinition;
use crate::crew::evaluation::run_evaluation;
use crate::crew::pipeline::CrewRunner;
use crate::crew::store::{load_kickoff, print_kickoff, save_kickoff};
use crate::crew::training::{AgentSuggestions, FeedbackSource, StdinFeedback, load_suggestions, run_training};
use crate::crew::{CrewOutput, ResolvedCrew};
use crate::doctor::run_doctor;
use crate::provider::{evaluator_config, resolve_model};
use crate::report::persist_report;
use crate::telemetry::TelemetrySink;

pub fn crew_runner(
    cfg: &RuntimeConfig,
    model: Arc<dyn Llm>,
    provider: Provider,
    suggestions: AgentSuggestions,
    telemetry: TelemetrySink,
) -> CrewRunner {
    CrewRunner {
        model,
        provider,
        app_name: cfg.app_name.clone(),
        user_id: cfg.user_id.clone(),
        suggestions,
        telemetry,
    }
}

fn runner_from_config(cfg: &RuntimeConfig, telemetry: &TelemetrySink) -> Result<CrewRunner> {
    let (model, provider, model_name) = resolve_model(cfg)?;
    tracing::info!(provider = ?provider, model = %model_name, "Using model");
    telemetry.emit(
        "model.resolved",
        json!({
            "provider": format!("{provider:?}").to_ascii_lowercase(),
            "model": model_name
        }),
    );
    Ok(crew_runner(
        cfg,
        model,
        provider,
        load_suggestions(Path::new(&cfg.training_file)),
        telemetry.clone(),
    ))
}

/// Stores the outputs for replay and writes the report. A report failure
/// does not fail the command.
pub fn finish_kickoff(cfg: &RuntimeConfig, output: &CrewOutput, telemetry: &TelemetrySink) -> Result<()> {
    save_kickoff(Path::new(&cfg.outputs_path), output)?;
    if let Some(path) = persist_report(&cfg.report_dir, output, telemetry) {
        println!("Report written to {}", path.display());
    }
    Ok(())
}

fn print_final_output(output: &CrewOutput) {
    if let Some(last) = output.tasks.iter().rev().find(|task| task.has_output()) {
        println!("{}", last.output.trim());
    }
}

pub async fn run_kickoff(
    cfg: &RuntimeConfig,
    crew: &ResolvedCrew,
    runner: &CrewRunner,
) -> Result<CrewOutput> {
    let output = runner.kickoff(crew).await?;
    finish_kickoff(cfg, &output, &runner.telemetry)?;
    Ok(output)
}

pub async fn replay_kickoff(
    cfg: &RuntimeConfig,
    definition: &CrewDefinition,
    runner: &CrewRunner,
    task_id: &str,
) -> Result<CrewOutput> {
    let stored = load_kickoff(Path::new(&cfg.outputs_path))?;
    let stored_index = stored.resolve_task_position(task_id)?;
    let task_name = &stored.tasks[stored_index].output.name;

    let crew = definition.resolve(&stored.user_goal)?;
    let start = crew.task_position(task_name).ok_or_else(|| {
        anyhow::anyhow!(
            "task id '{}' ({}) is not part of the current crew config",
            task_id,
            task_name
        )
    })?;

    tracing::info!(task = %task_name, start_task = start + 1, "Replaying crew");
    let output = runner
        .kickoff_from(&crew, start, &stored.task_outputs())
        .await?;
    finish_kickoff(cfg, &output, &runner.telemetry)?;
    Ok(output)
}

pub async fn train_crew(
    cfg: &RuntimeConfig,
    crew: &ResolvedCrew,
    runner: &CrewRunner,
    n_iterations: u32,
    filename: &str,
    source: &mut dyn FeedbackSource,
) -> Result<()> {
    let data = run_training(runner, crew, n_iterations, Path::new(filename), source).await?;
    println!(
        "Training complete: {} feedback records for {} agents saved to {}",
        data.records.len(),
        data.suggestions.len(),
        filename
    );
    if filename != cfg.training_file {
        println!(
            "Note: runs read suggestions from '{}'; pass --training-file {} to use this file.",
            cfg.training_file, filename
        );
    }
    Ok(())
}

pub async fn run_cli(cli: Cli) -> Result<()> {
    let Some(command) = cli.command.as_ref() else {
        return Err(anyhow::anyhow!("missing command"));
    };
    let profiles = load_profiles(&cli.config_path)?;
    let cfg = resolve_runtime_config(&cli, &profiles)?;
    let telemetry = TelemetrySink::new(&cfg, command_label(command));
    telemetry.emit("command.started", json!({}));

    let result = dispatch(&cfg, command, &telemetry).await;
    match &result {
        Ok(()) => telemetry.emit("command.completed", json!({})),
        Err(err) => telemetry.emit("command.failed", json!({ "error": format!("{err:#}") })),
    }
    result
}

async fn dispatch(cfg: &RuntimeConfig, command: &Commands, telemetry: &TelemetrySink) -> Result<()> {
    match command {
        Commands::Run { goal } => {
            let definition = CrewDefinition::load(cfg)?;
            let crew = definition.resolve(&resolve_user_goal(cfg, goal))?;
            let runner = runner_from_config(cfg, telemetry)?;
            let output = run_kickoff(cfg, &crew, &runner).await?;
            print_final_output(&output);
        }
        Commands::Train {
            n_iterations,
            filename,
            goal,
        } => {
            let trained = async {
                let definition = CrewDefinition::load(cfg)?;
                let goal = goal.clone().unwrap_or_else(|| cfg.user_goal.clone());
                let crew = definition.resolve(&goal)?;
                let runner = runner_from_config(cfg, telemetry)?;
                train_crew(cfg, &crew, &runner, *n_iterations, filename, &mut StdinFeedback).await
            };
            trained
                .await
                .map_err(|err| err.context("an error occurred while training the crew"))?;
        }
        Commands::Replay { task_id } => {
            let replayed = async {
                let definition = CrewDefinition::load(cfg)?;
                let runner = runner_from_config(cfg, telemetry)?;
                replay_kickoff(cfg, &definition, &runner, task_id).await
            };
            let output = replayed
                .await
                .map_err(|err| err.context("an error occurred while replaying the crew"))?;
            print_final_output(&output);
        }
        Commands::Test {
            n_iterations,
            model_name,
            goal,
        } => {
            let tested = async {
                let definition = CrewDefinition::load(cfg)?;
                let goal = goal.clone().unwrap_or_else(|| cfg.user_goal.clone());
                let crew = definition.resolve(&goal)?;
                let runner = runner_from_config(cfg, telemetry)?;

                let (evaluator, evaluator_provider, evaluator_name) =
                    resolve_model(&evaluator_config(cfg, model_name))?;
                tracing::info!(provider = ?evaluator_provider, model = %evaluator_name, "Using evaluator model");

                run_evaluation(&runner, &crew, *n_iterations, evaluator).await
            };
            let table = tested
                .await
                .map_err(|err| err.context("an error occurred while testing the crew"))?;
            println!("{}", table.render());
        }
        Commands::Outputs => {
            print_kickoff(&load_kickoff(Path::new(&cfg.outputs_path))?);
        }
        Commands::Doctor => run_doctor(cfg)?,
    }
    Ok(())
}
