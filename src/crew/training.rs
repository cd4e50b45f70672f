//! Human feedback collected during `train`, replayed into agent instructions.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::crew::pipeline::CrewRunner;
use crate::crew::{ResolvedCrew, TaskOutput};

const EXCERPT_CHARS: usize = 400;

pub type AgentSuggestions = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub iteration: u32,
    pub task: String,
    pub agent: String,
    pub output_excerpt: String,
    pub feedback: String,
    pub recorded_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingData {
    #[serde(default)]
    pub records: Vec<FeedbackRecord>,
    #[serde(default)]
    pub suggestions: AgentSuggestions,
}

impl TrainingData {
    pub fn record(&mut self, iteration: u32, task: &TaskOutput, feedback: &str) {
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return;
        }

        self.records.push(FeedbackRecord {
            iteration,
            task: task.name.clone(),
            agent: task.agent.clone(),
            output_excerpt: excerpt(&task.output),
            feedback: feedback.to_string(),
            recorded_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        });

        let entries = self.suggestions.entry(task.agent.clone()).or_default();
        if !entries.iter().any(|existing| existing == feedback) {
            entries.push(feedback.to_string());
        }
    }
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(EXCERPT_CHARS) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

pub fn load_training(path: &Path) -> Result<TrainingData> {
    if !path.exists() {
        return Ok(TrainingData::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read training file '{}'", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse training file '{}'", path.display()))
}

pub fn save_training(path: &Path, data: &TrainingData) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(data).context("failed to serialize training data")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write training file '{}'", path.display()))
}

/// Suggestions to apply on a normal run; absent or unreadable files yield none.
pub fn load_suggestions(path: &Path) -> AgentSuggestions {
    match load_training(path) {
        Ok(data) => {
            if !data.suggestions.is_empty() {
                tracing::info!(
                    path = %path.display(),
                    agents = data.suggestions.len(),
                    "Loaded training suggestions"
                );
            }
            data.suggestions
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %format!("{err:#}"), "Ignoring training file");
            AgentSuggestions::new()
        }
    }
}

pub trait FeedbackSource {
    /// Feedback for one task output; `None` or blank means no feedback.
    fn feedback(&mut self, iteration: u32, task: &TaskOutput) -> Result<Option<String>>;
}

/// Prompts on stdout and reads one line per task from stdin.
pub struct StdinFeedback;

impl FeedbackSource for StdinFeedback {
    fn feedback(&mut self, iteration: u32, task: &TaskOutput) -> Result<Option<String>> {
        println!();
        println!("--- iteration {iteration} | {} ({}) ---", task.name, task.agent);
        println!("{}", excerpt(&task.output));
        print!("Feedback for {} (empty to skip): ", task.agent);
        io::stdout().flush().context("failed to flush stdout")?;

        let mut line = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut line)
            .context("failed to read input from stdin")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()).filter(|value| !value.is_empty()))
    }
}

/// Kicks the crew off `n_iterations` times, asking for feedback on every task
/// and merging it into the training file after each iteration. Feedback
/// gathered so far is applied to the following iterations.
pub async fn run_training(
    runner: &CrewRunner,
    crew: &ResolvedCrew,
    n_iterations: u32,
    path: &Path,
    source: &mut dyn FeedbackSource,
) -> Result<TrainingData> {
    if n_iterations == 0 {
        return Err(anyhow::anyhow!("n_iterations must be at least 1"));
    }

    let mut data = load_training(path)?;
    for iteration in 1..=n_iterations {
        let iteration_runner = runner.with_suggestions(data.suggestions.clone());
        let output = iteration_runner.kickoff(crew).await?;

        for task in &output.tasks {
            if let Some(feedback) = source.feedback(iteration, task)? {
                data.record(iteration, task, &feedback);
            }
        }

        save_training(path, &data)?;
        tracing::info!(
            iteration,
            records = data.records.len(),
            path = %path.display(),
            "Training iteration saved"
        );
        runner.telemetry.emit(
            "training.iteration",
            serde_json::json!({ "iteration": iteration, "records": data.records.len() }),
        );
    }

    Ok(data)
}
