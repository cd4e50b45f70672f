//! Task outputs of the latest kickoff, kept on disk for `replay` and `outputs`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::crew::{CrewOutput, TaskOutput};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTask {
    pub position: usize,
    #[serde(flatten)]
    pub output: TaskOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredKickoff {
    pub crew_name: String,
    pub user_goal: String,
    pub recorded_at: String,
    pub tasks: Vec<StoredTask>,
}

impl StoredKickoff {
    pub fn from_output(output: &CrewOutput) -> Self {
        Self {
            crew_name: output.crew_name.clone(),
            user_goal: output.user_goal.clone(),
            recorded_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            tasks: output
                .tasks
                .iter()
                .enumerate()
                .map(|(index, task)| StoredTask {
                    position: index + 1,
                    output: task.clone(),
                })
                .collect(),
        }
    }

    pub fn task_outputs(&self) -> Vec<TaskOutput> {
        self.tasks.iter().map(|task| task.output.clone()).collect()
    }

    /// Zero-based index for a task id given as a task name or 1-based position.
    pub fn resolve_task_position(&self, task_id: &str) -> Result<usize> {
        let task_id = task_id.trim();
        if let Some(index) = self.tasks.iter().position(|task| task.output.name == task_id) {
            return Ok(index);
        }
        if let Ok(position) = task_id.parse::<usize>()
            && (1..=self.tasks.len()).contains(&position)
        {
            return Ok(position - 1);
        }

        Err(anyhow::anyhow!(
            "unknown task id '{}'. Stored tasks: {}",
            task_id,
            self.tasks
                .iter()
                .map(|task| format!("{}={}", task.position, task.output.name))
                .collect::<Vec<String>>()
                .join(", ")
        ))
    }
}

pub fn save_kickoff(path: &Path, output: &CrewOutput) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&StoredKickoff::from_output(output))
        .context("failed to serialize kickoff outputs")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write kickoff outputs '{}'", path.display()))
}

pub fn load_kickoff(path: &Path) -> Result<StoredKickoff> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "no stored kickoff outputs at '{}'. Run the crew first",
            path.display()
        ));
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read kickoff outputs '{}'", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse kickoff outputs '{}'", path.display()))
}

pub fn print_kickoff(stored: &StoredKickoff) {
    println!(
        "Latest kickoff of '{}' ({}):",
        stored.crew_name, stored.recorded_at
    );
    println!("Goal: {}", stored.user_goal);
    for task in &stored.tasks {
        let preview = task
            .output
            .output
            .lines()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("<empty>");
        println!(
            "{:>2}. {} [{}] {}",
            task.position, task.output.name, task.output.agent, preview
        );
    }
}
