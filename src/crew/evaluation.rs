//! `test`: score every task output of repeated kickoffs with an evaluator model.

use std::sync::Arc;

use adk_rust::futures::StreamExt;
use adk_rust::prelude::*;
use anyhow::{Context, Result};
use serde_json::json;

use crate::crew::pipeline::CrewRunner;
use crate::crew::{ResolvedCrew, TaskOutput};

/// First integer in `reply`, accepted only when it lies in 1..=10.
pub fn parse_score(reply: &str) -> Option<u8> {
    let digits = reply
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect::<String>();
    let value = digits.parse::<u32>().ok()?;
    (1..=10).contains(&value).then_some(value as u8)
}

pub fn evaluation_prompt(user_goal: &str, task: &TaskOutput) -> String {
    format!(
        "You are grading one step of a research crew working on this goal:\n{user_goal}\n\n\
         Task: {}\nExpected output:\n{}\n\nActual output:\n{}\n\n\
         Rate how well the actual output meets the expected output on a scale from 1 to 10. \
         Reply with the integer score only.",
        task.description.trim(),
        task.expected_output.trim(),
        if task.has_output() {
            task.output.trim()
        } else {
            "<no output>"
        }
    )
}

pub async fn score_task(evaluator: &Arc<dyn Llm>, user_goal: &str, task: &TaskOutput) -> Result<Option<u8>> {
    let request = LlmRequest::new(
        evaluator.name().to_string(),
        vec![Content::new("user").with_text(evaluation_prompt(user_goal, task))],
    );
    let mut stream = evaluator
        .generate_content(request, false)
        .await
        .context("failed to invoke evaluator model")?;

    let mut reply = String::new();
    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.context("evaluator model stream error")?;
        if let Some(content) = chunk.content {
            for part in content.parts {
                if let Part::Text { text } = part {
                    reply.push_str(&text);
                }
            }
        }
    }

    let score = parse_score(&reply);
    if score.is_none() {
        tracing::warn!(task = %task.name, reply = %reply.trim(), "Evaluator reply had no usable score");
    }
    Ok(score)
}

/// Scores per task, one entry per iteration (`None` when unscored).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationTable {
    pub tasks: Vec<String>,
    pub scores: Vec<Vec<Option<u8>>>,
}

fn average(values: impl Iterator<Item = Option<u8>>) -> Option<f64> {
    let scored = values.flatten().map(f64::from).collect::<Vec<f64>>();
    (!scored.is_empty()).then(|| scored.iter().sum::<f64>() / scored.len() as f64)
}

impl EvaluationTable {
    pub fn iterations(&self) -> usize {
        self.scores.first().map(Vec::len).unwrap_or(0)
    }

    pub fn push_iteration(&mut self, scored: &[(String, Option<u8>)]) {
        for (name, score) in scored {
            let row = match self.tasks.iter().position(|task| task == name) {
                Some(row) => row,
                None => {
                    self.tasks.push(name.clone());
                    self.scores.push(vec![None; self.iterations()]);
                    self.tasks.len() - 1
                }
            };
            self.scores[row].push(*score);
        }
    }

    pub fn task_average(&self, row: usize) -> Option<f64> {
        average(self.scores.get(row)?.iter().copied())
    }

    pub fn crew_average(&self) -> Option<f64> {
        average(self.scores.iter().flatten().copied())
    }

    pub fn render(&self) -> String {
        let width = self
            .tasks
            .iter()
            .map(String::len)
            .max()
            .unwrap_or(0)
            .max("Crew".len());
        let cell = |score: Option<f64>| match score {
            Some(value) => format!("{value:>5.1}"),
            None => format!("{:>5}", "-"),
        };

        let mut header = format!("{:<width$}", "Task");
        for iteration in 1..=self.iterations() {
            header.push_str(&format!(" | {:>5}", format!("#{iteration}")));
        }
        header.push_str(" |   Avg");

        let mut lines = vec![header.clone(), "-".repeat(header.len())];
        for (row, name) in self.tasks.iter().enumerate() {
            let mut line = format!("{name:<width$}");
            for score in &self.scores[row] {
                line.push_str(&format!(" | {}", cell(score.map(f64::from))));
            }
            line.push_str(&format!(" | {}", cell(self.task_average(row))));
            lines.push(line);
        }

        let mut footer = format!("{:<width$}", "Crew");
        for iteration in 0..self.iterations() {
            footer.push_str(&format!(
                " | {}",
                cell(average(self.scores.iter().map(|row| row[iteration])))
            ));
        }
        footer.push_str(&format!(" | {}", cell(self.crew_average())));
        lines.push(footer);
        lines.join("\n")
    }
}

pub async fn run_evaluation(
    runner: &CrewRunner,
    crew: &ResolvedCrew,
    n_iterations: u32,
    evaluator: Arc<dyn Llm>,
) -> Result<EvaluationTable> {
    if n_iterations == 0 {
        return Err(anyhow::anyhow!("n_iterations must be at least 1"));
    }

    let mut table = EvaluationTable::default();
    for iteration in 1..=n_iterations {
        let output = runner.kickoff(crew).await?;
        let mut scored = Vec::with_capacity(output.tasks.len());
        for task in &output.tasks {
            let score = score_task(&evaluator, &output.user_goal, task).await?;
            scored.push((task.name.clone(), score));
        }
        tracing::info!(iteration, tasks = scored.len(), "Evaluation iteration scored");
        runner.telemetry.emit(
            "evaluation.iteration",
            json!({
                "iteration": iteration,
                "scores": scored
                    .iter()
                    .map(|(task, score)| json!({ "task": task, "score": score }))
                    .collect::<Vec<_>>()
            }),
        );
        table.push_iteration(&scored);
    }

    Ok(table)
}
