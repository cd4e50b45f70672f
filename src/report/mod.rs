pub mod diagram;
pub mod fallback;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;

use crate::crew::{CrewOutput, TaskOutput};
use crate::telemetry::TelemetrySink;

pub const FLOW_DESIGNER_AGENT: &str = "flow_designer";
pub const TASK_HEADING_PREFIX: &str = "## Task ";
pub const SUPPLEMENTARY_HEADING: &str = "## Supplementary notes";
const EMPTY_OUTPUT_NOTE: &str = "_No output was produced for this task._";

pub fn report_path(report_dir: &str, crew_name: &str) -> PathBuf {
    Path::new(report_dir).join(format!("{crew_name}_report.md"))
}

fn title_case(name: &str) -> String {
    name.split(['_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn render_task_output(task: &TaskOutput) -> String {
    if !task.has_output() {
        return EMPTY_OUTPUT_NOTE.to_string();
    }
    if task.agent == FLOW_DESIGNER_AGENT {
        return format!("```mermaid\n{}\n```", diagram::clean_diagram(&task.output));
    }
    task.output.trim().to_string()
}

pub fn render_report(output: &CrewOutput, generated_at: &str) -> String {
    let mut sections = vec![format!(
        "# {} Report\n\n**Goal:** {}\n\n**Generated:** {}",
        title_case(&output.crew_name),
        output.user_goal.trim(),
        generated_at
    )];

    for (index, task) in output.tasks.iter().enumerate() {
        sections.push(format!(
            "{TASK_HEADING_PREFIX}{}: {}\n\n**Agent:** {} (`{}`)\n\n### Description\n\n{}\n\n### Expected output\n\n{}\n\n### Output\n\n{}",
            index + 1,
            task.name,
            task.agent_role.trim(),
            task.agent,
            task.description.trim(),
            task.expected_output.trim(),
            render_task_output(task)
        ));
    }

    let missing = fallback::missing_agents(&output.tasks);
    if !missing.is_empty() {
        let mut notes = vec![SUPPLEMENTARY_HEADING.to_string()];
        for agent in missing {
            if let Some(paragraph) = fallback::fallback_paragraph(agent) {
                notes.push(format!("### {agent}\n\n{paragraph}"));
            }
        }
        sections.push(notes.join("\n\n"));
    }

    let mut report = sections.join("\n\n");
    report.push('\n');
    report
}

pub fn write_report(report_dir: &str, output: &CrewOutput) -> Result<PathBuf> {
    let path = report_path(report_dir, &output.crew_name);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create report directory '{}'", parent.display()))?;
    }

    let generated_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    std::fs::write(&path, render_report(output, &generated_at))
        .with_context(|| format!("failed to write report '{}'", path.display()))?;
    Ok(path)
}

fn directory_listing(dir: &Path) -> String {
    match std::fs::read_dir(dir) {
        Ok(entries) => {
            let mut names = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().to_string())
                .collect::<Vec<String>>();
            names.sort();
            if names.is_empty() {
                "<empty>".to_string()
            } else {
                names.join(", ")
            }
        }
        Err(err) => format!("<unreadable: {err}>"),
    }
}

/// Writes the report; failures are logged with diagnostics and swallowed.
pub fn persist_report(
    report_dir: &str,
    output: &CrewOutput,
    telemetry: &TelemetrySink,
) -> Option<PathBuf> {
    match write_report(report_dir, output) {
        Ok(path) => {
            tracing::info!(path = %path.display(), tasks = output.tasks.len(), "Report written");
            telemetry.emit(
                "report.written",
                json!({ "path": path.display().to_string(), "tasks": output.tasks.len() }),
            );
            Some(path)
        }
        Err(err) => {
            let cwd = std::env::current_dir().unwrap_or_default();
            let inspected = Path::new(report_dir)
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| cwd.clone());
            tracing::error!(
                error = %format!("{err:#}"),
                cwd = %cwd.display(),
                inspected = %inspected.display(),
                entries = %directory_listing(&inspected),
                "Report write failed; continuing"
            );
            telemetry.emit("report.failed", json!({ "error": format!("{err:#}") }));
            eprintln!("Warning: report could not be written: {err:#}");
            None
        }
    }
}
