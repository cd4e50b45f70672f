use std::collections::HashMap;
use std::sync::Arc;

use adk_rust::futures::StreamExt;
use adk_rust::prelude::*;
use adk_rust::{SessionId, UserId};
use anyhow::{Context, Result};
use serde_json::{Value, json};

use crate::cli::Provider;
use crate::crew::template::shield_placeholders;
use crate::crew::training::AgentSuggestions;
use crate::crew::{CrewOutput, ResolvedCrew, ResolvedTask, TaskOutput};
use crate::session::{create_kickoff_session, kickoff_session_id};
use crate::streaming::{AuthorTextTracker, emit_tool_lifecycle_events, event_text};
use crate::telemetry::TelemetrySink;
use crate::tools::build_search_tools;

pub fn task_instruction(
    task: &ResolvedTask,
    earlier_tasks: &[&str],
    suggestions: Option<&Vec<String>>,
) -> String {
    let agent = &task.agent;
    let mut sections = vec![
        format!(
            "You are the {}.\nYour goal: {}\nBackground: {}",
            shield_placeholders(&agent.role),
            shield_placeholders(&agent.goal),
            shield_placeholders(&agent.backstory)
        ),
        format!("Task:\n{}", shield_placeholders(&task.description)),
        format!(
            "Expected output:\n{}",
            shield_placeholders(&task.expected_output)
        ),
    ];

    if !earlier_tasks.is_empty() {
        let refs = earlier_tasks
            .iter()
            .map(|name| format!("[{name}]\n{{{name}?}}"))
            .collect::<Vec<String>>()
            .join("\n\n");
        sections.push(format!("Context from earlier tasks:\n{refs}"));
    }

    if let Some(notes) = suggestions.filter(|notes| !notes.is_empty()) {
        sections.push(format!(
            "Reviewer feedback from training runs:\n{}",
            notes
                .iter()
                .map(|note| format!("- {}", shield_placeholders(note)))
                .collect::<Vec<String>>()
                .join("\n")
        ));
    }

    sections.join("\n\n")
}

pub fn kickoff_message(user_goal: &str) -> String {
    format!("Work on this goal and complete your assigned task: {user_goal}")
}

/// Runs a resolved crew through the framework's sequential agent.
#[derive(Clone)]
pub struct CrewRunner {
    pub model: Arc<dyn Llm>,
    pub provider: Provider,
    pub app_name: String,
    pub user_id: String,
    pub suggestions: AgentSuggestions,
    pub telemetry: TelemetrySink,
}

impl CrewRunner {
    pub fn with_suggestions(&self, suggestions: AgentSuggestions) -> Self {
        Self {
            suggestions,
            ..self.clone()
        }
    }

    /// One LLM agent per task from `start` onward, chained in order.
    pub fn build_crew_agent(&self, crew: &ResolvedCrew, start: usize) -> Result<Arc<dyn Agent>> {
        if start >= crew.tasks.len() {
            return Err(anyhow::anyhow!(
                "task id position {} is out of range for {} tasks",
                start + 1,
                crew.tasks.len()
            ));
        }

        let mut agents = Vec::<Arc<dyn Agent>>::with_capacity(crew.tasks.len() - start);
        for (index, task) in crew.tasks.iter().enumerate().skip(start) {
            let earlier = crew.tasks[..index]
                .iter()
                .map(|task| task.name.as_str())
                .collect::<Vec<&str>>();
            let instruction =
                task_instruction(task, &earlier, self.suggestions.get(&task.agent.name));

            let mut kinds = task.agent.tools.clone();
            kinds.extend(task.tools.iter().copied());

            let mut builder = LlmAgentBuilder::new(task.name.clone())
                .description(task.agent.role.clone())
                .instruction(instruction)
                .model(self.model.clone())
                .output_key(task.name.clone());
            for tool in build_search_tools(&kinds, self.provider) {
                builder = builder.tool(tool);
            }

            let agent = builder
                .build()
                .with_context(|| format!("failed to build agent for task '{}'", task.name))?;
            agents.push(Arc::new(agent));
        }

        Ok(Arc::new(SequentialAgent::new(crew.name.clone(), agents)))
    }

    pub async fn kickoff(&self, crew: &ResolvedCrew) -> Result<CrewOutput> {
        self.kickoff_from(crew, 0, &[]).await
    }

    /// Runs tasks from `start` onward. Earlier tasks take their text from
    /// `prior`, which also seeds the session state they are referenced from.
    pub async fn kickoff_from(
        &self,
        crew: &ResolvedCrew,
        start: usize,
        prior: &[TaskOutput],
    ) -> Result<CrewOutput> {
        let agent = self.build_crew_agent(crew, start)?;

        let prior_text = |name: &str| {
            prior
                .iter()
                .find(|task| task.name == name)
                .map(|task| task.output.clone())
                .unwrap_or_default()
        };
        let seed = crew.tasks[..start]
            .iter()
            .map(|task| (task.name.clone(), Value::String(prior_text(&task.name))))
            .collect::<HashMap<String, Value>>();

        let session_id = kickoff_session_id(&crew.name);
        let session_service =
            create_kickoff_session(&self.app_name, &self.user_id, &session_id, seed).await?;

        let runner = Runner::new(RunnerConfig {
            app_name: self.app_name.clone(),
            agent,
            session_service,
            artifact_service: Some(Arc::new(InMemoryArtifactService::new())),
            memory_service: None,
            plugin_manager: None,
            run_config: None,
            compaction_config: None,
            context_cache_config: None,
            cache_capable: None,
            request_context: None,
            cancellation_token: None,
        })
        .context("failed to build ADK runner")?;

        tracing::info!(
            crew = %crew.name,
            tasks = crew.tasks.len(),
            start_task = start + 1,
            session_id = %session_id,
            "Crew kickoff started"
        );
        self.telemetry.emit(
            "crew.started",
            json!({ "tasks": crew.tasks.len(), "start_task": start + 1, "session_id": session_id }),
        );

        let mut stream = runner
            .run(
                UserId::new(self.user_id.clone()).context("invalid user id")?,
                SessionId::new(session_id.clone()).context("invalid session id")?,
                Content::new("user").with_text(kickoff_message(&crew.user_goal)),
            )
            .await
            .context("failed to start crew run stream")?;

        let mut tracker = AuthorTextTracker::default();
        while let Some(event_result) = stream.next().await {
            let event = event_result.context("crew run stream failed")?;
            if event.author == "user" {
                continue;
            }
            let text = event_text(&event);
            tracing::debug!(
                task = %event.author,
                is_final = event.is_final_response(),
                partial = event.llm_response.partial,
                text_len = text.len(),
                "received crew event"
            );

            emit_tool_lifecycle_events(&event, &self.telemetry);
            tracker.ingest(
                &event.author,
                &text,
                event.llm_response.partial,
                event.is_final_response(),
            );
        }

        let tasks = crew
            .tasks
            .iter()
            .enumerate()
            .map(|(index, task)| {
                let output = if index < start {
                    prior_text(&task.name)
                } else {
                    let text = tracker.text_for(&task.name).unwrap_or_default();
                    tracing::info!(task = %task.name, output_len = text.len(), "Task completed");
                    self.telemetry.emit(
                        "task.completed",
                        json!({ "task": task.name, "agent": task.agent.name, "output_len": text.len() }),
                    );
                    text
                };
                TaskOutput {
                    name: task.name.clone(),
                    agent: task.agent.name.clone(),
                    agent_role: task.agent.role.clone(),
                    description: task.description.clone(),
                    expected_output: task.expected_output.clone(),
                    output,
                }
            })
            .collect::<Vec<TaskOutput>>();

        Ok(CrewOutput {
            crew_name: crew.name.clone(),
            user_goal: crew.user_goal.clone(),
            tasks,
        })
    }
}
