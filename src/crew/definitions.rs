//! Crew configuration: agents and tasks loaded from YAML.
//!
//! `CrewDefinition` is the raw, immutable configuration. `resolve` turns it
//! into a `ResolvedCrew` with the kickoff inputs interpolated, before any
//! framework agent exists.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::RuntimeConfig;
use crate::crew::template::{TemplateInputs, interpolate, is_identifier};
use crate::tools::SearchToolKind;

pub const AGENTS_FILE_NAME: &str = "agents.yaml";
pub const TASKS_FILE_NAME: &str = "tasks.yaml";

const EMBEDDED_AGENTS_YAML: &str = include_str!("../../config/agents.yaml");
const EMBEDDED_TASKS_YAML: &str = include_str!("../../config/tasks.yaml");

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentDefinition {
    #[serde(skip)]
    pub name: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub tools: Option<Vec<SearchToolKind>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskDefinition {
    #[serde(skip)]
    pub name: String,
    pub description: String,
    pub expected_output: String,
    pub agent: String,
    pub tools: Option<Vec<SearchToolKind>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Discovered(PathBuf),
    Embedded,
}

impl ConfigSource {
    pub fn label(&self) -> String {
        match self {
            ConfigSource::Explicit(path) => format!("{} (explicit)", path.display()),
            ConfigSource::Discovered(path) => format!("{} (discovered)", path.display()),
            ConfigSource::Embedded => "<embedded default>".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrewDefinition {
    pub name: String,
    pub agents: Vec<AgentDefinition>,
    pub tasks: Vec<TaskDefinition>,
    pub agents_source: ConfigSource,
    pub tasks_source: ConfigSource,
}

#[derive(Debug, Clone)]
pub struct ResolvedAgent {
    pub name: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub tools: Vec<SearchToolKind>,
}

#[derive(Debug, Clone)]
pub struct ResolvedTask {
    pub name: String,
    pub description: String,
    pub expected_output: String,
    pub agent: ResolvedAgent,
    pub tools: Vec<SearchToolKind>,
}

#[derive(Debug, Clone)]
pub struct ResolvedCrew {
    pub name: String,
    pub user_goal: String,
    pub tasks: Vec<ResolvedTask>,
}

impl ResolvedCrew {
    pub fn task_position(&self, name: &str) -> Option<usize> {
        self.tasks.iter().position(|task| task.name == name)
    }
}

/// Tools an agent gets when `agents.yaml` does not list any.
pub fn default_agent_tools(agent_name: &str) -> Vec<SearchToolKind> {
    match agent_name {
        "research_specialist" => vec![SearchToolKind::WebsiteSearch],
        "github_explorer" => vec![SearchToolKind::GithubSearch],
        _ => Vec::new(),
    }
}

/// Tools a task gets when `tasks.yaml` does not list any.
pub fn default_task_tools(task_name: &str) -> Vec<SearchToolKind> {
    match task_name {
        "research_topic_task" => vec![SearchToolKind::WebsiteSearch],
        "search_github_task" => vec![SearchToolKind::GithubSearch],
        _ => Vec::new(),
    }
}

pub fn config_candidates(file_name: &str) -> Vec<PathBuf> {
    let mut candidates = vec![
        PathBuf::from("config").join(file_name),
        PathBuf::from("src/config").join(file_name),
        PathBuf::from("crew/config").join(file_name),
    ];
    if let Ok(dir) = std::env::var("CREW_CONFIG_DIR")
        && !dir.trim().is_empty()
    {
        candidates.push(PathBuf::from(dir.trim()).join(file_name));
    }
    if let Ok(home) = std::env::var("HOME") {
        candidates.push(PathBuf::from(home).join(".crew").join(file_name));
    }
    candidates
}

/// Finds a crew config file: the explicit path must exist, otherwise the
/// first existing candidate wins, otherwise the embedded default is used.
pub fn locate_config(explicit: Option<&str>, candidates: &[PathBuf]) -> Result<ConfigSource> {
    if let Some(path) = explicit.map(str::trim).filter(|value| !value.is_empty()) {
        let path = PathBuf::from(path);
        if !path.is_file() {
            return Err(anyhow::anyhow!(
                "crew config file '{}' does not exist",
                path.display()
            ));
        }
        return Ok(ConfigSource::Explicit(path));
    }

    for candidate in candidates {
        tracing::debug!(path = %candidate.display(), "probing crew config candidate");
        if candidate.is_file() {
            return Ok(ConfigSource::Discovered(candidate.clone()));
        }
    }

    Ok(ConfigSource::Embedded)
}

fn read_source(source: &ConfigSource, embedded: &'static str) -> Result<String> {
    match source {
        ConfigSource::Explicit(path) | ConfigSource::Discovered(path) => {
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read crew config '{}'", path.display()))
        }
        ConfigSource::Embedded => Ok(embedded.to_string()),
    }
}

/// Parses a YAML mapping of `name -> T`, keeping document order.
fn parse_named_entries<T>(content: &str, origin: &str) -> Result<Vec<(String, T)>>
where
    T: serde::de::DeserializeOwned,
{
    let mapping = serde_yaml::from_str::<serde_yaml::Mapping>(content)
        .with_context(|| format!("invalid yaml in crew config {origin}"))?;

    let mut entries = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let name = key
            .as_str()
            .map(str::trim)
            .filter(|name| is_identifier(name))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "crew config {origin} has an invalid entry name {key:?}; names must be identifiers"
                )
            })?
            .to_string();
        let parsed = serde_yaml::from_value::<T>(value)
            .with_context(|| format!("invalid yaml for '{name}' in crew config {origin}"))?;
        entries.push((name, parsed));
    }
    Ok(entries)
}

pub fn parse_agents(content: &str, origin: &str) -> Result<Vec<AgentDefinition>> {
    Ok(parse_named_entries::<AgentDefinition>(content, origin)?
        .into_iter()
        .map(|(name, mut agent)| {
            agent.name = name;
            agent
        })
        .collect())
}

pub fn parse_tasks(content: &str, origin: &str) -> Result<Vec<TaskDefinition>> {
    Ok(parse_named_entries::<TaskDefinition>(content, origin)?
        .into_iter()
        .map(|(name, mut task)| {
            task.name = name;
            task.agent = task.agent.trim().to_string();
            task
        })
        .collect())
}

impl CrewDefinition {
    pub fn from_parts(
        name: &str,
        agents: Vec<AgentDefinition>,
        tasks: Vec<TaskDefinition>,
        agents_source: ConfigSource,
        tasks_source: ConfigSource,
    ) -> Result<Self> {
        if tasks.is_empty() {
            return Err(anyhow::anyhow!(
                "crew config {} defines no tasks",
                tasks_source.label()
            ));
        }

        for task in &tasks {
            if !agents.iter().any(|agent| agent.name == task.agent) {
                let mut names = agents
                    .iter()
                    .map(|agent| agent.name.clone())
                    .collect::<Vec<String>>();
                names.sort();
                return Err(anyhow::anyhow!(
                    "task '{}' references unknown agent '{}'. Available agents: {}",
                    task.name,
                    task.agent,
                    names.join(", ")
                ));
            }
        }

        Ok(Self {
            name: name.to_string(),
            agents,
            tasks,
            agents_source,
            tasks_source,
        })
    }

    pub fn load(cfg: &RuntimeConfig) -> Result<Self> {
        let agents_source = locate_config(
            cfg.agents_config.as_deref(),
            &config_candidates(AGENTS_FILE_NAME),
        )?;
        let tasks_source = locate_config(
            cfg.tasks_config.as_deref(),
            &config_candidates(TASKS_FILE_NAME),
        )?;

        for (file, source) in [(AGENTS_FILE_NAME, &agents_source), (TASKS_FILE_NAME, &tasks_source)] {
            if *source == ConfigSource::Embedded {
                tracing::warn!(file, "no crew config file found; using embedded default");
            } else {
                tracing::info!(file, source = %source.label(), "Loaded crew config");
            }
        }

        let agents = parse_agents(
            &read_source(&agents_source, EMBEDDED_AGENTS_YAML)?,
            &agents_source.label(),
        )?;
        let tasks = parse_tasks(
            &read_source(&tasks_source, EMBEDDED_TASKS_YAML)?,
            &tasks_source.label(),
        )?;

        Self::from_parts(&cfg.crew_name, agents, tasks, agents_source, tasks_source)
    }

    pub fn embedded(name: &str) -> Result<Self> {
        Self::from_parts(
            name,
            parse_agents(EMBEDDED_AGENTS_YAML, "<embedded default>")?,
            parse_tasks(EMBEDDED_TASKS_YAML, "<embedded default>")?,
            ConfigSource::Embedded,
            ConfigSource::Embedded,
        )
    }

    pub fn agent(&self, name: &str) -> Option<&AgentDefinition> {
        self.agents.iter().find(|agent| agent.name == name)
    }

    /// Interpolates the kickoff inputs into every agent and task template.
    pub fn resolve(&self, user_goal: &str) -> Result<ResolvedCrew> {
        let inputs = TemplateInputs::from([("user_goal".to_string(), user_goal.to_string())]);

        let mut tasks = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            let agent = self.agent(&task.agent).ok_or_else(|| {
                anyhow::anyhow!("task '{}' references unknown agent '{}'", task.name, task.agent)
            })?;
            let resolved_agent = resolve_agent(agent, &inputs)?;
            tasks.push(ResolvedTask {
                name: task.name.clone(),
                description: interpolate(task.description.trim(), &inputs)
                    .with_context(|| format!("task '{}' description", task.name))?,
                expected_output: interpolate(task.expected_output.trim(), &inputs)
                    .with_context(|| format!("task '{}' expected_output", task.name))?,
                tools: task
                    .tools
                    .clone()
                    .unwrap_or_else(|| default_task_tools(&task.name)),
                agent: resolved_agent,
            });
        }

        Ok(ResolvedCrew {
            name: self.name.clone(),
            user_goal: user_goal.to_string(),
            tasks,
        })
    }
}

fn resolve_agent(agent: &AgentDefinition, inputs: &TemplateInputs) -> Result<ResolvedAgent> {
    let field = |label: &str, template: &str| {
        interpolate(template.trim(), inputs)
            .with_context(|| format!("agent '{}' {label}", agent.name))
    };
    Ok(ResolvedAgent {
        name: agent.name.clone(),
        role: field("role", &agent.role)?,
        goal: field("goal", &agent.goal)?,
        backstory: field("backstory", &agent.backstory)?,
        tools: agent
            .tools
            .clone()
            .unwrap_or_else(|| default_agent_tools(&agent.name)),
    })
}

pub fn describe_source(path: &Path) -> String {
    if path.is_file() {
        format!("{} (found)", path.display())
    } else {
        format!("{} (missing)", path.display())
    }
}
