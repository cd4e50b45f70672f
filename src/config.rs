use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::*;

pub const DEFAULT_CREW_NAME: &str = "research_crew";
pub const DEFAULT_USER_GOAL: &str = "Format api for agentic agents for netlify endpoints.";
pub const DEFAULT_OUTPUTS_PATH: &str = ".crew/latest_kickoff_task_outputs.json";
pub const DEFAULT_TRAINING_FILE: &str = "trained_agents_data.json";

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub profile: String,
    pub config_path: String,
    pub provider: Provider,
    pub model: Option<String>,
    pub app_name: String,
    pub user_id: String,
    pub crew_name: String,
    pub user_goal: String,
    pub agents_config: Option<String>,
    pub tasks_config: Option<String>,
    pub report_dir: String,
    pub outputs_path: String,
    pub training_file: String,
    pub telemetry_enabled: bool,
    pub telemetry_path: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub app_name: Option<String>,
    pub user_id: Option<String>,
    pub crew_name: Option<String>,
    pub user_goal: Option<String>,
    pub agents_config: Option<String>,
    pub tasks_config: Option<String>,
    pub report_dir: Option<String>,
    pub outputs_path: Option<String>,
    pub training_file: Option<String>,
    pub telemetry_enabled: Option<bool>,
    pub telemetry_path: Option<String>,
}

pub fn load_profiles(config_path: &str) -> Result<ProfilesFile> {
    let path = Path::new(config_path);
    if !path.exists() {
        return Ok(ProfilesFile::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile config file at '{}'", path.display()))?;
    toml::from_str::<ProfilesFile>(&content).with_context(|| {
        format!(
            "invalid profile configuration in '{}'. Check provider values and field names.",
            path.display()
        )
    })
}

pub fn resolve_runtime_config(cli: &Cli, profiles: &ProfilesFile) -> Result<RuntimeConfig> {
    let selected = cli.profile.trim();
    if selected.is_empty() {
        return Err(anyhow::anyhow!(
            "profile name cannot be empty. Set --profile <name>."
        ));
    }

    let profile = if selected == "default" && !profiles.profiles.contains_key("default") {
        ProfileConfig::default()
    } else {
        profiles.profiles.get(selected).cloned().ok_or_else(|| {
            let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
            names.sort();
            if names.is_empty() {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. No profiles are defined yet.",
                    selected,
                    cli.config_path
                )
            } else {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. Available profiles: {}",
                    selected,
                    cli.config_path,
                    names.join(", ")
                )
            }
        })?
    };

    let provider = if cli.provider != Provider::Auto {
        cli.provider
    } else {
        profile.provider.unwrap_or(Provider::Auto)
    };

    let crew_name = cli
        .crew_name
        .clone()
        .or(profile.crew_name)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_CREW_NAME.to_string());

    Ok(RuntimeConfig {
        profile: selected.to_string(),
        config_path: cli.config_path.clone(),
        provider,
        model: cli.model.clone().or(profile.model),
        app_name: profile
            .app_name
            .unwrap_or_else(|| "research-crew".to_string()),
        user_id: cli
            .user_id
            .clone()
            .or(profile.user_id)
            .unwrap_or_else(|| "local-user".to_string()),
        crew_name,
        user_goal: profile
            .user_goal
            .unwrap_or_else(|| DEFAULT_USER_GOAL.to_string()),
        agents_config: cli.agents_config.clone().or(profile.agents_config),
        tasks_config: cli.tasks_config.clone().or(profile.tasks_config),
        report_dir: cli
            .report_dir
            .clone()
            .or(profile.report_dir)
            .unwrap_or_else(|| "reports".to_string()),
        outputs_path: cli
            .outputs_path
            .clone()
            .or(profile.outputs_path)
            .unwrap_or_else(|| DEFAULT_OUTPUTS_PATH.to_string()),
        training_file: cli
            .training_file
            .clone()
            .or(profile.training_file)
            .unwrap_or_else(|| DEFAULT_TRAINING_FILE.to_string()),
        telemetry_enabled: cli
            .telemetry_enabled
            .or(profile.telemetry_enabled)
            .unwrap_or(true),
        telemetry_path: cli
            .telemetry_path
            .clone()
            .or(profile.telemetry_path)
            .unwrap_or_else(|| ".crew/telemetry/events.jsonl".to_string()),
    })
}

/// Goal for a kickoff: explicit words win over the profile's goal.
pub fn resolve_user_goal(cfg: &RuntimeConfig, words: &[String]) -> String {
    let joined = words.join(" ");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        cfg.user_goal.clone()
    } else {
        trimmed.to_string()
    }
}
