use std::path::Path;

use anyhow::Result;

use crate::config::RuntimeConfig;
use crate::crew::definitions::{
    AGENTS_FILE_NAME, TASKS_FILE_NAME, config_candidates, describe_source, locate_config,
};
use crate::provider::{detect_provider, env_present};
use crate::report::report_path;
use crate::tools::github_search::github_token;

fn gh_version() -> Option<String> {
    let output = std::process::Command::new("gh")
        .arg("--version")
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|line| line.trim().to_string())
}

pub fn run_doctor(cfg: &RuntimeConfig) -> Result<()> {
    println!(
        "Active profile: '{}' (config: {})",
        cfg.profile, cfg.config_path
    );

    let checks = [
        "GOOGLE_API_KEY",
        "OPENAI_API_KEY",
        "ANTHROPIC_API_KEY",
        "DEEPSEEK_API_KEY",
        "GROQ_API_KEY",
        "OLLAMA_HOST",
    ];
    println!("Provider environment check:");
    for key in checks {
        let status = if env_present(key) { "set" } else { "missing" };
        println!("- {key}: {status}");
    }

    match detect_provider() {
        Some(provider) => println!("Auto provider resolution: {provider:?}"),
        None => {
            println!("Auto provider resolution: none");
            println!("Tip: export one provider key or run with --provider ollama");
        }
    }
    println!(
        "Model override: {}",
        cfg.model.as_deref().unwrap_or("<provider-default>")
    );

    println!("GitHub search:");
    println!(
        "- GITHUB_TOKEN: {}",
        if github_token().is_some() { "set" } else { "missing" }
    );
    match gh_version() {
        Some(version) => println!("- gh CLI: {version}"),
        None => println!("- gh CLI: not found (github_search will report gh_missing)"),
    }

    println!("Crew '{}' configuration:", cfg.crew_name);
    for (file, explicit) in [
        (AGENTS_FILE_NAME, cfg.agents_config.as_deref()),
        (TASKS_FILE_NAME, cfg.tasks_config.as_deref()),
    ] {
        let candidates = config_candidates(file);
        match locate_config(explicit, &candidates) {
            Ok(source) => println!("- {file}: {}", source.label()),
            Err(err) => println!("- {file}: error: {err:#}"),
        }
        for candidate in &candidates {
            println!("    {}", describe_source(candidate));
        }
    }

    println!(
        "Report: {}",
        report_path(&cfg.report_dir, &cfg.crew_name).display()
    );
    println!(
        "Latest outputs: {} ({})",
        cfg.outputs_path,
        if Path::new(&cfg.outputs_path).exists() { "present" } else { "none yet" }
    );
    println!(
        "Training file: {} ({})",
        cfg.training_file,
        if Path::new(&cfg.training_file).exists() { "present" } else { "none yet" }
    );
    println!(
        "Telemetry: enabled={} path={}",
        cfg.telemetry_enabled, cfg.telemetry_path
    );

    Ok(())
}
