use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde_json::{Value, json};

use crate::config::RuntimeConfig;

/// Append-only JSONL event log. Writes are best effort.
#[derive(Debug, Clone)]
pub struct TelemetrySink {
    pub enabled: bool,
    pub path: PathBuf,
    pub run_id: String,
    pub command: String,
    pub crew: String,
    file_lock: Arc<Mutex<()>>,
}

impl TelemetrySink {
    pub fn new(cfg: &RuntimeConfig, command: &str) -> Self {
        let run_id = format!(
            "run-{}-{}",
            chrono::Utc::now().timestamp_millis(),
            std::process::id()
        );
        Self {
            enabled: cfg.telemetry_enabled,
            path: PathBuf::from(&cfg.telemetry_path),
            run_id,
            command: command.to_string(),
            crew: cfg.crew_name.clone(),
            file_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            path: PathBuf::new(),
            run_id: String::new(),
            command: String::new(),
            crew: String::new(),
            file_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn emit(&self, event: &str, payload: Value) {
        if !self.enabled {
            return;
        }

        let mut record = serde_json::Map::new();
        record.insert(
            "ts_unix_ms".to_string(),
            json!(chrono::Utc::now().timestamp_millis()),
        );
        record.insert("event".to_string(), json!(event));
        record.insert("run_id".to_string(), json!(self.run_id));
        record.insert("command".to_string(), json!(self.command));
        record.insert("crew".to_string(), json!(self.crew));

        if let Some(map) = payload.as_object() {
            for (key, value) in map {
                record.insert(key.clone(), value.clone());
            }
        }

        if let Err(err) = self.append_line(&Value::Object(record)) {
            tracing::warn!(
                event = event,
                path = %self.path.display(),
                error = %err,
                "telemetry write failed"
            );
        }
    }

    fn append_line(&self, value: &Value) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create telemetry directory '{}'", parent.display())
            })?;
        }

        let _guard = self.file_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open telemetry path '{}'", self.path.display()))?;

        serde_json::to_writer(&mut file, value)
            .with_context(|| format!("failed to serialize telemetry event for '{}'", self.command))?;
        writeln!(file).context("failed to write telemetry newline")
    }
}
