use std::collections::HashMap;
use std::sync::Arc;

use adk_session::*;
use anyhow::{Context, Result};
use serde_json::Value;

/// A fresh in-memory session for one kickoff, with `state` pre-seeded.
pub async fn create_kickoff_session(
    app_name: &str,
    user_id: &str,
    session_id: &str,
    state: HashMap<String, Value>,
) -> Result<Arc<dyn SessionService>> {
    let service: Arc<dyn SessionService> = Arc::new(InMemorySessionService::new());
    let seeded = state.len();

    service
        .create(CreateRequest {
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            session_id: Some(session_id.to_string()),
            state,
        })
        .await
        .with_context(|| {
            format!("failed to create session '{session_id}' for app '{app_name}'")
        })?;

    tracing::debug!(session_id, seeded_keys = seeded, "Created kickoff session");
    Ok(service)
}

pub fn kickoff_session_id(crew_name: &str) -> String {
    format!(
        "{crew_name}-{}",
        chrono::Utc::now().format("%Y%m%dT%H%M%S%3f")
    )
}
