pub mod definitions;
pub mod evaluation;
pub mod pipeline;
pub mod store;
pub mod template;
pub mod training;

use serde::{Deserialize, Serialize};

pub use definitions::{CrewDefinition, ResolvedCrew, ResolvedTask};

/// Text produced by one task of a kickoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutput {
    pub name: String,
    pub agent: String,
    pub agent_role: String,
    pub description: String,
    pub expected_output: String,
    pub output: String,
}

impl TaskOutput {
    pub fn has_output(&self) -> bool {
        !self.output.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrewOutput {
    pub crew_name: String,
    pub user_goal: String,
    pub tasks: Vec<TaskOutput>,
}

