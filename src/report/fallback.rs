//! Static notes appended to the report for expected agents that produced nothing.

use std::collections::BTreeSet;

use crate::crew::TaskOutput;

pub const EXPECTED_AGENTS: [&str; 5] = [
    "research_specialist",
    "github_explorer",
    "flow_designer",
    "implementation_planner",
    "prompt_generator",
];

pub fn fallback_paragraph(agent: &str) -> Option<&'static str> {
    let text = match agent {
        "research_specialist" => {
            "No web research was captured for this run. Start from the platform's official \
             documentation for serverless and edge functions, note request and response size \
             limits, cold start behaviour, authentication options for function endpoints, and \
             how environment variables are injected at deploy time."
        }
        "github_explorer" => {
            "No repository findings were captured for this run. Search GitHub for public \
             projects that expose agent tool calls over HTTP functions, and compare how they \
             describe endpoints (OpenAPI documents, JSON schema tool manifests), how they \
             validate input, and how they report errors back to the calling agent."
        }
        "flow_designer" => {
            "No flow diagram was produced for this run. A minimal flow is: the agent selects a \
             tool from a published manifest, sends a JSON request to the function endpoint, \
             the endpoint validates and executes the call, and a structured JSON result or \
             error object is returned to the agent."
        }
        "implementation_planner" => {
            "No implementation plan was produced for this run. Begin with a single endpoint \
             and its schema, add request validation and consistent error payloads, publish a \
             machine readable manifest for agents, then add authentication, rate limits and \
             deployment previews before widening the API surface."
        }
        "prompt_generator" => {
            "No implementation prompt was produced for this run. Ask the coding assistant to \
             scaffold one documented function endpoint with a JSON schema for its input, \
             structured error responses, a manifest describing the tool for agents, and tests \
             that exercise both valid and invalid requests."
        }
        _ => return None,
    };
    Some(text)
}

/// Expected agents with no task that produced non-empty output, in expected order.
pub fn missing_agents(tasks: &[TaskOutput]) -> Vec<&'static str> {
    let present = tasks
        .iter()
        .filter(|task| task.has_output())
        .map(|task| task.agent.as_str())
        .collect::<BTreeSet<&str>>();

    EXPECTED_AGENTS
        .iter()
        .copied()
        .filter(|agent| !present.contains(agent))
        .collect()
}
