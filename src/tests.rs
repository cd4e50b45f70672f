use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use adk_rust::LlmResponse;
use adk_rust::model::MockLlm;
use adk_rust::prelude::*;
use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tempfile::tempdir;

use crate::cli::*;
use crate::commands::*;
use crate::config::*;
use crate::crew::definitions::*;
use crate::crew::evaluation::*;
use crate::crew::pipeline::*;
use crate::crew::store::*;
use crate::crew::training::*;
use crate::crew::*;
use crate::error::*;
use crate::provider::*;
use crate::report::*;
use crate::telemetry::*;
use crate::tools::github_search::*;
use crate::tools::*;

const GOAL: &str = "Format api for agentic agents for netlify endpoints.";

fn base_cfg(root: &Path) -> RuntimeConfig {
    RuntimeConfig {
        profile: "default".to_string(),
        config_path: root.join("config.toml").display().to_string(),
        provider: Provider::Openai,
        model: Some("gpt-4.1-mini".to_string()),
        app_name: "research-crew-test".to_string(),
        user_id: "tester".to_string(),
        crew_name: DEFAULT_CREW_NAME.to_string(),
        user_goal: GOAL.to_string(),
        agents_config: None,
        tasks_config: None,
        report_dir: root.join("reports").display().to_string(),
        outputs_path: root.join(".crew/latest.json").display().to_string(),
        training_file: root.join("trained.json").display().to_string(),
        telemetry_enabled: false,
        telemetry_path: root.join("events.jsonl").display().to_string(),
    }
}

fn test_cli(config_path: &str, profile: &str) -> Cli {
    Cli {
        provider: Provider::Auto,
        model: None,
        profile: profile.to_string(),
        config_path: config_path.to_string(),
        agents_config: None,
        tasks_config: None,
        crew_name: None,
        report_dir: None,
        outputs_path: None,
        training_file: None,
        user_id: None,
        telemetry_enabled: None,
        telemetry_path: None,
        log_filter: "warn".to_string(),
        command: Some(Commands::Doctor),
    }
}

fn mock_model(text: &str) -> Arc<dyn Llm> {
    Arc::new(
        MockLlm::new("mock").with_response(LlmResponse::new(Content::new("model").with_text(text))),
    )
}

fn test_runner(cfg: &RuntimeConfig, text: &str) -> CrewRunner {
    crew_runner(
        cfg,
        mock_model(text),
        Provider::Openai,
        AgentSuggestions::new(),
        TelemetrySink::disabled(),
    )
}

fn embedded_crew(goal: &str) -> ResolvedCrew {
    CrewDefinition::embedded(DEFAULT_CREW_NAME)
        .expect("embedded crew config should load")
        .resolve(goal)
        .expect("embedded crew should resolve")
}

fn task_output(name: &str, agent: &str, output: &str) -> TaskOutput {
    TaskOutput {
        name: name.to_string(),
        agent: agent.to_string(),
        agent_role: format!("{agent} role"),
        description: format!("{name} description"),
        expected_output: format!("{name} expected"),
        output: output.to_string(),
    }
}

fn full_output() -> CrewOutput {
    CrewOutput {
        crew_name: "research_crew".to_string(),
        user_goal: GOAL.to_string(),
        tasks: vec![
            task_output("research_topic_task", "research_specialist", "Research brief."),
            task_output("search_github_task", "github_explorer", "Repositories found."),
            task_output(
                "design_flow_task",
                "flow_designer",
                "Here is the flow:\n```mermaid\ngraph TD\nA[Agent]-->B[Endpoint]:::start\n```",
            ),
            task_output("create_game_plan_task", "implementation_planner", "Stage 1."),
            task_output("generate_prompt_task", "prompt_generator", "Prompt text."),
        ],
    }
}

fn write_file(path: &Path, content: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("parent directory should create");
    }
    std::fs::write(path, content).expect("file should write");
    path.to_path_buf()
}

struct ScriptedFeedback {
    replies: VecDeque<Option<String>>,
    asked: Vec<String>,
}

impl ScriptedFeedback {
    fn new(replies: &[Option<&str>]) -> Self {
        Self {
            replies: replies.iter().map(|r| r.map(str::to_string)).collect(),
            asked: Vec::new(),
        }
    }
}

impl FeedbackSource for ScriptedFeedback {
    fn feedback(&mut self, iteration: u32, task: &TaskOutput) -> Result<Option<String>> {
        self.asked.push(format!("{iteration}:{}", task.name));
        Ok(self.replies.pop_front().flatten())
    }
}

// config

#[test]
fn default_profile_resolves_without_config_file() {
    let dir = tempdir().expect("temp directory should create");
    let path = dir.path().join("missing.toml").display().to_string();
    let cli = test_cli(&path, "default");
    let profiles = load_profiles(&path).expect("missing profile file should be empty");
    let cfg = resolve_runtime_config(&cli, &profiles).expect("config should resolve");

    assert_eq!(cfg.crew_name, DEFAULT_CREW_NAME);
    assert_eq!(cfg.user_goal, DEFAULT_USER_GOAL);
    assert_eq!(cfg.report_dir, "reports");
    assert_eq!(cfg.outputs_path, DEFAULT_OUTPUTS_PATH);
    assert_eq!(cfg.provider, Provider::Auto);
    assert!(cfg.telemetry_enabled);
}

#[test]
fn profile_values_apply_and_cli_flags_win() {
    let dir = tempdir().expect("temp directory should create");
    let path = write_file(
        &dir.path().join("config.toml"),
        r#"
[profiles.work]
provider = "anthropic"
model = "claude-sonnet-4-20250514"
crew_name = "api_crew"
report_dir = "out"
user_goal = "Ship a webhook relay"
"#,
    );
    let path = path.display().to_string();
    let profiles = load_profiles(&path).expect("profiles should parse");

    let mut cli = test_cli(&path, "work");
    cli.report_dir = Some("cli-reports".to_string());
    let cfg = resolve_runtime_config(&cli, &profiles).expect("config should resolve");

    assert_eq!(cfg.provider, Provider::Anthropic);
    assert_eq!(cfg.crew_name, "api_crew");
    assert_eq!(cfg.report_dir, "cli-reports");
    assert_eq!(
        resolve_user_goal(&cfg, &[]),
        "Ship a webhook relay".to_string()
    );
    assert_eq!(
        resolve_user_goal(&cfg, &["Design".to_string(), "queues".to_string()]),
        "Design queues".to_string()
    );
}

#[test]
fn unknown_profile_lists_available_names() {
    let dir = tempdir().expect("temp directory should create");
    let path = write_file(
        &dir.path().join("config.toml"),
        "[profiles.alpha]\n[profiles.beta]\n",
    )
    .display()
    .to_string();
    let profiles = load_profiles(&path).expect("profiles should parse");
    let err = resolve_runtime_config(&test_cli(&path, "gamma"), &profiles)
        .expect_err("unknown profile should fail");
    let msg = format!("{err:#}");
    assert!(msg.contains("Available profiles: alpha, beta"));
    assert_eq!(categorize_error(&err), ErrorCategory::Input);
}

#[test]
fn unknown_profile_field_is_rejected() {
    let dir = tempdir().expect("temp directory should create");
    let path = write_file(
        &dir.path().join("config.toml"),
        "[profiles.x]\nflavour = \"vanilla\"\n",
    )
    .display()
    .to_string();
    assert!(load_profiles(&path).is_err());
}

// crew definitions

#[test]
fn embedded_crew_keeps_yaml_order_and_substitutes_goal() {
    let crew = embedded_crew(GOAL);
    let names = crew
        .tasks
        .iter()
        .map(|task| task.name.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(
        names,
        vec![
            "research_topic_task",
            "search_github_task",
            "design_flow_task",
            "create_game_plan_task",
            "generate_prompt_task"
        ]
    );

    for task in &crew.tasks {
        for text in [
            &task.description,
            &task.expected_output,
            &task.agent.role,
            &task.agent.goal,
            &task.agent.backstory,
        ] {
            assert!(!text.contains("{user_goal}"), "unresolved placeholder in {text}");
        }
    }
    assert!(crew.tasks[0].description.contains(GOAL));
    assert!(crew.tasks[0].agent.goal.contains(GOAL));
}

#[test]
fn default_tool_wiring_applies_when_yaml_omits_tools() {
    let crew = embedded_crew(GOAL);
    let research = &crew.tasks[0];
    assert_eq!(research.agent.tools, vec![SearchToolKind::WebsiteSearch]);
    assert_eq!(research.tools, vec![SearchToolKind::WebsiteSearch]);

    let github = &crew.tasks[1];
    assert_eq!(github.agent.tools, vec![SearchToolKind::GithubSearch]);
    assert_eq!(github.tools, vec![SearchToolKind::GithubSearch]);

    assert!(crew.tasks[2].agent.tools.is_empty());
    assert!(crew.tasks[4].tools.is_empty());

    let tools = build_search_tools(
        &[SearchToolKind::GithubSearch, SearchToolKind::GithubSearch],
        Provider::Openai,
    );
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name(), GITHUB_SEARCH_TOOL_NAME);
}

#[test]
fn explicit_yaml_tools_override_wiring() {
    let agents = parse_agents(
        "writer:\n  role: Writer\n  goal: Write about {user_goal}\n  backstory: Prose.\n  tools: [github_search]\n",
        "test",
    )
    .expect("agents should parse");
    let tasks = parse_tasks(
        "research_topic_task:\n  description: d {user_goal}\n  expected_output: e\n  agent: writer\n  tools: []\n",
        "test",
    )
    .expect("tasks should parse");
    let crew = CrewDefinition::from_parts(
        "custom",
        agents,
        tasks,
        ConfigSource::Embedded,
        ConfigSource::Embedded,
    )
    .expect("crew should validate")
    .resolve("x")
    .expect("crew should resolve");

    assert_eq!(crew.tasks[0].agent.tools, vec![SearchToolKind::GithubSearch]);
    assert!(crew.tasks[0].tools.is_empty());
    assert_eq!(crew.tasks[0].description, "d x");
}

#[test]
fn task_with_unknown_agent_is_a_config_error() {
    let agents = parse_agents("a:\n  role: r\n  goal: g\n  backstory: b\n", "test")
        .expect("agents should parse");
    let tasks = parse_tasks(
        "t:\n  description: d\n  expected_output: e\n  agent: ghost\n",
        "test",
    )
    .expect("tasks should parse");
    let err = CrewDefinition::from_parts(
        "c",
        agents,
        tasks,
        ConfigSource::Embedded,
        ConfigSource::Embedded,
    )
    .expect_err("unknown agent should fail");
    assert!(format!("{err:#}").contains("unknown agent 'ghost'. Available agents: a"));
    assert_eq!(categorize_error(&err), ErrorCategory::Config);
}

#[test]
fn crew_without_tasks_is_rejected() {
    let agents = parse_agents("a:\n  role: r\n  goal: g\n  backstory: b\n", "test")
        .expect("agents should parse");
    let err = CrewDefinition::from_parts(
        "c",
        agents,
        Vec::new(),
        ConfigSource::Embedded,
        ConfigSource::Embedded,
    )
    .expect_err("empty task list should fail");
    assert!(format!("{err:#}").contains("defines no tasks"));
}

#[test]
fn non_identifier_names_and_unknown_fields_are_rejected() {
    assert!(parse_agents("bad name:\n  role: r\n  goal: g\n  backstory: b\n", "test").is_err());
    assert!(
        parse_agents("a:\n  role: r\n  goal: g\n  backstory: b\n  mood: calm\n", "test").is_err()
    );
}

#[test]
fn missing_placeholder_input_fails_resolution() {
    let agents = parse_agents("a:\n  role: r\n  goal: g {release_count}\n  backstory: b\n", "test")
        .expect("agents should parse");
    let tasks = parse_tasks("t:\n  description: d\n  expected_output: e\n  agent: a\n", "test")
        .expect("tasks should parse");
    let err = CrewDefinition::from_parts(
        "c",
        agents,
        tasks,
        ConfigSource::Embedded,
        ConfigSource::Embedded,
    )
    .expect("crew should validate")
    .resolve("x")
    .expect_err("missing input should fail");
    let msg = format!("{err:#}");
    assert!(msg.contains("agent 'a' goal"));
    assert!(msg.contains("missing template input 'release_count'"));
}

#[test]
fn locate_config_prefers_explicit_then_first_existing_candidate() {
    let dir = tempdir().expect("temp directory should create");
    let first = dir.path().join("a/agents.yaml");
    let second = write_file(&dir.path().join("b/agents.yaml"), "x: 1\n");
    let candidates = vec![first.clone(), second.clone()];

    assert_eq!(
        locate_config(None, &candidates).expect("candidate should resolve"),
        ConfigSource::Discovered(second.clone())
    );
    assert_eq!(
        locate_config(None, &[first.clone()]).expect("embedded should resolve"),
        ConfigSource::Embedded
    );
    assert_eq!(
        locate_config(Some(second.to_str().expect("utf-8 path")), &[]).expect("explicit should resolve"),
        ConfigSource::Explicit(second)
    );
    let err = locate_config(Some(first.to_str().expect("utf-8 path")), &candidates)
        .expect_err("missing explicit file should fail");
    assert!(format!("{err:#}").contains("does not exist"));
}

#[test]
fn load_reads_explicit_yaml_files() {
    let dir = tempdir().expect("temp directory should create");
    let mut cfg = base_cfg(dir.path());
    cfg.agents_config = Some(
        write_file(
            &dir.path().join("agents.yaml"),
            "scout:\n  role: Scout\n  goal: Scout {user_goal}\n  backstory: Fast.\n",
        )
        .display()
        .to_string(),
    );
    cfg.tasks_config = Some(
        write_file(
            &dir.path().join("tasks.yaml"),
            "zeta_task:\n  description: Z {user_goal}\n  expected_output: z\n  agent: scout\n\
             alpha_task:\n  description: A\n  expected_output: a\n  agent: scout\n",
        )
        .display()
        .to_string(),
    );

    let definition = CrewDefinition::load(&cfg).expect("crew should load");
    assert!(matches!(definition.agents_source, ConfigSource::Explicit(_)));
    let names = definition
        .tasks
        .iter()
        .map(|task| task.name.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(names, vec!["zeta_task", "alpha_task"]);
}

// report

#[test]
fn report_has_one_section_per_task_in_order() {
    let output = full_output();
    let report = render_report(&output, "2026-01-01T00:00:00Z");

    assert_eq!(report.matches(TASK_HEADING_PREFIX).count(), output.tasks.len());
    let mut last = 0usize;
    for (index, task) in output.tasks.iter().enumerate() {
        let heading = format!("{TASK_HEADING_PREFIX}{}: {}", index + 1, task.name);
        let at = report.find(&heading).expect("task heading should exist");
        assert!(at >= last, "{} out of order", task.name);
        last = at;
    }
    assert!(report.starts_with("# Research Crew Report"));
    assert!(report.contains(&format!("**Goal:** {GOAL}")));
    assert!(!report.contains(SUPPLEMENTARY_HEADING));
}

#[test]
fn flow_designer_output_is_cleaned_into_mermaid_block() {
    let report = render_report(&full_output(), "now");
    assert!(report.contains(
        "```mermaid\ngraph TD\nclassDef start fill:#d4f4dd,stroke:#2e7d32,stroke-width:2px\nA[Agent]-->B[Endpoint]:::start\n```"
    ));
    assert!(!report.contains("Here is the flow:"));
}

#[test]
fn missing_agent_gets_fallback_paragraph_verbatim() {
    let mut output = full_output();
    output.tasks.retain(|task| task.agent != "github_explorer");
    output.tasks[0].output = "   ".to_string();

    let report = render_report(&output, "now");
    assert_eq!(report.matches(TASK_HEADING_PREFIX).count(), 4);
    assert!(report.contains(SUPPLEMENTARY_HEADING));
    for agent in ["github_explorer", "research_specialist"] {
        let paragraph = fallback::fallback_paragraph(agent).expect("fallback should exist");
        assert!(report.contains(paragraph), "missing fallback for {agent}");
    }
    let flow = fallback::fallback_paragraph("flow_designer").expect("fallback should exist");
    assert!(!report.contains(flow));
    assert!(report.contains("_No output was produced for this task._"));
}

#[test]
fn write_report_uses_crew_name_file() {
    let dir = tempdir().expect("temp directory should create");
    let report_dir = dir.path().join("reports").display().to_string();
    let path = write_report(&report_dir, &full_output()).expect("report should write");
    assert_eq!(path, dir.path().join("reports/research_crew_report.md"));
    let content = std::fs::read_to_string(path).expect("report should read");
    assert!(content.contains("## Task 5: generate_prompt_task"));
}

#[test]
fn report_write_failure_is_swallowed() {
    let dir = tempdir().expect("temp directory should create");
    let blocker = write_file(&dir.path().join("not_a_dir"), "file");
    let written = persist_report(
        &blocker.display().to_string(),
        &full_output(),
        &TelemetrySink::disabled(),
    );
    assert!(written.is_none());
}

// github search

#[test]
fn github_search_builds_commands_for_each_content_type() {
    let commands = build_search_commands(&json!({ "query": "netlify functions", "limit": 5 }))
        .expect("commands should build");
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].0, ContentType::Code);
    assert_eq!(
        commands[0].1,
        vec!["search", "code", "netlify functions", "--limit", "5", "--json", "path,repository,url"]
    );
    assert_eq!(commands[1].1[1], "repos");

    let only_repos = build_search_commands(&json!({
        "query": "x",
        "content_types": ["repositories"]
    }))
    .expect("commands should build");
    assert_eq!(only_repos.len(), 1);
    assert_eq!(only_repos[0].1[4], "10");

    let err = build_search_commands(&json!({ "query": "x", "content_types": ["issues"] }))
        .expect_err("unsupported content type should fail");
    assert_eq!(err.code, "invalid_args");
}

#[test]
fn github_search_requires_auth_without_token() {
    let mut calls = Vec::<Vec<String>>::new();
    let payload = github_search_tool_response_with_runner(&json!({ "query": "x" }), false, |args| {
        calls.push(args.to_vec());
        Ok(GitHubCliOutput {
            success: false,
            exit_code: 1,
            stdout: String::new(),
            stderr: "not logged in".to_string(),
        })
    });
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["code"], "auth_required");
    assert_eq!(calls, vec![vec!["auth".to_string(), "status".to_string()]]);
}

#[test]
fn github_search_collects_results_per_content_type() {
    let payload = github_search_tool_response_with_runner(
        &json!({ "query": "edge functions" }),
        true,
        |args| {
            let stdout = if args[1] == "code" {
                r#"[{"path":"netlify/functions/tool.ts"}]"#
            } else {
                r#"[{"fullName":"acme/agent-api"}]"#
            };
            Ok(GitHubCliOutput {
                success: true,
                exit_code: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
            })
        },
    );
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["results"]["code"][0]["path"], "netlify/functions/tool.ts");
    assert_eq!(payload["results"]["repositories"][0]["fullName"], "acme/agent-api");
}

#[test]
fn github_search_reports_failed_command() {
    let payload = github_search_tool_response_with_runner(&json!({ "query": "x" }), true, |_| {
        Ok(GitHubCliOutput {
            success: false,
            exit_code: 4,
            stdout: String::new(),
            stderr: "rate limited".to_string(),
        })
    });
    assert_eq!(payload["code"], "github_command_failed");
    assert_eq!(payload["stderr"], "rate limited");
}

// store

#[test]
fn stored_kickoff_resolves_task_ids_by_name_and_position() {
    let dir = tempdir().expect("temp directory should create");
    let path = dir.path().join(".crew/latest.json");
    save_kickoff(&path, &full_output()).expect("outputs should save");
    let stored = load_kickoff(&path).expect("outputs should load");

    assert_eq!(stored.tasks.len(), 5);
    assert_eq!(stored.tasks[2].position, 3);
    assert_eq!(stored.task_outputs(), full_output().tasks);
    assert_eq!(
        stored
            .resolve_task_position("design_flow_task")
            .expect("name should resolve"),
        2
    );
    assert_eq!(stored.resolve_task_position("4").expect("position should resolve"), 3);

    let err = stored
        .resolve_task_position("9")
        .expect_err("out of range position should fail");
    assert!(format!("{err:#}").contains("unknown task id '9'"));
    assert_eq!(categorize_error(&err), ErrorCategory::Input);
}

#[test]
fn missing_store_is_reported() {
    let dir = tempdir().expect("temp directory should create");
    let err = load_kickoff(&dir.path().join("none.json")).expect_err("missing store should fail");
    assert!(format!("{err:#}").contains("Run the crew first"));
}

// pipeline

#[test]
fn task_instruction_references_earlier_outputs_and_shields_text() {
    let crew = embedded_crew("Handle {payload} in edge functions");
    let suggestions = vec!["Cite {sources}".to_string()];
    let instruction = task_instruction(
        &crew.tasks[2],
        &["research_topic_task", "search_github_task"],
        Some(&suggestions),
    );

    assert!(instruction.contains("{research_topic_task?}"));
    assert!(instruction.contains("{search_github_task?}"));
    assert!(instruction.contains("Handle { payload } in edge functions"));
    assert!(instruction.contains("- Cite { sources }"));
    assert!(!instruction.contains("{payload}"));
}

#[test]
fn goal_with_state_like_braces_stays_literal_in_instructions() {
    let crew = embedded_crew("Greet {user:name}, attach {artifact.readme}, keep {draft?}");
    let instruction = task_instruction(&crew.tasks[0], &[], None);

    assert!(instruction.contains("Greet { user:name }, attach { artifact.readme }, keep { draft? }"));
    for raw in ["{user:name}", "{artifact.readme}", "{draft?}"] {
        assert!(!instruction.contains(raw), "{raw} left unshielded");
    }
}

#[tokio::test]
async fn kickoff_collects_every_task_output() {
    let dir = tempdir().expect("temp directory should create");
    let cfg = base_cfg(dir.path());
    let crew = embedded_crew(GOAL);

    let output = test_runner(&cfg, "mock crew output")
        .kickoff(&crew)
        .await
        .expect("kickoff should run");

    assert_eq!(output.tasks.len(), crew.tasks.len());
    assert_eq!(output.user_goal, GOAL);
    assert_eq!(output.tasks[0].name, "research_topic_task");
    assert_eq!(output.tasks[0].agent, "research_specialist");
    assert_eq!(output.tasks[0].output, "mock crew output");
    assert!(output.tasks.iter().all(|task| task.output == "mock crew output"));
}

#[tokio::test]
async fn replay_keeps_outputs_before_the_start_task() {
    let dir = tempdir().expect("temp directory should create");
    let cfg = base_cfg(dir.path());
    let crew = embedded_crew(GOAL);
    let prior = full_output().tasks;

    let output = test_runner(&cfg, "fresh")
        .kickoff_from(&crew, 2, &prior)
        .await
        .expect("replay should run");

    assert_eq!(output.tasks[0].output, "Research brief.");
    assert_eq!(output.tasks[1].output, "Repositories found.");
    assert_eq!(output.tasks[2].output, "fresh");
    assert_eq!(output.tasks[4].output, "fresh");

    let err = test_runner(&cfg, "fresh")
        .kickoff_from(&crew, 5, &prior)
        .await
        .expect_err("start past the last task should fail");
    assert!(format!("{err:#}").contains("out of range"));
}

#[tokio::test]
async fn run_kickoff_writes_report_and_outputs() {
    let dir = tempdir().expect("temp directory should create");
    let cfg = base_cfg(dir.path());
    let crew = embedded_crew(GOAL);

    run_kickoff(&cfg, &crew, &test_runner(&cfg, "graph TD\nA-->B:::end"))
        .await
        .expect("run should succeed");

    let report = std::fs::read_to_string(report_path(&cfg.report_dir, &cfg.crew_name))
        .expect("report should exist");
    assert_eq!(report.matches(TASK_HEADING_PREFIX).count(), 5);
    assert!(report.contains("classDef end fill:#fde0dc"));

    let stored = load_kickoff(Path::new(&cfg.outputs_path)).expect("outputs should be stored");
    assert_eq!(stored.user_goal, GOAL);
}

#[tokio::test]
async fn replay_kickoff_resumes_from_stored_task() {
    let dir = tempdir().expect("temp directory should create");
    let cfg = base_cfg(dir.path());
    save_kickoff(Path::new(&cfg.outputs_path), &full_output()).expect("outputs should save");
    let definition = CrewDefinition::embedded(DEFAULT_CREW_NAME).expect("crew should load");

    let output = replay_kickoff(&cfg, &definition, &test_runner(&cfg, "replayed"), "4")
        .await
        .expect("replay should run");
    assert_eq!(output.tasks[2].output, full_output().tasks[2].output);
    assert_eq!(output.tasks[3].output, "replayed");
}

// training and evaluation

#[tokio::test]
async fn training_merges_feedback_into_existing_file() {
    let dir = tempdir().expect("temp directory should create");
    let cfg = base_cfg(dir.path());
    let path = dir.path().join("trained_agents_data.json");
    let mut existing = TrainingData::default();
    existing.record(1, &task_output("t", "flow_designer", "x"), "Use subgraphs");
    save_training(&path, &existing).expect("seed training file should save");

    let mut feedback = ScriptedFeedback::new(&[Some("Cite official docs"), None, Some("  ")]);
    let data = run_training(&test_runner(&cfg, "out"), &embedded_crew(GOAL), 1, &path, &mut feedback)
        .await
        .expect("training should run");

    assert_eq!(feedback.asked.len(), 5);
    assert_eq!(feedback.asked[0], "1:research_topic_task");
    assert_eq!(data.records.len(), 2);
    assert_eq!(
        data.suggestions.get("research_specialist"),
        Some(&vec!["Cite official docs".to_string()])
    );
    assert_eq!(load_training(&path).expect("training file should load"), data);
    assert_eq!(load_suggestions(&path).len(), 2);
}

#[tokio::test]
async fn training_and_testing_need_iterations() {
    let dir = tempdir().expect("temp directory should create");
    let cfg = base_cfg(dir.path());
    let crew = embedded_crew(GOAL);
    let runner = test_runner(&cfg, "out");

    let err = run_training(
        &runner,
        &crew,
        0,
        &dir.path().join("t.json"),
        &mut ScriptedFeedback::new(&[]),
    )
    .await
    .expect_err("zero iterations should fail");
    let wrapped = err.context("an error occurred while training the crew");
    assert!(format!("{wrapped:#}").starts_with("an error occurred while training the crew: "));
    assert_eq!(categorize_error(&wrapped), ErrorCategory::Input);

    assert!(run_evaluation(&runner, &crew, 0, mock_model("5")).await.is_err());
}

#[tokio::test]
async fn evaluation_scores_every_task() {
    let dir = tempdir().expect("temp directory should create");
    let cfg = base_cfg(dir.path());
    let table = run_evaluation(
        &test_runner(&cfg, "task output"),
        &embedded_crew(GOAL),
        2,
        mock_model("Score: 8/10"),
    )
    .await
    .expect("evaluation should run");

    assert_eq!(table.tasks.len(), 5);
    assert_eq!(table.iterations(), 2);
    assert_eq!(table.crew_average(), Some(8.0));
    assert!(table.render().contains("generate_prompt_task"));
}

// errors

#[test]
fn cli_errors_are_categorized_with_hints() {
    let provider = anyhow::anyhow!("OPENAI_API_KEY is required for OpenAI provider");
    assert!(format_cli_error(&provider).starts_with("[PROVIDER] "));

    let yaml = anyhow::anyhow!("invalid yaml in crew config tasks.yaml");
    assert_eq!(categorize_error(&yaml), ErrorCategory::Config);

    let tool = anyhow::anyhow!("github search failed");
    assert_eq!(categorize_error(&tool), ErrorCategory::Tooling);
    assert!(format_cli_error(&tool).contains("\nHint: "));
}

#[test]
fn unparsable_commands_exit_with_status_one() {
    for args in [
        vec!["research-crew", "bogus"],
        vec!["research-crew", "train", "abc", "trained.json"],
    ] {
        let err = Cli::try_parse_from(args.iter().copied()).expect_err("arguments should not parse");
        assert_eq!(parse_error_exit_code(&err), 1, "{args:?}");
    }

    let help = Cli::try_parse_from(["research-crew", "--help"]).expect_err("help should short-circuit");
    assert_eq!(parse_error_exit_code(&help), 0);

    let cli = Cli::try_parse_from(["research-crew", "replay", "2"]).expect("replay should parse");
    assert!(matches!(cli.command, Some(Commands::Replay { ref task_id }) if task_id == "2"));
}

#[test]
fn evaluator_provider_follows_model_name() {
    let dir = tempdir().expect("temp directory should create");
    let mut cfg = base_cfg(dir.path());
    cfg.provider = Provider::Anthropic;

    let evaluator = evaluator_config(&cfg, "gpt-4.1-mini");
    assert_eq!(evaluator.provider, Provider::Openai);
    assert_eq!(evaluator.model.as_deref(), Some("gpt-4.1-mini"));

    assert_eq!(evaluator_config(&cfg, "claude-3-5-haiku").provider, Provider::Anthropic);
    assert_eq!(evaluator_config(&cfg, "llama3.1").provider, Provider::Anthropic);
    assert_eq!(provider_for_model("gemini-2.5-pro"), Some(Provider::Gemini));
    assert_eq!(provider_for_model("mistral"), None);
}
