mod cli;
mod config;
mod observability;

use agentctl_core::tools::{
    ApplyPatchTool, EditFileTool, GlobSearchTool, GrepFilesTool, ListDirectoryTool, ReadFileTool,
    RunCommandTool, WriteFileTool,
};
use agentctl_core::{
    AgentLoop, DefaultIndexProvider, IndexProvider, LlmClient, MixedRunner, OpenAiClient,
    PostEditHooks, SelfEvaluator, ShutdownController, TerminalEventSink, ToolRegistry,
};
use agentctl_types::{AgentConfig, AgentState, AgentStatus, ContextConfig, StopReason, Tool};
use anyhow::Context;
use clap::Parser;
use cli::{Cli, SelfEvalArg};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Tools that never mutate the workspace — the allow-list handed to
/// `MixedRunner`'s planning phase (spec.md §4.4).
const READ_ONLY_TOOLS: &[&str] = &["read_file", "list_directory", "glob_search", "grep_files"];

fn main() {
    // Load `.env` and parse argv before the Tokio runtime exists, matching
    // the teacher's rule that env mutation happens only on the single
    // startup thread (see `config::load_dotenv`'s safety note).
    config::load_dotenv();
    let cli = Cli::parse();
    observability::init_tracing();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            std::process::exit(3);
        }
    };

    let exit_code = runtime.block_on(run(cli));
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> i32 {
    match run_inner(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            3
        }
    }
}

async fn run_inner(cli: &Cli) -> anyhow::Result<i32> {
    let workspace_root = std::fs::canonicalize(&cli.workspace)
        .with_context(|| format!("workspace directory not found: {}", cli.workspace))?;

    let llm_config = config::LlmConfig::from_env();
    let api_base = cli.api_base.clone().unwrap_or(llm_config.api_base);
    let api_key = cli.api_key.clone().unwrap_or(llm_config.api_key);
    let model = cli.model.clone().unwrap_or(llm_config.model);

    if api_key.trim().is_empty() {
        eprintln!("no API key configured: pass --api-key, or set AGENTCTL_API_KEY / OPENAI_API_KEY");
        return Ok(4);
    }

    let registry = Arc::new(build_registry(&workspace_root)?);
    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(api_base, api_key, model.clone()));
    let hooks = Arc::new(PostEditHooks::default());
    let shutdown = ShutdownController::new();
    shutdown.install();

    let index = DefaultIndexProvider::default();
    let system_prompt = cli
        .system_prompt
        .clone()
        .unwrap_or_else(|| default_system_prompt(&index, &workspace_root));

    let agent_config = AgentConfig {
        system_prompt,
        allowed_tools: registry.list_all().into_iter().map(str::to_string).collect(),
        confirm_mode: cli.mode.into(),
        max_steps: cli.max_steps,
        max_duration_secs: cli.max_duration_secs,
    };
    let context_config = config::context_config_from_env(ContextConfig::default());
    let step_timeout = Duration::from_secs(config::step_timeout_secs_from_env(cli.step_timeout_secs));

    let mut sink = TerminalEventSink;

    let state = if cli.mixed {
        let read_only_tools: Vec<String> = READ_ONLY_TOOLS
            .iter()
            .filter(|name| registry.get(name).is_ok())
            .map(|s| s.to_string())
            .collect();
        let mixed = MixedRunner::new(
            agent_config.clone(),
            read_only_tools,
            context_config,
            llm.clone(),
            registry.clone(),
            hooks.clone(),
            workspace_root.clone(),
            cli.dry_run,
            shutdown.clone(),
            step_timeout,
            None,
            model.clone(),
        );
        mixed.run(&cli.prompt, cli.stream, &mut sink).await
    } else {
        let agent_loop = AgentLoop::new(
            agent_config.clone(),
            context_config,
            llm.clone(),
            registry.clone(),
            hooks.clone(),
            workspace_root.clone(),
            cli.dry_run,
            shutdown.clone(),
            step_timeout,
            None,
            model.clone(),
        );
        agent_loop.run(&cli.prompt, cli.stream, &mut sink).await
    };

    let state = maybe_self_evaluate(
        cli,
        &llm,
        &registry,
        &hooks,
        &workspace_root,
        &agent_config,
        context_config,
        &shutdown,
        step_timeout,
        &model,
        state,
    )
    .await;

    print_result(cli, &state);
    Ok(exit_code_for(&state))
}

fn build_registry(workspace_root: &Path) -> anyhow::Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(ReadFileTool::new(workspace_root.to_path_buf())),
        Arc::new(WriteFileTool::new(workspace_root.to_path_buf())),
        Arc::new(EditFileTool::new(workspace_root.to_path_buf())),
        Arc::new(ApplyPatchTool::new(workspace_root.to_path_buf())),
        Arc::new(ListDirectoryTool::new(workspace_root.to_path_buf())),
        Arc::new(GlobSearchTool::new(workspace_root.to_path_buf())),
        Arc::new(GrepFilesTool::new(workspace_root.to_path_buf())),
        Arc::new(RunCommandTool::new(workspace_root.to_path_buf())),
    ];
    for tool in tools {
        // A duplicate here can only mean a programming error in this
        // function, not user input — fatal at boot per spec.md §7.
        registry.register(tool, false)?;
    }
    Ok(registry)
}

fn default_system_prompt(index: &dyn IndexProvider, workspace_root: &Path) -> String {
    let tree = index.render(workspace_root);
    format!(
        "You are a careful coding assistant working inside the workspace below. \
         Use the available tools to read before you write, and stop calling tools \
         once the task is complete.\n\nWorkspace:\n{tree}"
    )
}

#[allow(clippy::too_many_arguments)]
async fn maybe_self_evaluate(
    cli: &Cli,
    llm: &Arc<dyn LlmClient>,
    registry: &Arc<ToolRegistry>,
    hooks: &Arc<PostEditHooks>,
    workspace_root: &Path,
    agent_config: &AgentConfig,
    context_config: ContextConfig,
    shutdown: &ShutdownController,
    step_timeout: Duration,
    model: &str,
    mut state: AgentState,
) -> AgentState {
    if cli.self_eval == SelfEvalArg::Off || state.status != AgentStatus::Success {
        return state;
    }

    let evaluator = SelfEvaluator::new(llm.as_ref());
    let output = state.final_output.clone().unwrap_or_default();
    let threshold = cli.self_eval_confidence_threshold;

    match cli.self_eval {
        SelfEvalArg::Basic => {
            match evaluator.evaluate(&cli.prompt, &output, &state.steps).await {
                Ok(verdict) => {
                    tracing::info!(passed = verdict.passed, confidence = verdict.confidence, "self-evaluation");
                    if !verdict.passes(threshold) {
                        state.status = AgentStatus::Partial;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "self-evaluation call failed; keeping original result"),
            }
        }
        SelfEvalArg::Full => {
            let dry_run = cli.dry_run;
            let stream = cli.stream;
            let steps = state.steps.clone();
            let (verdict, final_output, retries) = evaluator
                .evaluate_with_retries(&cli.prompt, output, steps, cli.self_eval_max_retries, threshold, move |retry_prompt| {
                    let agent_config = agent_config.clone();
                    let llm = llm.clone();
                    let registry = registry.clone();
                    let hooks = hooks.clone();
                    let workspace_root = workspace_root.to_path_buf();
                    let shutdown = shutdown.clone();
                    let model = model.to_string();
                    async move {
                        let agent_loop = AgentLoop::new(
                            agent_config,
                            context_config,
                            llm,
                            registry,
                            hooks,
                            workspace_root,
                            dry_run,
                            shutdown,
                            step_timeout,
                            None,
                            model,
                        );
                        let mut retry_sink = TerminalEventSink;
                        agent_loop.run(&retry_prompt, stream, &mut retry_sink).await
                    }
                })
                .await;
            tracing::info!(passed = verdict.passed, confidence = verdict.confidence, retries, "self-evaluation (full)");
            state.final_output = Some(final_output);
            if !verdict.passes(threshold) {
                state.status = AgentStatus::Partial;
            }
        }
        SelfEvalArg::Off => unreachable!(),
    }

    state
}

fn exit_code_for(state: &AgentState) -> i32 {
    match state.status {
        AgentStatus::Success => 0,
        AgentStatus::Failed => 1,
        AgentStatus::Partial => match state.stop_reason {
            Some(StopReason::UserInterrupt) => 130,
            Some(StopReason::Timeout) => 5,
            _ => 2,
        },
        AgentStatus::Running => 1,
    }
}

fn print_result(cli: &Cli, state: &AgentState) {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&state_to_json(state)).unwrap());
    } else if let Some(output) = &state.final_output {
        println!("{output}");
    }
}

fn state_to_json(state: &AgentState) -> serde_json::Value {
    let tools_used: Vec<serde_json::Value> = state
        .steps
        .iter()
        .flat_map(|step| &step.outcomes)
        .map(|outcome| {
            serde_json::json!({
                "name": outcome.call.function.name,
                "args_summary": summarize_args(&outcome.call.function.arguments),
                "success": outcome.result.success,
            })
        })
        .collect();

    serde_json::json!({
        "status": match state.status {
            AgentStatus::Success => "success",
            AgentStatus::Partial => "partial",
            AgentStatus::Failed => "failed",
            AgentStatus::Running => "running",
        },
        "output": state.final_output,
        "steps": state.steps.len(),
        "tools_used": tools_used,
        "duration_seconds": state.elapsed().as_secs_f64(),
        "model": state.model,
        "stop_reason": state.stop_reason.map(|r| r.to_string()),
    })
}

fn summarize_args(args: &serde_json::Value) -> String {
    const MAX_LEN: usize = 200;
    let rendered = args.to_string();
    if rendered.len() <= MAX_LEN {
        rendered
    } else {
        format!("{}...", &rendered[..MAX_LEN])
    }
}
