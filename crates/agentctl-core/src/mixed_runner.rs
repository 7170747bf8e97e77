//! MixedRunner (spec.md §4.4): a read-only planning pass, followed by a
//! full-tool build pass seeded with the plan's output. Both phases share one
//! `ContextConfig` — by construction the same value is handed to both inner
//! `AgentLoop`s, so truncation, compression, and the sliding window behave
//! identically across the two phases instead of each phase inventing its own
//! notion of "how full is the context".
//!
//! Grounded in the teacher's `agent_loop/mixed.rs` `run_mixed_agent`, which
//! splices a planning sub-agent's final answer into the opening prompt of a
//! second, full-capability sub-agent. Generalized to the spec's exact
//! per-phase tool/confirmation/streaming matrix: plan is read-only tools,
//! confirm-all, streaming always off; build is the caller's full tool set,
//! confirm-sensitive, and the caller's own streaming preference.

use crate::agent_loop::{AgentLoop, CostTracker};
use crate::events::EventSink;
use crate::hooks::PostEditHooks;
use crate::llm::LlmClient;
use crate::registry::ToolRegistry;
use crate::shutdown::ShutdownController;
use agentctl_types::{AgentConfig, AgentState, ConfirmMode, ContextConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub struct MixedRunner {
    build_config: AgentConfig,
    read_only_tools: Vec<String>,
    context_config: ContextConfig,
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    hooks: Arc<PostEditHooks>,
    workspace_root: PathBuf,
    dry_run: bool,
    shutdown: ShutdownController,
    step_deadline: Duration,
    cost_tracker: Option<Arc<dyn CostTracker>>,
    model: String,
}

impl MixedRunner {
    /// `build_config` governs the build phase as-is (its `allowed_tools` is
    /// the full tool set the caller wants exposed, its `confirm_mode` should
    /// normally be `ConfirmSensitive`). `read_only_tools` is the allow-list
    /// handed to the plan phase, which always runs confirm-all with
    /// streaming off regardless of what the caller asks for later.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        build_config: AgentConfig,
        read_only_tools: Vec<String>,
        context_config: ContextConfig,
        llm: Arc<dyn LlmClient>,
        registry: Arc<ToolRegistry>,
        hooks: Arc<PostEditHooks>,
        workspace_root: PathBuf,
        dry_run: bool,
        shutdown: ShutdownController,
        step_deadline: Duration,
        cost_tracker: Option<Arc<dyn CostTracker>>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            build_config,
            read_only_tools,
            context_config,
            llm,
            registry,
            hooks,
            workspace_root,
            dry_run,
            shutdown,
            step_deadline,
            cost_tracker,
            model: model.into(),
        }
    }

    /// Runs the plan phase to completion, splices its output into a new
    /// prompt, then runs the build phase. Returns the build phase's final
    /// `AgentState`; the plan phase's state is discarded beyond its
    /// `final_output`.
    pub async fn run(&self, prompt: &str, stream: bool, sink: &mut dyn EventSink) -> AgentState {
        let plan_config = AgentConfig {
            system_prompt: self.build_config.system_prompt.clone(),
            allowed_tools: self.read_only_tools.clone(),
            confirm_mode: ConfirmMode::ConfirmAll,
            max_steps: self.build_config.max_steps,
            max_duration_secs: self.build_config.max_duration_secs,
        };
        let plan_state = self.spawn_loop(plan_config).run(prompt, false, sink).await;
        if plan_state.status == agentctl_types::AgentStatus::Failed {
            return plan_state;
        }
        if self.shutdown.is_requested() {
            return plan_state;
        }
        let plan_output = plan_state.final_output.clone().unwrap_or_default();

        let build_prompt = format!(
            "The user asked: {prompt}\n\nPlanning agent produced:\n---\n{plan_output}\n---\nExecute this plan step by step, using the full tool set."
        );

        self.spawn_loop(self.build_config.clone()).run(&build_prompt, stream, sink).await
    }

    fn spawn_loop(&self, config: AgentConfig) -> AgentLoop {
        AgentLoop::new(
            config,
            self.context_config,
            self.llm.clone(),
            self.registry.clone(),
            self.hooks.clone(),
            self.workspace_root.clone(),
            self.dry_run,
            self.shutdown.clone(),
            self.step_deadline,
            self.cost_tracker.clone(),
            self.model.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEventSink;
    use agentctl_types::{
        AgentStatus, FinishReason, FunctionCall, LlmResponse, Message, Sensitivity, StopReason, Tool, ToolCall,
        ToolDefinition, ToolError, ToolResult, ToolSchema,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ListFilesTool;

    #[async_trait]
    impl Tool for ListFilesTool {
        fn name(&self) -> &str {
            "list_files"
        }
        fn description(&self) -> &str {
            "lists workspace files"
        }
        fn schema(&self) -> &ToolSchema {
            static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
            SCHEMA.get_or_init(|| ToolSchema::new(vec![]))
        }
        fn sensitivity(&self, _args: &serde_json::Value) -> Sensitivity {
            Sensitivity::Safe
        }
        fn validate_args(&self, args: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
            Ok(args.clone())
        }
        async fn execute(&self, _args: serde_json::Value) -> ToolResult {
            ToolResult::ok("a.rs\nb.rs")
        }
    }

    struct WriteFileTool;

    #[async_trait]
    impl Tool for WriteFileTool {
        fn name(&self) -> &str {
            "write_file"
        }
        fn description(&self) -> &str {
            "writes a file"
        }
        fn schema(&self) -> &ToolSchema {
            static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
            SCHEMA.get_or_init(|| ToolSchema::new(vec![]))
        }
        fn sensitivity(&self, _args: &serde_json::Value) -> Sensitivity {
            Sensitivity::Dangerous
        }
        fn validate_args(&self, args: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
            Ok(args.clone())
        }
        async fn execute(&self, _args: serde_json::Value) -> ToolResult {
            ToolResult::ok("wrote a.rs")
        }
    }

    /// Returns queued responses in order, one per `completion` call,
    /// shared across both phases since they run sequentially on one runtime.
    struct ScriptedLlm {
        responses: Mutex<Vec<LlmResponse>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<LlmResponse>) -> Self {
            Self { responses: Mutex::new(responses) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn completion(&self, _messages: &[Message], _tools: &[ToolDefinition]) -> anyhow::Result<LlmResponse> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                anyhow::bail!("script exhausted");
            }
            Ok(responses.remove(0))
        }

        async fn completion_stream(
            &self,
            messages: &[Message],
            tools: &[ToolDefinition],
            _sink: &mut dyn EventSink,
        ) -> anyhow::Result<LlmResponse> {
            self.completion(messages, tools).await
        }
    }

    fn stop_response(content: &str) -> LlmResponse {
        LlmResponse { content: Some(content.to_string()), tool_calls: vec![], finish_reason: FinishReason::Stop, usage: None }
    }

    fn tool_call_response(tool: &str) -> LlmResponse {
        LlmResponse {
            content: None,
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                function: FunctionCall { name: tool.to_string(), arguments: serde_json::json!({}) },
            }],
            finish_reason: FinishReason::ToolCalls,
            usage: None,
        }
    }

    fn runner(llm: ScriptedLlm) -> MixedRunner {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(ListFilesTool), false).unwrap();
        registry.register(Arc::new(WriteFileTool), false).unwrap();
        MixedRunner::new(
            AgentConfig {
                allowed_tools: vec!["list_files".to_string(), "write_file".to_string()],
                confirm_mode: ConfirmMode::Yolo,
                ..Default::default()
            },
            vec!["list_files".to_string()],
            ContextConfig { max_tool_result_tokens: 0, summarize_after_steps: 0, keep_recent_steps: 0, max_context_tokens: 0, parallel_tools: false },
            Arc::new(llm),
            Arc::new(registry),
            Arc::new(PostEditHooks::default()),
            std::env::temp_dir(),
            false,
            ShutdownController::new(),
            Duration::from_secs(30),
            None,
            "agentctl-test",
        )
    }

    #[tokio::test]
    async fn plan_output_is_spliced_into_the_build_phase_prompt() {
        let llm = ScriptedLlm::new(vec![
            tool_call_response("list_files"),
            stop_response("plan: edit a.rs"),
            tool_call_response("write_file"),
            stop_response("build done"),
        ]);
        let mixed = runner(llm);
        let mut sink = RecordingEventSink::default();
        let state = mixed.run("refactor the project", false, &mut sink).await;

        assert_eq!(state.status, AgentStatus::Success);
        assert_eq!(state.stop_reason, Some(StopReason::LlmDone));
        assert_eq!(state.final_output.as_deref(), Some("build done"));
        // The build phase's own user prompt (messages[1]) carries the plan's
        // output forward.
        assert!(state.messages[1].content.contains("plan: edit a.rs"));
        assert!(state.messages[1].content.contains("refactor the project"));
    }

    #[tokio::test]
    async fn plan_phase_failure_returns_the_plan_state_without_running_build() {
        // No responses queued for the plan phase's single LLM call, so it
        // fails outright (status Failed). Per spec.md §4.4, a failed plan
        // phase short-circuits the whole mixed run — the build phase never
        // starts.
        let llm = ScriptedLlm::new(vec![]);
        let mixed = runner(llm);
        let mut sink = RecordingEventSink::default();
        let state = mixed.run("do something", false, &mut sink).await;

        assert_eq!(state.status, AgentStatus::Failed);
        assert!(state.final_output.as_deref().unwrap_or_default().contains("script exhausted"));
    }

    #[tokio::test]
    async fn shutdown_requested_during_plan_returns_plan_state() {
        let llm = ScriptedLlm::new(vec![stop_response("plan: partial")]);
        let mixed = runner(llm);
        mixed.shutdown.request();
        let mut sink = RecordingEventSink::default();
        let state = mixed.run("do something", false, &mut sink).await;

        // The plan phase itself observes the shutdown flag at its own
        // first iteration and closes as USER_INTERRUPT; the build phase
        // never runs.
        assert_eq!(state.status, AgentStatus::Partial);
        assert_eq!(state.stop_reason, Some(StopReason::UserInterrupt));
    }
}
