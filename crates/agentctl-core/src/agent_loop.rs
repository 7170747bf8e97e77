//! The iterative agent loop (spec.md §4.1): drive turns until the LLM stops
//! asking for tools, or a watchdog fires.
//!
//! Grounded in `agent_loop/mod.rs::run_simple_loop` and
//! `agent_loop/reflection.rs` for the turn/watchdog/graceful-close shape,
//! generalized to the spec's closed stop-reason taxonomy and strict
//! per-iteration ordering (the teacher's loop has no CONTEXT_FULL or
//! BUDGET_EXCEEDED concept and never makes a "no tools offered" closing
//! call).

use crate::confirmation::ConfirmationPolicy;
use crate::context::ContextManager;
use crate::events::EventSink;
use crate::hooks::PostEditHooks;
use crate::llm::LlmClient;
use crate::pipeline::ToolPipeline;
use crate::registry::ToolRegistry;
use crate::shutdown::{ShutdownController, StepTimer};
use agentctl_types::{
    AgentConfig, AgentState, AgentStatus, ContextConfig, FinishReason, Message, StepResult, StopReason,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Architectural hook for §1's "cost tracking" external collaborator.
/// Non-goal per spec.md §1 means the core ships no real accounting, only
/// the seam that lets a caller plug one in and still reach BUDGET_EXCEEDED.
pub trait CostTracker: Send + Sync {
    fn budget_exceeded(&self) -> bool;
}

pub struct AgentLoop {
    config: AgentConfig,
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    context: ContextManager,
    pipeline: ToolPipeline,
    shutdown: ShutdownController,
    step_timer: StepTimer,
    cost_tracker: Option<Arc<dyn CostTracker>>,
    context_config: ContextConfig,
    model: String,
}

impl AgentLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AgentConfig,
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
        let model = model.into();
        let pipeline = ToolPipeline::new(
            registry.clone(),
            ConfirmationPolicy::new(config.confirm_mode),
            hooks,
            workspace_root,
            dry_run,
        );
        Self {
            context: ContextManager::new(context_config),
            config,
            llm,
            registry,
            pipeline,
            shutdown,
            step_timer: StepTimer::new(step_deadline),
            cost_tracker,
            context_config,
            model,
        }
    }

    pub async fn run(&self, prompt: &str, stream: bool, sink: &mut dyn EventSink) -> AgentState {
        let mut state = AgentState::new(&self.config.system_prompt, prompt, self.model.as_str());
        let _span = tracing::info_span!("agent_run", run_id = %state.run_id).entered();
        let tool_defs = match self.registry.schemas(Some(&self.config.allowed_tools)) {
            Ok(defs) => defs,
            Err(e) => {
                state.status = AgentStatus::Failed;
                state.stop_reason = Some(StopReason::LlmError);
                state.final_output = Some(format!("failed to resolve tool schemas: {e}"));
                return state;
            }
        };

        let mut length_nudge_sent = false;

        loop {
            // Stage 1: safety-net checks, in priority order.
            if self.shutdown.is_requested() {
                self.graceful_close(&mut state, StopReason::UserInterrupt, sink).await;
                return state;
            }
            if state.steps.len() >= self.config.max_steps {
                self.graceful_close(&mut state, StopReason::MaxSteps, sink).await;
                return state;
            }
            if self.config.max_duration_secs != 0
                && state.elapsed() >= Duration::from_secs(self.config.max_duration_secs)
            {
                self.graceful_close(&mut state, StopReason::Timeout, sink).await;
                return state;
            }
            if self.context.is_critically_full(&state.messages) {
                self.graceful_close(&mut state, StopReason::ContextFull, sink).await;
                return state;
            }

            // Stage 2: context management.
            self.context.manage(&mut state.messages, Some(self.llm.as_ref())).await;

            // Stage 3: LLM call under the per-step deadline.
            let call_result = self
                .step_timer
                .run(async {
                    if stream {
                        self.llm.completion_stream(&state.messages, &tool_defs, sink).await
                    } else {
                        self.llm.completion(&state.messages, &tool_defs).await
                    }
                })
                .await;

            let response = match call_result {
                Err(_timed_out) => {
                    self.graceful_close(&mut state, StopReason::Timeout, sink).await;
                    return state;
                }
                Ok(Err(transport_error)) => {
                    state.status = AgentStatus::Failed;
                    state.stop_reason = Some(StopReason::LlmError);
                    state.final_output = Some(transport_error.to_string());
                    return state;
                }
                Ok(Ok(response)) => response,
            };

            // Stage 4: cost accounting.
            if let Some(tracker) = &self.cost_tracker {
                if tracker.budget_exceeded() {
                    self.graceful_close(&mut state, StopReason::BudgetExceeded, sink).await;
                    return state;
                }
            }

            // Stage 5: termination test, with the §9 open-question (b)
            // carve-out for finish_reason == length.
            if !response.has_tool_calls() {
                if response.finish_reason == FinishReason::Length && !length_nudge_sent {
                    length_nudge_sent = true;
                    state.messages.push(Message::assistant(response.content.clone().unwrap_or_default()));
                    state.messages.push(Message::user(
                        "Continue where you left off.".to_string(),
                    ));
                    continue;
                }
                state.status = AgentStatus::Success;
                state.stop_reason = Some(StopReason::LlmDone);
                state.final_output = Some(response.content.clone().unwrap_or_default());
                state.messages.push(Message::assistant(response.content.clone().unwrap_or_default()));
                return state;
            }

            // Stage 6: tool execution.
            let outcomes = self
                .pipeline
                .execute_batch(&response.tool_calls, self.context_config.parallel_tools, sink)
                .await;

            state.messages.push(Message::assistant_with_tool_calls(
                response.content.clone().unwrap_or_default(),
                response.tool_calls.clone(),
            ));
            for outcome in &outcomes {
                let truncated = self.context.truncate_tool_result(&outcome.result.output);
                state.messages.push(Message::tool_result(outcome.call.id.clone(), truncated));
            }

            // Stage 7: record the step.
            let step = state.steps.len();
            state.steps.push(StepResult { step, response, outcomes });
        }
    }

    /// Graceful close (spec.md §4.1): on any watchdog other than
    /// USER_INTERRUPT, ask the LLM for a final summary with no tools
    /// offered. On USER_INTERRUPT, skip the call entirely.
    async fn graceful_close(&self, state: &mut AgentState, reason: StopReason, sink: &mut dyn EventSink) {
        state.status = AgentStatus::Partial;
        state.stop_reason = Some(reason);

        if reason == StopReason::UserInterrupt {
            state.final_output = Some("interrupted by user".to_string());
            return;
        }

        state.messages.push(Message::user(closing_instruction(reason)));
        let call_result = self.step_timer.run(self.llm.completion(&state.messages, &[])).await;
        match call_result {
            Ok(Ok(response)) => {
                let text = response.content.unwrap_or_default();
                state.messages.push(Message::assistant(text.clone()));
                state.final_output = Some(text);
            }
            _ => {
                sink.on_notice(&format!("graceful close failed for {reason}"));
                state.final_output = Some(format!("agent stopped ({reason})"));
            }
        }
    }
}

fn closing_instruction(reason: StopReason) -> &'static str {
    match reason {
        StopReason::MaxSteps => "You have reached the maximum number of steps. Summarize what you did and what remains.",
        StopReason::Timeout => "Time is up for this task. Summarize what you did and what remains.",
        StopReason::ContextFull => "The conversation context is full. Summarize what you did and what remains.",
        StopReason::BudgetExceeded => "The budget for this task has been exceeded. Summarize what you did and what remains.",
        _ => "Summarize what you did and what remains.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEventSink;
    use agentctl_types::{FunctionCall, LlmResponse, Sensitivity, Tool, ToolCall, ToolDefinition, ToolError, ToolResult, ToolSchema};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ReadFileTool;

    #[async_trait]
    impl Tool for ReadFileTool {
        fn name(&self) -> &str {
            "read_file"
        }
        fn description(&self) -> &str {
            "reads a file"
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
            ToolResult::ok("README contents")
        }
    }

    /// Scripted LLM: returns queued responses in order, one per call.
    struct ScriptedLlm {
        responses: Mutex<Vec<LlmResponse>>,
        calls: AtomicUsize,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<LlmResponse>) -> Self {
            Self { responses: Mutex::new(responses), calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn completion(&self, _messages: &[Message], _tools: &[ToolDefinition]) -> anyhow::Result<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
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

    fn build_loop(llm: ScriptedLlm, config: AgentConfig) -> AgentLoop {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(ReadFileTool), false).unwrap();
        AgentLoop::new(
            config,
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
    async fn happy_path_reads_file_then_stops() {
        let llm = ScriptedLlm::new(vec![tool_call_response("read_file"), stop_response("done")]);
        let agent_loop = build_loop(llm, AgentConfig { confirm_mode: agentctl_types::ConfirmMode::Yolo, ..Default::default() });
        let mut sink = RecordingEventSink::default();
        let state = agent_loop.run("read README", false, &mut sink).await;

        assert_eq!(state.status, AgentStatus::Success);
        assert_eq!(state.stop_reason, Some(StopReason::LlmDone));
        assert_eq!(state.steps.len(), 1);
        assert!(state.steps[0].outcomes[0].result.success);
        assert_eq!(state.final_output.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn max_steps_triggers_graceful_close() {
        let llm = ScriptedLlm::new(vec![
            tool_call_response("read_file"),
            tool_call_response("read_file"),
            stop_response("summary X"),
        ]);
        let agent_loop = build_loop(
            llm,
            AgentConfig { confirm_mode: agentctl_types::ConfirmMode::Yolo, max_steps: 2, ..Default::default() },
        );
        let mut sink = RecordingEventSink::default();
        let state = agent_loop.run("do work", false, &mut sink).await;

        assert_eq!(state.status, AgentStatus::Partial);
        assert_eq!(state.stop_reason, Some(StopReason::MaxSteps));
        assert_eq!(state.steps.len(), 2);
        assert_eq!(state.final_output.as_deref(), Some("summary X"));
    }

    #[tokio::test]
    async fn zero_max_steps_closes_before_any_llm_call() {
        let llm = ScriptedLlm::new(vec![stop_response("summary")]);
        let agent_loop = build_loop(llm, AgentConfig { max_steps: 0, ..Default::default() });
        let mut sink = RecordingEventSink::default();
        let state = agent_loop.run("do work", false, &mut sink).await;

        assert_eq!(state.status, AgentStatus::Partial);
        assert_eq!(state.stop_reason, Some(StopReason::MaxSteps));
        assert_eq!(state.final_output.as_deref(), Some("summary"));
    }

    #[tokio::test]
    async fn user_interrupt_skips_the_closing_llm_call() {
        let llm = ScriptedLlm::new(vec![]);
        let shutdown = ShutdownController::new();
        shutdown.request();
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(ReadFileTool), false).unwrap();
        let agent_loop = AgentLoop::new(
            AgentConfig::default(),
            ContextConfig { max_tool_result_tokens: 0, summarize_after_steps: 0, keep_recent_steps: 0, max_context_tokens: 0, parallel_tools: false },
            Arc::new(llm),
            Arc::new(registry),
            Arc::new(PostEditHooks::default()),
            std::env::temp_dir(),
            false,
            shutdown,
            Duration::from_secs(30),
            None,
            "agentctl-test",
        );
        let mut sink = RecordingEventSink::default();
        let state = agent_loop.run("do work", false, &mut sink).await;

        assert_eq!(state.status, AgentStatus::Partial);
        assert_eq!(state.stop_reason, Some(StopReason::UserInterrupt));
        assert_eq!(state.final_output.as_deref(), Some("interrupted by user"));
    }

    #[tokio::test]
    async fn path_traversal_is_reported_as_a_tool_failure_not_a_loop_error() {
        struct TraversalTool;
        #[async_trait]
        impl Tool for TraversalTool {
            fn name(&self) -> &str {
                "read_file"
            }
            fn description(&self) -> &str {
                "reads a file"
            }
            fn schema(&self) -> &ToolSchema {
                static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
                SCHEMA.get_or_init(|| ToolSchema::new(vec![]))
            }
            fn validate_args(&self, args: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
                Ok(args.clone())
            }
            async fn execute(&self, _args: serde_json::Value) -> ToolResult {
                match agentctl_sandbox::resolve_within_root("../../etc/passwd", &std::env::temp_dir()) {
                    Ok(_) => ToolResult::ok("unexpected"),
                    Err(e) => ToolResult::fail(format!("path traversal: {e}")),
                }
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(TraversalTool), false).unwrap();
        let llm = ScriptedLlm::new(vec![tool_call_response("read_file"), stop_response("done")]);
        let agent_loop = AgentLoop::new(
            AgentConfig { confirm_mode: agentctl_types::ConfirmMode::Yolo, ..Default::default() },
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
        );
        let mut sink = RecordingEventSink::default();
        let state = agent_loop.run("read traversal", false, &mut sink).await;

        assert!(!state.steps[0].outcomes[0].result.success);
        assert!(state.steps[0].outcomes[0].result.output.contains("path traversal"));
        assert_eq!(state.status, AgentStatus::Success);
    }
}
