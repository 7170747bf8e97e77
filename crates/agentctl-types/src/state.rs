//! Per-run agent state and configuration (spec.md §3).

use crate::message::{LlmResponse, Message, ToolCall};
use crate::tool::ToolResult;
use serde::{Deserialize, Serialize};

/// How aggressively the pipeline asks for confirmation before running a
/// tool (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfirmMode {
    Yolo,
    ConfirmSensitive,
    ConfirmAll,
}

/// Agent configuration: persona + tool allow-list + confirm mode + step cap.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub system_prompt: String,
    /// Empty means "all tools".
    pub allowed_tools: Vec<String>,
    pub confirm_mode: ConfirmMode,
    pub max_steps: usize,
    /// Overall wall-clock budget for the run, checked by the loop's
    /// safety-net (distinct from the per-step LLM-call deadline). 0 disables
    /// it.
    pub max_duration_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            allowed_tools: Vec::new(),
            confirm_mode: ConfirmMode::ConfirmSensitive,
            max_steps: 50,
            max_duration_secs: 0,
        }
    }
}

/// Context-window management knobs. A 0-valued field disables its level
/// (spec.md §4.3 / §8 boundary behaviours).
#[derive(Debug, Clone, Copy)]
pub struct ContextConfig {
    pub max_tool_result_tokens: usize,
    pub summarize_after_steps: usize,
    pub keep_recent_steps: usize,
    pub max_context_tokens: usize,
    pub parallel_tools: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tool_result_tokens: 4000,
            summarize_after_steps: 20,
            keep_recent_steps: 6,
            max_context_tokens: 100_000,
            parallel_tools: true,
        }
    }
}

/// The closed set of reasons the agent loop can stop (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopReason {
    LlmDone,
    MaxSteps,
    BudgetExceeded,
    ContextFull,
    Timeout,
    UserInterrupt,
    LlmError,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::LlmDone => "LLM_DONE",
            StopReason::MaxSteps => "MAX_STEPS",
            StopReason::BudgetExceeded => "BUDGET_EXCEEDED",
            StopReason::ContextFull => "CONTEXT_FULL",
            StopReason::Timeout => "TIMEOUT",
            StopReason::UserInterrupt => "USER_INTERRUPT",
            StopReason::LlmError => "LLM_ERROR",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Running,
    Success,
    Partial,
    Failed,
}

/// One tool call paired with its outcome, plus how the pipeline handled it.
#[derive(Debug, Clone)]
pub struct ToolCallOutcome {
    pub call: ToolCall,
    pub result: ToolResult,
    pub was_confirmed: bool,
    pub was_dry_run: bool,
}

/// An immutable record of one LLM turn and the tool calls it produced.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step: usize,
    pub response: LlmResponse,
    pub outcomes: Vec<ToolCallOutcome>,
}

/// Mutable state tracked across a single `AgentLoop::run`.
///
/// Invariants (spec.md §3, enforced by the loop, not this type):
/// - once `status != Running` it is terminal;
/// - `messages.len() >= 2` and `messages[0]`/`messages[1]` are never
///   replaced, only ever read;
/// - `steps.len()` equals the number of LLM turns that produced tool calls.
#[derive(Debug, Clone)]
pub struct AgentState {
    pub messages: Vec<Message>,
    pub steps: Vec<StepResult>,
    pub status: AgentStatus,
    pub stop_reason: Option<StopReason>,
    pub final_output: Option<String>,
    pub start: std::time::Instant,
    pub model: String,
    /// Correlates this run across log lines (spec.md's logging section asks
    /// for per-run correlation the way the teacher's chat sessions carry a
    /// session id).
    pub run_id: uuid::Uuid,
    /// Wall-clock start time (spec.md §3's "start timestamp"); `start`
    /// (`Instant`) remains the source of truth for `elapsed()` since it
    /// can't run backwards.
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AgentState {
    pub fn new(system_prompt: &str, user_prompt: &str, model: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt), Message::user(user_prompt)],
            steps: Vec::new(),
            status: AgentStatus::Running,
            stop_reason: None,
            final_output: None,
            start: std::time::Instant::now(),
            model: model.into(),
            run_id: uuid::Uuid::new_v4(),
            started_at: chrono::Utc::now(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
