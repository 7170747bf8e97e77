//! Shared data model for the agent execution core.
//!
//! Messages, tool calls, and agent state are value types owned by the
//! caller; nothing in this crate talks to an LLM or the filesystem.

pub mod message;
pub mod state;
pub mod tool;

pub use message::{ChatRole, FinishReason, FunctionCall, LlmResponse, Message, ToolCall, Usage};
pub use state::{
    AgentConfig, AgentState, AgentStatus, ConfirmMode, ContextConfig, StepResult, StopReason,
    ToolCallOutcome,
};
pub use tool::{Sensitivity, Tool, ToolDefinition, ToolError, ToolResult, ToolSchema};
