//! Conversation messages and the LLM response shape.
//!
//! Mirrors the OpenAI-style chat-completion wire format (the teacher's
//! `ChatMessage`/`ToolCall`), kept independent of any particular transport.

use serde::{Deserialize, Serialize};

/// A role in the conversation. Indices 0 and 1 of `AgentState::messages`
/// are pinned to `System` and `User` respectively for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: ChatRole,
    /// Textual content. May be empty (e.g. an assistant message that is
    /// only a tool-call manifest).
    #[serde(default)]
    pub content: String,
    /// Present only on assistant messages that requested tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Present only on tool-role messages; cross-references the ToolCall.id
    /// it answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into(), tool_calls: None, tool_call_id: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into(), tool_calls: None, tool_call_id: None }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into(), tool_calls: None, tool_call_id: None }
    }

    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Approximate token cost used by `ContextManager`: `len(content)` plus
    /// `len(name) + len(arguments)` per tool call, plus a flat 16-token
    /// per-message overhead, divided by 4. Never serialises the whole
    /// message to JSON first — that would over-count punctuation.
    pub fn token_estimate(&self) -> usize {
        let mut chars = self.content.len() + 16;
        if let Some(calls) = &self.tool_calls {
            for call in calls {
                chars += call.function.name.len() + call.arguments_str().len();
            }
        }
        chars / 4
    }
}

/// A tool call requested by the LLM. The `id` is opaque and assigned by the
/// model; it is threaded back through the matching tool-role message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn arguments_str(&self) -> String {
        self.function.arguments.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Already parsed from transport form (spec.md §3: "argument mapping,
    /// already parsed from transport form").
    pub arguments: serde_json::Value,
}

/// The closed set of reasons a non-streaming or consolidated-streaming
/// completion can end on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    /// Model hit its own output-length cap with no tool calls and no
    /// natural stop. Spec.md §9 open question (b): treated as "wants to
    /// continue" rather than a terminal state.
    Length,
    Other,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

/// One LLM turn's response: optional text, zero or more tool calls, a
/// finish-reason tag, and optional usage counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    pub usage: Option<Usage>,
}

impl LlmResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}
