//! LLM transport (spec.md §6 contract + SPEC_FULL.md's concrete supplement).
//!
//! Grounded in `skilllite-agent/src/llm/mod.rs` and `llm/openai.rs`: a thin
//! client struct wrapping `reqwest`, one non-streaming call and one
//! SSE-streaming call that accumulates tool-call argument deltas by index
//! before yielding the consolidated response.

use crate::events::EventSink;
use agentctl_types::{FinishReason, FunctionCall, LlmResponse, Message, ToolCall, ToolDefinition, Usage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};

/// The contract spec.md §6 describes as "consumed from LLM adapter".
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn completion(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LlmResponse>;

    /// Streams content chunks to `sink` as they arrive; tool-call chunks are
    /// accumulated internally and surfaced only in the returned, consolidated
    /// response (spec.md §4.1 step 3).
    async fn completion_stream(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        sink: &mut dyn EventSink,
    ) -> Result<LlmResponse>;
}

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn body(&self, messages: &[Message], tools: &[ToolDefinition], stream: bool) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools
                .iter()
                .map(|t| json!({
                    "type": "function",
                    "function": { "name": t.name, "description": t.description, "parameters": t.parameters },
                }))
                .collect::<Vec<_>>());
        }
        body
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn completion(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.api_base);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.body(messages, tools, false))
            .send()
            .await
            .context("LLM API request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error ({status}): {body_text}");
        }
        let raw: Value = resp.json().await.context("failed to parse LLM API response")?;
        parse_completion(&raw)
    }

    async fn completion_stream(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        sink: &mut dyn EventSink,
    ) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.api_base);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.body(messages, tools, true))
            .send()
            .await
            .context("LLM API request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error ({status}): {body_text}");
        }
        accumulate_stream(resp, sink).await
    }
}

fn parse_completion(raw: &Value) -> Result<LlmResponse> {
    let choice = raw
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .context("missing 'choices' in LLM response")?;
    let message = choice.get("message").context("missing 'message' in choice")?;
    let content = message.get("content").and_then(|v| v.as_str()).map(str::to_string);
    let tool_calls = parse_tool_calls(message.get("tool_calls"));
    let finish_reason = parse_finish_reason(choice.get("finish_reason").and_then(|v| v.as_str()));
    let usage = raw.get("usage").and_then(parse_usage);

    Ok(LlmResponse { content, tool_calls, finish_reason, usage })
}

fn parse_tool_calls(value: Option<&Value>) -> Vec<ToolCall> {
    let Some(arr) = value.and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(|tc| {
            let id = tc.get("id")?.as_str()?.to_string();
            let function = tc.get("function")?;
            let name = function.get("name")?.as_str()?.to_string();
            let arguments_str = function.get("arguments")?.as_str()?;
            let arguments: Value = serde_json::from_str(arguments_str).unwrap_or(json!({}));
            Some(ToolCall { id, function: FunctionCall { name, arguments } })
        })
        .collect()
}

fn parse_finish_reason(raw: Option<&str>) -> FinishReason {
    match raw {
        Some("stop") => FinishReason::Stop,
        Some("tool_calls") => FinishReason::ToolCalls,
        Some("length") => FinishReason::Length,
        _ => FinishReason::Other,
    }
}

fn parse_usage(value: &Value) -> Option<Usage> {
    Some(Usage {
        input_tokens: value.get("prompt_tokens")?.as_u64()?,
        output_tokens: value.get("completion_tokens")?.as_u64()?,
        total_tokens: value.get("total_tokens")?.as_u64()?,
    })
}

async fn accumulate_stream(resp: reqwest::Response, sink: &mut dyn EventSink) -> Result<LlmResponse> {
    let mut content = String::new();
    let mut call_ids: Vec<String> = Vec::new();
    let mut call_names: Vec<String> = Vec::new();
    let mut call_arg_fragments: Vec<String> = Vec::new();
    let mut finish_reason = FinishReason::Other;
    let mut usage = None;

    let mut buffer = String::new();
    let mut stream = resp.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.context("stream chunk error")?;
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(newline_pos) = buffer.find('\n') {
            let line = buffer[..newline_pos].trim().to_string();
            buffer = buffer[newline_pos + 1..].to_string();

            if line.is_empty() || line.starts_with(':') || !line.starts_with("data: ") {
                continue;
            }
            let data = &line[6..];
            if data == "[DONE]" {
                continue;
            }
            let Ok(delta_chunk) = serde_json::from_str::<Value>(data) else {
                continue;
            };

            if let Some(u) = delta_chunk.get("usage").and_then(parse_usage) {
                usage = Some(u);
            }

            let Some(choices) = delta_chunk.get("choices").and_then(|c| c.as_array()) else {
                continue;
            };
            for choice in choices {
                if let Some(fr) = choice.get("finish_reason").and_then(|v| v.as_str()) {
                    finish_reason = parse_finish_reason(Some(fr));
                }
                let Some(delta) = choice.get("delta") else { continue };

                if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
                    content.push_str(text);
                    sink.on_text_chunk(text);
                }

                if let Some(tc_deltas) = delta.get("tool_calls").and_then(|v| v.as_array()) {
                    for tc_delta in tc_deltas {
                        let idx = tc_delta.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
                        while call_ids.len() <= idx {
                            call_ids.push(String::new());
                            call_names.push(String::new());
                            call_arg_fragments.push(String::new());
                        }
                        if let Some(id) = tc_delta.get("id").and_then(|v| v.as_str()) {
                            call_ids[idx] = id.to_string();
                        }
                        if let Some(func) = tc_delta.get("function") {
                            if let Some(name) = func.get("name").and_then(|v| v.as_str()) {
                                call_names[idx].push_str(name);
                            }
                            if let Some(args_fragment) = func.get("arguments").and_then(|v| v.as_str()) {
                                call_arg_fragments[idx].push_str(args_fragment);
                            }
                        }
                    }
                }
            }
        }
    }

    // Argument deltas are raw JSON text fragments concatenated across the
    // stream; only the fully-assembled string is valid JSON, so parsing
    // happens once at the end rather than per-delta.
    let tool_calls = call_ids
        .into_iter()
        .zip(call_names)
        .zip(call_arg_fragments)
        .map(|((id, name), args_str)| {
            let arguments = serde_json::from_str(&args_str).unwrap_or(json!({}));
            ToolCall { id, function: FunctionCall { name, arguments } }
        })
        .collect();

    let response_content = if content.is_empty() { None } else { Some(content) };
    Ok(LlmResponse { content: response_content, tool_calls, finish_reason, usage })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_non_streaming_completion_with_tool_calls() {
        let raw = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "function": { "name": "read_file", "arguments": "{\"path\":\"README.md\"}" }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        });
        let response = parse_completion(&raw).unwrap();
        assert!(response.has_tool_calls());
        assert_eq!(response.tool_calls[0].function.name, "read_file");
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn parses_plain_text_completion() {
        let raw = json!({
            "choices": [{ "message": { "content": "done" }, "finish_reason": "stop" }]
        });
        let response = parse_completion(&raw).unwrap();
        assert_eq!(response.content.as_deref(), Some("done"));
        assert!(!response.has_tool_calls());
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }
}
