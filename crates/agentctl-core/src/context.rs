//! Three-level progressive context-window management (spec.md §4.3).
//!
//! Grounded in the teacher's `truncate_tool_messages` (`llm/mod.rs`) for the
//! truncation shape, generalized to the spec's exact head/tail/marker rule,
//! plus a fresh mid-dialog summarization level and sliding window the
//! teacher does not have (it only ever truncates, never drops or
//! summarizes messages).

use crate::llm::LlmClient;
use agentctl_types::{ChatRole, ContextConfig, Message};

pub struct ContextManager {
    config: ContextConfig,
}

impl ContextManager {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    /// L1 — applied at message-append time by the caller assembling a tool
    /// result message, not by `manage`. Identity when the output already
    /// fits or the level is disabled (`max_tool_result_tokens == 0`).
    pub fn truncate_tool_result(&self, output: &str) -> String {
        if self.config.max_tool_result_tokens == 0 {
            return output.to_string();
        }
        let max_chars = self.config.max_tool_result_tokens * 4;
        if output.len() <= max_chars {
            return output.to_string();
        }
        let lines: Vec<&str> = output.split('\n').collect();
        if lines.len() <= 60 {
            return output.to_string();
        }
        let head = &lines[..40];
        let tail = &lines[lines.len() - 20..];
        let omitted = lines.len() - 60;
        format!("{}\n[... {omitted} lines omitted ...]\n{}", head.join("\n"), tail.join("\n"))
    }

    fn token_estimate(messages: &[Message]) -> usize {
        messages.iter().map(Message::token_estimate).sum()
    }

    /// `isCriticallyFull` from spec.md §4.3.
    pub fn is_critically_full(&self, messages: &[Message]) -> bool {
        if self.config.max_context_tokens == 0 {
            return false;
        }
        let estimate = Self::token_estimate(messages);
        estimate * 100 >= self.config.max_context_tokens * 95
    }

    fn over_threshold(&self, messages: &[Message], percent: usize) -> bool {
        if self.config.max_context_tokens == 0 {
            return false;
        }
        Self::token_estimate(messages) * 100 > self.config.max_context_tokens * percent
    }

    /// `manage(messages, llm)`: L2 when over 75% and an LLM is available,
    /// then always L3.
    pub async fn manage(&self, messages: &mut Vec<Message>, llm: Option<&dyn LlmClient>) {
        if self.over_threshold(messages, 75) {
            if let Some(llm) = llm {
                self.compress(messages, llm).await;
            }
        }
        self.slide(messages);
    }

    /// L2 — mid-dialog compression.
    async fn compress(&self, messages: &mut Vec<Message>, llm: &dyn LlmClient) {
        if self.config.summarize_after_steps == 0 {
            return;
        }
        let tool_exchange_count = messages
            .iter()
            .filter(|m| matches!(m.role, ChatRole::Assistant) && m.tool_calls.as_ref().is_some_and(|c| !c.is_empty()))
            .count();
        if tool_exchange_count <= self.config.summarize_after_steps {
            return;
        }
        if messages.len() <= 2 {
            return;
        }

        let keep_recent = self.config.keep_recent_steps * 3;
        let prefix_len = 2;
        let recent_start = messages.len().saturating_sub(keep_recent).max(prefix_len);
        if recent_start <= prefix_len {
            return;
        }

        let old = &messages[prefix_len..recent_start];
        let summary = match summarize_via_llm(old, llm).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(error = %e, "context summarization failed, falling back to mechanical summary");
                mechanical_summary(old)
            }
        };

        let recent: Vec<Message> = messages[recent_start..].to_vec();
        let mut rebuilt = messages[..prefix_len].to_vec();
        rebuilt.push(Message::assistant(format!("[Summary of earlier steps]\n{summary}")));
        rebuilt.extend(recent);
        *messages = rebuilt;
    }

    /// L3 — sliding window.
    fn slide(&self, messages: &mut Vec<Message>) {
        if self.config.max_context_tokens == 0 {
            return;
        }
        while messages.len() > 4 && Self::token_estimate(messages) > self.config.max_context_tokens {
            if messages.len() < 4 {
                break;
            }
            messages.remove(2);
            messages.remove(2);
        }
    }
}

async fn summarize_via_llm(old: &[Message], llm: &dyn LlmClient) -> anyhow::Result<String> {
    let transcript = old
        .iter()
        .map(|m| format!("{:?}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = Message::user(format!(
        "Summarize the following earlier conversation turns in about 200 words, \
         focusing on what was done and what state the workspace is now in:\n\n{transcript}"
    ));
    let system = Message::system("You are a terse summarization assistant. Reply with only the summary text.");
    let response = llm.completion(&[system, prompt], &[]).await?;
    response.content.filter(|s| !s.trim().is_empty()).ok_or_else(|| anyhow::anyhow!("empty summary"))
}

/// Mechanical fallback: bulleted list of tool names and any `path`-looking
/// argument, used when the summarization call itself fails.
fn mechanical_summary(old: &[Message]) -> String {
    let mut lines = Vec::new();
    for message in old {
        if let Some(calls) = &message.tool_calls {
            for call in calls {
                let path_hint = call
                    .function
                    .arguments
                    .get("path")
                    .and_then(|v| v.as_str())
                    .map(|p| format!(" ({p})"))
                    .unwrap_or_default();
                lines.push(format!("- {}{path_hint}", call.function.name));
            }
        }
    }
    if lines.is_empty() {
        "- earlier steps produced no tool calls".to_string()
    } else {
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentctl_types::{FinishReason, FunctionCall, LlmResponse, ToolCall};
    use async_trait::async_trait;

    struct StubLlm(Option<String>);

    #[async_trait]
    impl LlmClient for StubLlm {
        async fn completion(
            &self,
            _messages: &[Message],
            _tools: &[agentctl_types::ToolDefinition],
        ) -> anyhow::Result<LlmResponse> {
            match &self.0 {
                Some(text) => Ok(LlmResponse {
                    content: Some(text.clone()),
                    tool_calls: vec![],
                    finish_reason: FinishReason::Stop,
                    usage: None,
                }),
                None => anyhow::bail!("simulated summarization failure"),
            }
        }

        async fn completion_stream(
            &self,
            _messages: &[Message],
            _tools: &[agentctl_types::ToolDefinition],
            _sink: &mut dyn crate::events::EventSink,
        ) -> anyhow::Result<LlmResponse> {
            unimplemented!()
        }
    }

    fn cfg(overrides: impl FnOnce(&mut ContextConfig)) -> ContextConfig {
        let mut c = ContextConfig { max_tool_result_tokens: 0, summarize_after_steps: 0, keep_recent_steps: 0, max_context_tokens: 0, parallel_tools: true };
        overrides(&mut c);
        c
    }

    #[test]
    fn l1_truncation_is_identity_under_limit() {
        let manager = ContextManager::new(cfg(|c| c.max_tool_result_tokens = 100));
        let output = "short output";
        assert_eq!(manager.truncate_tool_result(output), output);
    }

    #[test]
    fn l1_disabled_when_zero() {
        let manager = ContextManager::new(cfg(|_| {}));
        let long = "x".repeat(10_000);
        assert_eq!(manager.truncate_tool_result(&long), long);
    }

    #[test]
    fn l1_truncates_long_output_with_marker() {
        let manager = ContextManager::new(cfg(|c| c.max_tool_result_tokens = 10));
        let lines: Vec<String> = (0..100).map(|i| format!("line{i}")).collect();
        let output = lines.join("\n");
        let truncated = manager.truncate_tool_result(&output);
        assert!(truncated.contains("[... 40 lines omitted ...]"));
        assert!(truncated.starts_with("line0"));
        assert!(truncated.ends_with("line99"));
    }

    #[test]
    fn critically_full_respects_zero_disable() {
        let manager = ContextManager::new(cfg(|_| {}));
        let messages = vec![Message::system("s"), Message::user("u")];
        assert!(!manager.is_critically_full(&messages));
    }

    #[tokio::test]
    async fn slide_drops_oldest_pair_after_prefix() {
        let manager = ContextManager::new(cfg(|c| c.max_context_tokens = 1));
        let mut messages = vec![
            Message::system("s"),
            Message::user("u"),
            Message::assistant("old-1"),
            Message::tool_result("1", "old-tool-1"),
            Message::assistant("old-2"),
            Message::tool_result("2", "old-tool-2"),
        ];
        manager.manage(&mut messages, None).await;
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].content, "old-2");
    }

    #[tokio::test]
    async fn manage_is_identity_when_under_threshold() {
        let manager = ContextManager::new(cfg(|c| c.max_context_tokens = 100_000));
        let mut messages = vec![Message::system("s"), Message::user("u")];
        let before = messages.clone();
        manager.manage(&mut messages, None).await;
        assert_eq!(messages.len(), before.len());
    }

    #[tokio::test]
    async fn compression_falls_back_mechanically_on_llm_failure() {
        let manager = ContextManager::new(cfg(|c| {
            c.summarize_after_steps = 1;
            c.keep_recent_steps = 1;
            c.max_context_tokens = 1;
        }));
        let mut messages = vec![Message::system("s"), Message::user("u")];
        for i in 0..5 {
            messages.push(Message::assistant_with_tool_calls(
                "",
                vec![ToolCall { id: format!("id{i}"), function: FunctionCall { name: "read_file".to_string(), arguments: serde_json::json!({"path": format!("f{i}.rs")}) } }],
            ));
            messages.push(Message::tool_result(format!("id{i}"), "ok"));
        }
        let llm = StubLlm(None);
        manager.compress(&mut messages, &llm).await;
        let summary_message = messages.iter().find(|m| m.content.starts_with("[Summary of earlier steps]")).unwrap();
        assert!(summary_message.content.contains("read_file"));
    }
}
