//! Self-evaluation of agent output against the original task (spec.md §4.9).
//!
//! Grounded in the teacher's `reflection.rs` judge-call pattern: one extra
//! LLM call prompted for strict JSON, parsed defensively since models
//! routinely wrap a verdict in prose or a fenced code block rather than
//! returning bare JSON.

use crate::llm::LlmClient;
use agentctl_types::{AgentState, Message, StepResult};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub confidence: f64,
    pub reasoning: String,
}

impl Verdict {
    /// spec.md §4.9: "If `completed && confidence >= threshold` the state
    /// is unchanged; otherwise the runner downgrades it to `partial`."
    /// `passed` is this implementation's name for the spec's `completed`.
    pub fn passes(&self, confidence_threshold: f64) -> bool {
        self.passed && self.confidence >= confidence_threshold
    }
}

/// First 500 chars of `final_output`, per spec.md §4.9's judge payload.
const MAX_OUTPUT_CHARS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum EvaluatorError {
    #[error("judge LLM call failed: {0}")]
    Llm(#[from] anyhow::Error),
    #[error("could not parse a verdict out of the judge's response: {0}")]
    Unparseable(String),
}

pub struct SelfEvaluator<'a> {
    llm: &'a dyn LlmClient,
}

impl<'a> SelfEvaluator<'a> {
    pub fn new(llm: &'a dyn LlmClient) -> Self {
        Self { llm }
    }

    /// Basic mode: a single judge call. Per spec.md §4.9 the user payload
    /// carries the original prompt, the first 500 chars of `final_output`,
    /// and a compact step summary listing tool names and key arguments —
    /// never the full, untruncated output. `confidence` is clamped into
    /// `[0, 1]` since the judge model is not guaranteed to respect the
    /// requested range.
    pub async fn evaluate(&self, task: &str, output: &str, steps: &[StepResult]) -> Result<Verdict, EvaluatorError> {
        let system = Message::system(
            "You are a strict evaluator. Judge whether the agent's final output actually \
             satisfies the user's task. Reply with ONLY a JSON object of the form \
             {\"passed\": bool, \"confidence\": number between 0 and 1, \"reasoning\": string}.",
        );
        let truncated_output: String = output.chars().take(MAX_OUTPUT_CHARS).collect();
        let user = Message::user(format!(
            "Task:\n{task}\n\nAgent's final output (first {MAX_OUTPUT_CHARS} chars):\n{truncated_output}\n\n\
             Steps taken:\n{}",
            step_summary(steps)
        ));
        let response = self.llm.completion(&[system, user], &[]).await?;
        let text = response.content.unwrap_or_default();
        let mut verdict = parse_verdict(&text).ok_or_else(|| EvaluatorError::Unparseable(text.clone()))?;
        verdict.confidence = verdict.confidence.clamp(0.0, 1.0);
        Ok(verdict)
    }

    /// Full mode: re-runs `run_fn` — an injected closure that drives another
    /// complete agent turn, kept as a callback rather than a direct
    /// dependency on the loop to avoid `evaluator` and `agent_loop` forming a
    /// cycle — until a verdict passes `confidence_threshold` or
    /// `max_retries` is exhausted. `run_fn` returns the retry's full
    /// `AgentState` (not just its text) so each re-evaluation gets that
    /// retry's own step summary, matching spec.md §4.9's Basic-mode payload.
    /// Returns the final verdict, the output it was judged against, and how
    /// many retries were actually spent.
    pub async fn evaluate_with_retries<F, Fut>(
        &self,
        task: &str,
        mut output: String,
        mut steps: Vec<StepResult>,
        max_retries: usize,
        confidence_threshold: f64,
        mut run_fn: F,
    ) -> (Verdict, String, usize)
    where
        F: FnMut(String) -> Fut,
        Fut: std::future::Future<Output = AgentState>,
    {
        let mut attempts = 0;
        loop {
            let verdict = match self.evaluate(task, &output, &steps).await {
                Ok(v) => v,
                Err(e) => Verdict {
                    passed: true,
                    confidence: 1.0,
                    reasoning: format!("evaluator call failed ({e}); accepting output as-is"),
                },
            };
            if verdict.passes(confidence_threshold) || attempts >= max_retries {
                return (verdict, output, attempts);
            }
            attempts += 1;
            let retry_prompt = format!(
                "Your previous attempt did not satisfy the task. The judge said: {}\n\n\
                 Original task:\n{task}\n\nTry again, addressing that feedback.",
                verdict.reasoning
            );
            let retry_state = run_fn(retry_prompt).await;
            output = retry_state.final_output.unwrap_or_default();
            steps = retry_state.steps;
        }
    }
}

/// Compact step summary for the judge payload (spec.md §4.9): one line per
/// tool call, naming the tool and a truncated view of its arguments.
fn step_summary(steps: &[StepResult]) -> String {
    let lines: Vec<String> = steps
        .iter()
        .flat_map(|step| &step.outcomes)
        .map(|outcome| format!("- {}({})", outcome.call.function.name, summarize_args(&outcome.call.function.arguments)))
        .collect();
    if lines.is_empty() {
        "(no tool calls)".to_string()
    } else {
        lines.join("\n")
    }
}

/// Matches the truncation the pipeline and CLI use for their own
/// args-summary fields.
fn summarize_args(args: &serde_json::Value) -> String {
    const MAX_LEN: usize = 200;
    let rendered = args.to_string();
    if rendered.len() <= MAX_LEN {
        rendered
    } else {
        format!("{}...", &rendered[..MAX_LEN])
    }
}

/// Three fallback strategies, in order: bare JSON, a fenced code block, the
/// first balanced-looking `{...}` substring.
fn parse_verdict(text: &str) -> Option<Verdict> {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str::<Verdict>(trimmed) {
        return Some(v);
    }
    if let Some(fenced) = extract_fenced_block(trimmed) {
        if let Ok(v) = serde_json::from_str::<Verdict>(&fenced) {
            return Some(v);
        }
    }
    if let Some(braces) = extract_first_braces(trimmed) {
        if let Ok(v) = serde_json::from_str::<Verdict>(&braces) {
            return Some(v);
        }
    }
    None
}

fn extract_fenced_block(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let after_marker = &text[start + 3..];
    let after_marker = after_marker.strip_prefix("json").unwrap_or(after_marker);
    let after_marker = after_marker.strip_prefix('\n').unwrap_or(after_marker);
    let end = after_marker.find("```")?;
    Some(after_marker[..end].trim().to_string())
}

fn extract_first_braces(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(text[start..=end].to_string())
}
