//! `run_command`: the shell tool (spec.md §6). Sensitivity is computed per
//! call from `agentctl_sandbox::classify_command`, not a fixed flag — this
//! is the one tool whose `Tool::sensitivity` is dynamic (spec.md §3).
//!
//! Subprocess shape and head+tail output truncation are grounded in the
//! teacher's `extensions/builtin/run_command.rs::execute_run_command` /
//! `truncate_command_output`; the dangerous/blocked split is generalized
//! onto `agentctl_sandbox::classify_command`, which the teacher's single
//! `DANGEROUS_PATTERNS` list does not distinguish (it has no safe/dev tier).

use agentctl_sandbox::{classify_command, CommandRisk};
use agentctl_types::{FieldKind, SchemaField, Sensitivity, Tool, ToolResult, ToolSchema};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

const MAX_OUTPUT_CHARS: usize = 8000;
const TIMEOUT_SECS: u64 = 300;

pub struct RunCommandTool {
    workspace_root: PathBuf,
}

impl RunCommandTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the workspace directory. Read-only and \
         VCS-query commands run without confirmation; build/test/lint \
         tooling and anything else may require confirmation depending on \
         the active confirm mode. A fixed blocklist rejects destructive \
         commands outright. Timeout: 300 seconds."
    }

    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| {
            ToolSchema::new(vec![SchemaField {
                name: "command",
                kind: FieldKind::String,
                required: true,
                description: "the shell command to execute",
                default: None,
            }])
        })
    }

    /// Dynamic per spec.md §3/§6: blocklist hits and anything that doesn't
    /// match a known safe/dev leader collapse to `Dangerous` so
    /// `ConfirmationPolicy` treats them conservatively; the pipeline itself
    /// still rejects blocklisted commands at execute time.
    fn sensitivity(&self, args: &serde_json::Value) -> Sensitivity {
        let command = args.get("command").and_then(|v| v.as_str()).unwrap_or_default();
        match classify_command(command) {
            Ok(CommandRisk::Safe) => Sensitivity::Safe,
            Ok(CommandRisk::Dev) => Sensitivity::Dev,
            Ok(CommandRisk::Dangerous) | Err(_) => Sensitivity::Dangerous,
        }
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let command = args.get("command").and_then(|v| v.as_str()).unwrap_or_default();
        if command.trim().is_empty() {
            return ToolResult::fail("command must not be empty");
        }

        if let Err(blocked) = classify_command(command) {
            return ToolResult::fail(format!("command blocked: {blocked}"));
        }

        let mut child = match tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.workspace_root)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return ToolResult::fail(format!("failed to spawn command: {e}")),
        };

        let timeout = Duration::from_secs(TIMEOUT_SECS);
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return ToolResult::fail(format!("error waiting for command: {e}")),
            Err(_) => {
                return ToolResult::fail(format!("command timed out after {TIMEOUT_SECS}s"));
            }
        };

        let stdout_text = String::from_utf8_lossy(&output.stdout);
        let stderr_text = String::from_utf8_lossy(&output.stderr);
        let combined = combine(&stdout_text, &stderr_text);
        let truncated = truncate_output(&combined);

        if output.status.success() {
            if truncated.is_empty() {
                ToolResult::ok("command succeeded (exit 0)")
            } else {
                ToolResult::ok(format!("command succeeded (exit 0):\n{truncated}"))
            }
        } else {
            let code = output.status.code().unwrap_or(-1);
            ToolResult::fail(format!("command failed (exit {code}):\n{truncated}"))
        }
    }
}

fn combine(stdout: &str, stderr: &str) -> String {
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (true, true) => String::new(),
        (false, true) => stdout.trim_end().to_string(),
        (true, false) => stderr.trim_end().to_string(),
        (false, false) => format!("{}\n[stderr]: {}", stdout.trim_end(), stderr.trim_end()),
    }
}

/// Head+tail bound so a runaway command cannot blow out the context window
/// (spec.md §5 "Resource discipline": "output is size-bounded (head+tail
/// preservation)").
fn truncate_output(output: &str) -> String {
    if output.len() <= MAX_OUTPUT_CHARS {
        return output.to_string();
    }
    let head_size = MAX_OUTPUT_CHARS * 2 / 3;
    let tail_size = MAX_OUTPUT_CHARS / 3;
    let head = &output[..floor_char_boundary(output, head_size)];
    let tail = &output[floor_char_boundary(output, output.len().saturating_sub(tail_size))..];
    format!(
        "{head}\n\n[... output truncated: {} total chars, showing head + tail ...]\n\n{tail}",
        output.len()
    )
}

fn floor_char_boundary(s: &str, idx: usize) -> usize {
    let mut idx = idx.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_a_safe_command_successfully() {
        let tool = RunCommandTool::new(std::env::temp_dir());
        let result = tool.execute(serde_json::json!({"command": "echo hello"})).await;
        assert!(result.success);
        assert!(result.output.contains("hello"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_failing_result_not_a_panic() {
        let tool = RunCommandTool::new(std::env::temp_dir());
        let result = tool.execute(serde_json::json!({"command": "exit 3"})).await;
        assert!(!result.success);
        assert!(result.output.contains("exit 3"));
    }

    #[tokio::test]
    async fn blocked_command_never_spawns() {
        let tool = RunCommandTool::new(std::env::temp_dir());
        let result = tool.execute(serde_json::json!({"command": "rm -rf /"})).await;
        assert!(!result.success);
        assert!(result.output.contains("blocked"));
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let tool = RunCommandTool::new(std::env::temp_dir());
        let result = tool.execute(serde_json::json!({"command": "   "})).await;
        assert!(!result.success);
    }

    #[test]
    fn sensitivity_follows_the_classifier() {
        let tool = RunCommandTool::new(std::env::temp_dir());
        assert_eq!(tool.sensitivity(&serde_json::json!({"command": "git status"})), Sensitivity::Safe);
        assert_eq!(tool.sensitivity(&serde_json::json!({"command": "cargo test"})), Sensitivity::Dev);
        assert_eq!(tool.sensitivity(&serde_json::json!({"command": "curl http://x"})), Sensitivity::Dangerous);
    }

    #[test]
    fn truncates_long_output_preserving_head_and_tail() {
        let output = "a".repeat(20_000);
        let truncated = truncate_output(&output);
        assert!(truncated.len() < output.len());
        assert!(truncated.contains("truncated"));
        assert!(truncated.starts_with('a'));
        assert!(truncated.ends_with('a'));
    }
}
