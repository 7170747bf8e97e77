//! Tool execution pipeline (spec.md §4.2): the eight-stage
//! lookup → validate → confirm → execute → post-hook sequence that never
//! raises to its caller.
//!
//! Grounded in the teacher's `agent_loop/execution.rs` (`execute_tool_batch_*`)
//! for the overall per-call shape, generalized to the spec's exact stage
//! ordering and bounded-parallelism rule (§5), which the teacher's loop runs
//! strictly serially.

use crate::confirmation::{ConfirmAnswer, ConfirmationPolicy};
use crate::events::EventSink;
use crate::hooks::PostEditHooks;
use crate::registry::ToolRegistry;
use agentctl_types::{ConfirmMode, ToolCall, ToolCallOutcome, ToolResult};
use std::path::PathBuf;
use std::sync::Arc;

const EDIT_SET: &[&str] = &["edit_file", "write_file", "apply_patch"];

pub struct ToolPipeline {
    registry: Arc<ToolRegistry>,
    confirmation: ConfirmationPolicy,
    hooks: Arc<PostEditHooks>,
    workspace_root: PathBuf,
    dry_run: bool,
}

impl ToolPipeline {
    pub fn new(
        registry: Arc<ToolRegistry>,
        confirmation: ConfirmationPolicy,
        hooks: Arc<PostEditHooks>,
        workspace_root: PathBuf,
        dry_run: bool,
    ) -> Self {
        Self { registry, confirmation, hooks, workspace_root, dry_run }
    }

    /// Run every call in `calls`, respecting the bounded-parallelism rule of
    /// spec.md §5: concurrent on a worker pool of `min(n, 4)` only when
    /// `parallel_tools` is enabled AND (confirm_mode is yolo, OR
    /// confirm-sensitive with no sensitive tool in the batch) — otherwise
    /// serial, since interactive confirmation must stay on one thread.
    pub async fn execute_batch(
        &self,
        calls: &[ToolCall],
        parallel_tools: bool,
        sink: &mut dyn EventSink,
    ) -> Vec<ToolCallOutcome> {
        if self.can_run_parallel(calls, parallel_tools) {
            self.execute_parallel(calls).await
        } else {
            self.execute_serial(calls, sink).await
        }
    }

    fn can_run_parallel(&self, calls: &[ToolCall], parallel_tools: bool) -> bool {
        if !parallel_tools || calls.len() < 2 {
            return false;
        }
        match self.confirmation.mode() {
            ConfirmMode::Yolo => true,
            ConfirmMode::ConfirmSensitive => !calls.iter().any(|c| self.is_sensitive(c)),
            ConfirmMode::ConfirmAll => false,
        }
    }

    fn is_sensitive(&self, call: &ToolCall) -> bool {
        let Ok(tool) = self.registry.get(&call.function.name) else { return false };
        tool.sensitivity(&call.function.arguments).requires_confirmation()
    }

    async fn execute_serial(&self, calls: &[ToolCall], sink: &mut dyn EventSink) -> Vec<ToolCallOutcome> {
        let mut outcomes = Vec::with_capacity(calls.len());
        for call in calls {
            outcomes.push(self.execute_one(call, Some(sink)).await);
        }
        outcomes
    }

    /// Worker pool of `min(n, 4)`, results pre-sized and indexed by original
    /// call position so the message-back order never depends on completion
    /// order (spec.md §5). Confirmation prompts never occur on this path —
    /// `can_run_parallel` already ruled that out.
    async fn execute_parallel(&self, calls: &[ToolCall]) -> Vec<ToolCallOutcome> {
        use futures_util::stream::{self, StreamExt};

        let worker_count = calls.len().min(4);
        let results: Vec<ToolCallOutcome> = stream::iter(calls.iter().enumerate())
            .map(|(idx, call)| async move { (idx, self.execute_one(call, None).await) })
            .buffer_unordered(worker_count)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .fold(vec![None; calls.len()], |mut acc, (idx, outcome)| {
                acc[idx] = Some(outcome);
                acc
            })
            .into_iter()
            .map(|o| o.expect("every index is filled exactly once"))
            .collect();
        results
    }

    /// The eight stages of spec.md §4.2. `sink` is `None` on the parallel
    /// path, where confirmation can never trigger.
    async fn execute_one(&self, call: &ToolCall, sink: Option<&mut dyn EventSink>) -> ToolCallOutcome {
        let name = &call.function.name;

        // Stage 1: lookup.
        let tool = match self.registry.get(name) {
            Ok(tool) => tool,
            Err(e) => {
                return ToolCallOutcome {
                    call: call.clone(),
                    result: ToolResult::fail(format!("tool not found: {e}")),
                    was_confirmed: false,
                    was_dry_run: false,
                };
            }
        };

        // Stage 2: argument validation.
        let validated = match tool.validate_args(&call.function.arguments) {
            Ok(v) => v,
            Err(e) => {
                return ToolCallOutcome {
                    call: call.clone(),
                    result: ToolResult::fail(e.to_string()),
                    was_confirmed: false,
                    was_dry_run: false,
                };
            }
        };

        // Stage 3: confirmation decision.
        let sensitivity = tool.sensitivity(&validated);
        let needs_confirmation = self.confirmation.should_confirm(name, sensitivity);
        let mut was_confirmed = false;

        // Stage 4: confirmation prompt.
        if needs_confirmation {
            let args_summary = summarize_args(&validated);
            if let Some(sink) = sink {
                sink.on_confirmation_prompt(name, &args_summary, self.dry_run);
            }
            match self.confirmation.request_confirmation(&format!("{name}({args_summary})")) {
                Ok(ConfirmAnswer::Proceed) => was_confirmed = true,
                Ok(ConfirmAnswer::Cancel) => {
                    return ToolCallOutcome {
                        call: call.clone(),
                        result: ToolResult::fail("cancelled"),
                        was_confirmed: false,
                        was_dry_run: false,
                    };
                }
                Ok(ConfirmAnswer::Abort) => {
                    std::process::exit(130);
                }
                Err(_) => {
                    return ToolCallOutcome {
                        call: call.clone(),
                        result: ToolResult::fail("needs TTY for confirmation (set --yolo or run interactively)"),
                        was_confirmed: false,
                        was_dry_run: false,
                    };
                }
            }
        }

        // Stage 5: dry-run short-circuit.
        if self.dry_run {
            let args_summary = summarize_args(&validated);
            return ToolCallOutcome {
                call: call.clone(),
                result: ToolResult::ok(format!("[DRY-RUN] {name}({args_summary})")),
                was_confirmed,
                was_dry_run: true,
            };
        }

        // Stage 6: execute. `Tool::execute` is already total (spec.md §3) —
        // it cannot raise, only return a failing `ToolResult`.
        let mut result = tool.execute(validated.clone()).await;

        // Stage 7: post-edit hooks.
        if !self.hooks.is_empty() && EDIT_SET.contains(&name.as_str()) {
            if let Some(relative) = validated.get("path").and_then(|v| v.as_str()) {
                if let Ok(absolute) = agentctl_sandbox::resolve_within_root(relative, &self.workspace_root) {
                    let hook_output = self.hooks.run_for(relative, &absolute, &self.workspace_root).await;
                    if !hook_output.is_empty() {
                        result.output = format!("{}\n\n{hook_output}", result.output);
                    }
                }
            }
        }

        // Stage 8: return.
        ToolCallOutcome { call: call.clone(), result, was_confirmed, was_dry_run: false }
    }
}

fn summarize_args(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", &s[..200])
    } else {
        s
    }
}
