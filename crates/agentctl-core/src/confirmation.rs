//! Confirmation policy (spec.md §4.5).
//!
//! Grounded in the teacher's `high_risk.rs` confirmable-category idea,
//! generalized from a single "is this path config-like" predicate into the
//! full yolo/confirm-sensitive/confirm-all matrix spec.md requires.

use agentctl_types::{ConfirmMode, Sensitivity};
use std::io::{BufRead, Write};

/// Name of the one tool whose sensitivity is computed per call rather than
/// fixed. Only this tool gets the "yolo but still confirm if dangerous"
/// carve-out in §4.5.
pub const SHELL_TOOL_NAME: &str = "run_command";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAnswer {
    Proceed,
    Cancel,
    Abort,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfirmError {
    #[error("needs TTY for confirmation")]
    NoTty,
}

pub struct ConfirmationPolicy {
    mode: ConfirmMode,
}

impl ConfirmationPolicy {
    pub fn new(mode: ConfirmMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ConfirmMode {
        self.mode
    }

    /// `shouldConfirm(tool)` from spec.md §4.5.
    pub fn should_confirm(&self, tool_name: &str, sensitivity: Sensitivity) -> bool {
        match self.mode {
            ConfirmMode::Yolo => {
                tool_name == SHELL_TOOL_NAME && sensitivity == Sensitivity::Dangerous
            }
            ConfirmMode::ConfirmSensitive => sensitivity.requires_confirmation(),
            ConfirmMode::ConfirmAll => true,
        }
    }

    /// Interactive y/n/a prompt on a TTY. Returns `NoTty` when stdin is not
    /// a terminal — the caller converts that into a failing `ToolResult`.
    pub fn request_confirmation(
        &self,
        prompt_line: &str,
    ) -> Result<ConfirmAnswer, ConfirmError> {
        if !is_stdin_tty() {
            return Err(ConfirmError::NoTty);
        }
        print!("{prompt_line} [y/n/a]: ");
        std::io::stdout().flush().ok();
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line).map_err(|_| ConfirmError::NoTty)?;
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => Ok(ConfirmAnswer::Proceed),
            "a" | "abort" => Ok(ConfirmAnswer::Abort),
            _ => Ok(ConfirmAnswer::Cancel),
        }
    }
}

fn is_stdin_tty() -> bool {
    use std::io::IsTerminal;
    std::io::stdin().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yolo_only_confirms_dangerous_shell() {
        let policy = ConfirmationPolicy::new(ConfirmMode::Yolo);
        assert!(!policy.should_confirm("write_file", Sensitivity::Dangerous));
        assert!(!policy.should_confirm(SHELL_TOOL_NAME, Sensitivity::Dev));
        assert!(policy.should_confirm(SHELL_TOOL_NAME, Sensitivity::Dangerous));
    }

    #[test]
    fn confirm_sensitive_follows_sensitivity_flag() {
        let policy = ConfirmationPolicy::new(ConfirmMode::ConfirmSensitive);
        assert!(!policy.should_confirm("read_file", Sensitivity::Safe));
        assert!(policy.should_confirm("write_file", Sensitivity::Dev));
        assert!(policy.should_confirm(SHELL_TOOL_NAME, Sensitivity::Dangerous));
    }

    #[test]
    fn confirm_all_always_confirms() {
        let policy = ConfirmationPolicy::new(ConfirmMode::ConfirmAll);
        assert!(policy.should_confirm("read_file", Sensitivity::Safe));
    }
}
