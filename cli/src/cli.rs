use agentctl_types::ConfirmMode;
use clap::{Parser, ValueEnum};

/// agentctl - a headless CLI agent: an iterative LLM tool-use loop over a
/// local workspace.
#[derive(Parser, Debug)]
#[command(name = "agentctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The task to give the agent.
    #[arg(value_name = "PROMPT")]
    pub prompt: String,

    /// Workspace root every tool path is resolved against.
    #[arg(long, short = 'w', env = "AGENTCTL_WORKSPACE", default_value = ".")]
    pub workspace: String,

    /// OpenAI-compatible API base URL.
    #[arg(long, env = "AGENTCTL_API_BASE")]
    pub api_base: Option<String>,

    /// API key for the LLM endpoint.
    #[arg(long, env = "AGENTCTL_API_KEY")]
    pub api_key: Option<String>,

    /// Model name.
    #[arg(long, short = 'm', env = "AGENTCTL_MODEL")]
    pub model: Option<String>,

    /// Custom system prompt (default: a short built-in persona plus a
    /// workspace tree snippet).
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Confirmation mode.
    #[arg(long, value_enum, default_value_t = ConfirmModeArg::ConfirmSensitive)]
    pub mode: ConfirmModeArg,

    /// Maximum number of LLM turns that may request tools.
    #[arg(long, default_value_t = 50)]
    pub max_steps: usize,

    /// Overall wall-clock budget in seconds for the run (0 = unbounded).
    #[arg(long, default_value_t = 0)]
    pub max_duration_secs: u64,

    /// Per-step LLM call deadline in seconds (0 = unbounded).
    #[arg(long, default_value_t = 120)]
    pub step_timeout_secs: u64,

    /// Stream assistant text to the diagnostics channel (stderr) as it
    /// arrives, instead of only after each turn completes.
    #[arg(long)]
    pub stream: bool,

    /// Preview every tool call's effect without writing to disk or running
    /// commands.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the final `AgentState` as JSON on stdout instead of plain text.
    #[arg(long)]
    pub json: bool,

    /// Run a read-only planning pass before the full-tool build pass
    /// (`MixedRunner`), instead of a single loop over the full tool set.
    #[arg(long)]
    pub mixed: bool,

    /// Self-evaluation pass after the run completes.
    #[arg(long, value_enum, default_value_t = SelfEvalArg::Off)]
    pub self_eval: SelfEvalArg,

    /// Retries spent re-running the task when `--self-eval full` judges the
    /// output as not satisfying the task.
    #[arg(long, default_value_t = 2)]
    pub self_eval_max_retries: usize,

    /// Minimum judge confidence required, alongside a passing verdict, to
    /// leave the run's status unchanged. Below this the runner downgrades
    /// the result to `partial`.
    #[arg(long, default_value_t = 0.7)]
    pub self_eval_confidence_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfirmModeArg {
    Yolo,
    ConfirmSensitive,
    ConfirmAll,
}

impl std::fmt::Display for ConfirmModeArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConfirmModeArg::Yolo => "yolo",
            ConfirmModeArg::ConfirmSensitive => "confirm-sensitive",
            ConfirmModeArg::ConfirmAll => "confirm-all",
        };
        write!(f, "{s}")
    }
}

impl From<ConfirmModeArg> for ConfirmMode {
    fn from(value: ConfirmModeArg) -> Self {
        match value {
            ConfirmModeArg::Yolo => ConfirmMode::Yolo,
            ConfirmModeArg::ConfirmSensitive => ConfirmMode::ConfirmSensitive,
            ConfirmModeArg::ConfirmAll => ConfirmMode::ConfirmAll,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SelfEvalArg {
    /// No self-evaluation.
    Off,
    /// A single judge call after the run; does not retry.
    Basic,
    /// Judge, and re-run the task (up to `--self-eval-max-retries` times)
    /// until it passes.
    Full,
}

impl std::fmt::Display for SelfEvalArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SelfEvalArg::Off => "off",
            SelfEvalArg::Basic => "basic",
            SelfEvalArg::Full => "full",
        };
        write!(f, "{s}")
    }
}
