//! Shell command risk classifier (spec.md §6).
//!
//! Two layers:
//! 1. A fixed blocklist of regular expressions that rejects a command
//!    outright, regardless of confirm mode.
//! 2. A classifier that tags surviving commands into {safe, dev, dangerous}
//!    by matching the leading program/subcommand against maintained
//!    allow-sets.
//!
//! Grounded in `extensions/builtin/run_command.rs`'s `DANGEROUS_PATTERNS`
//! and `high_risk.rs`'s confirmable-category naming.

use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRisk {
    Safe,
    Dev,
    Dangerous,
}

/// A command matched against the fixed blocklist. Carries the human-
/// readable reason so the caller can surface it in the failing
/// `ToolResult`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("blocked command: {0}")]
pub struct BlockedCommand(pub String);

struct BlockRule {
    pattern: &'static str,
    reason: &'static str,
}

const BLOCKLIST: &[BlockRule] = &[
    BlockRule { pattern: r"rm\s+-[a-zA-Z]*r[a-zA-Z]*\s+/\s*$", reason: "rm -rf / — system destruction" },
    BlockRule { pattern: r"rm\s+(-[a-zA-Z]*f[a-zA-Z]*\s+|.*--force\s+).*\*", reason: "forced recursive delete over a glob" },
    BlockRule { pattern: r"(curl|wget)\s+.*\|\s*(sudo\s+)?(bash|sh|zsh)\b", reason: "piping a remote script into a shell" },
    BlockRule { pattern: r"\bsudo\s+(su\b|-i\b|passwd\b)", reason: "privilege escalation via sudo" },
    BlockRule { pattern: r"^\s*su\s+-", reason: "privilege escalation via su" },
    BlockRule { pattern: r":\(\)\s*\{\s*:\|:\s*&\s*\}\s*;\s*:", reason: "fork bomb" },
    BlockRule { pattern: r"dd\s+.*of=/dev/(sd|nvme|hd)", reason: "raw write to a block device" },
    BlockRule { pattern: r">\s*/dev/(sd|nvme|hd)", reason: "raw write to a block device" },
    BlockRule { pattern: r"\bkill\s+-9\s+-1\b", reason: "mass-kill of every process" },
    BlockRule { pattern: r"\bkillall\s+-9\b", reason: "mass-kill by name" },
    BlockRule { pattern: r"chmod\s+(-[a-zA-Z]*R[a-zA-Z]*|--recursive)\s+777\b", reason: "recursive world-writable permission change" },
];

static BLOCK_REGEXES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    BLOCKLIST
        .iter()
        .filter_map(|rule| Regex::new(rule.pattern).ok().map(|re| (re, rule.reason)))
        .collect()
});

/// Read-only utilities and VCS-query commands: never confirmed, even
/// under `confirm-all` reduced logic (ConfirmationPolicy still applies
/// its own mode rules on top of this tag).
const SAFE_LEADERS: &[&str] = &[
    "ls", "cat", "head", "tail", "pwd", "echo", "which", "file", "wc", "diff", "find", "grep",
    "rg", "tree", "stat", "env", "whoami", "date", "git status", "git diff", "git log",
    "git show", "git blame", "git branch", "git remote", "git describe",
];

/// Test/build/lint/type-check tooling.
const DEV_LEADERS: &[&str] = &[
    "cargo test", "cargo build", "cargo check", "cargo clippy", "cargo fmt", "cargo run",
    "npm test", "npm run", "npm install", "yarn test", "yarn build", "pnpm test", "pnpm build",
    "pytest", "python -m pytest", "go test", "go build", "go vet", "make", "tsc", "eslint",
    "ruff", "mypy", "black", "prettier",
];

/// Classify `cmd`. Blocklist hits short-circuit with `Err`; everything
/// else is tagged `Safe`/`Dev`/`Dangerous` by leading-command match,
/// defaulting to `Dangerous` when nothing recognised matches.
pub fn classify_command(cmd: &str) -> Result<CommandRisk, BlockedCommand> {
    for (re, reason) in BLOCK_REGEXES.iter() {
        if re.is_match(cmd) {
            return Err(BlockedCommand(reason.to_string()));
        }
    }

    let trimmed = cmd.trim();
    if SAFE_LEADERS.iter().any(|leader| starts_with_word(trimmed, leader)) {
        return Ok(CommandRisk::Safe);
    }
    if DEV_LEADERS.iter().any(|leader| starts_with_word(trimmed, leader)) {
        return Ok(CommandRisk::Dev);
    }
    Ok(CommandRisk::Dangerous)
}

/// True if `text` begins with `leader` followed by a word boundary (end of
/// string or whitespace) — avoids `ls` matching `lsof`.
fn starts_with_word(text: &str, leader: &str) -> bool {
    text == leader
        || text
            .strip_prefix(leader)
            .is_some_and(|rest| rest.starts_with(char::is_whitespace))
}
