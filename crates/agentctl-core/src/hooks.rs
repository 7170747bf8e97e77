//! Post-edit hooks (spec.md §4.7): external commands run after a
//! file-mutating tool call.
//!
//! Subprocess handling (piped stdout/stderr, cooperative timeout via
//! `tokio::time::timeout` + `child.kill()`) is grounded in
//! `extensions/builtin/run_command.rs::execute_run_command`. Glob matching
//! generalizes that file's `matches_glob` (which only handled `*.ext`) to
//! also support directory globs (`**`) since hook patterns need to match
//! whole relative paths, not just file names.

use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PostEditHook {
    pub name: String,
    /// Command template containing the literal substring `{file}`.
    pub command_template: String,
    pub patterns: Vec<String>,
    pub timeout_secs: u64,
    pub enabled: bool,
}

impl PostEditHook {
    fn matches(&self, relative_path: &str) -> bool {
        self.enabled && self.patterns.iter().any(|p| glob_match(p, relative_path))
    }
}

#[derive(Default)]
pub struct PostEditHooks {
    hooks: Vec<PostEditHook>,
}

impl PostEditHooks {
    pub fn new(hooks: Vec<PostEditHook>) -> Self {
        Self { hooks }
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every enabled hook whose patterns match `relative_path`,
    /// substituting `{file}` with `absolute_path` (also exported as the
    /// `AGENTCTL_FILE` environment variable), and concatenate their
    /// formatted output with a blank-line separator.
    pub async fn run_for(&self, relative_path: &str, absolute_path: &Path, workspace_root: &Path) -> String {
        let mut sections = Vec::new();
        for hook in &self.hooks {
            if !hook.matches(relative_path) {
                continue;
            }
            let section = run_one(hook, absolute_path, workspace_root).await;
            sections.push(section);
        }
        sections.join("\n\n")
    }
}

async fn run_one(hook: &PostEditHook, absolute_path: &Path, workspace_root: &Path) -> String {
    let command = hook.command_template.replace("{file}", &absolute_path.to_string_lossy());
    tracing::debug!(hook = %hook.name, %command, "running post-edit hook");

    let mut child = match tokio::process::Command::new("sh")
        .arg("-c")
        .arg(&command)
        .env("AGENTCTL_FILE", absolute_path)
        .current_dir(workspace_root)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return format!("[Hook {}: FAILED (exit -1)]\nfailed to spawn: {e}", hook.name),
    };

    let timeout = Duration::from_secs(hook.timeout_secs);
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return format!("[Hook {}: FAILED (exit -1)]\n{e}", hook.name),
        Err(_) => {
            return format!("[Hook {}: FAILED (exit -1)]\nTimeout after {}s", hook.name, hook.timeout_secs);
        }
    };

    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    let combined = combined.trim_end();

    if output.status.success() {
        if combined.is_empty() {
            format!("[Hook {}: OK]", hook.name)
        } else {
            format!("[Hook {}: OK]\n{combined}", hook.name)
        }
    } else {
        let code = output.status.code().unwrap_or(-1);
        format!("[Hook {}: FAILED (exit {code})]\n{combined}", hook.name)
    }
}

/// Minimal glob matcher: `**` matches any path span including `/`, `*`
/// matches any span excluding `/`, everything else is literal.
fn glob_match(pattern: &str, text: &str) -> bool {
    let re = glob_to_regex(pattern);
    regex::Regex::new(&re).map(|re| re.is_match(text)).unwrap_or(false)
}

fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push('.'),
            '.' | '+' | '(' | ')' | '|' | '^' | '$' | '[' | ']' | '{' | '}' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out.push('$');
    out
}
