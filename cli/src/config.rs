//! Unified environment/`.env` configuration layer for the CLI binary.
//!
//! Grounded in `skilllite-core/src/config/{loader,schema}.rs`: a small set
//! of alias-aware env readers, a one-shot `.env` loader, and a couple of
//! domain structs built from them. CLI flags (see `cli.rs`) always win over
//! these, which in turn win over the hard-coded defaults in
//! `agentctl_types`.

use agentctl_types::ContextConfig;
use std::env;
use std::sync::Once;

/// Loads `.env` from the current directory, then `~/.agentctl.env` as a
/// fallback for variables the cwd file didn't set (mirroring the teacher's
/// `dirs::home_dir()` fallback for its own user-level config file). Safe to
/// call more than once — only the first call does anything.
pub fn load_dotenv() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let cwd_path = env::current_dir().map(|d| d.join(".env")).unwrap_or_else(|_| ".env".into());
        load_env_file(&cwd_path);
        if let Some(home) = dirs::home_dir() {
            load_env_file(&home.join(".agentctl.env"));
        }
    });
}

fn load_env_file(path: &std::path::Path) {
    let Ok(content) = std::fs::read_to_string(path) else { return };
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(eq_pos) = line.find('=') else { continue };
        let key = line[..eq_pos].trim();
        let mut value = line[eq_pos + 1..].trim();
        if (value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\''))
        {
            value = &value[1..value.len() - 1];
        }
        if !key.is_empty() && env::var(key).is_err() {
            // SAFETY: called once, before the tokio runtime (and any other
            // threads) are spawned in `main`.
            unsafe { env::set_var(key, value) };
        }
    }
}

/// Reads `primary`, falling back through `aliases` in order, then `default`.
pub fn env_or(primary: &str, aliases: &[&str], default: impl FnOnce() -> String) -> String {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default)
}

pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"),
        Err(_) => default,
    }
}

/// LLM endpoint configuration, `AGENTCTL_*` primary with `OPENAI_*` aliases
/// for drop-in compatibility with existing OpenAI-style environments.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        Self {
            api_base: env_or("AGENTCTL_API_BASE", &["OPENAI_API_BASE", "OPENAI_BASE_URL"], || {
                "https://api.openai.com/v1".to_string()
            }),
            api_key: env_or("AGENTCTL_API_KEY", &["OPENAI_API_KEY"], String::new),
            model: env_or("AGENTCTL_MODEL", &["OPENAI_MODEL"], || "gpt-4o".to_string()),
        }
    }
}

/// Overlays `AGENTCTL_*` env vars onto `defaults`; a var that fails to parse
/// is silently ignored rather than treated as fatal, matching the teacher's
/// "documented defaults on parse failure" stance.
pub fn context_config_from_env(defaults: ContextConfig) -> ContextConfig {
    load_dotenv();
    ContextConfig {
        max_tool_result_tokens: env_usize("AGENTCTL_MAX_TOOL_RESULT_TOKENS", defaults.max_tool_result_tokens),
        summarize_after_steps: env_usize("AGENTCTL_SUMMARIZE_AFTER_STEPS", defaults.summarize_after_steps),
        keep_recent_steps: env_usize("AGENTCTL_KEEP_RECENT_STEPS", defaults.keep_recent_steps),
        max_context_tokens: env_usize("AGENTCTL_MAX_CONTEXT_TOKENS", defaults.max_context_tokens),
        parallel_tools: env_bool_flag("AGENTCTL_PARALLEL_TOOLS", defaults.parallel_tools),
    }
}

pub fn step_timeout_secs_from_env(default: u64) -> u64 {
    env_u64("AGENTCTL_STEP_TIMEOUT_SECS", default)
}
