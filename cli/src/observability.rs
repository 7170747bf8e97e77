//! Tracing init for the CLI binary.
//!
//! Grounded in the teacher's `skilllite/src/observability.rs::init_tracing`:
//! `RUST_LOG`/`EnvFilter` takes precedence when set, otherwise a quiet flag
//! collapses the default level to `warn`, and a JSON flag swaps the fmt
//! layer for structured output.

use std::env;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Call once at process startup, before any other `tracing` call.
pub fn init_tracing() {
    let level = if is_quiet() {
        "agentctl=warn".to_string()
    } else {
        env::var("AGENTCTL_LOG_LEVEL").unwrap_or_else(|_| "agentctl=info".to_string())
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let json = env_bool("AGENTCTL_LOG_JSON");

    let _ = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true).with_thread_ids(false))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).with_thread_ids(false))
            .try_init()
    };
}

fn is_quiet() -> bool {
    env_bool("AGENTCTL_QUIET")
}

fn env_bool(key: &str) -> bool {
    env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}
