//! Diagnostics channel (spec.md §6: "streaming destination ... never the
//! primary output channel").
//!
//! Grounded in the teacher's `EventSink` trait (`skilllite-agent/src/types.rs`):
//! a single sink object threaded through the loop that the CLI wires to
//! stderr, and tests wire to an in-memory buffer.

/// Receives everything the loop wants to surface as it runs: streamed text
/// chunks and interactive confirmation prompts. Never receives
/// `final_output` — that goes to the primary output channel separately.
pub trait EventSink: Send {
    fn on_text_chunk(&mut self, text: &str);

    /// A tool is about to run and needs a y/n/a decision. `dry_run` tells
    /// the sink whether to say so in the prompt text.
    fn on_confirmation_prompt(&mut self, tool_name: &str, args_summary: &str, dry_run: bool);

    /// Free-form progress/warning line (watchdog firing, hook failures).
    fn on_notice(&mut self, text: &str);
}

/// Writes everything to stderr, matching the teacher's `TerminalEventSink`.
pub struct TerminalEventSink;

impl EventSink for TerminalEventSink {
    fn on_text_chunk(&mut self, text: &str) {
        use std::io::Write;
        eprint!("{text}");
        let _ = std::io::stderr().flush();
    }

    fn on_confirmation_prompt(&mut self, tool_name: &str, args_summary: &str, dry_run: bool) {
        if dry_run {
            eprintln!("[DRY-RUN] {tool_name}({args_summary}) — confirm? [y/n/a]");
        } else {
            eprintln!("{tool_name}({args_summary}) — confirm? [y/n/a]");
        }
    }

    fn on_notice(&mut self, text: &str) {
        eprintln!("{text}");
    }
}

/// Captures everything in memory; used by tests and by callers that want to
/// inspect the transcript rather than print it.
#[derive(Default)]
pub struct RecordingEventSink {
    pub chunks: Vec<String>,
    pub prompts: Vec<String>,
    pub notices: Vec<String>,
}

impl EventSink for RecordingEventSink {
    fn on_text_chunk(&mut self, text: &str) {
        self.chunks.push(text.to_string());
    }

    fn on_confirmation_prompt(&mut self, tool_name: &str, args_summary: &str, _dry_run: bool) {
        self.prompts.push(format!("{tool_name}({args_summary})"));
    }

    fn on_notice(&mut self, text: &str) {
        self.notices.push(text.to_string());
    }
}
