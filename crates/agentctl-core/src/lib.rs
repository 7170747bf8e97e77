//! agentctl-core: agent loop, tool pipeline, context manager, confirmation
//! policy, tool registry, post-edit hooks, shutdown/step-timer, self
//! evaluator and the mixed (plan-then-build) runner — the execution core
//! described by spec.md §1.
//!
//! Grounded in the teacher's crate split (`skilllite-agent` for the loop/LLM
//! surface, `skilllite-sandbox`/`skilllite-core` for the pieces pulled out
//! into `agentctl-sandbox`/`agentctl-types` here) and its flat
//! `mod foo; pub use foo::Bar;` re-export style at the crate root.

pub mod agent_loop;
pub mod confirmation;
pub mod context;
pub mod events;
pub mod hooks;
pub mod index;
pub mod llm;
pub mod mixed_runner;
pub mod pipeline;
pub mod registry;
pub mod evaluator;
pub mod shutdown;
pub mod tools;

pub use agent_loop::{AgentLoop, CostTracker};
pub use confirmation::{ConfirmAnswer, ConfirmError, ConfirmationPolicy};
pub use context::ContextManager;
pub use events::{EventSink, RecordingEventSink, TerminalEventSink};
pub use evaluator::{EvaluatorError, SelfEvaluator, Verdict};
pub use hooks::{PostEditHook, PostEditHooks};
pub use index::{DefaultIndexProvider, IndexProvider};
pub use llm::{LlmClient, OpenAiClient};
pub use mixed_runner::MixedRunner;
pub use pipeline::ToolPipeline;
pub use registry::{RegistryError, ToolRegistry};
pub use shutdown::{ShutdownController, StepTimer, TimedOut};
