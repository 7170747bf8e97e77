//! Security-critical helpers consumed by the tool pipeline (spec.md §6):
//! path traversal guarding and shell-command risk classification.

mod classifier;
mod path_guard;

pub use classifier::{classify_command, CommandRisk};
pub use path_guard::{resolve_within_root, PathGuardError};
