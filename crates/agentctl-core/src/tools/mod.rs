//! Concrete builtin tools (SPEC_FULL.md's "[SUPPLEMENT] Concrete tool
//! bodies"). The distilled spec describes `Tool` only by contract; these are
//! grounded in the teacher's `extensions/builtin/*` modules, generalized
//! onto the shared `agentctl_types::Tool` trait and the sandbox crate's
//! path guard.

mod apply_patch;
mod edit_file;
mod read_file;
mod run_command;
mod search;
mod write_file;

pub use apply_patch::ApplyPatchTool;
pub use edit_file::EditFileTool;
pub use read_file::ReadFileTool;
pub use run_command::RunCommandTool;
pub use search::{GlobSearchTool, GrepFilesTool, ListDirectoryTool};
pub use write_file::WriteFileTool;

use agentctl_types::ToolError;
use std::path::{Path, PathBuf};

fn resolve(path_arg: &str, workspace_root: &Path) -> Result<PathBuf, ToolError> {
    agentctl_sandbox::resolve_within_root(path_arg, workspace_root).map_err(|e| ToolError::new(e.to_string()))
}

/// Filenames that are never writable, under any confirm mode — distinct
/// from the merely-confirmable "key path" set (`Cargo.toml` and friends),
/// which `WriteFileTool::sensitivity` tags `Dangerous` instead of refusing.
const SENSITIVE_WRITE_SUFFIXES: &[&str] = &[".env", ".key", ".pem"];
const SENSITIVE_WRITE_PATHS: &[&str] = &[".git/config"];

fn is_sensitive_write_path(relative: &str) -> bool {
    let lower = relative.to_lowercase();
    SENSITIVE_WRITE_PATHS.iter().any(|p| lower.ends_with(p)) || SENSITIVE_WRITE_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

#[cfg(test)]
mod shared_tests {
    use super::*;

    #[test]
    fn flags_dotenv_and_key_files_as_sensitive() {
        assert!(is_sensitive_write_path(".env"));
        assert!(is_sensitive_write_path("secrets/prod.env"));
        assert!(is_sensitive_write_path("id_rsa.key"));
        assert!(is_sensitive_write_path("cert.pem"));
        assert!(is_sensitive_write_path(".git/config"));
        assert!(!is_sensitive_write_path("src/main.rs"));
    }
}
