//! Path traversal guard (spec.md §6 "Path sandbox (security-critical)").
//!
//! Every user-supplied path is resolved against the workspace root and
//! must remain a descendant of it after symlink resolution. Absolute
//! paths, `..` traversal that would climb above the root, and symlinked
//! escapes all fail with [`PathGuardError::Traversal`].
//!
//! Grounded in the teacher's `skilllite-core::path_validation` (canonicalize
//! + `starts_with` check) generalized to also cover paths whose final
//! component does not exist yet (a new file about to be written).

use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PathGuardError {
    #[error("path traversal: {0}")]
    Traversal(String),
    #[error("workspace root is invalid: {0}")]
    InvalidRoot(String),
}

/// Resolve `raw` (as supplied by the LLM) against `root`, rejecting any
/// attempt to leave the workspace.
pub fn resolve_within_root(raw: &str, root: &Path) -> Result<PathBuf, PathGuardError> {
    let root = root
        .canonicalize()
        .map_err(|e| PathGuardError::InvalidRoot(format!("{}: {e}", root.display())))?;

    let input = Path::new(raw);
    if input.is_absolute() {
        return Err(PathGuardError::Traversal(format!(
            "absolute paths are not permitted: {raw}"
        )));
    }

    let mut normalized = root.clone();
    for component in input.components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() || !normalized.starts_with(&root) {
                    return Err(PathGuardError::Traversal(format!(
                        "'..' escapes workspace root: {raw}"
                    )));
                }
            }
            Component::CurDir => {}
            Component::Normal(segment) => normalized.push(segment),
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathGuardError::Traversal(format!(
                    "absolute paths are not permitted: {raw}"
                )));
            }
        }
    }

    let resolved = resolve_symlinks_best_effort(&normalized)?;
    if !resolved.starts_with(&root) {
        return Err(PathGuardError::Traversal(format!(
            "symlink escapes workspace root: {raw}"
        )));
    }
    Ok(resolved)
}

/// Canonicalize the deepest existing ancestor (resolving symlinks along the
/// way) and re-append whatever trailing components do not exist yet, so a
/// not-yet-created file still gets its parent directories symlink-checked.
fn resolve_symlinks_best_effort(path: &Path) -> Result<PathBuf, PathGuardError> {
    let mut existing = path.to_path_buf();
    let mut pending: Vec<std::ffi::OsString> = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(canonical) => {
                let mut out = canonical;
                for segment in pending.into_iter().rev() {
                    out.push(segment);
                }
                return Ok(out);
            }
            Err(_) => {
                let Some(file_name) = existing.file_name().map(|n| n.to_os_string()) else {
                    return Err(PathGuardError::InvalidRoot(
                        "no existing ancestor found".to_string(),
                    ));
                };
                pending.push(file_name);
                if !existing.pop() {
                    return Err(PathGuardError::InvalidRoot(
                        "no existing ancestor found".to_string(),
                    ));
                }
            }
        }
    }
}
