//! `edit_file`: exact-match then whitespace-normalized fuzzy search/replace,
//! with a `dry_run` flag.
//!
//! Grounded in the teacher's `file_ops/search_replace.rs`: try an exact
//! substring match first, requiring uniqueness unless `replace_all` is set;
//! if no exact match exists, fall back to a line-by-line match that ignores
//! leading/trailing whitespace per line.

use super::{is_sensitive_write_path, resolve};
use agentctl_types::{FieldKind, SchemaField, Sensitivity, Tool, ToolResult, ToolSchema};
use async_trait::async_trait;
use std::path::PathBuf;

pub struct EditFileTool {
    workspace_root: PathBuf,
}

impl EditFileTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace `old_string` with `new_string` in a file. Tries an exact \
         match first, then a whitespace-normalized fuzzy match. Fails if \
         `old_string` matches more than once unless `replace_all` is set. \
         `dry_run` previews the change without writing it."
    }

    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| {
            ToolSchema::new(vec![
                SchemaField { name: "path", kind: FieldKind::String, required: true, description: "workspace-relative file path", default: None },
                SchemaField { name: "old_string", kind: FieldKind::String, required: true, description: "text to find", default: None },
                SchemaField { name: "new_string", kind: FieldKind::String, required: true, description: "replacement text", default: None },
                SchemaField {
                    name: "replace_all",
                    kind: FieldKind::Boolean,
                    required: false,
                    description: "replace every occurrence instead of requiring a unique match",
                    default: Some(serde_json::json!(false)),
                },
                SchemaField {
                    name: "dry_run",
                    kind: FieldKind::Boolean,
                    required: false,
                    description: "preview the change without writing it",
                    default: Some(serde_json::json!(false)),
                },
            ])
        })
    }

    fn sensitivity(&self, _args: &serde_json::Value) -> Sensitivity {
        Sensitivity::Dev
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or_default();
        let old_string = args.get("old_string").and_then(|v| v.as_str()).unwrap_or_default();
        let new_string = args.get("new_string").and_then(|v| v.as_str()).unwrap_or_default();
        let replace_all = args.get("replace_all").and_then(|v| v.as_bool()).unwrap_or(false);
        let dry_run = args.get("dry_run").and_then(|v| v.as_bool()).unwrap_or(false);

        if old_string.is_empty() {
            return ToolResult::fail("old_string must not be empty");
        }
        if is_sensitive_write_path(path) {
            return ToolResult::fail(format!("editing '{path}' is blocked: sensitive file"));
        }

        let resolved = match resolve(path, &self.workspace_root) {
            Ok(p) => p,
            Err(e) => return ToolResult::fail(e.to_string()),
        };
        let content = match tokio::fs::read_to_string(&resolved).await {
            Ok(c) => c,
            Err(e) => return ToolResult::fail(format!("failed to read '{path}': {e}")),
        };

        let (new_content, match_kind, occurrences) = match apply_replace(&content, old_string, new_string, replace_all) {
            Ok(v) => v,
            Err(e) => return ToolResult::fail(e),
        };

        if dry_run {
            return ToolResult::ok(format!(
                "[DRY-RUN] would replace {occurrences} occurrence(s) ({match_kind} match) in {path}"
            ));
        }

        match tokio::fs::write(&resolved, &new_content).await {
            Ok(()) => ToolResult::ok(format!("replaced {occurrences} occurrence(s) ({match_kind} match) in {path}")),
            Err(e) => ToolResult::fail(format!("failed to write '{path}': {e}")),
        }
    }
}

/// Returns `(new_content, match_kind, occurrences_replaced)`.
fn apply_replace(content: &str, old: &str, new: &str, replace_all: bool) -> Result<(String, &'static str, usize), String> {
    let exact_count = content.matches(old).count();
    if exact_count > 0 {
        if !replace_all && exact_count > 1 {
            return Err(format!(
                "found {exact_count} occurrences of old_string; set replace_all=true or narrow old_string to a unique match"
            ));
        }
        let replaced = if replace_all { exact_count } else { 1 };
        let new_content = if replace_all { content.replace(old, new) } else { content.replacen(old, new, 1) };
        return Ok((new_content, "exact", replaced));
    }

    fuzzy_replace(content, old, new)
}

/// Line-by-line match ignoring leading/trailing whitespace per line. Only
/// ever replaces a single occurrence — a fuzzy match good enough to be
/// unique by construction (trimmed line sequence equality) is not good
/// enough to safely guess at "all" occurrences.
fn fuzzy_replace(content: &str, old: &str, new: &str) -> Result<(String, &'static str, usize), String> {
    let old_lines: Vec<&str> = old.lines().collect();
    if old_lines.is_empty() {
        return Err("old_string must not be empty".to_string());
    }
    let content_lines: Vec<&str> = content.lines().collect();
    if content_lines.len() < old_lines.len() {
        return Err("old_string not found in file (tried exact and whitespace-fuzzy matching)".to_string());
    }
    let trimmed_old: Vec<&str> = old_lines.iter().map(|l| l.trim()).collect();

    for i in 0..=(content_lines.len() - old_lines.len()) {
        let matches = (0..old_lines.len()).all(|j| content_lines[i + j].trim() == trimmed_old[j]);
        if matches {
            let mut rebuilt: Vec<&str> = Vec::with_capacity(content_lines.len());
            rebuilt.extend_from_slice(&content_lines[..i]);
            let new_lines: Vec<&str> = new.lines().collect();
            rebuilt.extend(new_lines);
            rebuilt.extend_from_slice(&content_lines[i + old_lines.len()..]);
            let trailing_newline = content.ends_with('\n');
            let mut joined = rebuilt.join("\n");
            if trailing_newline {
                joined.push('\n');
            }
            return Ok((joined, "whitespace_fuzzy", 1));
        }
    }

    Err("old_string not found in file (tried exact and whitespace-fuzzy matching)".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replaces_a_unique_exact_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {\n    old_call();\n}\n").unwrap();
        let tool = EditFileTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"path": "a.rs", "old_string": "old_call();", "new_string": "new_call();"})).await;
        assert!(result.success);
        assert!(std::fs::read_to_string(dir.path().join("a.rs")).unwrap().contains("new_call();"));
    }

    #[tokio::test]
    async fn refuses_ambiguous_match_without_replace_all() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "x();\nx();\n").unwrap();
        let tool = EditFileTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"path": "a.rs", "old_string": "x();", "new_string": "y();"})).await;
        assert!(!result.success);
        assert!(result.output.contains("2 occurrences"));
    }

    #[tokio::test]
    async fn replace_all_replaces_every_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "x();\nx();\n").unwrap();
        let tool = EditFileTool::new(dir.path().to_path_buf());
        let result = tool
            .execute(serde_json::json!({"path": "a.rs", "old_string": "x();", "new_string": "y();", "replace_all": true}))
            .await;
        assert!(result.success);
        let written = std::fs::read_to_string(dir.path().join("a.rs")).unwrap();
        assert_eq!(written, "y();\ny();\n");
    }

    #[tokio::test]
    async fn falls_back_to_whitespace_fuzzy_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn f() {\n        indented_call();\n}\n").unwrap();
        let tool = EditFileTool::new(dir.path().to_path_buf());
        // old_string uses different indentation than the file.
        let result = tool
            .execute(serde_json::json!({"path": "a.rs", "old_string": "indented_call();", "new_string": "renamed_call();"}))
            .await;
        assert!(result.success);
        assert!(std::fs::read_to_string(dir.path().join("a.rs")).unwrap().contains("renamed_call();"));
    }

    #[tokio::test]
    async fn dry_run_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "x();\n").unwrap();
        let tool = EditFileTool::new(dir.path().to_path_buf());
        let result = tool
            .execute(serde_json::json!({"path": "a.rs", "old_string": "x();", "new_string": "y();", "dry_run": true}))
            .await;
        assert!(result.success);
        assert!(result.output.starts_with("[DRY-RUN]"));
        assert_eq!(std::fs::read_to_string(dir.path().join("a.rs")).unwrap(), "x();\n");
    }
}
