//! `write_file`: create/overwrite/append, creating parent directories as
//! needed. Flatly refuses the fixed sensitive-filename set regardless of
//! confirm mode; the merely-confirmable "key path" set (`Cargo.toml` and
//! friends) is instead tagged `Dangerous` so `ConfirmationPolicy` can gate
//! it per spec.md §4.5.

use super::{is_sensitive_write_path, resolve};
use agentctl_types::{FieldKind, SchemaField, Sensitivity, Tool, ToolResult, ToolSchema};
use async_trait::async_trait;
use std::path::PathBuf;

const KEY_PATH_SUFFIXES: &[&str] = &[
    "cargo.toml",
    "package.json",
    "pyproject.toml",
    "go.mod",
    "requirements.txt",
];

pub struct WriteFileTool {
    workspace_root: PathBuf,
}

impl WriteFileTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write a file in the workspace. `mode` is 'overwrite' (default), \
         'append', or 'create' (fails if the file already exists). Creates \
         parent directories as needed."
    }

    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| {
            ToolSchema::new(vec![
                SchemaField { name: "path", kind: FieldKind::String, required: true, description: "workspace-relative file path", default: None },
                SchemaField { name: "content", kind: FieldKind::String, required: true, description: "file content", default: None },
                SchemaField {
                    name: "mode",
                    kind: FieldKind::String,
                    required: false,
                    description: "'overwrite', 'append', or 'create'",
                    default: Some(serde_json::json!("overwrite")),
                },
            ])
        })
    }

    fn sensitivity(&self, args: &serde_json::Value) -> Sensitivity {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or_default();
        let lower = path.to_lowercase();
        if KEY_PATH_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
            Sensitivity::Dangerous
        } else {
            Sensitivity::Dev
        }
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or_default();
        let content = args.get("content").and_then(|v| v.as_str()).unwrap_or_default();
        let mode = args.get("mode").and_then(|v| v.as_str()).unwrap_or("overwrite");

        if is_sensitive_write_path(path) {
            return ToolResult::fail(format!("writing to '{path}' is blocked: sensitive file"));
        }

        let resolved = match resolve(path, &self.workspace_root) {
            Ok(p) => p,
            Err(e) => return ToolResult::fail(e.to_string()),
        };

        if mode == "create" && resolved.exists() {
            return ToolResult::fail(format!("'{path}' already exists (mode is 'create')"));
        }

        if let Some(parent) = resolved.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolResult::fail(format!("failed to create parent directories for '{path}': {e}"));
            }
        }

        let write_result = if mode == "append" {
            use tokio::io::AsyncWriteExt;
            match tokio::fs::OpenOptions::new().create(true).append(true).open(&resolved).await {
                Ok(mut file) => file.write_all(content.as_bytes()).await,
                Err(e) => Err(e),
            }
        } else {
            tokio::fs::write(&resolved, content).await
        };

        match write_result {
            Ok(()) => ToolResult::ok(format!("wrote {} bytes to {path} ({mode})", content.len())),
            Err(e) => ToolResult::fail(format!("failed to write '{path}': {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_parent_directories_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"path": "src/new/mod.rs", "content": "// hi"})).await;
        assert!(result.success);
        assert_eq!(std::fs::read_to_string(dir.path().join("src/new/mod.rs")).unwrap(), "// hi");
    }

    #[tokio::test]
    async fn append_mode_adds_to_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("log.txt"), "first\n").unwrap();
        let tool = WriteFileTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"path": "log.txt", "content": "second\n", "mode": "append"})).await;
        assert!(result.success);
        assert_eq!(std::fs::read_to_string(dir.path().join("log.txt")).unwrap(), "first\nsecond\n");
    }

    #[tokio::test]
    async fn create_mode_refuses_to_clobber_an_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "existing").unwrap();
        let tool = WriteFileTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"path": "a.txt", "content": "new", "mode": "create"})).await;
        assert!(!result.success);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "existing");
    }

    #[tokio::test]
    async fn refuses_to_write_sensitive_filenames() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"path": ".env", "content": "SECRET=1"})).await;
        assert!(!result.success);
        assert!(!dir.path().join(".env").exists());
    }

    #[test]
    fn key_paths_are_tagged_dangerous_not_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(dir.path().to_path_buf());
        assert_eq!(tool.sensitivity(&serde_json::json!({"path": "Cargo.toml"})), Sensitivity::Dangerous);
        assert_eq!(tool.sensitivity(&serde_json::json!({"path": "src/lib.rs"})), Sensitivity::Dev);
    }
}
