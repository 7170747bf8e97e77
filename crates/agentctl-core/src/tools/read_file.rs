//! `read_file`: UTF-8 read with an optional 1-based, inclusive line window.

use super::resolve;
use agentctl_types::{FieldKind, SchemaField, Tool, ToolResult, ToolSchema};
use async_trait::async_trait;
use std::path::PathBuf;

pub struct ReadFileTool {
    workspace_root: PathBuf,
}

impl ReadFileTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a UTF-8 text file from the workspace. Optionally restrict the \
         read to a 1-based, inclusive [start_line, end_line] window."
    }

    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| {
            ToolSchema::new(vec![
                SchemaField {
                    name: "path",
                    kind: FieldKind::String,
                    required: true,
                    description: "workspace-relative file path",
                    default: None,
                },
                SchemaField {
                    name: "start_line",
                    kind: FieldKind::Integer,
                    required: false,
                    description: "first line to include, 1-based",
                    default: None,
                },
                SchemaField {
                    name: "end_line",
                    kind: FieldKind::Integer,
                    required: false,
                    description: "last line to include, inclusive",
                    default: None,
                },
            ])
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or_default();
        let resolved = match resolve(path, &self.workspace_root) {
            Ok(p) => p,
            Err(e) => return ToolResult::fail(e.to_string()),
        };
        let content = match tokio::fs::read_to_string(&resolved).await {
            Ok(c) => c,
            Err(e) => return ToolResult::fail(format!("failed to read '{path}': {e}")),
        };

        let start_line = args.get("start_line").and_then(|v| v.as_u64()).map(|v| v as usize);
        let end_line = args.get("end_line").and_then(|v| v.as_u64()).map(|v| v as usize);
        if start_line.is_none() && end_line.is_none() {
            return ToolResult::ok(content);
        }

        let lines: Vec<&str> = content.lines().collect();
        let start = start_line.unwrap_or(1).max(1) - 1;
        let end = end_line.unwrap_or(lines.len()).min(lines.len());
        if start >= lines.len() || start >= end {
            return ToolResult::fail(format!(
                "requested range {}..{} is out of bounds for a {}-line file",
                start_line.unwrap_or(1),
                end_line.unwrap_or(lines.len()),
                lines.len()
            ));
        }
        ToolResult::ok(lines[start..end].join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_whole_file_by_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\nthree").unwrap();
        let tool = ReadFileTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"path": "a.txt"})).await;
        assert!(result.success);
        assert_eq!(result.output, "one\ntwo\nthree");
    }

    #[tokio::test]
    async fn reads_a_line_range() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\nthree\nfour").unwrap();
        let tool = ReadFileTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"path": "a.txt", "start_line": 2, "end_line": 3})).await;
        assert!(result.success);
        assert_eq!(result.output, "two\nthree");
    }

    #[tokio::test]
    async fn missing_file_is_a_failing_result_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFileTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"path": "missing.txt"})).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn path_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFileTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"path": "../../etc/passwd"})).await;
        assert!(!result.success);
    }
}
