//! `apply_patch`: unified-diff application against a single workspace file.
//!
//! Grounded in the teacher's `file_ops/search_replace.rs` hunk-matching
//! idea (locate a context window, replace it) generalized from a single
//! old/new string pair to a full unified-diff hunk sequence: each `@@`
//! header's context+removed lines are located as a contiguous run (first
//! at the header's claimed offset, falling back to a scan of the whole
//! file, mirroring `patch`'s own fuzz behaviour) and replaced with its
//! context+added lines. A member of the edit set for post-edit hook fan-out
//! (spec.md §4.7).

use super::{is_sensitive_write_path, resolve};
use agentctl_types::{FieldKind, SchemaField, Sensitivity, Tool, ToolResult, ToolSchema};
use async_trait::async_trait;
use std::path::PathBuf;

pub struct ApplyPatchTool {
    workspace_root: PathBuf,
}

impl ApplyPatchTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }
}

#[async_trait]
impl Tool for ApplyPatchTool {
    fn name(&self) -> &str {
        "apply_patch"
    }

    fn description(&self) -> &str {
        "Apply a unified diff (as produced by `diff -u` or `git diff`) to a \
         single file in the workspace. `dry_run` previews the result without \
         writing it."
    }

    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| {
            ToolSchema::new(vec![
                SchemaField { name: "path", kind: FieldKind::String, required: true, description: "workspace-relative file path", default: None },
                SchemaField { name: "patch", kind: FieldKind::String, required: true, description: "unified diff text", default: None },
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
        let patch = args.get("patch").and_then(|v| v.as_str()).unwrap_or_default();
        let dry_run = args.get("dry_run").and_then(|v| v.as_bool()).unwrap_or(false);

        if is_sensitive_write_path(path) {
            return ToolResult::fail(format!("patching '{path}' is blocked: sensitive file"));
        }

        let hunks = match parse_hunks(patch) {
            Ok(hunks) if !hunks.is_empty() => hunks,
            Ok(_) => return ToolResult::fail("patch contains no hunks"),
            Err(e) => return ToolResult::fail(format!("failed to parse patch: {e}")),
        };

        let resolved = match resolve(path, &self.workspace_root) {
            Ok(p) => p,
            Err(e) => return ToolResult::fail(e.to_string()),
        };
        let original = match tokio::fs::read_to_string(&resolved).await {
            Ok(c) => c,
            Err(e) => return ToolResult::fail(format!("failed to read '{path}': {e}")),
        };

        let trailing_newline = original.ends_with('\n');
        let mut lines: Vec<String> = original.lines().map(str::to_string).collect();

        let mut applied = 0;
        for hunk in &hunks {
            match apply_hunk(&mut lines, hunk) {
                Ok(()) => applied += 1,
                Err(e) => {
                    return ToolResult::fail(format!(
                        "failed to apply hunk @@ -{},{} +{},{} @@ to '{path}': {e}",
                        hunk.old_start, hunk.old_len, hunk.new_start, hunk.new_len
                    ));
                }
            }
        }

        let mut new_content = lines.join("\n");
        if trailing_newline {
            new_content.push('\n');
        }

        if dry_run {
            return ToolResult::ok(format!("[DRY-RUN] would apply {applied} hunk(s) to {path}"));
        }

        match tokio::fs::write(&resolved, &new_content).await {
            Ok(()) => ToolResult::ok(format!("applied {applied} hunk(s) to {path}")),
            Err(e) => ToolResult::fail(format!("failed to write '{path}': {e}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Context,
    Remove,
    Add,
}

struct HunkLine {
    kind: LineKind,
    text: String,
}

struct Hunk {
    old_start: usize,
    old_len: usize,
    new_start: usize,
    new_len: usize,
    lines: Vec<HunkLine>,
}

/// Parses one or more `@@ -l,s +l,s @@` hunks out of unified-diff text,
/// ignoring `---`/`+++` file headers and `diff --git` lines.
fn parse_hunks(patch: &str) -> Result<Vec<Hunk>, String> {
    let mut hunks = Vec::new();
    let mut lines = patch.lines().peekable();

    while let Some(line) = lines.next() {
        if !line.starts_with("@@ ") && !line.starts_with("@@-") {
            continue;
        }
        let header = parse_hunk_header(line)?;
        let mut body = Vec::new();
        while let Some(next) = lines.peek() {
            if next.starts_with("@@") {
                break;
            }
            let next = lines.next().unwrap();
            if next.starts_with("\\ No newline") {
                continue;
            }
            let (kind, text) = match next.chars().next() {
                Some('+') => (LineKind::Add, next[1..].to_string()),
                Some('-') => (LineKind::Remove, next[1..].to_string()),
                Some(' ') => (LineKind::Context, next[1..].to_string()),
                None => (LineKind::Context, String::new()),
                _ => (LineKind::Context, next.to_string()),
            };
            body.push(HunkLine { kind, text });
        }
        hunks.push(Hunk { old_start: header.0, old_len: header.1, new_start: header.2, new_len: header.3, lines: body });
    }

    Ok(hunks)
}

/// Parses `@@ -old_start,old_len +new_start,new_len @@`. A missing `,len`
/// defaults the length to 1, matching diff's own shorthand for single-line
/// hunks.
fn parse_hunk_header(line: &str) -> Result<(usize, usize, usize, usize), String> {
    let inner = line
        .trim_start_matches("@@")
        .trim_end_matches("@@")
        .trim();
    let mut parts = inner.split_whitespace();
    let old = parts.next().ok_or("missing old-range in hunk header")?;
    let new = parts.next().ok_or("missing new-range in hunk header")?;
    let (old_start, old_len) = parse_range(old.trim_start_matches('-'))?;
    let (new_start, new_len) = parse_range(new.trim_start_matches('+'))?;
    Ok((old_start, old_len, new_start, new_len))
}

fn parse_range(range: &str) -> Result<(usize, usize), String> {
    let mut parts = range.splitn(2, ',');
    let start: usize = parts.next().unwrap_or("0").parse().map_err(|_| "invalid range start".to_string())?;
    let len: usize = match parts.next() {
        Some(s) => s.parse().map_err(|_| "invalid range length".to_string())?,
        None => 1,
    };
    Ok((start, len))
}

/// Locates the hunk's context+removed lines as a contiguous run, first at
/// the header's claimed 1-based offset, then by scanning the whole file
/// (diff's own "fuzz" behaviour when line numbers have drifted), and
/// replaces that run with the context+added lines.
fn apply_hunk(lines: &mut Vec<String>, hunk: &Hunk) -> Result<(), String> {
    let before: Vec<&str> = hunk
        .lines
        .iter()
        .filter(|l| l.kind != LineKind::Add)
        .map(|l| l.text.as_str())
        .collect();
    let after: Vec<String> = hunk
        .lines
        .iter()
        .filter(|l| l.kind != LineKind::Remove)
        .map(|l| l.text.clone())
        .collect();

    if before.is_empty() {
        // Pure insertion hunk: splice at the claimed line number.
        let at = hunk.old_start.min(lines.len());
        lines.splice(at..at, after);
        return Ok(());
    }

    let claimed_start = hunk.old_start.saturating_sub(1);
    let found = if matches_at(lines, claimed_start, &before) {
        Some(claimed_start)
    } else {
        (0..=lines.len().saturating_sub(before.len())).find(|&i| matches_at(lines, i, &before))
    };

    match found {
        Some(start) => {
            lines.splice(start..start + before.len(), after);
            Ok(())
        }
        None => Err("context lines not found in file".to_string()),
    }
}

fn matches_at(lines: &[String], start: usize, expected: &[&str]) -> bool {
    if start + expected.len() > lines.len() {
        return false;
    }
    (0..expected.len()).all(|i| lines[start + i] == expected[i])
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_PATCH: &str = "--- a/a.rs\n+++ b/a.rs\n@@ -1,3 +1,3 @@\n fn main() {\n-    old();\n+    new();\n }\n";

    #[tokio::test]
    async fn applies_a_single_hunk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {\n    old();\n}\n").unwrap();
        let tool = ApplyPatchTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"path": "a.rs", "patch": SIMPLE_PATCH})).await;
        assert!(result.success, "{}", result.output);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.rs")).unwrap(), "fn main() {\n    new();\n}\n");
    }

    #[tokio::test]
    async fn falls_back_to_scanning_when_line_numbers_drift() {
        let dir = tempfile::tempdir().unwrap();
        // Extra leading lines shift everything down by 2 relative to the
        // hunk header's claimed offset of 1.
        std::fs::write(dir.path().join("a.rs"), "// extra\n// more\nfn main() {\n    old();\n}\n").unwrap();
        let tool = ApplyPatchTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"path": "a.rs", "patch": SIMPLE_PATCH})).await;
        assert!(result.success, "{}", result.output);
        let written = std::fs::read_to_string(dir.path().join("a.rs")).unwrap();
        assert!(written.contains("new();"));
        assert!(!written.contains("old();"));
    }

    #[tokio::test]
    async fn dry_run_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {\n    old();\n}\n").unwrap();
        let tool = ApplyPatchTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"path": "a.rs", "patch": SIMPLE_PATCH, "dry_run": true})).await;
        assert!(result.success);
        assert!(result.output.starts_with("[DRY-RUN]"));
        assert_eq!(std::fs::read_to_string(dir.path().join("a.rs")).unwrap(), "fn main() {\n    old();\n}\n");
    }

    #[tokio::test]
    async fn unmatched_context_is_a_failing_result() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "completely different content\n").unwrap();
        let tool = ApplyPatchTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"path": "a.rs", "patch": SIMPLE_PATCH})).await;
        assert!(!result.success);
        assert!(result.output.contains("failed to apply hunk"));
    }

    #[test]
    fn parses_multiple_hunks() {
        let patch = "@@ -1,1 +1,1 @@\n-a\n+b\n@@ -5,1 +5,1 @@\n-c\n+d\n";
        let hunks = parse_hunks(patch).unwrap();
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[1].old_start, 5);
    }
}
