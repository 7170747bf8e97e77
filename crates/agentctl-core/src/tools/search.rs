//! Read-only search tools: `list_directory`, `glob_search`, `grep_files`.
//! None of these require confirmation under any mode (spec.md's
//! "[SUPPLEMENT] Concrete tool bodies").
//!
//! Grounded in the teacher's `file_ops/grep.rs` (recursive walk, skip-dir
//! list, binary-file sniff, capped match count, `rel:line:text` formatting).

use super::resolve;
use agentctl_types::{FieldKind, SchemaField, Tool, ToolResult, ToolSchema};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const SKIP_DIRS: &[&str] = &[".git", "node_modules", "target", "__pycache__", "venv", ".venv", ".tox", "dist", "build"];
const MAX_MATCHES: usize = 200;
const MAX_GLOB_RESULTS: usize = 500;

// ─── list_directory ─────────────────────────────────────────────────────────

pub struct ListDirectoryTool {
    workspace_root: PathBuf,
}

impl ListDirectoryTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the immediate entries of a workspace directory, directories first, alphabetically."
    }

    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| {
            ToolSchema::new(vec![SchemaField {
                name: "path",
                kind: FieldKind::String,
                required: false,
                description: "workspace-relative directory path; defaults to the workspace root",
                default: Some(serde_json::json!(".")),
            }])
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let resolved = match resolve(path, &self.workspace_root) {
            Ok(p) => p,
            Err(e) => return ToolResult::fail(e.to_string()),
        };
        if !resolved.is_dir() {
            return ToolResult::fail(format!("'{path}' is not a directory"));
        }

        let mut entries: Vec<(String, bool)> = match std::fs::read_dir(&resolved) {
            Ok(it) => it
                .filter_map(|e| e.ok())
                .map(|e| (e.file_name().to_string_lossy().to_string(), e.path().is_dir()))
                .collect(),
            Err(e) => return ToolResult::fail(format!("failed to read '{path}': {e}")),
        };
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        if entries.is_empty() {
            return ToolResult::ok("(empty directory)");
        }
        let lines: Vec<String> = entries.into_iter().map(|(name, is_dir)| if is_dir { format!("{name}/") } else { name }).collect();
        ToolResult::ok(lines.join("\n"))
    }
}

// ─── glob_search ─────────────────────────────────────────────────────────────

pub struct GlobSearchTool {
    workspace_root: PathBuf,
}

impl GlobSearchTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }
}

#[async_trait]
impl Tool for GlobSearchTool {
    fn name(&self) -> &str {
        "glob_search"
    }

    fn description(&self) -> &str {
        "Find workspace-relative file paths matching a glob pattern (supports \
         `*`, `?`, and `**` for any depth), capped at 500 results."
    }

    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| {
            ToolSchema::new(vec![SchemaField {
                name: "pattern",
                kind: FieldKind::String,
                required: true,
                description: "glob pattern, e.g. 'src/**/*.rs'",
                default: None,
            }])
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let pattern = args.get("pattern").and_then(|v| v.as_str()).unwrap_or_default();
        if pattern.is_empty() {
            return ToolResult::fail("pattern must not be empty");
        }
        let mut results = Vec::new();
        walk_glob(&self.workspace_root, &self.workspace_root, pattern, &mut results);
        results.sort();
        if results.is_empty() {
            return ToolResult::ok("no matches");
        }
        let capped = results.len() > MAX_GLOB_RESULTS;
        results.truncate(MAX_GLOB_RESULTS);
        let mut out = results.join("\n");
        if capped {
            out.push_str(&format!("\n\n[results capped at {MAX_GLOB_RESULTS}]"));
        }
        ToolResult::ok(out)
    }
}

fn walk_glob(root: &Path, dir: &Path, pattern: &str, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if path.is_dir() {
            if SKIP_DIRS.contains(&name.as_str()) || name.starts_with('.') {
                continue;
            }
            walk_glob(root, &path, pattern, out);
        } else {
            let relative = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().to_string();
            if glob_match(pattern, &relative) {
                out.push(relative);
            }
        }
    }
}

/// `**` matches any path span including `/`, `*` matches any span
/// excluding `/`, `?` matches one character, everything else literal.
fn glob_match(pattern: &str, text: &str) -> bool {
    let re = glob_to_regex(pattern);
    regex::Regex::new(&re).map(|re| re.is_match(text)).unwrap_or(false)
}

fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push('.'),
            '.' | '+' | '(' | ')' | '|' | '^' | '$' | '[' | ']' | '{' | '}' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out.push('$');
    out
}

// ─── grep_files ──────────────────────────────────────────────────────────────

pub struct GrepFilesTool {
    workspace_root: PathBuf,
}

impl GrepFilesTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }
}

#[async_trait]
impl Tool for GrepFilesTool {
    fn name(&self) -> &str {
        "grep_files"
    }

    fn description(&self) -> &str {
        "Search workspace text files for a regular expression, returning \
         `path:line:text` per match, capped at 200 matches. Optionally \
         restrict to a subdirectory and/or a filename glob."
    }

    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| {
            ToolSchema::new(vec![
                SchemaField { name: "pattern", kind: FieldKind::String, required: true, description: "regular expression", default: None },
                SchemaField {
                    name: "path",
                    kind: FieldKind::String,
                    required: false,
                    description: "workspace-relative directory or file to search",
                    default: Some(serde_json::json!(".")),
                },
                SchemaField {
                    name: "include",
                    kind: FieldKind::String,
                    required: false,
                    description: "filename glob to restrict the search to, e.g. '*.rs'",
                    default: None,
                },
            ])
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let pattern = args.get("pattern").and_then(|v| v.as_str()).unwrap_or_default();
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let include = args.get("include").and_then(|v| v.as_str());

        let re = match regex::Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => return ToolResult::fail(format!("invalid regex pattern: {e}")),
        };
        let resolved = match resolve(path, &self.workspace_root) {
            Ok(p) => p,
            Err(e) => return ToolResult::fail(e.to_string()),
        };
        if !resolved.exists() {
            return ToolResult::fail(format!("path not found: {path}"));
        }

        let mut results = Vec::new();
        let mut files_matched = 0usize;
        grep_recursive(&resolved, &self.workspace_root, &re, include, &mut results, &mut files_matched);

        if results.is_empty() {
            return ToolResult::ok("no matches found");
        }
        let total = results.len();
        let capped = total >= MAX_MATCHES;
        let mut out = results.join("\n");
        out.push_str(&format!(
            "\n\n[{total} match(es) in {files_matched} file(s){}]",
            if capped { " — results capped" } else { "" }
        ));
        ToolResult::ok(out)
    }
}

fn grep_recursive(dir: &Path, workspace: &Path, re: &regex::Regex, include: Option<&str>, results: &mut Vec<String>, files_matched: &mut usize) {
    if !dir.is_dir() {
        grep_single_file(dir, workspace, re, results, files_matched);
        return;
    }
    let Ok(mut entries) = std::fs::read_dir(dir).map(|it| it.filter_map(|e| e.ok()).collect::<Vec<_>>()) else { return };
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        if results.len() >= MAX_MATCHES {
            return;
        }
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if path.is_dir() {
            if SKIP_DIRS.contains(&name.as_str()) || name.starts_with('.') {
                continue;
            }
            grep_recursive(&path, workspace, re, include, results, files_matched);
        } else {
            if let Some(glob) = include {
                if !glob_match(glob, &name) {
                    continue;
                }
            }
            if is_likely_binary(&path) {
                continue;
            }
            grep_single_file(&path, workspace, re, results, files_matched);
        }
    }
}

fn grep_single_file(path: &Path, workspace: &Path, re: &regex::Regex, results: &mut Vec<String>, files_matched: &mut usize) {
    let Ok(content) = std::fs::read_to_string(path) else { return };
    let relative = path.strip_prefix(workspace).unwrap_or(path).to_string_lossy();
    let mut file_has_match = false;
    for (line_num, line) in content.lines().enumerate() {
        if results.len() >= MAX_MATCHES {
            break;
        }
        if re.is_match(line) {
            if !file_has_match {
                *files_matched += 1;
                file_has_match = true;
            }
            results.push(format!("{relative}:{}:{line}", line_num + 1));
        }
    }
}

/// Sniffs the first kilobyte for NUL bytes, matching the common
/// "binary means it has a NUL early on" heuristic.
fn is_likely_binary(path: &Path) -> bool {
    let Ok(bytes) = std::fs::read(path) else { return true };
    bytes.iter().take(1024).any(|&b| b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_directories_before_files_alphabetically() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("zdir")).unwrap();
        std::fs::write(dir.path().join("afile.txt"), "").unwrap();
        let tool = ListDirectoryTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"path": "."})).await;
        assert!(result.success);
        let lines: Vec<&str> = result.output.lines().collect();
        assert_eq!(lines, vec!["zdir/", "afile.txt"]);
    }

    #[tokio::test]
    async fn glob_search_finds_nested_matches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/sub")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/sub/mod.rs"), "").unwrap();
        std::fs::write(dir.path().join("README.md"), "").unwrap();
        let tool = GlobSearchTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"pattern": "src/**/*.rs"})).await;
        assert!(result.success);
        assert!(result.output.contains("src/lib.rs"));
        assert!(result.output.contains("src/sub/mod.rs"));
        assert!(!result.output.contains("README.md"));
    }

    #[tokio::test]
    async fn grep_finds_matches_with_line_numbers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {\n    todo!();\n}\n").unwrap();
        let tool = GrepFilesTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"pattern": "todo!"})).await;
        assert!(result.success);
        assert!(result.output.contains("a.rs:2:"));
    }

    #[tokio::test]
    async fn grep_respects_include_glob() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "needle\n").unwrap();
        std::fs::write(dir.path().join("a.py"), "needle\n").unwrap();
        let tool = GrepFilesTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"pattern": "needle", "include": "*.rs"})).await;
        assert!(result.success);
        assert!(result.output.contains("a.rs"));
        assert!(!result.output.contains("a.py"));
    }

    #[tokio::test]
    async fn grep_skips_binary_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.bin"), [0u8, 1, 2, b'n', b'e', b'e', b'd', b'l', b'e']).unwrap();
        let tool = GrepFilesTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"pattern": "needle"})).await;
        assert!(result.success);
        assert_eq!(result.output, "no matches found");
    }

    #[tokio::test]
    async fn grep_missing_path_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let tool = GrepFilesTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"pattern": "x", "path": "missing"})).await;
        assert!(!result.success);
    }
}
