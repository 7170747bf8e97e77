//! Workspace indexer (spec.md §6: "returns a textual workspace tree to
//! splice into the system prompt; the core does not care how it was
//! built").
//!
//! Grounded in `skilllite_executor::workspace_root`, but kept deliberately
//! minimal — this is the one place the core supplies a concrete default for
//! an interface spec.md treats as an external collaborator.

use std::path::Path;

const SKIP_DIRS: &[&str] = &["target", "node_modules", ".git", "dist", "build"];
const DEFAULT_MAX_DEPTH: usize = 3;
const DEFAULT_MAX_ENTRIES: usize = 500;

pub trait IndexProvider: Send + Sync {
    fn render(&self, root: &Path) -> String;
}

/// Walks `root` up to a bounded depth, skipping dotfiles at depth 0 and a
/// fixed set of noisy directories, and renders an indented tree capped at a
/// total entry count so a huge workspace cannot blow out the prompt.
pub struct DefaultIndexProvider {
    pub max_depth: usize,
    pub max_entries: usize,
}

impl Default for DefaultIndexProvider {
    fn default() -> Self {
        Self { max_depth: DEFAULT_MAX_DEPTH, max_entries: DEFAULT_MAX_ENTRIES }
    }
}

impl IndexProvider for DefaultIndexProvider {
    fn render(&self, root: &Path) -> String {
        let mut out = String::new();
        let mut remaining = self.max_entries;
        walk(root, root, 0, self.max_depth, &mut remaining, &mut out);
        if remaining == 0 {
            out.push_str("... (truncated)\n");
        }
        out
    }
}

fn walk(root: &Path, dir: &Path, depth: usize, max_depth: usize, remaining: &mut usize, out: &mut String) {
    if depth > max_depth || *remaining == 0 {
        return;
    }
    let Ok(mut entries) = std::fs::read_dir(dir).map(|it| it.filter_map(|e| e.ok()).collect::<Vec<_>>()) else {
        return;
    };
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        if *remaining == 0 {
            return;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if depth == 0 && name.starts_with('.') {
            continue;
        }
        if SKIP_DIRS.contains(&name.as_str()) {
            continue;
        }
        let path = entry.path();
        let indent = "  ".repeat(depth);
        let is_dir = path.is_dir();
        out.push_str(&format!("{indent}{name}{}\n", if is_dir { "/" } else { "" }));
        *remaining -= 1;
        if is_dir {
            walk(root, &path, depth + 1, max_depth, remaining, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn renders_nested_tree_skipping_dotfiles_and_noise() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/sub")).unwrap();
        fs::create_dir_all(dir.path().join("target")).unwrap();
        fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        fs::write(dir.path().join("src/sub/mod.rs"), "").unwrap();
        fs::write(dir.path().join(".gitignore"), "").unwrap();

        let tree = DefaultIndexProvider::default().render(dir.path());
        assert!(tree.contains("src/"));
        assert!(tree.contains("lib.rs"));
        assert!(tree.contains("sub/"));
        assert!(!tree.contains("target"));
        assert!(!tree.contains(".gitignore"));
    }

    #[test]
    fn caps_total_entries() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..20 {
            fs::write(dir.path().join(format!("f{i}.txt")), "").unwrap();
        }
        let provider = DefaultIndexProvider { max_depth: 3, max_entries: 5 };
        let tree = provider.render(dir.path());
        assert!(tree.contains("truncated"));
    }
}
