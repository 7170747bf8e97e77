//! Tool catalog (spec.md §4.6).
//!
//! Grounded in the teacher's `ExtensionRegistry`/`ExtensionRegistryBuilder`
//! (`extensions/registry.rs`): an in-memory map built once at startup, then
//! read-only for the lifetime of a run (spec.md §5: "the registry is
//! read-only after startup").

use agentctl_types::{Tool, ToolDefinition};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    Duplicate(String),
    #[error("tool not found: {0}")]
    NotFound(String),
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tool`. With `allow_override: false`, a duplicate name is
    /// rejected rather than silently replacing the previous registration —
    /// per spec.md §7 this is fatal at boot (exit 3), so callers should
    /// propagate the error rather than swallow it.
    pub fn register(&mut self, tool: Arc<dyn Tool>, allow_override: bool) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if !allow_override && self.tools.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, RegistryError> {
        self.tools.get(name).cloned().ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Lexicographic order (the map is already sorted by key).
    pub fn list_all(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Function-calling JSON schemas for `allowed` tools, in the order
    /// listed. `None` or an empty slice returns every registered schema.
    /// Per-agent filtering lives here, not in the loop.
    pub fn schemas(&self, allowed: Option<&[String]>) -> Result<Vec<ToolDefinition>, RegistryError> {
        match allowed {
            None => Ok(self.tools.values().map(|t| t.describe()).collect()),
            Some(names) if names.is_empty() => Ok(self.tools.values().map(|t| t.describe()).collect()),
            Some(names) => names
                .iter()
                .map(|name| self.get(name).map(|t| t.describe()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentctl_types::{Sensitivity, ToolError, ToolResult, ToolSchema};
    use async_trait::async_trait;

    struct Stub(&'static str);

    #[async_trait]
    impl Tool for Stub {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "stub"
        }
        fn schema(&self) -> &ToolSchema {
            static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
            SCHEMA.get_or_init(|| ToolSchema::new(vec![]))
        }
        fn sensitivity(&self, _args: &serde_json::Value) -> Sensitivity {
            Sensitivity::Safe
        }
        fn validate_args(&self, args: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
            self.schema().validate(args)
        }
        async fn execute(&self, _args: serde_json::Value) -> ToolResult {
            ToolResult::ok("done")
        }
    }

    #[test]
    fn rejects_duplicate_registration_without_override() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Stub("a")), false).unwrap();
        let err = registry.register(Arc::new(Stub("a")), false).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(_)));
    }

    #[test]
    fn lists_lexicographically() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Stub("zeta")), false).unwrap();
        registry.register(Arc::new(Stub("alpha")), false).unwrap();
        assert_eq!(registry.list_all(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn schemas_rejects_unknown_allowed_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Stub("alpha")), false).unwrap();
        let err = registry.schemas(Some(&["missing".to_string()])).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[test]
    fn schemas_empty_allowed_means_all() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Stub("alpha")), false).unwrap();
        let schemas = registry.schemas(Some(&[])).unwrap();
        assert_eq!(schemas.len(), 1);
    }
}
