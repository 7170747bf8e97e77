//! The `Tool` capability set (spec.md §3) and the declarative schema used
//! both to validate arguments and to render function-calling JSON.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of executing a tool. Tools never fail by raising — every error
/// becomes a `ToolResult` with `success: false` so the LLM can read and
/// react to it (spec.md §3, §4.2 contract invariants).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    /// Always populated. On failure this carries a human-readable
    /// explanation rather than an empty string.
    pub output: String,
    /// Optional technical detail (stack trace, raw error string) kept
    /// separate from the LLM-facing `output`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self { success: true, output: output.into(), error: None }
    }

    pub fn fail(output: impl Into<String>) -> Self {
        Self { success: false, output: output.into(), error: None }
    }

    pub fn fail_with(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self { success: false, output: output.into(), error: Some(error.into()) }
    }
}

/// Error raised by argument validation. Carries the message that becomes
/// the failing `ToolResult.output` — the pipeline never lets this escape
/// as a raised exception (spec.md §4.2 stage 2).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ToolError(pub String);

impl ToolError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// A tool's sensitivity — whether invoking it may mutate the workspace or
/// the world. The shell tool computes this dynamically per call instead of
/// returning a fixed value (spec.md §3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensitivity {
    Safe,
    Dev,
    Dangerous,
}

impl Sensitivity {
    /// Collapse to the boolean `sensitive` flag `ConfirmationPolicy` reads
    /// under `confirm-sensitive` mode (spec.md §4.5: dev and dangerous
    /// both require confirmation, safe does not).
    pub fn requires_confirmation(self) -> bool {
        !matches!(self, Sensitivity::Safe)
    }
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sensitivity::Safe => write!(f, "safe"),
            Sensitivity::Dev => write!(f, "dev"),
            Sensitivity::Dangerous => write!(f, "dangerous"),
        }
    }
}

/// Function-calling JSON export of a tool, in the shape LLM adapters expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A declarative argument schema: field names, JSON types, optional
/// defaults, and whether extra fields are rejected. Used both for
/// validation and to generate `ToolDefinition::parameters`
/// (design note §9: "data-driven argument schema").
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub fields: Vec<SchemaField>,
    pub forbid_extras: bool,
}

#[derive(Debug, Clone)]
pub struct SchemaField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub description: &'static str,
    pub default: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Boolean,
    Object,
}

impl FieldKind {
    fn json_type(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Object => "object",
        }
    }
}

impl ToolSchema {
    pub fn new(fields: Vec<SchemaField>) -> Self {
        Self { fields, forbid_extras: true }
    }

    /// Render this schema as a JSON-Schema `parameters` object.
    pub fn to_json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            properties.insert(
                field.name.to_string(),
                serde_json::json!({
                    "type": field.kind.json_type(),
                    "description": field.description,
                }),
            );
            if field.required {
                required.push(field.name);
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Validate and fill defaults. Returns the same shape the tool body
    /// will consume: a `serde_json::Value::Object`.
    pub fn validate(&self, args: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let obj = args
            .as_object()
            .ok_or_else(|| ToolError::new("arguments must be a JSON object"))?;

        if self.forbid_extras {
            let known: std::collections::HashSet<&str> =
                self.fields.iter().map(|f| f.name).collect();
            for key in obj.keys() {
                if !known.contains(key.as_str()) {
                    return Err(ToolError::new(format!("unexpected argument '{key}'")));
                }
            }
        }

        let mut out = serde_json::Map::new();
        for field in &self.fields {
            match obj.get(field.name) {
                Some(value) => {
                    check_kind(field, value)?;
                    out.insert(field.name.to_string(), value.clone());
                }
                None => {
                    if field.required {
                        return Err(ToolError::new(format!(
                            "missing required argument '{}'",
                            field.name
                        )));
                    }
                    if let Some(default) = &field.default {
                        out.insert(field.name.to_string(), default.clone());
                    }
                }
            }
        }
        Ok(serde_json::Value::Object(out))
    }
}

fn check_kind(field: &SchemaField, value: &serde_json::Value) -> Result<(), ToolError> {
    let ok = match field.kind {
        FieldKind::String => value.is_string(),
        FieldKind::Integer => value.is_i64() || value.is_u64(),
        FieldKind::Boolean => value.is_boolean(),
        FieldKind::Object => value.is_object(),
    };
    if ok {
        Ok(())
    } else {
        Err(ToolError::new(format!(
            "argument '{}' must be of type {}",
            field.name,
            field.kind.json_type()
        )))
    }
}

/// The minimal capability set every concrete tool implements
/// (design note §9: "tagged-variant or interface over a minimal capability
/// set"). Discovered and dispatched through `ToolRegistry`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn schema(&self) -> &ToolSchema;

    /// Sensitivity for this call. Static for most tools; the shell tool
    /// overrides this to classify per `args["command"]`.
    fn sensitivity(&self, args: &serde_json::Value) -> Sensitivity {
        let _ = args;
        Sensitivity::Safe
    }

    fn validate_args(&self, args: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
        self.schema().validate(args)
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult;

    fn describe(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.schema().to_json_schema(),
        }
    }
}
