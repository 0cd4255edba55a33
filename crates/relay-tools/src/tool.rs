//! The `Tool` trait and its execution-result contract.
//!
//! Grounded on `everruns-core/src/tools.rs`'s `ToolExecutionResult` /
//! `Tool` pattern: internal errors are logged but never shown to the LLM.

use async_trait::async_trait;
use serde_json::Value;
use tracing::error;

use crate::wire::ToolOutcome;

/// Attributes attached to a tool registration. `category`/`version` are
/// free-form; `kind = Some("interrupt")` marks the tool as a turn
/// terminator (spec.md §4.3 step g).
#[derive(Debug, Clone, Default)]
pub struct ToolAttributes {
    pub category: Option<String>,
    pub version: Option<String>,
    pub kind: Option<String>,
}

impl ToolAttributes {
    pub fn is_interrupt(&self) -> bool {
        self.kind.as_deref() == Some("interrupt")
    }

    pub fn to_json(&self) -> serde_json::Map<String, Value> {
        let mut m = serde_json::Map::new();
        if let Some(c) = &self.category {
            m.insert("category".to_string(), Value::String(c.clone()));
        }
        if let Some(v) = &self.version {
            m.insert("version".to_string(), Value::String(v.clone()));
        }
        if let Some(k) = &self.kind {
            m.insert("type".to_string(), Value::String(k.clone()));
        }
        m
    }
}

/// Result of a tool execution. Distinguishes a user/LLM-visible error from
/// an internal one that must not leak implementation detail (§7).
#[derive(Debug)]
pub enum ToolExecutionResult {
    Success(ToolOutcome),
    ToolError(String),
    InternalError(String),
}

impl ToolExecutionResult {
    pub fn success_text(content: impl Into<String>) -> Self {
        ToolExecutionResult::Success(ToolOutcome::Text(content.into()))
    }

    pub fn success_json(value: &Value) -> Self {
        ToolExecutionResult::Success(ToolOutcome::Text(value.to_string()))
    }

    pub fn tool_error(message: impl Into<String>) -> Self {
        ToolExecutionResult::ToolError(message.into())
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        ToolExecutionResult::InternalError(message.into())
    }

    /// Normalizes to the outcome appended to the thread, logging internal
    /// errors (never shown to the LLM) and converting them to the generic
    /// "Error executing tool" string from spec.md §4.2 step 6.
    pub fn into_outcome(self, tool_name: &str, call_id: &str) -> ToolOutcome {
        match self {
            ToolExecutionResult::Success(outcome) => outcome,
            ToolExecutionResult::ToolError(msg) => ToolOutcome::Text(msg),
            ToolExecutionResult::InternalError(msg) => {
                error!(tool_name, call_id, error = %msg, "tool internal error (hidden from LLM)");
                ToolOutcome::Text(format!("Error executing tool: {msg}"))
            }
        }
    }
}

/// A tool the agent loop can dispatch to.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, arguments: Value) -> ToolExecutionResult;

    fn attributes(&self) -> ToolAttributes {
        ToolAttributes::default()
    }
}
