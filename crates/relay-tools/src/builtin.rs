//! Demo tools, kept as fixtures for dispatch tests — the same role the
//! teacher's own `GetCurrentTime` demo tool plays in `everruns-core::tools`.
//! Concrete production tools (web search, Slack, etc.) are out of scope
//! (spec.md §1).

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::tool::{Tool, ToolAttributes, ToolExecutionResult};

pub struct GetCurrentTime;

#[async_trait]
impl Tool for GetCurrentTime {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Get the current UTC date and time."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: Value) -> ToolExecutionResult {
        ToolExecutionResult::success_text(Utc::now().to_rfc3339())
    }
}

pub struct Echo;

#[async_trait]
impl Tool for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the provided `text` argument back."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        })
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        match arguments.get("text").and_then(|v| v.as_str()) {
            Some(text) => ToolExecutionResult::success_text(text),
            None => ToolExecutionResult::tool_error("missing required argument 'text'"),
        }
    }
}

/// A tool that always fails, for exercising S4-style failure isolation in
/// tests.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "failing_tool"
    }

    fn description(&self) -> &str {
        "Always raises; used to test failure isolation."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: Value) -> ToolExecutionResult {
        ToolExecutionResult::internal_error("simulated failure")
    }
}
