//! Wire shapes for tool calls and results.
//!
//! Design note §9 ("Dynamic tool-call payloads"): normalize at the edge
//! into a single tagged shape and carry that shape everywhere downstream,
//! rather than threading the raw provider wire format through the loop.

use relay_thread::ToolCallRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool call normalized for dispatch: arguments have already been
/// parsed (or a parse failure has already been turned into a result, see
/// `registry::execute_tool_call`).
#[derive(Debug, Clone)]
pub struct NormalizedCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Files attached to a tool result (spec.md §4.2 step 5,
/// `{filename, content, mime_type, description?}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultFile {
    pub filename: String,
    /// Raw bytes or a base64-encoded string, per the tool's own convention;
    /// this crate treats it as opaque content to be handed to an Attachment.
    pub content: String,
    pub mime_type: Option<String>,
    pub description: Option<String>,
}

/// The normalized return shape of a tool implementation (spec.md §4.2
/// step 5): either a bare string, or `{content, files?}`.
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Text(String),
    WithFiles { content: String, files: Vec<ResultFile> },
}

impl ToolOutcome {
    pub fn content(&self) -> &str {
        match self {
            ToolOutcome::Text(s) => s,
            ToolOutcome::WithFiles { content, .. } => content,
        }
    }

    pub fn files(&self) -> &[ResultFile] {
        match self {
            ToolOutcome::Text(_) => &[],
            ToolOutcome::WithFiles { files, .. } => files,
        }
    }
}

/// The appended-to-thread result of one dispatched call.
#[derive(Debug, Clone)]
pub struct DispatchedResult {
    pub call_id: String,
    pub tool_name: String,
    pub outcome: ToolOutcome,
    pub tool_attributes: serde_json::Map<String, Value>,
    pub latency_ms: i64,
}

/// Normalizes a raw wire tool call (`{id, type, function:{name, arguments}}`)
/// into `NormalizedCall`, per spec.md §4.2 step 1: an empty `arguments`
/// string is treated as `"{}"`. Returns the parse error message on failure
/// so the caller can synthesize the "Invalid tool arguments" result
/// (step 3) without this function needing to know about dispatch.
pub fn parse_arguments(raw: &ToolCallRef) -> Result<Value, String> {
    let args_str = if raw.function.arguments.is_empty() {
        "{}"
    } else {
        raw.function.arguments.as_str()
    };
    serde_json::from_str(args_str).map_err(|e| e.to_string())
}
