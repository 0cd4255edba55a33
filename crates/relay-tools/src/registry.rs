//! A generic `(kind, name)`-keyed registry (design note §9 "Global
//! registries"), grounded on `tyler/utils/registry.py`'s `Registry`
//! singleton, plus `ToolRegistry` — the Tool Runner's instance of it keyed
//! under the `"tool"` kind — and `execute_tool_call`, the dispatch contract
//! of spec.md §4.2.
//!
//! `Registry<T>` lives here rather than in `relay-agent` so the Agent
//! Runner (`relay-agent::runner::AgentRunner`) can reuse the same type for
//! its `(kind, name)`-keyed agent map without relay-tools depending on
//! relay-agent (SPEC_FULL §12 pins one generic registry shared by both).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use relay_thread::ToolCallRef;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::warn;

use crate::tool::{Tool, ToolExecutionResult};
use crate::wire::{parse_arguments, DispatchedResult, ToolOutcome};

const TOOL_KIND: &str = "tool";

/// A process-scoped registry of named components of type `T`, keyed by a
/// `(kind, name)` pair so a single registry instance can serve more than
/// one component kind without name collisions across kinds.
#[derive(Clone)]
pub struct Registry<T: Clone> {
    components: Arc<RwLock<HashMap<(&'static str, String), T>>>,
}

impl<T: Clone> Default for Registry<T> {
    fn default() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<T: Clone> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; replace emits a warning (spec.md §4.4
    /// "register_agent... insert or replace (replace warns)").
    pub async fn register(&self, kind: &'static str, name: impl Into<String>, value: T) {
        let name = name.into();
        let mut guard = self.components.write().await;
        if guard.insert((kind, name.clone()), value).is_some() {
            warn!(kind, name = %name, "replacing already-registered component");
        }
    }

    pub async fn get(&self, kind: &'static str, name: &str) -> Option<T> {
        self.components.read().await.get(&(kind, name.to_string())).cloned()
    }

    pub async fn list(&self, kind: &'static str) -> Vec<String> {
        self.components
            .read()
            .await
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, n)| n.clone())
            .collect()
    }

    pub async fn has(&self, kind: &'static str, name: &str) -> bool {
        self.components.read().await.contains_key(&(kind, name.to_string()))
    }
}

/// A process-scoped, cheaply-clonable registry of tools, backed by the
/// shared `Registry<T>` under the `"tool"` kind.
///
/// Registration is not expected to race with dispatch (spec.md §5): callers
/// serialize registration during startup. The inner lock exists so the
/// registry can still be shared behind an `Arc` without forcing every
/// holder to go through a single owner.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Registry<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a tool. Last write wins, with a warning on replace
    /// (spec.md §4.2 "register_tool").
    pub async fn register_tool(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.register(TOOL_KIND, name, tool).await;
    }

    pub async fn has(&self, name: &str) -> bool {
        self.tools.has(TOOL_KIND, name).await
    }

    pub async fn tool_names(&self) -> Vec<String> {
        self.tools.list(TOOL_KIND).await
    }

    pub async fn definitions(&self) -> Vec<(String, String, Value)> {
        let mut out = Vec::new();
        for name in self.tools.list(TOOL_KIND).await {
            if let Some(tool) = self.tools.get(TOOL_KIND, &name).await {
                out.push((tool.name().to_string(), tool.description().to_string(), tool.parameters_schema()));
            }
        }
        out
    }

    /// Dispatch one tool call, per spec.md §4.2's six-step contract. Never
    /// returns `Err` — every failure mode is folded into the returned
    /// `DispatchedResult` so that sibling calls in a parallel fan-out are
    /// unaffected (§7 tool-error policy).
    pub async fn execute_tool_call(&self, call: &ToolCallRef) -> DispatchedResult {
        let started = Instant::now();
        let name = call.function.name.clone();

        // Step 2/3: parse arguments, normalizing empty string to "{}".
        let arguments = match parse_arguments(call) {
            Ok(v) => v,
            Err(detail) => {
                return DispatchedResult {
                    call_id: call.id.clone(),
                    tool_name: name,
                    outcome: ToolOutcome::Text(format!("Invalid tool arguments: {detail}")),
                    tool_attributes: serde_json::Map::new(),
                    latency_ms: elapsed_ms(started),
                };
            }
        };

        // Step 2: tool not found -> synthetic result, no Err.
        let tool = self.tools.get(TOOL_KIND, &name).await;
        let Some(tool) = tool else {
            return DispatchedResult {
                call_id: call.id.clone(),
                tool_name: name.clone(),
                outcome: ToolOutcome::Text(format!("Tool '{name}' not found")),
                tool_attributes: serde_json::Map::new(),
                latency_ms: elapsed_ms(started),
            };
        };

        let attributes = tool.attributes();
        let attrs_json = attributes.to_json();

        // Step 4/6: invoke, catching any panic-free error path the Tool
        // trait already models via ToolExecutionResult; a real panic is a
        // programmer error and is intentionally allowed to unwind here,
        // matching tyler's distinction between recoverable tool errors and
        // bugs.
        let result = tool.execute(arguments).await;
        let outcome = result.into_outcome(&name, &call.id);

        DispatchedResult {
            call_id: call.id.clone(),
            tool_name: name,
            outcome,
            tool_attributes: attrs_json,
            latency_ms: elapsed_ms(started),
        }
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    started.elapsed().as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes input"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, arguments: Value) -> ToolExecutionResult {
            ToolExecutionResult::success_text(arguments.to_string())
        }
    }

    #[tokio::test]
    async fn generic_registry_register_then_get_round_trips() {
        let registry: Registry<i32> = Registry::new();
        registry.register("agent", "Coordinator", 42).await;
        assert_eq!(registry.get("agent", "Coordinator").await, Some(42));
        assert_eq!(registry.get("agent", "Missing").await, None);
    }

    #[tokio::test]
    async fn empty_arguments_normalize_to_empty_object() {
        let registry = ToolRegistry::new();
        registry.register_tool(Arc::new(Echo)).await;
        let call = ToolCallRef::new("c1", "echo", "");
        let result = registry.execute_tool_call(&call).await;
        assert_eq!(result.outcome.content(), "{}");
    }

    #[tokio::test]
    async fn unknown_tool_returns_synthetic_result_not_error() {
        let registry = ToolRegistry::new();
        let call = ToolCallRef::new("c1", "missing", "{}");
        let result = registry.execute_tool_call(&call).await;
        assert_eq!(result.outcome.content(), "Tool 'missing' not found");
    }

    #[tokio::test]
    async fn invalid_json_arguments_returns_synthetic_result() {
        let registry = ToolRegistry::new();
        registry.register_tool(Arc::new(Echo)).await;
        let call = ToolCallRef::new("c1", "echo", "{not json");
        let result = registry.execute_tool_call(&call).await;
        assert!(result.outcome.content().starts_with("Invalid tool arguments:"));
    }
}
