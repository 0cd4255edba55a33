//! End-to-end agent loop scenarios (spec.md §8 S1-S6). S7 (reactions
//! round-trip) lives in `relay-thread` since it never touches the loop.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Value};

use relay_agent::{Agent, AgentConfigBuilder, AgentRunner, DelegationTool, LlmProvider, MockProvider, ScriptedResponse, ThreadInput};
use relay_thread::{Message, MessageRole, Thread, ToolCallRef};
use relay_tools::builtin::FailingTool;
use relay_tools::{Tool, ToolExecutionResult, ToolRegistry};

fn thread_with_user(text: &str) -> Thread {
    let mut thread = Thread::new("t1");
    thread.add_message(Message::user(text)).unwrap();
    thread
}

struct GetWeather;

#[async_trait]
impl Tool for GetWeather {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Look up the current weather for a location."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "location": { "type": "string" } },
            "required": ["location"],
        })
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let location = arguments.get("location").and_then(|v| v.as_str()).unwrap_or("unknown");
        ToolExecutionResult::success_text(format!("The weather in {location} is sunny with a temperature of 72\u{b0}F"))
    }
}

/// A tool marked `type=interrupt` (spec.md §4.3 step 4g, S5).
struct StopTheLoop;

#[async_trait]
impl Tool for StopTheLoop {
    fn name(&self) -> &str {
        "stop_the_loop"
    }

    fn description(&self) -> &str {
        "Ends the turn immediately after running."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: Value) -> ToolExecutionResult {
        ToolExecutionResult::success_text("stopped")
    }

    fn attributes(&self) -> relay_tools::ToolAttributes {
        relay_tools::ToolAttributes {
            kind: Some("interrupt".to_string()),
            ..Default::default()
        }
    }
}

/// Delays before delegating to an inner `MockProvider`, to make S3's
/// "parallel, not sequential" claim about wall-clock time checkable.
struct SlowProvider {
    delay: std::time::Duration,
    inner: MockProvider,
}

#[async_trait]
impl LlmProvider for SlowProvider {
    async fn complete(
        &self,
        messages: Vec<relay_agent::LlmMessage>,
        config: &relay_agent::LlmCallConfig,
    ) -> relay_agent::Result<relay_agent::LlmResponse> {
        tokio::time::sleep(self.delay).await;
        self.inner.complete(messages, config).await
    }

    async fn complete_stream(
        &self,
        messages: Vec<relay_agent::LlmMessage>,
        config: &relay_agent::LlmCallConfig,
    ) -> relay_agent::Result<futures::stream::BoxStream<'static, relay_agent::LlmStreamEvent>> {
        tokio::time::sleep(self.delay).await;
        self.inner.complete_stream(messages, config).await
    }
}

fn child_agent(name: &str, reply: &str, delay_ms: u64) -> Arc<Agent> {
    let provider = SlowProvider {
        delay: std::time::Duration::from_millis(delay_ms),
        inner: MockProvider::new(vec![ScriptedResponse::text(reply)]),
    };
    let config = AgentConfigBuilder::new(name).purpose("help").model("gpt-5.2").build();
    Arc::new(Agent::new(config, ToolRegistry::new(), Arc::new(provider)))
}

#[tokio::test]
async fn s1_no_tools_returns_single_assistant_message() {
    let provider = MockProvider::new(vec![ScriptedResponse::text("Madrid.")]);
    let config = AgentConfigBuilder::new("Geographer").purpose("Answer concisely").model("gpt-5.2").build();
    let agent = Agent::new(config, ToolRegistry::new(), Arc::new(provider));

    let thread = thread_with_user("What is the capital of Spain?");
    let (_, new_messages) = agent.go(ThreadInput::Thread(thread)).await.unwrap();

    assert_eq!(new_messages.len(), 1);
    assert_eq!(new_messages[0].role, MessageRole::Assistant);
    assert_eq!(new_messages[0].content.as_text(), "Madrid.");
    assert!(new_messages[0].metrics.usage.total_tokens.is_some());
}

#[tokio::test]
async fn s2_single_tool_call_round_trips_and_resets_iteration_count() {
    let weather_call = ToolCallRef::new("c1", "get_weather", r#"{"location":"San Francisco"}"#);
    let provider = MockProvider::new(vec![
        ScriptedResponse::with_tool_calls(vec![weather_call]),
        ScriptedResponse::text("It's sunny and 72\u{b0}F."),
    ]);

    let tools = ToolRegistry::new();
    tools.register_tool(Arc::new(GetWeather)).await;

    let config = AgentConfigBuilder::new("Forecaster").purpose("Report the weather").model("gpt-5.2").build();
    let agent = Agent::new(config, tools, Arc::new(provider));

    let thread = thread_with_user("Weather in San Francisco?");
    let (_, new_messages) = agent.go(ThreadInput::Thread(thread)).await.unwrap();

    assert_eq!(new_messages.len(), 3);
    assert_eq!(new_messages[0].role, MessageRole::Assistant);
    assert!(!new_messages[0].tool_calls.as_ref().unwrap().is_empty());
    assert_eq!(new_messages[1].role, MessageRole::Tool);
    assert_eq!(new_messages[1].tool_call_id.as_deref(), Some("c1"));
    assert!(new_messages[1].content.as_text().contains("sunny"));
    assert_eq!(new_messages[2].role, MessageRole::Assistant);
    assert_eq!(new_messages[2].content.as_text(), "It's sunny and 72\u{b0}F.");
}

#[tokio::test]
async fn s3_parallel_delegation_preserves_call_order_and_runs_concurrently() {
    let runner = AgentRunner::new();
    runner.register_agent("Research", child_agent("Research", "Researched it.", 80)).await;
    runner.register_agent("Code", child_agent("Code", "Coded it.", 80)).await;
    runner.register_agent("Creative", child_agent("Creative", "Imagined it.", 80)).await;

    let tools = ToolRegistry::new();
    for child in ["Research", "Code", "Creative"] {
        tools
            .register_tool(Arc::new(DelegationTool::new(child, runner.clone())))
            .await;
    }

    let calls = vec![
        ToolCallRef::new("c1", "delegate_to_Research", r#"{"task":"look into X"}"#),
        ToolCallRef::new("c2", "delegate_to_Code", r#"{"task":"write X"}"#),
        ToolCallRef::new("c3", "delegate_to_Creative", r#"{"task":"imagine X"}"#),
    ];
    let provider = MockProvider::new(vec![
        ScriptedResponse::with_tool_calls(calls),
        ScriptedResponse::text("Here is the combined result."),
    ]);

    let config = AgentConfigBuilder::new("Coordinator").purpose("Delegate work").model("gpt-5.2").build();
    let agent = Agent::new(config, tools, Arc::new(provider));

    let thread = thread_with_user("Please research, code, and create something.");
    let started = Instant::now();
    let (_, new_messages) = agent.go(ThreadInput::Thread(thread)).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed < std::time::Duration::from_millis(80 * 3 - 40), "dispatch looks sequential: {elapsed:?}");

    let tool_messages: Vec<_> = new_messages.iter().filter(|m| m.role == MessageRole::Tool).collect();
    assert_eq!(tool_messages.len(), 3);
    assert_eq!(tool_messages[0].tool_call_id.as_deref(), Some("c1"));
    assert_eq!(tool_messages[1].tool_call_id.as_deref(), Some("c2"));
    assert_eq!(tool_messages[2].tool_call_id.as_deref(), Some("c3"));
    assert!(tool_messages[0].content.as_text().contains("Researched"));
    assert!(tool_messages[1].content.as_text().contains("Coded"));
    assert!(tool_messages[2].content.as_text().contains("Imagined"));

    let last = new_messages.last().unwrap();
    assert_eq!(last.role, MessageRole::Assistant);
    assert_eq!(last.content.as_text(), "Here is the combined result.");
}

#[tokio::test]
async fn s4_tool_failure_isolation() {
    let calls = vec![
        ToolCallRef::new("c1", "failing_tool", "{}"),
        ToolCallRef::new("c2", "get_weather", r#"{"location":"Boston"}"#),
    ];
    let provider = MockProvider::new(vec![
        ScriptedResponse::with_tool_calls(calls),
        ScriptedResponse::text("One thing failed, the other worked."),
    ]);

    let tools = ToolRegistry::new();
    tools.register_tool(Arc::new(FailingTool)).await;
    tools.register_tool(Arc::new(GetWeather)).await;

    let config = AgentConfigBuilder::new("Helper").purpose("help").model("gpt-5.2").build();
    let agent = Agent::new(config, tools, Arc::new(provider));

    let thread = thread_with_user("Do two things.");
    let (_, new_messages) = agent.go(ThreadInput::Thread(thread)).await.unwrap();

    let tool_messages: Vec<_> = new_messages.iter().filter(|m| m.role == MessageRole::Tool).collect();
    assert_eq!(tool_messages.len(), 2);
    assert!(tool_messages[0].content.as_text().starts_with("Error executing tool:"));
    assert!(tool_messages[1].content.as_text().contains("sunny"));

    let last = new_messages.last().unwrap();
    assert_eq!(last.role, MessageRole::Assistant);
    assert_eq!(last.content.as_text(), "One thing failed, the other worked.");
}

#[tokio::test]
async fn s5_interrupt_tool_ends_the_turn_without_a_follow_up_call() {
    let call = ToolCallRef::new("c1", "stop_the_loop", "{}");
    let provider = MockProvider::new(vec![ScriptedResponse::with_tool_calls(vec![call])]);

    let tools = ToolRegistry::new();
    tools.register_tool(Arc::new(StopTheLoop)).await;

    let config = AgentConfigBuilder::new("Helper").purpose("help").model("gpt-5.2").build();
    let agent = Agent::new(config, tools, Arc::new(provider));

    let thread = thread_with_user("Stop after one step.");
    let (_, new_messages) = agent.go(ThreadInput::Thread(thread)).await.unwrap();

    assert_eq!(new_messages.len(), 2);
    assert_eq!(new_messages[0].role, MessageRole::Assistant);
    assert_eq!(new_messages[1].role, MessageRole::Tool);
}

#[tokio::test]
async fn generate_title_sets_title_only_on_success() {
    let provider = MockProvider::new(vec![ScriptedResponse::text("Spain's Capital")]);
    let config = AgentConfigBuilder::new("Geographer").purpose("Answer concisely").model("gpt-5.2").build();
    let agent = Agent::new(config, ToolRegistry::new(), Arc::new(provider));

    let mut thread = thread_with_user("What is the capital of Spain?");
    let title = agent.generate_title(&mut thread).await.unwrap();

    assert_eq!(title, "Spain's Capital");
    assert_eq!(thread.title.as_deref(), Some("Spain's Capital"));
}

#[tokio::test]
async fn generate_title_leaves_thread_untouched_on_provider_failure() {
    let config = AgentConfigBuilder::new("Geographer").purpose("Answer concisely").model("gpt-5.2").build();
    let agent = Agent::new(config, ToolRegistry::new(), Arc::new(relay_agent::FailingProvider));

    let mut thread = thread_with_user("What is the capital of Spain?");
    let result = agent.generate_title(&mut thread).await;

    assert!(result.is_err());
    assert!(thread.title.is_none());
}

#[tokio::test]
async fn s6_iteration_cap_appends_exactly_one_cap_message() {
    let call = ToolCallRef::new("c1", "get_weather", r#"{"location":"Reno"}"#);
    let provider = MockProvider::new(vec![ScriptedResponse::with_tool_calls(vec![call])]);

    let tools = ToolRegistry::new();
    tools.register_tool(Arc::new(GetWeather)).await;

    let config = AgentConfigBuilder::new("Helper").purpose("help").model("gpt-5.2").max_iterations(2).build();
    let agent = Agent::new(config, tools, Arc::new(provider));

    let thread = thread_with_user("Keep calling tools.");
    let (_, new_messages) = agent.go(ThreadInput::Thread(thread)).await.unwrap();

    let assistant_with_tools = new_messages
        .iter()
        .filter(|m| m.role == MessageRole::Assistant && m.tool_calls.as_ref().is_some_and(|tc| !tc.is_empty()))
        .count();
    let tool_messages = new_messages.iter().filter(|m| m.role == MessageRole::Tool).count();
    assert_eq!(assistant_with_tools, 2);
    assert_eq!(tool_messages, 2);

    let last = new_messages.last().unwrap();
    assert_eq!(last.role, MessageRole::Assistant);
    assert_eq!(last.content.as_text(), "Maximum tool iteration count reached. Stopping further tool calls.");
}
