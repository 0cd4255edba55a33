//! The LLM provider adapter boundary (spec.md §6).
//!
//! The provider itself is explicitly out of scope (spec.md §1): this module
//! defines the trait boundary and a deterministic in-process mock used by
//! tests, but ships no HTTP client. Grounded on
//! `everruns-core/src/traits.rs`'s `LlmProvider`/`LlmStreamEvent` shape.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use relay_thread::{ProjectedMessage, ToolCallRef};
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// One role-tagged message sent to the provider. Produced from
/// `ProjectedMessage` plus the freshly-injected system prompt (spec.md §4.3
/// step 4a).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
    pub name: Option<String>,
    pub tool_call_id: Option<String>,
    pub tool_calls: Option<Vec<ToolCallRef>>,
}

impl From<ProjectedMessage> for LlmMessage {
    fn from(p: ProjectedMessage) -> Self {
        Self {
            role: p.role,
            content: p.content,
            name: p.name,
            tool_call_id: p.tool_call_id,
            tool_calls: p.tool_calls,
        }
    }
}

/// Parameters for one completion call (spec.md §6).
#[derive(Debug, Clone)]
pub struct LlmCallConfig {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub tools: Vec<serde_json::Value>,
    pub stream: bool,
}

/// Token usage reported by the provider (spec.md §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Non-streaming completion result.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRef>,
    pub usage: Option<LlmUsage>,
}

/// One chunk of a streaming completion (spec.md §4.6).
#[derive(Debug, Clone)]
pub enum LlmStreamEvent {
    TextDelta(String),
    /// A partial tool-call update, keyed by index (§4.6 rules); the
    /// reassembler owns merging these, the provider just emits them as they
    /// arrive.
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments_delta: Option<String>,
    },
    Done(Option<LlmUsage>),
    Error(String),
}

/// The external LLM provider adapter (spec.md §6). Otherwise opaque: this
/// crate does not know or care what's behind it.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, messages: Vec<LlmMessage>, config: &LlmCallConfig) -> Result<LlmResponse>;

    async fn complete_stream(
        &self,
        messages: Vec<LlmMessage>,
        config: &LlmCallConfig,
    ) -> Result<BoxStream<'static, LlmStreamEvent>>;
}

/// A scripted response used to drive the mock provider through a
/// multi-step conversation in tests (spec.md §8 S1-S6).
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRef>,
    pub usage: Option<LlmUsage>,
}

impl ScriptedResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            usage: Some(LlmUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        }
    }

    pub fn with_tool_calls(tool_calls: Vec<ToolCallRef>) -> Self {
        Self {
            content: String::new(),
            tool_calls,
            usage: Some(LlmUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        }
    }
}

/// Deterministic, no-network mock provider (SPEC_FULL §11.4): returns each
/// scripted response in order, then repeats the last one forever so a
/// misconfigured test surfaces as a content mismatch rather than a panic.
pub struct MockProvider {
    responses: tokio::sync::Mutex<Vec<ScriptedResponse>>,
    cursor: std::sync::atomic::AtomicUsize,
}

impl MockProvider {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: tokio::sync::Mutex::new(responses),
            cursor: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    async fn next_response(&self) -> ScriptedResponse {
        let responses = self.responses.lock().await;
        let idx = self
            .cursor
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            .min(responses.len().saturating_sub(1));
        responses[idx].clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, _messages: Vec<LlmMessage>, _config: &LlmCallConfig) -> Result<LlmResponse> {
        let scripted = self.next_response().await;
        Ok(LlmResponse {
            content: scripted.content,
            tool_calls: scripted.tool_calls,
            usage: scripted.usage,
        })
    }

    async fn complete_stream(
        &self,
        _messages: Vec<LlmMessage>,
        _config: &LlmCallConfig,
    ) -> Result<BoxStream<'static, LlmStreamEvent>> {
        let scripted = self.next_response().await;
        let mut events = Vec::new();
        if !scripted.content.is_empty() {
            events.push(LlmStreamEvent::TextDelta(scripted.content));
        }
        for (i, tc) in scripted.tool_calls.into_iter().enumerate() {
            events.push(LlmStreamEvent::ToolCallDelta {
                index: i,
                id: Some(tc.id),
                name: Some(tc.function.name),
                arguments_delta: Some(tc.function.arguments),
            });
        }
        events.push(LlmStreamEvent::Done(scripted.usage));
        Ok(stream::iter(events).boxed())
    }
}

/// A provider that always fails, for exercising the provider-error recovery
/// path in the loop (spec.md §7).
pub struct FailingProvider;

#[async_trait]
impl LlmProvider for FailingProvider {
    async fn complete(&self, _messages: Vec<LlmMessage>, _config: &LlmCallConfig) -> Result<LlmResponse> {
        Err(AgentError::Internal(anyhow::anyhow!("simulated provider failure")))
    }

    async fn complete_stream(
        &self,
        _messages: Vec<LlmMessage>,
        _config: &LlmCallConfig,
    ) -> Result<BoxStream<'static, LlmStreamEvent>> {
        Ok(stream::iter(vec![LlmStreamEvent::Error(
            "simulated provider failure".to_string(),
        )])
        .boxed())
    }
}
