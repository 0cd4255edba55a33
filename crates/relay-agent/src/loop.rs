//! Agent Iteration Loop (spec.md §4.3).
//!
//! Grounded on `everruns-core/src/loop.rs`'s `AgentLoop::run_turn` (parallel
//! tool dispatch via `futures::future::join_all`, iteration cap) and
//! `tyler/models/agent.py`'s `go()` (system-prompt-once-per-turn, attachment
//! processing before the loop, cap message, `(thread, new_messages)` return
//! shape). Diverges from `agent.py`'s sequential `_process_tool_call` loop:
//! spec.md §4.3 step 4e mandates parallel fan-out, matching the teacher's
//! own concurrency pattern more closely than the original's.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use relay_storage::{FileStore, ThreadStore};
use relay_thread::{Message, MessageMetrics, MessageRole, MessageTiming, MessageUsage, Thread};
use relay_tools::ToolRegistry;
use tracing::error;

use crate::attachments;
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::llm::{LlmCallConfig, LlmMessage, LlmProvider, LlmResponse};
use crate::reassembler::reassemble;
use crate::system_prompt;

const CAP_REACHED_MESSAGE: &str = "Maximum tool iteration count reached. Stopping further tool calls.";

/// Either an already-loaded thread or an id to resolve through `thread_store`.
pub enum ThreadInput {
    Thread(Thread),
    Id(String),
}

pub struct Agent {
    pub config: AgentConfig,
    pub tools: ToolRegistry,
    pub provider: Arc<dyn LlmProvider>,
    pub thread_store: Option<Arc<dyn ThreadStore>>,
    pub file_store: Option<Arc<dyn FileStore>>,
}

impl Agent {
    pub fn new(config: AgentConfig, tools: ToolRegistry, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            config,
            tools,
            provider,
            thread_store: None,
            file_store: None,
        }
    }

    pub fn with_thread_store(mut self, store: Arc<dyn ThreadStore>) -> Self {
        self.thread_store = Some(store);
        self
    }

    pub fn with_file_store(mut self, store: Arc<dyn FileStore>) -> Self {
        self.file_store = Some(store);
        self
    }

    /// Run one complete turn. Returns the updated thread plus every message
    /// appended this turn excluding the original user message (spec.md §4.3
    /// step 6).
    pub async fn go(&self, input: ThreadInput) -> Result<(Thread, Vec<Message>)> {
        let mut thread = self.resolve_thread(input).await?;
        let mut new_messages = Vec::new();

        self.ensure_system_prompt(&mut thread)?;
        self.process_latest_attachments(&mut thread).await;

        let mut iteration_count = 0usize;

        while iteration_count < self.config.max_iterations {
            let step = self.step(&thread).await;
            let response = match step {
                Ok(Some(response)) => response,
                Ok(None) => {
                    self.emit_error(&mut thread, &mut new_messages, "Failed to get valid response");
                    break;
                }
                Err(e) => {
                    self.emit_error(&mut thread, &mut new_messages, &e.to_string());
                    break;
                }
            };

            let has_tool_calls = !response.tool_calls.is_empty();
            if response.content.is_empty() && !has_tool_calls {
                break;
            }

            let assistant = self.append_assistant(&mut thread, &response)?;
            new_messages.push(assistant.clone());

            if !has_tool_calls {
                break;
            }

            let interrupted = self.dispatch_tools(&mut thread, &mut new_messages, &response).await?;
            iteration_count += 1;

            if interrupted {
                break;
            }

            if iteration_count >= self.config.max_iterations {
                let cap_message = thread.add_message(Message::assistant(CAP_REACHED_MESSAGE))?.clone();
                new_messages.push(cap_message);
                break;
            }
        }

        self.persist(&thread).await?;
        let non_user = new_messages.into_iter().filter(|m| m.role != MessageRole::User).collect();
        Ok((thread, non_user))
    }

    async fn resolve_thread(&self, input: ThreadInput) -> Result<Thread> {
        match input {
            ThreadInput::Thread(thread) => Ok(thread),
            ThreadInput::Id(id) => {
                let Some(store) = &self.thread_store else {
                    return Err(AgentError::NoStoreForThreadId(id));
                };
                store
                    .get(&id)
                    .await
                    .map_err(|e| AgentError::store(e.to_string()))?
                    .ok_or_else(|| AgentError::store(format!("thread '{id}' not found")))
            }
        }
    }

    fn ensure_system_prompt(&self, thread: &mut Thread) -> Result<()> {
        if thread.system_message().is_some() {
            return Ok(());
        }
        let prompt = system_prompt::render(&self.config.name, &self.config.purpose, &self.config.notes, Utc::now());
        thread.add_message(Message::system(prompt))?;
        Ok(())
    }

    async fn process_latest_attachments(&self, thread: &mut Thread) {
        let Some(file_store) = &self.file_store else { return };
        let has_attachments = thread
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .is_some_and(|m| !m.attachments.is_empty());
        if !has_attachments {
            return;
        }
        let message = thread
            .messages_mut()
            .iter_mut()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .expect("checked above");
        attachments::process_attachments(message, &self.tools, file_store.as_ref()).await;
    }

    async fn step(&self, thread: &Thread) -> anyhow::Result<Option<LlmResponse>> {
        let started_at = Instant::now();

        let mut messages: Vec<LlmMessage> = vec![LlmMessage {
            role: "system".to_string(),
            content: thread.system_message().map(|m| m.content.as_text()).unwrap_or_default(),
            name: None,
            tool_call_id: None,
            tool_calls: None,
        }];
        messages.extend(thread.get_messages_for_chat_completion().into_iter().map(LlmMessage::from));

        let tool_defs = self
            .tools
            .definitions()
            .await
            .into_iter()
            .map(|(name, description, parameters)| {
                serde_json::json!({
                    "type": "function",
                    "function": { "name": name, "description": description, "parameters": parameters },
                })
            })
            .collect();

        let call_config = LlmCallConfig {
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            tools: tool_defs,
            stream: self.config.stream,
        };

        let response = if self.config.stream {
            let stream = self.provider.complete_stream(messages, &call_config).await?;
            let reassembled = reassemble(stream).await;
            LlmResponse {
                content: reassembled.content,
                tool_calls: reassembled.tool_calls,
                usage: reassembled.usage,
            }
        } else {
            self.provider.complete(messages, &call_config).await?
        };

        let _ = started_at.elapsed();
        Ok(Some(response))
    }

    fn append_assistant(&self, thread: &mut Thread, response: &LlmResponse) -> Result<Message> {
        let usage = response.usage.clone().unwrap_or_default();
        let metrics = MessageMetrics {
            model: Some(self.config.model.clone()),
            timing: MessageTiming::default(),
            usage: MessageUsage {
                completion_tokens: Some(usage.completion_tokens),
                prompt_tokens: Some(usage.prompt_tokens),
                total_tokens: Some(usage.total_tokens),
            },
            error: None,
        };

        let message = if response.tool_calls.is_empty() {
            Message::assistant(response.content.clone())
        } else {
            Message::assistant_with_tools(response.content.clone(), response.tool_calls.clone())?
        }
        .with_metrics(metrics);

        Ok(thread.add_message(message)?.clone())
    }

    /// Dispatches every tool call in `response.tool_calls` concurrently,
    /// re-orders results back into call-index order, and appends one tool
    /// message per call (spec.md §4.3 step 4e/4f/4g, §5).
    async fn dispatch_tools(&self, thread: &mut Thread, new_messages: &mut Vec<Message>, response: &LlmResponse) -> Result<bool> {
        let dispatches = join_all(response.tool_calls.iter().map(|call| self.tools.execute_tool_call(call))).await;

        let mut interrupted = false;
        for (call, dispatched) in response.tool_calls.iter().zip(dispatches.into_iter()) {
            let is_interrupt = dispatched.tool_attributes.get("type").and_then(|v| v.as_str()) == Some("interrupt");
            let mut message = Message::tool(call.id.clone(), dispatched.tool_name.clone(), dispatched.outcome.content())
                .with_attributes(serde_json::Map::from_iter([(
                    "tool_attributes".to_string(),
                    serde_json::Value::Object(dispatched.tool_attributes.clone()),
                )]))
                .with_metrics(MessageMetrics {
                    timing: MessageTiming {
                        latency_ms: Some(dispatched.latency_ms),
                        ..Default::default()
                    },
                    ..Default::default()
                });

            for file in dispatched.outcome.files() {
                let bytes = file.content.clone().into_bytes();
                let mut attachment = relay_thread::Attachment::new(file.filename.clone(), bytes.clone(), file.mime_type.clone());
                if let Some(store) = &self.file_store {
                    if let Ok(meta) = store.save(bytes, &file.filename, file.mime_type.as_deref()).await {
                        attachment.mark_stored(meta.id, meta.storage_path);
                    }
                }
                message.add_attachment(attachment);
            }

            let appended = thread.add_message(message)?.clone();
            new_messages.push(appended);

            if is_interrupt {
                interrupted = true;
                break;
            }
        }
        Ok(interrupted)
    }

    fn emit_error(&self, thread: &mut Thread, new_messages: &mut Vec<Message>, detail: &str) {
        let message = Message::assistant(format!("I encountered an error: {detail}")).with_metrics(MessageMetrics {
            error: Some(detail.to_string()),
            ..Default::default()
        });
        match thread.add_message(message) {
            Ok(appended) => new_messages.push(appended.clone()),
            Err(e) => error!(error = %e, "failed to append error message"),
        }
    }

    /// Generates a title from the non-system transcript via a single
    /// provider call (spec.md §4.1 `generate_title`, SPEC_FULL §12): the
    /// title/`updated_at` mutation only happens on success, so a provider
    /// failure leaves `thread` untouched and the error propagates to the
    /// caller rather than being folded into a message like in-loop errors.
    pub async fn generate_title(&self, thread: &mut Thread) -> Result<String> {
        let conversation = thread
            .get_messages_for_chat_completion()
            .into_iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let messages = vec![
            LlmMessage {
                role: "system".to_string(),
                content: "You are a title generator. Generate a clear, concise title (less than 10 words) that captures the main topic or purpose of this conversation. Return only the title, nothing else.".to_string(),
                name: None,
                tool_call_id: None,
                tool_calls: None,
            },
            LlmMessage {
                role: "user".to_string(),
                content: format!("Generate a title for this conversation:\n\n{conversation}"),
                name: None,
                tool_call_id: None,
                tool_calls: None,
            },
        ];

        let call_config = LlmCallConfig {
            model: self.config.model.clone(),
            temperature: Some(0.7),
            max_tokens: Some(50),
            tools: Vec::new(),
            stream: false,
        };

        let response = self.provider.complete(messages, &call_config).await?;
        let title = response.content.trim().to_string();
        thread.set_title(title.clone());
        Ok(title)
    }

    async fn persist(&self, thread: &Thread) -> Result<()> {
        let Some(store) = &self.thread_store else { return Ok(()) };
        store.save(thread.clone()).await.map_err(|e| AgentError::store(e.to_string()))?;
        Ok(())
    }
}
