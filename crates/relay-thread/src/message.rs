//! Message entity: role, content, tool-call linkage, reactions, metrics.
//!
//! Mirrors `tyler/models/message.py`: identity is a content-derived hash so
//! that identical messages in identical positions collide deterministically,
//! and `metrics` is a free-form bag folded over by Thread-level aggregations.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::attachment::Attachment;
use crate::error::{Result, ThreadError};

/// The four roles a message can carry. `System` is accepted on ingest but
/// never persisted by a durable backend (spec.md §3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = ThreadError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "tool" => Ok(MessageRole::Tool),
            other => Err(ThreadError::InvalidRole(other.to_string())),
        }
    }
}

/// One part of a heterogeneous message content list (design note §9:
/// "Content union").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrlRef },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrlRef {
    pub url: String,
}

/// Message content is either a plain string or a list of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Flatten to a plain string for hashing and for text-only projections.
    /// Image parts contribute nothing to the text form.
    pub fn as_text(&self) -> String {
        match self {
            Content::Text(s) => s.clone(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text(s) => s.is_empty(),
            Content::Parts(p) => p.is_empty(),
        }
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s)
    }
}

/// The function payload of a tool call, as it appears on the wire
/// (spec.md §6: `{id, type: "function", function: {name, arguments}}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    /// Always a JSON-encoded string, even when empty (normalized to `"{}"`
    /// by the tool runner before dispatch, never by the Message itself).
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRef {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ToolCallFunction,
}

impl ToolCallRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: "function".to_string(),
            function: ToolCallFunction {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// Validates the invariant from spec.md §3: each entry must have
    /// `{id, type, function:{name, arguments}}`, all non-empty.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(ThreadError::InvalidToolCall("empty id".to_string()));
        }
        if self.function.name.is_empty() {
            return Err(ThreadError::InvalidToolCall(
                "empty function.name".to_string(),
            ));
        }
        Ok(())
    }
}

/// Timing captured around one LLM call (tyler `metrics.timing`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageTiming {
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub latency_ms: Option<i64>,
}

/// Token usage captured around one LLM call (tyler `metrics.usage`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageUsage {
    pub completion_tokens: Option<u64>,
    pub prompt_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

/// Free-form per-message metrics bag, folded over by Thread aggregations
/// (spec.md §4.1: `get_total_tokens`, `get_model_usage`,
/// `get_message_timing_stats`, `get_tool_usage`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMetrics {
    pub model: Option<String>,
    #[serde(default)]
    pub timing: MessageTiming,
    #[serde(default)]
    pub usage: MessageUsage,
    /// Set when a provider error was recovered in-loop (spec.md §7).
    pub error: Option<String>,
}

/// One message in a Thread.
///
/// `sequence` is assigned by `Thread::add_message`, never by the caller.
/// `id` is a content-derived hash so identical messages in identical
/// positions collide deterministically (tyler `Message.__init__`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub sequence: u64,
    pub content: Content,
    pub name: Option<String>,
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallRef>>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub source: Option<Map<String, Value>>,
    #[serde(default)]
    pub metrics: MessageMetrics,
    #[serde(default)]
    pub reactions: HashMap<String, HashSet<String>>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Construct a message, enforcing the role-specific invariants from
    /// spec.md §3 (tool messages require `tool_call_id`). `sequence` is a
    /// placeholder (0) until `Thread::add_message` assigns the real value.
    pub fn new(role: MessageRole, content: impl Into<Content>) -> Result<Self> {
        if role == MessageRole::Tool {
            return Err(ThreadError::MissingToolCallId);
        }
        Ok(Self::new_unchecked(role, content.into()))
    }

    fn new_unchecked(role: MessageRole, content: Content) -> Self {
        let timestamp = Utc::now();
        let mut msg = Self {
            id: String::new(),
            role,
            sequence: 0,
            content,
            name: None,
            tool_call_id: None,
            tool_calls: None,
            attachments: Vec::new(),
            attributes: Map::new(),
            source: None,
            metrics: MessageMetrics::default(),
            reactions: HashMap::new(),
            timestamp,
        };
        msg.id = msg.compute_id();
        msg
    }

    pub fn system(content: impl Into<Content>) -> Self {
        Self::new_unchecked(MessageRole::System, content.into())
    }

    pub fn user(content: impl Into<Content>) -> Self {
        Self::new_unchecked(MessageRole::User, content.into())
    }

    pub fn assistant(content: impl Into<Content>) -> Self {
        Self::new_unchecked(MessageRole::Assistant, content.into())
    }

    pub fn assistant_with_tools(content: impl Into<Content>, tool_calls: Vec<ToolCallRef>) -> Result<Self> {
        for tc in &tool_calls {
            tc.validate()?;
        }
        let mut msg = Self::new_unchecked(MessageRole::Assistant, content.into());
        msg.tool_calls = Some(tool_calls);
        msg.id = msg.compute_id();
        Ok(msg)
    }

    /// Tool-result message. `tool_call_id` is required (spec.md §3).
    pub fn tool(tool_call_id: impl Into<String>, name: impl Into<String>, content: impl Into<Content>) -> Self {
        let mut msg = Self::new_unchecked(MessageRole::Tool, content.into());
        msg.tool_call_id = Some(tool_call_id.into());
        msg.name = Some(name.into());
        msg.id = msg.compute_id();
        msg
    }

    pub fn with_source(mut self, source: Map<String, Value>) -> Self {
        self.source = Some(source);
        self.id = self.compute_id();
        self
    }

    pub fn with_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_metrics(mut self, metrics: MessageMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    /// Content-derived hash: sha256 of role + sequence + content + ISO
    /// timestamp + optional name + optional source, JSON-encoded with
    /// sorted keys (tyler `Message.__init__`'s `id` generation).
    fn compute_id(&self) -> String {
        #[derive(Serialize)]
        struct HashInput<'a> {
            role: &'a str,
            sequence: u64,
            content: &'a Content,
            timestamp: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            name: &'a Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            source: &'a Option<Map<String, Value>>,
        }

        let input = HashInput {
            role: self.role.as_str(),
            sequence: self.sequence,
            content: &self.content,
            timestamp: self.timestamp.to_rfc3339(),
            name: &self.name,
            source: &self.source,
        };
        // serde_json's Map preserves insertion order by default, but we only
        // need determinism for identical inputs, not canonical key ordering.
        let encoded = serde_json::to_vec(&input).expect("message hash input is always serializable");
        let digest = Sha256::digest(&encoded);
        hex::encode(digest)
    }

    /// Re-derive the id after `sequence` is assigned by `Thread::add_message`.
    pub(crate) fn refresh_id(&mut self) {
        self.id = self.compute_id();
    }

    // -- Reactions (tyler thread.py add_reaction/remove_reaction/get_reactions) --

    /// Returns `true` if this changed the reaction set (per SPEC_FULL §12,
    /// adding an already-present user is a no-op).
    pub fn add_reaction(&mut self, emoji: &str, user: &str) -> bool {
        let set = self.reactions.entry(emoji.to_string()).or_default();
        set.insert(user.to_string())
    }

    /// Returns `true` if this changed the reaction set. Drops the emoji key
    /// entirely once its user set becomes empty (SPEC_FULL §12).
    pub fn remove_reaction(&mut self, emoji: &str, user: &str) -> bool {
        let Some(set) = self.reactions.get_mut(emoji) else {
            return false;
        };
        let removed = set.remove(user);
        if set.is_empty() {
            self.reactions.remove(emoji);
        }
        removed
    }

    pub fn reactions_for(&self, emoji: &str) -> Option<&HashSet<String>> {
        self.reactions.get(emoji)
    }
}
