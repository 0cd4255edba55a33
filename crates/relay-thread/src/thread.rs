//! Thread: the canonical conversation entity. Owns message sequencing,
//! reaction mutation, metric aggregation, and the chat-completion
//! projection (spec.md §3, §4.1).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ThreadError};
use crate::message::{Content, Message, MessageRole, ToolCallRef};

/// A single projected message in provider-wire form, ready to hand to an
/// LLM provider adapter. System messages never appear here (spec.md §4.1,
/// invariant 6) — the caller injects a fresh system message separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectedMessage {
    pub role: String,
    pub content: String,
    pub name: Option<String>,
    pub tool_call_id: Option<String>,
    pub tool_calls: Option<Vec<ToolCallRef>>,
}

/// The conversation entity. Identified by a caller-supplied opaque string
/// id (UUID by convention, but the thread model does not mint it itself —
/// see `Thread::new`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub title: Option<String>,
    messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub source: Option<Map<String, Value>>,
    #[serde(default)]
    pub platforms: HashMap<String, Map<String, Value>>,
}

impl Thread {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: None,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            attributes: Map::new(),
            source: None,
            platforms: HashMap::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Direct mutable access for callers that need to update messages in
    /// place (e.g. stamping attachment storage locations before persisting)
    /// without going through `add_message`'s sequencing.
    pub fn messages_mut(&mut self) -> &mut [Message] {
        &mut self.messages
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
        if self.updated_at < self.created_at {
            self.updated_at = self.created_at;
        }
    }

    /// Insert a message, assigning its sequence per spec.md §4.1:
    /// system messages get sequence 0 and are placed at the head; a second
    /// system message is a programmer error (§9 Open Question, resolved in
    /// DESIGN.md). Non-system messages get `1 + max(existing non-system
    /// sequence, 0)` and are appended.
    pub fn add_message(&mut self, mut message: Message) -> Result<&Message> {
        if message.role == MessageRole::System {
            if self.messages.iter().any(|m| m.role == MessageRole::System) {
                return Err(ThreadError::MultipleSystemMessages);
            }
            message.sequence = 0;
            message.refresh_id();
            self.messages.insert(0, message);
        } else {
            if message.role == MessageRole::Tool && message.tool_call_id.is_none() {
                return Err(ThreadError::MissingToolCallId);
            }
            let next_seq = self
                .messages
                .iter()
                .filter(|m| m.role != MessageRole::System)
                .map(|m| m.sequence)
                .max()
                .unwrap_or(0)
                + 1;
            message.sequence = next_seq;
            message.refresh_id();
            self.messages.push(message);
        }
        self.touch();
        Ok(self.messages.last().expect("just pushed or inserted"))
    }

    pub fn system_message(&self) -> Option<&Message> {
        self.messages.first().filter(|m| m.role == MessageRole::System)
    }

    pub fn get_message_by_id(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    fn get_message_by_id_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn get_last_message_by_role(&self, role: MessageRole) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == role)
    }

    // -- Reactions (tyler thread.py add_reaction/remove_reaction/get_reactions) --

    pub fn add_reaction(&mut self, message_id: &str, emoji: &str, user: &str) -> Result<()> {
        let msg = self
            .get_message_by_id_mut(message_id)
            .ok_or_else(|| ThreadError::MessageNotFound(message_id.to_string()))?;
        let changed = msg.add_reaction(emoji, user);
        if changed {
            self.touch();
        }
        Ok(())
    }

    pub fn remove_reaction(&mut self, message_id: &str, emoji: &str, user: &str) -> Result<()> {
        let msg = self
            .get_message_by_id_mut(message_id)
            .ok_or_else(|| ThreadError::MessageNotFound(message_id.to_string()))?;
        let changed = msg.remove_reaction(emoji, user);
        if changed {
            self.touch();
        }
        Ok(())
    }

    pub fn get_reactions<'a>(&'a self, message_id: &str) -> Result<&'a HashMap<String, std::collections::HashSet<String>>> {
        let msg = self
            .get_message_by_id(message_id)
            .ok_or_else(|| ThreadError::MessageNotFound(message_id.to_string()))?;
        Ok(&msg.reactions)
    }

    /// Returns a clone with any system message removed. Durable backends
    /// call this before persisting (spec.md §6: "System messages are never
    /// persisted"); the agent re-injects a fresh system prompt each turn.
    pub fn without_system_message(&self) -> Thread {
        let mut clone = self.clone();
        clone.messages.retain(|m| m.role != MessageRole::System);
        clone
    }

    /// Replace this thread's messages wholesale. Used by thread stores when
    /// reconstructing a `Thread` from persisted rows.
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Mutate the title and bump `updated_at`. The actual LLM call that
    /// produces the title lives outside this crate (relay-agent's
    /// `Agent::generate_title`), since this crate carries no provider
    /// dependency; that call invokes this setter on success only
    /// (SPEC_FULL §12).
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
        self.touch();
    }

    /// Projects all non-system messages to chat-completion wire form, in
    /// sequence order (spec.md §4.1). System messages are excluded.
    pub fn get_messages_for_chat_completion(&self) -> Vec<ProjectedMessage> {
        self.messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(project_message)
            .collect()
    }

    // -- Aggregations (spec.md §4.1; metric shape per SPEC_FULL §12) --

    pub fn get_total_tokens(&self) -> u64 {
        self.messages
            .iter()
            .map(|m| m.metrics.usage.total_tokens.unwrap_or(0))
            .sum()
    }

    /// Usage broken down by model name. If `models` is given, only those
    /// models are included in the result (missing models are simply absent,
    /// not zero-filled).
    pub fn get_model_usage(&self, models: Option<&[String]>) -> HashMap<String, u64> {
        let mut out: HashMap<String, u64> = HashMap::new();
        for m in &self.messages {
            let Some(model) = &m.metrics.model else { continue };
            if let Some(filter) = models {
                if !filter.iter().any(|f| f == model) {
                    continue;
                }
            }
            *out.entry(model.clone()).or_insert(0) += m.metrics.usage.total_tokens.unwrap_or(0);
        }
        out
    }

    /// Average latency in milliseconds across messages that recorded
    /// timing metrics; `None` if no message did.
    pub fn get_message_timing_stats(&self) -> Option<f64> {
        let latencies: Vec<i64> = self
            .messages
            .iter()
            .filter_map(|m| m.metrics.timing.latency_ms)
            .collect();
        if latencies.is_empty() {
            return None;
        }
        Some(latencies.iter().sum::<i64>() as f64 / latencies.len() as f64)
    }

    pub fn get_message_counts(&self) -> HashMap<&'static str, usize> {
        let mut counts = HashMap::new();
        for role in [
            MessageRole::System,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::Tool,
        ] {
            let n = self.messages.iter().filter(|m| m.role == role).count();
            counts.insert(role.as_str(), n);
        }
        counts
    }

    /// Count of tool invocations per tool name, folded over assistant
    /// `tool_calls` entries (missing fields contribute zero, per spec.md §4.1).
    pub fn get_tool_usage(&self) -> HashMap<String, usize> {
        let mut usage = HashMap::new();
        for m in &self.messages {
            let Some(calls) = &m.tool_calls else { continue };
            for call in calls {
                *usage.entry(call.function.name.clone()).or_insert(0) += 1;
            }
        }
        usage
    }
}

/// Implements spec.md §4.1's projection rules exactly.
fn project_message(m: &Message) -> ProjectedMessage {
    let base_text = m.content.as_text();

    let content = match m.role {
        MessageRole::User if !m.attachments.is_empty() => append_file_references(&base_text, m, ""),
        MessageRole::Assistant if !m.attachments.is_empty() => {
            append_file_references(&base_text, m, "Generated Files:\n")
        }
        _ => base_text,
    };

    ProjectedMessage {
        role: m.role.as_str().to_string(),
        content,
        name: m.name.clone(),
        tool_call_id: m.tool_call_id.clone(),
        tool_calls: m.tool_calls.clone(),
    }
}

fn append_file_references(base_text: &str, m: &Message, header: &str) -> String {
    let refs: Vec<String> = m
        .attachments
        .iter()
        .map(|a| {
            let url = a
                .file_id
                .as_deref()
                .map(|id| format!("attachment://{id}"))
                .unwrap_or_else(|| format!("attachment://pending/{}", a.filename));
            a.reference(&url)
        })
        .collect();

    let refs_block = if header.is_empty() {
        refs.join("\n")
    } else {
        format!("{header}{}", refs.join("\n"))
    };

    if base_text.is_empty() {
        refs_block
    } else {
        format!("{base_text}\n\n{refs_block}")
    }
}

impl From<&Content> for String {
    fn from(c: &Content) -> Self {
        c.as_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn system_message_gets_sequence_zero_and_head_position() {
        let mut t = Thread::new("t1");
        t.add_message(Message::user("hi")).unwrap();
        t.add_message(Message::system("be nice")).unwrap();
        assert_eq!(t.messages()[0].role, MessageRole::System);
        assert_eq!(t.messages()[0].sequence, 0);
        assert_eq!(t.messages()[1].sequence, 1);
    }

    #[test]
    fn second_system_message_is_rejected() {
        let mut t = Thread::new("t1");
        t.add_message(Message::system("a")).unwrap();
        let err = t.add_message(Message::system("b")).unwrap_err();
        assert!(matches!(err, ThreadError::MultipleSystemMessages));
    }

    #[test]
    fn non_system_sequences_are_strictly_increasing() {
        let mut t = Thread::new("t1");
        t.add_message(Message::user("one")).unwrap();
        t.add_message(Message::assistant("two")).unwrap();
        t.add_message(Message::user("three")).unwrap();
        let seqs: Vec<u64> = t.messages().iter().map(|m| m.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn chat_completion_projection_excludes_system() {
        let mut t = Thread::new("t1");
        t.add_message(Message::system("sys")).unwrap();
        t.add_message(Message::user("hi")).unwrap();
        let projected = t.get_messages_for_chat_completion();
        assert_eq!(projected.len(), 1);
        assert_eq!(projected[0].role, "user");
    }

    #[test]
    fn reactions_round_trip_s7() {
        let mut t = Thread::new("t1");
        let id = t.add_message(Message::assistant("hello")).unwrap().id.clone();
        t.add_reaction(&id, ":thumbsup:", "u1").unwrap();
        t.add_reaction(&id, ":thumbsup:", "u2").unwrap();
        t.add_reaction(&id, ":heart:", "u1").unwrap();
        t.remove_reaction(&id, ":heart:", "u1").unwrap();
        let reactions = t.get_reactions(&id).unwrap();
        assert_eq!(
            reactions.get(":thumbsup:").unwrap(),
            &std::collections::HashSet::from(["u1".to_string(), "u2".to_string()])
        );
        assert!(reactions.get(":heart:").is_none());
    }

    #[test]
    fn updated_at_never_precedes_created_at() {
        let t = Thread::new("t1");
        assert!(t.updated_at >= t.created_at);
    }
}
