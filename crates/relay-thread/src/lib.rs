//! Conversation data model: Thread, Message, Attachment.
//!
//! This crate owns the canonical conversation entity and its invariants
//! (message sequencing, reactions, chat-completion projection, metric
//! aggregation) but performs no I/O and calls no LLM provider itself —
//! those concerns live in `relay-agent` and `relay-storage`.

pub mod attachment;
pub mod error;
pub mod message;
pub mod thread;

pub use attachment::{Attachment, AttachmentStatus};
pub use error::{Result, ThreadError};
pub use message::{
    Content, ContentPart, ImageUrlRef, Message, MessageMetrics, MessageRole, MessageTiming,
    MessageUsage, ToolCallFunction, ToolCallRef,
};
pub use thread::{ProjectedMessage, Thread};
