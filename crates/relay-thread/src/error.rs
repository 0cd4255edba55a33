//! Error types for the conversation data model.

use thiserror::Error;

/// Result type alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ThreadError>;

/// Errors raised by the Thread/Message data model.
///
/// These are all programmer errors in the sense of spec.md's taxonomy:
/// they indicate a caller violated an invariant at construction time and
/// must fail loudly rather than be silently recovered.
#[derive(Debug, Error)]
pub enum ThreadError {
    /// A `tool` role message was constructed without a `tool_call_id`.
    #[error("tool message is missing required tool_call_id")]
    MissingToolCallId,

    /// A role outside {system, user, assistant, tool} was supplied.
    #[error("invalid message role: {0}")]
    InvalidRole(String),

    /// More than one system message was added to a thread.
    #[error("thread already has a system message at sequence 0")]
    MultipleSystemMessages,

    /// Lookup by message id found nothing.
    #[error("message not found: {0}")]
    MessageNotFound(String),

    /// A tool_calls entry was missing a required field.
    #[error("invalid tool_calls entry: {0}")]
    InvalidToolCall(String),
}
