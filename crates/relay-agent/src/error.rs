//! Error types for the agent iteration loop and agent runner.
//!
//! Pattern grounded on `everruns-core/src/error.rs`: a thiserror enum with
//! helper constructors, an `#[from] anyhow::Error` catch-all, and a
//! dedicated variant for the one expected non-exceptional "error":
//! reaching the iteration cap is handled separately (spec.md §7, it is
//! surfaced as a normal assistant message, not an `Err`).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Programmer error: a thread id was passed with no store configured
    /// (spec.md §4.3 step 1, §7).
    #[error("no thread store configured to resolve thread id '{0}'")]
    NoStoreForThreadId(String),

    /// Programmer error: an invalid custom tool registration (spec.md §7).
    #[error("invalid tool registration: {0}")]
    InvalidToolRegistration(String),

    /// Programmer error: a name looked up in a Registry was absent
    /// (spec.md §4.4 "Missing agent -> programmer error").
    #[error("no {kind} registered with name '{name}'")]
    NotRegistered { kind: &'static str, name: String },

    /// Thread model invariant violation surfaced at the loop boundary.
    #[error("thread error: {0}")]
    Thread(#[from] relay_thread::ThreadError),

    /// Thread-store I/O failure (propagates out of the loop per spec.md §7).
    #[error("thread store error: {0}")]
    Store(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AgentError {
    pub fn store(msg: impl Into<String>) -> Self {
        AgentError::Store(msg.into())
    }

    pub fn not_registered(kind: &'static str, name: impl Into<String>) -> Self {
        AgentError::NotRegistered {
            kind,
            name: name.into(),
        }
    }
}
