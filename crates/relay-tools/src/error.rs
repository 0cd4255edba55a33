//! Error types for tool registration.
//!
//! Dispatch itself never returns `Err` to its caller (spec.md §7: tool and
//! not-found/parse errors are captured and folded into the tool result) —
//! this enum is only for registration-time programmer errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolError>;

#[derive(Debug, Error)]
pub enum ToolError {
    /// A custom tool registration was missing a required field
    /// (tyler `agent.py`'s dict-form tool registration requires
    /// `definition`/`implementation` keys).
    #[error("invalid tool registration for '{0}': {1}")]
    InvalidRegistration(String, String),
}
