//! Tool Runner: registration and safe parallel execution of tool calls.

pub mod builtin;
pub mod error;
pub mod registry;
pub mod tool;
pub mod wire;

pub use error::{Result, ToolError};
pub use registry::{Registry, ToolRegistry};
pub use tool::{Tool, ToolAttributes, ToolExecutionResult};
pub use wire::{DispatchedResult, NormalizedCall, ResultFile, ToolOutcome};
