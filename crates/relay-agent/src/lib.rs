//! Bounded agent iteration loop, agent-as-tool delegation, and streaming
//! reassembly, built on top of `relay-thread` and `relay-tools`.

mod attachments;
mod config;
mod error;
mod llm;
#[path = "loop.rs"]
mod r#loop;
mod reassembler;
mod runner;
mod system_prompt;

pub use attachments::process_attachments;
pub use config::{AgentConfig, AgentConfigBuilder};
pub use error::{AgentError, Result};
pub use llm::{
    FailingProvider, LlmCallConfig, LlmMessage, LlmProvider, LlmResponse, LlmStreamEvent, LlmUsage,
    MockProvider, ScriptedResponse,
};
pub use r#loop::{Agent, ThreadInput};
pub use reassembler::{reassemble, ReassembledResponse};
pub use relay_tools::Registry;
pub use runner::{AgentRunner, DelegationTool};
pub use system_prompt::render as render_system_prompt;
