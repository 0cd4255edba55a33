//! Agent configuration for the iteration loop.
//!
//! Grounded on `everruns-core/src/config.rs`'s `AgentConfig`/`AgentConfigBuilder`,
//! stripped of the teacher's capability-registry machinery (this workspace has
//! no capability system; tools are registered directly on a `ToolRegistry`).

use serde::{Deserialize, Serialize};

fn default_max_iterations() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub purpose: String,
    pub notes: String,
    pub model: String,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Use `LlmProvider::complete_stream` + the reassembler instead of
    /// `complete` (spec.md §4.6: the loop body is identical either way).
    #[serde(default)]
    pub stream: bool,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, purpose: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            purpose: purpose.into(),
            notes: String::new(),
            model: model.into(),
            max_iterations: default_max_iterations(),
            temperature: None,
            max_tokens: None,
            stream: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct AgentConfigBuilder {
    name: String,
    purpose: String,
    notes: String,
    model: String,
    max_iterations: Option<usize>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    stream: bool,
}

impl AgentConfigBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = purpose.into();
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn build(self) -> AgentConfig {
        AgentConfig {
            name: self.name,
            purpose: self.purpose,
            notes: self.notes,
            model: self.model,
            max_iterations: self.max_iterations.unwrap_or_else(default_max_iterations),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: self.stream,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_max_iterations_to_ten() {
        let config = AgentConfigBuilder::new("Helper").purpose("Assist with tasks").model("gpt-5.2").build();
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.name, "Helper");
    }
}
