//! LLM request types for crewd
//!
//! These types model the Ollama API but are provider-agnostic enough to
//! support other local providers in the future.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A generation request - everything needed for one provider call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Model identifier
    pub model: String,

    /// The user prompt
    pub prompt: String,

    /// Optional system prompt
    pub system_prompt: Option<String>,

    /// Prior conversation turns, oldest first
    pub history: Vec<ChatMessage>,

    /// Sampling temperature
    pub temperature: f32,
}

impl GenerationRequest {
    /// Create a request with the default temperature
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        debug!("GenerationRequest::new: called");
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system_prompt: None,
            history: Vec::new(),
            temperature: 0.7,
        }
    }

    /// Set the system prompt
    pub fn with_system(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Attach conversation history
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in a conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        debug!("ChatMessage::system: called");
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        debug!("ChatMessage::user: called");
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        debug!("ChatMessage::assistant: called");
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
