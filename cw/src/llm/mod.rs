//! LLM client module for crewd
//!
//! The completion provider port: a trait, its Ollama implementation, and a
//! scripted mock for tests.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
mod ollama;
mod types;

pub use client::LlmClient;
pub use error::LlmError;
pub use ollama::OllamaClient;
pub use types::{ChatMessage, GenerationRequest, Role};

use crate::config::LlmConfig;

/// Create an LLM client based on the provider specified in config
///
/// Currently only "ollama" is supported.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "ollama" => {
            debug!("create_client: creating Ollama client");
            Ok(Arc::new(OllamaClient::from_config(config)?))
        }
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::InvalidInput(format!(
                "Unknown LLM provider: '{}'. Supported: ollama",
                other
            )))
        }
    }
}
