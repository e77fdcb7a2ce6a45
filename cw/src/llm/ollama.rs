//! Ollama API client implementation
//!
//! Implements the LlmClient trait against a local Ollama server. Plain
//! prompts go through `/api/generate`; requests carrying a conversation
//! history go through `/api/chat`.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::client::LlmClient;
use super::error::LlmError;
use super::types::{ChatMessage, GenerationRequest};
use crate::config::LlmConfig;

/// Maximum number of retries for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Ollama API client
pub struct OllamaClient {
    base_url: String,
    http: Client,
    timeout: Duration,
}

impl OllamaClient {
    /// Create a new client from configuration
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(?config, "from_config: called");
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            timeout,
        })
    }

    /// Build the request body for `/api/generate`
    fn build_generate_body(&self, request: &GenerationRequest) -> serde_json::Value {
        debug!(%request.model, "build_generate_body: called");
        let mut body = serde_json::json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
            "options": { "temperature": request.temperature },
        });

        if let Some(system) = &request.system_prompt {
            body["system"] = serde_json::json!(system);
        }

        body
    }

    /// Build the request body for `/api/chat`
    ///
    /// The system prompt becomes the first message, followed by the history
    /// and finally the prompt as the newest user turn.
    fn build_chat_body(&self, request: &GenerationRequest) -> serde_json::Value {
        debug!(%request.model, history_len = %request.history.len(), "build_chat_body: called");
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        if let Some(system) = &request.system_prompt {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.extend(request.history.iter().cloned());
        messages.push(ChatMessage::user(request.prompt.clone()));

        serde_json::json!({
            "model": request.model,
            "messages": messages,
            "stream": false,
            "options": { "temperature": request.temperature },
        })
    }

    /// POST a JSON body, retrying transient failures with backoff + jitter
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<serde_json::Value, LlmError> {
        debug!(%url, "post_json: called");
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                let jitter = rand::rng().random_range(0..=backoff / 4);
                warn!(attempt, backoff_ms = backoff + jitter, "post_json: retrying after transient error");
                tokio::time::sleep(Duration::from_millis(backoff + jitter)).await;
            }

            match self.http.post(url).json(body).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if response.status().is_success() {
                        debug!(status, "post_json: success");
                        return response.json().await.map_err(LlmError::Network);
                    }

                    let message = response.text().await.unwrap_or_default();
                    debug!(status, %message, "post_json: error status");
                    if status == 404 {
                        return Err(LlmError::InvalidModel(message));
                    }
                    if is_retryable_status(status) {
                        last_error = Some(LlmError::Unavailable(format!("HTTP {}: {}", status, message)));
                        continue;
                    }
                    return Err(LlmError::InvalidInput(format!("HTTP {}: {}", status, message)));
                }
                Err(e) if e.is_timeout() => {
                    debug!("post_json: request timed out");
                    last_error = Some(LlmError::Timeout(self.timeout));
                }
                Err(e) if e.is_connect() => {
                    debug!(error = %e, "post_json: connect error");
                    last_error = Some(LlmError::Unavailable(e.to_string()));
                }
                Err(e) => return Err(LlmError::Network(e)),
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::Unavailable("retries exhausted".to_string())))
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError> {
        debug!(%request.model, prompt_len = %request.prompt.len(), "generate: called");

        if request.prompt.trim().is_empty() {
            return Err(LlmError::InvalidInput("prompt is empty".to_string()));
        }

        if request.history.is_empty() {
            let url = format!("{}/api/generate", self.base_url);
            let body = self.build_generate_body(&request);
            let value = self.post_json(&url, &body).await?;
            let parsed: GenerateResponse = serde_json::from_value(value)?;
            Ok(parsed.response)
        } else {
            let url = format!("{}/api/chat", self.base_url);
            let body = self.build_chat_body(&request);
            let value = self.post_json(&url, &body).await?;
            let parsed: ChatResponse = serde_json::from_value(value)?;
            Ok(parsed.message.content)
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        debug!("list_models: called");
        let url = format!("{}/api/tags", self.base_url);

        let response = self.http.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.timeout)
            } else if e.is_connect() {
                LlmError::Unavailable(e.to_string())
            } else {
                LlmError::Network(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Unavailable(format!("HTTP {}: {}", status, message)));
        }

        let parsed: TagsResponse = response.json().await.map_err(LlmError::Network)?;
        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}
