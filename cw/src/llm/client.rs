//! LlmClient trait and test double

use async_trait::async_trait;

use super::error::LlmError;
use super::types::GenerationRequest;

/// A completion provider
///
/// Implementations must be cheap to share behind an Arc; every call is
/// awaited to completion by the caller.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate text for the given request
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError>;

    /// List the models the provider currently serves
    async fn list_models(&self) -> Result<Vec<String>, LlmError>;
}

pub mod mock {
    //! Scripted mock client for tests

    use std::collections::VecDeque;
    use std::time::Duration;

    use tokio::sync::Mutex;

    use super::*;

    /// One scripted reply
    #[derive(Debug, Clone)]
    pub enum MockReply {
        /// Return this text
        Text(String),
        /// Fail with an Unavailable error carrying this message
        Fail(String),
        /// Never resolve (for liveness tests)
        Hang,
    }

    /// Mock client that replays scripted replies in order
    ///
    /// When the script is exhausted the last reply repeats, so a single
    /// scripted reply serves any number of calls.
    pub struct MockLlmClient {
        replies: Mutex<VecDeque<MockReply>>,
        fallback: Mutex<Option<MockReply>>,
        requests: Mutex<Vec<GenerationRequest>>,
        delay: Option<Duration>,
        models: Vec<String>,
    }

    impl MockLlmClient {
        /// Create a client from a reply script
        pub fn new(replies: Vec<MockReply>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                fallback: Mutex::new(None),
                requests: Mutex::new(Vec::new()),
                delay: None,
                models: vec!["mock-model".to_string()],
            }
        }

        /// Create a client that always returns the same text
        pub fn always(text: impl Into<String>) -> Self {
            Self::new(vec![MockReply::Text(text.into())])
        }

        /// Sleep this long before answering each request
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Requests seen so far, in call order
        pub async fn requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().await.clone()
        }

        async fn next_reply(&self) -> Option<MockReply> {
            let mut replies = self.replies.lock().await;
            let mut fallback = self.fallback.lock().await;
            match replies.pop_front() {
                Some(reply) => {
                    *fallback = Some(reply.clone());
                    Some(reply)
                }
                None => fallback.clone(),
            }
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError> {
            self.requests.lock().await.push(request);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            match self.next_reply().await {
                Some(MockReply::Text(text)) => Ok(text),
                Some(MockReply::Fail(message)) => Err(LlmError::Unavailable(message)),
                Some(MockReply::Hang) => std::future::pending().await,
                None => Err(LlmError::InvalidResponse("no scripted replies".to_string())),
            }
        }

        async fn list_models(&self) -> Result<Vec<String>, LlmError> {
            Ok(self.models.clone())
        }
    }

}
