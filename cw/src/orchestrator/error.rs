//! Orchestrator error types
//!
//! Provider failures are deliberately absent: they are recorded into the
//! affected entity's result and logs, never raised to the caller.

use thiserror::Error;

/// Errors surfaced by orchestrator operations
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    Store(#[from] teamstore::StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::NotFound("task x".to_string());
        assert_eq!(err.to_string(), "Not found: task x");

        let err = OrchestratorError::InvalidState("already running".to_string());
        assert!(err.to_string().contains("already running"));
    }
}
