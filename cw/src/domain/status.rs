//! Shared Task/SubTask status state machine
//!
//! `Pending -> InProgress -> {Completed | Failed | Cancelled}`, plus the
//! re-entrant `Completed -> InProgress` edge taken by iteration and by
//! re-execution of a completed task.

use serde::{Deserialize, Serialize};

/// Execution status shared by Task and SubTask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Created, not yet started
    #[default]
    Pending,
    /// Being worked on
    InProgress,
    /// Finished with a result
    Completed,
    /// Finished with an error
    Failed,
    /// Stopped by explicit cancellation
    Cancelled,
}

impl Status {
    /// Terminal for a single execution attempt
    ///
    /// A Completed task can still re-enter InProgress through iteration.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed | Status::Cancelled)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
