//! SubTask - a role-scoped decomposition of a Task

use serde::{Deserialize, Serialize};
use teamstore::{Record, now_ms};

use super::id::generate_id;
use super::status::Status;

/// A role-scoped piece of a Task, optionally dependent on sibling subtasks
///
/// Dependencies are advisory ordering hints restricted to subtasks of the
/// same parent; an unmet dependency never blocks execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    /// Unique identifier
    pub id: String,

    /// Owning task
    pub parent_task_id: String,

    /// Subtask title
    pub title: String,

    /// Subtask description
    pub description: String,

    /// Agent this subtask is assigned to, if any
    #[serde(default)]
    pub assigned_agent_id: Option<String>,

    /// Current status
    #[serde(default)]
    pub status: Status,

    /// Sibling subtask ids this one should run after
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Result of the latest run
    #[serde(default)]
    pub result: Option<String>,

    /// Result of the run before the latest re-execution
    #[serde(default)]
    pub previous_result: Option<String>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl SubTask {
    /// Create a new pending subtask
    pub fn new(parent_task_id: impl Into<String>, title: impl Into<String>, description: impl Into<String>) -> Self {
        let title = title.into();
        let now = now_ms();
        Self {
            id: generate_id("subtask", &title),
            parent_task_id: parent_task_id.into(),
            title,
            description: description.into(),
            assigned_agent_id: None,
            status: Status::Pending,
            dependencies: Vec::new(),
            result: None,
            previous_result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Assign an agent
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.assigned_agent_id = Some(agent_id.into());
        self.updated_at = now_ms();
        self
    }

    /// Declare dependencies on sibling subtasks
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self.updated_at = now_ms();
        self
    }

    /// Update the status
    pub fn set_status(&mut self, status: Status) {
        self.status = status;
        self.updated_at = now_ms();
    }

    /// Record a run's outcome
    pub fn record_result(&mut self, status: Status, result: impl Into<String>) {
        self.result = Some(result.into());
        self.set_status(status);
    }

    /// Reset for re-execution of a completed parent task
    ///
    /// The latest result moves into `previous_result` so nothing is lost.
    pub fn reset_for_rerun(&mut self) {
        if let Some(result) = self.result.take() {
            self.previous_result = Some(result);
        }
        self.set_status(Status::Pending);
    }
}

impl Record for SubTask {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "subtasks"
    }
}
