//! Task - top-level unit of work submitted by a caller

use serde::{Deserialize, Serialize};
use teamstore::{Record, now_ms};

use super::id::generate_id;
use super::status::Status;

/// A timestamped log line attached to a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unix milliseconds
    pub timestamp: i64,
    pub message: String,
}

/// Kind of content held by a Document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Code,
    Text,
}

impl DocumentKind {
    /// Classify by file extension: markdown and plain text are Text,
    /// everything else is Code.
    pub fn from_filename(name: &str) -> Self {
        if name.ends_with(".md") || name.ends_with(".txt") {
            Self::Text
        } else {
            Self::Code
        }
    }
}

/// A named artifact attached to a task, immutable once created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub kind: DocumentKind,
    /// Unix milliseconds
    pub created_at: i64,
}

impl Document {
    /// Create a new document
    pub fn new(title: impl Into<String>, content: impl Into<String>, kind: DocumentKind) -> Self {
        let title = title.into();
        Self {
            id: generate_id("doc", &title),
            title,
            content: content.into(),
            kind,
            created_at: now_ms(),
        }
    }
}

/// One feedback-driven revision attempt
///
/// `previous_result` is snapshotted before the revision runs, so a failed
/// attempt can never lose the last good result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Iteration {
    pub id: String,
    pub feedback: String,
    pub previous_result: String,
    pub new_result: Option<String>,
    /// Unix milliseconds
    pub timestamp: i64,
}

impl Iteration {
    /// Snapshot an iteration before the revision is attempted
    pub fn new(feedback: impl Into<String>, previous_result: impl Into<String>) -> Self {
        Self {
            id: generate_id("iter", "revision"),
            feedback: feedback.into(),
            previous_result: previous_result.into(),
            new_result: None,
            timestamp: now_ms(),
        }
    }
}

/// Top-level unit of work, owned by exactly one Team
///
/// Owns its SubTasks (by id) and Documents. Invariant: Completed implies a
/// result is present and progress is 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: String,

    /// Task title
    pub title: String,

    /// Natural-language description handed to the leader
    pub description: String,

    /// Owning team
    pub team_id: String,

    /// Current status
    #[serde(default)]
    pub status: Status,

    /// Progress percentage, 0..=100, monotonic within one execution pass
    #[serde(default)]
    pub progress: u8,

    /// Human-readable progress message
    #[serde(default)]
    pub status_message: String,

    /// Feedback history, one entry per iteration
    #[serde(default)]
    pub iterations: Vec<Iteration>,

    /// Number of iterations run; only ever increases
    #[serde(default)]
    pub iteration_count: u32,

    /// Aggregated result, present once Completed
    #[serde(default)]
    pub result: Option<String>,

    /// SubTasks in creation order
    #[serde(default)]
    pub subtask_ids: Vec<String>,

    /// Append-only document list
    #[serde(default)]
    pub documents: Vec<Document>,

    /// Append-only execution log
    #[serde(default)]
    pub logs: Vec<LogEntry>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Task {
    /// Create a new pending task
    pub fn new(title: impl Into<String>, description: impl Into<String>, team_id: impl Into<String>) -> Self {
        let title = title.into();
        let now = now_ms();
        Self {
            id: generate_id("task", &title),
            title,
            description: description.into(),
            team_id: team_id.into(),
            status: Status::Pending,
            progress: 0,
            status_message: String::new(),
            iterations: Vec::new(),
            iteration_count: 0,
            result: None,
            subtask_ids: Vec::new(),
            documents: Vec::new(),
            logs: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a log entry
    pub fn log(&mut self, message: impl Into<String>) {
        self.logs.push(LogEntry {
            timestamp: now_ms(),
            message: message.into(),
        });
        self.updated_at = now_ms();
    }

    /// Update the status
    pub fn set_status(&mut self, status: Status) {
        self.status = status;
        self.updated_at = now_ms();
    }

    /// Raise progress; values below the current progress are ignored so the
    /// bar never moves backwards within one pass.
    pub fn raise_progress(&mut self, progress: u8, message: impl Into<String>) {
        self.progress = self.progress.max(progress.min(100));
        self.status_message = message.into();
        self.updated_at = now_ms();
    }

    /// Append a document
    pub fn add_document(&mut self, document: Document) {
        self.documents.push(document);
        self.updated_at = now_ms();
    }

    /// Whether this task is in a terminal state for its current attempt
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl Record for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "tasks"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_new() {
        let task = Task::new("Build API", "Build a REST API", "team-1");
        assert!(task.id.contains("-task-"));
        assert_eq!(task.status, Status::Pending);
        assert_eq!(task.progress, 0);
        assert!(task.result.is_none());
        assert!(task.logs.is_empty());
    }

    #[test]
    fn test_log_appends() {
        let mut task = Task::new("t", "d", "team-1");
        task.log("first");
        task.log("second");
        assert_eq!(task.logs.len(), 2);
        assert_eq!(task.logs[1].message, "second");
    }

    #[test]
    fn test_raise_progress_is_monotonic() {
        let mut task = Task::new("t", "d", "team-1");
        task.raise_progress(50, "halfway");
        task.raise_progress(30, "stale update");
        assert_eq!(task.progress, 50);
        assert_eq!(task.status_message, "stale update");
        task.raise_progress(200, "overflow");
        assert_eq!(task.progress, 100);
    }

    #[test]
    fn test_document_kind_from_filename() {
        assert_eq!(DocumentKind::from_filename("README.md"), DocumentKind::Text);
        assert_eq!(DocumentKind::from_filename("notes.txt"), DocumentKind::Text);
        assert_eq!(DocumentKind::from_filename("main.py"), DocumentKind::Code);
        assert_eq!(DocumentKind::from_filename("index.html"), DocumentKind::Code);
    }

    #[test]
    fn test_iteration_snapshot() {
        let iteration = Iteration::new("make it faster", "previous answer");
        assert_eq!(iteration.previous_result, "previous answer");
        assert!(iteration.new_result.is_none());
    }

    #[test]
    fn test_task_serde_backfills_missing_fields() {
        // A record written before progress/logs/documents existed.
        let legacy = r#"{
            "id": "x-task-legacy",
            "title": "Legacy",
            "description": "old record",
            "team_id": "team-1",
            "created_at": 1,
            "updated_at": 1
        }"#;
        let task: Task = serde_json::from_str(legacy).unwrap();
        assert_eq!(task.status, Status::Pending);
        assert_eq!(task.progress, 0);
        assert!(task.logs.is_empty());
        assert!(task.documents.is_empty());
    }
}
