//! Crewd - Multi-Agent Team Task Orchestrator
//!
//! Crewd assigns a natural-language task to a team of role-tagged agents,
//! each a thin proxy for a language-model endpoint. The task is decomposed
//! into role-scoped subtasks, executed in dependency order behind a team
//! leader whose output seeds every other role's prompt, and watched by a
//! per-task liveness monitor that force-fails stalled runs.
//!
//! # Core Concepts
//!
//! - **Leader First**: the leader's full solution is generated before any
//!   other role runs; reviews are templated around it
//! - **Advisory Dependencies**: subtask dependencies order execution where
//!   resolvable but never block it
//! - **Recorded Failures**: a single agent's provider failure is written
//!   into its subtask and the pass continues
//! - **State in Files**: all entities persist as whole-state JSON
//!   collections through the teamstore crate
//!
//! # Modules
//!
//! - [`orchestrator`] - task state machine, executor, resolver, watchdog
//! - [`llm`] - completion provider port and Ollama implementation
//! - [`domain`] - Team, Agent, Task, SubTask, Document
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod llm;
pub mod orchestrator;

// Re-export commonly used types
pub use config::{Config, LlmConfig, StorageConfig, WatchdogConfig};
pub use domain::{Agent, Document, DocumentKind, LogEntry, RoleKind, Status, SubTask, Task, Team, select_leader};
pub use llm::{ChatMessage, GenerationRequest, LlmClient, LlmError, OllamaClient, create_client};
pub use orchestrator::{
    ActiveTaskView, ExecutionReport, IterationReport, Orchestrator, OrchestratorConfig, OrchestratorError,
    TaskStatusView, Watchdog, extract_artifacts, order_subtasks,
};
