//! Task Orchestrator - owns the Task/SubTask state machine
//!
//! Drives one execution pass per task: derive role subtasks when none
//! exist, run the leader first, extract its artifacts, run the remaining
//! subtasks in dependency order, and aggregate the results. Provider
//! failures on non-leader subtasks are recorded and execution continues;
//! a leader failure fails the task.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use teamstore::Store;

use crate::config::WatchdogConfig;
use crate::domain::{
    Agent, Document, DocumentKind, Iteration, LogEntry, RoleKind, Status, SubTask, Task, Team, select_leader,
};
use crate::llm::LlmClient;

use super::error::OrchestratorError;
use super::executor::{LeadContext, SubtaskExecutor, SubtaskOutcome};
use super::extract::extract_artifacts;
use super::resolver::order_subtasks;
use super::watchdog::Watchdog;

/// Coarse progress checkpoints, monotonic within one execution pass
const PROGRESS_STARTED: u8 = 10;
const PROGRESS_SUBTASKS_READY: u8 = 20;
const PROGRESS_LEADER_ANALYZING: u8 = 30;
const PROGRESS_GENERATING: u8 = 35;
const PROGRESS_LEADER_DONE: u8 = 50;
const PROGRESS_DOCUMENTS: u8 = 60;
const PROGRESS_ROLES_START: u8 = 70;
const PROGRESS_ROLES_SPAN: u8 = 20;

/// Character budget for the artifact preview embedded in role prompts
const ARTIFACT_PREVIEW_CHARS: usize = 1000;

/// Character budget for response excerpts in task logs
const LOG_SUMMARY_CHARS: usize = 150;

/// In-memory entity state shared between the orchestrator and watchdogs
#[derive(Debug, Default)]
pub struct Registry {
    pub(crate) teams: HashMap<String, Team>,
    pub(crate) tasks: HashMap<String, Task>,
    pub(crate) subtasks: HashMap<String, SubTask>,
}

impl Registry {
    /// Save all collections, best-effort (whole-state, last writer wins)
    pub(crate) fn save(&self, store: &Store) {
        if let Err(e) = store.save_collection(&self.teams) {
            warn!(error = %e, "Failed to save teams collection");
        }
        if let Err(e) = store.save_collection(&self.tasks) {
            warn!(error = %e, "Failed to save tasks collection");
        }
        if let Err(e) = store.save_collection(&self.subtasks) {
            warn!(error = %e, "Failed to save subtasks collection");
        }
    }
}

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Watchdog timing
    pub watchdog: WatchdogConfig,

    /// Sampling temperature for agent completions
    pub temperature: f32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            watchdog: WatchdogConfig::default(),
            temperature: 0.7,
        }
    }
}

/// Summary of one subtask in an execution report
#[derive(Debug, Clone, Serialize)]
pub struct SubtaskSummary {
    pub id: String,
    pub title: String,
    pub status: Status,
    pub assigned_agent_id: Option<String>,
}

/// Structured result of an execute call, returned even on failure
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub task_id: String,
    pub status: Status,
    pub progress: u8,
    pub result: Option<String>,
    pub subtasks: Vec<SubtaskSummary>,
}

/// Structured result of an iterate call
#[derive(Debug, Clone, Serialize)]
pub struct IterationReport {
    pub task_id: String,
    pub status: Status,
    pub iteration_count: u32,
    pub result: Option<String>,
    pub error: Option<String>,
}

/// Live status view of a task
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatusView {
    pub id: String,
    pub status: Status,
    pub progress: u8,
    pub status_message: String,
    pub is_active: bool,
    pub logs: Vec<LogEntry>,
    pub last_update: i64,
}

/// Entry in the active-task listing
#[derive(Debug, Clone, Serialize)]
pub struct ActiveTaskView {
    pub id: String,
    pub title: String,
    pub status: Status,
    pub progress: u8,
    pub status_message: String,
    pub team_id: String,
    pub started_at: i64,
    pub last_update: i64,
}

/// The Task Orchestrator
pub struct Orchestrator {
    registry: Arc<RwLock<Registry>>,
    store: Arc<Store>,
    executor: SubtaskExecutor,
    watchdog: Watchdog,
}

impl Orchestrator {
    /// Create an orchestrator, loading all entity state from the store
    pub fn new(store: Store, llm: Arc<dyn LlmClient>, config: OrchestratorConfig) -> Result<Self, OrchestratorError> {
        let teams = store.load_collection::<Team>()?;
        let tasks = store.load_collection::<Task>()?;
        let subtasks = store.load_collection::<SubTask>()?;

        info!(
            teams = teams.len(),
            tasks = tasks.len(),
            subtasks = subtasks.len(),
            "Orchestrator loaded state"
        );

        Ok(Self {
            registry: Arc::new(RwLock::new(Registry { teams, tasks, subtasks })),
            store: Arc::new(store),
            executor: SubtaskExecutor::new(llm, config.temperature),
            watchdog: Watchdog::new(config.watchdog),
        })
    }

    // === Team and task CRUD ===

    /// Create a new team
    pub async fn create_team(&self, name: &str, description: Option<&str>) -> Result<String, OrchestratorError> {
        debug!(%name, "create_team: called");
        if name.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput("team name must not be empty".to_string()));
        }

        let description = description
            .filter(|d| !d.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Description for {}", name.trim()));

        let team = Team::new(name.trim(), description);
        let team_id = team.id.clone();
        self.registry.write().await.teams.insert(team_id.clone(), team);
        self.persist().await;

        info!(%team_id, "create_team: team created");
        Ok(team_id)
    }

    /// Add an agent to a team
    pub async fn add_agent(
        &self,
        team_id: &str,
        name: &str,
        role_title: &str,
        model: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, OrchestratorError> {
        debug!(%team_id, %name, %role_title, "add_agent: called");
        if name.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput("agent name must not be empty".to_string()));
        }
        if model.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput("model name must not be empty".to_string()));
        }

        let mut agent = Agent::new(name.trim(), role_title, model.trim());
        if let Some(prompt) = system_prompt {
            agent = agent.with_system_prompt(prompt);
        }
        let agent_id = agent.id.clone();

        {
            let mut registry = self.registry.write().await;
            let team = registry
                .teams
                .get_mut(team_id)
                .ok_or_else(|| OrchestratorError::NotFound(format!("team {}", team_id)))?;
            team.add_agent(agent);
        }
        self.persist().await;

        info!(%agent_id, %team_id, "add_agent: agent added");
        Ok(agent_id)
    }

    /// Create a new pending task
    pub async fn create_task(&self, team_id: &str, title: &str, description: &str) -> Result<String, OrchestratorError> {
        debug!(%team_id, %title, "create_task: called");

        let mut registry = self.registry.write().await;
        if !registry.teams.contains_key(team_id) {
            return Err(OrchestratorError::NotFound(format!("team {}", team_id)));
        }

        let task = Task::new(title, description, team_id);
        let task_id = task.id.clone();
        registry.tasks.insert(task_id.clone(), task);
        if let Some(team) = registry.teams.get_mut(team_id) {
            team.add_task_id(&task_id);
        }
        drop(registry);
        self.persist().await;

        info!(%task_id, %team_id, "create_task: task created");
        Ok(task_id)
    }

    /// Create a subtask under a task
    ///
    /// Dependencies are advisory ordering hints; they are stored as given
    /// and only consulted at execution time.
    pub async fn create_subtask(
        &self,
        parent_task_id: &str,
        title: &str,
        description: &str,
        assigned_agent_id: Option<&str>,
        dependencies: Vec<String>,
    ) -> Result<String, OrchestratorError> {
        debug!(%parent_task_id, %title, "create_subtask: called");

        let mut registry = self.registry.write().await;
        let team_id = registry
            .tasks
            .get(parent_task_id)
            .map(|t| t.team_id.clone())
            .ok_or_else(|| OrchestratorError::NotFound(format!("task {}", parent_task_id)))?;

        if let Some(agent_id) = assigned_agent_id {
            let known = registry
                .teams
                .get(&team_id)
                .map(|team| team.agent(agent_id).is_some())
                .unwrap_or(false);
            if !known {
                return Err(OrchestratorError::NotFound(format!("agent {}", agent_id)));
            }
        }

        let mut subtask = SubTask::new(parent_task_id, title, description).with_dependencies(dependencies);
        if let Some(agent_id) = assigned_agent_id {
            subtask = subtask.with_agent(agent_id);
        }
        let subtask_id = subtask.id.clone();

        registry.subtasks.insert(subtask_id.clone(), subtask);
        if let Some(task) = registry.tasks.get_mut(parent_task_id) {
            task.subtask_ids.push(subtask_id.clone());
        }
        drop(registry);
        self.persist().await;

        Ok(subtask_id)
    }

    /// Get a team by id
    pub async fn get_team(&self, team_id: &str) -> Result<Team, OrchestratorError> {
        let registry = self.registry.read().await;
        registry
            .teams
            .get(team_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::NotFound(format!("team {}", team_id)))
    }

    /// Get a task by id
    pub async fn get_task(&self, task_id: &str) -> Result<Task, OrchestratorError> {
        let registry = self.registry.read().await;
        registry
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::NotFound(format!("task {}", task_id)))
    }

    /// Get a subtask by id
    pub async fn get_subtask(&self, subtask_id: &str) -> Result<SubTask, OrchestratorError> {
        let registry = self.registry.read().await;
        registry
            .subtasks
            .get(subtask_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::NotFound(format!("subtask {}", subtask_id)))
    }

    /// List all teams, oldest first
    pub async fn list_teams(&self) -> Vec<Team> {
        let registry = self.registry.read().await;
        let mut teams: Vec<Team> = registry.teams.values().cloned().collect();
        teams.sort_by_key(|t| t.created_at);
        teams
    }

    /// List tasks, optionally restricted to one team, oldest first
    pub async fn list_tasks(&self, team_id: Option<&str>) -> Vec<Task> {
        let registry = self.registry.read().await;
        let mut tasks: Vec<Task> = registry
            .tasks
            .values()
            .filter(|t| team_id.is_none_or(|id| t.team_id == id))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }

    /// Delete a team and, best-effort, its tasks and subtasks
    pub async fn delete_team(&self, team_id: &str) -> bool {
        debug!(%team_id, "delete_team: called");
        let task_ids = {
            let mut registry = self.registry.write().await;
            if registry.teams.remove(team_id).is_none() {
                return false;
            }

            let task_ids: Vec<String> = registry
                .tasks
                .values()
                .filter(|t| t.team_id == team_id)
                .map(|t| t.id.clone())
                .collect();
            for task_id in &task_ids {
                registry.subtasks.retain(|_, s| &s.parent_task_id != task_id);
                registry.tasks.remove(task_id);
            }
            task_ids
        };

        for task_id in &task_ids {
            self.watchdog.deregister(task_id).await;
        }
        self.persist().await;
        info!(%team_id, cascaded_tasks = task_ids.len(), "delete_team: team deleted");
        true
    }

    /// Delete a task and, best-effort, its subtasks
    pub async fn delete_task(&self, task_id: &str) -> bool {
        debug!(%task_id, "delete_task: called");
        {
            let mut registry = self.registry.write().await;
            let Some(task) = registry.tasks.remove(task_id) else {
                return false;
            };
            registry.subtasks.retain(|_, s| s.parent_task_id != task_id);
            if let Some(team) = registry.teams.get_mut(&task.team_id) {
                team.remove_task_id(task_id);
            }
        }

        self.watchdog.deregister(task_id).await;
        self.persist().await;
        true
    }

    // === Execution ===

    /// Execute a task to completion
    ///
    /// Always returns a structured report; provider failures surface in the
    /// report's status, never as an error. Errors are reserved for unknown
    /// ids and invalid states (double start, empty team).
    pub async fn execute(&self, task_id: &str) -> Result<ExecutionReport, OrchestratorError> {
        info!(%task_id, "execute: called");

        let team = self.claim_task(task_id).await?;

        // The watchdog is armed before any provider work happens.
        self.watchdog.register(task_id).await;
        let _monitor =
            self.watchdog
                .spawn_monitor(task_id.to_string(), Arc::clone(&self.registry), Arc::clone(&self.store));
        self.persist().await;

        match self.run_pipeline(task_id, &team).await {
            Ok(Some(result)) => self.complete_task(task_id, result).await,
            Ok(None) => {
                info!(%task_id, "execute: task cancelled during execution");
                self.watchdog.deregister(task_id).await;
            }
            Err(e) => self.fail_task(task_id, &e.to_string()).await,
        }

        self.report(task_id).await
    }

    /// Validate and claim the task under one write lock
    async fn claim_task(&self, task_id: &str) -> Result<Team, OrchestratorError> {
        let mut registry = self.registry.write().await;

        let (team_id, prior_status, title, subtask_ids) = {
            let task = registry
                .tasks
                .get(task_id)
                .ok_or_else(|| OrchestratorError::NotFound(format!("task {}", task_id)))?;
            (task.team_id.clone(), task.status, task.title.clone(), task.subtask_ids.clone())
        };

        if prior_status == Status::InProgress {
            return Err(OrchestratorError::InvalidState(format!(
                "task {} is already running",
                task_id
            )));
        }

        let team = registry
            .teams
            .get(&team_id)
            .ok_or_else(|| OrchestratorError::NotFound(format!("team {}", team_id)))?
            .clone();
        if team.agents.is_empty() {
            return Err(OrchestratorError::InvalidState(format!(
                "team {} has no agents to run the task",
                team_id
            )));
        }

        if let Some(task) = registry.tasks.get_mut(task_id) {
            task.set_status(Status::InProgress);
            task.progress = 0;
            task.status_message = "Starting".to_string();
            task.log(format!("Task started - \"{}\"", title));
        }

        // A completed task may run again; its subtasks start over but keep
        // their previous answers.
        if prior_status == Status::Completed {
            for subtask_id in &subtask_ids {
                if let Some(subtask) = registry.subtasks.get_mut(subtask_id) {
                    subtask.reset_for_rerun();
                }
            }
            if let Some(task) = registry.tasks.get_mut(task_id) {
                task.log(format!("Restarting {} existing subtask(s)", subtask_ids.len()));
            }
        }

        Ok(team)
    }

    /// One full execution pass; Ok(None) means the task was cancelled
    async fn run_pipeline(&self, task_id: &str, team: &Team) -> eyre::Result<Option<String>> {
        let leader = select_leader(team)
            .ok_or_else(|| eyre::eyre!("team {} has no agents", team.id))?
            .clone();

        let (task_title, task_description) = {
            let registry = self.registry.read().await;
            let task = registry
                .tasks
                .get(task_id)
                .ok_or_else(|| eyre::eyre!("task {} disappeared", task_id))?;
            (task.title.clone(), task.description.clone())
        };

        self.update_progress(task_id, PROGRESS_STARTED, &format!("Task started. Team leader: {}", leader.name))
            .await;
        self.log_task(task_id, format!("Team leader {} took over coordination", leader.name))
            .await;

        self.ensure_subtasks(task_id, team, &leader, &task_title).await;
        self.update_progress(task_id, PROGRESS_SUBTASKS_READY, "Subtasks prepared, agents starting work")
            .await;

        // The leader's subtask runs first and is a hard dependency for all
        // the others, whatever their declared dependencies say.
        let leader_subtask = self.ensure_leader_subtask(task_id, &leader, &task_title).await;
        self.set_subtask_status(&leader_subtask.id, Status::InProgress).await;
        self.log_task(task_id, format!("Team leader ({}) started working on the task", leader.name))
            .await;
        self.update_progress(
            task_id,
            PROGRESS_LEADER_ANALYZING,
            &format!("Team leader ({}) is analyzing the task", leader.name),
        )
        .await;

        self.log_task(task_id, format!("Generating task analysis with model \"{}\"", leader.model))
            .await;
        self.update_progress(task_id, PROGRESS_GENERATING, "Model is generating a response")
            .await;

        let outcome = self.executor.execute_one(&leader_subtask, team, &task_description, None).await;
        if self.is_cancelled(task_id).await {
            // The in-flight leader result of a cancelled task is discarded.
            return Ok(None);
        }
        self.record_subtask_outcome(&leader_subtask.id, &outcome).await;
        if outcome.status != Status::Completed {
            eyre::bail!("leader generation failed: {}", outcome.text);
        }

        self.update_progress(
            task_id,
            PROGRESS_LEADER_DONE,
            &format!("Team leader ({}) produced a response, extracting code", leader.name),
        )
        .await;
        self.log_task(task_id, format!("Team leader response: {}", excerpt(&outcome.text)))
            .await;

        let extraction = extract_artifacts(&outcome.text);
        self.log_task(task_id, format!("{} code file(s) extracted", extraction.artifacts.len()))
            .await;

        // Materialize one document per artifact.
        self.update_progress(task_id, PROGRESS_DOCUMENTS, "Creating code documents").await;
        {
            let mut registry = self.registry.write().await;
            if let Some(task) = registry.tasks.get_mut(task_id) {
                for artifact in &extraction.artifacts {
                    let kind = DocumentKind::from_filename(&artifact.name);
                    task.add_document(Document::new(&artifact.name, &artifact.content, kind));
                    task.log(format!("Document created: {}", artifact.name));
                }
            }
        }
        self.persist().await;

        self.update_progress(
            task_id,
            PROGRESS_ROLES_START,
            "Code documents created, remaining agents starting",
        )
        .await;

        let lead_ctx = LeadContext {
            explanation: extraction.explanation.clone(),
            artifacts_preview: extraction.preview(ARTIFACT_PREVIEW_CHARS),
        };

        // Remaining subtasks honor the dependency order where resolvable.
        let remaining: Vec<SubTask> = {
            let registry = self.registry.read().await;
            let ids = registry
                .tasks
                .get(task_id)
                .map(|t| t.subtask_ids.clone())
                .unwrap_or_default();
            ids.iter()
                .filter_map(|id| registry.subtasks.get(id))
                .filter(|s| s.status != Status::Completed)
                .cloned()
                .collect()
        };
        let order = order_subtasks(&remaining);
        let total = order.len().max(1);

        for (step, &idx) in order.iter().enumerate() {
            let subtask = &remaining[idx];

            if self.is_cancelled(task_id).await {
                return Ok(None);
            }

            self.warn_unmet_dependencies(task_id, subtask).await;

            let agent_name = subtask
                .assigned_agent_id
                .as_deref()
                .and_then(|id| team.agent(id))
                .map(|a| a.name.clone())
                .unwrap_or_else(|| "unassigned".to_string());

            self.set_subtask_status(&subtask.id, Status::InProgress).await;
            let progress = PROGRESS_ROLES_START + (PROGRESS_ROLES_SPAN as usize * (step + 1) / total) as u8;
            self.update_progress(
                task_id,
                progress,
                &format!("Working on subtask \"{}\" - {}", subtask.title, agent_name),
            )
            .await;
            self.log_task(task_id, format!("Subtask \"{}\" started - agent: {}", subtask.title, agent_name))
                .await;

            let outcome = self.executor.execute_one(subtask, team, &task_description, Some(&lead_ctx)).await;

            if self.is_cancelled(task_id).await {
                // A subtask already awaiting the model is allowed to finish,
                // but its result is discarded.
                return Ok(None);
            }

            self.record_subtask_outcome(&subtask.id, &outcome).await;

            if outcome.status == Status::Completed {
                let role_title = subtask
                    .assigned_agent_id
                    .as_deref()
                    .and_then(|id| team.agent(id))
                    .map(|a| a.role.to_string())
                    .unwrap_or_else(|| RoleKind::General.to_string());

                let mut registry = self.registry.write().await;
                if let Some(task) = registry.tasks.get_mut(task_id) {
                    task.add_document(Document::new(
                        format!("{}_output.md", role_title),
                        &outcome.text,
                        DocumentKind::Text,
                    ));
                    task.log(format!("Agent {} produced a response and a document was created", agent_name));
                }
            } else {
                // A single agent's failure must not stop the remaining roles.
                self.log_task(task_id, format!("Subtask \"{}\" failed: {}", subtask.title, outcome.text))
                    .await;
            }
            self.persist().await;
        }

        // Summary documents: a README from the explanation and a listing of
        // the artifact filenames.
        {
            let mut registry = self.registry.write().await;
            if let Some(task) = registry.tasks.get_mut(task_id) {
                if !extraction.explanation.is_empty() {
                    task.add_document(Document::new("README.md", &extraction.explanation, DocumentKind::Text));
                    task.log("README document created");
                }

                let mut structure = String::from("# Project Structure\n\n```\n");
                for artifact in &extraction.artifacts {
                    structure.push_str(&format!("├── {}\n", artifact.name));
                }
                structure.push_str("```\n");
                task.add_document(Document::new("project_structure.md", structure, DocumentKind::Text));
                task.log("Project structure document created");
            }
        }
        self.persist().await;

        let mut artifact_map = serde_json::Map::new();
        for artifact in &extraction.artifacts {
            artifact_map.insert(artifact.name.clone(), serde_json::Value::String(artifact.content.clone()));
        }
        let result = serde_json::json!({
            "explanation": extraction.explanation,
            "artifacts": artifact_map,
        });

        Ok(Some(result.to_string()))
    }

    /// Derive one subtask per distinct specialist role when the task has
    /// none; a team without specialists gets a single general subtask
    /// assigned to the leader.
    async fn ensure_subtasks(&self, task_id: &str, team: &Team, leader: &Agent, task_title: &str) {
        let existing = {
            let registry = self.registry.read().await;
            registry.tasks.get(task_id).map(|t| t.subtask_ids.len()).unwrap_or(0)
        };
        if existing > 0 {
            self.log_task(task_id, format!("Found {} existing subtask(s)", existing)).await;
            return;
        }

        let mut derived: Vec<SubTask> = Vec::new();
        let mut seen: HashSet<RoleKind> = HashSet::new();

        for agent in &team.agents {
            let (title, description) = match agent.role {
                RoleKind::Architect => (
                    "Architecture Planning",
                    format!("Architectural design for the '{}' project", task_title),
                ),
                RoleKind::Developer => (
                    "Code Development",
                    format!("Code development for the '{}' project", task_title),
                ),
                RoleKind::Tester => (
                    "Test Scenarios",
                    format!("Test scenarios for the '{}' project", task_title),
                ),
                RoleKind::Designer => (
                    "User Interface Design",
                    format!("User interface design for the '{}' project", task_title),
                ),
                RoleKind::Lead | RoleKind::General => continue,
            };
            if !seen.insert(agent.role) {
                continue;
            }
            derived.push(SubTask::new(task_id, title, description).with_agent(&agent.id));
        }

        if derived.is_empty() {
            derived.push(
                SubTask::new(
                    task_id,
                    "General Development",
                    format!("General development for the '{}' project", task_title),
                )
                .with_agent(&leader.id),
            );
        }

        {
            let mut registry = self.registry.write().await;
            for subtask in derived {
                let agent_name = team
                    .agent(subtask.assigned_agent_id.as_deref().unwrap_or_default())
                    .map(|a| a.name.clone())
                    .unwrap_or_default();
                if let Some(task) = registry.tasks.get_mut(task_id) {
                    task.subtask_ids.push(subtask.id.clone());
                    task.log(format!("Subtask created: \"{}\" - agent: {}", subtask.title, agent_name));
                }
                registry.subtasks.insert(subtask.id.clone(), subtask);
            }
        }
        self.persist().await;
    }

    /// Find the leader's subtask, creating a coordination subtask if the
    /// leader has none
    async fn ensure_leader_subtask(&self, task_id: &str, leader: &Agent, task_title: &str) -> SubTask {
        {
            let registry = self.registry.read().await;
            if let Some(task) = registry.tasks.get(task_id) {
                for id in &task.subtask_ids {
                    if let Some(subtask) = registry.subtasks.get(id) {
                        if subtask.assigned_agent_id.as_deref() == Some(leader.id.as_str()) {
                            return subtask.clone();
                        }
                    }
                }
            }
        }

        let subtask = SubTask::new(
            task_id,
            "Task Analysis and Coordination",
            format!("Analysis and coordination of the '{}' project", task_title),
        )
        .with_agent(&leader.id);

        {
            let mut registry = self.registry.write().await;
            registry.subtasks.insert(subtask.id.clone(), subtask.clone());
            if let Some(task) = registry.tasks.get_mut(task_id) {
                task.subtask_ids.push(subtask.id.clone());
                task.log("Subtask created for the team leader: \"Task Analysis and Coordination\"");
            }
        }
        self.persist().await;
        subtask
    }

    /// Log a warning when a subtask runs before its declared dependencies
    /// have completed; the dependency stays advisory so a failed upstream
    /// subtask can never deadlock the pass.
    async fn warn_unmet_dependencies(&self, task_id: &str, subtask: &SubTask) {
        let unmet: Vec<String> = {
            let registry = self.registry.read().await;
            subtask
                .dependencies
                .iter()
                .filter(|dep| {
                    registry
                        .subtasks
                        .get(*dep)
                        .map(|d| d.status != Status::Completed)
                        .unwrap_or(false)
                })
                .cloned()
                .collect()
        };

        if !unmet.is_empty() {
            warn!(subtask_id = %subtask.id, ?unmet, "executing subtask with unmet dependencies");
            self.log_task(
                task_id,
                format!("Subtask \"{}\" running with unmet dependencies: {}", subtask.title, unmet.join(", ")),
            )
            .await;
        }
    }

    // === Iteration ===

    /// Re-run a completed task's result through a revision agent
    ///
    /// The prior result is snapshotted into the iteration history before
    /// the revision is attempted, so a failed revision never loses it.
    pub async fn iterate(&self, task_id: &str, feedback: &str) -> Result<IterationReport, OrchestratorError> {
        info!(%task_id, "iterate: called");

        let (agent, previous_result, iteration_count) = {
            let mut registry = self.registry.write().await;

            let (status, team_id, previous) = {
                let task = registry
                    .tasks
                    .get(task_id)
                    .ok_or_else(|| OrchestratorError::NotFound(format!("task {}", task_id)))?;
                (task.status, task.team_id.clone(), task.result.clone())
            };

            if status != Status::Completed {
                return Err(OrchestratorError::InvalidState(format!(
                    "only completed tasks can be iterated, task {} is {}",
                    task_id, status
                )));
            }
            let previous = previous.ok_or_else(|| {
                OrchestratorError::InvalidState(format!("task {} has no result to revise", task_id))
            })?;

            let team = registry
                .teams
                .get(&team_id)
                .ok_or_else(|| OrchestratorError::NotFound(format!("team {}", team_id)))?;
            let agent = revision_agent(team)
                .ok_or_else(|| OrchestratorError::InvalidState(format!("team {} has no agents", team_id)))?
                .clone();

            let mut iteration_count = 0;
            if let Some(task) = registry.tasks.get_mut(task_id) {
                task.iterations.push(Iteration::new(feedback, &previous));
                task.iteration_count += 1;
                iteration_count = task.iteration_count;
                task.set_status(Status::InProgress);
                task.status_message = "Revising previous result".to_string();
                task.log(format!("Iteration {} started", task.iteration_count));
            }

            (agent, previous, iteration_count)
        };
        self.persist().await;

        let outcome = self.executor.execute_revision(&agent, &previous_result, feedback).await;

        let report = {
            let mut registry = self.registry.write().await;
            let task = registry
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| OrchestratorError::NotFound(format!("task {}", task_id)))?;

            if outcome.status == Status::Completed {
                if let Some(last) = task.iterations.last_mut() {
                    last.new_result = Some(outcome.text.clone());
                }
                task.result = Some(outcome.text.clone());
                task.set_status(Status::Completed);
                task.status_message = "Completed".to_string();
                task.log("Iteration completed successfully");

                IterationReport {
                    task_id: task_id.to_string(),
                    status: Status::Completed,
                    iteration_count,
                    result: task.result.clone(),
                    error: None,
                }
            } else {
                // The last good result survives the failed revision.
                task.result = Some(previous_result.clone());
                task.set_status(Status::Failed);
                task.status_message = format!("Failed: {}", outcome.text);
                task.log(format!("ERROR: iteration failed: {}", outcome.text));

                IterationReport {
                    task_id: task_id.to_string(),
                    status: Status::Failed,
                    iteration_count,
                    result: Some(previous_result.clone()),
                    error: Some(outcome.text.clone()),
                }
            }
        };
        self.persist().await;

        Ok(report)
    }

    // === Cancellation and status ===

    /// Cancel a running task; returns false when the task is not in progress
    pub async fn cancel(&self, task_id: &str) -> Result<bool, OrchestratorError> {
        info!(%task_id, "cancel: called");

        let cancelled = {
            let mut registry = self.registry.write().await;
            let task = registry
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| OrchestratorError::NotFound(format!("task {}", task_id)))?;

            if task.status == Status::InProgress {
                task.set_status(Status::Cancelled);
                task.status_message = "Cancelled".to_string();
                task.log("Task was cancelled by the user.");
                true
            } else {
                false
            }
        };

        if cancelled {
            self.watchdog.deregister(task_id).await;
            self.persist().await;
        }

        Ok(cancelled)
    }

    /// Live status of one task
    pub async fn get_status(&self, task_id: &str) -> Result<TaskStatusView, OrchestratorError> {
        let is_active = self.watchdog.is_active(task_id).await;
        let registry = self.registry.read().await;
        let task = registry
            .tasks
            .get(task_id)
            .ok_or_else(|| OrchestratorError::NotFound(format!("task {}", task_id)))?;

        Ok(TaskStatusView {
            id: task.id.clone(),
            status: task.status,
            progress: task.progress,
            status_message: task.status_message.clone(),
            is_active,
            logs: task.logs.clone(),
            last_update: task.updated_at,
        })
    }

    /// All currently active tasks
    pub async fn list_active(&self) -> Vec<ActiveTaskView> {
        let ids = self.watchdog.active_ids().await;
        let mut pairs = Vec::new();
        for id in ids {
            if let Some(activity) = self.watchdog.activity(&id).await {
                pairs.push((id, activity));
            }
        }

        let registry = self.registry.read().await;
        let mut views: Vec<ActiveTaskView> = pairs
            .into_iter()
            .filter_map(|(id, activity)| {
                registry.tasks.get(&id).map(|task| ActiveTaskView {
                    id: task.id.clone(),
                    title: task.title.clone(),
                    status: task.status,
                    progress: task.progress,
                    status_message: task.status_message.clone(),
                    team_id: task.team_id.clone(),
                    started_at: activity.started_at,
                    last_update: activity.last_update,
                })
            })
            .collect();
        views.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        views
    }

    // === Internals ===

    /// Report progress: raises the bar, logs, and feeds the watchdog
    async fn update_progress(&self, task_id: &str, progress: u8, message: &str) {
        {
            let mut registry = self.registry.write().await;
            if let Some(task) = registry.tasks.get_mut(task_id) {
                task.raise_progress(progress, message);
                task.log(format!("Progress: {} ({}%)", message, progress));
            }
        }
        self.watchdog.beat(task_id).await;
        self.persist().await;
    }

    async fn log_task(&self, task_id: &str, message: String) {
        let mut registry = self.registry.write().await;
        if let Some(task) = registry.tasks.get_mut(task_id) {
            task.log(message);
        }
    }

    async fn set_subtask_status(&self, subtask_id: &str, status: Status) {
        let mut registry = self.registry.write().await;
        if let Some(subtask) = registry.subtasks.get_mut(subtask_id) {
            subtask.set_status(status);
        }
    }

    async fn record_subtask_outcome(&self, subtask_id: &str, outcome: &SubtaskOutcome) {
        let mut registry = self.registry.write().await;
        if let Some(subtask) = registry.subtasks.get_mut(subtask_id) {
            subtask.record_result(outcome.status, outcome.text.clone());
        }
    }

    async fn is_cancelled(&self, task_id: &str) -> bool {
        let registry = self.registry.read().await;
        registry
            .tasks
            .get(task_id)
            .map(|t| t.status == Status::Cancelled)
            .unwrap_or(false)
    }

    async fn complete_task(&self, task_id: &str, result: String) {
        {
            let mut registry = self.registry.write().await;
            if let Some(task) = registry.tasks.get_mut(task_id) {
                // Only a still-running task completes; a concurrent cancel or
                // watchdog kill is final.
                if task.status == Status::InProgress {
                    task.result = Some(result);
                    task.set_status(Status::Completed);
                    task.progress = 100;
                    task.status_message = "Completed".to_string();
                    task.log("All subtasks finished, task completed successfully");
                }
            }
        }
        self.watchdog.deregister(task_id).await;
        self.persist().await;
        info!(%task_id, "complete_task: task completed");
    }

    async fn fail_task(&self, task_id: &str, message: &str) {
        {
            let mut registry = self.registry.write().await;
            if let Some(task) = registry.tasks.get_mut(task_id) {
                if task.status == Status::InProgress {
                    task.set_status(Status::Failed);
                    task.status_message = format!("Failed: {}", message);
                    task.log(format!("ERROR: {}", message));
                }
            }
        }
        self.watchdog.deregister(task_id).await;
        self.persist().await;
        error!(%task_id, %message, "fail_task: task failed");
    }

    async fn report(&self, task_id: &str) -> Result<ExecutionReport, OrchestratorError> {
        let registry = self.registry.read().await;
        let task = registry
            .tasks
            .get(task_id)
            .ok_or_else(|| OrchestratorError::NotFound(format!("task {}", task_id)))?;

        let subtasks = task
            .subtask_ids
            .iter()
            .filter_map(|id| registry.subtasks.get(id))
            .map(|s| SubtaskSummary {
                id: s.id.clone(),
                title: s.title.clone(),
                status: s.status,
                assigned_agent_id: s.assigned_agent_id.clone(),
            })
            .collect();

        Ok(ExecutionReport {
            task_id: task.id.clone(),
            status: task.status,
            progress: task.progress,
            result: task.result.clone(),
            subtasks,
        })
    }

    async fn persist(&self) {
        let registry = self.registry.read().await;
        registry.save(&self.store);
    }
}

/// Agent preferred for revisions: an architect if the team has one, then a
/// lead, then the first agent
fn revision_agent(team: &Team) -> Option<&Agent> {
    team.agents
        .iter()
        .find(|a| a.role == RoleKind::Architect)
        .or_else(|| team.agents.iter().find(|a| a.role == RoleKind::Lead))
        .or_else(|| team.agents.first())
}

/// Short excerpt of a model response for the task log
fn excerpt(text: &str) -> String {
    if text.chars().count() <= LOG_SUMMARY_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(LOG_SUMMARY_CHARS).collect();
    format!("{}...", cut)
}
