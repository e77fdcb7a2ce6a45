//! Team - ordered collection of Agents collaborating on Tasks

use serde::{Deserialize, Serialize};
use teamstore::{Record, now_ms};

use super::agent::{Agent, RoleKind};
use super::id::generate_id;

/// A team owning its agents
///
/// Deleting a team removes its agents and (best-effort) its tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    /// Unique identifier
    pub id: String,

    /// Team name
    pub name: String,

    /// Team description
    pub description: String,

    /// Agents in creation order
    #[serde(default)]
    pub agents: Vec<Agent>,

    /// Tasks belonging to this team
    #[serde(default)]
    pub task_ids: Vec<String>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Team {
    /// Create a new team
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        let now = now_ms();
        Self {
            id: generate_id("team", &name),
            name,
            description: description.into(),
            agents: Vec::new(),
            task_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add an agent to the team
    pub fn add_agent(&mut self, agent: Agent) {
        self.agents.push(agent);
        self.updated_at = now_ms();
    }

    /// Look up an agent by id
    pub fn agent(&self, agent_id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == agent_id)
    }

    /// Record a task as belonging to this team
    pub fn add_task_id(&mut self, task_id: impl Into<String>) {
        self.task_ids.push(task_id.into());
        self.updated_at = now_ms();
    }

    /// Forget a task id (best-effort, absent ids are fine)
    pub fn remove_task_id(&mut self, task_id: &str) {
        self.task_ids.retain(|id| id != task_id);
        self.updated_at = now_ms();
    }
}

impl Record for Team {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "teams"
    }
}

/// Select the team leader for a run
///
/// The first agent classified as Lead wins; otherwise the first agent.
/// Returns None only for an empty team. The leader is a per-run heuristic,
/// never a stored field.
pub fn select_leader(team: &Team) -> Option<&Agent> {
    team.agents
        .iter()
        .find(|a| a.role == RoleKind::Lead)
        .or_else(|| team.agents.first())
}
