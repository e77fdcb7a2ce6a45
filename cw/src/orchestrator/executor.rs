//! Subtask executor
//!
//! Runs one subtask against its assigned agent. Failures are recorded
//! outcomes, never faults: a missing agent or a provider error yields a
//! Failed outcome with a diagnostic text, and the orchestrator decides
//! whether siblings continue.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{Agent, Status, SubTask, Team};
use crate::llm::{GenerationRequest, LlmClient};

use super::prompts::{LEADER_SYSTEM, PromptLibrary};

/// The leader's already-extracted output, injected into role prompts
#[derive(Debug, Clone, Default)]
pub struct LeadContext {
    pub explanation: String,
    pub artifacts_preview: String,
}

/// Recorded result of one subtask run
#[derive(Debug, Clone)]
pub struct SubtaskOutcome {
    pub status: Status,
    pub text: String,
}

impl SubtaskOutcome {
    fn completed(text: String) -> Self {
        Self {
            status: Status::Completed,
            text,
        }
    }

    fn failed(text: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            text: text.into(),
        }
    }
}

/// Executes subtasks against the completion provider
pub struct SubtaskExecutor {
    llm: Arc<dyn LlmClient>,
    prompts: PromptLibrary,
    temperature: f32,
}

impl SubtaskExecutor {
    /// Create a new executor
    pub fn new(llm: Arc<dyn LlmClient>, temperature: f32) -> Self {
        Self {
            llm,
            prompts: PromptLibrary::new(),
            temperature,
        }
    }

    /// Run one subtask
    ///
    /// Without a lead context this is the leader pass: the agent is asked
    /// for a full solution with filename-tagged code blocks. With a lead
    /// context the agent reviews the leader's output from its role's
    /// perspective.
    pub async fn execute_one(
        &self,
        subtask: &SubTask,
        team: &Team,
        task_description: &str,
        lead: Option<&LeadContext>,
    ) -> SubtaskOutcome {
        debug!(subtask_id = %subtask.id, "execute_one: called");

        let Some(agent_id) = subtask.assigned_agent_id.as_deref() else {
            warn!(subtask_id = %subtask.id, "execute_one: subtask has no assigned agent");
            return SubtaskOutcome::failed("no agent assigned to this subtask");
        };

        let Some(agent) = team.agent(agent_id) else {
            warn!(subtask_id = %subtask.id, %agent_id, "execute_one: assigned agent not in team");
            return SubtaskOutcome::failed(format!("agent {} not found in team {}", agent_id, team.id));
        };

        let rendered = match lead {
            None => self.prompts.leader(task_description),
            Some(ctx) => self
                .prompts
                .role_review(agent.role, &agent.title, &ctx.explanation, &ctx.artifacts_preview),
        };

        let prompt = match rendered {
            Ok(prompt) => prompt,
            Err(e) => return SubtaskOutcome::failed(format!("prompt rendering failed: {}", e)),
        };

        let system_prompt = match lead {
            None => LEADER_SYSTEM.to_string(),
            Some(_) => agent.system_prompt.clone(),
        };

        self.generate(agent, prompt, system_prompt).await
    }

    /// Run a feedback-driven revision of a previous result
    pub async fn execute_revision(&self, agent: &Agent, previous_result: &str, feedback: &str) -> SubtaskOutcome {
        debug!(agent_id = %agent.id, "execute_revision: called");

        let prompt = match self.prompts.revision(previous_result, feedback) {
            Ok(prompt) => prompt,
            Err(e) => return SubtaskOutcome::failed(format!("prompt rendering failed: {}", e)),
        };

        self.generate(agent, prompt, agent.system_prompt.clone()).await
    }

    async fn generate(&self, agent: &Agent, prompt: String, system_prompt: String) -> SubtaskOutcome {
        let request = GenerationRequest::new(&agent.model, prompt)
            .with_system(system_prompt)
            .with_temperature(self.temperature);

        match self.llm.generate(request).await {
            Ok(text) => SubtaskOutcome::completed(text),
            Err(e) => {
                warn!(agent_id = %agent.id, model = %agent.model, error = %e, "generate: provider call failed");
                SubtaskOutcome::failed(format!("model call failed: {}", e))
            }
        }
    }
}
