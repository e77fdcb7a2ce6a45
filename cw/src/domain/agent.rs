//! Agent - a role-bound proxy for a language-model endpoint

use serde::{Deserialize, Serialize};
use teamstore::now_ms;

use super::id::generate_id;

/// Classified agent role
///
/// Free-text role titles are mapped onto this enum once, when the agent is
/// created, so every later dispatch is an exhaustive match instead of
/// repeated string sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    /// Team lead / coordinator
    Lead,
    /// Software architect
    Architect,
    /// Developer / engineer / programmer
    Developer,
    /// Tester / QA
    Tester,
    /// UI / UX designer
    Designer,
    /// Any other role
    #[default]
    General,
}

impl RoleKind {
    /// Classify a free-text role title
    pub fn classify(title: &str) -> Self {
        let lower = title.to_lowercase();
        if lower.contains("lead") || lower.contains("senior") {
            Self::Lead
        } else if lower.contains("architect") {
            Self::Architect
        } else if lower.contains("develop")
            || lower.contains("program")
            || lower.contains("engineer")
            || lower.contains("coder")
        {
            Self::Developer
        } else if lower.contains("test") || lower.contains("qa") {
            Self::Tester
        } else if lower.contains("ui") || lower.contains("design") || lower.contains("ux") {
            Self::Designer
        } else {
            Self::General
        }
    }

    /// Default system prompt for agents created without one
    pub fn default_system_prompt(&self, title: &str) -> String {
        match self {
            Self::Lead => format!(
                "You are an experienced {} coordinating a development team. \
                 Analyze tasks thoroughly and produce complete, working solutions.",
                title
            ),
            Self::Architect => format!(
                "You are a {} with deep experience in software architecture. \
                 Evaluate designs for structure, scalability and maintainability.",
                title
            ),
            Self::Developer => format!(
                "You are a {} who writes complete, working, high-quality code. \
                 Solve tasks step by step and implement every file fully.",
                title
            ),
            Self::Tester => format!(
                "You are a {} specializing in test strategy and coverage. \
                 Design thorough, reproducible test scenarios.",
                title
            ),
            Self::Designer => format!(
                "You are a {} focused on clear, usable interfaces. \
                 Produce concrete, implementable design output.",
                title
            ),
            Self::General => format!(
                "You are working as a {}. Act according to this role and \
                 produce high-quality results for every task you are given.",
                title
            ),
        }
    }
}

impl std::fmt::Display for RoleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lead => write!(f, "lead"),
            Self::Architect => write!(f, "architect"),
            Self::Developer => write!(f, "developer"),
            Self::Tester => write!(f, "tester"),
            Self::Designer => write!(f, "designer"),
            Self::General => write!(f, "general"),
        }
    }
}

/// A named, role-bound proxy for a language-model endpoint
///
/// Owned by exactly one Team. Immutable after creation except for the
/// role-derived system prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier
    pub id: String,

    /// Agent name
    pub name: String,

    /// Free-text role title as supplied by the caller
    pub title: String,

    /// Classified role used for dispatch
    pub role: RoleKind,

    /// Model identifier passed to the completion provider
    pub model: String,

    /// System prompt used for this agent's completions
    pub system_prompt: String,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl Agent {
    /// Create a new agent, classifying its role from the title
    pub fn new(name: impl Into<String>, title: impl Into<String>, model: impl Into<String>) -> Self {
        let name = name.into();
        let title = title.into();
        let role = RoleKind::classify(&title);
        Self {
            id: generate_id("agent", &name),
            system_prompt: role.default_system_prompt(&title),
            name,
            title,
            role,
            model: model.into(),
            created_at: now_ms(),
        }
    }

    /// Override the role-default system prompt
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }
}
