//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Crewd - multi-agent team task orchestrator
#[derive(Parser)]
#[command(
    name = "cw",
    about = "Multi-agent team task orchestrator for local LLM endpoints",
    version,
    after_help = "Logs are written to: ~/.local/share/crewd/logs/crewd.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Manage teams
    Team {
        #[command(subcommand)]
        command: TeamCommand,
    },

    /// Manage agents
    Agent {
        #[command(subcommand)]
        command: AgentCommand,
    },

    /// Manage and run tasks
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Manage subtasks
    Subtask {
        #[command(subcommand)]
        command: SubtaskCommand,
    },

    /// List models served by the completion provider
    Models,
}

/// Team subcommands
#[derive(Subcommand)]
pub enum TeamCommand {
    /// Create a new team
    Create {
        /// Team name
        name: String,

        /// Team description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Show a team with its agents and tasks
    Show {
        /// Team id
        id: String,
    },

    /// List all teams
    List,

    /// Delete a team and its tasks
    Delete {
        /// Team id
        id: String,
    },
}

/// Agent subcommands
#[derive(Subcommand)]
pub enum AgentCommand {
    /// Add an agent to a team
    Add {
        /// Team id
        team: String,

        /// Agent name
        name: String,

        /// Role title (e.g. "Architect", "Backend Developer", "QA")
        role: String,

        /// Model identifier (defaults to the configured model)
        #[arg(short, long)]
        model: Option<String>,

        /// Custom system prompt (defaults to a role-specific prompt)
        #[arg(short, long)]
        system_prompt: Option<String>,
    },
}

/// Task subcommands
#[derive(Subcommand)]
pub enum TaskCommand {
    /// Create a new task
    Create {
        /// Team id
        team: String,

        /// Task title
        title: String,

        /// Task description handed to the team leader
        description: String,
    },

    /// Execute a task
    Run {
        /// Task id
        id: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show live task status and logs
    Status {
        /// Task id
        id: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Revise a completed task with feedback
    Iterate {
        /// Task id
        id: String,

        /// Feedback to apply
        feedback: String,
    },

    /// Cancel a running task
    Cancel {
        /// Task id
        id: String,
    },

    /// List tasks
    List {
        /// Restrict to one team
        #[arg(short, long)]
        team: Option<String>,
    },

    /// List active (in-flight) tasks
    Active,
}

/// Subtask subcommands
#[derive(Subcommand)]
pub enum SubtaskCommand {
    /// Add a subtask to a task
    Add {
        /// Parent task id
        task: String,

        /// Subtask title
        title: String,

        /// Subtask description
        description: String,

        /// Agent to assign
        #[arg(short, long)]
        agent: Option<String>,

        /// Sibling subtask ids this one should run after
        #[arg(short, long)]
        depends_on: Vec<String>,
    },
}

/// Output format for status/report commands
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
