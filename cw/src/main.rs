//! Crewd - Multi-Agent Team Task Orchestrator
//!
//! CLI entry point replacing the web surface: every invocation opens the
//! store, performs the requested operation through the orchestrator, and
//! persists the result.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::info;

use crewd::cli::{AgentCommand, Cli, Command, OutputFormat, SubtaskCommand, TaskCommand, TeamCommand};
use crewd::config::Config;
use crewd::llm::{LlmClient, create_client};
use crewd::orchestrator::{Orchestrator, OrchestratorConfig};
use teamstore::Store;

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("crewd")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Setup tracing subscriber - write to log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("crewd.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate()?;

    info!(
        "Crewd loaded config: provider={}, model={}",
        config.llm.provider, config.llm.model
    );

    let llm = create_client(&config.llm)?;
    let store = Store::open(&config.storage.data_dir).context("Failed to open store")?;
    let orchestrator = Orchestrator::new(
        store,
        Arc::clone(&llm),
        OrchestratorConfig {
            watchdog: config.watchdog.clone(),
            temperature: config.llm.temperature,
        },
    )?;

    match cli.command {
        Command::Team { command } => cmd_team(&orchestrator, command).await,
        Command::Agent { command } => cmd_agent(&orchestrator, &config, command).await,
        Command::Task { command } => cmd_task(&orchestrator, command).await,
        Command::Subtask { command } => cmd_subtask(&orchestrator, command).await,
        Command::Models => cmd_models(llm.as_ref()).await,
    }
}

async fn cmd_team(orchestrator: &Orchestrator, command: TeamCommand) -> Result<()> {
    match command {
        TeamCommand::Create { name, description } => {
            let team_id = orchestrator.create_team(&name, description.as_deref()).await?;
            println!("{} {}", "Created team".green(), team_id.bold());
        }
        TeamCommand::Show { id } => {
            let team = orchestrator.get_team(&id).await?;
            println!("{} {}", team.name.bold(), team.id.dimmed());
            println!("{}", team.description);
            println!();
            println!("{}", "Agents:".bold());
            for agent in &team.agents {
                println!("  {} [{}] {} ({})", agent.name, agent.role, agent.id.dimmed(), agent.model);
            }
            if !team.task_ids.is_empty() {
                println!();
                println!("{}", "Tasks:".bold());
                for task in orchestrator.list_tasks(Some(&id)).await {
                    println!("  {} {} [{}]", task.title, task.id.dimmed(), task.status);
                }
            }
        }
        TeamCommand::List => {
            for team in orchestrator.list_teams().await {
                println!("{} {} ({} agents)", team.name.bold(), team.id.dimmed(), team.agents.len());
            }
        }
        TeamCommand::Delete { id } => {
            if orchestrator.delete_team(&id).await {
                println!("{} {}", "Deleted team".yellow(), id);
            } else {
                println!("Team {} not found", id);
            }
        }
    }
    Ok(())
}

async fn cmd_agent(orchestrator: &Orchestrator, config: &Config, command: AgentCommand) -> Result<()> {
    match command {
        AgentCommand::Add {
            team,
            name,
            role,
            model,
            system_prompt,
        } => {
            let model = model.unwrap_or_else(|| config.llm.model.clone());
            let agent_id = orchestrator
                .add_agent(&team, &name, &role, &model, system_prompt.as_deref())
                .await?;
            println!("{} {} ({} / {})", "Added agent".green(), agent_id.bold(), role, model);
        }
    }
    Ok(())
}

async fn cmd_task(orchestrator: &Orchestrator, command: TaskCommand) -> Result<()> {
    match command {
        TaskCommand::Create { team, title, description } => {
            let task_id = orchestrator.create_task(&team, &title, &description).await?;
            println!("{} {}", "Created task".green(), task_id.bold());
        }
        TaskCommand::Run { id, format } => {
            println!("Executing task {}...", id.bold());
            let report = orchestrator.execute(&id).await?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Text => {
                    let status = match report.status {
                        crewd::Status::Completed => report.status.to_string().green(),
                        crewd::Status::Failed => report.status.to_string().red(),
                        _ => report.status.to_string().yellow(),
                    };
                    println!("Task {} finished: {} ({}%)", report.task_id, status, report.progress);
                    for subtask in &report.subtasks {
                        println!("  {} [{}]", subtask.title, subtask.status);
                    }
                }
            }
        }
        TaskCommand::Status { id, format } => {
            let status = orchestrator.get_status(&id).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
                OutputFormat::Text => {
                    println!(
                        "{} [{}] {}% - {} (active: {})",
                        status.id.bold(),
                        status.status,
                        status.progress,
                        status.status_message,
                        status.is_active
                    );
                    for log in &status.logs {
                        println!("  {} {}", format_timestamp(log.timestamp).dimmed(), log.message);
                    }
                }
            }
        }
        TaskCommand::Iterate { id, feedback } => {
            let report = orchestrator.iterate(&id, &feedback).await?;
            match report.error {
                None => println!(
                    "{} (iteration {})",
                    "Iteration completed".green(),
                    report.iteration_count
                ),
                Some(error) => println!("{}: {}", "Iteration failed".red(), error),
            }
        }
        TaskCommand::Cancel { id } => {
            if orchestrator.cancel(&id).await? {
                println!("{} {}", "Cancelled task".yellow(), id);
            } else {
                println!("Task {} is not running", id);
            }
        }
        TaskCommand::List { team } => {
            for task in orchestrator.list_tasks(team.as_deref()).await {
                println!("{} {} [{}] {}%", task.title.bold(), task.id.dimmed(), task.status, task.progress);
            }
        }
        TaskCommand::Active => {
            let active = orchestrator.list_active().await;
            if active.is_empty() {
                println!("No active tasks");
            }
            for view in active {
                println!(
                    "{} {} [{}] {}% - {}",
                    view.title.bold(),
                    view.id.dimmed(),
                    view.status,
                    view.progress,
                    view.status_message
                );
            }
        }
    }
    Ok(())
}

async fn cmd_subtask(orchestrator: &Orchestrator, command: SubtaskCommand) -> Result<()> {
    match command {
        SubtaskCommand::Add {
            task,
            title,
            description,
            agent,
            depends_on,
        } => {
            let subtask_id = orchestrator
                .create_subtask(&task, &title, &description, agent.as_deref(), depends_on)
                .await?;
            println!("{} {}", "Created subtask".green(), subtask_id.bold());
        }
    }
    Ok(())
}

fn format_timestamp(unix_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(unix_ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| unix_ms.to_string())
}

async fn cmd_models(llm: &dyn LlmClient) -> Result<()> {
    let models = llm.list_models().await.context("Failed to list models")?;
    if models.is_empty() {
        println!("No models available");
    }
    for model in models {
        println!("{}", model);
    }
    Ok(())
}
