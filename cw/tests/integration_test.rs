//! Integration tests for the crewd orchestrator
//!
//! These tests drive the full execution pipeline against a scripted mock
//! provider: team setup, role-derived subtasks, leader-first execution,
//! artifact documents, iteration, cancellation guards, and the watchdog.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use crewd::config::WatchdogConfig;
use crewd::llm::client::mock::{MockLlmClient, MockReply};
use crewd::orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorError};
use crewd::{DocumentKind, Status};
use teamstore::Store;

const LEADER_SOLUTION: &str = "Here is the plan: a small calculator service.\n\
\n\
```main.py\nprint(\"calculator\")\n```\n\
\n\
```web/index.html\n<html><body>calc</body></html>\n```\n\
\n\
Run main.py to start the service.";

fn orchestrator_with(temp: &TempDir, mock: Arc<MockLlmClient>) -> Orchestrator {
    orchestrator_with_watchdog(temp, mock, WatchdogConfig::default())
}

fn orchestrator_with_watchdog(temp: &TempDir, mock: Arc<MockLlmClient>, watchdog: WatchdogConfig) -> Orchestrator {
    let store = Store::open(temp.path()).expect("open store");
    Orchestrator::new(
        store,
        mock,
        OrchestratorConfig {
            watchdog,
            temperature: 0.7,
        },
    )
    .expect("build orchestrator")
}

async fn software_team(orchestrator: &Orchestrator) -> String {
    let team_id = orchestrator.create_team("Core", Some("core team")).await.unwrap();
    orchestrator
        .add_agent(&team_id, "Ada", "Architect", "mock-model", None)
        .await
        .unwrap();
    orchestrator
        .add_agent(&team_id, "Dev", "Developer", "mock-model", None)
        .await
        .unwrap();
    orchestrator
        .add_agent(&team_id, "Tess", "Tester", "mock-model", None)
        .await
        .unwrap();
    team_id
}

// =============================================================================
// End-to-end execution
// =============================================================================

#[tokio::test]
async fn test_execute_end_to_end() {
    let temp = TempDir::new().unwrap();
    let mock = Arc::new(MockLlmClient::new(vec![
        MockReply::Text(LEADER_SOLUTION.to_string()),
        MockReply::Text("Developer review of the solution.".to_string()),
        MockReply::Text("Test plan for the solution.".to_string()),
    ]));
    let orchestrator = orchestrator_with(&temp, mock.clone());

    let team_id = software_team(&orchestrator).await;
    let task_id = orchestrator
        .create_task(&team_id, "Calculator", "Build a calculator web service")
        .await
        .unwrap();

    let report = orchestrator.execute(&task_id).await.unwrap();

    // One subtask per distinct role, all completed.
    assert_eq!(report.status, Status::Completed);
    assert_eq!(report.progress, 100);
    assert_eq!(report.subtasks.len(), 3);
    assert!(report.subtasks.iter().all(|s| s.status == Status::Completed));
    assert!(report.result.as_deref().unwrap().contains("calculator"));

    // The leader (first agent, the architect) ran first with the
    // full-solution prompt; the others got review prompts seeded with the
    // leader's explanation.
    let requests = mock.requests().await;
    assert_eq!(requests.len(), 3);
    assert!(requests[0].prompt.contains("CODE DEVELOPMENT TASK"));
    assert!(requests[0].prompt.contains("Build a calculator web service"));
    assert!(requests[1].prompt.contains("Here is the plan"));
    assert!(requests[2].prompt.contains("Here is the plan"));

    // Artifacts became documents, plus README, project structure and one
    // document per non-leader role.
    let task = orchestrator.get_task(&task_id).await.unwrap();
    let titles: Vec<&str> = task.documents.iter().map(|d| d.title.as_str()).collect();
    assert!(titles.contains(&"main.py"));
    assert!(titles.contains(&"web/index.html"));
    assert!(titles.contains(&"README.md"));
    assert!(titles.contains(&"project_structure.md"));
    assert!(titles.contains(&"developer_output.md"));
    assert!(titles.contains(&"tester_output.md"));

    let readme = task.documents.iter().find(|d| d.title == "README.md").unwrap();
    assert_eq!(readme.kind, DocumentKind::Text);
    assert!(readme.content.contains("Here is the plan"));
    assert!(!readme.content.contains("print("));

    let main_py = task.documents.iter().find(|d| d.title == "main.py").unwrap();
    assert_eq!(main_py.kind, DocumentKind::Code);

    // The watchdog let go of the task.
    let status = orchestrator.get_status(&task_id).await.unwrap();
    assert!(!status.is_active);
    assert!(orchestrator.list_active().await.is_empty());

    // The aggregate result embeds the extracted artifacts.
    let result: serde_json::Value = serde_json::from_str(&task.result.unwrap()).unwrap();
    assert_eq!(result["artifacts"]["main.py"], "print(\"calculator\")");
}

#[tokio::test]
async fn test_execute_continues_past_role_agent_failure() {
    let temp = TempDir::new().unwrap();
    let mock = Arc::new(MockLlmClient::new(vec![
        MockReply::Text(LEADER_SOLUTION.to_string()),
        MockReply::Fail("connection refused".to_string()),
        MockReply::Text("Test plan.".to_string()),
    ]));
    let orchestrator = orchestrator_with(&temp, mock);

    let team_id = software_team(&orchestrator).await;
    let task_id = orchestrator
        .create_task(&team_id, "Calculator", "Build a calculator")
        .await
        .unwrap();

    let report = orchestrator.execute(&task_id).await.unwrap();

    // One role failed, the pass still completed.
    assert_eq!(report.status, Status::Completed);
    let failed: Vec<_> = report.subtasks.iter().filter(|s| s.status == Status::Failed).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].title, "Code Development");

    let failed_subtask = orchestrator.get_subtask(&failed[0].id).await.unwrap();
    assert!(failed_subtask.result.as_deref().unwrap().contains("model call failed"));
}

#[tokio::test]
async fn test_leader_failure_fails_the_task() {
    let temp = TempDir::new().unwrap();
    let mock = Arc::new(MockLlmClient::new(vec![MockReply::Fail("model unavailable".to_string())]));
    let orchestrator = orchestrator_with(&temp, mock);

    let team_id = software_team(&orchestrator).await;
    let task_id = orchestrator.create_task(&team_id, "Calculator", "Build it").await.unwrap();

    let report = orchestrator.execute(&task_id).await.unwrap();

    assert_eq!(report.status, Status::Failed);
    let status = orchestrator.get_status(&task_id).await.unwrap();
    assert!(!status.is_active);
    assert!(status.logs.iter().any(|l| l.message.contains("leader generation failed")));
}

#[tokio::test]
async fn test_execute_requires_agents() {
    let temp = TempDir::new().unwrap();
    let orchestrator = orchestrator_with(&temp, Arc::new(MockLlmClient::always("unused")));

    let team_id = orchestrator.create_team("Empty", None).await.unwrap();
    let task_id = orchestrator.create_task(&team_id, "Nothing", "No one to do it").await.unwrap();

    let result = orchestrator.execute(&task_id).await;
    assert!(matches!(result, Err(OrchestratorError::InvalidState(_))));

    // The guard left the task untouched.
    let task = orchestrator.get_task(&task_id).await.unwrap();
    assert_eq!(task.status, Status::Pending);
}

#[tokio::test]
async fn test_execute_unknown_task_is_not_found() {
    let temp = TempDir::new().unwrap();
    let orchestrator = orchestrator_with(&temp, Arc::new(MockLlmClient::always("unused")));

    let result = orchestrator.execute("task-ghost").await;
    assert!(matches!(result, Err(OrchestratorError::NotFound(_))));
}

// =============================================================================
// Double-start guard
// =============================================================================

#[tokio::test]
async fn test_second_execute_rejected_while_first_runs() {
    let temp = TempDir::new().unwrap();
    let mock = Arc::new(MockLlmClient::always(LEADER_SOLUTION).with_delay(Duration::from_millis(150)));
    let orchestrator = Arc::new(orchestrator_with(&temp, mock));

    let team_id = software_team(&orchestrator).await;
    let task_id = orchestrator.create_task(&team_id, "Calculator", "Build it").await.unwrap();

    let first = {
        let orchestrator = Arc::clone(&orchestrator);
        let task_id = task_id.clone();
        tokio::spawn(async move { orchestrator.execute(&task_id).await })
    };

    // Give the first call time to claim the task.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = orchestrator.execute(&task_id).await;
    assert!(matches!(second, Err(OrchestratorError::InvalidState(_))));

    // The first call is unaffected and completes.
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.status, Status::Completed);
}

// =============================================================================
// Iteration
// =============================================================================

#[tokio::test]
async fn test_iterate_revises_result() {
    let temp = TempDir::new().unwrap();
    let mock = Arc::new(MockLlmClient::new(vec![
        MockReply::Text(LEADER_SOLUTION.to_string()),
        MockReply::Text("dev review".to_string()),
        MockReply::Text("test plan".to_string()),
        MockReply::Text("revised solution".to_string()),
    ]));
    let orchestrator = orchestrator_with(&temp, mock.clone());

    let team_id = software_team(&orchestrator).await;
    let task_id = orchestrator.create_task(&team_id, "Calculator", "Build it").await.unwrap();
    orchestrator.execute(&task_id).await.unwrap();

    let report = orchestrator.iterate(&task_id, "add subtraction").await.unwrap();

    assert_eq!(report.status, Status::Completed);
    assert_eq!(report.iteration_count, 1);
    assert_eq!(report.result.as_deref(), Some("revised solution"));

    let task = orchestrator.get_task(&task_id).await.unwrap();
    assert_eq!(task.result.as_deref(), Some("revised solution"));
    assert_eq!(task.iterations.len(), 1);
    assert!(task.iterations[0].previous_result.contains("calculator"));

    // The revision went to the architect (preferred revision agent).
    let revision_request = mock.requests().await.into_iter().next_back().unwrap();
    assert!(revision_request.prompt.contains("add subtraction"));
}

#[tokio::test]
async fn test_failed_iteration_preserves_previous_result() {
    let temp = TempDir::new().unwrap();
    let mock = Arc::new(MockLlmClient::new(vec![
        MockReply::Text(LEADER_SOLUTION.to_string()),
        MockReply::Text("dev review".to_string()),
        MockReply::Text("test plan".to_string()),
        MockReply::Fail("model crashed".to_string()),
    ]));
    let orchestrator = orchestrator_with(&temp, mock);

    let team_id = software_team(&orchestrator).await;
    let task_id = orchestrator.create_task(&team_id, "Calculator", "Build it").await.unwrap();
    let first = orchestrator.execute(&task_id).await.unwrap();
    let original_result = first.result.clone().unwrap();

    let report = orchestrator.iterate(&task_id, "break it").await.unwrap();

    assert_eq!(report.status, Status::Failed);
    assert!(report.error.as_deref().unwrap().contains("model crashed"));

    // The prior successful result is still there.
    let task = orchestrator.get_task(&task_id).await.unwrap();
    assert_eq!(task.status, Status::Failed);
    assert_eq!(task.result.as_deref(), Some(original_result.as_str()));
    assert_eq!(task.iterations[0].previous_result, original_result);
    assert!(task.iterations[0].new_result.is_none());
}

#[tokio::test]
async fn test_iterate_rejected_unless_completed() {
    let temp = TempDir::new().unwrap();
    let mock = Arc::new(MockLlmClient::new(vec![MockReply::Fail("down".to_string())]));
    let orchestrator = orchestrator_with(&temp, mock);

    let team_id = software_team(&orchestrator).await;
    let task_id = orchestrator.create_task(&team_id, "Calculator", "Build it").await.unwrap();

    // Pending task: no iteration.
    let result = orchestrator.iterate(&task_id, "feedback").await;
    assert!(matches!(result, Err(OrchestratorError::InvalidState(_))));

    // Failed task (leader failure): still no iteration, count unchanged.
    orchestrator.execute(&task_id).await.unwrap();
    let task = orchestrator.get_task(&task_id).await.unwrap();
    assert_eq!(task.status, Status::Failed);

    let result = orchestrator.iterate(&task_id, "feedback").await;
    assert!(matches!(result, Err(OrchestratorError::InvalidState(_))));

    let task = orchestrator.get_task(&task_id).await.unwrap();
    assert_eq!(task.iteration_count, 0);
    assert!(task.iterations.is_empty());
}

// =============================================================================
// Re-execution of a completed task
// =============================================================================

#[tokio::test]
async fn test_rerun_resets_subtasks_and_keeps_previous_results() {
    let temp = TempDir::new().unwrap();
    let mock = Arc::new(MockLlmClient::always(LEADER_SOLUTION));
    let orchestrator = orchestrator_with(&temp, mock);

    let team_id = software_team(&orchestrator).await;
    let task_id = orchestrator.create_task(&team_id, "Calculator", "Build it").await.unwrap();

    let first = orchestrator.execute(&task_id).await.unwrap();
    assert_eq!(first.status, Status::Completed);

    let second = orchestrator.execute(&task_id).await.unwrap();
    assert_eq!(second.status, Status::Completed);

    // Same subtasks, not re-derived.
    assert_eq!(first.subtasks.len(), second.subtasks.len());

    // Each subtask kept its first answer as previous_result.
    for summary in &second.subtasks {
        let subtask = orchestrator.get_subtask(&summary.id).await.unwrap();
        assert!(subtask.previous_result.is_some());
        assert!(subtask.result.is_some());
    }
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cancel_only_applies_to_running_tasks() {
    let temp = TempDir::new().unwrap();
    let orchestrator = orchestrator_with(&temp, Arc::new(MockLlmClient::always("unused")));

    let team_id = software_team(&orchestrator).await;
    let task_id = orchestrator.create_task(&team_id, "Calculator", "Build it").await.unwrap();

    // Pending task: nothing to cancel.
    assert!(!orchestrator.cancel(&task_id).await.unwrap());
    assert!(matches!(
        orchestrator.cancel("task-ghost").await,
        Err(OrchestratorError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_cancel_stops_execution_and_keeps_partial_results() {
    let temp = TempDir::new().unwrap();
    let mock = Arc::new(MockLlmClient::always(LEADER_SOLUTION).with_delay(Duration::from_millis(100)));
    let orchestrator = Arc::new(orchestrator_with(&temp, mock));

    let team_id = software_team(&orchestrator).await;
    let task_id = orchestrator.create_task(&team_id, "Calculator", "Build it").await.unwrap();

    let run = {
        let orchestrator = Arc::clone(&orchestrator);
        let task_id = task_id.clone();
        tokio::spawn(async move { orchestrator.execute(&task_id).await })
    };

    // Cancel while the leader call is in flight.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(orchestrator.cancel(&task_id).await.unwrap());

    let report = run.await.unwrap().unwrap();
    assert_eq!(report.status, Status::Cancelled);

    let task = orchestrator.get_task(&task_id).await.unwrap();
    assert_eq!(task.status, Status::Cancelled);
    assert!(task.result.is_none());
    assert!(task.logs.iter().any(|l| l.message.contains("cancelled")));

    let status = orchestrator.get_status(&task_id).await.unwrap();
    assert!(!status.is_active);
}

// =============================================================================
// Watchdog
// =============================================================================

#[tokio::test]
async fn test_hung_execution_is_failed_by_watchdog() {
    let temp = TempDir::new().unwrap();
    let mock = Arc::new(MockLlmClient::new(vec![MockReply::Hang]));
    let orchestrator = Arc::new(orchestrator_with_watchdog(
        &temp,
        mock,
        WatchdogConfig {
            poll_interval_ms: 20,
            stall_threshold_ms: 40,
            task_timeout_ms: 60_000,
        },
    ));

    let team_id = software_team(&orchestrator).await;
    let task_id = orchestrator.create_task(&team_id, "Calculator", "Build it").await.unwrap();

    // The execution will hang on the leader's provider call forever.
    let _run = {
        let orchestrator = Arc::clone(&orchestrator);
        let task_id = task_id.clone();
        tokio::spawn(async move { orchestrator.execute(&task_id).await })
    };

    // Two silent poll windows later the watchdog kills it.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let status = orchestrator.get_status(&task_id).await.unwrap();
        if status.status == Status::Failed {
            assert!(!status.is_active);
            assert!(status.logs.iter().any(|l| l.message.contains("not responding")));
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "watchdog never fired");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert!(orchestrator.list_active().await.is_empty());
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn test_state_survives_reload() {
    let temp = TempDir::new().unwrap();
    let mock = Arc::new(MockLlmClient::always(LEADER_SOLUTION));

    let task_id = {
        let orchestrator = orchestrator_with(&temp, mock.clone());
        let team_id = software_team(&orchestrator).await;
        let task_id = orchestrator.create_task(&team_id, "Calculator", "Build it").await.unwrap();
        orchestrator.execute(&task_id).await.unwrap();
        task_id
    };

    // A fresh orchestrator over the same store sees the finished task.
    let reloaded = orchestrator_with(&temp, mock);
    let task = reloaded.get_task(&task_id).await.unwrap();
    assert_eq!(task.status, Status::Completed);
    assert!(task.result.is_some());
    assert!(!task.documents.is_empty());
    assert_eq!(reloaded.list_teams().await.len(), 1);
}
