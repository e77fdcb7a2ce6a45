//! Progress watchdog
//!
//! One monitor per in-flight task. A task that reports no progress for the
//! stall threshold earns a strike; a second consecutive silent poll forces
//! it to Failed. The overall timeout forces Failed regardless of recent
//! heartbeats. Monitors exit as soon as their task leaves the active set,
//! so no watchdog ever outlives its task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use teamstore::{Store, now_ms};

use crate::config::WatchdogConfig;
use crate::domain::Status;

use super::core::Registry;

/// Liveness bookkeeping for one active task
#[derive(Debug, Clone)]
pub struct Activity {
    /// When the execution started (Unix milliseconds)
    pub started_at: i64,

    /// Last progress report (Unix milliseconds)
    pub last_update: i64,

    /// False once a stall strike is pending
    pub heartbeat_ok: bool,
}

/// Concurrent liveness monitor over the active task set
#[derive(Clone)]
pub struct Watchdog {
    active: Arc<Mutex<HashMap<String, Activity>>>,
    config: WatchdogConfig,
}

impl Watchdog {
    /// Create a new watchdog
    pub fn new(config: WatchdogConfig) -> Self {
        Self {
            active: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    /// Register a task as active; false if it already was
    pub async fn register(&self, task_id: &str) -> bool {
        debug!(%task_id, "register: called");
        let mut active = self.active.lock().await;
        if active.contains_key(task_id) {
            return false;
        }
        let now = now_ms();
        active.insert(
            task_id.to_string(),
            Activity {
                started_at: now,
                last_update: now,
                heartbeat_ok: true,
            },
        );
        true
    }

    /// Record a progress heartbeat, clearing any pending strike
    pub async fn beat(&self, task_id: &str) {
        debug!(%task_id, "beat: called");
        let mut active = self.active.lock().await;
        if let Some(activity) = active.get_mut(task_id) {
            activity.last_update = now_ms();
            activity.heartbeat_ok = true;
        }
    }

    /// Remove a task from the active set; false if it was not there
    pub async fn deregister(&self, task_id: &str) -> bool {
        debug!(%task_id, "deregister: called");
        self.active.lock().await.remove(task_id).is_some()
    }

    /// Whether the task is currently in the active set
    pub async fn is_active(&self, task_id: &str) -> bool {
        self.active.lock().await.contains_key(task_id)
    }

    /// Ids of all active tasks
    pub async fn active_ids(&self) -> Vec<String> {
        self.active.lock().await.keys().cloned().collect()
    }

    /// Activity snapshot for one task
    pub async fn activity(&self, task_id: &str) -> Option<Activity> {
        self.active.lock().await.get(task_id).cloned()
    }

    async fn strike(&self, task_id: &str) {
        let mut active = self.active.lock().await;
        if let Some(activity) = active.get_mut(task_id) {
            activity.heartbeat_ok = false;
        }
    }

    /// Spawn the monitor loop for a registered task
    ///
    /// The loop polls at the configured interval and exits when the task
    /// leaves the active set by any path.
    pub fn spawn_monitor(&self, task_id: String, registry: Arc<RwLock<Registry>>, store: Arc<Store>) -> JoinHandle<()> {
        let watchdog = self.clone();
        let poll = Duration::from_millis(watchdog.config.poll_interval_ms);
        let stall_ms = watchdog.config.stall_threshold_ms as i64;
        let timeout_ms = watchdog.config.task_timeout_ms as i64;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll);
            // The first tick fires immediately; consume it so every later
            // tick marks a full poll window.
            interval.tick().await;

            loop {
                interval.tick().await;

                let Some(activity) = watchdog.activity(&task_id).await else {
                    debug!(%task_id, "monitor: task no longer active, exiting");
                    return;
                };

                let now = now_ms();

                if now - activity.started_at >= timeout_ms {
                    warn!(%task_id, "monitor: task timed out, forcing failure");
                    let timeout_mins = timeout_ms / 60_000;
                    force_fail(
                        &task_id,
                        &format!("task did not finish within {} minute(s) and timed out", timeout_mins.max(1)),
                        &registry,
                        &store,
                    )
                    .await;
                    watchdog.deregister(&task_id).await;
                    return;
                }

                if now - activity.last_update > stall_ms {
                    if !activity.heartbeat_ok {
                        // Second consecutive silent window.
                        warn!(%task_id, "monitor: task not responding, forcing failure");
                        force_fail(&task_id, "task is not responding and was stopped", &registry, &store).await;
                        watchdog.deregister(&task_id).await;
                        return;
                    }
                    debug!(%task_id, "monitor: stall strike");
                    watchdog.strike(&task_id).await;
                }
            }
        })
    }
}

/// Force an in-progress task to Failed and persist the change
async fn force_fail(task_id: &str, message: &str, registry: &RwLock<Registry>, store: &Store) {
    let mut registry = registry.write().await;
    if let Some(task) = registry.tasks.get_mut(task_id) {
        if task.status == Status::InProgress {
            task.set_status(Status::Failed);
            task.status_message = format!("Failed: {}", message);
            task.log(format!("ERROR: {}", message));
            info!(%task_id, %message, "force_fail: task marked failed");
        }
    }
    registry.save(store);
}
