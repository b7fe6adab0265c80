//! Worker loop — claims pending tasks and runs them with bounded concurrency.
//!
//! One logical control flow multiplexes many in-flight executions; suspension
//! only happens at store round-trips, polling sleeps, and the executors' own
//! awaits. Any number of worker processes may share one task store: mutual
//! exclusion per task comes entirely from the store's atomic claim.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::error::StoreError;
use crate::store::TaskStore;
use crate::tasks::{Task, TaskStatus};
use crate::worker::executor::{ExecutionError, ExecutorRegistry, TaskContext};

/// The scheduling core: poll, claim, dispatch, finalize.
pub struct WorkerLoop {
    store: Arc<dyn TaskStore>,
    registry: Arc<ExecutorRegistry>,
    config: WorkerConfig,
}

impl WorkerLoop {
    pub fn new(
        store: Arc<dyn TaskStore>,
        registry: Arc<ExecutorRegistry>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Run until `shutdown` flips to true, then drain in-flight executions.
    ///
    /// Failures inside one task never cross the per-task spawn boundary; a
    /// store outage only delays the next poll by `poll_interval`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            worker = %self.config.worker_id,
            poll_interval = ?self.config.poll_interval,
            max_concurrent = self.config.max_concurrent_tasks,
            "Worker started"
        );

        let mut inflight: Vec<JoinHandle<()>> = Vec::new();
        // Capacity rechecks are shorter than idle polls: a slot freeing up
        // should not wait out a full poll interval.
        let recheck = self.config.poll_interval.min(Duration::from_secs(1));

        while !*shutdown.borrow() {
            inflight.retain(|handle| !handle.is_finished());

            if inflight.len() >= self.config.max_concurrent_tasks {
                sleep_or_shutdown(recheck, &mut shutdown).await;
                continue;
            }

            match self.store.claim_next_pending(&self.config.worker_id).await {
                Ok(Some(task)) => {
                    tracing::info!(
                        task = %task.id,
                        task_type = %task.task_type,
                        active = inflight.len(),
                        max = self.config.max_concurrent_tasks,
                        "Starting claimed task"
                    );
                    let store = self.store.clone();
                    let registry = self.registry.clone();
                    let worker_id = self.config.worker_id.clone();
                    inflight.push(tokio::spawn(async move {
                        execute_claimed(store, registry, worker_id, task).await;
                    }));
                    // Give the spawned execution a chance to reach its first
                    // await before the next claim.
                    tokio::task::yield_now().await;
                }
                Ok(None) => {
                    sleep_or_shutdown(self.config.poll_interval, &mut shutdown).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Poll iteration failed; backing off");
                    sleep_or_shutdown(self.config.poll_interval, &mut shutdown).await;
                }
            }
        }

        inflight.retain(|handle| !handle.is_finished());
        if !inflight.is_empty() {
            tracing::info!(
                count = inflight.len(),
                "Draining in-flight tasks before shutdown"
            );
            join_all(inflight).await;
        }
        tracing::info!(worker = %self.config.worker_id, "Worker stopped");
    }
}

/// Sleep for `duration`, waking early if the shutdown flag flips.
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = shutdown.changed() => {}
    }
}

/// Run one claimed task to a terminal state or back to `pending`.
///
/// Everything here is isolated from the main loop; errors end as store
/// writes, never as propagated panics.
async fn execute_claimed(
    store: Arc<dyn TaskStore>,
    registry: Arc<ExecutorRegistry>,
    worker_id: String,
    task: Task,
) {
    let task_id = task.id;

    if let Err(e) = store
        .append_progress(task_id, &format!("Task started by {worker_id}"))
        .await
    {
        if matches!(e, StoreError::NotFound(_)) {
            tracing::warn!(task = %task_id, "Task vanished before execution");
            return;
        }
        tracing::warn!(task = %task_id, error = %e, "Failed to record start progress");
    }

    let Some(executor) = registry.get(task.task_type) else {
        // Configuration error, not a transient fault: no retry budget spent.
        tracing::error!(task = %task_id, task_type = %task.task_type, "No executor registered");
        let outcome = store
            .update_status(
                task_id,
                TaskStatus::Failed,
                None,
                Some(&format!("unknown task type: {}", task.task_type)),
                None,
            )
            .await
            .map(|_| ());
        finalize(task_id, outcome);
        return;
    };

    let ctx = TaskContext::new(task_id, task.input.clone(), store.clone());

    let outcome = match executor.execute(&ctx).await {
        Ok(result) => {
            tracing::info!(task = %task_id, "Task completed");
            store
                .update_status(task_id, TaskStatus::Completed, Some(&result), None, None)
                .await
                .map(|_| ())
        }
        Err(ExecutionError::Declined { reason }) => {
            // A definitive answer from the outside world; retrying could
            // duplicate a real purchase.
            tracing::warn!(task = %task_id, reason = %reason, "Task declined");
            store
                .update_status(
                    task_id,
                    TaskStatus::Failed,
                    Some(&serde_json::json!({"declined": true, "reason": reason})),
                    Some(&reason),
                    None,
                )
                .await
                .map(|_| ())
        }
        Err(ExecutionError::Retryable(cause)) => {
            tracing::warn!(task = %task_id, error = %cause, "Task attempt failed");
            retry_or_fail(&store, task_id, &cause.to_string()).await
        }
    };

    finalize(task_id, outcome);
}

fn finalize(task_id: Uuid, outcome: Result<(), StoreError>) {
    match outcome {
        Ok(()) => {}
        Err(StoreError::NotFound(_)) => {
            tracing::warn!(task = %task_id, "Task vanished during finalization");
        }
        Err(e) => {
            tracing::warn!(task = %task_id, error = %e, "Failed to finalize task");
        }
    }
}

/// Shared retry-ceiling policy.
///
/// Used for ordinary executor failures and by the reaper for timed-out
/// tasks — one policy, two detectors.
pub(crate) async fn retry_or_fail(
    store: &Arc<dyn TaskStore>,
    task_id: Uuid,
    error_message: &str,
) -> Result<(), StoreError> {
    let task = store.increment_retry(task_id).await?;
    if task.can_retry() {
        tracing::info!(
            task = %task_id,
            retry = task.retry_count,
            max = task.max_retries,
            "Recycling task for retry"
        );
        store.reset_to_pending(task_id).await
    } else {
        tracing::warn!(
            task = %task_id,
            retries = task.retry_count,
            "Retry ceiling reached; failing task"
        );
        store
            .update_status(
                task_id,
                TaskStatus::Failed,
                Some(&serde_json::json!({"error": error_message})),
                Some(error_message),
                None,
            )
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlStore;
    use crate::tasks::TaskType;

    async fn claimed_task(store: &Arc<LibSqlStore>, max_retries: u32) -> Task {
        store
            .create(TaskType::RideBooking, serde_json::json!({}), max_retries)
            .await
            .unwrap();
        store.claim_next_pending("test-worker").await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn retry_policy_recycles_below_ceiling() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let task = claimed_task(&store, 3).await;
        let dyn_store: Arc<dyn TaskStore> = store.clone();

        retry_or_fail(&dyn_store, task.id, "boom").await.unwrap();

        let after = store.get(task.id).await.unwrap().unwrap();
        assert_eq!(after.status, TaskStatus::Pending);
        assert_eq!(after.retry_count, 1);
        assert!(after.worker_id.is_none());
    }

    #[tokio::test]
    async fn retry_policy_fails_at_ceiling() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let task = claimed_task(&store, 1).await;
        let dyn_store: Arc<dyn TaskStore> = store.clone();

        retry_or_fail(&dyn_store, task.id, "boom").await.unwrap();

        let after = store.get(task.id).await.unwrap().unwrap();
        assert_eq!(after.status, TaskStatus::Failed);
        assert_eq!(after.retry_count, 1);
        assert_eq!(after.error_message.as_deref(), Some("boom"));
        assert!(after.completed_at.is_some());
    }

    #[tokio::test]
    async fn unknown_task_type_fails_without_retry() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let task = claimed_task(&store, 3).await;
        let registry = Arc::new(ExecutorRegistry::new());

        execute_claimed(store.clone(), registry, "test-worker".to_string(), task.clone()).await;

        let after = store.get(task.id).await.unwrap().unwrap();
        assert_eq!(after.status, TaskStatus::Failed);
        assert_eq!(after.retry_count, 0);
        assert!(after
            .error_message
            .unwrap()
            .contains("unknown task type"));
    }
}
