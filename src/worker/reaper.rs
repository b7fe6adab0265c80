//! Stuck-task reaper — liveness recovery for dead or hung workers.
//!
//! A worker that dies mid-execution leaves its task in `processing` forever;
//! nothing in-band cancels a running executor. This loop is the out-of-band
//! recovery path: any `processing` row unmodified past the stale threshold is
//! put through the same retry-ceiling policy as an ordinary failure.
//!
//! The first tick fires immediately, so a restart doubles as crash recovery
//! for tasks orphaned by the previous process.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ReaperConfig;
use crate::store::TaskStore;
use crate::worker::worker::retry_or_fail;

/// Error message recorded on tasks recovered (or failed) by the reaper.
const STUCK_MESSAGE: &str = "Task stuck in processing state (timeout)";

/// Spawn the reaper background loop.
pub fn spawn_reaper_loop(store: Arc<dyn TaskStore>, config: ReaperConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval = ?config.interval,
            stale_threshold = ?config.stale_threshold,
            "Stuck-task reaper started"
        );

        let mut tick = tokio::time::interval(config.interval);
        loop {
            tick.tick().await;
            run_reaper_pass(&store, config.stale_threshold).await;
        }
    })
}

/// Single reaper pass: sweep stale `processing` tasks and recycle or fail
/// them.
///
/// Store failures are logged and abandoned until the next interval; the
/// reaper never takes the worker loop down with it.
pub async fn run_reaper_pass(store: &Arc<dyn TaskStore>, stale_threshold: Duration) {
    let stale = match store.list_stale_processing(stale_threshold).await {
        Ok(stale) => stale,
        Err(e) => {
            warn!(error = %e, "Reaper sweep failed; retrying next interval");
            return;
        }
    };

    if stale.is_empty() {
        debug!("No stuck tasks");
        return;
    }

    warn!(count = stale.len(), "Found stuck tasks");

    for task in stale {
        info!(
            task = %task.id,
            worker = task.worker_id.as_deref().unwrap_or("-"),
            "Recycling stuck task"
        );
        if let Err(e) = retry_or_fail(store, task.id, STUCK_MESSAGE).await {
            warn!(task = %task.id, error = %e, "Failed to recycle stuck task");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlStore;
    use crate::tasks::{TaskStatus, TaskType};
    use chrono::Utc;

    const THRESHOLD: Duration = Duration::from_secs(600);

    async fn stuck_task(store: &Arc<LibSqlStore>, max_retries: u32) -> uuid::Uuid {
        store
            .create(TaskType::StorefrontOrder, serde_json::json!({}), max_retries)
            .await
            .unwrap();
        let task = store.claim_next_pending("dead-worker").await.unwrap().unwrap();
        store
            .set_updated_at(task.id, Utc::now() - chrono::Duration::seconds(1200))
            .await;
        task.id
    }

    #[tokio::test]
    async fn stale_task_is_recycled_with_retry_accounting() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let task_id = stuck_task(&store, 3).await;
        let dyn_store: Arc<dyn TaskStore> = store.clone();

        run_reaper_pass(&dyn_store, THRESHOLD).await;

        let after = store.get(task_id).await.unwrap().unwrap();
        assert_eq!(after.status, TaskStatus::Pending);
        assert_eq!(after.retry_count, 1);
        assert!(after.worker_id.is_none());
    }

    #[tokio::test]
    async fn stale_task_at_ceiling_is_failed() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let task_id = stuck_task(&store, 1).await;
        let dyn_store: Arc<dyn TaskStore> = store.clone();

        run_reaper_pass(&dyn_store, THRESHOLD).await;

        let after = store.get(task_id).await.unwrap().unwrap();
        assert_eq!(after.status, TaskStatus::Failed);
        assert_eq!(after.error_message.as_deref(), Some(STUCK_MESSAGE));
        assert!(after.completed_at.is_some());
    }

    #[tokio::test]
    async fn healthy_processing_tasks_are_left_alone() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        store
            .create(TaskType::RideBooking, serde_json::json!({}), 3)
            .await
            .unwrap();
        let task = store.claim_next_pending("live-worker").await.unwrap().unwrap();
        let dyn_store: Arc<dyn TaskStore> = store.clone();

        run_reaper_pass(&dyn_store, THRESHOLD).await;

        let after = store.get(task.id).await.unwrap().unwrap();
        assert_eq!(after.status, TaskStatus::Processing);
        assert_eq!(after.retry_count, 0);
        assert_eq!(after.worker_id.as_deref(), Some("live-worker"));
    }
}
