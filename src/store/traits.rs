//! `TaskStore` trait — single async interface for task persistence.
//!
//! The worker engine coordinates entirely through these operations; the
//! at-most-one-claimant guarantee of [`TaskStore::claim_next_pending`] is what
//! every other correctness property rests on.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::tasks::{Task, TaskStatus, TaskType};

/// Backend-agnostic task storage.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new task in `pending` with `retry_count = 0`.
    async fn create(
        &self,
        task_type: TaskType,
        input: serde_json::Value,
        max_retries: u32,
    ) -> Result<Task, StoreError>;

    /// Fetch a task by ID.
    async fn get(&self, id: Uuid) -> Result<Option<Task>, StoreError>;

    /// Atomically claim the oldest `pending` task for `worker_id`.
    ///
    /// Returns at most one task, transitioned to `processing` with
    /// `started_at` set. Two concurrent callers must never both receive the
    /// same task: the claim is a single conditional update, so losing callers
    /// observe the row as already claimed.
    async fn claim_next_pending(&self, worker_id: &str) -> Result<Option<Task>, StoreError>;

    /// Set status and associated fields.
    ///
    /// Transitioning to `processing` sets `started_at`; transitioning to a
    /// terminal state sets `completed_at`. A `result` payload is merged into
    /// the existing result so accumulated progress entries are preserved.
    /// Updates against a task already in a terminal state are no-ops that
    /// return the row unchanged, so `completed_at` is written exactly once.
    async fn update_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        result: Option<&serde_json::Value>,
        error_message: Option<&str>,
        worker_id: Option<&str>,
    ) -> Result<Task, StoreError>;

    /// Append a `{message, timestamp}` entry to `result.progress`.
    ///
    /// The progress array is append-only; entries are never reordered or
    /// truncated by later writes.
    async fn append_progress(&self, id: Uuid, message: &str) -> Result<(), StoreError>;

    /// Increment `retry_count` by one and return the updated row.
    async fn increment_retry(&self, id: Uuid) -> Result<Task, StoreError>;

    /// Tasks with the given status, most recently created first.
    async fn list_by_status(
        &self,
        status: TaskStatus,
        limit: usize,
    ) -> Result<Vec<Task>, StoreError>;

    /// All tasks, most recently created first.
    async fn list_all(&self, limit: usize) -> Result<Vec<Task>, StoreError>;

    /// `processing` tasks whose `updated_at` is older than the threshold.
    async fn list_stale_processing(&self, older_than: Duration) -> Result<Vec<Task>, StoreError>;

    /// Return a `processing` task to `pending` and clear its `worker_id`.
    ///
    /// `retry_count` is left untouched; the caller accounts for the attempt
    /// separately via [`TaskStore::increment_retry`].
    async fn reset_to_pending(&self, id: Uuid) -> Result<(), StoreError>;
}
