//! libSQL backend — async `TaskStore` implementation.
//!
//! All cross-worker coordination runs through single conditional statements
//! (claim, retry increment, progress append), so the at-most-one-claimant
//! guarantee holds even with multiple worker processes on one database.
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::migrations;
use crate::store::traits::TaskStore;
use crate::tasks::{Task, TaskStatus, TaskType};

/// Column order shared by every SELECT/RETURNING in this module.
const TASK_COLUMNS: &str = "id, type, status, input, result, error_message, \
     retry_count, max_retries, worker_id, created_at, updated_at, started_at, completed_at";

/// libSQL task store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<Database>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Task database opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn fetch_list(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Task>, StoreError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| StoreError::Query(format!("List query failed: {e}")))?;

        let mut tasks = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read task row: {e}")))?
        {
            tasks.push(row_to_task(&row)?);
        }
        Ok(tasks)
    }

    /// Force `updated_at` to a specific instant (staleness tests).
    #[cfg(test)]
    pub(crate) async fn set_updated_at(&self, id: Uuid, at: DateTime<Utc>) {
        self.conn()
            .execute(
                "UPDATE tasks SET updated_at = ?1 WHERE id = ?2",
                libsql::params![fmt_ts(at), id.to_string()],
            )
            .await
            .unwrap();
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Canonical timestamp format: fixed-width RFC 3339 UTC, so lexicographic
/// comparison in SQL matches chronological order.
fn fmt_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|s| parse_datetime(&s))
}

/// Map a libsql Row to a Task. Column order matches `TASK_COLUMNS`.
fn row_to_task(row: &libsql::Row) -> Result<Task, StoreError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| StoreError::Query(format!("Failed to read task id: {e}")))?;
    let type_str: String = row
        .get(1)
        .map_err(|e| StoreError::Query(format!("Failed to read task type: {e}")))?;
    let status_str: String = row
        .get(2)
        .map_err(|e| StoreError::Query(format!("Failed to read task status: {e}")))?;
    let input_str: String = row
        .get(3)
        .map_err(|e| StoreError::Query(format!("Failed to read task input: {e}")))?;
    let result_str: Option<String> = row.get(4).ok();
    let error_message: Option<String> = row.get(5).ok();
    let retry_count: i64 = row
        .get(6)
        .map_err(|e| StoreError::Query(format!("Failed to read retry count: {e}")))?;
    let max_retries: i64 = row
        .get(7)
        .map_err(|e| StoreError::Query(format!("Failed to read retry ceiling: {e}")))?;
    let worker_id: Option<String> = row.get(8).ok();
    let created_str: String = row
        .get(9)
        .map_err(|e| StoreError::Query(format!("Failed to read created_at: {e}")))?;
    let updated_str: String = row
        .get(10)
        .map_err(|e| StoreError::Query(format!("Failed to read updated_at: {e}")))?;
    let started_str: Option<String> = row.get(11).ok();
    let completed_str: Option<String> = row.get(12).ok();

    let id = Uuid::parse_str(&id_str)
        .map_err(|e| StoreError::Serialization(format!("Invalid task id '{id_str}': {e}")))?;
    let task_type: TaskType = type_str
        .parse()
        .map_err(|e| StoreError::Serialization(format!("{e}")))?;
    let status: TaskStatus = status_str
        .parse()
        .map_err(|e| StoreError::Serialization(format!("{e}")))?;
    let input = serde_json::from_str(&input_str)
        .map_err(|e| StoreError::Serialization(format!("Invalid task input JSON: {e}")))?;
    let result = match result_str {
        Some(s) => Some(
            serde_json::from_str(&s)
                .map_err(|e| StoreError::Serialization(format!("Invalid task result JSON: {e}")))?,
        ),
        None => None,
    };

    Ok(Task {
        id,
        task_type,
        status,
        input,
        result,
        error_message,
        retry_count: retry_count as u32,
        max_retries: max_retries as u32,
        worker_id,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
        started_at: parse_optional_datetime(started_str),
        completed_at: parse_optional_datetime(completed_str),
    })
}

#[async_trait]
impl TaskStore for LibSqlStore {
    async fn create(
        &self,
        task_type: TaskType,
        input: serde_json::Value,
        max_retries: u32,
    ) -> Result<Task, StoreError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let input_str = serde_json::to_string(&input)
            .map_err(|e| StoreError::Serialization(format!("Failed to encode input: {e}")))?;

        self.conn()
            .execute(
                "INSERT INTO tasks (id, type, status, input, retry_count, max_retries, created_at, updated_at)
                 VALUES (?1, ?2, 'pending', ?3, 0, ?4, ?5, ?5)",
                libsql::params![
                    id.to_string(),
                    task_type.to_string(),
                    input_str,
                    max_retries as i64,
                    fmt_ts(now)
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to insert task: {e}")))?;

        debug!(task = %id, task_type = %task_type, "Created task");

        Ok(Task {
            id,
            task_type,
            status: TaskStatus::Pending,
            input,
            result: None,
            error_message: None,
            retry_count: 0,
            max_retries,
            worker_id: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        })
    }

    async fn get(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                libsql::params![id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to fetch task: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read task row: {e}")))?
        {
            Some(row) => Ok(Some(row_to_task(&row)?)),
            None => Ok(None),
        }
    }

    async fn claim_next_pending(&self, worker_id: &str) -> Result<Option<Task>, StoreError> {
        // Claim in one conditional statement: select the oldest pending row
        // and transition it in the same step. A concurrent claimant either
        // wins the row or matches nothing.
        let sql = format!(
            "UPDATE tasks
                SET status = 'processing', worker_id = ?1, started_at = ?2, updated_at = ?2
              WHERE id = (
                        SELECT id FROM tasks
                         WHERE status = 'pending'
                         ORDER BY created_at ASC, rowid ASC
                         LIMIT 1
                    )
                AND status = 'pending'
             RETURNING {TASK_COLUMNS}"
        );

        let mut rows = self
            .conn()
            .query(
                &sql,
                libsql::params![worker_id, fmt_ts(Utc::now())],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Claim failed: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read claimed row: {e}")))?
        {
            Some(row) => {
                let task = row_to_task(&row)?;
                debug!(task = %task.id, worker = %worker_id, "Claimed task");
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        result: Option<&serde_json::Value>,
        error_message: Option<&str>,
        worker_id: Option<&str>,
    ) -> Result<Task, StoreError> {
        let now = fmt_ts(Utc::now());
        let mut sets = vec!["status = ?".to_string(), "updated_at = ?".to_string()];
        let mut values: Vec<Value> =
            vec![Value::Text(status.to_string()), Value::Text(now.clone())];

        if let Some(result) = result {
            // Merge rather than replace: terminal output fields land next to
            // the accumulated progress array instead of clobbering it.
            sets.push("result = json_patch(COALESCE(result, '{}'), json(?))".to_string());
            let payload = serde_json::to_string(result)
                .map_err(|e| StoreError::Serialization(format!("Failed to encode result: {e}")))?;
            values.push(Value::Text(payload));
        }
        if let Some(message) = error_message {
            sets.push("error_message = ?".to_string());
            values.push(Value::Text(message.to_string()));
        }
        if let Some(worker) = worker_id {
            sets.push("worker_id = ?".to_string());
            values.push(Value::Text(worker.to_string()));
        }
        match status {
            TaskStatus::Processing => {
                sets.push("started_at = ?".to_string());
                values.push(Value::Text(now.clone()));
            }
            TaskStatus::Completed | TaskStatus::Failed => {
                sets.push("completed_at = ?".to_string());
                values.push(Value::Text(now.clone()));
            }
            TaskStatus::Pending => {}
        }

        // The terminal guard makes duplicate finalizations no-ops: nothing
        // modifies a completed or failed row, so completed_at is set once.
        let sql = format!(
            "UPDATE tasks SET {} WHERE id = ? AND status NOT IN ('completed', 'failed') \
             RETURNING {TASK_COLUMNS}",
            sets.join(", ")
        );
        values.push(Value::Text(id.to_string()));

        let mut rows = self
            .conn()
            .query(&sql, libsql::params_from_iter(values))
            .await
            .map_err(|e| StoreError::Query(format!("Status update failed: {e}")))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read updated row: {e}")))?
        {
            return row_to_task(&row);
        }

        // No row matched: either the task is gone or it already reached a
        // terminal state. The latter is a no-op by policy.
        match self.get(id).await? {
            Some(existing) => {
                debug!(
                    task = %id,
                    status = %existing.status,
                    requested = %status,
                    "Ignoring status update on finalized task"
                );
                Ok(existing)
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn append_progress(&self, id: Uuid, message: &str) -> Result<(), StoreError> {
        let now = Utc::now();
        let entry = serde_json::json!({
            "message": message,
            "timestamp": now,
        });
        let entry_str = serde_json::to_string(&entry)
            .map_err(|e| StoreError::Serialization(format!("Failed to encode progress: {e}")))?;

        // Single-statement JSON append: no read-modify-write window in which
        // a concurrent writer's entries could be dropped.
        let affected = self
            .conn()
            .execute(
                "UPDATE tasks
                    SET result = json_set(
                            COALESCE(result, '{}'),
                            '$.progress',
                            json_insert(
                                COALESCE(json_extract(result, '$.progress'), '[]'),
                                '$[#]',
                                json(?1)
                            )
                        ),
                        updated_at = ?2
                  WHERE id = ?3",
                libsql::params![entry_str, fmt_ts(now), id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Progress append failed: {e}")))?;

        if affected == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn increment_retry(&self, id: Uuid) -> Result<Task, StoreError> {
        let sql = format!(
            "UPDATE tasks SET retry_count = retry_count + 1, updated_at = ?1
              WHERE id = ?2
             RETURNING {TASK_COLUMNS}"
        );
        let mut rows = self
            .conn()
            .query(&sql, libsql::params![fmt_ts(Utc::now()), id.to_string()])
            .await
            .map_err(|e| StoreError::Query(format!("Retry increment failed: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read updated row: {e}")))?
        {
            Some(row) => row_to_task(&row),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn list_by_status(
        &self,
        status: TaskStatus,
        limit: usize,
    ) -> Result<Vec<Task>, StoreError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks
              WHERE status = ?1
              ORDER BY created_at DESC LIMIT ?2"
        );
        self.fetch_list(&sql, libsql::params![status.to_string(), limit as i64])
            .await
    }

    async fn list_all(&self, limit: usize) -> Result<Vec<Task>, StoreError> {
        let sql =
            format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC LIMIT ?1");
        self.fetch_list(&sql, libsql::params![limit as i64]).await
    }

    async fn list_stale_processing(&self, older_than: Duration) -> Result<Vec<Task>, StoreError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(older_than)
                .map_err(|e| StoreError::Query(format!("Invalid staleness threshold: {e}")))?;
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks
              WHERE status = 'processing' AND updated_at < ?1
              ORDER BY updated_at ASC"
        );
        self.fetch_list(&sql, libsql::params![fmt_ts(cutoff)]).await
    }

    async fn reset_to_pending(&self, id: Uuid) -> Result<(), StoreError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE tasks SET status = 'pending', worker_id = NULL, updated_at = ?1
                  WHERE id = ?2 AND status = 'processing'",
                libsql::params![fmt_ts(Utc::now()), id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Reset failed: {e}")))?;

        if affected == 0 {
            match self.get(id).await? {
                Some(existing) => {
                    // Already finalized or re-claimed elsewhere; nothing to do.
                    debug!(task = %id, status = %existing.status, "Skipping reset of non-processing task");
                    Ok(())
                }
                None => Err(StoreError::NotFound(id)),
            }
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> Arc<LibSqlStore> {
        Arc::new(LibSqlStore::new_memory().await.unwrap())
    }

    fn ride_input() -> serde_json::Value {
        serde_json::json!({"from_address": "1 Main St", "to_address": "2 Oak Ave"})
    }

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let store = test_store().await;
        let created = store
            .create(TaskType::RideBooking, ride_input(), 3)
            .await
            .unwrap();

        assert_eq!(created.status, TaskStatus::Pending);
        assert_eq!(created.retry_count, 0);
        assert_eq!(created.max_retries, 3);
        assert!(created.result.is_none());
        assert!(created.worker_id.is_none());

        let fetched = store.get(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.task_type, TaskType::RideBooking);
        assert_eq!(fetched.status, TaskStatus::Pending);
        assert_eq!(fetched.input, ride_input());
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = test_store().await;
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_transitions_and_sets_ownership() {
        let store = test_store().await;
        let created = store
            .create(TaskType::StorefrontOrder, serde_json::json!({}), 3)
            .await
            .unwrap();

        let claimed = store.claim_next_pending("worker-a").await.unwrap().unwrap();
        assert_eq!(claimed.id, created.id);
        assert_eq!(claimed.status, TaskStatus::Processing);
        assert_eq!(claimed.worker_id.as_deref(), Some("worker-a"));
        assert!(claimed.started_at.is_some());

        // Nothing pending remains.
        assert!(store.claim_next_pending("worker-b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_is_fifo_by_creation() {
        let store = test_store().await;
        let mut ids = Vec::new();
        for _ in 0..3 {
            let task = store
                .create(TaskType::RideBooking, ride_input(), 3)
                .await
                .unwrap();
            ids.push(task.id);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        for expected in &ids {
            let claimed = store.claim_next_pending("w").await.unwrap().unwrap();
            assert_eq!(claimed.id, *expected);
        }
    }

    #[tokio::test]
    async fn claim_is_exclusive_under_concurrency() {
        let store = test_store().await;
        store
            .create(TaskType::RideBooking, ride_input(), 3)
            .await
            .unwrap();

        let claims = futures::future::join_all((0..8).map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.claim_next_pending(&format!("worker-{i}")).await })
        }))
        .await;

        let winners = claims
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .filter(|claim| claim.is_some())
            .count();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn progress_is_append_only_and_ordered() {
        let store = test_store().await;
        let task = store
            .create(TaskType::StorefrontOrder, serde_json::json!({}), 3)
            .await
            .unwrap();

        for message in ["A", "B", "C"] {
            store.append_progress(task.id, message).await.unwrap();
        }

        let progress = store.get(task.id).await.unwrap().unwrap().progress();
        let messages: Vec<&str> = progress.iter().map(|p| p.message.as_str()).collect();
        assert_eq!(messages, ["A", "B", "C"]);
    }

    #[tokio::test]
    async fn result_merge_preserves_progress() {
        let store = test_store().await;
        let task = store
            .create(TaskType::StorefrontOrder, serde_json::json!({}), 3)
            .await
            .unwrap();
        store.claim_next_pending("w").await.unwrap().unwrap();
        store.append_progress(task.id, "step one").await.unwrap();

        let updated = store
            .update_status(
                task.id,
                TaskStatus::Completed,
                Some(&serde_json::json!({"success": true, "message": "done"})),
                None,
                None,
            )
            .await
            .unwrap();

        assert_eq!(updated.status, TaskStatus::Completed);
        let result = updated.result.clone().unwrap();
        assert_eq!(result["success"], serde_json::json!(true));
        assert_eq!(result["message"], serde_json::json!("done"));
        // Terminal fields merged in next to the progress array, not over it.
        assert_eq!(updated.progress().len(), 1);
        assert_eq!(updated.progress()[0].message, "step one");
    }

    #[tokio::test]
    async fn finalization_is_idempotent() {
        let store = test_store().await;
        let task = store
            .create(TaskType::RideBooking, ride_input(), 3)
            .await
            .unwrap();
        store.claim_next_pending("w").await.unwrap().unwrap();

        let first = store
            .update_status(task.id, TaskStatus::Completed, None, None, None)
            .await
            .unwrap();
        let completed_at = first.completed_at.unwrap();

        // A duplicate finalization must not move completed_at or status.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store
            .update_status(
                task.id,
                TaskStatus::Failed,
                None,
                Some("late failure report"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(second.status, TaskStatus::Completed);
        assert_eq!(second.completed_at.unwrap(), completed_at);
        assert!(second.error_message.is_none());
    }

    #[tokio::test]
    async fn increment_retry_returns_updated_row() {
        let store = test_store().await;
        let task = store
            .create(TaskType::RideBooking, ride_input(), 3)
            .await
            .unwrap();

        let updated = store.increment_retry(task.id).await.unwrap();
        assert_eq!(updated.retry_count, 1);
        let updated = store.increment_retry(task.id).await.unwrap();
        assert_eq!(updated.retry_count, 2);
    }

    #[tokio::test]
    async fn reset_to_pending_clears_worker_keeps_retries() {
        let store = test_store().await;
        let task = store
            .create(TaskType::RideBooking, ride_input(), 3)
            .await
            .unwrap();
        store.claim_next_pending("w").await.unwrap().unwrap();
        store.increment_retry(task.id).await.unwrap();

        store.reset_to_pending(task.id).await.unwrap();

        let fetched = store.get(task.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Pending);
        assert!(fetched.worker_id.is_none());
        assert_eq!(fetched.retry_count, 1);
    }

    #[tokio::test]
    async fn list_by_status_newest_first_with_limit() {
        let store = test_store().await;
        let mut ids = Vec::new();
        for _ in 0..3 {
            let task = store
                .create(TaskType::RideBooking, ride_input(), 3)
                .await
                .unwrap();
            ids.push(task.id);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let listed = store.list_by_status(TaskStatus::Pending, 2).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, ids[2]);
        assert_eq!(listed[1].id, ids[1]);

        assert!(store
            .list_by_status(TaskStatus::Completed, 10)
            .await
            .unwrap()
            .is_empty());

        assert_eq!(store.list_all(50).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn stale_processing_detection() {
        let store = test_store().await;
        let task = store
            .create(TaskType::RideBooking, ride_input(), 3)
            .await
            .unwrap();
        store.claim_next_pending("w").await.unwrap().unwrap();

        let threshold = std::time::Duration::from_secs(600);
        assert!(store.list_stale_processing(threshold).await.unwrap().is_empty());

        store
            .set_updated_at(task.id, Utc::now() - chrono::Duration::seconds(900))
            .await;

        let stale = store.list_stale_processing(threshold).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, task.id);
    }

    #[tokio::test]
    async fn mutations_on_missing_task_are_not_found() {
        let store = test_store().await;
        let ghost = Uuid::new_v4();

        assert!(matches!(
            store.append_progress(ghost, "hello").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.increment_retry(ghost).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store
                .update_status(ghost, TaskStatus::Failed, None, None, None)
                .await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.reset_to_pending(ghost).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
