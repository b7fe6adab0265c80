//! Executor interface — pluggable handlers, one per task type.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::store::TaskStore;
use crate::tasks::TaskType;

/// How an execution attempt failed.
///
/// The worker loop dispatches on this tag: a declined outcome is a correct,
/// final answer from the outside world and is never retried (retrying could
/// duplicate a real-world purchase); everything else gets the bounded retry
/// treatment.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// Definitive business-level negative outcome (e.g. payment declined).
    #[error("{reason}")]
    Declined { reason: String },

    /// Transient or unknown-cause failure; eligible for retry.
    #[error(transparent)]
    Retryable(#[from] anyhow::Error),
}

impl From<crate::error::Error> for ExecutionError {
    fn from(e: crate::error::Error) -> Self {
        Self::Retryable(e.into())
    }
}

impl ExecutionError {
    pub fn declined(reason: impl Into<String>) -> Self {
        Self::Declined {
            reason: reason.into(),
        }
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Retryable(anyhow::anyhow!(message.into()))
    }
}

/// Per-execution context handed to an executor.
///
/// Carries the task identity, its input payload, and a progress sink backed
/// by the task store.
pub struct TaskContext {
    pub task_id: Uuid,
    pub input: serde_json::Value,
    store: Arc<dyn TaskStore>,
}

impl TaskContext {
    pub fn new(task_id: Uuid, input: serde_json::Value, store: Arc<dyn TaskStore>) -> Self {
        Self {
            task_id,
            input,
            store,
        }
    }

    /// Record a progress entry on the task row.
    ///
    /// Bookkeeping failures are logged and swallowed: losing one progress
    /// line must never abort a purchase mid-flight.
    pub async fn progress(&self, message: impl Into<String>) {
        let message = message.into();
        if let Err(e) = self.store.append_progress(self.task_id, &message).await {
            tracing::warn!(task = %self.task_id, error = %e, "Failed to record progress");
        }
    }

    /// Deserialize the input payload into the executor's input type.
    pub fn parse_input<T: serde::de::DeserializeOwned>(&self) -> Result<T, ExecutionError> {
        serde_json::from_value(self.input.clone())
            .map_err(|e| ExecutionError::retryable(format!("Invalid task input: {e}")))
    }
}

/// A handler that performs the actual work for one task type.
#[async_trait]
pub trait Executor: Send + Sync {
    /// The task type this executor handles.
    fn task_type(&self) -> TaskType;

    /// Run the task to completion, reporting progress through `ctx`.
    ///
    /// Returns the terminal result payload, or a tagged failure.
    async fn execute(&self, ctx: &TaskContext) -> Result<serde_json::Value, ExecutionError>;
}

/// Registry mapping task type → executor.
///
/// Populated once at startup and injected into the worker loop; no hidden
/// process-wide state.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<TaskType, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor under its own task type.
    pub fn register(&mut self, executor: Arc<dyn Executor>) {
        let task_type = executor.task_type();
        tracing::debug!(task_type = %task_type, "Registered executor");
        self.executors.insert(task_type, executor);
    }

    /// Look up the executor for a task type.
    pub fn get(&self, task_type: TaskType) -> Option<Arc<dyn Executor>> {
        self.executors.get(&task_type).cloned()
    }

    /// Number of registered executors.
    pub fn count(&self) -> usize {
        self.executors.len()
    }
}
