//! Task data model and lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default retry ceiling for newly created tasks.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// The kind of purchasing flow a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    RideBooking,
    StorefrontOrder,
}

impl TaskType {
    /// Input keys that must be present before a task of this type is accepted.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Self::RideBooking => &["from_address", "to_address"],
            Self::StorefrontOrder => &["product_url", "size"],
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RideBooking => "ride_booking",
            Self::StorefrontOrder => "storefront_order",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ride_booking" => Ok(Self::RideBooking),
            "storefront_order" => Ok(Self::StorefrontOrder),
            other => Err(format!("unknown task type: {other}")),
        }
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be claimed by a worker.
    Pending,
    /// Claimed and owned by exactly one worker.
    Processing,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed,
}

impl TaskStatus {
    /// Check whether the lifecycle permits moving to `target`.
    ///
    /// A task never reaches a terminal state without passing through
    /// `Processing`, and nothing leaves a terminal state.
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self, target),
            (Pending, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, Pending)
        )
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// One progress update recorded while a task runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// A queued unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique ID, generated at creation.
    pub id: Uuid,
    /// Selects the executor; immutable after creation.
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Opaque input payload, interpreted only by the matching executor.
    pub input: serde_json::Value,
    /// Progress entries plus terminal output fields; absent until first write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Failure description; present only when `status` is `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Times a processing attempt has failed and been recycled.
    pub retry_count: u32,
    /// Ceiling on `retry_count`, set at creation.
    pub max_retries: u32,
    /// Worker currently or most recently owning the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Changes on every mutation; staleness signal for the reaper.
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Parse the progress entries out of the result payload, oldest first.
    pub fn progress(&self) -> Vec<ProgressEntry> {
        self.result
            .as_ref()
            .and_then(|r| r.get("progress"))
            .and_then(|p| serde_json::from_value(p.clone()).ok())
            .unwrap_or_default()
    }

    /// Whether another retry is permitted after a failed attempt.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}
