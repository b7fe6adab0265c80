//! API request/response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tasks::{Task, TaskStatus, TaskType};

/// Body of `POST /tasks/create`.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub task_type: String,
    pub input_data: serde_json::Value,
}

/// Reply to a successful task creation.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub message: String,
}

/// Reply to `GET /tasks`.
#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
    pub count: usize,
}

/// Query string of `GET /tasks`.
#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    pub status: Option<TaskStatus>,
    pub limit: Option<usize>,
}

/// Body of `POST /storefront/search`.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub num_results: Option<usize>,
}

/// Reply to `POST /storefront/search`.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub results: Vec<String>,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_parses() {
        let req: CreateTaskRequest = serde_json::from_str(
            r#"{"task_type": "ride_booking", "input_data": {"from_address": "a", "to_address": "b"}}"#,
        )
        .unwrap();
        assert_eq!(req.task_type, "ride_booking");
        assert!(req.input_data.is_object());
    }

    #[test]
    fn list_query_accepts_status_names() {
        let query: ListTasksQuery =
            serde_json::from_str(r#"{"status": "processing", "limit": 10}"#).unwrap();
        assert_eq!(query.status, Some(TaskStatus::Processing));
        assert_eq!(query.limit, Some(10));

        let empty: ListTasksQuery = serde_json::from_str("{}").unwrap();
        assert!(empty.status.is_none());
        assert!(empty.limit.is_none());
    }
}
