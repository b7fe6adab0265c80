//! REST endpoints — task submission/query, onramp, search, health.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::api::model::{
    CreateTaskRequest, ListTasksQuery, SearchRequest, SearchResponse, TaskListResponse,
    TaskResponse,
};
use crate::onramp::{OnrampClient, OnrampSessionConfig};
use crate::search::ProductSearch;
use crate::store::TaskStore;
use crate::tasks::{TaskType, DEFAULT_MAX_RETRIES};

/// Default page size for task listings.
const DEFAULT_LIST_LIMIT: usize = 50;

/// Shared state for the API routes.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn TaskStore>,
    pub onramp: Option<Arc<OnrampClient>>,
    pub search: Option<Arc<ProductSearch>>,
}

/// Build the service router.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tasks/create", post(create_task))
        .route("/tasks", get(list_tasks))
        .route("/tasks/{id}", get(get_task))
        .route("/onramp", post(create_onramp_session))
        .route("/storefront/search", post(search_products))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({"error": message.into()})),
    )
        .into_response()
}

/// GET /health — liveness probe, no store dependency.
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "healthy"}))
}

/// POST /tasks/create
///
/// Validates the task type and its required input keys before anything
/// touches the queue; malformed submissions never become task rows.
async fn create_task(
    State(state): State<ApiState>,
    Json(req): Json<CreateTaskRequest>,
) -> Response {
    let task_type: TaskType = match req.task_type.parse() {
        Ok(task_type) => task_type,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    let Some(input) = req.input_data.as_object() else {
        return error_response(StatusCode::BAD_REQUEST, "input_data must be an object");
    };
    let missing: Vec<&str> = task_type
        .required_fields()
        .iter()
        .filter(|field| !input.contains_key(**field))
        .copied()
        .collect();
    if !missing.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("missing required fields for {task_type}: {}", missing.join(", ")),
        );
    }

    match state
        .store
        .create(task_type, req.input_data, DEFAULT_MAX_RETRIES)
        .await
    {
        Ok(task) => Json(TaskResponse {
            task_id: task.id,
            status: task.status,
            task_type,
            message: format!("Task created. Poll /tasks/{} for status.", task.id),
        })
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create task");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create task")
        }
    }
}

/// GET /tasks/{id} — full task row.
async fn get_task(State(state): State<ApiState>, Path(id): Path<Uuid>) -> Response {
    match state.store.get(id).await {
        Ok(Some(task)) => Json(task).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("Task {id} not found")),
        Err(e) => {
            tracing::error!(task = %id, error = %e, "Failed to fetch task");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch task")
        }
    }
}

/// GET /tasks?status=&limit= — recent tasks, optionally filtered.
async fn list_tasks(
    State(state): State<ApiState>,
    Query(query): Query<ListTasksQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let listed = match query.status {
        Some(status) => state.store.list_by_status(status, limit).await,
        None => state.store.list_all(limit).await,
    };

    match listed {
        Ok(tasks) => {
            let count = tasks.len();
            Json(TaskListResponse { tasks, count }).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list tasks");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list tasks")
        }
    }
}

/// POST /onramp — mint a fresh, single-use onramp session URL.
async fn create_onramp_session(
    State(state): State<ApiState>,
    Json(config): Json<OnrampSessionConfig>,
) -> Response {
    let Some(client) = state.onramp else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Onramp credentials not configured",
        );
    };

    match client.create_session(&config).await {
        Ok(session) => Json(serde_json::json!({
            "success": true,
            "onramp_url": session.onramp_url,
            "session_data": session.session,
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Onramp session creation failed");
            Json(serde_json::json!({
                "success": false,
                "error": e.to_string(),
            }))
            .into_response()
        }
    }
}

/// POST /storefront/search — verified product page URLs for a query.
async fn search_products(
    State(state): State<ApiState>,
    Json(req): Json<SearchRequest>,
) -> Response {
    let Some(search) = state.search else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Search API key not configured",
        );
    };

    let num_results = req.num_results.unwrap_or(5);
    match search.search_products(&req.query, num_results).await {
        Ok(results) => {
            let count = results.len();
            Json(SearchResponse {
                success: count > 0,
                results,
                count,
            })
            .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Product search failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
