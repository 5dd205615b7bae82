use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::dispatcher::{DispatchAction, DispatchResponse};
use crate::error::DispatchError;
use crate::state::{AccessLogEntry, AppState};

/// Health check response
#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub polling_initialized: bool,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.uptime_secs(),
        polling_initialized: state.supervisor.is_polling_initialized(),
    })
}

/// Dispatch one of the five known actions against the alert store and
/// vendor gateway.
///
/// On the first dispatched request, if polling is not yet initialized and
/// credentials are present, this lazily bootstraps the polling engine.
#[utoipa::path(
    post,
    path = "/dispatch",
    request_body = DispatchAction,
    responses(
        (status = 200, description = "Dispatch result"),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Upstream vendor error"),
        (status = 503, description = "Upstream vendor unavailable")
    ),
    security(("bearerAuth" = [])),
    tag = "dispatch"
)]
pub async fn dispatch_handler(
    State(state): State<Arc<AppState>>,
    Json(action): Json<DispatchAction>,
) -> Result<Json<DispatchResponse>, DispatchError> {
    state.ensure_polling_started();
    let response = state.dispatcher.dispatch(action).await?;
    Ok(Json(response))
}

/// Response for access logs endpoint
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogsResponse {
    pub logs: Vec<AccessLogEntry>,
    pub total: usize,
}

/// Get access logs
#[utoipa::path(
    get,
    path = "/access-logs",
    responses(
        (status = 200, description = "Access log entries", body = AccessLogsResponse)
    ),
    tag = "system"
)]
pub async fn access_logs_handler(State(state): State<Arc<AppState>>) -> Json<AccessLogsResponse> {
    let logs = state.get_access_logs();
    let total = logs.len();
    Json(AccessLogsResponse { logs, total })
}

/// Clear access logs
#[utoipa::path(
    delete,
    path = "/access-logs",
    responses(
        (status = 200, description = "Access logs cleared")
    ),
    tag = "system"
)]
pub async fn clear_access_logs_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    state.clear_access_logs();
    log::info!("REST API: access logs cleared");
    StatusCode::OK
}
