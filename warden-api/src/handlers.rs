use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use warden_common::{record_timestamp, LifecycleError, ServerRecord};
use warden_providers::RegistryStore;

use crate::app::AppState;

// --- DTOs ---

#[derive(Debug, Deserialize)]
pub struct ServerActionRequest {
    #[serde(rename = "serverID")]
    pub server_id: String,
    #[serde(rename = "serverName")]
    pub server_name: String,
}

#[derive(Debug, Deserialize)]
pub struct TerminateRequest {
    #[serde(rename = "serverID")]
    pub server_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(rename = "serverID")]
    pub server_id: String,
    #[serde(rename = "serverName")]
    pub server_name: String,
    #[serde(rename = "serverIP", default)]
    pub address: Option<String>,
    #[serde(rename = "isRunning", default)]
    pub is_running: bool,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub message: &'static str,
    #[serde(rename = "serverIP")]
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub state: String,
    #[serde(rename = "serverIP")]
    pub address: Option<String>,
}

// --- Handlers ---

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

pub async fn start_server(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ServerActionRequest>,
) -> Response {
    let cancel = CancellationToken::new();
    match state
        .orchestrator
        .start(&req.server_id, &req.server_name, &cancel)
        .await
    {
        Ok(address) => Json(StartResponse {
            message: "server running",
            address,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn stop_server(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ServerActionRequest>,
) -> Response {
    let cancel = CancellationToken::new();
    match state
        .orchestrator
        .stop(&req.server_id, &req.server_name, &cancel)
        .await
    {
        Ok(()) => Json(json!({"message": "server stopping"})).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn terminate_server(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TerminateRequest>,
) -> Response {
    let cancel = CancellationToken::new();
    match state.orchestrator.terminate(&req.server_id, &cancel).await {
        Ok(()) => Json(json!({"message": "server terminated"})).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn ping_server(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.orchestrator.ping(&id).await {
        Ok(result) => Json(PingResponse {
            state: result.state.to_string(),
            address: result.address,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn list_servers(State(state): State<Arc<AppState>>) -> Response {
    match state.registry.list().await {
        Ok(records) => Json(records).into_response(),
        Err(e) => error_response(LifecycleError::Registry(e.to_string())),
    }
}

/// Registers a known instance without touching it; the next start/stop
/// reconciles the record against the live state.
pub async fn register_server(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Response {
    let record = ServerRecord {
        id: req.server_id,
        address: req.address,
        name: req.server_name,
        last_updated: record_timestamp(),
        is_running: req.is_running,
    };

    match state.registry.put(&record).await {
        Ok(()) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => error_response(LifecycleError::Registry(e.to_string())),
    }
}

/// One envelope for every failure: a stable machine-readable code plus
/// the human-readable cause.
pub fn error_response(err: LifecycleError) -> Response {
    let status = match &err {
        LifecycleError::InvalidStateForTransition { .. }
        | LifecycleError::AddressUnavailable => StatusCode::CONFLICT,
        LifecycleError::TerminateDisabled => StatusCode::FORBIDDEN,
        LifecycleError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        LifecycleError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    };

    tracing::warn!(code = err.code(), %err, "request failed");
    (
        status,
        Json(json!({"error": err.code(), "message": err.to_string()})),
    )
        .into_response()
}
