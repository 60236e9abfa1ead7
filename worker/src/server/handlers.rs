//! HTTP request handlers

use std::sync::Arc;

use axum::{body::Bytes, extract::State, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::models::outcome::DeploymentOutcome;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub invocations: u64,
}

/// Health check handler
pub async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "deployworker".to_string(),
        version: version.version,
        invocations: state.invocations(),
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

/// Deployment handler.
///
/// Always answers with a deployment outcome, including for bodies that are
/// not JSON at all.
pub async fn run_handler(State(state): State<Arc<ServerState>>, body: Bytes) -> impl IntoResponse {
    let event: Value = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            return Json(DeploymentOutcome::failed(format!(
                "Request body is not valid JSON: {}",
                e
            )));
        }
    };

    let _guard = state.invocation_lock.lock().await;
    let invocation = state.next_invocation();
    info!("Handling invocation #{}", invocation);

    Json(state.orchestrator.handle(event).await)
}
