//! Health check endpoint.

use axum::{extract::State, Json};
use std::time::SystemTime;
use tracing::instrument;

use crate::api::models::{HealthResponse, HealthStatus};
use crate::app_state::AppState;

/// Returns service health and the current session's progress.
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = SystemTime::now()
        .duration_since(state.start_time)
        .unwrap_or_default()
        .as_secs();

    let session = match state.current_session() {
        Some(session) => Some(session.status().await),
        None => None,
    };

    let status = if session.is_some() {
        HealthStatus::Healthy
    } else {
        HealthStatus::Idle
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        session,
    })
}
