//! Health handler

use crate::state::AppState;
use axum::{extract::State, Json};
use civic_storage::ComplaintStore;
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime: String,
    pub storage: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "ok".to_string(),
        service: "civicd".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
        storage: state.storage.backend_name().to_string(),
    })
}
