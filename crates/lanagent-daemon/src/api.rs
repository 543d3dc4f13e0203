//! REST API handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lanagent_core::{Device, ScanResult};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::state::AppState;

/// API error response
#[derive(Serialize)]
struct ApiError {
    error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

/// Body of `GET /scan`
#[derive(Serialize)]
pub struct ScanResponse<'a> {
    status: &'static str,
    count: usize,
    devices: &'a [Device],
}

impl<'a> From<&'a ScanResult> for ScanResponse<'a> {
    fn from(result: &'a ScanResult) -> Self {
        Self {
            status: "success",
            count: result.devices.len(),
            devices: &result.devices,
        }
    }
}

/// Latest scan results
///
/// Always answers 200 with whatever the last successful scan produced.
pub async fn scan_results(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.snapshot().await;
    debug!(devices = snapshot.len(), "Serving scan results");
    Json(ScanResponse::from(snapshot.as_ref())).into_response()
}

/// Fallback for unknown routes
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ApiError::new("Endpoint not found")))
}
