use crate::error::ServerResult;
use crate::state::ServerState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use std::time::SystemTime;

/// Global server start time for uptime calculation
static SERVER_START_TIME: once_cell::sync::Lazy<SystemTime> =
    once_cell::sync::Lazy::new(SystemTime::now);

fn uptime_seconds() -> u64 {
    SERVER_START_TIME.elapsed().map(|d| d.as_secs()).unwrap_or(0)
}

/// Health check endpoint (liveness)
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "tender-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds(),
    }))
}

/// Readiness check endpoint
pub async fn readiness_check(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<impl IntoResponse> {
    // The stores are in-process; readiness is a cheap count probe.
    let tender_count = state.tenders.count()?;

    Ok(Json(json!({
        "status": "ready",
        "service": "tender-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds(),
        "components": {
            "api": "ready",
            "store": "ready",
        },
        "tender_count": tender_count,
        "in_flight": state.in_flight_count(),
    })))
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    match &state.metrics_handle {
        Some(handle) => Ok(handle.render().into_response()),
        None => Ok(Json(json!({
            "uptime_seconds": uptime_seconds(),
            "interactions_logged": state.feedback.log_len(),
        }))
        .into_response()),
    }
}
