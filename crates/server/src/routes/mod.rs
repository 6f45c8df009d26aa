//! API route handlers
//!
//! Routes are organized by functionality:
//!
//! - `health`: health checks, readiness, and metrics
//! - `recommendations`: the ranked recommendation feed and similar-tender
//!   lookup
//! - `feedback`: interaction recording and per-user stats
//! - `profile`: company matching-profile reads and updates

pub mod feedback;
pub mod health;
pub mod profile;
pub mod recommendations;

use crate::error::{ServerError, ServerResult};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// API version and base info. Root endpoint, no authentication.
pub async fn api_info() -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "name": "Tendermatch Server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/recommendations",
            "/recommendations/tenders/{id}/similar",
            "/recommendations/feedback/{tender_id}",
            "/recommendations/refresh-profile-embedding",
            "/company-profile",
            "/company-profile/options",
            "/health",
            "/ready",
            "/metrics"
        ]
    })))
}

/// 404 Not Found handler for undefined routes.
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
