//! Server initialization and routing
//!
//! Axum setup: router configuration, middleware stack, graceful shutdown.

use crate::config::ServerConfig;
use crate::middleware::{api_key_auth, log_requests, request_id};
use crate::routes::{api_info, not_found};
use crate::routes::{feedback, health, profile, recommendations};
use crate::state::ServerState;
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the Axum router with all routes and middleware.
///
/// Public routes need no credentials; everything else passes the API-key
/// middleware which resolves the per-request identity.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = if state.config.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/", get(api_info))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics));

    // Protected routes (API key required)
    let protected_routes = Router::new()
        // Recommendations
        .route("/recommendations", get(recommendations::get_recommendations))
        .route(
            "/recommendations/tenders/{id}/similar",
            get(recommendations::get_similar_tenders),
        )
        .route(
            "/recommendations/feedback/stats",
            get(feedback::interaction_stats),
        )
        .route(
            "/recommendations/feedback/{tender_id}",
            post(feedback::record_interaction),
        )
        .route(
            "/recommendations/refresh-profile-embedding",
            post(recommendations::refresh_profile_embedding),
        )
        // Profile
        .route(
            "/company-profile",
            get(profile::get_profile).put(profile::update_profile),
        )
        .route("/company-profile/options", get(profile::profile_options))
        .layer(from_fn_with_state(state.clone(), api_key_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(not_found)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(state.config.timeout_secs),
        ))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(from_fn(request_id))
        .layer(from_fn(log_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server and block until shutdown (SIGTERM or Ctrl+C).
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .with_target(false)
        .json()
        .init();

    let state = Arc::new(ServerState::new(config.clone())?);
    let app = build_router(state);

    let addr: SocketAddr = config.socket_addr()?;
    tracing::info!(
        %addr,
        api_keys = config.api_keys.len(),
        timeout_secs = config.timeout_secs,
        rate_limit_per_minute = config.rate_limit_per_minute,
        embedding_mode = %config.embedding.mode,
        embedding_dimension = config.embedding.dimension,
        "starting tender recommendation server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
