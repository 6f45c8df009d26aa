use crate::error::ServerError;
use crate::state::ServerState;
use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

/// API key authentication middleware. Resolves the key to an identity and
/// injects it as a request extension; handlers never see the key itself.
pub async fn api_key_auth(
    state: axum::extract::State<Arc<ServerState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let api_key = request
        .headers()
        .get("x-api-key")
        .or_else(|| request.headers().get(AUTHORIZATION))
        .and_then(|v| v.to_str().ok())
        .map(|s| {
            // Handle "Bearer <token>" format
            s.strip_prefix("Bearer ").unwrap_or(s).to_string()
        });

    let Some(key) = api_key else {
        return Err(ServerError::Authentication(
            "API key required. Provide it in 'X-API-Key' or 'Authorization: Bearer <key>' header"
                .to_string(),
        ));
    };

    let Some(identity) = state.identity_for_key(&key) else {
        return Err(ServerError::Authentication("Invalid API key".to_string()));
    };

    if !state.check_rate_limit(&key) {
        return Err(ServerError::RateLimitExceeded);
    }

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Request ID injection middleware
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Logging middleware
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    let response = next.run(request).await;
    let duration = start.elapsed();
    let status = response.status();

    metrics::counter!("http_requests_total").increment(1);
    metrics::histogram!("http_request_duration_seconds").record(duration.as_secs_f64());

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = %duration.as_millis(),
        request_id = %request_id,
        "request completed"
    );

    response
}
