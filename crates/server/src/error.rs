use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use matcher::MatchError;

pub type ServerResult<T> = Result<T, ServerError>;

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Server overloaded, retry later")]
    Overloaded,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Match error: {0}")]
    Match(#[from] MatchError),

    #[error("Feedback error: {0}")]
    Feedback(#[from] feedback::FeedbackError),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] embedding::EmbeddingError),

    #[error("Validation error: {0}")]
    Domain(#[from] domain::DomainError),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found")]
    NotFound,
}

/// API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ServerError {
    /// Get HTTP status code for this error
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ServerError::RateLimitExceeded | ServerError::Overloaded => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ServerError::BadRequest(_) | ServerError::Domain(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Match(err) => match err {
                MatchError::ProfileNotFound
                | MatchError::ReferenceNotFound(_)
                | MatchError::ReferenceNotEmbedded(_) => StatusCode::NOT_FOUND,
                MatchError::ProfileIncomplete => StatusCode::CONFLICT,
                MatchError::InvalidFilters(_) => StatusCode::BAD_REQUEST,
                MatchError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
                MatchError::Embedding(inner) => embedding_status(inner),
            },
            ServerError::Feedback(feedback::FeedbackError::QueueFull) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ServerError::Feedback(_) | ServerError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Embedding(inner) => embedding_status(inner),
            ServerError::Internal(_) | ServerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    fn error_code(&self) -> &'static str {
        match self {
            ServerError::Authentication(_) => "AUTH_FAILED",
            ServerError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ServerError::Overloaded => "OVERLOADED",
            ServerError::BadRequest(_) => "BAD_REQUEST",
            ServerError::Domain(_) => "VALIDATION_ERROR",
            ServerError::Match(err) => match err {
                MatchError::ProfileNotFound => "PROFILE_NOT_FOUND",
                MatchError::ProfileIncomplete => "PROFILE_INCOMPLETE",
                MatchError::ReferenceNotFound(_) => "TENDER_NOT_FOUND",
                MatchError::ReferenceNotEmbedded(_) => "REFERENCE_NOT_EMBEDDED",
                MatchError::InvalidFilters(_) => "INVALID_FILTERS",
                MatchError::Store(_) => "VECTOR_STORE_UNAVAILABLE",
                MatchError::Embedding(_) => "EMBEDDING_ERROR",
            },
            ServerError::Feedback(feedback::FeedbackError::QueueFull) => "QUEUE_FULL",
            ServerError::Feedback(_) => "FEEDBACK_ERROR",
            ServerError::Store(_) => "STORE_ERROR",
            ServerError::Embedding(_) => "EMBEDDING_ERROR",
            ServerError::Internal(_) => "INTERNAL_ERROR",
            ServerError::Config(_) => "CONFIG_ERROR",
            ServerError::NotFound => "NOT_FOUND",
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            ServerError::RateLimitExceeded | ServerError::Overloaded => Some(2),
            ServerError::Feedback(feedback::FeedbackError::QueueFull) => Some(1),
            _ => None,
        }
    }
}

fn embedding_status(err: &embedding::EmbeddingError) -> StatusCode {
    match err {
        embedding::EmbeddingError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        embedding::EmbeddingError::InputInvalid(_) => StatusCode::BAD_REQUEST,
        embedding::EmbeddingError::InvalidConfig(_)
        | embedding::EmbeddingError::DimensionMismatch { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code().to_string();
        let retry_after = self.retry_after();
        let message = self.to_string();

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        let mut response = (status, body).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = seconds.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<std::net::AddrParseError> for ServerError {
    fn from(err: std::net::AddrParseError) -> Self {
        ServerError::Config(format!("Invalid address: {err}"))
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Internal(format!("IO error: {err}"))
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::BadRequest(format!("JSON parse error: {err}"))
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_errors_map_to_spec_status_codes() {
        assert_eq!(
            ServerError::Match(MatchError::ProfileNotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::Match(MatchError::ProfileIncomplete).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServerError::Match(MatchError::InvalidFilters("x".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::Match(MatchError::ReferenceNotEmbedded("t".into())).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn shed_errors_carry_retry_after() {
        assert_eq!(ServerError::Overloaded.retry_after(), Some(2));
        assert_eq!(ServerError::RateLimitExceeded.retry_after(), Some(2));
        assert_eq!(
            ServerError::Feedback(feedback::FeedbackError::QueueFull).retry_after(),
            Some(1)
        );
        assert_eq!(ServerError::NotFound.retry_after(), None);
    }
}
