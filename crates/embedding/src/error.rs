use thiserror::Error;

/// Errors surfaced by the embedding client.
#[derive(Debug, Error, Clone)]
pub enum EmbeddingError {
    /// The remote embedding service failed or timed out. Retriable.
    #[error("embedding upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    /// The input text cannot be embedded (empty or over the size cap).
    /// Not retriable; callers skip the item.
    #[error("invalid embedding input: {0}")]
    InputInvalid(String),
    /// Configuration is inconsistent (e.g. api mode without an endpoint).
    #[error("invalid embedding config: {0}")]
    InvalidConfig(String),
    /// The upstream returned a vector of the wrong dimension. The vector is
    /// discarded and never cached or persisted.
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

impl EmbeddingError {
    /// Whether a retry could plausibly succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, EmbeddingError::UpstreamUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_upstream_failures_are_retriable() {
        assert!(EmbeddingError::UpstreamUnavailable("503".into()).is_retriable());
        assert!(!EmbeddingError::InputInvalid("empty".into()).is_retriable());
        assert!(!EmbeddingError::DimensionMismatch { expected: 384, got: 768 }.is_retriable());
    }
}
