use serde::{Deserialize, Serialize};

use crate::retry::RetryConfig;

/// Runtime configuration for the embedding client.
///
/// # Example
/// ```no_run
/// use embedding::EmbeddingConfig;
///
/// let cfg = EmbeddingConfig {
///     mode: "api".into(),
///     api_url: Some("https://embeddings.internal/v1/embed".into()),
///     api_auth_header: Some("Bearer token".into()),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Invocation mode: `"api"` (remote HTTP service) or `"stub"`
    /// (deterministic local vectors for tests and offline runs).
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Identifier of the embedding model; part of every cache key so a model
    /// swap never serves stale vectors.
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Fixed output dimension D. Vectors of any other length are rejected.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Remote endpoint when `mode` is `"api"`.
    #[serde(default)]
    pub api_url: Option<String>,
    /// Authorization header value (e.g. `"Bearer xyz"`).
    #[serde(default)]
    pub api_auth_header: Option<String>,
    /// Overall request timeout in seconds.
    #[serde(default = "default_api_timeout_secs")]
    pub api_timeout_secs: u64,
    /// L2-normalize returned vectors. Cosine scoring assumes unit length, so
    /// leave this on unless the upstream already normalizes.
    #[serde(default = "default_true")]
    pub normalize: bool,
    /// Truncation cap applied to raw tender descriptions during composition.
    #[serde(default = "default_max_compose_chars")]
    pub max_compose_chars: usize,
    /// Hard cap on a single embed input; longer texts are `InputInvalid`.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    /// Entries held by the content-addressed vector cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Enable retry + circuit breaking around remote calls.
    #[serde(default = "default_true")]
    pub enable_resilience: bool,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_mode() -> String {
    "api".to_string()
}

fn default_model_id() -> String {
    "text-embed-v1".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_api_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_max_compose_chars() -> usize {
    2000
}

fn default_max_input_chars() -> usize {
    8192
}

fn default_cache_capacity() -> usize {
    4096
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            model_id: default_model_id(),
            dimension: default_dimension(),
            api_url: None,
            api_auth_header: None,
            api_timeout_secs: default_api_timeout_secs(),
            normalize: default_true(),
            max_compose_chars: default_max_compose_chars(),
            max_input_chars: default_max_input_chars(),
            cache_capacity: default_cache_capacity(),
            enable_resilience: default_true(),
            retry: RetryConfig::default(),
        }
    }
}

impl EmbeddingConfig {
    /// Read the deployment environment variables, falling back to defaults:
    /// `EMBEDDING_MODEL_ID`, `EMBEDDING_DIMENSION`, `EMBEDDING_ENDPOINT`,
    /// `EMBEDDING_AUTH_HEADER`, `EMBEDDING_MODE`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(model) = std::env::var("EMBEDDING_MODEL_ID") {
            cfg.model_id = model;
        }
        if let Ok(dim) = std::env::var("EMBEDDING_DIMENSION") {
            if let Ok(parsed) = dim.parse() {
                cfg.dimension = parsed;
            }
        }
        if let Ok(url) = std::env::var("EMBEDDING_ENDPOINT") {
            cfg.api_url = Some(url);
        }
        if let Ok(auth) = std::env::var("EMBEDDING_AUTH_HEADER") {
            cfg.api_auth_header = Some(auth);
        }
        if let Ok(mode) = std::env::var("EMBEDDING_MODE") {
            cfg.mode = mode;
        }
        cfg
    }

    pub fn validate(&self) -> Result<(), crate::EmbeddingError> {
        if self.dimension == 0 {
            return Err(crate::EmbeddingError::InvalidConfig(
                "dimension must be greater than zero".into(),
            ));
        }
        if self.mode == "api" && self.api_url.is_none() {
            return Err(crate::EmbeddingError::InvalidConfig(
                "api_url is required for api mode".into(),
            ));
        }
        Ok(())
    }
}
