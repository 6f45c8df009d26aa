use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use domain::ScoringWeights;
use embedding::EmbeddingConfig;
use feedback::FeedbackConfig;

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Rate limit: requests per minute per API key
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,

    /// API key -> company id. The transport resolves a key to the identity
    /// the core operates on; the core itself never sees keys.
    #[serde(default)]
    pub api_keys: HashMap<String, String>,

    /// Recommendation requests allowed in flight before the endpoint sheds
    /// with 429.
    #[serde(default = "default_max_concurrent_recommendations")]
    pub max_concurrent_recommendations: usize,

    /// Seconds advertised in Retry-After when shedding.
    #[serde(default = "default_retry_after_secs")]
    pub retry_after_secs: u64,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Metrics endpoint enabled
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Embedding client configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Feedback pipeline configuration.
    #[serde(default)]
    pub feedback: FeedbackConfig,

    /// Scoring weights applied to newly created profiles.
    #[serde(default)]
    pub default_scoring_weights: ScoringWeights,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            api_keys: HashMap::new(),
            max_concurrent_recommendations: default_max_concurrent_recommendations(),
            retry_after_secs: default_retry_after_secs(),
            enable_cors: default_true(),
            log_level: default_log_level(),
            metrics_enabled: default_true(),
            embedding: EmbeddingConfig::default(),
            feedback: FeedbackConfig::default(),
            default_scoring_weights: ScoringWeights::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `tendermatch.*` config files and environment
    /// variables. Deployment-level env vars (`EMBEDDING_*`,
    /// `REEMBED_MIN_INTERVAL`, `INTERACTION_DEDUP_WINDOW`,
    /// `DEFAULT_SCORING_WEIGHTS`) override file values.
    pub fn load() -> anyhow::Result<Self> {
        // .env files are a developer convenience; absence is fine.
        let _ = dotenvy::dotenv();

        let builder = config::Config::builder()
            .add_source(config::File::with_name("tendermatch").required(false))
            .add_source(config::Environment::with_prefix("TENDERMATCH").separator("__"));

        let mut config: ServerConfig = builder.build()?.try_deserialize()?;

        config.embedding = merge_embedding_env(config.embedding);
        config.feedback = merge_feedback_env(config.feedback);

        if let Ok(raw) = std::env::var("DEFAULT_SCORING_WEIGHTS") {
            match serde_json::from_str(&raw) {
                Ok(weights) => config.default_scoring_weights = weights,
                Err(err) => {
                    tracing::warn!(error = %err, "ignoring malformed DEFAULT_SCORING_WEIGHTS")
                }
            }
        }

        // No endpoint means no remote model; fall back to deterministic
        // stub vectors instead of refusing to boot.
        if config.embedding.mode == "api" && config.embedding.api_url.is_none() {
            tracing::warn!("EMBEDDING_ENDPOINT not set, falling back to stub embeddings");
            config.embedding.mode = "stub".to_string();
        }

        // Demo key for local development when none is configured.
        if config.api_keys.is_empty() {
            tracing::warn!("no API keys configured, using demo key 'demo-key-12345'");
            config
                .api_keys
                .insert("demo-key-12345".to_string(), "demo-company".to_string());
        }

        Ok(config)
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.bind_addr, self.port);
        Ok(addr_str.parse()?)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn merge_embedding_env(base: EmbeddingConfig) -> EmbeddingConfig {
    let mut cfg = base;
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

fn merge_feedback_env(base: FeedbackConfig) -> FeedbackConfig {
    let mut cfg = base;
    if let Ok(value) = std::env::var("REEMBED_MIN_INTERVAL") {
        if let Ok(parsed) = value.parse() {
            cfg.reembed_min_interval_secs = parsed;
        }
    }
    if let Ok(value) = std::env::var("INTERACTION_DEDUP_WINDOW") {
        if let Ok(parsed) = value.parse() {
            cfg.dedup_window_secs = parsed;
        }
    }
    cfg
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_rate_limit_per_minute() -> u32 {
    100
}

fn default_max_concurrent_recommendations() -> usize {
    64
}

fn default_retry_after_secs() -> u64 {
    2
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}
