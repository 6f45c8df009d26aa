//! Embedding client for the tender recommendation service.
//!
//! Given a tender or company profile, this crate composes a deterministic
//! text rendition and turns it into a fixed-dimension, L2-normalized dense
//! vector. Two modes are supported:
//!
//! - **API mode** - call a remote embedding service over HTTP.
//! - **Stub mode** - deterministic local vectors for tests and offline runs.
//!
//! Remote calls sit behind a content-addressed LRU cache, bounded retries
//! with exponential backoff, and a circuit breaker, so a flapping upstream
//! degrades recommendation quality instead of taking requests down.
//!
//! ## Quick example
//!
//! ```no_run
//! use embedding::{EmbeddingClient, EmbeddingConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = EmbeddingClient::new(EmbeddingConfig {
//!         mode: "stub".into(),
//!         ..Default::default()
//!     })
//!     .unwrap();
//!
//!     let vector = client.embed("cloud erp rollout").await.unwrap();
//!     assert_eq!(vector.len(), client.dimension());
//! }
//! ```

pub mod compose;
pub mod config;
pub mod error;
pub mod retry;

mod api;
mod breaker;
mod cache;
mod normalize;
mod stub;

pub use crate::breaker::{BreakerConfig, CircuitBreaker, CircuitState};
pub use crate::compose::{compose_profile_text, compose_tender_text};
pub use crate::config::EmbeddingConfig;
pub use crate::error::EmbeddingError;
pub use crate::retry::RetryConfig;

use crate::api::request_embeddings;
use crate::cache::VectorCache;
use crate::normalize::l2_normalize_in_place;
use crate::retry::execute_with_retry;
use crate::stub::make_stub_vector;
use domain::{CompanyProfile, Tender};

/// Handle to the configured embedding backend. Cheap to share behind an
/// `Arc`; all interior state (cache, breaker) is synchronized.
pub struct EmbeddingClient {
    cfg: EmbeddingConfig,
    cache: VectorCache,
    breaker: CircuitBreaker,
}

impl EmbeddingClient {
    pub fn new(cfg: EmbeddingConfig) -> Result<Self, EmbeddingError> {
        cfg.validate()?;
        let cache = VectorCache::new(cfg.cache_capacity);
        Ok(Self {
            cfg,
            cache,
            breaker: CircuitBreaker::default(),
        })
    }

    /// The fixed output dimension D.
    pub fn dimension(&self) -> usize {
        self.cfg.dimension
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.cfg
    }

    /// Compose and embed a tender in one step.
    pub async fn embed_tender(&self, tender: &Tender) -> Result<Vec<f32>, EmbeddingError> {
        let text = compose_tender_text(tender, self.cfg.max_compose_chars);
        self.embed(&text).await
    }

    /// Compose and embed a company profile in one step.
    pub async fn embed_profile(&self, profile: &CompanyProfile) -> Result<Vec<f32>, EmbeddingError> {
        let text = compose_profile_text(profile);
        self.embed(&text).await
    }

    /// Embed a single text. Cache hits skip the remote call entirely.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.validate_input(text)?;

        let key = VectorCache::key(&self.cfg.model_id, text);
        if let Some(hit) = self.cache.get(key) {
            return Ok(hit);
        }

        let vector = match self.cfg.mode.as_str() {
            "stub" => make_stub_vector(text, &self.cfg),
            _ => {
                let texts = vec![text.to_string()];
                let mut batch = self.remote_batch(&texts).await?;
                batch.pop().expect("batch of one returns one vector")
            }
        };

        let vector = self.finish_vector(vector)?;
        self.cache.insert(key, vector.clone());
        Ok(vector)
    }

    /// Embed many texts, reporting success or failure per index. A transport
    /// failure for the uncached remainder is replicated onto each affected
    /// index; cached entries still succeed.
    pub async fn embed_batch(&self, texts: &[String]) -> Vec<Result<Vec<f32>, EmbeddingError>> {
        let mut results: Vec<Option<Result<Vec<f32>, EmbeddingError>>> =
            texts.iter().map(|_| None).collect();
        let mut pending: Vec<(usize, String)> = Vec::new();

        for (idx, text) in texts.iter().enumerate() {
            if let Err(err) = self.validate_input(text) {
                results[idx] = Some(Err(err));
                continue;
            }
            let key = VectorCache::key(&self.cfg.model_id, text);
            if let Some(hit) = self.cache.get(key) {
                results[idx] = Some(Ok(hit));
            } else {
                pending.push((idx, text.clone()));
            }
        }

        if !pending.is_empty() {
            let pending_texts: Vec<String> = pending.iter().map(|(_, t)| t.clone()).collect();
            let fetched = match self.cfg.mode.as_str() {
                "stub" => Ok(pending_texts
                    .iter()
                    .map(|t| make_stub_vector(t, &self.cfg))
                    .collect::<Vec<_>>()),
                _ => self.remote_batch(&pending_texts).await,
            };

            match fetched {
                Ok(vectors) => {
                    for ((idx, text), vector) in pending.into_iter().zip(vectors) {
                        let finished = self.finish_vector(vector);
                        if let Ok(v) = &finished {
                            self.cache
                                .insert(VectorCache::key(&self.cfg.model_id, &text), v.clone());
                        }
                        results[idx] = Some(finished);
                    }
                }
                Err(err) => {
                    for (idx, _) in pending {
                        results[idx] = Some(Err(err.clone()));
                    }
                }
            }
        }

        results
            .into_iter()
            .map(|slot| slot.expect("every index is resolved"))
            .collect()
    }

    async fn remote_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if !self.cfg.enable_resilience {
            return request_embeddings(texts, &self.cfg).await;
        }

        if !self.breaker.allow_request() {
            return Err(EmbeddingError::UpstreamUnavailable(
                "embedding circuit breaker is open".into(),
            ));
        }

        let outcome =
            execute_with_retry(&self.cfg.retry, || request_embeddings(texts, &self.cfg)).await;
        match &outcome {
            Ok(_) => self.breaker.record_success(),
            Err(err) if err.is_retriable() => self.breaker.record_failure(),
            Err(_) => {}
        }
        outcome
    }

    /// Dimension check + normalization. A wrong-dimension vector is an
    /// invariant violation: it is dropped here and never cached.
    fn finish_vector(&self, mut vector: Vec<f32>) -> Result<Vec<f32>, EmbeddingError> {
        if vector.len() != self.cfg.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.cfg.dimension,
                got: vector.len(),
            });
        }
        if self.cfg.normalize {
            l2_normalize_in_place(&mut vector);
        }
        Ok(vector)
    }

    fn validate_input(&self, text: &str) -> Result<(), EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InputInvalid("text is empty".into()));
        }
        if text.chars().count() > self.cfg.max_input_chars {
            return Err(EmbeddingError::InputInvalid(format!(
                "text exceeds {} characters",
                self.cfg.max_input_chars
            )));
        }
        Ok(())
    }
}
