use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use dashmap::DashMap;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use embedding::EmbeddingClient;
use feedback::FeedbackProcessor;
use matcher::{EngineConfig, RecommendationEngine};
use store::{AnnConfig, BackendConfig, ProfileStore, TenderStore, VectorIndex};

/// Identity resolved from the API key by the auth middleware. The core only
/// ever sees this; keys stay at the transport boundary.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub company_id: String,
    pub user_id: String,
}

/// Shared application state
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Rate limit tracking: API key -> (count, window_start)
    pub rate_limiter: DashMap<String, (u32, std::time::Instant)>,

    /// Recommendation engine (shared across requests)
    pub engine: Arc<RecommendationEngine>,

    /// Feedback processor (shared across requests)
    pub feedback: Arc<FeedbackProcessor>,

    pub tenders: Arc<TenderStore>,
    pub profiles: Arc<ProfileStore>,

    /// Recommendation requests currently in flight, for load shedding.
    in_flight: AtomicUsize,

    /// Prometheus render handle; `None` when a recorder was already
    /// installed by an earlier state (tests) or metrics are disabled.
    pub metrics_handle: Option<PrometheusHandle>,
}

impl ServerState {
    /// Create new server state with an in-memory storage stack.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let tenders = Arc::new(TenderStore::new(BackendConfig::in_memory())?);
        let profiles = Arc::new(ProfileStore::new(BackendConfig::in_memory())?);
        let vectors = Arc::new(VectorIndex::new(
            config.embedding.dimension,
            BackendConfig::in_memory(),
            AnnConfig::default(),
        )?);
        let embedder = Arc::new(EmbeddingClient::new(config.embedding.clone())?);
        let feedback = Arc::new(FeedbackProcessor::new(
            config.feedback.clone(),
            profiles.clone(),
        ));
        let engine = Arc::new(RecommendationEngine::new(
            tenders.clone(),
            profiles.clone(),
            vectors,
            embedder,
            feedback.clone(),
            EngineConfig::default(),
        ));

        let metrics_handle = if config.metrics_enabled {
            PrometheusBuilder::new().install_recorder().ok()
        } else {
            None
        };

        Ok(Self {
            config: Arc::new(config),
            rate_limiter: DashMap::new(),
            engine,
            feedback,
            tenders,
            profiles,
            in_flight: AtomicUsize::new(0),
            metrics_handle,
        })
    }

    /// Resolve an API key to its identity.
    pub fn identity_for_key(&self, key: &str) -> Option<AuthContext> {
        self.config.api_keys.get(key).map(|company_id| AuthContext {
            company_id: company_id.clone(),
            user_id: company_id.clone(),
        })
    }

    /// Check rate limit for API key
    pub fn check_rate_limit(&self, key: &str) -> bool {
        let now = std::time::Instant::now();
        let window = std::time::Duration::from_secs(60);
        let limit = self.config.rate_limit_per_minute;

        let mut entry = self.rate_limiter.entry(key.to_string()).or_insert((0, now));
        let (count, window_start) = entry.value_mut();

        // Reset if window has passed
        if now.duration_since(*window_start) > window {
            *count = 0;
            *window_start = now;
        }

        if *count >= limit {
            return false;
        }

        *count += 1;
        true
    }

    /// Admit one recommendation request, or shed when the endpoint is
    /// saturated. The returned guard releases the slot on drop.
    pub fn admit_recommendation(self: &Arc<Self>) -> ServerResult<InFlightGuard> {
        let admitted = self.in_flight.fetch_add(1, Ordering::SeqCst)
            < self.config.max_concurrent_recommendations;
        if !admitted {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(ServerError::Overloaded);
        }
        Ok(InFlightGuard {
            state: Arc::clone(self),
        })
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// RAII slot for one in-flight recommendation request.
pub struct InFlightGuard {
    state: Arc<ServerState>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> Arc<ServerState> {
        let mut config = ServerConfig::default();
        config.metrics_enabled = false;
        config.embedding.mode = "stub".into();
        config.api_keys.insert("key-1".into(), "company-1".into());
        Arc::new(ServerState::new(config).unwrap())
    }

    #[test]
    fn identity_resolution() {
        let state = test_state();
        let identity = state.identity_for_key("key-1").unwrap();
        assert_eq!(identity.company_id, "company-1");
        assert_eq!(identity.user_id, "company-1");
        assert!(state.identity_for_key("nope").is_none());
    }

    #[test]
    fn rate_limit_counts_per_key() {
        let state = test_state();
        for _ in 0..state.config.rate_limit_per_minute {
            assert!(state.check_rate_limit("key-1"));
        }
        assert!(!state.check_rate_limit("key-1"));
        // Other keys are unaffected.
        assert!(state.check_rate_limit("key-2"));
    }

    #[test]
    fn in_flight_guard_releases_slot() {
        let state = test_state();
        {
            let _guard = state.admit_recommendation().unwrap();
            assert_eq!(state.in_flight_count(), 1);
        }
        assert_eq!(state.in_flight_count(), 0);
    }

    #[test]
    fn saturation_sheds() {
        let mut config = ServerConfig::default();
        config.metrics_enabled = false;
        config.embedding.mode = "stub".into();
        config.max_concurrent_recommendations = 1;
        let state = Arc::new(ServerState::new(config).unwrap());

        let _guard = state.admit_recommendation().unwrap();
        assert!(matches!(
            state.admit_recommendation(),
            Err(ServerError::Overloaded)
        ));
    }
}
