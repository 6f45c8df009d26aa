//! Workspace umbrella crate for the tender recommendation service.
//!
//! Re-exports the domain model, embedding client, stores, scorer, feedback
//! pipeline, and recommendation engine so applications (and the workspace
//! integration tests) can drive the whole stack through one dependency.
//! [`TenderMatchService`] wires an in-memory instance of every component; the
//! HTTP server in `tender-server` performs the same assembly around its own
//! configuration.
//!
//! ```no_run
//! use tendermatch::{ServiceConfig, TenderMatchService};
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = TenderMatchService::in_memory(ServiceConfig::default()).unwrap();
//!     // service.engine drives recommendations; service.feedback records
//!     // interactions; the stores seed tenders and profiles.
//! }
//! ```

use std::sync::Arc;

pub use domain::{
    Budget, CompanyProfile, CompanyProfileUpdate, CompanySize, ExtractedData, Interaction,
    InteractionSnapshot, InteractionType, MatchReason, PopularityCounters, ProfileOptions,
    ReasonTag, ScoringWeights, Tender, TenderStatus, YearsInOperation,
};
pub use embedding::{
    compose_profile_text, compose_tender_text, EmbeddingClient, EmbeddingConfig, EmbeddingError,
};
pub use feedback::{
    FeedbackConfig, FeedbackError, FeedbackProcessor, RecordOutcome, RecordRequest,
    UserInteractionStats,
};
pub use matcher::{
    EngineConfig, MatchError, RecommendFilters, RecommendationEngine, RecommendationItem,
    RecommendationResponse, SimilarItem, SimilarTendersResponse,
};
pub use scorer::{RuleScorer, ScoreBreakdown, ScoreDimension, ScoringContext};
pub use store::{
    AnnConfig, BackendConfig, ProfileStore, StoreError, TenderStore, TenderVectorMeta,
    VectorFilter, VectorIndex,
};

/// Configuration bundle for an assembled service instance.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub embedding: EmbeddingConfig,
    pub feedback: FeedbackConfig,
    pub engine: EngineConfig,
    pub ann: AnnConfig,
}

impl ServiceConfig {
    /// Configuration for tests and offline runs: deterministic stub
    /// embeddings, no ANN graph.
    pub fn stub(dimension: usize) -> Self {
        Self {
            embedding: EmbeddingConfig {
                mode: "stub".into(),
                dimension,
                ..EmbeddingConfig::default()
            },
            ann: AnnConfig::default().with_enabled(false),
            ..Self::default()
        }
    }
}

/// A fully wired in-memory service: stores, embedding client, feedback
/// pipeline, and recommendation engine sharing the same state.
pub struct TenderMatchService {
    pub tenders: Arc<TenderStore>,
    pub profiles: Arc<ProfileStore>,
    pub vectors: Arc<VectorIndex>,
    pub embedder: Arc<EmbeddingClient>,
    pub feedback: Arc<FeedbackProcessor>,
    pub engine: Arc<RecommendationEngine>,
}

impl TenderMatchService {
    pub fn in_memory(cfg: ServiceConfig) -> Result<Self, MatchError> {
        let tenders = Arc::new(TenderStore::new(BackendConfig::in_memory())?);
        let profiles = Arc::new(ProfileStore::new(BackendConfig::in_memory())?);
        let vectors = Arc::new(VectorIndex::new(
            cfg.embedding.dimension,
            BackendConfig::in_memory(),
            cfg.ann,
        )?);
        let embedder = Arc::new(EmbeddingClient::new(cfg.embedding)?);
        let feedback = Arc::new(FeedbackProcessor::new(cfg.feedback, profiles.clone()));
        let engine = Arc::new(RecommendationEngine::new(
            tenders.clone(),
            profiles.clone(),
            vectors.clone(),
            embedder.clone(),
            feedback.clone(),
            cfg.engine,
        ));
        Ok(Self {
            tenders,
            profiles,
            vectors,
            embedder,
            feedback,
            engine,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_assembly_shares_state() {
        let service = TenderMatchService::in_memory(ServiceConfig::stub(16)).unwrap();
        assert_eq!(service.embedder.dimension(), 16);
        assert_eq!(service.vectors.dimension(), 16);
        assert_eq!(service.tenders.count().unwrap(), 0);
    }
}
