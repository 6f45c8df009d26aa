//! Recommendation engine for the tender service.
//!
//! [`RecommendationEngine`] fuses three signals into a ranked, explained
//! result set: dense semantic similarity between the profile and tender
//! embeddings, rule-based structured matching (sectors, regions, budget,
//! deadlines, certifications), and a behavioral popularity signal learned
//! from user interactions.
//!
//! The ranking contract: items sort by `match_score` descending, ties break
//! by `semantic_similarity` descending, then tender id ascending; a fixed
//! snapshot of profile, tenders, vectors, and popularity always reproduces
//! the same response.
//!
//! When the semantic signal is unavailable (no profile vector yet, or the
//! vector path failed) the engine degrades to rule-only scoring and flags it
//! with `semantic_unavailable` instead of failing the request.

mod engine;
mod types;

pub use crate::engine::{EngineConfig, RecommendationEngine};
pub use crate::types::{
    MatchError, RecommendFilters, RecommendationItem, RecommendationResponse, SimilarItem,
    SimilarTendersResponse,
};
