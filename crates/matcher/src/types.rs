use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use domain::{MatchReason, Tender};
use embedding::EmbeddingError;
use store::StoreError;

pub const MAX_LIMIT: usize = 100;
pub const MAX_DAYS_AHEAD: i64 = 90;

/// Request-side filters for a recommendation query.
///
/// `RecommendFilters` is cheap to clone and serde-friendly so the transport
/// layer can deserialize it straight from query parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendFilters {
    /// Maximum items returned; capped at 100.
    #[serde(default = "RecommendFilters::default_limit")]
    pub limit: usize,
    /// Client-requested score floor in [0, 100]. The profile's own
    /// `min_match_threshold` floors this further.
    #[serde(default)]
    pub min_score: u8,
    /// Deadline horizon in days, within [1, 90].
    #[serde(default = "RecommendFilters::default_days_ahead")]
    pub days_ahead: i64,
    /// Restrict results to these sectors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sectors: Option<Vec<String>>,
    /// Restrict results to these regions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regions: Option<Vec<String>>,
}

impl RecommendFilters {
    pub(crate) fn default_limit() -> usize {
        20
    }

    pub(crate) fn default_days_ahead() -> i64 {
        7
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(MatchError::InvalidFilters(format!(
                "limit must be within [1, {MAX_LIMIT}]"
            )));
        }
        if self.min_score > 100 {
            return Err(MatchError::InvalidFilters(
                "min_score must be within [0, 100]".into(),
            ));
        }
        if self.days_ahead < 1 || self.days_ahead > MAX_DAYS_AHEAD {
            return Err(MatchError::InvalidFilters(format!(
                "days_ahead must be within [1, {MAX_DAYS_AHEAD}]"
            )));
        }
        Ok(())
    }
}

impl Default for RecommendFilters {
    fn default() -> Self {
        Self {
            limit: Self::default_limit(),
            min_score: 0,
            days_ahead: Self::default_days_ahead(),
            sectors: None,
            regions: None,
        }
    }
}

/// One ranked recommendation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecommendationItem {
    pub tender: Tender,
    pub match_score: u8,
    /// At most six reasons, contribution-descending.
    pub match_reasons: Vec<MatchReason>,
    pub semantic_similarity: f32,
    pub days_until_deadline: Option<i64>,
}

/// Response envelope for a recommendation query.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecommendationResponse {
    pub items: Vec<RecommendationItem>,
    /// Count of matches after the threshold cut, before pagination.
    pub total: usize,
    pub profile_completion: u8,
    pub filters_applied: RecommendFilters,
    /// Server timestamp of the query; the snapshot the ranking reflects.
    pub generated_at: DateTime<Utc>,
    /// True when semantic scoring was skipped (missing profile vector or a
    /// degraded vector path) and items were ranked by rules alone.
    pub semantic_unavailable: bool,
}

/// One similar-tender hit.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SimilarItem {
    pub tender: Tender,
    /// `round(100 * cosine)`, clipped to [0, 100].
    pub similarity_score: u8,
    /// Shared title/highlight keywords, at most ten.
    pub common_keywords: Vec<String>,
}

/// Response envelope for a similar-tender query.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SimilarTendersResponse {
    pub reference: Tender,
    pub items: Vec<SimilarItem>,
}

/// Errors produced by the recommendation engine.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("profile not found")]
    ProfileNotFound,
    /// Tier-1 preferences missing; the profile cannot be matched yet.
    #[error("profile incomplete: complete onboarding first")]
    ProfileIncomplete,
    #[error("tender not found: {0}")]
    ReferenceNotFound(String),
    /// The reference tender has no embedding yet.
    #[error("tender not embedded yet: {0}")]
    ReferenceNotEmbedded(String),
    #[error("invalid filters: {0}")]
    InvalidFilters(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}
