use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use std::sync::Arc;

use matcher::{RecommendFilters, RecommendationResponse, SimilarTendersResponse};

use crate::error::{ServerError, ServerResult};
use crate::state::{AuthContext, ServerState};

/// Query parameters for `GET /recommendations`. Sector/region lists arrive
/// comma-separated.
#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    pub limit: Option<usize>,
    pub min_score: Option<u8>,
    pub days_ahead: Option<i64>,
    pub sectors: Option<String>,
    pub regions: Option<String>,
}

impl RecommendQuery {
    fn into_filters(self) -> RecommendFilters {
        let defaults = RecommendFilters::default();
        RecommendFilters {
            limit: self.limit.unwrap_or(defaults.limit),
            min_score: self.min_score.unwrap_or(defaults.min_score),
            days_ahead: self.days_ahead.unwrap_or(defaults.days_ahead),
            sectors: split_list(self.sectors),
            regions: split_list(self.regions),
        }
    }
}

fn split_list(raw: Option<String>) -> Option<Vec<String>> {
    let values: Vec<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

/// `GET /recommendations`
pub async fn get_recommendations(
    State(state): State<Arc<ServerState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<RecommendQuery>,
) -> ServerResult<Json<RecommendationResponse>> {
    let _slot = state.admit_recommendation()?;

    let profile = state
        .profiles
        .get_by_company(&auth.company_id)?
        .ok_or(ServerError::Match(matcher::MatchError::ProfileNotFound))?;

    let filters = query.into_filters();
    let response = state.engine.recommend(&profile.id, &filters)?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    pub limit: Option<usize>,
}

/// `GET /recommendations/tenders/{id}/similar`
pub async fn get_similar_tenders(
    State(state): State<Arc<ServerState>>,
    Path(tender_id): Path<String>,
    Query(query): Query<SimilarQuery>,
) -> ServerResult<Json<SimilarTendersResponse>> {
    let response = state.engine.similar(&tender_id, query.limit)?;
    Ok(Json(response))
}

/// `POST /recommendations/refresh-profile-embedding`
pub async fn refresh_profile_embedding(
    State(state): State<Arc<ServerState>>,
    Extension(auth): Extension<AuthContext>,
) -> ServerResult<Json<serde_json::Value>> {
    let profile = state
        .profiles
        .get_by_company(&auth.company_id)?
        .ok_or(ServerError::Match(matcher::MatchError::ProfileNotFound))?;

    let reembedded = state.engine.refresh_profile_embedding(&profile.id).await?;
    let message = if reembedded {
        "profile embedding refreshed"
    } else {
        "refresh already in progress"
    };
    Ok(Json(serde_json::json!({ "message": message })))
}
