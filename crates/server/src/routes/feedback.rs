use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;
use std::sync::Arc;

use domain::{InteractionSnapshot, InteractionType};
use feedback::RecordRequest;

use crate::error::{ServerError, ServerResult};
use crate::state::{AuthContext, ServerState};

/// Body for `POST /recommendations/feedback/{tender_id}`. Unknown fields are
/// ignored so older clients keep working.
#[derive(Debug, Deserialize)]
pub struct FeedbackBody {
    pub interaction_type: InteractionType,
    #[serde(default)]
    pub feedback_reason: Option<String>,
    #[serde(default)]
    pub time_spent_seconds: Option<u32>,
    #[serde(default)]
    pub match_score_at_time: Option<u8>,
}

/// `POST /recommendations/feedback/{tender_id}`
pub async fn record_interaction(
    State(state): State<Arc<ServerState>>,
    Extension(auth): Extension<AuthContext>,
    Path(tender_id): Path<String>,
    Json(body): Json<FeedbackBody>,
) -> ServerResult<Json<serde_json::Value>> {
    // Interactions against unknown tenders are client errors, not silent
    // no-ops.
    let tender = state
        .tenders
        .get(&tender_id)?
        .ok_or_else(|| ServerError::BadRequest(format!("unknown tender: {tender_id}")))?;

    let outcome = state.feedback.record(RecordRequest {
        user_id: auth.user_id.clone(),
        tender_id: tender.id.clone(),
        interaction_type: body.interaction_type,
        time_spent_seconds: body.time_spent_seconds,
        feedback_reason: body.feedback_reason,
        match_score_at_time: body.match_score_at_time,
        snapshot: InteractionSnapshot {
            tender_category: tender.category.clone(),
            tender_region: tender.region.clone(),
            tender_budget: tender.budget.as_ref().map(|b| b.amount),
        },
    })?;

    // Kick the implicit re-embed check off-request; recommendation freshness
    // is not worth interaction-path latency.
    if let Some(profile) = state.profiles.get_by_company(&auth.company_id)? {
        let engine = state.engine.clone();
        let profile_id = profile.id;
        tokio::spawn(async move {
            if let Err(err) = engine.reembed_if_dirty(&profile_id).await {
                tracing::warn!(profile = %profile_id, error = %err, "implicit re-embed failed");
            }
        });
    }

    let message = if outcome.deduplicated {
        "interaction already recorded"
    } else {
        "interaction recorded"
    };
    Ok(Json(serde_json::json!({
        "success": true,
        "interaction_id": outcome.interaction_id,
        "message": message,
    })))
}

/// `GET /recommendations/feedback/stats`
pub async fn interaction_stats(
    State(state): State<Arc<ServerState>>,
    Extension(auth): Extension<AuthContext>,
) -> ServerResult<Json<feedback::UserInteractionStats>> {
    Ok(Json(state.feedback.user_stats(&auth.user_id)))
}
