use axum::extract::State;
use axum::{Extension, Json};
use std::sync::Arc;

use domain::{CompanyProfile, CompanyProfileUpdate, ProfileOptions};

use crate::error::{ServerError, ServerResult};
use crate::state::{AuthContext, ServerState};

/// `GET /company-profile`
pub async fn get_profile(
    State(state): State<Arc<ServerState>>,
    Extension(auth): Extension<AuthContext>,
) -> ServerResult<Json<CompanyProfile>> {
    let profile = state
        .profiles
        .get_by_company(&auth.company_id)?
        .ok_or(ServerError::NotFound)?;
    Ok(Json(profile))
}

/// `PUT /company-profile` - partial update. Creating the profile on first
/// write is onboarding step 1; later writes refine it.
pub async fn update_profile(
    State(state): State<Arc<ServerState>>,
    Extension(auth): Extension<AuthContext>,
    Json(update): Json<CompanyProfileUpdate>,
) -> ServerResult<Json<CompanyProfile>> {
    let mut profile = match state.profiles.get_by_company(&auth.company_id)? {
        Some(existing) => existing,
        None => {
            let mut fresh = CompanyProfile::new(
                uuid::Uuid::new_v4().to_string(),
                auth.company_id.clone(),
            );
            fresh.scoring_weights = state.config.default_scoring_weights.clone();
            fresh
        }
    };

    update.apply_to(&mut profile)?;
    state.profiles.upsert(&profile)?;
    Ok(Json(profile))
}

/// `GET /company-profile/options`
pub async fn profile_options() -> Json<ProfileOptions> {
    Json(ProfileOptions::default())
}
