//! Integration tests for the HTTP surface: handler behavior, identity
//! resolution, status-mapped errors, and the onboarding flow, exercised
//! against a real in-memory server state.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{Duration, Utc};

use server::routes::{feedback as feedback_routes, profile as profile_routes, recommendations};
use server::{AuthContext, ServerConfig, ServerError, ServerState};
use tendermatch::{
    Budget, CompanyProfileUpdate, ExtractedData, InteractionType, PopularityCounters, Tender,
    TenderStatus,
};

fn test_state() -> Arc<ServerState> {
    let mut config = ServerConfig::default();
    config.metrics_enabled = false;
    config.embedding.mode = "stub".into();
    config.embedding.dimension = 32;
    config.rate_limit_per_minute = 10_000;
    // Keep dedup-bucket boundaries out of the dedup assertions.
    config.feedback.dedup_window_secs = 3600;
    config
        .api_keys
        .insert("test-api-key".to_string(), "company-1".to_string());
    Arc::new(ServerState::new(config).expect("failed to create test state"))
}

fn auth() -> AuthContext {
    AuthContext {
        company_id: "company-1".into(),
        user_id: "company-1".into(),
    }
}

fn sample_tender(id: &str) -> Tender {
    Tender {
        id: id.into(),
        source_url: format!("https://tenders.example/{id}"),
        external_id: None,
        title: "Cloud ERP rollout".into(),
        description: "Deploy a cloud based ERP".into(),
        clean_description: None,
        summary: None,
        highlights: vec![],
        category: "IT".into(),
        region: "Addis Ababa".into(),
        budget: Some(Budget {
            amount: 120_000.0,
            currency: "ETB".into(),
        }),
        language: "english".into(),
        deadline: Some(Utc::now() + Duration::days(5)),
        status: TenderStatus::Published,
        published_at: Utc::now(),
        organization: None,
        extracted: ExtractedData::default(),
        popularity: PopularityCounters::default(),
        popularity_score: 0.0,
    }
}

fn tier1_update() -> CompanyProfileUpdate {
    serde_json::from_value(serde_json::json!({
        "primary_sector": "IT",
        "active_sectors": ["IT"],
        "preferred_regions": ["Addis Ababa"],
        "keywords": ["cloud", "erp", "network"],
    }))
    .unwrap()
}

#[tokio::test]
async fn state_resolves_identity_and_rate_limits() {
    let state = test_state();
    let identity = state.identity_for_key("test-api-key").unwrap();
    assert_eq!(identity.company_id, "company-1");
    assert!(state.identity_for_key("bogus").is_none());
    assert!(state.check_rate_limit("test-api-key"));
}

#[tokio::test]
async fn profile_onboarding_via_put_then_get() {
    let state = test_state();

    // No profile yet.
    let missing = profile_routes::get_profile(State(state.clone()), Extension(auth())).await;
    assert!(matches!(missing, Err(ServerError::NotFound)));

    // First PUT creates the profile (onboarding step 1).
    let Json(created) = profile_routes::update_profile(
        State(state.clone()),
        Extension(auth()),
        Json(tier1_update()),
    )
    .await
    .unwrap();
    assert_eq!(created.company_id, "company-1");
    assert!(created.tier1_complete());
    assert_eq!(created.onboarding_step, 2);

    // GET returns the stored profile.
    let Json(fetched) = profile_routes::get_profile(State(state.clone()), Extension(auth()))
        .await
        .unwrap();
    assert_eq!(fetched.id, created.id);
}

#[tokio::test]
async fn invalid_profile_update_is_rejected() {
    let state = test_state();
    profile_routes::update_profile(State(state.clone()), Extension(auth()), Json(tier1_update()))
        .await
        .unwrap();

    let bad: CompanyProfileUpdate = serde_json::from_value(serde_json::json!({
        "budget_min": 100.0,
        "budget_max": 5.0,
    }))
    .unwrap();
    let result =
        profile_routes::update_profile(State(state.clone()), Extension(auth()), Json(bad)).await;
    assert!(matches!(result, Err(ServerError::Domain(_))));
}

#[tokio::test]
async fn profile_options_enumerations_are_served() {
    let Json(options) = profile_routes::profile_options().await;
    assert!(options.sectors.contains(&"IT"));
    assert!(options.regions.contains(&"Addis Ababa"));
    assert_eq!(options.company_sizes.len(), 4);
}

#[tokio::test]
async fn recommendations_require_a_profile() {
    let state = test_state();
    let result = recommendations::get_recommendations(
        State(state.clone()),
        Extension(auth()),
        Query(recommendations::RecommendQuery {
            limit: None,
            min_score: None,
            days_ahead: None,
            sectors: None,
            regions: None,
        }),
    )
    .await;
    assert!(matches!(
        result,
        Err(ServerError::Match(tendermatch::MatchError::ProfileNotFound))
    ));
}

#[tokio::test]
async fn incomplete_profile_conflicts() {
    let state = test_state();
    let partial: CompanyProfileUpdate =
        serde_json::from_value(serde_json::json!({ "primary_sector": "IT" })).unwrap();
    profile_routes::update_profile(State(state.clone()), Extension(auth()), Json(partial))
        .await
        .unwrap();

    let result = recommendations::get_recommendations(
        State(state.clone()),
        Extension(auth()),
        Query(recommendations::RecommendQuery {
            limit: None,
            min_score: None,
            days_ahead: None,
            sectors: None,
            regions: None,
        }),
    )
    .await;
    assert!(matches!(
        result,
        Err(ServerError::Match(tendermatch::MatchError::ProfileIncomplete))
    ));
}

#[tokio::test]
async fn end_to_end_recommendation_over_http_state() {
    let state = test_state();
    profile_routes::update_profile(State(state.clone()), Extension(auth()), Json(tier1_update()))
        .await
        .unwrap();
    state.engine.index_tender(&sample_tender("t-1")).await.unwrap();

    let Json(response) = recommendations::get_recommendations(
        State(state.clone()),
        Extension(auth()),
        Query(recommendations::RecommendQuery {
            limit: Some(10),
            min_score: None,
            days_ahead: Some(30),
            sectors: None,
            regions: None,
        }),
    )
    .await
    .unwrap();

    assert_eq!(response.items.len(), 1);
    assert_eq!(response.items[0].tender.id, "t-1");
    assert!(response.total >= 1);
    assert!(response.profile_completion > 0);
}

#[tokio::test]
async fn feedback_round_trip_with_dedup_and_stats() {
    let state = test_state();
    profile_routes::update_profile(State(state.clone()), Extension(auth()), Json(tier1_update()))
        .await
        .unwrap();
    state.engine.index_tender(&sample_tender("t-1")).await.unwrap();

    let body = feedback_routes::FeedbackBody {
        interaction_type: InteractionType::Save,
        feedback_reason: None,
        time_spent_seconds: None,
        match_score_at_time: Some(80),
    };
    let Json(first) = feedback_routes::record_interaction(
        State(state.clone()),
        Extension(auth()),
        Path("t-1".to_string()),
        Json(body),
    )
    .await
    .unwrap();
    assert_eq!(first["success"], true);
    assert_eq!(first["message"], "interaction recorded");

    // Immediate retry is deduplicated.
    let body = feedback_routes::FeedbackBody {
        interaction_type: InteractionType::Save,
        feedback_reason: None,
        time_spent_seconds: None,
        match_score_at_time: Some(80),
    };
    let Json(second) = feedback_routes::record_interaction(
        State(state.clone()),
        Extension(auth()),
        Path("t-1".to_string()),
        Json(body),
    )
    .await
    .unwrap();
    assert_eq!(second["message"], "interaction already recorded");
    assert_eq!(first["interaction_id"], second["interaction_id"]);

    let Json(stats) =
        feedback_routes::interaction_stats(State(state.clone()), Extension(auth()))
            .await
            .unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.counts.get("save"), Some(&1));
}

#[tokio::test]
async fn feedback_for_unknown_tender_is_a_client_error() {
    let state = test_state();
    let body = feedback_routes::FeedbackBody {
        interaction_type: InteractionType::View,
        feedback_reason: None,
        time_spent_seconds: Some(12),
        match_score_at_time: None,
    };
    let result = feedback_routes::record_interaction(
        State(state.clone()),
        Extension(auth()),
        Path("no-such-tender".to_string()),
        Json(body),
    )
    .await;
    assert!(matches!(result, Err(ServerError::BadRequest(_))));
}

#[tokio::test]
async fn refresh_endpoint_embeds_the_profile() {
    let state = test_state();
    profile_routes::update_profile(State(state.clone()), Extension(auth()), Json(tier1_update()))
        .await
        .unwrap();

    let Json(response) = recommendations::refresh_profile_embedding(
        State(state.clone()),
        Extension(auth()),
    )
    .await
    .unwrap();
    assert_eq!(response["message"], "profile embedding refreshed");

    let profile = state
        .profiles
        .get_by_company("company-1")
        .unwrap()
        .unwrap();
    assert!(!profile.embedding_dirty);
    assert!(profile.embedding_updated_at.is_some());
}

#[tokio::test]
async fn router_builds_with_all_routes() {
    let state = test_state();
    let _router = server::build_router(state);
}
