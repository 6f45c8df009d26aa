use super::*;

use chrono::Duration as ChronoDuration;
use domain::{
    Budget, CompanyProfile, ExtractedData, InteractionSnapshot, InteractionType,
    PopularityCounters, ReasonTag,
};
use embedding::EmbeddingConfig;
use feedback::{FeedbackConfig, RecordRequest};
use store::{AnnConfig, BackendConfig};

const DIM: usize = 48;

fn build_engine(cfg: EngineConfig) -> RecommendationEngine {
    let tenders = Arc::new(TenderStore::new(BackendConfig::in_memory()).unwrap());
    let profiles = Arc::new(ProfileStore::new(BackendConfig::in_memory()).unwrap());
    let vectors = Arc::new(
        VectorIndex::new(
            DIM,
            BackendConfig::in_memory(),
            AnnConfig::default().with_enabled(false),
        )
        .unwrap(),
    );
    let embedder = Arc::new(
        EmbeddingClient::new(EmbeddingConfig {
            mode: "stub".into(),
            dimension: DIM,
            ..Default::default()
        })
        .unwrap(),
    );
    let feedback = Arc::new(FeedbackProcessor::new(
        FeedbackConfig::default(),
        profiles.clone(),
    ));
    RecommendationEngine::new(tenders, profiles, vectors, embedder, feedback, cfg)
}

fn engine() -> RecommendationEngine {
    build_engine(EngineConfig::default())
}

fn base_profile() -> CompanyProfile {
    let mut profile = CompanyProfile::new("p-1", "c-1");
    profile.primary_sector = "IT".into();
    profile.active_sectors = vec!["IT".into()];
    profile.preferred_regions = vec!["Addis Ababa".into()];
    profile.keywords = vec!["cloud".into(), "erp".into(), "network".into()];
    profile.budget_min = Some(50_000.0);
    profile.budget_max = Some(500_000.0);
    profile
}

fn make_tender(id: &str, category: &str, region: &str, days_to_deadline: i64) -> Tender {
    Tender {
        id: id.into(),
        source_url: format!("https://tenders.example/{id}"),
        external_id: None,
        title: "Cloud ERP rollout".into(),
        description: "Deploy a cloud based ERP for regional offices".into(),
        clean_description: None,
        summary: None,
        highlights: vec![],
        category: category.into(),
        region: region.into(),
        budget: Some(Budget {
            amount: 120_000.0,
            currency: "ETB".into(),
        }),
        language: "english".into(),
        deadline: Some(Utc::now() + ChronoDuration::days(days_to_deadline) + ChronoDuration::hours(1)),
        status: TenderStatus::Published,
        published_at: Utc::now() - ChronoDuration::days(1),
        organization: Some("Ministry of Finance".into()),
        extracted: ExtractedData::default(),
        popularity: PopularityCounters::default(),
        popularity_score: 0.0,
    }
}

fn wide_filters() -> RecommendFilters {
    RecommendFilters {
        days_ahead: 30,
        ..Default::default()
    }
}

#[tokio::test]
async fn unknown_profile_is_an_error() {
    let engine = engine();
    let err = engine.recommend("missing", &wide_filters()).unwrap_err();
    assert!(matches!(err, MatchError::ProfileNotFound));
}

#[tokio::test]
async fn incomplete_profile_is_rejected() {
    let engine = engine();
    let profile = CompanyProfile::new("p-1", "c-1");
    engine.profiles().upsert(&profile).unwrap();

    let err = engine.recommend("p-1", &wide_filters()).unwrap_err();
    assert!(matches!(err, MatchError::ProfileIncomplete));
}

#[tokio::test]
async fn invalid_filters_are_rejected() {
    let engine = engine();
    engine.profiles().upsert(&base_profile()).unwrap();
    let filters = RecommendFilters {
        days_ahead: 365,
        ..Default::default()
    };
    assert!(matches!(
        engine.recommend("p-1", &filters),
        Err(MatchError::InvalidFilters(_))
    ));
}

#[tokio::test]
async fn rule_only_path_serves_without_profile_vector() {
    let engine = engine();
    engine.profiles().upsert(&base_profile()).unwrap();
    engine
        .index_tender(&make_tender("t-1", "IT", "Addis Ababa", 14))
        .await
        .unwrap();

    let response = engine.recommend("p-1", &wide_filters()).unwrap();

    assert!(response.semantic_unavailable);
    assert_eq!(response.items.len(), 1);
    assert_eq!(response.total, 1);
    let item = &response.items[0];
    assert_eq!(item.tender.id, "t-1");
    assert!(item.match_score >= 70, "got {}", item.match_score);
    assert_eq!(item.semantic_similarity, 0.0);
    let tags: Vec<ReasonTag> = item.match_reasons.iter().map(|r| r.tag).collect();
    assert!(tags.contains(&ReasonTag::SectorMatch));
    assert!(tags.contains(&ReasonTag::RegionMatch));
    assert!(!tags.contains(&ReasonTag::SemanticMatch));
}

#[tokio::test]
async fn semantic_path_flags_availability_and_orders_deterministically() {
    let engine = engine();
    engine.profiles().upsert(&base_profile()).unwrap();
    for i in 0..5 {
        engine
            .index_tender(&make_tender(&format!("t-{i}"), "IT", "Addis Ababa", 10))
            .await
            .unwrap();
    }
    assert!(engine.refresh_profile_embedding("p-1").await.unwrap());

    let first = engine.recommend("p-1", &wide_filters()).unwrap();
    assert!(!first.semantic_unavailable);
    assert_eq!(first.items.len(), 5);

    // Identical content means identical scores; ties resolve by id.
    let ids: Vec<&str> = first.items.iter().map(|i| i.tender.id.as_str()).collect();
    assert_eq!(ids, vec!["t-0", "t-1", "t-2", "t-3", "t-4"]);

    let second = engine.recommend("p-1", &wide_filters()).unwrap();
    assert_eq!(first.items, second.items);
    assert_eq!(first.total, second.total);
}

#[tokio::test]
async fn scores_are_non_increasing_and_bounded() {
    let engine = engine();
    engine.profiles().upsert(&base_profile()).unwrap();

    engine
        .index_tender(&make_tender("t-perfect", "IT", "Addis Ababa", 10))
        .await
        .unwrap();
    engine
        .index_tender(&make_tender("t-region-miss", "IT", "Oromia", 10))
        .await
        .unwrap();
    let mut weak = make_tender("t-weak", "Healthcare", "Addis Ababa", 10);
    weak.title = "Hospital supplies".into();
    weak.description = "Medical equipment procurement".into();
    weak.budget = None;
    engine.index_tender(&weak).await.unwrap();

    let response = engine.recommend("p-1", &wide_filters()).unwrap();
    assert_eq!(response.items.len(), 3);
    assert_eq!(response.items[0].tender.id, "t-perfect");
    for pair in response.items.windows(2) {
        assert!(pair[0].match_score >= pair[1].match_score);
    }
    for item in &response.items {
        assert!(item.match_score <= 100);
        assert!((0.0..=1.0).contains(&item.semantic_similarity));
    }
}

#[tokio::test]
async fn threshold_cut_applies_profile_floor() {
    let engine = engine();
    let mut profile = base_profile();
    profile.min_match_threshold = 50;
    engine.profiles().upsert(&profile).unwrap();

    engine
        .index_tender(&make_tender("t-strong", "IT", "Addis Ababa", 10))
        .await
        .unwrap();
    let mut weak = make_tender("t-weak", "Healthcare", "Somali", 10);
    weak.title = "Road maintenance".into();
    weak.description = "Gravel works".into();
    weak.budget = None;
    engine.index_tender(&weak).await.unwrap();

    // The client floor is below the profile floor; the profile wins.
    let filters = RecommendFilters {
        min_score: 10,
        ..wide_filters()
    };
    let response = engine.recommend("p-1", &filters).unwrap();
    assert_eq!(response.total, 1);
    assert!(response.items.iter().all(|i| i.match_score >= 50));

    // A stricter client floor cuts deeper.
    let filters = RecommendFilters {
        min_score: 99,
        ..wide_filters()
    };
    let response = engine.recommend("p-1", &filters).unwrap();
    assert_eq!(response.total, 0);
    assert!(response.items.is_empty());
}

#[tokio::test]
async fn hard_filters_exclude_expired_draft_and_distant_deadlines() {
    let engine = engine();
    engine.profiles().upsert(&base_profile()).unwrap();

    let mut expired = make_tender("t-expired", "IT", "Addis Ababa", 10);
    expired.deadline = Some(Utc::now() - ChronoDuration::hours(2));
    engine.index_tender(&expired).await.unwrap();

    let mut draft = make_tender("t-draft", "IT", "Addis Ababa", 10);
    draft.status = TenderStatus::Draft;
    engine.index_tender(&draft).await.unwrap();

    engine
        .index_tender(&make_tender("t-distant", "IT", "Addis Ababa", 60))
        .await
        .unwrap();
    engine
        .index_tender(&make_tender("t-ok", "IT", "Addis Ababa", 5))
        .await
        .unwrap();

    let response = engine.recommend("p-1", &RecommendFilters::default()).unwrap();
    let ids: Vec<&str> = response.items.iter().map(|i| i.tender.id.as_str()).collect();
    assert_eq!(ids, vec!["t-ok"]);
}

#[tokio::test]
async fn sector_and_region_request_filters_narrow_results() {
    let engine = engine();
    let mut profile = base_profile();
    profile.active_sectors = vec!["IT".into(), "Consulting".into()];
    profile.preferred_regions = vec!["Addis Ababa".into(), "Oromia".into()];
    engine.profiles().upsert(&profile).unwrap();

    engine
        .index_tender(&make_tender("t-it-addis", "IT", "Addis Ababa", 10))
        .await
        .unwrap();
    engine
        .index_tender(&make_tender("t-it-oromia", "IT", "Oromia", 10))
        .await
        .unwrap();
    engine
        .index_tender(&make_tender("t-consult", "Consulting", "Addis Ababa", 10))
        .await
        .unwrap();

    let filters = RecommendFilters {
        sectors: Some(vec!["IT".into()]),
        regions: Some(vec!["Oromia".into()]),
        ..wide_filters()
    };
    let response = engine.recommend("p-1", &filters).unwrap();
    let ids: Vec<&str> = response.items.iter().map(|i| i.tender.id.as_str()).collect();
    assert_eq!(ids, vec!["t-it-oromia"]);
}

#[tokio::test]
async fn dismissed_tenders_never_come_back() {
    let engine = engine();
    engine.profiles().upsert(&base_profile()).unwrap();
    engine
        .index_tender(&make_tender("t-1", "IT", "Addis Ababa", 10))
        .await
        .unwrap();
    engine
        .index_tender(&make_tender("t-2", "IT", "Addis Ababa", 10))
        .await
        .unwrap();

    engine
        .feedback()
        .record(RecordRequest {
            user_id: "c-1".into(),
            tender_id: "t-1".into(),
            interaction_type: InteractionType::Dismiss,
            time_spent_seconds: None,
            feedback_reason: Some("Wrong location".into()),
            match_score_at_time: None,
            snapshot: InteractionSnapshot {
                tender_category: "IT".into(),
                tender_region: "Addis Ababa".into(),
                tender_budget: None,
            },
        })
        .unwrap();

    let response = engine.recommend("p-1", &wide_filters()).unwrap();
    let ids: Vec<&str> = response.items.iter().map(|i| i.tender.id.as_str()).collect();
    assert_eq!(ids, vec!["t-2"]);
}

#[tokio::test]
async fn urgent_tenders_sort_ahead_of_relaxed_ones() {
    let engine = engine();
    engine.profiles().upsert(&base_profile()).unwrap();
    engine
        .index_tender(&make_tender("t-relaxed", "IT", "Addis Ababa", 14))
        .await
        .unwrap();
    engine
        .index_tender(&make_tender("t-urgent", "IT", "Addis Ababa", 2))
        .await
        .unwrap();

    let response = engine.recommend("p-1", &wide_filters()).unwrap();
    assert_eq!(response.items[0].tender.id, "t-urgent");
    assert!(response.items[0]
        .match_reasons
        .iter()
        .any(|r| r.tag == ReasonTag::Urgency));
}

#[tokio::test]
async fn reasons_are_capped_at_six() {
    let engine = engine();
    let mut profile = base_profile();
    profile.sub_sectors = vec!["erp".into()];
    profile.certifications = vec!["ISO 9001".into()];
    engine.profiles().upsert(&profile).unwrap();

    let mut rich = make_tender("t-rich", "IT", "Addis Ababa", 3);
    rich.description =
        "Deploy a cloud based ERP network; bidders must hold iso 9001 certification".into();
    engine.index_tender(&rich).await.unwrap();
    engine.refresh_profile_embedding("p-1").await.unwrap();

    let response = engine.recommend("p-1", &wide_filters()).unwrap();
    assert_eq!(response.items.len(), 1);
    let reasons = &response.items[0].match_reasons;
    assert!(reasons.len() <= 6);
    // Contribution-descending order.
    for pair in reasons.windows(2) {
        assert!(pair[0].weight >= pair[1].weight);
    }
}

#[tokio::test]
async fn degraded_time_budget_still_serves() {
    let engine = build_engine(EngineConfig {
        recommend_budget: Duration::from_millis(0),
        ..EngineConfig::default()
    });
    engine.profiles().upsert(&base_profile()).unwrap();
    engine
        .index_tender(&make_tender("t-1", "IT", "Addis Ababa", 5))
        .await
        .unwrap();

    let response = engine.recommend("p-1", &RecommendFilters::default()).unwrap();
    assert_eq!(response.items.len(), 1);
    assert!(!response.items[0]
        .match_reasons
        .iter()
        .any(|r| r.tag == ReasonTag::PopularityBoost));
}

#[tokio::test]
async fn similar_returns_overlap_and_excludes_reference() {
    let engine = engine();
    engine
        .index_tender(&make_tender("t-ref", "IT", "Addis Ababa", 10))
        .await
        .unwrap();
    // Identical composition, so the stub vectors match exactly.
    engine
        .index_tender(&make_tender("t-twin", "IT", "Addis Ababa", 10))
        .await
        .unwrap();
    let mut other = make_tender("t-other", "Construction", "Oromia", 10);
    other.title = "Bridge rehabilitation".into();
    other.description = "Structural works on the river crossing".into();
    engine.index_tender(&other).await.unwrap();

    let response = engine.similar("t-ref", Some(5)).unwrap();
    assert_eq!(response.reference.id, "t-ref");
    assert!(response.items.iter().all(|i| i.tender.id != "t-ref"));
    assert_eq!(response.items[0].tender.id, "t-twin");
    assert_eq!(response.items[0].similarity_score, 100);
    assert!(response.items[0]
        .common_keywords
        .iter()
        .any(|k| k == "cloud" || k == "erp"));
    for item in &response.items {
        assert!(item.similarity_score <= 100);
        assert!(item.common_keywords.len() <= 10);
    }
}

#[tokio::test]
async fn similar_requires_reference_and_embedding() {
    let engine = engine();
    assert!(matches!(
        engine.similar("missing", None),
        Err(MatchError::ReferenceNotFound(_))
    ));

    // Stored but never embedded.
    engine
        .tenders()
        .upsert(&make_tender("t-raw", "IT", "Addis Ababa", 10))
        .unwrap();
    assert!(matches!(
        engine.similar("t-raw", None),
        Err(MatchError::ReferenceNotEmbedded(_))
    ));
}

#[tokio::test]
async fn refresh_clears_dirty_and_installs_vector() {
    let engine = engine();
    let mut profile = base_profile();
    profile.embedding_dirty = true;
    engine.profiles().upsert(&profile).unwrap();

    assert!(engine.refresh_profile_embedding("p-1").await.unwrap());

    let refreshed = engine.profiles().get("p-1").unwrap().unwrap();
    assert!(!refreshed.embedding_dirty);
    assert!(refreshed.embedding_updated_at.is_some());
}

#[tokio::test]
async fn refresh_is_single_flight_per_profile() {
    let engine = engine();
    engine.profiles().upsert(&base_profile()).unwrap();

    // Simulate an in-flight holder: the second caller skips.
    assert!(engine.acquire_reembed_lease("p-1"));
    assert!(!engine.refresh_profile_embedding("p-1").await.unwrap());

    // Holder finishes; the next caller proceeds.
    engine.reembed_leases.remove("p-1");
    assert!(engine.refresh_profile_embedding("p-1").await.unwrap());

    // A fresh lease is available again after completion.
    assert!(engine.acquire_reembed_lease("p-1"));
}

#[tokio::test]
async fn reembed_if_dirty_consults_the_feedback_trigger() {
    let engine = engine();
    let mut profile = base_profile();
    profile.embedding_dirty = false;
    profile.embedding_updated_at = Some(Utc::now());
    engine.profiles().upsert(&profile).unwrap();

    // Clean and recently embedded: nothing happens.
    assert!(!engine.reembed_if_dirty("p-1").await.unwrap());

    // Dirty and stale: the implicit trigger fires.
    let mut stale = engine.profiles().get("p-1").unwrap().unwrap();
    stale.embedding_dirty = true;
    stale.embedding_updated_at = Some(Utc::now() - ChronoDuration::hours(2));
    engine.profiles().upsert(&stale).unwrap();
    assert!(engine.reembed_if_dirty("p-1").await.unwrap());
}

#[tokio::test]
async fn pagination_returns_limit_and_full_total() {
    let engine = engine();
    engine.profiles().upsert(&base_profile()).unwrap();
    for i in 0..8 {
        engine
            .index_tender(&make_tender(&format!("t-{i}"), "IT", "Addis Ababa", 10))
            .await
            .unwrap();
    }

    let filters = RecommendFilters {
        limit: 3,
        ..wide_filters()
    };
    let response = engine.recommend("p-1", &filters).unwrap();
    assert_eq!(response.items.len(), 3);
    assert_eq!(response.total, 8);
    assert_eq!(response.filters_applied.limit, 3);
}
