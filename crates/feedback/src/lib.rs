//! Feedback pipeline: interaction ingestion, popularity accounting, and
//! preference learning.
//!
//! Interactions are append-only facts recorded with server-assigned weights.
//! Each accepted event updates three kinds of state:
//!
//! 1. the immutable interaction log (stats, audits),
//! 2. per-tender popularity counters (a scored dimension in matching),
//! 3. per-profile learned signals: discovered interests, suppressed regions,
//!    the dismissed-tender set, and the embedding dirty flag that drives
//!    periodic profile re-embedding.
//!
//! Ingestion is idempotent per `(user, tender, type, time-bucket)` so network
//! retries cannot double-count, and sheds with an explicit queue-full error
//! instead of dropping events silently.

pub mod config;

pub use crate::config::FeedbackConfig;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use thiserror::Error;

use domain::profile::MAX_DISCOVERED_INTERESTS;
use domain::{CompanyProfile, Interaction, InteractionSnapshot, InteractionType};
use store::{ProfileStore, StoreError};

#[derive(Debug, Error)]
pub enum FeedbackError {
    /// The ingest buffer is saturated; the caller should retry later.
    #[error("interaction queue full")]
    QueueFull,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One interaction submission.
#[derive(Debug, Clone)]
pub struct RecordRequest {
    pub user_id: String,
    pub tender_id: String,
    pub interaction_type: InteractionType,
    pub time_spent_seconds: Option<u32>,
    pub feedback_reason: Option<String>,
    pub match_score_at_time: Option<u8>,
    pub snapshot: InteractionSnapshot,
}

/// Result of recording an interaction.
#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
    pub interaction_id: String,
    /// True when the submission collapsed into an earlier one inside the
    /// dedup window; nothing was persisted and no counters moved.
    pub deduplicated: bool,
    /// The server-assigned weight that was applied.
    pub weight: i32,
}

/// Per-type interaction counts plus view dwell time for one user.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserInteractionStats {
    pub counts: BTreeMap<String, u64>,
    pub total: u64,
    pub average_view_seconds: f32,
}

#[derive(Default)]
struct ProfileSignals {
    /// Positive-interaction counts per category/region signal.
    positive_signals: HashMap<String, u32>,
    /// Location-motivated dismissal counts per region.
    dismissal_regions: HashMap<String, u32>,
    /// Regions barred from future discovered-interest additions.
    suppressed_regions: HashSet<String>,
    interactions_since_embed: u64,
}

/// The feedback processor. Cheap to share behind an `Arc`; every map is
/// internally synchronized and popularity updates never hold a lock across
/// store I/O.
pub struct FeedbackProcessor {
    cfg: FeedbackConfig,
    profiles: Arc<ProfileStore>,
    log: RwLock<Vec<Interaction>>,
    dedup: DashMap<String, String>,
    popularity: DashMap<String, f64>,
    dismissed: DashMap<String, HashSet<String>>,
    signals: DashMap<String, ProfileSignals>,
    in_flight: AtomicUsize,
    p95_cache: Mutex<Option<(f64, Instant)>>,
}

impl FeedbackProcessor {
    pub fn new(cfg: FeedbackConfig, profiles: Arc<ProfileStore>) -> Self {
        Self {
            cfg,
            profiles,
            log: RwLock::new(Vec::new()),
            dedup: DashMap::new(),
            popularity: DashMap::new(),
            dismissed: DashMap::new(),
            signals: DashMap::new(),
            in_flight: AtomicUsize::new(0),
            p95_cache: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &FeedbackConfig {
        &self.cfg
    }

    /// Record one interaction. Idempotent inside the dedup window; atomic in
    /// the sense that either every effect applies or none does.
    pub fn record(&self, req: RecordRequest) -> Result<RecordOutcome, FeedbackError> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) >= self.cfg.ingest_capacity {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(FeedbackError::QueueFull);
        }
        let result = self.record_inner(req);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn record_inner(&self, req: RecordRequest) -> Result<RecordOutcome, FeedbackError> {
        let now = Utc::now();
        let weight = self.effective_weight(&req);

        let bucket = now.timestamp() / self.cfg.dedup_window_secs.max(1) as i64;
        let dedup_key = format!(
            "{}|{}|{}|{}",
            req.user_id,
            req.tender_id,
            req.interaction_type.as_str(),
            bucket
        );

        let interaction_id = uuid::Uuid::new_v4().to_string();
        match self.dedup.entry(dedup_key) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                return Ok(RecordOutcome {
                    interaction_id: existing.get().clone(),
                    deduplicated: true,
                    weight,
                });
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(interaction_id.clone());
            }
        }

        let interaction = Interaction {
            id: interaction_id.clone(),
            user_id: req.user_id.clone(),
            tender_id: req.tender_id.clone(),
            interaction_type: req.interaction_type,
            interaction_weight: weight,
            time_spent_seconds: req.time_spent_seconds,
            match_score_at_time: req.match_score_at_time,
            feedback_reason: req.feedback_reason.clone(),
            snapshot: req.snapshot.clone(),
            created_at: now,
        };
        self.log
            .write()
            .expect("interaction log lock poisoned")
            .push(interaction);

        // Popularity floors at zero: dismissals cannot drive a tender
        // negative.
        {
            let mut entry = self.popularity.entry(req.tender_id.clone()).or_insert(0.0);
            *entry = (*entry + weight as f64).max(0.0);
        }

        if req.interaction_type == InteractionType::Dismiss {
            self.dismissed
                .entry(req.user_id.clone())
                .or_default()
                .insert(req.tender_id.clone());
        }

        self.apply_profile_effects(&req)?;

        tracing::debug!(
            user = %req.user_id,
            tender = %req.tender_id,
            kind = req.interaction_type.as_str(),
            weight,
            "interaction recorded"
        );

        Ok(RecordOutcome {
            interaction_id,
            deduplicated: false,
            weight,
        })
    }

    fn effective_weight(&self, req: &RecordRequest) -> i32 {
        match req.interaction_type {
            InteractionType::View => {
                if req.time_spent_seconds.unwrap_or(0) >= self.cfg.min_view_seconds {
                    InteractionType::View.base_weight()
                } else {
                    0
                }
            }
            other => other.base_weight(),
        }
    }

    fn apply_profile_effects(&self, req: &RecordRequest) -> Result<(), FeedbackError> {
        let Some(mut profile) = self.profiles.get_by_company(&req.user_id)? else {
            return Ok(());
        };

        profile.interaction_count += 1;

        let mut signals = self.signals.entry(profile.id.clone()).or_default();
        signals.interactions_since_embed += 1;

        if req.interaction_type.is_positive() {
            self.learn_interest(&mut profile, &mut signals, &req.snapshot.tender_category, true);
            self.learn_interest(&mut profile, &mut signals, &req.snapshot.tender_region, false);
        }

        if req.interaction_type == InteractionType::Dismiss && is_location_complaint(&req.feedback_reason)
        {
            let region = req.snapshot.tender_region.clone();
            if !region.is_empty() {
                let count = {
                    let entry = signals.dismissal_regions.entry(region.clone()).or_insert(0);
                    *entry += 1;
                    *entry
                };
                if count >= self.cfg.region_dismissal_threshold
                    && signals.suppressed_regions.insert(region.clone())
                {
                    profile
                        .discovered_interests
                        .retain(|interest| !interest.eq_ignore_ascii_case(&region));
                    profile.embedding_dirty = true;
                    tracing::info!(profile = %profile.id, %region, "region suppressed after repeated dismissals");
                }
            }
        }

        if signals.interactions_since_embed >= self.cfg.reembed_interaction_budget {
            profile.embedding_dirty = true;
        }

        drop(signals);
        self.profiles.upsert(&profile)?;
        Ok(())
    }

    /// Count a positive signal and promote it into `discovered_interests`
    /// once it crosses the threshold. Categories the profile already tracks
    /// and suppressed regions never get promoted.
    fn learn_interest(
        &self,
        profile: &mut CompanyProfile,
        signals: &mut ProfileSignals,
        value: &str,
        is_category: bool,
    ) {
        if value.is_empty() {
            return;
        }
        let already_stated = if is_category {
            profile
                .active_sectors
                .iter()
                .any(|s| s.eq_ignore_ascii_case(value))
                || profile.primary_sector.eq_ignore_ascii_case(value)
        } else {
            profile
                .preferred_regions
                .iter()
                .any(|r| r.eq_ignore_ascii_case(value))
        };
        if already_stated {
            return;
        }
        if !is_category
            && signals
                .suppressed_regions
                .iter()
                .any(|r| r.eq_ignore_ascii_case(value))
        {
            return;
        }

        let count = signals.positive_signals.entry(value.to_string()).or_insert(0);
        *count += 1;
        if *count >= self.cfg.discovered_interest_threshold
            && profile.discovered_interests.len() < MAX_DISCOVERED_INTERESTS
            && !profile
                .discovered_interests
                .iter()
                .any(|i| i.eq_ignore_ascii_case(value))
        {
            profile.discovered_interests.push(value.to_string());
            profile.embedding_dirty = true;
            tracing::info!(profile = %profile.id, interest = value, "discovered new interest");
        }
    }

    /// Per-type counts and average view dwell time for one user.
    pub fn user_stats(&self, user_id: &str) -> UserInteractionStats {
        let log = self.log.read().expect("interaction log lock poisoned");
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut total = 0u64;
        let mut view_seconds = 0u64;
        let mut timed_views = 0u64;

        for interaction in log.iter().filter(|i| i.user_id == user_id) {
            *counts
                .entry(interaction.interaction_type.as_str().to_string())
                .or_insert(0) += 1;
            total += 1;
            if interaction.interaction_type == InteractionType::View {
                if let Some(seconds) = interaction.time_spent_seconds {
                    view_seconds += seconds as u64;
                    timed_views += 1;
                }
            }
        }

        UserInteractionStats {
            counts,
            total,
            average_view_seconds: if timed_views == 0 {
                0.0
            } else {
                view_seconds as f32 / timed_views as f32
            },
        }
    }

    /// Tenders this user has dismissed; excluded from every recommendation.
    pub fn dismissed_tenders(&self, user_id: &str) -> HashSet<String> {
        self.dismissed
            .get(user_id)
            .map(|set| set.clone())
            .unwrap_or_default()
    }

    pub fn popularity(&self, tender_id: &str) -> f64 {
        self.popularity.get(tender_id).map(|v| *v).unwrap_or(0.0)
    }

    /// Popularity normalized by the rolling 95th percentile, clamped to
    /// [0, 1]. The percentile is recomputed lazily at most once per
    /// `percentile_refresh_secs`.
    pub fn popularity_norm(&self, tender_id: &str) -> f32 {
        let p95 = self.popularity_p95();
        if p95 <= 0.0 {
            return 0.0;
        }
        (self.popularity(tender_id) / p95).clamp(0.0, 1.0) as f32
    }

    fn popularity_p95(&self) -> f64 {
        let mut cache = self.p95_cache.lock().expect("p95 cache lock poisoned");
        if let Some((value, at)) = *cache {
            if at.elapsed().as_secs() < self.cfg.percentile_refresh_secs {
                return value;
            }
        }

        let mut values: Vec<f64> = self
            .popularity
            .iter()
            .map(|entry| *entry.value())
            .filter(|v| *v > 0.0)
            .collect();
        let p95 = if values.is_empty() {
            0.0
        } else {
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let idx = ((values.len() as f64) * 0.95).ceil() as usize;
            values[idx.saturating_sub(1).min(values.len() - 1)]
        };
        *cache = Some((p95, Instant::now()));
        p95
    }

    /// Whether the implicit re-embed trigger fires for this profile right
    /// now: dirty and past the minimum interval, or the interaction budget
    /// since the last embed is exhausted.
    pub fn should_reembed(&self, profile: &CompanyProfile, now: DateTime<Utc>) -> bool {
        let since_budget = self
            .signals
            .get(&profile.id)
            .map(|s| s.interactions_since_embed >= self.cfg.reembed_interaction_budget)
            .unwrap_or(false);
        if since_budget {
            return true;
        }
        if !profile.embedding_dirty {
            return false;
        }
        match profile.embedding_updated_at {
            None => true,
            Some(at) => (now - at).num_seconds() >= self.cfg.reembed_min_interval_secs as i64,
        }
    }

    /// Reset the per-profile re-embed budget after a successful embed.
    pub fn note_reembedded(&self, profile_id: &str) {
        if let Some(mut signals) = self.signals.get_mut(profile_id) {
            signals.interactions_since_embed = 0;
        }
    }

    /// Regions currently barred from discovered-interest learning.
    pub fn suppressed_regions(&self, profile_id: &str) -> HashSet<String> {
        self.signals
            .get(profile_id)
            .map(|s| s.suppressed_regions.clone())
            .unwrap_or_default()
    }

    /// Total interactions in the log (all users).
    pub fn log_len(&self) -> usize {
        self.log.read().expect("interaction log lock poisoned").len()
    }
}

fn is_location_complaint(reason: &Option<String>) -> bool {
    reason
        .as_deref()
        .map(|r| {
            let lower = r.to_lowercase();
            lower.contains("location") || lower.contains("region") || lower.contains("far away")
        })
        .unwrap_or(false)
}
