use serde::{Deserialize, Serialize};

/// Tuning knobs for the feedback pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackConfig {
    /// Idempotency window: duplicate `(user, tender, type)` submissions
    /// inside one bucket collapse into the first.
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,
    /// Views shorter than this carry zero weight.
    #[serde(default = "default_min_view_seconds")]
    pub min_view_seconds: u32,
    /// Positive interactions required before a new category or region is
    /// promoted into `discovered_interests`.
    #[serde(default = "default_discovered_interest_threshold")]
    pub discovered_interest_threshold: u32,
    /// Location-motivated dismissals in one region before that region is
    /// suppressed from future discovered-interest additions.
    #[serde(default = "default_region_dismissal_threshold")]
    pub region_dismissal_threshold: u32,
    /// Minimum seconds between implicit profile re-embeds.
    #[serde(default = "default_reembed_min_interval_secs")]
    pub reembed_min_interval_secs: u64,
    /// Interactions since the last embed that force a re-embed regardless of
    /// the dirty flag.
    #[serde(default = "default_reembed_interaction_budget")]
    pub reembed_interaction_budget: u64,
    /// Concurrent interaction writes tolerated before ingestion sheds with an
    /// explicit queue-full rejection.
    #[serde(default = "default_ingest_capacity")]
    pub ingest_capacity: usize,
    /// Seconds the rolling popularity percentile may serve stale.
    #[serde(default = "default_percentile_refresh_secs")]
    pub percentile_refresh_secs: u64,
}

fn default_dedup_window_secs() -> u64 {
    10
}
fn default_min_view_seconds() -> u32 {
    5
}
fn default_discovered_interest_threshold() -> u32 {
    3
}
fn default_region_dismissal_threshold() -> u32 {
    3
}
fn default_reembed_min_interval_secs() -> u64 {
    3600
}
fn default_reembed_interaction_budget() -> u64 {
    25
}
fn default_ingest_capacity() -> usize {
    1024
}
fn default_percentile_refresh_secs() -> u64 {
    60
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            dedup_window_secs: default_dedup_window_secs(),
            min_view_seconds: default_min_view_seconds(),
            discovered_interest_threshold: default_discovered_interest_threshold(),
            region_dismissal_threshold: default_region_dismissal_threshold(),
            reembed_min_interval_secs: default_reembed_min_interval_secs(),
            reembed_interaction_budget: default_reembed_interaction_budget(),
            ingest_capacity: default_ingest_capacity(),
            percentile_refresh_secs: default_percentile_refresh_secs(),
        }
    }
}

impl FeedbackConfig {
    /// Apply `REEMBED_MIN_INTERVAL` and `INTERACTION_DEDUP_WINDOW` (both in
    /// seconds) from the environment when present.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(value) = std::env::var("REEMBED_MIN_INTERVAL") {
            if let Ok(parsed) = value.parse() {
                cfg.reembed_min_interval_secs = parsed;
            }
        }
        if let Ok(value) = std::env::var("INTERACTION_DEDUP_WINDOW") {
            if let Ok(parsed) = value.parse() {
                cfg.dedup_window_secs = parsed;
            }
        }
        cfg
    }
}
