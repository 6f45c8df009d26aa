//! User interactions with tenders. Interactions are append-only facts: once
//! written they are never edited, and their weight is assigned server-side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of interaction kinds accepted by the feedback pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    View,
    Save,
    Apply,
    Dismiss,
    RatePositive,
    RateNegative,
}

impl InteractionType {
    /// Server-assigned signal weight. Views are gated separately on dwell
    /// time; see the feedback processor.
    pub fn base_weight(self) -> i32 {
        match self {
            InteractionType::View => 1,
            InteractionType::Save => 5,
            InteractionType::Apply => 10,
            InteractionType::Dismiss => -5,
            InteractionType::RatePositive => 7,
            InteractionType::RateNegative => -7,
        }
    }

    /// Whether this interaction expresses positive intent toward the tender,
    /// feeding discovered-interest learning.
    pub fn is_positive(self) -> bool {
        matches!(
            self,
            InteractionType::Save | InteractionType::Apply | InteractionType::RatePositive
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InteractionType::View => "view",
            InteractionType::Save => "save",
            InteractionType::Apply => "apply",
            InteractionType::Dismiss => "dismiss",
            InteractionType::RatePositive => "rate_positive",
            InteractionType::RateNegative => "rate_negative",
        }
    }
}

/// Tender attributes frozen at the moment of the event, so later edits to the
/// tender never rewrite feedback history.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InteractionSnapshot {
    pub tender_category: String,
    pub tender_region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tender_budget: Option<f64>,
}

/// A single recorded interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    pub id: String,
    pub user_id: String,
    pub tender_id: String,
    pub interaction_type: InteractionType,
    /// Effective weight after server-side gating (e.g. short views carry 0).
    pub interaction_weight: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_score_at_time: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_reason: Option<String>,
    #[serde(default)]
    pub snapshot: InteractionSnapshot,
    pub created_at: DateTime<Utc>,
}
