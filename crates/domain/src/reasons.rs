//! Match explanations. A `MatchReason` lives only inside a single
//! recommendation response; reasons are recomputed on every request and never
//! stored.

use serde::{Deserialize, Serialize};

/// Which signal produced a reason.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReasonTag {
    SemanticMatch,
    SectorMatch,
    SubsectorMatch,
    KeywordMatch,
    RegionMatch,
    BudgetMatch,
    Urgency,
    CertificationMatch,
    LanguageMatch,
    DeadlineMatch,
    PopularityBoost,
}

/// One explanation token with its contribution in match-score points.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchReason {
    pub tag: ReasonTag,
    /// Free-text label for the matched value (a sector name, a keyword, ...).
    pub category: String,
    /// Short human-readable sentence.
    pub reason: String,
    /// Points this signal contributed to the final match score.
    pub weight: u32,
}

impl MatchReason {
    pub fn new(
        tag: ReasonTag,
        category: impl Into<String>,
        reason: impl Into<String>,
        weight: u32,
    ) -> Self {
        Self {
            tag,
            category: category.into(),
            reason: reason.into(),
            weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_tag_serde_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&ReasonTag::SemanticMatch).unwrap(),
            "\"semantic_match\""
        );
        let parsed: ReasonTag = serde_json::from_str("\"popularity_boost\"").unwrap();
        assert_eq!(parsed, ReasonTag::PopularityBoost);
    }
}
