//! Tender entity and its derived read-time views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::DomainError;

/// Publication status of a tender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TenderStatus {
    Published,
    Closed,
    Draft,
    Cancelled,
}

/// Monetary budget attached to a tender.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Budget {
    /// Amount in the stated currency. Never negative.
    pub amount: f64,
    /// ISO-ish currency code, e.g. "ETB" or "USD".
    pub currency: String,
}

/// Structured fields pre-extracted from the raw tender text by an upstream
/// content pipeline. The set of recognized fields is closed; anything the
/// extractor emits beyond it is preserved in `extra` but never scored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractedData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financial: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dates: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifications: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_flag: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tender_type: Option<serde_json::Value>,
    /// Unknown extractor keys, carried through verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Per-interaction-kind counters owned by the feedback layer and snapshotted
/// onto the tender for serialization.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PopularityCounters {
    pub views: u64,
    pub saves: u64,
    pub applies: u64,
    pub dismisses: u64,
    pub positive_ratings: u64,
    pub negative_ratings: u64,
}

/// A published procurement opportunity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tender {
    /// Opaque unique identifier.
    pub id: String,
    /// Globally unique source URL the tender was imported from.
    pub source_url: String,
    /// Stable external identifier preserved across re-imports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub title: String,
    /// Raw description as imported.
    pub description: String,
    /// Cleaned description produced by the upstream extractor, preferred over
    /// `description` wherever both exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    pub category: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<Budget>,
    /// Tender language, lowercase (e.g. "english", "amharic").
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub status: TenderStatus,
    pub published_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default)]
    pub extracted: ExtractedData,
    #[serde(default)]
    pub popularity: PopularityCounters,
    /// Scalar popularity score accumulated from interaction weights; >= 0.
    #[serde(default)]
    pub popularity_score: f64,
}

fn default_language() -> String {
    "english".to_string()
}

impl Tender {
    /// Status as observed at read time: a published tender whose deadline has
    /// passed reads as closed.
    pub fn effective_status(&self, now: DateTime<Utc>) -> TenderStatus {
        match (self.status, self.deadline) {
            (TenderStatus::Published, Some(deadline)) if deadline <= now => TenderStatus::Closed,
            (status, _) => status,
        }
    }

    /// Whole days remaining until the deadline, `None` when open-ended.
    /// A deadline later today counts as 0 days.
    pub fn days_until_deadline(&self, now: DateTime<Utc>) -> Option<i64> {
        self.deadline.map(|deadline| (deadline - now).num_days())
    }

    /// The text body used for keyword and sub-sector matching: the cleaned
    /// description when available, the raw one otherwise.
    pub fn match_text(&self) -> &str {
        self.clean_description.as_deref().unwrap_or(&self.description)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.trim().is_empty() {
            return Err(DomainError::MissingField("id"));
        }
        if self.source_url.trim().is_empty() {
            return Err(DomainError::MissingField("source_url"));
        }
        if self.title.trim().is_empty() {
            return Err(DomainError::MissingField("title"));
        }
        if let Some(budget) = &self.budget {
            if budget.amount < 0.0 {
                return Err(DomainError::invalid(
                    "budget.amount",
                    format!("must be >= 0, got {}", budget.amount),
                ));
            }
        }
        if self.popularity_score < 0.0 {
            return Err(DomainError::invalid(
                "popularity_score",
                "must be >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_tender() -> Tender {
        Tender {
            id: "t-1".into(),
            source_url: "https://tenders.example/t-1".into(),
            external_id: None,
            title: "Cloud ERP rollout".into(),
            description: "Deploy a cloud based ERP system".into(),
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
            deadline: Some(Utc::now() + Duration::days(14)),
            status: TenderStatus::Published,
            published_at: Utc::now() - Duration::days(1),
            organization: Some("Ministry of Finance".into()),
            extracted: ExtractedData::default(),
            popularity: PopularityCounters::default(),
            popularity_score: 0.0,
        }
    }

    #[test]
    fn published_with_past_deadline_reads_closed() {
        let now = Utc::now();
        let mut tender = sample_tender();
        tender.deadline = Some(now - Duration::hours(1));
        assert_eq!(tender.effective_status(now), TenderStatus::Closed);

        tender.deadline = Some(now + Duration::hours(1));
        assert_eq!(tender.effective_status(now), TenderStatus::Published);
    }

    #[test]
    fn draft_status_is_unaffected_by_deadline() {
        let now = Utc::now();
        let mut tender = sample_tender();
        tender.status = TenderStatus::Draft;
        tender.deadline = Some(now - Duration::days(3));
        assert_eq!(tender.effective_status(now), TenderStatus::Draft);
    }

    #[test]
    fn days_until_deadline_counts_whole_days() {
        let now = Utc::now();
        let mut tender = sample_tender();
        tender.deadline = Some(now + Duration::days(7) + Duration::hours(2));
        assert_eq!(tender.days_until_deadline(now), Some(7));

        tender.deadline = None;
        assert_eq!(tender.days_until_deadline(now), None);
    }

    #[test]
    fn match_text_prefers_clean_description() {
        let mut tender = sample_tender();
        assert_eq!(tender.match_text(), tender.description);

        tender.clean_description = Some("cleaned body".into());
        assert_eq!(tender.match_text(), "cleaned body");
    }

    #[test]
    fn negative_budget_rejected() {
        let mut tender = sample_tender();
        tender.budget = Some(Budget {
            amount: -1.0,
            currency: "ETB".into(),
        });
        assert!(matches!(
            tender.validate(),
            Err(DomainError::InvalidValue { field: "budget.amount", .. })
        ));
    }

    #[test]
    fn extracted_data_preserves_unknown_keys() {
        let raw = serde_json::json!({
            "financial": {"advance": "10%"},
            "novel_section": {"anything": true},
        });
        let extracted: ExtractedData = serde_json::from_value(raw.clone()).unwrap();
        assert!(extracted.financial.is_some());
        assert!(extracted.extra.contains_key("novel_section"));

        let round = serde_json::to_value(&extracted).unwrap();
        assert_eq!(round["novel_section"], raw["novel_section"]);
    }
}
