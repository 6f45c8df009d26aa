//! Company matching profile: stated preferences (tier 1 and 2), learned
//! signals (tier 3), and per-dimension scoring weights.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::DomainError;

pub const MAX_ACTIVE_SECTORS: usize = 5;
pub const MAX_PREFERRED_REGIONS: usize = 5;
pub const MIN_KEYWORDS: usize = 3;
pub const MAX_KEYWORDS: usize = 10;
pub const MAX_DISCOVERED_INTERESTS: usize = 10;

/// Company headcount band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompanySize {
    Startup,
    Small,
    Medium,
    Large,
}

/// Years-in-operation band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum YearsInOperation {
    #[serde(rename = "<1")]
    UnderOne,
    #[serde(rename = "1-3")]
    OneToThree,
    #[serde(rename = "3-5")]
    ThreeToFive,
    #[serde(rename = "5-10")]
    FiveToTen,
    #[serde(rename = "10+")]
    TenPlus,
}

/// Per-dimension scoring weight overrides. Field values are proportions that
/// get renormalized to a 100-point scale at scoring time; the defaults below
/// already sum to 100. Unknown keys supplied by older clients are preserved
/// through serialization but never scored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoringWeights {
    #[serde(default = "default_sector_weight")]
    pub sector: f32,
    #[serde(default = "default_sub_sector_weight")]
    pub sub_sector: f32,
    #[serde(default = "default_keyword_weight")]
    pub keyword: f32,
    #[serde(default = "default_region_weight")]
    pub region: f32,
    #[serde(default = "default_budget_weight")]
    pub budget: f32,
    #[serde(default = "default_certification_weight")]
    pub certification: f32,
    #[serde(default = "default_language_weight")]
    pub language: f32,
    #[serde(default = "default_deadline_weight")]
    pub deadline: f32,
    #[serde(default = "default_urgency_weight")]
    pub urgency: f32,
    #[serde(default = "default_popularity_weight")]
    pub popularity: f32,
    #[serde(default = "default_semantic_weight")]
    pub semantic: f32,
    #[serde(flatten)]
    pub extra: BTreeMap<String, f32>,
}

fn default_sector_weight() -> f32 {
    20.0
}
fn default_sub_sector_weight() -> f32 {
    10.0
}
fn default_keyword_weight() -> f32 {
    15.0
}
fn default_region_weight() -> f32 {
    10.0
}
fn default_budget_weight() -> f32 {
    10.0
}
fn default_certification_weight() -> f32 {
    5.0
}
fn default_language_weight() -> f32 {
    5.0
}
fn default_deadline_weight() -> f32 {
    5.0
}
fn default_urgency_weight() -> f32 {
    5.0
}
fn default_popularity_weight() -> f32 {
    5.0
}
fn default_semantic_weight() -> f32 {
    10.0
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            sector: default_sector_weight(),
            sub_sector: default_sub_sector_weight(),
            keyword: default_keyword_weight(),
            region: default_region_weight(),
            budget: default_budget_weight(),
            certification: default_certification_weight(),
            language: default_language_weight(),
            deadline: default_deadline_weight(),
            urgency: default_urgency_weight(),
            popularity: default_popularity_weight(),
            semantic: default_semantic_weight(),
            extra: BTreeMap::new(),
        }
    }
}

impl ScoringWeights {
    pub fn validate(&self) -> Result<(), DomainError> {
        let named = [
            ("sector", self.sector),
            ("sub_sector", self.sub_sector),
            ("keyword", self.keyword),
            ("region", self.region),
            ("budget", self.budget),
            ("certification", self.certification),
            ("language", self.language),
            ("deadline", self.deadline),
            ("urgency", self.urgency),
            ("popularity", self.popularity),
            ("semantic", self.semantic),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(DomainError::invalid(
                    "scoring_weights",
                    format!("{name} must be a non-negative number, got {value}"),
                ));
            }
        }
        Ok(())
    }
}

/// A company's stated and learned preferences used for matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanyProfile {
    pub id: String,
    /// Owning company; exactly one profile per company.
    pub company_id: String,

    // Tier 1 - required by onboarding step 1.
    pub primary_sector: String,
    pub active_sectors: Vec<String>,
    #[serde(default)]
    pub sub_sectors: Vec<String>,
    pub preferred_regions: Vec<String>,
    pub keywords: Vec<String>,

    // Tier 2 - optional refinements from onboarding step 2.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_size: Option<CompanySize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years_in_operation: Option<YearsInOperation>,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_max: Option<f64>,
    #[serde(default = "default_budget_currency")]
    pub budget_currency: String,

    // Tier 3 - learned by the feedback loop, never edited directly.
    #[serde(default)]
    pub discovered_interests: Vec<String>,
    #[serde(default)]
    pub preferred_sources: Vec<String>,
    #[serde(default = "default_preferred_languages")]
    pub preferred_languages: Vec<String>,
    #[serde(default)]
    pub min_deadline_days: i64,

    // Matching configuration.
    #[serde(default)]
    pub min_match_threshold: u8,
    #[serde(default)]
    pub scoring_weights: ScoringWeights,

    // Embedding bookkeeping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub embedding_dirty: bool,

    // Counters.
    #[serde(default)]
    pub interaction_count: u64,
    #[serde(default)]
    pub onboarding_step: u8,
}

fn default_budget_currency() -> String {
    "ETB".to_string()
}

fn default_preferred_languages() -> Vec<String> {
    vec!["english".to_string()]
}

impl CompanyProfile {
    /// Minimal profile as created by onboarding step 1.
    pub fn new(id: impl Into<String>, company_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            company_id: company_id.into(),
            primary_sector: String::new(),
            active_sectors: Vec::new(),
            sub_sectors: Vec::new(),
            preferred_regions: Vec::new(),
            keywords: Vec::new(),
            company_size: None,
            years_in_operation: None,
            certifications: Vec::new(),
            budget_min: None,
            budget_max: None,
            budget_currency: default_budget_currency(),
            discovered_interests: Vec::new(),
            preferred_sources: Vec::new(),
            preferred_languages: default_preferred_languages(),
            min_deadline_days: 0,
            min_match_threshold: 0,
            scoring_weights: ScoringWeights::default(),
            embedding_updated_at: None,
            embedding_dirty: true,
            interaction_count: 0,
            onboarding_step: 1,
        }
    }

    /// Tier-1 fields are all present within their cardinality limits.
    pub fn tier1_complete(&self) -> bool {
        !self.primary_sector.trim().is_empty()
            && !self.active_sectors.is_empty()
            && self.active_sectors.len() <= MAX_ACTIVE_SECTORS
            && !self.preferred_regions.is_empty()
            && self.preferred_regions.len() <= MAX_PREFERRED_REGIONS
            && self.keywords.len() >= MIN_KEYWORDS
            && self.keywords.len() <= MAX_KEYWORDS
    }

    /// Tier-2 fields are all filled in.
    pub fn tier2_complete(&self) -> bool {
        self.company_size.is_some()
            && self.years_in_operation.is_some()
            && self.budget_min.is_some()
            && self.budget_max.is_some()
    }

    /// Completion percentage reported to clients: tier 1 carries 70 points
    /// split over its four required groups, tier 2 the remaining 30.
    pub fn completion_percentage(&self) -> u8 {
        let mut pct = 0u8;
        if !self.primary_sector.trim().is_empty() && !self.active_sectors.is_empty() {
            pct += 20;
        }
        if !self.preferred_regions.is_empty() {
            pct += 20;
        }
        if self.keywords.len() >= MIN_KEYWORDS {
            pct += 20;
        }
        if !self.sub_sectors.is_empty() {
            pct += 10;
        }
        if self.company_size.is_some() && self.years_in_operation.is_some() {
            pct += 10;
        }
        if self.budget_min.is_some() && self.budget_max.is_some() {
            pct += 10;
        }
        if !self.certifications.is_empty() {
            pct += 10;
        }
        pct
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.trim().is_empty() {
            return Err(DomainError::MissingField("id"));
        }
        if self.company_id.trim().is_empty() {
            return Err(DomainError::MissingField("company_id"));
        }
        if self.active_sectors.len() > MAX_ACTIVE_SECTORS {
            return Err(DomainError::invalid(
                "active_sectors",
                format!("at most {MAX_ACTIVE_SECTORS} entries"),
            ));
        }
        if self.preferred_regions.len() > MAX_PREFERRED_REGIONS {
            return Err(DomainError::invalid(
                "preferred_regions",
                format!("at most {MAX_PREFERRED_REGIONS} entries"),
            ));
        }
        if self.keywords.len() > MAX_KEYWORDS {
            return Err(DomainError::invalid(
                "keywords",
                format!("at most {MAX_KEYWORDS} entries"),
            ));
        }
        if let (Some(min), Some(max)) = (self.budget_min, self.budget_max) {
            if min > max {
                return Err(DomainError::invalid(
                    "budget_min",
                    format!("must not exceed budget_max ({min} > {max})"),
                ));
            }
        }
        if self.min_match_threshold > 100 {
            return Err(DomainError::invalid(
                "min_match_threshold",
                "must be within [0, 100]".to_string(),
            ));
        }
        if self.discovered_interests.len() > MAX_DISCOVERED_INTERESTS {
            return Err(DomainError::invalid(
                "discovered_interests",
                format!("at most {MAX_DISCOVERED_INTERESTS} entries"),
            ));
        }
        self.scoring_weights.validate()
    }
}

/// Partial update payload for `PUT /company-profile`. Absent fields leave the
/// profile untouched; learned tier-3 state is not client-writable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyProfileUpdate {
    pub primary_sector: Option<String>,
    pub active_sectors: Option<Vec<String>>,
    pub sub_sectors: Option<Vec<String>>,
    pub preferred_regions: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    pub company_size: Option<CompanySize>,
    pub years_in_operation: Option<YearsInOperation>,
    pub certifications: Option<Vec<String>>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub budget_currency: Option<String>,
    pub preferred_languages: Option<Vec<String>>,
    pub min_deadline_days: Option<i64>,
    pub min_match_threshold: Option<u8>,
    pub scoring_weights: Option<ScoringWeights>,
}

impl CompanyProfileUpdate {
    /// Apply the update in place, reporting whether any field relevant to the
    /// profile embedding text changed (which marks the embedding dirty).
    pub fn apply_to(&self, profile: &mut CompanyProfile) -> Result<bool, DomainError> {
        let mut embedding_relevant = false;

        macro_rules! set_text_field {
            ($field:ident) => {
                if let Some(value) = &self.$field {
                    if &profile.$field != value {
                        profile.$field = value.clone();
                        embedding_relevant = true;
                    }
                }
            };
        }

        set_text_field!(primary_sector);
        set_text_field!(active_sectors);
        set_text_field!(sub_sectors);
        set_text_field!(preferred_regions);
        set_text_field!(keywords);
        set_text_field!(certifications);

        if let Some(value) = self.company_size {
            profile.company_size = Some(value);
        }
        if let Some(value) = self.years_in_operation {
            profile.years_in_operation = Some(value);
        }
        if let Some(value) = self.budget_min {
            profile.budget_min = Some(value);
        }
        if let Some(value) = self.budget_max {
            profile.budget_max = Some(value);
        }
        if let Some(value) = &self.budget_currency {
            profile.budget_currency = value.clone();
        }
        if let Some(value) = &self.preferred_languages {
            profile.preferred_languages = value.clone();
        }
        if let Some(value) = self.min_deadline_days {
            profile.min_deadline_days = value;
        }
        if let Some(value) = self.min_match_threshold {
            profile.min_match_threshold = value;
        }
        if let Some(value) = &self.scoring_weights {
            profile.scoring_weights = value.clone();
        }

        if profile.tier1_complete() && profile.onboarding_step < 2 {
            profile.onboarding_step = 2;
        }
        if embedding_relevant {
            profile.embedding_dirty = true;
        }

        profile.validate()?;
        Ok(embedding_relevant)
    }
}

/// Enumerations surfaced by `GET /company-profile/options` so clients render
/// pickers without hardcoding the vocabulary.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileOptions {
    pub sectors: Vec<&'static str>,
    pub regions: Vec<&'static str>,
    pub company_sizes: Vec<&'static str>,
    pub years_in_operation: Vec<&'static str>,
    pub certifications: Vec<&'static str>,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            sectors: vec![
                "IT",
                "Construction",
                "Consulting",
                "Healthcare",
                "Education",
                "Agriculture",
                "Manufacturing",
                "Logistics",
                "Energy",
                "Finance",
            ],
            regions: vec![
                "Addis Ababa",
                "Oromia",
                "Amhara",
                "Tigray",
                "Sidama",
                "Somali",
                "Afar",
                "Dire Dawa",
                "national",
            ],
            company_sizes: vec!["startup", "small", "medium", "large"],
            years_in_operation: vec!["<1", "1-3", "3-5", "5-10", "10+"],
            certifications: vec![
                "ISO 9001",
                "ISO 14001",
                "ISO 27001",
                "OHSAS 18001",
                "HACCP",
                "CIDB",
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_profile() -> CompanyProfile {
        let mut profile = CompanyProfile::new("p-1", "c-1");
        profile.primary_sector = "IT".into();
        profile.active_sectors = vec!["IT".into()];
        profile.preferred_regions = vec!["Addis Ababa".into()];
        profile.keywords = vec!["cloud".into(), "erp".into(), "network".into()];
        profile
    }

    #[test]
    fn new_profile_is_tier1_incomplete() {
        let profile = CompanyProfile::new("p-1", "c-1");
        assert!(!profile.tier1_complete());
        assert_eq!(profile.completion_percentage(), 0);
        assert!(profile.embedding_dirty);
    }

    #[test]
    fn tier1_complete_requires_three_keywords() {
        let mut profile = complete_profile();
        assert!(profile.tier1_complete());

        profile.keywords.truncate(2);
        assert!(!profile.tier1_complete());
    }

    #[test]
    fn completion_percentage_counts_tiers() {
        let mut profile = complete_profile();
        assert_eq!(profile.completion_percentage(), 60);

        profile.sub_sectors = vec!["networking".into()];
        profile.company_size = Some(CompanySize::Small);
        profile.years_in_operation = Some(YearsInOperation::ThreeToFive);
        profile.budget_min = Some(10_000.0);
        profile.budget_max = Some(500_000.0);
        profile.certifications = vec!["ISO 9001".into()];
        assert_eq!(profile.completion_percentage(), 100);
        assert!(profile.tier2_complete());
    }

    #[test]
    fn inverted_budget_range_rejected() {
        let mut profile = complete_profile();
        profile.budget_min = Some(100.0);
        profile.budget_max = Some(50.0);
        assert!(profile.validate().is_err());
    }

    #[test]
    fn default_weights_sum_to_one_hundred() {
        let w = ScoringWeights::default();
        let sum = w.sector
            + w.sub_sector
            + w.keyword
            + w.region
            + w.budget
            + w.certification
            + w.language
            + w.deadline
            + w.urgency
            + w.popularity
            + w.semantic;
        assert!((sum - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn negative_weight_rejected() {
        let weights = ScoringWeights {
            keyword: -1.0,
            ..ScoringWeights::default()
        };
        assert!(weights.validate().is_err());
    }

    #[test]
    fn update_marks_embedding_dirty_only_for_text_fields() {
        let mut profile = complete_profile();
        profile.embedding_dirty = false;

        let update = CompanyProfileUpdate {
            min_match_threshold: Some(40),
            ..Default::default()
        };
        let relevant = update.apply_to(&mut profile).unwrap();
        assert!(!relevant);
        assert!(!profile.embedding_dirty);
        assert_eq!(profile.min_match_threshold, 40);

        let update = CompanyProfileUpdate {
            keywords: Some(vec!["cloud".into(), "erp".into(), "fiber".into()]),
            ..Default::default()
        };
        let relevant = update.apply_to(&mut profile).unwrap();
        assert!(relevant);
        assert!(profile.embedding_dirty);
    }

    #[test]
    fn update_advances_onboarding_step() {
        let mut profile = CompanyProfile::new("p-1", "c-1");
        let update = CompanyProfileUpdate {
            primary_sector: Some("IT".into()),
            active_sectors: Some(vec!["IT".into()]),
            preferred_regions: Some(vec!["Addis Ababa".into()]),
            keywords: Some(vec!["cloud".into(), "erp".into(), "lan".into()]),
            ..Default::default()
        };
        update.apply_to(&mut profile).unwrap();
        assert_eq!(profile.onboarding_step, 2);
    }

    #[test]
    fn unknown_weight_keys_round_trip() {
        let raw = serde_json::json!({ "keyword": 30.0, "experimental": 3.0 });
        let weights: ScoringWeights = serde_json::from_value(raw).unwrap();
        assert_eq!(weights.keyword, 30.0);
        assert_eq!(weights.extra.get("experimental"), Some(&3.0));
        // Untouched dimensions keep their defaults.
        assert_eq!(weights.sector, 20.0);
    }

    #[test]
    fn years_in_operation_serde_labels() {
        let years: YearsInOperation = serde_json::from_str("\"10+\"").unwrap();
        assert_eq!(years, YearsInOperation::TenPlus);
        assert_eq!(serde_json::to_string(&YearsInOperation::UnderOne).unwrap(), "\"<1\"");
    }
}
