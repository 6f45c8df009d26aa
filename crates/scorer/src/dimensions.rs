//! Scoring dimensions, their weight resolution, and renormalization.

use domain::{CompanyProfile, ScoringWeights};
use serde::{Deserialize, Serialize};

/// The closed set of structured-match dimensions. The default shares sum to
/// 100; profile overrides are renormalized back to 100 over the dimensions
/// applicable to that profile.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScoreDimension {
    Sector,
    SubSector,
    Keyword,
    Region,
    Budget,
    Certification,
    Language,
    Deadline,
    Urgency,
    Popularity,
    Semantic,
}

pub const ALL_DIMENSIONS: [ScoreDimension; 11] = [
    ScoreDimension::Sector,
    ScoreDimension::SubSector,
    ScoreDimension::Keyword,
    ScoreDimension::Region,
    ScoreDimension::Budget,
    ScoreDimension::Certification,
    ScoreDimension::Language,
    ScoreDimension::Deadline,
    ScoreDimension::Urgency,
    ScoreDimension::Popularity,
    ScoreDimension::Semantic,
];

impl ScoreDimension {
    pub fn default_share(self) -> f32 {
        match self {
            ScoreDimension::Sector => 20.0,
            ScoreDimension::SubSector => 10.0,
            ScoreDimension::Keyword => 15.0,
            ScoreDimension::Region => 10.0,
            ScoreDimension::Budget => 10.0,
            ScoreDimension::Certification => 5.0,
            ScoreDimension::Language => 5.0,
            ScoreDimension::Deadline => 5.0,
            ScoreDimension::Urgency => 5.0,
            ScoreDimension::Popularity => 5.0,
            ScoreDimension::Semantic => 10.0,
        }
    }

    /// The profile's configured weight for this dimension (defaults equal the
    /// built-in shares).
    pub fn configured_weight(self, weights: &ScoringWeights) -> f32 {
        match self {
            ScoreDimension::Sector => weights.sector,
            ScoreDimension::SubSector => weights.sub_sector,
            ScoreDimension::Keyword => weights.keyword,
            ScoreDimension::Region => weights.region,
            ScoreDimension::Budget => weights.budget,
            ScoreDimension::Certification => weights.certification,
            ScoreDimension::Language => weights.language,
            ScoreDimension::Deadline => weights.deadline,
            ScoreDimension::Urgency => weights.urgency,
            ScoreDimension::Popularity => weights.popularity,
            ScoreDimension::Semantic => weights.semantic,
        }
    }
}

/// Which dimensions can contribute for this profile. A dimension the profile
/// carries no data for is dropped and its share redistributed, so an empty
/// tier-2 section does not depress every score.
pub fn applicable_dimensions(
    profile: &CompanyProfile,
    semantic_available: bool,
    popularity_available: bool,
) -> Vec<ScoreDimension> {
    ALL_DIMENSIONS
        .into_iter()
        .filter(|dim| match dim {
            ScoreDimension::SubSector => !profile.sub_sectors.is_empty(),
            ScoreDimension::Certification => !profile.certifications.is_empty(),
            ScoreDimension::Budget => {
                profile.budget_min.is_some() || profile.budget_max.is_some()
            }
            ScoreDimension::Semantic => semantic_available,
            ScoreDimension::Popularity => popularity_available,
            _ => true,
        })
        .collect()
}

/// Effective per-dimension point shares: configured weights over the
/// applicable set, renormalized to a 100-point total. Returns pairs in the
/// canonical dimension order.
pub fn effective_shares(
    profile: &CompanyProfile,
    applicable: &[ScoreDimension],
) -> Vec<(ScoreDimension, f32)> {
    let total: f32 = applicable
        .iter()
        .map(|dim| dim.configured_weight(&profile.scoring_weights))
        .sum();
    if total <= 0.0 {
        return applicable.iter().map(|&dim| (dim, 0.0)).collect();
    }
    applicable
        .iter()
        .map(|&dim| {
            let weight = dim.configured_weight(&profile.scoring_weights);
            (dim, weight * 100.0 / total)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_profile() -> CompanyProfile {
        let mut profile = CompanyProfile::new("p-1", "c-1");
        profile.primary_sector = "IT".into();
        profile.active_sectors = vec!["IT".into()];
        profile.preferred_regions = vec!["Addis Ababa".into()];
        profile.keywords = vec!["cloud".into(), "erp".into(), "lan".into()];
        profile
    }

    #[test]
    fn default_shares_sum_to_one_hundred() {
        let sum: f32 = ALL_DIMENSIONS.iter().map(|d| d.default_share()).sum();
        assert!((sum - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn bare_profile_drops_tier2_dimensions() {
        let profile = base_profile();
        let applicable = applicable_dimensions(&profile, true, true);
        assert!(!applicable.contains(&ScoreDimension::SubSector));
        assert!(!applicable.contains(&ScoreDimension::Certification));
        assert!(!applicable.contains(&ScoreDimension::Budget));
        assert!(applicable.contains(&ScoreDimension::Semantic));
    }

    #[test]
    fn degraded_request_drops_semantic() {
        let profile = base_profile();
        let applicable = applicable_dimensions(&profile, false, true);
        assert!(!applicable.contains(&ScoreDimension::Semantic));
    }

    #[test]
    fn effective_shares_renormalize_to_one_hundred() {
        let profile = base_profile();
        let applicable = applicable_dimensions(&profile, true, true);
        let shares = effective_shares(&profile, &applicable);
        let total: f32 = shares.iter().map(|(_, s)| s).sum();
        assert!((total - 100.0).abs() < 1e-3);

        // With sub-sector (10), certification (5) and budget (10) dropped,
        // the sector share scales by 100/75.
        let sector = shares
            .iter()
            .find(|(d, _)| *d == ScoreDimension::Sector)
            .unwrap()
            .1;
        assert!((sector - 20.0 * 100.0 / 75.0).abs() < 1e-3);
    }

    #[test]
    fn overrides_shift_shares() {
        let mut profile = base_profile();
        profile.scoring_weights.keyword = 30.0;
        let applicable = applicable_dimensions(&profile, true, true);
        let shares = effective_shares(&profile, &applicable);
        let keyword = shares
            .iter()
            .find(|(d, _)| *d == ScoreDimension::Keyword)
            .unwrap()
            .1;
        let sector = shares
            .iter()
            .find(|(d, _)| *d == ScoreDimension::Sector)
            .unwrap()
            .1;
        assert!(keyword > sector);
        let total: f32 = shares.iter().map(|(_, s)| s).sum();
        assert!((total - 100.0).abs() < 1e-3);
    }

    #[test]
    fn all_zero_weights_produce_zero_shares() {
        let mut profile = base_profile();
        profile.scoring_weights = ScoringWeights {
            sector: 0.0,
            sub_sector: 0.0,
            keyword: 0.0,
            region: 0.0,
            budget: 0.0,
            certification: 0.0,
            language: 0.0,
            deadline: 0.0,
            urgency: 0.0,
            popularity: 0.0,
            semantic: 0.0,
            extra: Default::default(),
        };
        let applicable = applicable_dimensions(&profile, true, true);
        let shares = effective_shares(&profile, &applicable);
        assert!(shares.iter().all(|(_, s)| *s == 0.0));
    }
}
