//! Rule-based structured match scoring.
//!
//! Given a company profile and a tender, the scorer computes bounded
//! per-dimension contributions (sector, keywords, region, budget, ...) and
//! fuses them with the semantic and popularity signals supplied by the
//! matcher into a single [0, 100] match score plus human-readable reasons.
//!
//! Weight handling: each profile carries per-dimension weights (defaulting to
//! the built-in shares, which sum to 100). Dimensions the profile has no data
//! for are dropped, and the surviving weights are renormalized back to 100,
//! so scores stay comparable whether or not tier-2 data exists.
//!
//! The sum of emitted reason weights equals the total score exactly; the
//! matcher may truncate reasons for presentation, but the full breakdown is
//! always internally consistent.

pub mod certifications;
pub mod dimensions;

mod rules;

pub use crate::dimensions::{applicable_dimensions, effective_shares, ScoreDimension};

use chrono::{DateTime, Utc};
use serde::Serialize;

use domain::{CompanyProfile, MatchReason, Tender};

use crate::rules::ReasonAtom;

/// Inputs for scoring one tender against one profile.
pub struct ScoringContext<'a> {
    pub profile: &'a CompanyProfile,
    pub tender: &'a Tender,
    /// Timestamp all deadline arithmetic is evaluated against.
    pub now: DateTime<Utc>,
    /// Cosine similarity between the profile and tender vectors. `None` when
    /// semantic scoring is unavailable for the whole request (degraded mode);
    /// `Some(0.0)` when only this tender lacks a vector.
    pub semantic_similarity: Option<f32>,
    /// Tender popularity normalized to [0, 1] by the rolling P95. `None`
    /// when the popularity stage was skipped under time pressure.
    pub popularity_norm: Option<f32>,
}

/// One dimension's resolved contribution.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DimensionScore {
    pub dimension: ScoreDimension,
    /// Effective share of the 100-point scale after renormalization.
    pub share: f32,
    /// Sub-score in [0, 1].
    pub subscore: f32,
    /// Points contributed: `share * subscore`.
    pub points: f32,
}

/// Full scoring result for one (profile, tender) pair.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoreBreakdown {
    /// Final match score in [0, 100].
    pub total: u8,
    /// Per-dimension contributions over the applicable dimensions.
    pub contributions: Vec<DimensionScore>,
    /// Reasons sorted by contribution descending. Their weights sum to
    /// `total`.
    pub reasons: Vec<MatchReason>,
}

/// Stateless scoring engine. Construction exists so callers can share one
/// value and future tuning knobs have a home.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleScorer;

impl RuleScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, ctx: &ScoringContext<'_>) -> ScoreBreakdown {
        let applicable = applicable_dimensions(
            ctx.profile,
            ctx.semantic_similarity.is_some(),
            ctx.popularity_norm.is_some(),
        );
        let shares = effective_shares(ctx.profile, &applicable);

        let mut contributions = Vec::with_capacity(shares.len());
        let mut atoms: Vec<(ReasonAtom, f32)> = Vec::new();
        let mut total_raw = 0.0f32;

        for (dimension, share) in shares {
            let outcome = match dimension {
                ScoreDimension::Sector => rules::sector(ctx.profile, ctx.tender),
                ScoreDimension::SubSector => rules::sub_sector(ctx.profile, ctx.tender),
                ScoreDimension::Keyword => rules::keyword(ctx.profile, ctx.tender),
                ScoreDimension::Region => rules::region(ctx.profile, ctx.tender),
                ScoreDimension::Budget => rules::budget(ctx.profile, ctx.tender),
                ScoreDimension::Certification => rules::certification(ctx.profile, ctx.tender),
                ScoreDimension::Language => rules::language(ctx.profile, ctx.tender),
                ScoreDimension::Deadline => rules::deadline(ctx.profile, ctx.tender, ctx.now),
                ScoreDimension::Urgency => rules::urgency(ctx.tender, ctx.now),
                ScoreDimension::Popularity => {
                    rules::popularity(ctx.popularity_norm.unwrap_or(0.0))
                }
                ScoreDimension::Semantic => {
                    rules::semantic(ctx.semantic_similarity.unwrap_or(0.0))
                }
            };

            let points = share * outcome.subscore;
            total_raw += points;
            contributions.push(DimensionScore {
                dimension,
                share,
                subscore: outcome.subscore,
                points,
            });

            if points > 0.0 {
                for atom in outcome.atoms {
                    let atom_points = points * atom.fraction;
                    atoms.push((atom, atom_points));
                }
            }
        }

        let total = total_raw.round().clamp(0.0, 100.0) as u8;
        let reasons = apportion_reasons(atoms, total);

        ScoreBreakdown {
            total,
            contributions,
            reasons,
        }
    }
}

/// Convert fractional reason points into integers that sum to `total`
/// exactly, using largest-remainder apportionment. Ties break on atom order,
/// which is the canonical dimension order, keeping output deterministic.
fn apportion_reasons(atoms: Vec<(ReasonAtom, f32)>, total: u8) -> Vec<MatchReason> {
    if atoms.is_empty() {
        return Vec::new();
    }

    let mut floors: Vec<u32> = atoms.iter().map(|(_, pts)| pts.floor() as u32).collect();
    let floor_sum: u32 = floors.iter().sum();
    let mut remainder = (total as u32).saturating_sub(floor_sum);

    let mut order: Vec<usize> = (0..atoms.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = atoms[a].1 - atoms[a].1.floor();
        let fb = atoms[b].1 - atoms[b].1.floor();
        fb.partial_cmp(&fa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });

    // Hand out the remainder one point at a time by descending fractional
    // part, cycling if rounding pushed the total past one pass.
    let mut cursor = 0;
    while remainder > 0 {
        let idx = order[cursor % order.len()];
        floors[idx] += 1;
        remainder -= 1;
        cursor += 1;
    }

    let mut reasons: Vec<MatchReason> = atoms
        .into_iter()
        .zip(floors)
        .map(|((atom, _), weight)| MatchReason::new(atom.tag, atom.category, atom.reason, weight))
        .collect();
    reasons.sort_by(|a, b| b.weight.cmp(&a.weight));
    reasons
}
