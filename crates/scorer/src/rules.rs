//! Per-dimension sub-score rules.
//!
//! Every rule returns a sub-score in [0, 1] plus the reason atoms that carry
//! it. An atom's `fraction` is its slice of the dimension's points; fractions
//! of a dimension's atoms always sum to 1 when the sub-score is non-zero.

use chrono::{DateTime, Utc};

use domain::text::contains_word;
use domain::{CompanyProfile, ReasonTag, Tender};

use crate::certifications::detect_required_certs;

/// Longest deadline considered comfortable; beyond it the deadline score
/// falls off linearly over the next 30 days.
pub const DEADLINE_WINDOW_DAYS: i64 = 60;
const DEADLINE_FALLOFF_DAYS: f32 = 30.0;

pub(crate) struct ReasonAtom {
    pub tag: ReasonTag,
    pub category: String,
    pub reason: String,
    /// Share of the dimension's points carried by this atom.
    pub fraction: f32,
}

pub(crate) struct RuleOutcome {
    pub subscore: f32,
    pub atoms: Vec<ReasonAtom>,
}

impl RuleOutcome {
    fn zero() -> Self {
        Self {
            subscore: 0.0,
            atoms: Vec::new(),
        }
    }

    fn single(subscore: f32, tag: ReasonTag, category: String, reason: String) -> Self {
        Self {
            subscore,
            atoms: vec![ReasonAtom {
                tag,
                category,
                reason,
                fraction: 1.0,
            }],
        }
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

pub(crate) fn sector(profile: &CompanyProfile, tender: &Tender) -> RuleOutcome {
    if profile
        .active_sectors
        .iter()
        .any(|s| eq_ignore_case(s, &tender.category))
    {
        return RuleOutcome::single(
            1.0,
            ReasonTag::SectorMatch,
            tender.category.clone(),
            format!("Matches your active sector {}", tender.category),
        );
    }
    if eq_ignore_case(&profile.primary_sector, &tender.category) {
        return RuleOutcome::single(
            0.5,
            ReasonTag::SectorMatch,
            tender.category.clone(),
            format!("Related to your primary sector {}", tender.category),
        );
    }
    RuleOutcome::zero()
}

pub(crate) fn sub_sector(profile: &CompanyProfile, tender: &Tender) -> RuleOutcome {
    let title = tender.title.to_lowercase();
    let body = tender.match_text().to_lowercase();

    let matched: Vec<&String> = profile
        .sub_sectors
        .iter()
        .filter(|token| {
            let needle = token.to_lowercase();
            contains_word(&title, &needle) || contains_word(&body, &needle)
        })
        .collect();

    if matched.is_empty() {
        return RuleOutcome::zero();
    }

    // Each matched token is worth half the dimension, capped at full credit.
    let subscore = (matched.len() as f32 * 0.5).min(1.0);
    let labels: Vec<&str> = matched.iter().map(|s| s.as_str()).collect();
    RuleOutcome::single(
        subscore,
        ReasonTag::SubsectorMatch,
        labels.join(", "),
        format!("Mentions your sub-sector focus ({})", labels.join(", ")),
    )
}

pub(crate) fn keyword(profile: &CompanyProfile, tender: &Tender) -> RuleOutcome {
    let title = tender.title.to_lowercase();
    let highlights = tender.highlights.join(" ").to_lowercase();
    let body = tender.match_text().to_lowercase();

    struct Hit<'a> {
        keyword: &'a str,
        multiplier: f32,
        placement: &'static str,
    }

    let mut hits: Vec<Hit> = Vec::new();
    for keyword in &profile.keywords {
        let needle = keyword.to_lowercase();
        if needle.is_empty() {
            continue;
        }
        // Substring placement with graded credit: title beats highlights
        // beats body.
        let (multiplier, placement) = if title.contains(&needle) {
            (2.0, "title")
        } else if highlights.contains(&needle) {
            (1.5, "highlights")
        } else if body.contains(&needle) {
            (1.0, "description")
        } else {
            continue;
        };
        hits.push(Hit {
            keyword,
            multiplier,
            placement,
        });
    }

    if hits.is_empty() {
        return RuleOutcome::zero();
    }

    let raw: f32 = hits.iter().map(|h| h.multiplier).sum();
    // A single title hit is already full credit.
    let subscore = (raw / 2.0).min(1.0);

    let atoms = hits
        .iter()
        .map(|hit| ReasonAtom {
            tag: ReasonTag::KeywordMatch,
            category: hit.keyword.to_string(),
            reason: format!("Keyword '{}' found in the {}", hit.keyword, hit.placement),
            fraction: hit.multiplier / raw,
        })
        .collect();

    RuleOutcome { subscore, atoms }
}

pub(crate) fn region(profile: &CompanyProfile, tender: &Tender) -> RuleOutcome {
    if profile
        .preferred_regions
        .iter()
        .any(|r| eq_ignore_case(r, &tender.region))
    {
        return RuleOutcome::single(
            1.0,
            ReasonTag::RegionMatch,
            tender.region.clone(),
            format!("Located in your preferred region {}", tender.region),
        );
    }
    if eq_ignore_case(&tender.region, "national") {
        return RuleOutcome::single(
            0.5,
            ReasonTag::RegionMatch,
            tender.region.clone(),
            "Open to bidders nationwide".to_string(),
        );
    }
    RuleOutcome::zero()
}

pub(crate) fn budget(profile: &CompanyProfile, tender: &Tender) -> RuleOutcome {
    let Some(budget) = &tender.budget else {
        return RuleOutcome::zero();
    };
    let amount = budget.amount;
    let min = profile.budget_min.unwrap_or(0.0);
    let max = profile.budget_max.unwrap_or(f64::INFINITY);

    if amount >= min && amount <= max {
        return RuleOutcome::single(
            1.0,
            ReasonTag::BudgetMatch,
            format!("{amount} {}", budget.currency),
            format!("Budget of {amount} {} fits your range", budget.currency),
        );
    }
    // Within a 20% band around the stated range still earns half credit.
    if amount >= min * 0.8 && amount <= max * 1.2 {
        return RuleOutcome::single(
            0.5,
            ReasonTag::BudgetMatch,
            format!("{amount} {}", budget.currency),
            format!("Budget of {amount} {} is close to your range", budget.currency),
        );
    }
    RuleOutcome::zero()
}

pub(crate) fn certification(profile: &CompanyProfile, tender: &Tender) -> RuleOutcome {
    let body = tender.match_text().to_lowercase();
    let required = detect_required_certs(&body);
    if required.is_empty() {
        return RuleOutcome::zero();
    }

    let held: Vec<&str> = required
        .iter()
        .copied()
        .filter(|req| {
            profile
                .certifications
                .iter()
                .any(|held| eq_ignore_case(held, req))
        })
        .collect();

    if held.is_empty() {
        return RuleOutcome::zero();
    }

    let subscore = held.len() as f32 / required.len() as f32;
    RuleOutcome::single(
        subscore,
        ReasonTag::CertificationMatch,
        held.join(", "),
        format!("You hold the required certification ({})", held.join(", ")),
    )
}

pub(crate) fn language(profile: &CompanyProfile, tender: &Tender) -> RuleOutcome {
    if profile
        .preferred_languages
        .iter()
        .any(|l| eq_ignore_case(l, &tender.language))
    {
        return RuleOutcome::single(
            1.0,
            ReasonTag::LanguageMatch,
            tender.language.clone(),
            format!("Published in {}", tender.language),
        );
    }
    RuleOutcome::zero()
}

pub(crate) fn deadline(
    profile: &CompanyProfile,
    tender: &Tender,
    now: DateTime<Utc>,
) -> RuleOutcome {
    let Some(days) = tender.days_until_deadline(now) else {
        // Open-ended tenders carry no deadline pressure at all.
        return RuleOutcome::single(
            1.0,
            ReasonTag::DeadlineMatch,
            "open-ended".to_string(),
            "No submission deadline pressure".to_string(),
        );
    };

    let min_days = profile.min_deadline_days.max(0);
    let subscore = if days >= min_days && days <= DEADLINE_WINDOW_DAYS {
        1.0
    } else if days > DEADLINE_WINDOW_DAYS {
        (1.0 - (days - DEADLINE_WINDOW_DAYS) as f32 / DEADLINE_FALLOFF_DAYS).max(0.0)
    } else if min_days > 0 {
        (days.max(0) as f32 / min_days as f32).clamp(0.0, 1.0)
    } else {
        0.0
    };

    if subscore <= 0.0 {
        return RuleOutcome::zero();
    }
    RuleOutcome::single(
        subscore,
        ReasonTag::DeadlineMatch,
        format!("{days} days"),
        format!("Deadline in {days} days fits your planning window"),
    )
}

pub(crate) fn urgency(tender: &Tender, now: DateTime<Utc>) -> RuleOutcome {
    match tender.days_until_deadline(now) {
        Some(days) if (1..=7).contains(&days) => RuleOutcome::single(
            1.0,
            ReasonTag::Urgency,
            format!("{days} days"),
            format!("Closing soon: {days} days left to apply"),
        ),
        _ => RuleOutcome::zero(),
    }
}

pub(crate) fn popularity(popularity_norm: f32) -> RuleOutcome {
    let subscore = popularity_norm.clamp(0.0, 1.0);
    if subscore <= 0.0 {
        return RuleOutcome::zero();
    }
    RuleOutcome::single(
        subscore,
        ReasonTag::PopularityBoost,
        "popularity".to_string(),
        "Drawing attention from similar companies".to_string(),
    )
}

pub(crate) fn semantic(similarity: f32) -> RuleOutcome {
    let subscore = similarity.clamp(0.0, 1.0);
    if subscore <= 0.0 {
        return RuleOutcome::zero();
    }
    RuleOutcome::single(
        subscore,
        ReasonTag::SemanticMatch,
        "content similarity".to_string(),
        "Strong content similarity with your company profile".to_string(),
    )
}
