//! Deterministic composition of entity text for embedding.
//!
//! The exact byte sequence fed to the model matters: the vector cache is
//! content-addressed, and profile/tender vectors must be reproducible from
//! their snapshots. Field order and joins are therefore fixed here and
//! nowhere else.

use domain::text::normalize;
use domain::{CompanyProfile, Tender};

/// Compose the embedding text for a tender: title, the cleaned description
/// (or the raw one truncated to `max_description_chars`), highlights,
/// organization, category, and region, newline-joined, then lowercased with
/// whitespace collapsed.
pub fn compose_tender_text(tender: &Tender, max_description_chars: usize) -> String {
    let description = match &tender.clean_description {
        Some(clean) => clean.as_str(),
        None => truncate_chars(&tender.description, max_description_chars),
    };

    let mut parts: Vec<&str> = vec![&tender.title, description];
    let highlights = tender.highlights.join(" ");
    if !highlights.is_empty() {
        parts.push(&highlights);
    }
    if let Some(org) = &tender.organization {
        parts.push(org);
    }
    parts.push(&tender.category);
    parts.push(&tender.region);

    normalize(&parts.join("\n"))
}

/// Compose the embedding text for a company profile: primary sector, active
/// sectors, sub-sectors, keywords, preferred regions, certifications, and
/// discovered interests, in that order, each list rendered as given.
pub fn compose_profile_text(profile: &CompanyProfile) -> String {
    let parts = [
        profile.primary_sector.clone(),
        profile.active_sectors.join(" "),
        profile.sub_sectors.join(" "),
        profile.keywords.join(" "),
        profile.preferred_regions.join(" "),
        profile.certifications.join(" "),
        profile.discovered_interests.join(" "),
    ];

    normalize(
        &parts
            .iter()
            .filter(|part| !part.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

/// Truncate at a char boundary without splitting a code point.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::{Budget, ExtractedData, PopularityCounters, TenderStatus};

    fn sample_tender() -> Tender {
        Tender {
            id: "t-1".into(),
            source_url: "https://tenders.example/t-1".into(),
            external_id: None,
            title: "Cloud ERP Rollout".into(),
            description: "Deploy a   cloud based ERP".into(),
            clean_description: None,
            summary: None,
            highlights: vec!["multi-year support".into(), "data migration".into()],
            category: "IT".into(),
            region: "Addis Ababa".into(),
            budget: Some(Budget {
                amount: 120_000.0,
                currency: "ETB".into(),
            }),
            language: "english".into(),
            deadline: None,
            status: TenderStatus::Published,
            published_at: Utc::now(),
            organization: Some("Ministry of Finance".into()),
            extracted: ExtractedData::default(),
            popularity: PopularityCounters::default(),
            popularity_score: 0.0,
        }
    }

    #[test]
    fn tender_text_is_lowercased_and_collapsed() {
        let text = compose_tender_text(&sample_tender(), 2000);
        assert_eq!(
            text,
            "cloud erp rollout deploy a cloud based erp multi-year support data migration \
             ministry of finance it addis ababa"
        );
    }

    #[test]
    fn tender_text_prefers_clean_description_without_truncation() {
        let mut tender = sample_tender();
        tender.clean_description = Some("Cleaned ERP deployment description".into());
        let text = compose_tender_text(&tender, 5);
        assert!(text.contains("cleaned erp deployment description"));
    }

    #[test]
    fn raw_description_is_truncated() {
        let mut tender = sample_tender();
        tender.description = "x".repeat(100);
        let text = compose_tender_text(&tender, 10);
        assert!(text.contains(&"x".repeat(10)));
        assert!(!text.contains(&"x".repeat(11)));
    }

    #[test]
    fn tender_text_is_deterministic() {
        let tender = sample_tender();
        assert_eq!(
            compose_tender_text(&tender, 2000),
            compose_tender_text(&tender, 2000)
        );
    }

    #[test]
    fn profile_text_preserves_list_order() {
        let mut profile = CompanyProfile::new("p-1", "c-1");
        profile.primary_sector = "IT".into();
        profile.active_sectors = vec!["IT".into(), "Consulting".into()];
        profile.keywords = vec!["cloud".into(), "erp".into(), "fiber".into()];
        profile.preferred_regions = vec!["Addis Ababa".into()];
        profile.discovered_interests = vec!["Logistics".into()];

        let text = compose_profile_text(&profile);
        assert_eq!(
            text,
            "it it consulting cloud erp fiber addis ababa logistics"
        );
    }

    #[test]
    fn empty_profile_sections_are_skipped() {
        let mut profile = CompanyProfile::new("p-1", "c-1");
        profile.primary_sector = "Construction".into();
        let text = compose_profile_text(&profile);
        assert_eq!(text, "construction");
    }
}
