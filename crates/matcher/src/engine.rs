use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;

use domain::text::keyword_tokens;
use domain::{CompanyProfile, Tender, TenderStatus};
use embedding::EmbeddingClient;
use feedback::FeedbackProcessor;
use scorer::{RuleScorer, ScoreBreakdown, ScoringContext};
use store::{ProfileStore, TenderStore, TenderVectorMeta, VectorFilter, VectorIndex};

use crate::types::{
    MatchError, RecommendFilters, RecommendationItem, RecommendationResponse, SimilarItem,
    SimilarTendersResponse,
};

#[cfg(test)]
mod tests;

/// Engine-level tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Reasons attached per item in the response.
    pub max_reasons: usize,
    /// Candidate breadth floor for the vector path.
    pub candidate_floor: usize,
    /// Candidate breadth as a multiple of the requested limit.
    pub candidate_multiplier: usize,
    /// Candidate cap once the request is over its time budget.
    pub degraded_candidate_cap: usize,
    pub degraded_candidate_multiplier: usize,
    /// Soft time budget for one recommendation request.
    pub recommend_budget: Duration,
    /// Default result count for similar-tender lookups.
    pub similar_default_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_reasons: 6,
            candidate_floor: 200,
            candidate_multiplier: 10,
            degraded_candidate_cap: 100,
            degraded_candidate_multiplier: 5,
            recommend_budget: Duration::from_secs(2),
            similar_default_limit: 10,
        }
    }
}

/// The recommendation engine: orchestrates candidate generation, score
/// fusion, thresholding, ranking, and explanation over the shared stores.
pub struct RecommendationEngine {
    tenders: Arc<TenderStore>,
    profiles: Arc<ProfileStore>,
    vectors: Arc<VectorIndex>,
    embedder: Arc<EmbeddingClient>,
    feedback: Arc<FeedbackProcessor>,
    scorer: RuleScorer,
    cfg: EngineConfig,
    /// Per-profile re-embed leases (single-flight).
    reembed_leases: DashMap<String, Instant>,
}

impl RecommendationEngine {
    pub fn new(
        tenders: Arc<TenderStore>,
        profiles: Arc<ProfileStore>,
        vectors: Arc<VectorIndex>,
        embedder: Arc<EmbeddingClient>,
        feedback: Arc<FeedbackProcessor>,
        cfg: EngineConfig,
    ) -> Self {
        Self {
            tenders,
            profiles,
            vectors,
            embedder,
            feedback,
            scorer: RuleScorer::new(),
            cfg,
            reembed_leases: DashMap::new(),
        }
    }

    pub fn tenders(&self) -> &Arc<TenderStore> {
        &self.tenders
    }

    pub fn profiles(&self) -> &Arc<ProfileStore> {
        &self.profiles
    }

    pub fn feedback(&self) -> &Arc<FeedbackProcessor> {
        &self.feedback
    }

    /// Store a tender and its embedding in one step. This is the ingestion
    /// seam: the import pipeline hands finished tenders to this method.
    pub async fn index_tender(&self, tender: &Tender) -> Result<(), MatchError> {
        self.tenders.upsert(tender)?;
        let vector = self.embedder.embed_tender(tender).await?;
        self.vectors.upsert_tender_vector(
            &tender.id,
            vector,
            TenderVectorMeta {
                category: tender.category.clone(),
                region: tender.region.clone(),
                deadline: tender.deadline,
                status: tender.status,
                budget_amount: tender.budget.as_ref().map(|b| b.amount),
                language: tender.language.clone(),
            },
        )?;
        Ok(())
    }

    /// Produce ranked, explained recommendations for a profile.
    pub fn recommend(
        &self,
        profile_id: &str,
        filters: &RecommendFilters,
    ) -> Result<RecommendationResponse, MatchError> {
        filters.validate()?;
        let started = Instant::now();
        let now = Utc::now();

        let profile = self
            .profiles
            .get(profile_id)?
            .ok_or(MatchError::ProfileNotFound)?;
        if !profile.tier1_complete() {
            return Err(MatchError::ProfileIncomplete);
        }

        let dismissed = self.feedback.dismissed_tenders(&profile.company_id);

        // Candidate generation: vector KNN when the profile has an embedding,
        // otherwise a cheap rule pre-filter over recent tenders.
        let profile_vector = self.vectors.profile_vector(&profile.id);
        let mut semantic_available = profile_vector.is_some();
        let budget_exceeded = started.elapsed() >= self.cfg.recommend_budget;
        let k = if budget_exceeded {
            (filters.limit * self.cfg.degraded_candidate_multiplier)
                .min(self.cfg.degraded_candidate_cap)
        } else {
            (filters.limit * self.cfg.candidate_multiplier).max(self.cfg.candidate_floor)
        };

        let mut candidates: Vec<(String, f32)> = Vec::new();
        if let Some(vector) = &profile_vector {
            let filter = self.build_vector_filter(now, filters, &dismissed);
            match self.vectors.knn(vector, k, &filter) {
                Ok(hits) if !hits.is_empty() => {
                    candidates = hits
                        .into_iter()
                        .map(|hit| (hit.tender_id, hit.similarity))
                        .collect();
                }
                Ok(_) => {
                    // Nothing embedded yet; score what the rule path finds.
                    semantic_available = false;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "vector store unavailable, degrading to rule-only scoring");
                    semantic_available = false;
                }
            }
        }
        if candidates.is_empty() {
            candidates = self.rule_candidates(&profile, now, filters, &dismissed, k)?;
        }

        // Scoring. Per-item failures drop the item, never the request.
        let skip_popularity = started.elapsed() >= self.cfg.recommend_budget;
        let mut scored: Vec<(ScoreBreakdown, Tender, f32)> = Vec::new();
        for (tender_id, similarity) in candidates {
            let tender = match self.tenders.get(&tender_id) {
                Ok(Some(tender)) => tender,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(tender = %tender_id, error = %err, "skipping unreadable candidate");
                    continue;
                }
            };
            if !accepts_hard_filters(&tender, now, filters, &dismissed) {
                continue;
            }

            let semantic = if semantic_available {
                Some(similarity.clamp(0.0, 1.0))
            } else {
                None
            };
            let popularity = if skip_popularity {
                None
            } else {
                Some(self.feedback.popularity_norm(&tender.id))
            };
            let breakdown = self.scorer.score(&ScoringContext {
                profile: &profile,
                tender: &tender,
                now,
                semantic_similarity: semantic,
                popularity_norm: popularity,
            });
            scored.push((breakdown, tender, semantic.unwrap_or(0.0)));
        }

        // Threshold cut: the profile's own floor applies on top of the
        // client's.
        let threshold = filters.min_score.max(profile.min_match_threshold);
        scored.retain(|(breakdown, _, _)| breakdown.total >= threshold);

        // Rank: score desc, semantic similarity desc, tender id asc.
        scored.sort_by(|(a, at, asim), (b, bt, bsim)| {
            b.total
                .cmp(&a.total)
                .then_with(|| {
                    bsim.partial_cmp(asim)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| at.id.cmp(&bt.id))
        });

        let total = scored.len();
        let items: Vec<RecommendationItem> = scored
            .into_iter()
            .take(filters.limit)
            .map(|(breakdown, tender, similarity)| {
                let mut reasons = breakdown.reasons;
                reasons.truncate(self.cfg.max_reasons);
                RecommendationItem {
                    days_until_deadline: tender.days_until_deadline(now),
                    match_score: breakdown.total,
                    match_reasons: reasons,
                    semantic_similarity: similarity,
                    tender,
                }
            })
            .collect();

        metrics::histogram!("recommend_duration_seconds").record(started.elapsed().as_secs_f64());
        metrics::counter!("recommendations_served_total").increment(1);

        Ok(RecommendationResponse {
            items,
            total,
            profile_completion: profile.completion_percentage(),
            filters_applied: filters.clone(),
            generated_at: now,
            semantic_unavailable: !semantic_available,
        })
    }

    /// Nearest published tenders to a reference tender, with keyword-overlap
    /// annotation.
    pub fn similar(
        &self,
        tender_id: &str,
        limit: Option<usize>,
    ) -> Result<SimilarTendersResponse, MatchError> {
        let limit = limit
            .unwrap_or(self.cfg.similar_default_limit)
            .clamp(1, crate::types::MAX_LIMIT);
        let now = Utc::now();

        let reference = self
            .tenders
            .get(tender_id)?
            .ok_or_else(|| MatchError::ReferenceNotFound(tender_id.to_string()))?;
        let reference_vector = self
            .vectors
            .tender_vector(tender_id)
            .ok_or_else(|| MatchError::ReferenceNotEmbedded(tender_id.to_string()))?;

        let filter = VectorFilter::published(now)
            .with_excluded([tender_id.to_string()].into_iter().collect());
        let hits = self.vectors.knn(&reference_vector, limit, &filter)?;

        let reference_tokens = title_tokens(&reference);
        let mut items = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(tender) = self.tenders.get(&hit.tender_id)? else {
                continue;
            };
            let similarity_score =
                (hit.similarity.clamp(0.0, 1.0) * 100.0).round() as u8;
            let common_keywords = common_keywords(&reference_tokens, &tender);
            items.push(SimilarItem {
                tender,
                similarity_score,
                common_keywords,
            });
        }

        Ok(SimilarTendersResponse { reference, items })
    }

    /// Explicit profile re-embed. Single-flight per profile: concurrent
    /// callers coalesce onto one upstream embedding call and the losers
    /// return `false`. A failed or cancelled refresh leaves the previous
    /// vector and the dirty flag intact.
    pub async fn refresh_profile_embedding(&self, profile_id: &str) -> Result<bool, MatchError> {
        let profile = self
            .profiles
            .get(profile_id)?
            .ok_or(MatchError::ProfileNotFound)?;

        if !self.acquire_reembed_lease(profile_id) {
            tracing::debug!(profile = %profile_id, "re-embed already in flight, skipping");
            return Ok(false);
        }
        let result = self.do_refresh(&profile).await;
        self.reembed_leases.remove(profile_id);
        result.map(|_| true)
    }

    /// Implicit trigger: re-embed only when the feedback loop says the
    /// profile is due.
    pub async fn reembed_if_dirty(&self, profile_id: &str) -> Result<bool, MatchError> {
        let profile = self
            .profiles
            .get(profile_id)?
            .ok_or(MatchError::ProfileNotFound)?;
        if !self.feedback.should_reembed(&profile, Utc::now()) {
            return Ok(false);
        }
        self.refresh_profile_embedding(profile_id).await
    }

    async fn do_refresh(&self, profile: &CompanyProfile) -> Result<(), MatchError> {
        // Nothing is written until the new vector is fully computed and
        // dimension-checked; abandoning the call midway leaves prior state.
        let vector = self.embedder.embed_profile(profile).await?;
        self.vectors.upsert_profile_vector(&profile.id, vector)?;

        let mut updated = profile.clone();
        updated.embedding_dirty = false;
        updated.embedding_updated_at = Some(Utc::now());
        self.profiles.upsert(&updated)?;
        self.feedback.note_reembedded(&profile.id);
        metrics::counter!("profile_reembeds_total").increment(1);
        Ok(())
    }

    /// Take the per-profile lease, stealing it only when the holder has
    /// outlived the embedding-call timeout.
    fn acquire_reembed_lease(&self, profile_id: &str) -> bool {
        let lease_timeout =
            Duration::from_secs(self.embedder.config().api_timeout_secs) + Duration::from_secs(30);
        let now = Instant::now();
        match self.reembed_leases.entry(profile_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut held) => {
                if now.duration_since(*held.get()) >= lease_timeout {
                    held.insert(now);
                    true
                } else {
                    false
                }
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    fn build_vector_filter(
        &self,
        now: chrono::DateTime<Utc>,
        filters: &RecommendFilters,
        dismissed: &HashSet<String>,
    ) -> VectorFilter {
        let mut filter = VectorFilter::published(now)
            .with_days_ahead(filters.days_ahead)
            .with_excluded(dismissed.clone());
        if let Some(sectors) = &filters.sectors {
            filter = filter.with_sectors(sectors.iter().cloned().collect());
        }
        if let Some(regions) = &filters.regions {
            filter = filter.with_regions(regions.iter().cloned().collect());
        }
        filter
    }

    /// Candidate generation without a profile vector: recent published
    /// tenders overlapping the profile's sectors or regions.
    fn rule_candidates(
        &self,
        profile: &CompanyProfile,
        now: chrono::DateTime<Utc>,
        filters: &RecommendFilters,
        dismissed: &HashSet<String>,
        k: usize,
    ) -> Result<Vec<(String, f32)>, MatchError> {
        let published = self.tenders.list_published(now)?;
        let candidates = published
            .into_iter()
            .filter(|tender| accepts_hard_filters(tender, now, filters, dismissed))
            .filter(|tender| {
                profile
                    .active_sectors
                    .iter()
                    .chain(std::iter::once(&profile.primary_sector))
                    .chain(profile.discovered_interests.iter())
                    .any(|s| s.eq_ignore_ascii_case(&tender.category))
                    || profile
                        .preferred_regions
                        .iter()
                        .any(|r| r.eq_ignore_ascii_case(&tender.region))
            })
            .take(k)
            .map(|tender| (tender.id, 0.0))
            .collect();
        Ok(candidates)
    }
}

/// Hard filters re-verified on the entity itself, so stale vector metadata
/// can never leak an expired or dismissed tender into a response.
fn accepts_hard_filters(
    tender: &Tender,
    now: chrono::DateTime<Utc>,
    filters: &RecommendFilters,
    dismissed: &HashSet<String>,
) -> bool {
    if dismissed.contains(&tender.id) {
        return false;
    }
    if tender.effective_status(now) != TenderStatus::Published {
        return false;
    }
    if let Some(days) = tender.days_until_deadline(now) {
        if days > filters.days_ahead {
            return false;
        }
    }
    if let Some(sectors) = &filters.sectors {
        if !sectors.iter().any(|s| s.eq_ignore_ascii_case(&tender.category)) {
            return false;
        }
    }
    if let Some(regions) = &filters.regions {
        if !regions.iter().any(|r| r.eq_ignore_ascii_case(&tender.region)) {
            return false;
        }
    }
    true
}

fn title_tokens(tender: &Tender) -> Vec<String> {
    let text = format!("{} {}", tender.title, tender.highlights.join(" "));
    keyword_tokens(&text)
}

/// Stop-word-filtered intersection of title+highlight tokens, preserving the
/// reference tender's token order, capped at ten.
fn common_keywords(reference_tokens: &[String], tender: &Tender) -> Vec<String> {
    let candidate: HashSet<String> = title_tokens(tender).into_iter().collect();
    let mut seen = HashSet::new();
    reference_tokens
        .iter()
        .filter(|token| candidate.contains(*token))
        .filter(|token| seen.insert((*token).clone()))
        .take(10)
        .cloned()
        .collect()
}
