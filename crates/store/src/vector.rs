//! Fixed-dimension vector index over tender and profile embeddings with
//! metadata-filtered similarity queries.

use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::RwLock;

use domain::TenderStatus;

use crate::ann::{AnnConfig, AnnIndex};
use crate::backend::{BackendConfig, StoreBackend};
use crate::{decode_record, encode_record, StoreError, STORE_SCHEMA_VERSION};

const TENDER_VECTOR_PREFIX: &str = "tvec/";
const PROFILE_VECTOR_PREFIX: &str = "pvec/";

/// Filterable metadata stored next to every tender vector, mirroring the
/// hard-filter predicates of the recommendation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenderVectorMeta {
    pub category: String,
    pub region: String,
    pub deadline: Option<DateTime<Utc>>,
    pub status: TenderStatus,
    pub budget_amount: Option<f64>,
    pub language: String,
}

/// Conjunction of hard predicates applied before similarity ranking.
#[derive(Debug, Clone)]
pub struct VectorFilter {
    /// Query timestamp all deadline predicates are evaluated against.
    pub now: DateTime<Utc>,
    /// Only `Published` tenders whose deadline has not passed.
    pub published_only: bool,
    /// Upper bound on days-until-deadline; open-ended deadlines pass.
    pub max_days_ahead: Option<i64>,
    /// Restrict to these categories when present.
    pub sectors: Option<HashSet<String>>,
    /// Restrict to these regions when present.
    pub regions: Option<HashSet<String>>,
    /// Tender ids excluded outright (dismissals, the reference tender).
    pub exclude_ids: HashSet<String>,
}

impl VectorFilter {
    /// The baseline filter: published, deadline in the future or absent.
    pub fn published(now: DateTime<Utc>) -> Self {
        Self {
            now,
            published_only: true,
            max_days_ahead: None,
            sectors: None,
            regions: None,
            exclude_ids: HashSet::new(),
        }
    }

    pub fn with_days_ahead(mut self, days: i64) -> Self {
        self.max_days_ahead = Some(days);
        self
    }

    pub fn with_sectors(mut self, sectors: HashSet<String>) -> Self {
        self.sectors = Some(sectors);
        self
    }

    pub fn with_regions(mut self, regions: HashSet<String>) -> Self {
        self.regions = Some(regions);
        self
    }

    pub fn with_excluded(mut self, ids: HashSet<String>) -> Self {
        self.exclude_ids = ids;
        self
    }

    pub fn accepts(&self, tender_id: &str, meta: &TenderVectorMeta) -> bool {
        if self.exclude_ids.contains(tender_id) {
            return false;
        }
        if self.published_only {
            if meta.status != TenderStatus::Published {
                return false;
            }
            if let Some(deadline) = meta.deadline {
                if deadline <= self.now {
                    return false;
                }
            }
        }
        if let Some(max_days) = self.max_days_ahead {
            if let Some(deadline) = meta.deadline {
                if (deadline - self.now).num_days() > max_days {
                    return false;
                }
            }
        }
        if let Some(sectors) = &self.sectors {
            if !sectors.contains(&meta.category) {
                return false;
            }
        }
        if let Some(regions) = &self.regions {
            if !regions.contains(&meta.region) {
                return false;
            }
        }
        true
    }
}

/// One similarity hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredId {
    pub tender_id: String,
    pub similarity: f32,
}

#[derive(Serialize, Deserialize)]
struct TenderVectorRecord {
    schema_version: u16,
    tender_id: String,
    vector: Vec<f32>,
    meta: TenderVectorMeta,
}

#[derive(Serialize, Deserialize)]
struct ProfileVectorRecord {
    schema_version: u16,
    profile_id: String,
    vector: Vec<f32>,
}

struct TenderEntry {
    vector: Vec<f32>,
    meta: TenderVectorMeta,
}

struct Inner {
    tenders: HashMap<String, TenderEntry>,
    profiles: HashMap<String, Vec<f32>>,
    ann: AnnIndex,
}

/// Vector store over tender and profile embeddings.
///
/// Writes go through the backend first, then update the in-memory maps and
/// the ANN registration under one write lock, which makes per-id upserts
/// linearizable.
pub struct VectorIndex {
    dimension: usize,
    backend: Box<dyn StoreBackend>,
    inner: RwLock<Inner>,
}

impl VectorIndex {
    pub fn new(
        dimension: usize,
        backend_cfg: BackendConfig,
        ann_cfg: AnnConfig,
    ) -> Result<Self, StoreError> {
        let backend = backend_cfg.build()?;

        // Rehydrate the query-side maps from whatever the backend already
        // holds; a fresh backend is simply an empty scan.
        let mut tenders = HashMap::new();
        let mut ann = AnnIndex::new(dimension, ann_cfg);
        backend.scan_prefix(TENDER_VECTOR_PREFIX, &mut |_key, data| {
            let record: TenderVectorRecord = decode_record(data)?;
            ann.insert(record.tender_id.clone(), record.vector.clone())?;
            tenders.insert(
                record.tender_id,
                TenderEntry {
                    vector: record.vector,
                    meta: record.meta,
                },
            );
            Ok(())
        })?;

        let mut profiles = HashMap::new();
        backend.scan_prefix(PROFILE_VECTOR_PREFIX, &mut |_key, data| {
            let record: ProfileVectorRecord = decode_record(data)?;
            profiles.insert(record.profile_id, record.vector);
            Ok(())
        })?;

        Ok(Self {
            dimension,
            backend,
            inner: RwLock::new(Inner {
                tenders,
                profiles,
                ann,
            }),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn tender_count(&self) -> usize {
        self.read().tenders.len()
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), StoreError> {
        if vector.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("vector index lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("vector index lock poisoned")
    }

    pub fn upsert_tender_vector(
        &self,
        tender_id: &str,
        vector: Vec<f32>,
        meta: TenderVectorMeta,
    ) -> Result<(), StoreError> {
        self.check_dimension(&vector)?;

        let record = TenderVectorRecord {
            schema_version: STORE_SCHEMA_VERSION,
            tender_id: tender_id.to_string(),
            vector: vector.clone(),
            meta: meta.clone(),
        };
        self.backend
            .put(&format!("{TENDER_VECTOR_PREFIX}{tender_id}"), &encode_record(&record)?)?;

        let mut inner = self.write();
        inner.ann.insert(tender_id.to_string(), vector.clone())?;
        inner
            .tenders
            .insert(tender_id.to_string(), TenderEntry { vector, meta });
        Ok(())
    }

    pub fn remove_tender_vector(&self, tender_id: &str) -> Result<(), StoreError> {
        self.backend.delete(&format!("{TENDER_VECTOR_PREFIX}{tender_id}"))?;
        self.write().tenders.remove(tender_id);
        Ok(())
    }

    pub fn upsert_profile_vector(
        &self,
        profile_id: &str,
        vector: Vec<f32>,
    ) -> Result<(), StoreError> {
        self.check_dimension(&vector)?;

        let record = ProfileVectorRecord {
            schema_version: STORE_SCHEMA_VERSION,
            profile_id: profile_id.to_string(),
            vector: vector.clone(),
        };
        self.backend
            .put(&format!("{PROFILE_VECTOR_PREFIX}{profile_id}"), &encode_record(&record)?)?;

        self.write().profiles.insert(profile_id.to_string(), vector);
        Ok(())
    }

    pub fn profile_vector(&self, profile_id: &str) -> Option<Vec<f32>> {
        self.read().profiles.get(profile_id).cloned()
    }

    pub fn tender_vector(&self, tender_id: &str) -> Option<Vec<f32>> {
        self.read().tenders.get(tender_id).map(|e| e.vector.clone())
    }

    /// Top-k most similar tenders under the filter, ordered by descending
    /// cosine similarity with ties broken by ascending tender id.
    pub fn knn(
        &self,
        query: &[f32],
        k: usize,
        filter: &VectorFilter,
    ) -> Result<Vec<ScoredId>, StoreError> {
        self.check_dimension(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        self.rebuild_ann_if_needed();

        let inner = self.read();
        if inner.ann.usable() {
            // Oversample so post-filter survivors still fill k; fall back to
            // the exact scan when filtering starved the candidate set.
            let oversampled = k.saturating_mul(4).saturating_add(16);
            let candidates = inner.ann.search(query, oversampled)?;
            let mut hits = Vec::with_capacity(candidates.len());
            for candidate in candidates {
                let Some(id) = inner.ann.id_for(candidate.index) else {
                    continue;
                };
                let Some(entry) = inner.tenders.get(id) else {
                    continue;
                };
                if !filter.accepts(id, &entry.meta) {
                    continue;
                }
                hits.push(ScoredId {
                    tender_id: id.clone(),
                    similarity: cosine_similarity(query, &entry.vector),
                });
            }
            if hits.len() >= k {
                sort_hits(&mut hits);
                hits.truncate(k);
                return Ok(hits);
            }
        }

        let mut hits: Vec<ScoredId> = inner
            .tenders
            .iter()
            .filter(|(id, entry)| filter.accepts(id, &entry.meta))
            .map(|(id, entry)| ScoredId {
                tender_id: id.clone(),
                similarity: cosine_similarity(query, &entry.vector),
            })
            .collect();
        sort_hits(&mut hits);
        hits.truncate(k);
        Ok(hits)
    }

    /// All tenders with similarity >= `min_sim` under the filter, up to
    /// `limit`, same ordering as [`knn`](Self::knn).
    pub fn range_by_score(
        &self,
        query: &[f32],
        min_sim: f32,
        filter: &VectorFilter,
        limit: usize,
    ) -> Result<Vec<ScoredId>, StoreError> {
        self.check_dimension(query)?;

        let inner = self.read();
        let mut hits: Vec<ScoredId> = inner
            .tenders
            .iter()
            .filter(|(id, entry)| filter.accepts(id, &entry.meta))
            .map(|(id, entry)| ScoredId {
                tender_id: id.clone(),
                similarity: cosine_similarity(query, &entry.vector),
            })
            .filter(|hit| hit.similarity >= min_sim)
            .collect();
        sort_hits(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    fn rebuild_ann_if_needed(&self) {
        let stale = self.read().ann.needs_build();
        if stale {
            let mut inner = self.write();
            if inner.ann.needs_build() {
                inner.ann.build();
            }
        }
    }
}

fn sort_hits(hits: &mut [ScoredId]) {
    hits.sort_unstable_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.tender_id.cmp(&b.tender_id))
    });
}

/// Cosine similarity over f32 slices. Inputs are expected to be
/// L2-normalized but the denominator is computed anyway so un-normalized
/// vectors degrade gracefully instead of silently skewing scores.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
