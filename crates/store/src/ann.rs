//! Approximate nearest-neighbor acceleration using an HNSW graph.
//!
//! Below `min_vectors_for_ann` the exact linear scan wins on both latency and
//! recall, so the graph is only consulted for large tender sets. Candidates
//! coming out of the graph are always rescored exactly by the caller, which
//! keeps the ordering guarantee deterministic.

use hnsw_rs::prelude::*;
use std::collections::HashMap;

use crate::StoreError;

/// Configuration for ANN graph construction and use.
#[derive(Debug, Clone, Copy)]
pub struct AnnConfig {
    /// Neighbors per node (higher = better recall, slower build).
    pub m: usize,
    /// Candidate list size during construction.
    pub ef_construction: usize,
    /// Candidate list size during search.
    pub ef_search: usize,
    /// Whether the graph may be used at all.
    pub enabled: bool,
    /// Minimum number of vectors before the graph is consulted.
    pub min_vectors_for_ann: usize,
    /// Inserts tolerated since the last build before queries trigger a
    /// rebuild. This bounds how far ANN results may trail upserts.
    pub rebuild_threshold: usize,
}

impl Default for AnnConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 64,
            enabled: true,
            min_vectors_for_ann: 1000,
            rebuild_threshold: 256,
        }
    }
}

impl AnnConfig {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_min_vectors_for_ann(mut self, min: usize) -> Self {
        self.min_vectors_for_ann = min;
        self
    }

    pub fn with_rebuild_threshold(mut self, threshold: usize) -> Self {
        self.rebuild_threshold = threshold;
        self
    }

    pub fn should_use_ann(&self, num_vectors: usize) -> bool {
        self.enabled && num_vectors >= self.min_vectors_for_ann
    }
}

/// A single ANN candidate: position in insertion order plus graph distance.
#[derive(Debug, Clone)]
pub struct AnnCandidate {
    pub index: usize,
    pub distance: f32,
}

/// HNSW wrapper mapping stable string ids onto the graph's dense indices.
pub struct AnnIndex {
    config: AnnConfig,
    dimension: usize,
    hnsw: Option<Hnsw<'static, f32, DistCosine>>,
    id_to_index: HashMap<String, usize>,
    index_to_id: HashMap<usize, String>,
    vectors: Vec<Vec<f32>>,
    inserts_since_build: usize,
    built: bool,
}

impl AnnIndex {
    pub fn new(dimension: usize, config: AnnConfig) -> Self {
        Self {
            config,
            dimension,
            hnsw: None,
            id_to_index: HashMap::new(),
            index_to_id: HashMap::new(),
            vectors: Vec::new(),
            inserts_since_build: 0,
            built: false,
        }
    }

    /// Register a vector under an id. Replacing an id keeps the old graph
    /// slot pointing at the old vector until the next rebuild; callers rescore
    /// candidates against their source-of-truth map, so stale slots only cost
    /// recall, never correctness.
    pub fn insert(&mut self, id: String, vector: Vec<f32>) -> Result<(), StoreError> {
        if vector.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }

        if let Some(&existing) = self.id_to_index.get(&id) {
            self.vectors[existing] = vector;
        } else {
            let index = self.vectors.len();
            self.vectors.push(vector);
            self.id_to_index.insert(id.clone(), index);
            self.index_to_id.insert(index, id);
        }

        self.inserts_since_build += 1;
        if self.inserts_since_build > self.config.rebuild_threshold {
            self.built = false;
        }
        Ok(())
    }

    /// Whether queries should consult the graph right now.
    pub fn usable(&self) -> bool {
        self.built && self.hnsw.is_some() && self.config.should_use_ann(self.vectors.len())
    }

    pub fn needs_build(&self) -> bool {
        !self.built && self.config.should_use_ann(self.vectors.len())
    }

    /// Graph search. Returns candidates for exact rescoring; call only when
    /// [`usable`](Self::usable) is true.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<AnnCandidate>, StoreError> {
        if query.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        let Some(hnsw) = &self.hnsw else {
            return Ok(Vec::new());
        };

        let neighbours: Vec<Neighbour> = hnsw.search(query, k, self.config.ef_search);
        Ok(neighbours
            .into_iter()
            .map(|n| AnnCandidate {
                index: n.get_origin_id(),
                distance: n.distance,
            })
            .collect())
    }

    pub fn id_for(&self, index: usize) -> Option<&String> {
        self.index_to_id.get(&index)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// (Re)build the graph from the registered vectors. A no-op for tiny
    /// sets, which stay on the linear path.
    pub fn build(&mut self) {
        self.inserts_since_build = 0;
        if self.vectors.is_empty() || self.vectors.len() < 10 {
            self.built = true;
            self.hnsw = None;
            return;
        }

        let nb_elem = self.vectors.len();
        let nb_layer = 16.min((nb_elem as f32).ln().trunc() as usize);
        let hnsw = Hnsw::<f32, DistCosine>::new(
            self.config.m,
            nb_elem,
            nb_layer,
            self.config.ef_construction,
            DistCosine {},
        );

        let data_for_insertion: Vec<(&Vec<f32>, usize)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(idx, vec)| (vec, idx))
            .collect();
        hnsw.parallel_insert(&data_for_insertion);

        self.hnsw = Some(hnsw);
        self.built = true;
    }
}
