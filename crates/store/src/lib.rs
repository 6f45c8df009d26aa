//! Storage layer for the tender recommendation service.
//!
//! Three stores share one design: records are serialized with `bincode`,
//! compressed with zstd, and written through a pluggable [`StoreBackend`].
//! Auxiliary in-memory structures (the source-url uniqueness map, the vector
//! maps, the ANN graph) are rebuilt from the backend on open and kept in sync
//! on every write.
//!
//! - [`TenderStore`] - typed CRUD over tenders.
//! - [`ProfileStore`] - one matching profile per company.
//! - [`VectorIndex`] - fixed-dimension tender/profile vectors with
//!   metadata-filtered KNN and range queries.
//!
//! ## Ordering guarantee
//!
//! Every similarity query returns results in strictly descending cosine
//! similarity with ties broken by ascending tender id, so a fixed snapshot
//! always produces the same ordering.
//!
//! ## Consistency
//!
//! Upserts are linearizable per id: a read-after-write on the same id
//! observes the new value. Cross-id KNN under ANN acceleration may trail
//! concurrent upserts by up to one rebuild window
//! ([`AnnConfig::rebuild_threshold`] inserts); the exact rescoring pass means
//! stale candidates are still scored against current vectors.

pub mod ann;
pub mod backend;
pub mod profiles;
pub mod tenders;
pub mod vector;

pub use crate::ann::{AnnConfig, AnnIndex};
pub use crate::backend::{BackendConfig, InMemoryBackend, StoreBackend};
pub use crate::profiles::ProfileStore;
pub use crate::tenders::TenderStore;
pub use crate::vector::{ScoredId, TenderVectorMeta, VectorFilter, VectorIndex};

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Bump this value whenever an on-disk record layout changes.
pub const STORE_SCHEMA_VERSION: u16 = 1;

/// Errors produced by the storage layer.
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("compression error: {0}")]
    Compression(String),
    #[error("vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("duplicate source_url: {0}")]
    DuplicateSourceUrl(String),
}

impl StoreError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for StoreError {
    fn from(e: bincode::error::EncodeError) -> Self {
        StoreError::Encode(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for StoreError {
    fn from(e: bincode::error::DecodeError) -> Self {
        StoreError::Decode(e.to_string())
    }
}

/// Serialize + compress a fixed-layout record (vector records) for the
/// backend.
pub(crate) fn encode_record<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    let encoded = encode_to_vec(value, standard())?;
    zstd::encode_all(encoded.as_slice(), 3).map_err(|e| StoreError::Compression(e.to_string()))
}

/// Decompress + deserialize a fixed-layout record from the backend.
pub(crate) fn decode_record<T: DeserializeOwned>(data: &[u8]) -> Result<T, StoreError> {
    let decompressed =
        zstd::decode_all(data).map_err(|e| StoreError::Compression(e.to_string()))?;
    let (record, _) = decode_from_slice(&decompressed, standard())?;
    Ok(record)
}

/// Serialize + compress an entity record. Tenders and profiles carry open
/// map fields (extracted data, scoring-weight extras) that need a
/// self-describing format, so entities go through JSON rather than bincode.
pub(crate) fn encode_entity<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    let encoded = serde_json::to_vec(value).map_err(|e| StoreError::Encode(e.to_string()))?;
    zstd::encode_all(encoded.as_slice(), 3).map_err(|e| StoreError::Compression(e.to_string()))
}

/// Decompress + deserialize an entity record.
pub(crate) fn decode_entity<T: DeserializeOwned>(data: &[u8]) -> Result<T, StoreError> {
    let decompressed =
        zstd::decode_all(data).map_err(|e| StoreError::Compression(e.to_string()))?;
    serde_json::from_slice(&decompressed).map_err(|e| StoreError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        id: String,
        values: Vec<f32>,
    }

    #[test]
    fn encode_decode_round_trip() {
        let sample = Sample {
            id: "t-1".into(),
            values: vec![0.25, -0.5, 1.0],
        };
        let bytes = encode_record(&sample).unwrap();
        let decoded: Sample = decode_record(&bytes).unwrap();
        assert_eq!(decoded, sample);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let result: Result<Sample, _> = decode_record(&[1, 2, 3, 4]);
        assert!(result.is_err());
    }
}
