use fxhash::hash64;

use crate::normalize::l2_normalize_in_place;
use crate::EmbeddingConfig;

/// Deterministic stub used in `"stub"` mode. Generates sinusoid values
/// derived from a hash of the input text so tests get reproducible vectors
/// with minimal CPU cost.
pub(crate) fn make_stub_vector(text: &str, cfg: &EmbeddingConfig) -> Vec<f32> {
    let mut v = vec![0f32; cfg.dimension];
    let h = hash64(text.as_bytes());
    for (idx, value) in v.iter_mut().enumerate() {
        *value = ((h >> (idx % 32)) as f32 * 0.0001 + idx as f32 * 0.37).sin();
    }
    if cfg.normalize {
        l2_normalize_in_place(&mut v);
    }
    v
}
