//! Vector similarity engine — cosine scoring, nearest-neighbor ranking,
//! and the adaptive deviation cutoff.
//!
//! Candidates come from a [`Collection`]; items without a vector are
//! silently skipped. Length-mismatched vectors are a typed error, never a
//! silent coercion.

pub mod cache;

use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;

use crate::collection::Collection;
use crate::storage::Storage;

/// Vectors with a magnitude below this are treated as having undefined
/// direction and score 0 instead of dividing by a near-zero denominator.
pub const MAGNITUDE_EPSILON: f64 = 1e-8;

/// Relaxation applied to the deviation threshold for the first few gaps,
/// so close top results are not truncated too aggressively.
const EARLY_GAP_TOLERANCE: f64 = 1.5;
const EARLY_GAP_COUNT: usize = 3;

/// Typed vector-geometry failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VectorError {
    #[error("vector length mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// A scored neighbor. Transient — never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connection {
    pub key: String,
    pub score: f32,
}

/// Effective query parameters for [`nearest`]. The query vector itself is
/// implicit per source item and excluded from cache fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NearestParams {
    /// Maximum number of connections returned.
    pub limit: usize,
    /// Exact key to skip — usually the query item itself.
    pub exclude_key: Option<String>,
    /// Key prefixes to skip entirely.
    pub exclude_key_prefixes: Vec<String>,
}

impl Default for NearestParams {
    fn default() -> Self {
        Self {
            limit: 20,
            exclude_key: None,
            exclude_key_prefixes: Vec::new(),
        }
    }
}

impl NearestParams {
    fn excludes(&self, key: &str) -> bool {
        if self.exclude_key.as_deref() == Some(key) {
            return true;
        }
        self.exclude_key_prefixes
            .iter()
            .any(|prefix| key.starts_with(prefix))
    }
}

/// Cosine similarity between two vectors.
///
/// Errors on a length mismatch; returns `0.0` when either vector's
/// magnitude is below [`MAGNITUDE_EPSILON`]. Accumulates in f64 and always
/// lands in `[-1, 1]` for real inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, VectorError> {
    if a.len() != b.len() {
        return Err(VectorError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let (norm_a, norm_b) = (norm_a.sqrt(), norm_b.sqrt());
    if norm_a < MAGNITUDE_EPSILON || norm_b < MAGNITUDE_EPSILON {
        return Ok(0.0);
    }
    Ok((dot / (norm_a * norm_b)) as f32)
}

/// Rank every embedded item in the collection against `query`.
///
/// Items without a vector are skipped; excluded keys are dropped before
/// scoring. Results sort descending by score — the sort is stable, so ties
/// keep enumeration order — and truncate to `params.limit`.
pub fn nearest<S: Storage>(
    query: &[f32],
    collection: &Collection<S>,
    params: &NearestParams,
) -> Result<Vec<Connection>, VectorError> {
    let mut scored = Vec::new();
    for (key, vector) in collection.iter_vectors() {
        if params.excludes(key) {
            continue;
        }
        let score = cosine_similarity(query, &vector)?;
        scored.push(Connection {
            key: key.to_string(),
            score,
        });
    }

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(params.limit);
    Ok(scored)
}

/// Rank neighbors of an existing item by key, excluding the item itself.
pub fn nearest_to_item<S: Storage>(
    key: &str,
    collection: &Collection<S>,
    params: &NearestParams,
) -> Result<Option<Vec<Connection>>, VectorError> {
    let Some(item) = collection.get(key) else {
        return Ok(None);
    };
    let Some(vector) = item.vector else {
        return Ok(None);
    };
    let mut params = params.clone();
    params.exclude_key = Some(key.to_string());
    nearest(&vector, collection, &params).map(Some)
}

/// Adaptive statistical cutoff over a score-descending list.
///
/// Computes the mean and population standard deviation of the scores, then
/// walks adjacent gaps: the list is cut at the first gap exceeding the
/// standard deviation, except that the first [`EARLY_GAP_COUNT`] gaps get a
/// [`EARLY_GAP_TOLERANCE`]× relaxed threshold. The returned prefix includes
/// the left side of the triggering gap; if no gap triggers, the whole list
/// comes back. Deterministic for identical score sequences.
pub fn trim_by_deviation(connections: &[Connection]) -> Vec<Connection> {
    if connections.len() < 2 {
        return connections.to_vec();
    }

    let scores: Vec<f64> = connections.iter().map(|c| f64::from(c.score)).collect();
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    for i in 0..scores.len() - 1 {
        let gap = (scores[i] - scores[i + 1]).abs();
        let threshold = if i < EARLY_GAP_COUNT {
            std_dev * EARLY_GAP_TOLERANCE
        } else {
            std_dev
        };
        if gap > threshold {
            return connections[..=i].to_vec();
        }
    }
    connections.to_vec()
}
