//! Clustering engine — centroid and medoid geometry over
//! arbitrary-dimension point sets.
//!
//! Both routines are pure and deterministic: the centroid is the
//! coordinate-wise mean (not necessarily a member), the medoid is the
//! member minimizing total Euclidean distance to the rest, ties going to
//! the first-encountered index.

use serde::Serialize;
use std::collections::HashSet;

use crate::collection::Collection;
use crate::similarity::VectorError;
use crate::storage::Storage;

/// Grouping of items around their geometric center.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterResult {
    /// Coordinate mean of the member vectors.
    pub centroid: Vec<f32>,
    /// The member vector closest to all others.
    pub medoid: Vec<f32>,
    /// Keys of the members that contributed a vector.
    pub member_keys: HashSet<String>,
}

/// Arithmetic mean of each coordinate. `None` for empty input; errors if
/// the points disagree on dimensionality.
pub fn centroid(points: &[Vec<f32>]) -> Result<Option<Vec<f32>>, VectorError> {
    let Some(first) = points.first() else {
        return Ok(None);
    };

    let mut sums = vec![0.0f64; first.len()];
    for point in points {
        if point.len() != sums.len() {
            return Err(VectorError::DimensionMismatch {
                expected: sums.len(),
                got: point.len(),
            });
        }
        for (sum, &coord) in sums.iter_mut().zip(point.iter()) {
            *sum += f64::from(coord);
        }
    }

    let count = points.len() as f64;
    Ok(Some(sums.into_iter().map(|sum| (sum / count) as f32).collect()))
}

/// Index of the point minimizing total distance to all other points.
///
/// Each unordered pair is measured once and accumulated symmetrically.
/// `None` for empty input; a single point is its own medoid.
pub fn medoid_index(points: &[Vec<f32>]) -> Result<Option<usize>, VectorError> {
    if points.is_empty() {
        return Ok(None);
    }
    if points.len() == 1 {
        return Ok(Some(0));
    }

    let mut costs = vec![0.0f64; points.len()];
    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            let distance = euclidean(&points[i], &points[j])?;
            costs[i] += distance;
            costs[j] += distance;
        }
    }

    // First strictly-smaller cost wins, so ties keep the earliest index.
    let mut best = 0;
    for (index, &cost) in costs.iter().enumerate().skip(1) {
        if cost < costs[best] {
            best = index;
        }
    }
    Ok(Some(best))
}

/// The medoid point itself. See [`medoid_index`].
pub fn medoid(points: &[Vec<f32>]) -> Result<Option<Vec<f32>>, VectorError> {
    Ok(medoid_index(points)?.map(|index| points[index].clone()))
}

fn euclidean(a: &[f32], b: &[f32]) -> Result<f64, VectorError> {
    if a.len() != b.len() {
        return Err(VectorError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let diff = f64::from(x) - f64::from(y);
            diff * diff
        })
        .sum();
    Ok(sum.sqrt())
}

/// Assemble a [`ClusterResult`] from the embedded members of `keys`.
///
/// Members without a vector are skipped; `None` when no member has one.
pub fn cluster_items<S: Storage>(
    collection: &Collection<S>,
    keys: &[String],
) -> Result<Option<ClusterResult>, VectorError> {
    let mut member_keys = HashSet::new();
    let mut vectors = Vec::new();
    for key in keys {
        if let Some(vector) = collection.get(key).and_then(|item| item.vector) {
            member_keys.insert(key.clone());
            vectors.push(vector);
        }
    }

    let Some(centroid) = centroid(&vectors)? else {
        return Ok(None);
    };
    let Some(medoid) = medoid(&vectors)? else {
        return Ok(None);
    };
    Ok(Some(ClusterResult {
        centroid,
        medoid,
        member_keys,
    }))
}
