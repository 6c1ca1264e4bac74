//! Pairwise distance computation between two frame snapshots.

use nalgebra::DMatrix;

use crate::snapshot::FrameSnapshot;
use crate::{Error, Result};

/// Weighted squared Euclidean distances between every point of `a` (rows)
/// and every point of `b` (columns).
///
/// Entry `(i, j)` is `sum over features of weight * (a_i - b_j)^2`. This is
/// the only supported metric: costs must stay additive and non-negative for
/// the rank-based greedy walk and for the summed-distance comparison used in
/// conflict repair.
///
/// Fails if the snapshots declare different feature fields or weights.
pub fn distance_matrix(a: &FrameSnapshot, b: &FrameSnapshot) -> Result<DMatrix<f64>> {
    let sa = a.schema();
    let sb = b.schema();
    if sa.feature_fields != sb.feature_fields || sa.weights != sb.weights {
        return Err(Error::FieldMismatch {
            expected: sa.feature_fields.clone(),
            got: sb.feature_fields.clone(),
        });
    }

    let weights = &sa.weights;
    Ok(DMatrix::from_fn(a.len(), b.len(), |i, j| {
        let diff = &a.points()[i].features - &b.points()[j].features;
        diff.iter()
            .zip(weights.iter())
            .map(|(d, w)| w * d * d)
            .sum()
    }))
}
