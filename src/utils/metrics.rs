//! Ranking Metrics Module
//!
//! Implements GAP@1 (Global Average Precision at top-1), the competition
//! metric for landmark recognition. Only the single most-confident prediction
//! per sample is scored, so a correct prediction contributes more when it is
//! also ranked above other samples' predictions.

use crate::utils::error::{LandmarkError, Result};

/// Compute the simplified GAP@1 metric over top-1 predictions.
///
/// All three slices are parallel, one entry per sample: `predicts` and
/// `targets` hold top-1 class indices, `confs` the confidence of each
/// prediction.
///
/// Samples are visited in order of descending confidence. Ties are broken by
/// original position (stable order) so that the score is reproducible across
/// runs rather than dependent on ambient sort behavior. At each 1-based rank
/// `i`, a true positive contributes `true_pos_so_far / i`; the sum is divided
/// by the total sample count. The denominator is deliberately the full sample
/// count, not the number of true positives, matching the competition
/// definition.
///
/// # Errors
///
/// Returns `ShapeMismatch` when the three slices differ in length.
pub fn gap(predicts: &[usize], confs: &[f32], targets: &[usize]) -> Result<f64> {
    if predicts.len() != confs.len() || confs.len() != targets.len() {
        return Err(LandmarkError::ShapeMismatch(format!(
            "{} predicts, {} confs, {} targets",
            predicts.len(),
            confs.len(),
            targets.len()
        )));
    }

    if predicts.is_empty() {
        return Ok(0.0);
    }

    // Sort sample positions by confidence descending, tie-broken by original
    // index ascending. total_cmp keeps the ordering total even for NaN.
    let mut order: Vec<usize> = (0..predicts.len()).collect();
    order.sort_by(|&a, &b| {
        confs[b]
            .total_cmp(&confs[a])
            .then_with(|| a.cmp(&b))
    });

    let mut total = 0.0f64;
    let mut true_pos = 0usize;

    for (i, &idx) in order.iter().enumerate() {
        if predicts[idx] == targets[idx] {
            true_pos += 1;
            total += true_pos as f64 / (i + 1) as f64;
        }
    }

    Ok(total / predicts.len() as f64)
}
