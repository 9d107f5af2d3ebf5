// --- File: src/losses.rs ---

//! Softmax cross-entropy in eager form.
//!
//! Every function takes raw logits `[batch, classes]` and zero-based integer
//! labels. The loss is computed with the log-sum-exp trick so that large
//! logits do not overflow.
//!
//! # Available Loss Functions
//!
//! - **Per-example**: `cross_entropy_per_example`
//! - **Mean**: `cross_entropy_mean`
//! - **Weighted sum** (CRAIG gamma weights): `weighted_cross_entropy`
//! - **Gradient w.r.t. logits**: `cross_entropy_grad`

use crate::nn::{softmax_rows, NnError, NnResult};
use ndarray::{Array1, Array2, Axis};

fn check_labels(logits: &Array2<f32>, labels: &[usize]) -> NnResult<()> {
    if logits.nrows() != labels.len() {
        return Err(NnError::InputShape(format!(
            "logits {:?} vs {} labels",
            logits.shape(),
            labels.len()
        )));
    }
    if let Some(&bad) = labels.iter().find(|&&y| y >= logits.ncols()) {
        return Err(NnError::InputShape(format!(
            "label {} out of range for {} classes",
            bad,
            logits.ncols()
        )));
    }
    Ok(())
}

/// Computes the cross-entropy of every row.
///
/// Formula: `loss_i = logsumexp(z_i) - z_i[y_i]`.
pub fn cross_entropy_per_example(logits: &Array2<f32>, labels: &[usize]) -> NnResult<Array1<f32>> {
    check_labels(logits, labels)?;
    let losses = logits
        .axis_iter(Axis(0))
        .zip(labels)
        .map(|(row, &y)| {
            let max_val = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let lse = row.iter().map(|&v| (v - max_val).exp()).sum::<f32>().ln() + max_val;
            lse - row[y]
        })
        .collect();
    Ok(losses)
}

/// Computes the mean cross-entropy over the batch.
///
/// An empty batch has zero loss.
pub fn cross_entropy_mean(logits: &Array2<f32>, labels: &[usize]) -> NnResult<f32> {
    let losses = cross_entropy_per_example(logits, labels)?;
    Ok(losses.mean().unwrap_or(0.0))
}

/// Computes `sum_i weights[i] * loss_i`.
///
/// Used for the CRAIG objective, where `weights[i] = gamma_i / N`.
pub fn weighted_cross_entropy(
    logits: &Array2<f32>,
    labels: &[usize],
    weights: &[f32],
) -> NnResult<f32> {
    if weights.len() != labels.len() {
        return Err(NnError::InputShape(format!(
            "{} weights for {} labels",
            weights.len(),
            labels.len()
        )));
    }
    let losses = cross_entropy_per_example(logits, labels)?;
    Ok(losses.iter().zip(weights).map(|(l, w)| l * w).sum())
}

/// Gradient of the batch loss with respect to the logits.
///
/// With `weights == None` the loss is the mean, so each row gets
/// `(softmax(z_i) - onehot(y_i)) / batch`. With explicit weights each row is
/// scaled by `weights[i]` instead.
pub fn cross_entropy_grad(
    logits: &Array2<f32>,
    labels: &[usize],
    weights: Option<&[f32]>,
) -> NnResult<Array2<f32>> {
    check_labels(logits, labels)?;
    let mut grad = softmax_rows(logits);
    for (i, &y) in labels.iter().enumerate() {
        grad[[i, y]] -= 1.0;
    }
    match weights {
        Some(w) => {
            if w.len() != labels.len() {
                return Err(NnError::InputShape(format!(
                    "{} weights for {} labels",
                    w.len(),
                    labels.len()
                )));
            }
            for (mut row, &wi) in grad.axis_iter_mut(Axis(0)).zip(w) {
                row.mapv_inplace(|v| v * wi);
            }
        }
        None => {
            let n = labels.len().max(1) as f32;
            grad.mapv_inplace(|v| v / n);
        }
    }
    Ok(grad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_uniform_logits_give_log_c() {
        let logits = Array2::zeros((4, 3));
        let loss = cross_entropy_mean(&logits, &[0, 1, 2, 0]).unwrap();
        assert_abs_diff_eq!(loss, 3.0f32.ln(), epsilon = 1e-6);
    }

    #[test]
    fn test_large_logits_are_stable() {
        let logits = array![[1000.0, 0.0]];
        let loss = cross_entropy_mean(&logits, &[0]).unwrap();
        assert!(loss.is_finite());
        assert_abs_diff_eq!(loss, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_weighted_matches_mean_for_uniform_weights() {
        let logits = array![[0.3, -0.2], [1.5, 0.1], [0.0, 2.0]];
        let labels = [0, 1, 1];
        let mean = cross_entropy_mean(&logits, &labels).unwrap();
        let weighted = weighted_cross_entropy(&logits, &labels, &[1.0 / 3.0; 3]).unwrap();
        assert_abs_diff_eq!(mean, weighted, epsilon = 1e-6);
    }

    #[test]
    fn test_grad_rows_sum_to_zero() {
        let logits = array![[0.3, -0.2, 1.0], [1.5, 0.1, 0.0]];
        let grad = cross_entropy_grad(&logits, &[2, 0], None).unwrap();
        for row in grad.axis_iter(Axis(0)) {
            assert_abs_diff_eq!(row.sum(), 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_label_out_of_range() {
        let logits = Array2::zeros((1, 2));
        assert!(cross_entropy_mean(&logits, &[2]).is_err());
    }
}
