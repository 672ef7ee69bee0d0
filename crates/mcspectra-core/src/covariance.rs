//! Sample mean and maximum-likelihood covariance.
//!
//! The covariance divides by `N`, not `N - 1`. Downstream likelihoods were
//! calibrated against this estimator, so it must not be "corrected".

use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::error::{Result, SpectraError};

/// Mean and covariance of a noise-bias ensemble.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseBiasStatistics {
    /// Shape `(d,)`.
    pub mean: Array1<f64>,
    /// Shape `(d, d)`.
    pub covariance: Array2<f64>,
}

impl NoiseBiasStatistics {
    pub fn dim(&self) -> usize {
        self.mean.len()
    }
}

/// Mean and biased covariance over the rows of `ensemble` (shape `(N, d)`).
pub fn mean_cov_rows(ensemble: ArrayView2<'_, f64>) -> Result<NoiseBiasStatistics> {
    let n = ensemble.nrows();
    if n == 0 {
        return Err(SpectraError::EmptyEnsemble);
    }
    let mean = ensemble
        .mean_axis(Axis(0))
        .ok_or(SpectraError::EmptyEnsemble)?;
    let diff = &ensemble - &mean;
    let covariance = diff.t().dot(&diff) / n as f64;
    Ok(NoiseBiasStatistics { mean, covariance })
}

/// Mean and biased covariance of a sequence of `dim`-length vectors.
pub fn mean_cov<V: AsRef<[f64]>>(ensemble: &[V], dim: usize) -> Result<NoiseBiasStatistics> {
    if ensemble.is_empty() {
        return Err(SpectraError::EmptyEnsemble);
    }
    let mut rows = Array2::zeros((ensemble.len(), dim));
    for (index, v) in ensemble.iter().enumerate() {
        let v = v.as_ref();
        if v.len() != dim {
            return Err(SpectraError::DimensionMismatch {
                index,
                expected: dim,
                actual: v.len(),
            });
        }
        rows.row_mut(index).assign(&ndarray::ArrayView1::from(v));
    }
    mean_cov_rows(rows.view())
}
