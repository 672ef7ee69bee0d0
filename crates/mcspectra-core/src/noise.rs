//! Noise realization sampling and noise-bias ensembles.
//!
//! Noise maps are drawn pixel by pixel from a zero-mean Gaussian whose
//! variance is given by a [`NoiseVarianceMap`]. The random source is always
//! passed in, so a seeded generator reproduces a run exactly.

use log::debug;
use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::{Result, SpectraError};
use crate::spectrum::{CouplingOperator, NOISE_SPECTRUM_INDEX, SpectrumEngine, estimate};

/// Number of noise realization pairs per component unless configured.
pub const DEFAULT_NOISE_MC: usize = 30;

/// Per-pixel noise variance, shape `(npol, npix)`.
pub type NoiseVarianceMap = Array2<f64>;

/// Check a variance map is usable: finite and non-negative everywhere.
pub fn validate_variance(variance: ArrayView2<'_, f64>) -> Result<()> {
    if let Some((idx, v)) = variance
        .indexed_iter()
        .find(|(_, v)| !v.is_finite() || **v < 0.0)
    {
        return Err(SpectraError::config(format!(
            "noise variance at {idx:?} is {v}; must be finite and non-negative"
        )));
    }
    Ok(())
}

/// Draw one noise realization: `N(0, 1) * sqrt(variance)` per pixel.
pub fn draw_noise<R: Rng + ?Sized>(variance: ArrayView2<'_, f64>, rng: &mut R) -> Array2<f64> {
    variance.map(|v| {
        let z: f64 = StandardNormal.sample(&mut *rng);
        z * v.sqrt()
    })
}

/// Build the noise-bias ensemble, shape `(noise_mc, n_bands)`.
///
/// Each row is the BB bandpowers of the cross-spectrum between two
/// independently drawn noise realizations.
pub fn noise_bias_ensemble<E, R>(
    engine: &E,
    variance: ArrayView2<'_, f64>,
    mask: ArrayView1<'_, f64>,
    coupling: &dyn CouplingOperator,
    noise_mc: usize,
    rng: &mut R,
) -> Result<Array2<f64>>
where
    E: SpectrumEngine + ?Sized,
    R: Rng + ?Sized,
{
    if noise_mc == 0 {
        return Err(SpectraError::config("noise_mc must be positive"));
    }
    validate_variance(variance)?;

    let mut ensemble = Array2::zeros((noise_mc, coupling.n_bands()));
    for k in 0..noise_mc {
        let n1 = draw_noise(variance, rng);
        let n2 = draw_noise(variance, rng);
        let bandpowers = estimate(engine, n1.view(), n2.view(), mask, coupling)?;
        ensemble.row_mut(k).assign(&bandpowers.row(NOISE_SPECTRUM_INDEX));
        debug!("noise realization pair {}/{}", k + 1, noise_mc);
    }
    Ok(ensemble)
}
