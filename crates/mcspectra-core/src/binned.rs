//! Lightweight pixel-domain spectrum backend.
//!
//! [`BinnedEngine`] partitions the pixel axis into contiguous blocks and
//! measures mask-weighted cross power per block, treating the Q row of a
//! spin-2 map as the E proxy and the U row as the B proxy. [`DiagonalCoupling`]
//! deconvolves by a per-band gain. Together they let the pipeline run end to
//! end without a full harmonic-transform library, and they are exact enough
//! for white-noise checks: the expected BB auto power of unit-variance noise
//! is 1 in every band.

use ndarray::{Array1, Array2, Array4, ArrayD, ArrayView1, ArrayView2, s};

use crate::error::{Result, SpectraError};
use crate::spectrum::{Bandpowers, CoupledSpectrum, CouplingOperator, N_SPECTRA, SpectrumEngine};

/// Masked spin-2 field.
#[derive(Debug, Clone)]
pub struct BinnedField {
    e: Array1<f64>,
    b: Array1<f64>,
    weights: Array1<f64>,
    purified: bool,
}

impl BinnedField {
    pub fn purified(&self) -> bool {
        self.purified
    }

    pub fn npix(&self) -> usize {
        self.weights.len()
    }
}

/// Block-binned pixel-domain engine producing `n_modes` coupled modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinnedEngine {
    n_modes: usize,
}

impl BinnedEngine {
    pub fn new(n_modes: usize) -> Result<Self> {
        if n_modes == 0 {
            return Err(SpectraError::config("binned engine needs at least one mode"));
        }
        Ok(Self { n_modes })
    }

    pub fn n_modes(&self) -> usize {
        self.n_modes
    }

    /// Pixel range `[start, end)` of block `mode`.
    fn block(&self, mode: usize, npix: usize) -> (usize, usize) {
        (mode * npix / self.n_modes, (mode + 1) * npix / self.n_modes)
    }
}

impl SpectrumEngine for BinnedEngine {
    type Field = BinnedField;

    fn field(
        &self,
        map: ArrayView2<'_, f64>,
        mask: ArrayView1<'_, f64>,
        purify_b: bool,
    ) -> Result<Self::Field> {
        if map.nrows() != 2 {
            return Err(SpectraError::shape(
                "spin-2 map rows (Q, U)",
                &[2, mask.len()],
                map.shape(),
            ));
        }
        if map.ncols() != mask.len() {
            return Err(SpectraError::shape(
                "map pixels vs mask",
                &[2, mask.len()],
                map.shape(),
            ));
        }
        if mask.len() < self.n_modes {
            return Err(SpectraError::config(format!(
                "{} pixels cannot fill {} binned modes",
                mask.len(),
                self.n_modes
            )));
        }
        Ok(BinnedField {
            e: &map.row(0) * &mask,
            b: &map.row(1) * &mask,
            weights: mask.to_owned(),
            purified: purify_b,
        })
    }

    fn coupled_spectrum(&self, a: &Self::Field, b: &Self::Field) -> Result<CoupledSpectrum> {
        if a.npix() != b.npix() {
            return Err(SpectraError::shape("field pixels", &[a.npix()], &[b.npix()]));
        }
        let npix = a.npix();
        let mut out = Array2::zeros((N_SPECTRA, self.n_modes));
        for mode in 0..self.n_modes {
            let (lo, hi) = self.block(mode, npix);
            let norm: f64 = a
                .weights
                .slice(s![lo..hi])
                .dot(&b.weights.slice(s![lo..hi]));
            if norm <= 0.0 {
                continue;
            }
            let cross = |x: &Array1<f64>, y: &Array1<f64>| {
                x.slice(s![lo..hi]).dot(&y.slice(s![lo..hi])) / norm
            };
            out[[0, mode]] = cross(&a.e, &b.e);
            out[[1, mode]] = cross(&a.e, &b.b);
            out[[2, mode]] = cross(&a.b, &b.e);
            out[[3, mode]] = cross(&a.b, &b.b);
        }
        Ok(CoupledSpectrum(out))
    }
}

/// Diagonal mode-coupling operator: one gain per band.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagonalCoupling {
    gains: Array1<f64>,
}

impl DiagonalCoupling {
    pub fn new(gains: Array1<f64>) -> Result<Self> {
        if gains.is_empty() {
            return Err(SpectraError::config("coupling operator needs at least one band"));
        }
        if let Some(bad) = gains.iter().position(|g| !g.is_finite() || *g == 0.0) {
            return Err(SpectraError::config(format!(
                "coupling gain for band {bad} must be finite and non-zero"
            )));
        }
        Ok(Self { gains })
    }

    /// Unit gains: decoupling is the identity.
    pub fn identity(n_bands: usize) -> Result<Self> {
        Self::new(Array1::ones(n_bands))
    }
}

impl CouplingOperator for DiagonalCoupling {
    fn n_bands(&self) -> usize {
        self.gains.len()
    }

    fn decouple(&self, coupled: &CoupledSpectrum) -> Result<Bandpowers> {
        let expected = [N_SPECTRA, self.gains.len()];
        if coupled.0.shape() != expected {
            return Err(SpectraError::shape(
                "coupled spectrum vs coupling operator",
                &expected,
                coupled.0.shape(),
            ));
        }
        Ok(&coupled.0 / &self.gains)
    }

    fn bandpower_windows(&self) -> ArrayD<f64> {
        let n = self.gains.len();
        let mut w = Array4::zeros((N_SPECTRA, n, N_SPECTRA, n));
        for t in 0..N_SPECTRA {
            for band in 0..n {
                w[[t, band, t, band]] = 1.0;
            }
        }
        w.into_dyn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::estimate;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_blocks_tile_pixels() {
        let engine = BinnedEngine::new(3).unwrap();
        let blocks: Vec<_> = (0..3).map(|m| engine.block(m, 10)).collect();
        assert_eq!(blocks, vec![(0, 3), (3, 6), (6, 10)]);
    }

    #[test]
    fn test_auto_spectrum_of_constant_map() {
        let engine = BinnedEngine::new(2).unwrap();
        let map = arr2(&[[2.0, 2.0, 2.0, 2.0], [3.0, 3.0, 3.0, 3.0]]);
        let mask = arr1(&[1.0, 1.0, 1.0, 1.0]);
        let coupling = DiagonalCoupling::identity(2).unwrap();
        let bp = estimate(&engine, map.view(), map.view(), mask.view(), &coupling).unwrap();
        assert_eq!(bp.row(0).to_vec(), vec![4.0, 4.0]);
        assert_eq!(bp.row(1).to_vec(), vec![6.0, 6.0]);
        assert_eq!(bp.row(2).to_vec(), vec![6.0, 6.0]);
        assert_eq!(bp.row(3).to_vec(), vec![9.0, 9.0]);
    }

    #[test]
    fn test_fully_masked_block_is_zero() {
        let engine = BinnedEngine::new(2).unwrap();
        let map = arr2(&[[1.0, 1.0, 5.0, 5.0], [1.0, 1.0, 5.0, 5.0]]);
        let mask = arr1(&[0.0, 0.0, 1.0, 1.0]);
        let coupling = DiagonalCoupling::identity(2).unwrap();
        let bp = estimate(&engine, map.view(), map.view(), mask.view(), &coupling).unwrap();
        assert_eq!(bp[[3, 0]], 0.0);
        assert_eq!(bp[[3, 1]], 25.0);
    }

    #[test]
    fn test_gains_divide_bandpowers() {
        let coupling = DiagonalCoupling::new(arr1(&[2.0, 4.0])).unwrap();
        let coupled = CoupledSpectrum(Array2::from_elem((N_SPECTRA, 2), 8.0));
        let bp = coupling.decouple(&coupled).unwrap();
        assert_eq!(bp.row(3).to_vec(), vec![4.0, 2.0]);
    }

    #[test]
    fn test_zero_gain_rejected() {
        assert!(DiagonalCoupling::new(arr1(&[1.0, 0.0])).is_err());
        assert!(DiagonalCoupling::new(Array1::zeros(0)).is_err());
    }

    #[test]
    fn test_intensity_only_map_rejected() {
        let engine = BinnedEngine::new(1).unwrap();
        let map = arr2(&[[1.0, 2.0]]);
        let mask = arr1(&[1.0, 1.0]);
        assert!(matches!(
            engine.field(map.view(), mask.view(), true),
            Err(SpectraError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_field_records_purification() {
        let engine = BinnedEngine::new(1).unwrap();
        let map = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let mask = arr1(&[1.0, 1.0]);
        assert!(engine.field(map.view(), mask.view(), true).unwrap().purified());
    }

    #[test]
    fn test_windows_are_diagonal() {
        let w = DiagonalCoupling::identity(3).unwrap().bandpower_windows();
        assert_eq!(w.shape(), &[N_SPECTRA, 3, N_SPECTRA, 3]);
        assert_eq!(w.sum(), (N_SPECTRA * 3) as f64);
        assert_eq!(w[[3, 1, 3, 1]], 1.0);
        assert_eq!(w[[3, 1, 0, 1]], 0.0);
    }
}
