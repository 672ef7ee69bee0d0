//! Cross-spectrum estimation between two masked maps.
//!
//! The harmonic transform itself lives behind [`SpectrumEngine`] and
//! [`CouplingOperator`]; this module fixes the array layout and the calling
//! convention. Maps are `(npol, npix)` arrays, masks are `(npix,)` weights,
//! and every estimate is a [`Bandpowers`] array of shape
//! `(N_SPECTRA, n_bands)` with rows ordered as [`SpectralType::ORDER`].
//!
//! Fields are always built with B-mode purification requested.

use std::fmt;

use ndarray::{Array2, ArrayD, ArrayView1, ArrayView2};

use crate::error::{Result, SpectraError};

/// Number of spectral types produced for a pair of spin-2 fields.
pub const N_SPECTRA: usize = 4;

/// Row of the spectral type used for noise-bias subtraction (BB).
pub const NOISE_SPECTRUM_INDEX: usize = 3;

/// Purification is always requested; reference outputs depend on it.
pub(crate) const PURIFY_B: bool = true;

/// Decoupled bandpowers, shape `(N_SPECTRA, n_bands)`.
pub type Bandpowers = Array2<f64>;

/// Spectral type of a bandpower row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpectralType {
    EE,
    EB,
    BE,
    BB,
}

impl SpectralType {
    /// Row order of every [`Bandpowers`] array.
    pub const ORDER: [SpectralType; N_SPECTRA] = [Self::EE, Self::EB, Self::BE, Self::BB];

    pub fn row(self) -> usize {
        match self {
            Self::EE => 0,
            Self::EB => 1,
            Self::BE => 2,
            Self::BB => 3,
        }
    }
}

impl fmt::Display for SpectralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EE => write!(f, "EE"),
            Self::EB => write!(f, "EB"),
            Self::BE => write!(f, "BE"),
            Self::BB => write!(f, "BB"),
        }
    }
}

/// Coupled pseudo-spectrum as returned by the engine, shape `(N_SPECTRA, n_modes)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CoupledSpectrum(pub Array2<f64>);

/// Harmonic-transform backend.
pub trait SpectrumEngine: Send + Sync {
    /// Engine-specific masked field.
    type Field: Send;

    /// Build a masked field from a `(npol, npix)` map.
    fn field(
        &self,
        map: ArrayView2<'_, f64>,
        mask: ArrayView1<'_, f64>,
        purify_b: bool,
    ) -> Result<Self::Field>;

    /// Coupled pseudo-spectrum between two fields.
    fn coupled_spectrum(&self, a: &Self::Field, b: &Self::Field) -> Result<CoupledSpectrum>;
}

/// Mode-coupling operator of one mask and binning scheme.
pub trait CouplingOperator: Send + Sync + fmt::Debug {
    /// Number of output bandpowers.
    fn n_bands(&self) -> usize;

    /// Deconvolve a coupled spectrum into `(N_SPECTRA, n_bands)` bandpowers.
    fn decouple(&self, coupled: &CoupledSpectrum) -> Result<Bandpowers>;

    /// Bandpower window functions relating true multipoles to bins.
    fn bandpower_windows(&self) -> ArrayD<f64>;
}

/// Estimate decoupled bandpowers between `map_a` and `map_b`.
///
/// Both maps must share the mask's pixelization and each other's shape.
pub fn estimate<E: SpectrumEngine + ?Sized>(
    engine: &E,
    map_a: ArrayView2<'_, f64>,
    map_b: ArrayView2<'_, f64>,
    mask: ArrayView1<'_, f64>,
    coupling: &dyn CouplingOperator,
) -> Result<Bandpowers> {
    let npix = mask.len();
    if map_a.ncols() != npix {
        return Err(SpectraError::shape(
            "first map pixels vs mask",
            &[map_a.nrows(), npix],
            map_a.shape(),
        ));
    }
    if map_b.shape() != map_a.shape() {
        return Err(SpectraError::shape(
            "second map vs first map",
            map_a.shape(),
            map_b.shape(),
        ));
    }

    let field_a = engine.field(map_a, mask, PURIFY_B)?;
    let field_b = engine.field(map_b, mask, PURIFY_B)?;
    let coupled = engine.coupled_spectrum(&field_a, &field_b)?;
    let bandpowers = coupling.decouple(&coupled)?;

    let expected = [N_SPECTRA, coupling.n_bands()];
    if bandpowers.shape() != expected {
        return Err(SpectraError::shape(
            "decoupled bandpowers",
            &expected,
            bandpowers.shape(),
        ));
    }
    Ok(bandpowers)
}
