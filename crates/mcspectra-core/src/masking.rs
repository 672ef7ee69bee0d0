//! Analysis masks and fitting schemes.
//!
//! A [`MaskingProvider`] enumerates the fitting schemes and, per named mask,
//! the tools needed to estimate spectra on it: mask weights, bandpower count,
//! beam and mode-coupling operator. [`MaskingConfig`] is the JSON-backed
//! provider used by the CLI.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::binned::DiagonalCoupling;
use crate::error::{Result, SpectraError};
use crate::spectrum::CouplingOperator;

/// Label of an independent analysis branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FittingScheme {
    pub name: String,
}

impl FittingScheme {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Read-only per-mask tools.
#[derive(Clone)]
pub struct AnalysisMask {
    pub name: String,
    pub coupling: Arc<dyn CouplingOperator>,
    /// Pixel weights, shape `(npix,)`.
    pub weights: Array1<f64>,
    pub n_bands: usize,
    pub beam: Array1<f64>,
}

impl AnalysisMask {
    pub fn new(
        name: impl Into<String>,
        coupling: Arc<dyn CouplingOperator>,
        weights: Array1<f64>,
        n_bands: usize,
        beam: Array1<f64>,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.contains('/') {
            return Err(SpectraError::config(format!(
                "mask name '{name}' must be non-empty and contain no '/'"
            )));
        }
        if n_bands == 0 {
            return Err(SpectraError::config(format!("mask '{name}' has no bandpowers")));
        }
        if coupling.n_bands() != n_bands {
            return Err(SpectraError::shape(
                format!("coupling operator bands for mask '{name}'"),
                &[n_bands],
                &[coupling.n_bands()],
            ));
        }
        if weights.is_empty() {
            return Err(SpectraError::config(format!("mask '{name}' has no pixels")));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(SpectraError::config(format!(
                "mask '{name}' has negative or non-finite weights"
            )));
        }
        Ok(Self {
            name,
            coupling,
            weights,
            n_bands,
            beam,
        })
    }

    pub fn npix(&self) -> usize {
        self.weights.len()
    }

    /// Fraction of sky with non-zero weight.
    pub fn sky_fraction(&self) -> f64 {
        self.weights.iter().filter(|w| **w > 0.0).count() as f64 / self.npix() as f64
    }
}

impl fmt::Debug for AnalysisMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisMask")
            .field("name", &self.name)
            .field("npix", &self.npix())
            .field("n_bands", &self.n_bands)
            .field("beam_len", &self.beam.len())
            .field("coupling", &self.coupling)
            .finish()
    }
}

/// Source of masks and fitting schemes.
pub trait MaskingProvider {
    fn fitting_schemes(&self) -> Vec<FittingScheme>;

    fn powerspectrum_tools(&self) -> Result<Vec<AnalysisMask>>;

    /// Serialized configuration recorded alongside each spectra group.
    fn provenance(&self) -> String;
}

/// One mask entry of a [`MaskingConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskEntry {
    pub name: String,
    pub weights: Vec<f64>,
    /// Number of bandpowers.
    pub bins: usize,
    #[serde(default)]
    pub beam: Vec<f64>,
    /// Per-band coupling gains; unit gains when absent.
    #[serde(default)]
    pub coupling: Option<Vec<f64>>,
}

/// JSON masking configuration.
///
/// ```json
/// {
///   "fitting_schemes": [{"name": "scheme1"}],
///   "masks": [{"name": "maskX", "weights": [1, 1, 0, 1], "bins": 2, "beam": [1.0, 0.9]}]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskingConfig {
    pub fitting_schemes: Vec<FittingScheme>,
    pub masks: Vec<MaskEntry>,
}

impl MaskingConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(raw)
            .map_err(|e| SpectraError::config(format!("invalid masking configuration: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    fn validate(&self) -> Result<()> {
        if self.fitting_schemes.is_empty() {
            return Err(SpectraError::config("no fitting schemes configured"));
        }
        let mut schemes = HashSet::new();
        for f in &self.fitting_schemes {
            if f.name.is_empty() || f.name.contains('/') {
                return Err(SpectraError::config(format!(
                    "fitting scheme name '{}' must be non-empty and contain no '/'",
                    f.name
                )));
            }
            if !schemes.insert(f.name.as_str()) {
                return Err(SpectraError::config(format!(
                    "fitting scheme '{}' listed twice",
                    f.name
                )));
            }
        }
        if self.masks.is_empty() {
            return Err(SpectraError::config("no masks configured"));
        }
        let mut masks = HashSet::new();
        for m in &self.masks {
            if !masks.insert(m.name.as_str()) {
                return Err(SpectraError::config(format!("mask '{}' listed twice", m.name)));
            }
        }
        Ok(())
    }

    fn build(entry: &MaskEntry) -> Result<AnalysisMask> {
        let coupling = match &entry.coupling {
            Some(gains) => {
                if gains.len() != entry.bins {
                    return Err(SpectraError::shape(
                        format!("coupling gains for mask '{}'", entry.name),
                        &[entry.bins],
                        &[gains.len()],
                    ));
                }
                DiagonalCoupling::new(Array1::from(gains.clone()))?
            }
            None => DiagonalCoupling::identity(entry.bins)?,
        };
        AnalysisMask::new(
            entry.name.clone(),
            Arc::new(coupling),
            Array1::from(entry.weights.clone()),
            entry.bins,
            Array1::from(entry.beam.clone()),
        )
    }
}

impl MaskingProvider for MaskingConfig {
    fn fitting_schemes(&self) -> Vec<FittingScheme> {
        self.fitting_schemes.clone()
    }

    fn powerspectrum_tools(&self) -> Result<Vec<AnalysisMask>> {
        self.masks.iter().map(Self::build).collect()
    }

    fn provenance(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
