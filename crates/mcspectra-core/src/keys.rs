//! Typed storage keys.
//!
//! Core logic addresses results by composite keys; slash paths only appear
//! when a key crosses into an [`ArrayStore`](crate::store::ArrayStore).
//!
//! ```text
//! <model>/<scheme>/spectra/<mask>/bpw_window_function
//! <model>/<scheme>/spectra/<mask>/beam
//! <model>/<scheme>/spectra/<mask>/<component>
//! <model>/<scheme>/spectra/<mask>/<component>_cln_mean
//! <model>/<scheme>/spectra/<mask>/<component>_cln_cov
//! <model>/<scheme>/<component>_T_bar      amplitude ensemble (input)
//! <model>/<scheme>/<component>_N_T        noise variance (input)
//! ```

use std::fmt;

/// One artifact inside a spectra group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact<'a> {
    BandpowerWindow,
    Beam,
    Spectrum(&'a str),
    NoiseMean(&'a str),
    NoiseCov(&'a str),
}

impl Artifact<'_> {
    /// Dataset name within the spectra group.
    pub fn dataset_name(&self) -> String {
        match self {
            Self::BandpowerWindow => "bpw_window_function".to_string(),
            Self::Beam => "beam".to_string(),
            Self::Spectrum(c) => (*c).to_string(),
            Self::NoiseMean(c) => format!("{c}_cln_mean"),
            Self::NoiseCov(c) => format!("{c}_cln_cov"),
        }
    }

    /// Whether a component called `name` would collide with another
    /// artifact of the same group.
    pub fn is_reserved(name: &str) -> bool {
        [Self::BandpowerWindow, Self::Beam]
            .iter()
            .any(|a| a.dataset_name() == name)
            || name.ends_with("_cln_mean")
            || name.ends_with("_cln_cov")
    }
}

/// Identifies the spectra group of one (model, fitting scheme, mask) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpectraKey<'a> {
    pub model_id: &'a str,
    pub fitting_scheme: &'a str,
    pub mask_name: &'a str,
}

impl<'a> SpectraKey<'a> {
    pub fn new(model_id: &'a str, fitting_scheme: &'a str, mask_name: &'a str) -> Self {
        Self {
            model_id,
            fitting_scheme,
            mask_name,
        }
    }

    /// Path of the spectra group.
    pub fn group_path(&self) -> String {
        format!(
            "{}/{}/spectra/{}",
            self.model_id, self.fitting_scheme, self.mask_name
        )
    }

    /// Path of one artifact within the group.
    pub fn artifact_path(&self, artifact: Artifact<'_>) -> String {
        format!("{}/{}", self.group_path(), artifact.dataset_name())
    }
}

impl fmt::Display for SpectraKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.group_path())
    }
}

/// Identifies the inputs for one (model, fitting scheme, component).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AmplitudeKey<'a> {
    pub model_id: &'a str,
    pub fitting_scheme: &'a str,
    pub component: &'a str,
}

impl<'a> AmplitudeKey<'a> {
    pub fn new(model_id: &'a str, fitting_scheme: &'a str, component: &'a str) -> Self {
        Self {
            model_id,
            fitting_scheme,
            component,
        }
    }

    /// Amplitude ensemble, shape `(nmc, npol, npix)`.
    pub fn amplitude_path(&self) -> String {
        format!(
            "{}/{}/{}_T_bar",
            self.model_id, self.fitting_scheme, self.component
        )
    }

    /// Per-pixel noise variance, shape `(npol, npix)`.
    pub fn noise_variance_path(&self) -> String {
        format!(
            "{}/{}/{}_N_T",
            self.model_id, self.fitting_scheme, self.component
        )
    }
}
