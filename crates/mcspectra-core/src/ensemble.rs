//! Realization ensemble sources.
//!
//! The fitting stage writes amplitude-map ensembles into the same store the
//! spectra are written to; [`StoreEnsemble`] reads them back one realization
//! at a time.

use ndarray::{Array2, ArrayD, Ix2};

use crate::error::{Result, SpectraError};
use crate::keys::AmplitudeKey;
use crate::store::{ArrayStore, StoreError};

/// Read access to amplitude-map realizations and noise variances.
pub trait EnsembleSource: Send + Sync {
    /// Realization `index` of `component` under `fitting_scheme`, shape `(npol, npix)`.
    fn read_amplitude(
        &self,
        fitting_scheme: &str,
        component: &str,
        index: usize,
    ) -> Result<Array2<f64>>;

    /// Per-pixel noise variance of `component`, shape `(npol, npix)`.
    fn read_noise_variance(&self, fitting_scheme: &str, component: &str) -> Result<Array2<f64>>;
}

/// [`EnsembleSource`] backed by `<model>/<scheme>/<component>_T_bar` and
/// `<model>/<scheme>/<component>_N_T` datasets.
pub struct StoreEnsemble<'s, S: ArrayStore + ?Sized> {
    store: &'s S,
    model_id: String,
}

impl<'s, S: ArrayStore + ?Sized> StoreEnsemble<'s, S> {
    pub fn new(store: &'s S, model_id: impl Into<String>) -> Self {
        Self {
            store,
            model_id: model_id.into(),
        }
    }

    /// Number of stored realizations for a component.
    pub fn realization_count(&self, fitting_scheme: &str, component: &str) -> Result<usize> {
        let path = AmplitudeKey::new(&self.model_id, fitting_scheme, component).amplitude_path();
        let shape = self.store.shape(&path)?;
        if shape.len() != 3 {
            return Err(SpectraError::shape(
                format!("amplitude ensemble '{path}' (nmc, npol, npix)"),
                &[0, 0, 0],
                &shape,
            ));
        }
        Ok(shape[0])
    }
}

fn into_map(path: &str, data: ArrayD<f64>) -> Result<Array2<f64>> {
    let shape = data.shape().to_vec();
    data.into_dimensionality::<Ix2>()
        .map_err(|_| SpectraError::shape(format!("map '{path}' (npol, npix)"), &[0, 0], &shape))
}

impl<S: ArrayStore + ?Sized> EnsembleSource for StoreEnsemble<'_, S> {
    fn read_amplitude(
        &self,
        fitting_scheme: &str,
        component: &str,
        index: usize,
    ) -> Result<Array2<f64>> {
        let available = self.realization_count(fitting_scheme, component)?;
        if index >= available {
            return Err(SpectraError::MissingRealization {
                fitting_scheme: fitting_scheme.to_string(),
                component: component.to_string(),
                index,
                available,
            });
        }
        let path = AmplitudeKey::new(&self.model_id, fitting_scheme, component).amplitude_path();
        let slab = self.store.read_leading(&path, index)?;
        into_map(&path, slab)
    }

    fn read_noise_variance(&self, fitting_scheme: &str, component: &str) -> Result<Array2<f64>> {
        let path =
            AmplitudeKey::new(&self.model_id, fitting_scheme, component).noise_variance_path();
        let data = self.store.read(&path).map_err(|e| match e {
            StoreError::NotFound(_) => SpectraError::config(format!(
                "component '{component}' declares a noise model but '{path}' is missing"
            )),
            other => other.into(),
        })?;
        into_map(&path, data)
    }
}
