//! Spectrum accumulation pipeline.
//!
//! Architecture:
//! 1. Load masks and fitting schemes from the masking provider
//! 2. Per mask: bandpower window functions, computed once
//! 3. Per (mask, fitting scheme): spectra group with provenance, windows, beam
//! 4. Per component: cross-spectra of every realization pair, stacked into
//!    `(nmc/2, N_SPECTRA, n_bands)` and committed in one write
//! 5. Per component with a noise model (when enabled): noise-bias mean and
//!    covariance from `noise_mc` simulated noise pairs
//!
//! Loop order is mask → fitting scheme → component → pair. Pairs are
//! independent and may run on the rayon pool; rows are placed by pair index,
//! so output does not depend on scheduling. Noise draws stay sequential so a
//! seeded generator fixes the result.

use log::{debug, info};
use ndarray::{Array1, Array3, ArrayD, Axis};
use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::RunConfig;
use crate::covariance::{NoiseBiasStatistics, mean_cov_rows};
use crate::ensemble::EnsembleSource;
use crate::error::{Result, SpectraError};
use crate::keys::{Artifact, SpectraKey};
use crate::masking::{AnalysisMask, MaskingProvider};
use crate::model::{Component, ModelConfig, NoiseModel};
use crate::noise::{DEFAULT_NOISE_MC, noise_bias_ensemble};
use crate::pairing::{RealizationPair, RealizationPairs};
use crate::spectrum::{Bandpowers, N_SPECTRA, SpectrumEngine, estimate};
use crate::store::{ArrayStore, Attrs};

/// Attribute holding the serialized masking configuration.
pub const CONFIG_ATTR: &str = "config";

/// Knobs for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub nmc: usize,
    pub estimate_noise: bool,
    pub noise_mc: usize,
    pub parallel: bool,
}

impl RunOptions {
    pub fn new(nmc: usize) -> Self {
        Self {
            nmc,
            estimate_noise: false,
            noise_mc: DEFAULT_NOISE_MC,
            parallel: true,
        }
    }
}

impl From<&RunConfig> for RunOptions {
    fn from(cfg: &RunConfig) -> Self {
        Self {
            nmc: cfg.nmc,
            estimate_noise: cfg.estimate_noise,
            noise_mc: cfg.noise_mc,
            parallel: cfg.parallel,
        }
    }
}

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub masks: usize,
    pub fitting_schemes: usize,
    pub spectra_written: usize,
    pub pairs_computed: usize,
    pub noise_sets_written: usize,
    /// Components skipped for noise estimation because they have no noise model.
    pub noise_skipped: usize,
    /// Every dataset written, in write order.
    pub datasets: Vec<String>,
}

/// Inputs of one (mask, fitting scheme, component) step.
struct ComponentStep<'a> {
    key: SpectraKey<'a>,
    mask: &'a AnalysisMask,
    component: &'a Component,
}

/// Drives pairing, estimation and storage for every mask, scheme and component.
pub struct SpectraPipeline<'a, E: SpectrumEngine + ?Sized> {
    engine: &'a E,
    masking: &'a dyn MaskingProvider,
    model: &'a ModelConfig,
    ensemble: &'a dyn EnsembleSource,
    store: &'a dyn ArrayStore,
    options: RunOptions,
}

impl<'a, E: SpectrumEngine + ?Sized> SpectraPipeline<'a, E> {
    pub fn new(
        engine: &'a E,
        masking: &'a dyn MaskingProvider,
        model: &'a ModelConfig,
        ensemble: &'a dyn EnsembleSource,
        store: &'a dyn ArrayStore,
        options: RunOptions,
    ) -> Self {
        Self {
            engine,
            masking,
            model,
            ensemble,
            store,
            options,
        }
    }

    /// Run every (mask, fitting scheme, component) step.
    ///
    /// Any error aborts the run. Steps already committed stay in the store;
    /// the failing step leaves nothing behind.
    pub fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<RunSummary> {
        let pairs = RealizationPairs::new(self.options.nmc)?;
        if self.options.estimate_noise && self.options.noise_mc == 0 {
            return Err(SpectraError::config("noise_mc must be positive"));
        }
        let schemes = self.masking.fitting_schemes();
        if schemes.is_empty() {
            return Err(SpectraError::config("no fitting schemes to process"));
        }
        let masks = self.masking.powerspectrum_tools()?;
        let provenance = self.masking.provenance();

        let mut summary = RunSummary {
            masks: masks.len(),
            fitting_schemes: schemes.len(),
            ..Default::default()
        };

        for mask in &masks {
            // Bandpower windows are saved with the spectra for comparison with theory.
            let windows = mask.coupling.bandpower_windows();
            info!("Working on power spectra for mask: {}", mask.name);

            for scheme in &schemes {
                info!("Working on fitting scheme: {}", scheme.name);
                let key = SpectraKey::new(&self.model.identifier, &scheme.name, &mask.name);
                self.prepare_group(&key, &provenance, &windows, &mask.beam, &mut summary)?;

                for component in &self.model.components {
                    let step = ComponentStep {
                        key,
                        mask,
                        component,
                    };
                    self.process_component(&step, &pairs, rng, &mut summary)?;
                }
            }
        }
        Ok(summary)
    }

    fn put(&self, path: String, data: &ArrayD<f64>, summary: &mut RunSummary) -> Result<()> {
        self.store.put(&path, data)?;
        summary.datasets.push(path);
        Ok(())
    }

    fn prepare_group(
        &self,
        key: &SpectraKey<'_>,
        provenance: &str,
        windows: &ArrayD<f64>,
        beam: &Array1<f64>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let group = key.group_path();
        self.store.require_group(&group)?;
        let mut attrs = Attrs::new();
        attrs.insert(CONFIG_ATTR.to_string(), provenance.to_string());
        self.store.set_attrs(&group, &attrs)?;
        self.put(key.artifact_path(Artifact::BandpowerWindow), windows, summary)?;
        self.put(
            key.artifact_path(Artifact::Beam),
            &beam.clone().into_dyn(),
            summary,
        )
    }

    fn process_component<R: Rng + ?Sized>(
        &self,
        step: &ComponentStep<'_>,
        pairs: &RealizationPairs,
        rng: &mut R,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let name = step.component.name.as_str();
        info!("Working on component: {name}");

        // Spectra are committed before noise estimation starts.
        let spectra = self.accumulate(step, pairs)?.into_dyn();
        let path = step.key.artifact_path(Artifact::Spectrum(name));
        info!("Saving in {path}");
        self.put(path, &spectra, summary)?;
        summary.spectra_written += 1;
        summary.pairs_computed += pairs.len();

        if !self.options.estimate_noise {
            return Ok(());
        }
        let stats = match step.component.noise {
            NoiseModel::Absent => {
                debug!("component {name} has no noise model; skipping noise bias");
                summary.noise_skipped += 1;
                return Ok(());
            }
            NoiseModel::Present => self.noise_bias(step, rng)?,
        };
        self.put(
            step.key.artifact_path(Artifact::NoiseMean(name)),
            &stats.mean.into_dyn(),
            summary,
        )?;
        self.put(
            step.key.artifact_path(Artifact::NoiseCov(name)),
            &stats.covariance.into_dyn(),
            summary,
        )?;
        summary.noise_sets_written += 1;
        Ok(())
    }

    /// Stack the bandpowers of every realization pair.
    fn accumulate(&self, step: &ComponentStep<'_>, pairs: &RealizationPairs) -> Result<Array3<f64>> {
        let engine = self.engine;
        let ensemble = self.ensemble;
        let mask = step.mask;
        let scheme = step.key.fitting_scheme;
        let component = step.component.name.as_str();

        let compute = |pair: RealizationPair| -> Result<Bandpowers> {
            info!(
                "Working on Monte Carlo realizations: {}, {}",
                pair.first, pair.second
            );
            let map_a = ensemble.read_amplitude(scheme, component, pair.first)?;
            let map_b = ensemble.read_amplitude(scheme, component, pair.second)?;
            estimate(
                engine,
                map_a.view(),
                map_b.view(),
                mask.weights.view(),
                mask.coupling.as_ref(),
            )
        };

        let rows: Vec<Bandpowers> = if self.options.parallel {
            pairs
                .iter()
                .collect::<Vec<_>>()
                .into_par_iter()
                .map(compute)
                .collect::<Result<_>>()?
        } else {
            pairs.iter().map(compute).collect::<Result<_>>()?
        };

        let mut spectra = Array3::zeros((pairs.len(), N_SPECTRA, mask.n_bands));
        for (k, bandpowers) in rows.iter().enumerate() {
            spectra.index_axis_mut(Axis(0), k).assign(bandpowers);
        }
        Ok(spectra)
    }

    fn noise_bias<R: Rng + ?Sized>(
        &self,
        step: &ComponentStep<'_>,
        rng: &mut R,
    ) -> Result<NoiseBiasStatistics> {
        let name = step.component.name.as_str();
        let variance = self
            .ensemble
            .read_noise_variance(step.key.fitting_scheme, name)?;
        info!(
            "Estimating noise bias for {name} from {} realization pairs",
            self.options.noise_mc
        );
        let ensemble = noise_bias_ensemble(
            self.engine,
            variance.view(),
            step.mask.weights.view(),
            step.mask.coupling.as_ref(),
            self.options.noise_mc,
            rng,
        )?;
        mean_cov_rows(ensemble.view())
    }
}
