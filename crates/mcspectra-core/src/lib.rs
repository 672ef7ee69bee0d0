//! # mcspectra-core
//!
//! **Cross-spectra, noise bias and covariance from Monte Carlo sky-map ensembles.**
//!
//! `mcspectra-core` takes the amplitude-map realizations produced by a
//! component-separation fit and turns them into bandpower spectra for every
//! analysis mask, fitting scheme and sky component, plus a simulated
//! noise-bias distribution for components that carry a noise model.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mcspectra_core::{
//!     BinnedEngine, DirStore, MaskingConfig, ModelConfig, RunConfig, RunOptions,
//!     SpectraPipeline, StoreEnsemble,
//! };
//! use std::path::Path;
//!
//! let run = RunConfig::load(Path::new("data.json"))?;
//! let model = ModelConfig::load(Path::new("model.json"))?;
//! let masking = MaskingConfig::load(Path::new("masks.json"))?;
//!
//! let store = DirStore::open(&run.store_path)?;
//! let ensemble = StoreEnsemble::new(&store, model.identifier.clone());
//! let engine = BinnedEngine::new(8)?;
//!
//! let pipeline = SpectraPipeline::new(
//!     &engine, &masking, &model, &ensemble, &store, RunOptions::from(&run),
//! );
//! let summary = pipeline.run(&mut run.rng())?;
//! println!("{} spectra written", summary.spectra_written);
//! # Ok::<(), mcspectra_core::SpectraError>(())
//! ```
//!
//! ## Architecture
//!
//! Masks × fitting schemes × components → realization pairs → cross-spectra
//! → stacked `(nmc/2, 4, n_bands)` array → store
//!
//! Realizations are paired `(0, 1), (2, 3), ...` so every spectrum is a cross
//! between independent draws and carries no noise auto-correlation. The
//! harmonic transform sits behind [`SpectrumEngine`] and [`CouplingOperator`];
//! [`BinnedEngine`] is a pixel-domain backend that needs no external library.
//!
//! Storage layout:
//!
//! ```text
//! <model>/<scheme>/spectra/<mask>/{bpw_window_function, beam, <c>, <c>_cln_mean, <c>_cln_cov}
//! ```

pub mod binned;
pub mod config;
pub mod covariance;
pub mod ensemble;
pub mod error;
pub mod keys;
pub mod masking;
pub mod model;
pub mod noise;
pub mod pairing;
pub mod pipeline;
pub mod spectrum;
pub mod store;

pub use binned::{BinnedEngine, BinnedField, DiagonalCoupling};
pub use config::RunConfig;
pub use covariance::{NoiseBiasStatistics, mean_cov, mean_cov_rows};
pub use ensemble::{EnsembleSource, StoreEnsemble};
pub use error::{Result, SpectraError};
pub use keys::{AmplitudeKey, Artifact, SpectraKey};
pub use masking::{AnalysisMask, FittingScheme, MaskEntry, MaskingConfig, MaskingProvider};
pub use model::{Component, ModelConfig, NoiseModel};
pub use noise::{DEFAULT_NOISE_MC, NoiseVarianceMap, draw_noise, noise_bias_ensemble};
pub use pairing::{RealizationPair, RealizationPairs};
pub use pipeline::{RunOptions, RunSummary, SpectraPipeline};
pub use spectrum::{
    Bandpowers, CoupledSpectrum, CouplingOperator, N_SPECTRA, NOISE_SPECTRUM_INDEX,
    SpectralType, SpectrumEngine, estimate,
};
pub use store::{ArrayStore, Attrs, DirStore, MemoryStore, StoreError};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
