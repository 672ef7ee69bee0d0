//! Run-level configuration (the "data" file).
//!
//! ```json
//! {"identifier": "sim_v3", "monte_carlo": 100, "hdf5_path": "out/store"}
//! ```
//!
//! `hdf5_path` keeps its historical key but names the root of the store.

use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectraError};
use crate::noise::DEFAULT_NOISE_MC;
use crate::pairing::RealizationPairs;

fn default_noise_mc() -> usize {
    DEFAULT_NOISE_MC
}

fn default_parallel() -> bool {
    true
}

/// Parameters of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Dataset identifier, used for logging.
    pub identifier: String,
    /// Total realization count `nmc`; must be even.
    #[serde(rename = "monte_carlo")]
    pub nmc: usize,
    /// Root of the persistent store.
    #[serde(rename = "hdf5_path")]
    pub store_path: PathBuf,
    #[serde(default)]
    pub estimate_noise: bool,
    #[serde(default = "default_noise_mc")]
    pub noise_mc: usize,
    /// Seed for noise draws; OS entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Compute realization pairs on the rayon pool.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

impl RunConfig {
    pub fn new(identifier: impl Into<String>, nmc: usize, store_path: impl Into<PathBuf>) -> Self {
        Self {
            identifier: identifier.into(),
            nmc,
            store_path: store_path.into(),
            estimate_noise: false,
            noise_mc: DEFAULT_NOISE_MC,
            seed: None,
            parallel: true,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(raw)
            .map_err(|e| SpectraError::config(format!("invalid data configuration: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        RealizationPairs::new(self.nmc)?;
        if self.noise_mc == 0 {
            return Err(SpectraError::config("noise_mc must be positive"));
        }
        Ok(())
    }

    /// Random source for noise draws.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}
