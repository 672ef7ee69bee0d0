//! Error taxonomy for spectrum estimation runs.
//!
//! Every failure here is a configuration or data fault rather than a transient
//! one, so nothing is retried: errors propagate to the caller and end the run.

use crate::store::StoreError;

/// Errors raised by the pairing, estimation and accumulation stages.
#[derive(Debug, thiserror::Error)]
pub enum SpectraError {
    /// Malformed or inconsistent run parameters (odd `nmc`, empty component list, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Map, mask or operator dimensions disagree.
    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A vector in a covariance ensemble has the wrong length.
    #[error("dimension mismatch: ensemble member {index} has length {actual}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// Covariance requested over zero samples.
    #[error("cannot estimate mean/covariance of an empty ensemble")]
    EmptyEnsemble,

    /// The ensemble source does not hold the requested realization.
    #[error("realization {index} of {component} ({fitting_scheme}) is missing; ensemble holds {available}")]
    MissingRealization {
        fitting_scheme: String,
        component: String,
        index: usize,
        available: usize,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpectraError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn shape(context: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SpectraError>;
