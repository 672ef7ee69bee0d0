//! Monte Carlo realization pairing.
//!
//! Realizations are correlated in disjoint consecutive pairs `(2k, 2k+1)`.
//! The two members of a pair are independent draws of the same signal+noise
//! process, so their cross-spectrum carries no auto-correlated noise bias.

use crate::error::{Result, SpectraError};

/// One pair of realization indices and its row in the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RealizationPair {
    /// Row index `k` in the stacked spectra.
    pub index: usize,
    /// Realization `2k`.
    pub first: usize,
    /// Realization `2k + 1`.
    pub second: usize,
}

/// Restartable pairing plan over `nmc` realizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealizationPairs {
    nmc: usize,
}

impl RealizationPairs {
    /// Plan pairs for `nmc` realizations. `nmc` must be even and positive.
    pub fn new(nmc: usize) -> Result<Self> {
        if nmc == 0 {
            return Err(SpectraError::config(
                "number of Monte Carlo realizations must be positive",
            ));
        }
        if nmc % 2 != 0 {
            return Err(SpectraError::config(format!(
                "number of Monte Carlo realizations must be even to pair them, got {nmc}"
            )));
        }
        Ok(Self { nmc })
    }

    pub fn nmc(&self) -> usize {
        self.nmc
    }

    /// Number of pairs, `nmc / 2`.
    pub fn len(&self) -> usize {
        self.nmc / 2
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pairs in increasing order. Each call starts over.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = RealizationPair> + Clone + '_ {
        (0..self.len()).map(|k| RealizationPair {
            index: k,
            first: 2 * k,
            second: 2 * k + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_cover_every_index_once() {
        for nmc in (2..=40).step_by(2) {
            let pairs = RealizationPairs::new(nmc).unwrap();
            assert_eq!(pairs.len(), nmc / 2);
            let flat: Vec<usize> = pairs.iter().flat_map(|p| [p.first, p.second]).collect();
            assert_eq!(flat, (0..nmc).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_pairs_are_consecutive_and_indexed() {
        let pairs = RealizationPairs::new(6).unwrap();
        let got: Vec<_> = pairs.iter().map(|p| (p.index, p.first, p.second)).collect();
        assert_eq!(got, vec![(0, 0, 1), (1, 2, 3), (2, 4, 5)]);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let pairs = RealizationPairs::new(4).unwrap();
        let a: Vec<_> = pairs.iter().collect();
        let b: Vec<_> = pairs.iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_odd_nmc_rejected() {
        for nmc in [1, 3, 7, 101] {
            assert!(matches!(
                RealizationPairs::new(nmc),
                Err(SpectraError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_zero_nmc_rejected() {
        assert!(matches!(
            RealizationPairs::new(0),
            Err(SpectraError::Configuration(_))
        ));
    }
}
