pub mod inspect;
pub mod run;

use mcspectra_core::{MaskingConfig, SpectraError};

/// Bin count shared by every configured mask.
///
/// The binned engine produces one mode per band, so all masks of a run must
/// agree on it.
pub fn common_bins(masking: &MaskingConfig) -> mcspectra_core::Result<usize> {
    let mut bins = masking.masks.iter().map(|m| (m.name.as_str(), m.bins));
    let Some((_, first)) = bins.next() else {
        return Err(SpectraError::Configuration("no masks configured".into()));
    };
    for (name, n) in bins {
        if n != first {
            return Err(SpectraError::Configuration(format!(
                "mask '{name}' has {n} bins but the first mask has {first}; \
                 the binned engine needs one bin count per run"
            )));
        }
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_bins() {
        let cfg = MaskingConfig::from_json(
            r#"{"fitting_schemes": [{"name": "f"}],
                "masks": [{"name": "a", "weights": [1, 1], "bins": 2},
                          {"name": "b", "weights": [1, 1], "bins": 2}]}"#,
        )
        .unwrap();
        assert_eq!(common_bins(&cfg).unwrap(), 2);
    }

    #[test]
    fn test_mixed_bins_rejected() {
        let cfg = MaskingConfig::from_json(
            r#"{"fitting_schemes": [{"name": "f"}],
                "masks": [{"name": "a", "weights": [1, 1], "bins": 2},
                          {"name": "b", "weights": [1, 1], "bins": 1}]}"#,
        )
        .unwrap();
        assert!(common_bins(&cfg).is_err());
    }
}
