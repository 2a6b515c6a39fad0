//! Fit options for the preprocessing pipeline

use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};
use crate::pipeline::correlation::MissingPolicy;
use crate::pipeline::nzv::{NzvThresholds, DEFAULT_FREQ_CUT, DEFAULT_UNIQUE_CUT};

/// Options controlling estimation. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessOptions {
    /// Frequency-ratio cutoff for `nzv`
    pub freq_cut: f64,
    /// Unique-percentage cutoff for `nzv`
    pub unique_cut: f64,
    /// Absolute correlation cutoff for `corr`
    pub corr_cutoff: f64,
    pub corr_missing: MissingPolicy,
    /// Cumulative variance share kept by `pca`
    pub thresh: f64,
    /// Fixed component count for `pca`, overrides `thresh`
    pub pca_comp: Option<usize>,
    /// Component count for `ica`, defaults to the `thresh` component count
    pub ica_comp: Option<usize>,
    pub ica_max_iter: usize,
    pub ica_tol: f64,
    /// Neighbours used by `knnImpute`
    pub k: usize,
    pub bag_trees: usize,
    pub bag_max_depth: usize,
    pub bag_min_node: usize,
    /// Target interval for `range`
    pub range_bounds: (f64, f64),
    /// Power estimates within this distance of 0 or 1 snap to log / identity
    pub fudge: f64,
    /// Minimum distinct values before a power transform is estimated
    pub num_unique: usize,
    /// Seed for bootstrap sampling and the ICA starting point
    pub seed: u64,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            freq_cut: DEFAULT_FREQ_CUT,
            unique_cut: DEFAULT_UNIQUE_CUT,
            corr_cutoff: 0.9,
            corr_missing: MissingPolicy::Pairwise,
            thresh: 0.95,
            pca_comp: None,
            ica_comp: None,
            ica_max_iter: 200,
            ica_tol: 1e-4,
            k: 5,
            bag_trees: 25,
            bag_max_depth: 10,
            bag_min_node: 5,
            range_bounds: (0.0, 1.0),
            fudge: 0.2,
            num_unique: 3,
            seed: 42,
        }
    }
}

impl PreprocessOptions {
    pub fn nzv_thresholds(&self) -> NzvThresholds {
        NzvThresholds {
            freq_cut: self.freq_cut,
            unique_cut: self.unique_cut,
        }
    }

    /// Reject out-of-range values before any estimation starts.
    pub fn validate(&self) -> Result<()> {
        if !(self.freq_cut >= 1.0) {
            return invalid(format!("freq_cut must be >= 1, got {}", self.freq_cut));
        }
        if !(0.0..=100.0).contains(&self.unique_cut) {
            return invalid(format!(
                "unique_cut must be between 0 and 100, got {}",
                self.unique_cut
            ));
        }
        if !(0.0..=1.0).contains(&self.corr_cutoff) {
            return invalid(format!(
                "corr_cutoff must be between 0 and 1, got {}",
                self.corr_cutoff
            ));
        }
        if !(self.thresh > 0.0 && self.thresh <= 1.0) {
            return invalid(format!("thresh must be in (0, 1], got {}", self.thresh));
        }
        if self.pca_comp == Some(0) || self.ica_comp == Some(0) {
            return invalid("component counts must be at least 1".to_string());
        }
        if self.k == 0 {
            return invalid("k must be at least 1".to_string());
        }
        if self.bag_trees == 0 || self.bag_min_node == 0 {
            return invalid("bag_trees and bag_min_node must be at least 1".to_string());
        }
        if self.ica_max_iter == 0 || !(self.ica_tol > 0.0) {
            return invalid("ica_max_iter and ica_tol must be positive".to_string());
        }
        let (lo, hi) = self.range_bounds;
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return invalid(format!("range_bounds must satisfy lo < hi, got ({lo}, {hi})"));
        }
        if !(0.0..0.5).contains(&self.fudge) {
            return invalid(format!("fudge must be in [0, 0.5), got {}", self.fudge));
        }
        Ok(())
    }
}

fn invalid(message: String) -> Result<()> {
    Err(PrepError::InvalidOption(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(PreprocessOptions::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_thresh() {
        let opts = PreprocessOptions {
            thresh: 1.5,
            ..Default::default()
        };
        assert!(matches!(opts.validate(), Err(PrepError::InvalidOption(_))));
    }

    #[test]
    fn test_rejects_inverted_range() {
        let opts = PreprocessOptions {
            range_bounds: (1.0, 0.0),
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let opts: PreprocessOptions = serde_json::from_str(r#"{"k": 3}"#).unwrap();
        assert_eq!(opts.k, 3);
        assert_eq!(opts.thresh, 0.95);
    }
}
