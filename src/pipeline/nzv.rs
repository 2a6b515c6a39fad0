//! Near-zero-variance detection
//!
//! Per-column frequency ratio and unique-value percentage. A column is
//! flagged only when it is both heavily unbalanced and low-granularity.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::matrix::Matrix;

/// Default frequency-ratio cutoff (95/5)
pub const DEFAULT_FREQ_CUT: f64 = 95.0 / 5.0;

/// Default unique-value percentage cutoff
pub const DEFAULT_UNIQUE_CUT: f64 = 10.0;

/// Cutoffs used to flag near-zero-variance columns
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NzvThresholds {
    /// Flag when most-common / second-most-common count exceeds this
    pub freq_cut: f64,
    /// Flag when 100 * distinct / rows is below this
    pub unique_cut: f64,
}

impl Default for NzvThresholds {
    fn default() -> Self {
        Self {
            freq_cut: DEFAULT_FREQ_CUT,
            unique_cut: DEFAULT_UNIQUE_CUT,
        }
    }
}

/// Per-column distribution metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStat {
    pub name: String,
    /// `None` when the column has fewer than two distinct values
    pub freq_ratio: Option<f64>,
    pub percent_unique: f64,
    pub zero_var: bool,
    pub nzv: bool,
}

/// Result of near-zero-variance detection
#[derive(Debug, Clone, Serialize)]
pub struct NzvReport {
    /// Flagged column positions, ascending
    pub flags: Vec<usize>,
    /// One record per column, in column order
    pub metrics: Vec<ColumnStat>,
}

impl NzvReport {
    /// Positions of columns with fewer than two distinct values
    pub fn zero_variance(&self) -> Vec<usize> {
        self.metrics
            .iter()
            .enumerate()
            .filter(|(_, m)| m.zero_var)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn flagged_names(&self) -> Vec<String> {
        self.flags
            .iter()
            .map(|&i| self.metrics[i].name.clone())
            .collect()
    }
}

/// Compute metrics for every column and flag the near-zero-variance ones.
pub fn detect_nzv(matrix: &Matrix, thresholds: &NzvThresholds) -> NzvReport {
    let nrows = matrix.nrows();

    let metrics: Vec<ColumnStat> = (0..matrix.ncols())
        .into_par_iter()
        .map(|j| {
            let values = matrix.column(j);
            column_stat(&matrix.names()[j], &values, nrows, thresholds)
        })
        .collect();

    let flags = metrics
        .iter()
        .enumerate()
        .filter(|(_, m)| m.nzv)
        .map(|(i, _)| i)
        .collect();

    NzvReport { flags, metrics }
}

/// Positions of columns with fewer than two distinct non-missing values.
pub fn zero_variance_columns(matrix: &Matrix) -> Vec<usize> {
    (0..matrix.ncols())
        .into_par_iter()
        .filter(|&j| distinct_count(&matrix.column(j)) < 2)
        .collect()
}

fn column_stat(name: &str, values: &[f64], nrows: usize, thresholds: &NzvThresholds) -> ColumnStat {
    let counts = value_counts(values);

    let mut top = 0usize;
    let mut second = 0usize;
    for &c in counts.values() {
        if c > top {
            second = top;
            top = c;
        } else if c > second {
            second = c;
        }
    }

    let distinct = counts.len();
    let freq_ratio = if distinct >= 2 {
        Some(top as f64 / second as f64)
    } else {
        None
    };
    let percent_unique = if nrows > 0 {
        100.0 * distinct as f64 / nrows as f64
    } else {
        0.0
    };

    // An undefined ratio behaves as infinite
    let ratio_exceeds = freq_ratio.map_or(true, |r| r > thresholds.freq_cut);
    let nzv = ratio_exceeds && percent_unique < thresholds.unique_cut;

    ColumnStat {
        name: name.to_string(),
        freq_ratio,
        percent_unique,
        zero_var: distinct < 2,
        nzv,
    }
}

fn value_counts(values: &[f64]) -> HashMap<u64, usize> {
    let mut counts = HashMap::new();
    for &v in values.iter().filter(|v| !v.is_nan()) {
        // -0.0 and 0.0 are the same value
        let key = if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() };
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

pub(crate) fn distinct_count(values: &[f64]) -> usize {
    value_counts(values).len()
}
