//! Correlation matrix and greedy correlation-based column pruning

use faer::Mat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::matrix::Matrix;
use crate::error::{PrepError, Result};

/// How rows with missing values enter the correlation computation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingPolicy {
    /// Each pair uses every row where both columns are present
    #[default]
    Pairwise,
    /// Only rows complete across all columns are used
    Listwise,
}

impl std::fmt::Display for MissingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingPolicy::Pairwise => write!(f, "pairwise"),
            MissingPolicy::Listwise => write!(f, "listwise"),
        }
    }
}

/// Symmetric Pearson correlation matrix.
///
/// Off-diagonal entries involving a constant column are `NaN` and are
/// never selected for pruning.
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    names: Vec<String>,
    values: Mat<f64>,
}

impl CorrelationMatrix {
    /// Build from explicit values. The matrix must be square and symmetric.
    pub fn from_rows<S: AsRef<str>>(names: &[S], rows: &[Vec<f64>]) -> Result<Self> {
        let p = names.len();
        if rows.len() != p || rows.iter().any(|r| r.len() != p) {
            return Err(PrepError::DimensionMismatch {
                expected: p,
                actual: rows.len(),
            });
        }
        for i in 0..p {
            for j in (i + 1)..p {
                let (a, b) = (rows[i][j], rows[j][i]);
                let both_nan = a.is_nan() && b.is_nan();
                if !both_nan && (a - b).abs() > 1e-12 {
                    return Err(PrepError::InvalidMatrix(format!(
                        "correlation matrix is not symmetric at ({}, {})",
                        i, j
                    )));
                }
            }
        }
        Ok(Self {
            names: names.iter().map(|s| s.as_ref().to_string()).collect(),
            values: Mat::from_fn(p, p, |i, j| rows[i][j]),
        })
    }

    pub fn size(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[(i, j)]
    }
}

/// Compute the Pearson correlation matrix of all columns.
pub fn correlation_matrix(matrix: &Matrix, policy: MissingPolicy) -> CorrelationMatrix {
    let p = matrix.ncols();
    let names = matrix.names().to_vec();

    if p == 0 {
        return CorrelationMatrix {
            names,
            values: Mat::zeros(0, 0),
        };
    }

    let values = match policy {
        MissingPolicy::Listwise => {
            let complete = matrix.select_rows(&matrix.complete_rows());
            correlation_matrix_fast(&complete)
        }
        MissingPolicy::Pairwise if !matrix.has_missing() => correlation_matrix_fast(matrix),
        MissingPolicy::Pairwise => correlation_matrix_pairwise(matrix),
    };

    CorrelationMatrix { names, values }
}

/// Pairwise computation for matrices with missing entries.
fn correlation_matrix_pairwise(matrix: &Matrix) -> Mat<f64> {
    let p = matrix.ncols();
    let columns: Vec<Vec<f64>> = (0..p).map(|j| matrix.column(j)).collect();

    let pairs: Vec<(usize, usize)> = (0..p)
        .flat_map(|i| ((i + 1)..p).map(move |j| (i, j)))
        .collect();

    let correlations: Vec<f64> = pairs
        .par_iter()
        .map(|&(i, j)| pearson(&columns[i], &columns[j]).unwrap_or(f64::NAN))
        .collect();

    let mut values = Mat::<f64>::zeros(p, p);
    for (&(i, j), &r) in pairs.iter().zip(correlations.iter()) {
        values[(i, j)] = r;
        values[(j, i)] = r;
    }
    for i in 0..p {
        values[(i, i)] = 1.0;
    }
    values
}

/// Matrix-based computation for complete data.
///
/// Standardizes each column, then R = Z^T * Z. Constant columns produce `NaN`
/// rows and columns (the diagonal stays 1).
fn correlation_matrix_fast(matrix: &Matrix) -> Mat<f64> {
    let n = matrix.nrows();
    let p = matrix.ncols();

    let standardized: Vec<Option<Vec<f64>>> = (0..p)
        .into_par_iter()
        .map(|j| {
            let col = matrix.column(j);
            if n < 2 {
                return None;
            }
            let mean = col.iter().sum::<f64>() / n as f64;
            let ss: f64 = col.iter().map(|x| (x - mean) * (x - mean)).sum();
            if ss <= 0.0 {
                return None;
            }
            let norm = ss.sqrt();
            Some(col.iter().map(|x| (x - mean) / norm).collect())
        })
        .collect();

    let z = Mat::from_fn(n, p, |i, j| match &standardized[j] {
        Some(col) => col[i],
        None => 0.0,
    });
    let gram = z.transpose() * &z;

    let mut values = Mat::<f64>::zeros(p, p);
    for i in 0..p {
        for j in 0..p {
            values[(i, j)] = if i == j {
                1.0
            } else if standardized[i].is_none() || standardized[j].is_none() {
                f64::NAN
            } else {
                gram[(i, j)].clamp(-1.0, 1.0)
            };
        }
    }
    values
}

/// Pearson correlation of two columns over rows where both are present.
///
/// Single-pass Welford update for numerical stability. Returns `None` with
/// fewer than two paired observations or a constant column.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() {
        return None;
    }

    let mut n = 0.0;
    let mut mean_x = 0.0;
    let mut mean_y = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    let mut cov_xy = 0.0;

    for (&a, &b) in x.iter().zip(y.iter()) {
        if a.is_nan() || b.is_nan() {
            continue;
        }
        n += 1.0;
        let dx = a - mean_x;
        let dy = b - mean_y;
        mean_x += dx / n;
        mean_y += dy / n;
        var_x += dx * (a - mean_x);
        var_y += dy * (b - mean_y);
        cov_xy += dx * (b - mean_y);
    }

    if n < 2.0 || var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }

    Some((cov_xy / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Greedy correlation pruning.
///
/// Repeatedly takes the remaining pair with the largest absolute correlation
/// above `cutoff`, and removes whichever of the two has the higher mean
/// absolute correlation with the other remaining columns (ties remove the
/// larger index). Indices are returned in the order they were selected, so
/// any prefix of the list is itself a valid intermediate removal.
pub fn find_correlated(corr: &CorrelationMatrix, cutoff: f64) -> Vec<usize> {
    let p = corr.size();
    let mut active = vec![true; p];
    let mut removed = Vec::new();

    loop {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in (0..p).filter(|&i| active[i]) {
            for j in ((i + 1)..p).filter(|&j| active[j]) {
                let r = corr.get(i, j).abs();
                if r.is_nan() || r <= cutoff {
                    continue;
                }
                if best.map_or(true, |(_, _, b)| r > b) {
                    best = Some((i, j, r));
                }
            }
        }

        let Some((i, j, r)) = best else {
            break;
        };

        let mean_i = mean_abs_correlation(corr, i, &active);
        let mean_j = mean_abs_correlation(corr, j, &active);
        let drop = if mean_i > mean_j { i } else { j };

        tracing::debug!(
            first = %corr.names()[i],
            second = %corr.names()[j],
            correlation = r,
            dropped = %corr.names()[drop],
            "correlation pruning step"
        );

        active[drop] = false;
        removed.push(drop);
    }

    removed
}

/// Same as [`find_correlated`], returning column names.
pub fn find_correlated_names(corr: &CorrelationMatrix, cutoff: f64) -> Vec<String> {
    find_correlated(corr, cutoff)
        .into_iter()
        .map(|i| corr.names()[i].clone())
        .collect()
}

fn mean_abs_correlation(corr: &CorrelationMatrix, col: usize, active: &[bool]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for k in (0..corr.size()).filter(|&k| k != col && active[k]) {
        let r = corr.get(col, k);
        if !r.is_nan() {
            sum += r.abs();
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
