//! Linear dependency detection
//!
//! Householder QR with limited pivoting: columns are reduced in their
//! original order and a column whose residual vanishes under the reflections
//! of the earlier independent columns is set aside as dependent. Each
//! dependent column is then expressed in the independent basis through the
//! triangular factor, which gives the minimal set of columns it is built from.

use serde::{Deserialize, Serialize};

use super::matrix::Matrix;
use crate::error::{PrepError, Result};

/// Default relative residual tolerance
pub const DEFAULT_RELATIVE_TOLERANCE: f64 = 1e-7;

/// Default cutoff on a participant's relative contribution
pub const DEFAULT_COEFFICIENT_TOLERANCE: f64 = 1e-6;

/// Default maximum column count for the decomposition
pub const DEFAULT_MAX_COLUMNS: usize = 5000;

/// Numeric tolerances for rank detection.
///
/// A column `x_j` is dependent when its residual norm is at most
/// `max(relative * ||x_j||, f64::EPSILON * max(n, p) * ||X||_F)`, so the
/// cutoff follows the magnitude of both the column and the whole matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankTolerance {
    pub relative: f64,
    /// Participants with `|b_i| * ||x_i|| <= coefficient * ||x_dep||` are dropped
    pub coefficient: f64,
    pub max_columns: usize,
}

impl Default for RankTolerance {
    fn default() -> Self {
        Self {
            relative: DEFAULT_RELATIVE_TOLERANCE,
            coefficient: DEFAULT_COEFFICIENT_TOLERANCE,
            max_columns: DEFAULT_MAX_COLUMNS,
        }
    }
}

/// Dependency groups and the columns to remove to restore full column rank
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearComboReport {
    /// Each group: the dependent column first, then the earlier independent
    /// columns it is a combination of (ascending)
    pub groups: Vec<Vec<usize>>,
    /// Columns to remove, in the order they were resolved
    pub remove: Vec<usize>,
}

impl LinearComboReport {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn remove_names(&self, matrix: &Matrix) -> Vec<String> {
        self.remove
            .iter()
            .map(|&i| matrix.names()[i].clone())
            .collect()
    }
}

/// Find linear combinations among the columns of `matrix`.
///
/// Dependent columns are removed and the remainder re-analyzed until it has
/// full column rank. A full-rank matrix yields an empty report.
pub fn find_linear_combos(matrix: &Matrix, tolerance: &RankTolerance) -> Result<LinearComboReport> {
    let (n, p) = (matrix.nrows(), matrix.ncols());
    if n == 0 || p == 0 {
        return Err(PrepError::InsufficientRank { rows: n, cols: p });
    }
    if p > tolerance.max_columns {
        return Err(PrepError::ColumnLimitExceeded {
            cols: p,
            max: tolerance.max_columns,
        });
    }
    if matrix.has_missing() {
        return Err(PrepError::InvalidMatrix(
            "linear combination search requires complete data".to_string(),
        ));
    }

    let columns: Vec<Vec<f64>> = (0..p).map(|j| matrix.column(j)).collect();
    let mut remaining: Vec<usize> = (0..p).collect();

    let groups = enumerate_combos(&columns, &remaining, tolerance);
    let mut remove: Vec<usize> = Vec::new();
    let mut current = groups.clone();

    while !current.is_empty() {
        for group in &current {
            if !remove.contains(&group[0]) {
                remove.push(group[0]);
            }
        }
        remaining.retain(|j| !remove.contains(j));
        if remaining.is_empty() {
            break;
        }
        current = enumerate_combos(&columns, &remaining, tolerance);
    }

    tracing::debug!(
        groups = groups.len(),
        removed = remove.len(),
        "linear combination search finished"
    );

    Ok(LinearComboReport { groups, remove })
}

/// One pass of the decomposition over the `active` columns. Returned groups
/// use indices into `columns`.
fn enumerate_combos(
    columns: &[Vec<f64>],
    active: &[usize],
    tolerance: &RankTolerance,
) -> Vec<Vec<usize>> {
    let n = columns[active[0]].len();
    let mut work: Vec<Vec<f64>> = active.iter().map(|&j| columns[j].clone()).collect();
    let norms: Vec<f64> = work.iter().map(|c| norm(c)).collect();
    let frobenius = norms.iter().map(|v| v * v).sum::<f64>().sqrt();
    let floor = f64::EPSILON * n.max(active.len()) as f64 * frobenius;

    // Position in `work` of each pivot column, and its R column (rows 0..=k)
    let mut basis: Vec<usize> = Vec::new();
    let mut r_columns: Vec<Vec<f64>> = Vec::new();
    let mut groups = Vec::new();

    for j in 0..work.len() {
        let k = basis.len();
        let residual = if k < n { norm(&work[j][k..]) } else { 0.0 };
        let threshold = (tolerance.relative * norms[j]).max(floor);

        if residual <= threshold {
            let top = &work[j][..k];
            let coefficients = back_substitute(&r_columns, top);
            let mut group = vec![active[j]];
            for (b_idx, &coef) in coefficients.iter().enumerate() {
                let contribution = coef.abs() * norms[basis[b_idx]];
                if contribution > tolerance.coefficient * norms[j] {
                    group.push(active[basis[b_idx]]);
                }
            }
            group[1..].sort_unstable();
            groups.push(group);
            continue;
        }

        // Householder reflection zeroing rows k+1.. of column j
        let alpha = if work[j][k] >= 0.0 { -residual } else { residual };
        let mut v: Vec<f64> = work[j][k..].to_vec();
        v[0] -= alpha;
        let v_norm_sq: f64 = v.iter().map(|x| x * x).sum();

        if v_norm_sq > 0.0 {
            for col in work.iter_mut().skip(j) {
                let dot: f64 = v.iter().zip(&col[k..]).map(|(a, b)| a * b).sum();
                let factor = 2.0 * dot / v_norm_sq;
                for (entry, vi) in col[k..].iter_mut().zip(&v) {
                    *entry -= factor * vi;
                }
            }
        }

        basis.push(j);
        r_columns.push(work[j][..=k].to_vec());
    }

    groups
}

/// Solve R b = y for upper-triangular R given by columns.
fn back_substitute(r_columns: &[Vec<f64>], y: &[f64]) -> Vec<f64> {
    let k = y.len();
    let mut b = vec![0.0; k];
    for row in (0..k).rev() {
        let mut acc = y[row];
        for col in (row + 1)..k {
            acc -= r_columns[col][row] * b[col];
        }
        let pivot = r_columns[row][row];
        b[row] = if pivot != 0.0 { acc / pivot } else { 0.0 };
    }
    b
}

fn norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}
