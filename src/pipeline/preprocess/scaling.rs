//! Centering, scaling, range normalization and spatial sign

use faer::Mat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::operation::Operation;
use super::{Diagnostic, DiagnosticKind};
use crate::pipeline::matrix::Matrix;

/// A per-column scalar parameter. `None` means the column passes through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnValue {
    pub column: String,
    pub value: Option<f64>,
}

/// Per-column bounds for range normalization. `None` means pass-through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRange {
    pub column: String,
    pub bounds: Option<(f64, f64)>,
}

pub(crate) fn present(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    let present = present(values);
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum::<f64>() / present.len() as f64)
    }
}

/// Sample standard deviation (n - 1) of the non-missing values.
pub(crate) fn std_dev(values: &[f64]) -> Option<f64> {
    let present = present(values);
    if present.len() < 2 {
        return None;
    }
    let m = present.iter().sum::<f64>() / present.len() as f64;
    let ss: f64 = present.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (present.len() - 1) as f64).sqrt())
}

pub(crate) fn fit_center(matrix: &Matrix) -> (Vec<ColumnValue>, Vec<Diagnostic>) {
    let params: Vec<ColumnValue> = (0..matrix.ncols())
        .into_par_iter()
        .map(|j| ColumnValue {
            column: matrix.names()[j].clone(),
            value: mean(&matrix.column(j)),
        })
        .collect();

    let diagnostics = params
        .iter()
        .filter(|p| p.value.is_none())
        .map(|p| {
            Diagnostic::column(
                Operation::Center,
                &p.column,
                DiagnosticKind::ZeroVariance,
                "no observed values; column not centered",
            )
        })
        .collect();

    (params, diagnostics)
}

pub(crate) fn fit_scale(matrix: &Matrix) -> (Vec<ColumnValue>, Vec<Diagnostic>) {
    let params: Vec<ColumnValue> = (0..matrix.ncols())
        .into_par_iter()
        .map(|j| ColumnValue {
            column: matrix.names()[j].clone(),
            value: std_dev(&matrix.column(j)).filter(|sd| *sd > 0.0),
        })
        .collect();

    let diagnostics = params
        .iter()
        .filter(|p| p.value.is_none())
        .map(|p| {
            Diagnostic::column(
                Operation::Scale,
                &p.column,
                DiagnosticKind::ZeroVariance,
                "standard deviation is zero or undefined; column not scaled",
            )
        })
        .collect();

    (params, diagnostics)
}

pub(crate) fn fit_range(matrix: &Matrix) -> (Vec<ColumnRange>, Vec<Diagnostic>) {
    let params: Vec<ColumnRange> = (0..matrix.ncols())
        .into_par_iter()
        .map(|j| {
            let values = present(&matrix.column(j));
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            ColumnRange {
                column: matrix.names()[j].clone(),
                bounds: (max > min).then_some((min, max)),
            }
        })
        .collect();

    let diagnostics = params
        .iter()
        .filter(|p| p.bounds.is_none())
        .map(|p| {
            Diagnostic::column(
                Operation::Range,
                &p.column,
                DiagnosticKind::ZeroVariance,
                "column has no spread; range not applied",
            )
        })
        .collect();

    (params, diagnostics)
}

pub(crate) fn apply_center(params: &[ColumnValue], matrix: &Matrix) -> Matrix {
    map_columns(matrix, |j, x| match params[j].value {
        Some(m) => x - m,
        None => x,
    })
}

pub(crate) fn apply_scale(params: &[ColumnValue], matrix: &Matrix) -> Matrix {
    map_columns(matrix, |j, x| match params[j].value {
        Some(sd) => x / sd,
        None => x,
    })
}

pub(crate) fn apply_range(params: &[ColumnRange], target: (f64, f64), matrix: &Matrix) -> Matrix {
    let (lo, hi) = target;
    map_columns(matrix, |j, x| match params[j].bounds {
        Some((min, max)) => lo + (x - min) / (max - min) * (hi - lo),
        None => x,
    })
}

/// Divide each row by its Euclidean norm.
///
/// All-zero rows stay zero and rows with missing entries are left unchanged.
pub(crate) fn apply_spatial_sign(matrix: &Matrix) -> Matrix {
    let (n, p) = (matrix.nrows(), matrix.ncols());
    let norms: Vec<Option<f64>> = (0..n)
        .map(|i| {
            let row = matrix.row(i);
            if row.iter().any(|v| v.is_nan()) {
                return None;
            }
            let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
            (norm > 0.0).then_some(norm)
        })
        .collect();

    let data = Mat::from_fn(n, p, |i, j| match norms[i] {
        Some(norm) => matrix.get(i, j) / norm,
        None => matrix.get(i, j),
    });
    matrix.with_data(data)
}

/// Apply `f(column, value)` to every entry. Missing entries stay missing.
pub(crate) fn map_columns<F>(matrix: &Matrix, f: F) -> Matrix
where
    F: Fn(usize, f64) -> f64,
{
    let data = Mat::from_fn(matrix.nrows(), matrix.ncols(), |i, j| {
        let x = matrix.get(i, j);
        if x.is_nan() {
            x
        } else {
            f(j, x)
        }
    });
    matrix.with_data(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: Vec<f64>) -> Matrix {
        Matrix::from_columns(vec![("x", values)]).unwrap()
    }

    #[test]
    fn test_center_scale_known_values() {
        let m = column(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let (centers, _) = fit_center(&m);
        let (scales, _) = fit_scale(&m);
        assert_eq!(centers[0].value, Some(3.0));
        assert!((scales[0].value.unwrap() - 2.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_scale_skips_constant() {
        let m = column(vec![2.0, 2.0, 2.0]);
        let (scales, diags) = fit_scale(&m);
        assert_eq!(scales[0].value, None);
        assert_eq!(diags.len(), 1);
        assert_eq!(apply_scale(&scales, &m).column(0), vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_range_maps_to_bounds() {
        let m = column(vec![2.0, 4.0, 6.0]);
        let (ranges, _) = fit_range(&m);
        let out = apply_range(&ranges, (0.0, 1.0), &m);
        assert_eq!(out.column(0), vec![0.0, 0.5, 1.0]);
        let shifted = apply_range(&ranges, (-1.0, 1.0), &column(vec![8.0]));
        assert_eq!(shifted.column(0), vec![2.0]);
    }

    #[test]
    fn test_missing_stays_missing() {
        let m = column(vec![1.0, f64::NAN, 3.0]);
        let (centers, _) = fit_center(&m);
        assert_eq!(centers[0].value, Some(2.0));
        let out = apply_center(&centers, &m);
        assert!(out.get(1, 0).is_nan());
    }

    #[test]
    fn test_spatial_sign_zero_row() {
        let m = Matrix::from_rows(&["a", "b"], &[vec![0.0, 0.0], vec![3.0, 4.0]]).unwrap();
        let out = apply_spatial_sign(&m);
        assert_eq!(out.row(0), vec![0.0, 0.0]);
        assert!((out.get(1, 0) - 0.6).abs() < 1e-12);
        assert!((out.get(1, 1) - 0.8).abs() < 1e-12);
    }
}
