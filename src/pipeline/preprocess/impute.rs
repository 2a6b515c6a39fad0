//! Median and nearest-neighbour imputation

use faer::Mat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::operation::Operation;
use super::scaling::{mean, present, std_dev, ColumnValue};
use super::{Diagnostic, DiagnosticKind};
use crate::error::{PrepError, Result};
use crate::pipeline::matrix::Matrix;

pub(crate) fn median(values: &[f64]) -> Option<f64> {
    let mut sorted = present(values);
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

pub(crate) fn fit_median(matrix: &Matrix) -> (Vec<ColumnValue>, Vec<Diagnostic>) {
    let params: Vec<ColumnValue> = (0..matrix.ncols())
        .into_par_iter()
        .map(|j| ColumnValue {
            column: matrix.names()[j].clone(),
            value: median(&matrix.column(j)),
        })
        .collect();

    let diagnostics = params
        .iter()
        .filter(|p| p.value.is_none())
        .map(|p| {
            Diagnostic::column(
                Operation::MedianImpute,
                &p.column,
                DiagnosticKind::ZeroVariance,
                "no observed values; missing entries cannot be imputed",
            )
        })
        .collect();

    (params, diagnostics)
}

pub(crate) fn apply_median(params: &[ColumnValue], matrix: &Matrix) -> Matrix {
    let data = Mat::from_fn(matrix.nrows(), matrix.ncols(), |i, j| {
        let x = matrix.get(i, j);
        match params[j].value {
            Some(m) if x.is_nan() => m,
            _ => x,
        }
    });
    matrix.with_data(data)
}

/// Reference data for nearest-neighbour imputation.
///
/// Distances are computed on values standardized with the training mean and
/// standard deviation; the reference rows are the complete training rows,
/// stored already standardized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnModel {
    pub k: usize,
    pub means: Vec<f64>,
    pub sds: Vec<f64>,
    pub reference: Vec<Vec<f64>>,
}

pub(crate) fn fit_knn(matrix: &Matrix, k: usize) -> Result<KnnModel> {
    let complete = matrix.complete_rows();
    if complete.is_empty() {
        return Err(PrepError::InvalidMatrix(
            "knnImpute requires at least one complete training row".to_string(),
        ));
    }

    let p = matrix.ncols();
    let columns: Vec<Vec<f64>> = (0..p).map(|j| matrix.column(j)).collect();
    let means: Vec<f64> = columns.iter().map(|c| mean(c).unwrap_or(0.0)).collect();
    let sds: Vec<f64> = columns
        .iter()
        .map(|c| std_dev(c).filter(|sd| *sd > 0.0).unwrap_or(1.0))
        .collect();

    let reference = complete
        .iter()
        .map(|&i| (0..p).map(|j| (matrix.get(i, j) - means[j]) / sds[j]).collect())
        .collect::<Vec<Vec<f64>>>();

    Ok(KnnModel {
        k: k.min(reference.len()),
        means,
        sds,
        reference,
    })
}

impl KnnModel {
    /// Fill missing entries of one row from its nearest reference rows.
    fn impute_row(&self, row: &mut [f64]) {
        let observed: Vec<usize> = (0..row.len()).filter(|&j| !row[j].is_nan()).collect();
        if observed.len() == row.len() {
            return;
        }

        let standardized: Vec<f64> = row
            .iter()
            .enumerate()
            .map(|(j, x)| (x - self.means[j]) / self.sds[j])
            .collect();

        let mut distances: Vec<(usize, f64)> = self
            .reference
            .iter()
            .enumerate()
            .map(|(r, reference)| {
                let d: f64 = observed
                    .iter()
                    .map(|&j| {
                        let diff = standardized[j] - reference[j];
                        diff * diff
                    })
                    .sum();
                (r, d)
            })
            .collect();

        // Stable sort keeps training order among equal distances
        distances.sort_by(|a, b| a.1.total_cmp(&b.1));
        let neighbours: Vec<usize> = distances.iter().take(self.k).map(|&(r, _)| r).collect();
        if neighbours.is_empty() {
            return;
        }

        let missing: Vec<usize> = (0..row.len()).filter(|&j| row[j].is_nan()).collect();
        for j in missing {
            let avg = neighbours
                .iter()
                .map(|&r| self.reference[r][j])
                .sum::<f64>()
                / neighbours.len() as f64;
            row[j] = avg * self.sds[j] + self.means[j];
        }
    }

    pub(crate) fn apply(&self, matrix: &Matrix) -> Matrix {
        let rows: Vec<Vec<f64>> = (0..matrix.nrows())
            .into_par_iter()
            .map(|i| {
                let mut row = matrix.row(i);
                self.impute_row(&mut row);
                row
            })
            .collect();
        let data = Mat::from_fn(matrix.nrows(), matrix.ncols(), |i, j| rows[i][j]);
        matrix.with_data(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[f64::NAN, 5.0]), Some(5.0));
        assert_eq!(median(&[f64::NAN]), None);
    }

    #[test]
    fn test_median_impute_fills_only_missing() {
        let m = Matrix::from_columns(vec![("x", vec![1.0, f64::NAN, 3.0, 10.0])]).unwrap();
        let (params, _) = fit_median(&m);
        let out = apply_median(&params, &m);
        assert_eq!(out.column(0), vec![1.0, 3.0, 3.0, 10.0]);
    }

    #[test]
    fn test_knn_uses_nearest_rows() {
        let train = Matrix::from_rows(
            &["a", "b"],
            &[
                vec![1.0, 10.0],
                vec![1.1, 11.0],
                vec![9.0, 90.0],
                vec![9.1, 91.0],
            ],
        )
        .unwrap();
        let model = fit_knn(&train, 2).unwrap();

        let test = Matrix::from_rows(&["a", "b"], &[vec![1.05, f64::NAN], vec![f64::NAN, 90.5]])
            .unwrap();
        let out = model.apply(&test);
        assert!((out.get(0, 1) - 10.5).abs() < 1e-9);
        assert!((out.get(1, 0) - 9.05).abs() < 1e-9);
    }

    #[test]
    fn test_knn_k_capped_by_reference_rows() {
        let train = Matrix::from_rows(&["a", "b"], &[vec![1.0, 2.0], vec![f64::NAN, 3.0]]).unwrap();
        let model = fit_knn(&train, 5).unwrap();
        assert_eq!(model.k, 1);
        assert_eq!(model.reference.len(), 1);
    }

    #[test]
    fn test_knn_requires_complete_rows() {
        let train = Matrix::from_rows(&["a", "b"], &[vec![1.0, f64::NAN], vec![f64::NAN, 3.0]]).unwrap();
        assert!(fit_knn(&train, 5).is_err());
    }

    #[test]
    fn test_knn_k_larger_than_reference_uses_all_rows() {
        let model = KnnModel {
            k: 10,
            means: vec![0.0, 0.0],
            sds: vec![1.0, 1.0],
            reference: vec![vec![1.0, 4.0], vec![3.0, 8.0]],
        };
        let test = Matrix::from_rows(&["a", "b"], &[vec![2.0, f64::NAN]]).unwrap();
        let out = model.apply(&test);
        assert_eq!(out.get(0, 1), 6.0);
    }
}
