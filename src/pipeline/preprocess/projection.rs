//! Principal and independent component projections

use faer::Mat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::operation::Operation;
use super::{Diagnostic, DiagnosticKind};
use crate::error::{PrepError, Result};
use crate::pipeline::linalg::{
    column_means, components_for_variance, covariance, inverse_sqrt, symmetric_eigen,
};
use crate::pipeline::matrix::Matrix;

/// Fitted principal component rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaModel {
    /// Means of the training rows the rotation was estimated on
    pub center: Vec<f64>,
    /// `p x k` loadings, one row per input column
    pub rotation: Vec<Vec<f64>>,
    /// Share of total variance carried by each kept component
    pub variance_explained: Vec<f64>,
}

impl PcaModel {
    pub fn n_components(&self) -> usize {
        self.variance_explained.len()
    }
}

/// Fitted FastICA unmixing, applied after whitening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcaModel {
    pub center: Vec<f64>,
    /// `p x k` whitening matrix
    pub whitening: Vec<Vec<f64>>,
    /// `k x k` unmixing matrix, one row per source
    pub unmixing: Vec<Vec<f64>>,
    pub iterations: usize,
    pub converged: bool,
}

/// Projection tuning taken from the preprocessing options
#[derive(Debug, Clone, Copy)]
pub(crate) struct ProjectionParams {
    pub thresh: f64,
    pub n_components: Option<usize>,
    pub max_iter: usize,
    pub tol: f64,
    pub seed: u64,
}

fn complete_data(matrix: &Matrix, op: Operation) -> Result<Mat<f64>> {
    if matrix.ncols() == 0 {
        tracing::warn!(operation = %op, "no columns left for projection");
        return Err(PrepError::InsufficientRank {
            rows: matrix.nrows(),
            cols: 0,
        });
    }
    let complete = matrix.complete_rows();
    if complete.len() < 2 {
        tracing::warn!(operation = %op, rows = complete.len(), "too few complete rows for projection");
        return Err(PrepError::InsufficientRank {
            rows: complete.len(),
            cols: matrix.ncols(),
        });
    }
    Ok(matrix.select_rows(&complete).data().clone())
}

pub(crate) fn fit_pca(matrix: &Matrix, params: &ProjectionParams) -> Result<PcaModel> {
    let data = complete_data(matrix, Operation::Pca)?;
    let center = column_means(&data);
    let eig = symmetric_eigen(&covariance(&data, &center))?;

    let p = matrix.ncols();
    let k = params
        .n_components
        .unwrap_or_else(|| components_for_variance(&eig.values, params.thresh))
        .clamp(1, p);

    let total: f64 = eig.values.iter().map(|v| v.max(0.0)).sum();
    let variance_explained = eig.values[..k]
        .iter()
        .map(|v| if total > 0.0 { v.max(0.0) / total } else { 0.0 })
        .collect();
    let rotation = (0..p)
        .map(|i| (0..k).map(|c| eig.vectors[(i, c)]).collect())
        .collect();

    tracing::debug!(components = k, "principal components retained");
    Ok(PcaModel {
        center,
        rotation,
        variance_explained,
    })
}

pub(crate) fn apply_pca(model: &PcaModel, matrix: &Matrix) -> Matrix {
    let names = (1..=model.n_components()).map(|c| format!("PC{c}")).collect();
    Matrix::from_parts(names, project(matrix, &model.center, &model.rotation))
}

/// `(x - center) * loadings` for every row; rows with missing entries give NaN.
fn project(matrix: &Matrix, center: &[f64], loadings: &[Vec<f64>]) -> Mat<f64> {
    let k = loadings.first().map_or(0, |r| r.len());
    Mat::from_fn(matrix.nrows(), k, |i, c| {
        (0..matrix.ncols())
            .map(|j| (matrix.get(i, j) - center[j]) * loadings[j][c])
            .sum()
    })
}

pub(crate) fn fit_ica(
    matrix: &Matrix,
    params: &ProjectionParams,
) -> Result<(IcaModel, Vec<Diagnostic>)> {
    let data = complete_data(matrix, Operation::Ica)?;
    let (n, p) = (data.nrows(), data.ncols());
    let center = column_means(&data);
    let eig = symmetric_eigen(&covariance(&data, &center))?;

    let available = eig.positive_count();
    if available == 0 {
        return Err(PrepError::InsufficientRank { rows: n, cols: p });
    }
    let k = params
        .n_components
        .unwrap_or_else(|| components_for_variance(&eig.values, params.thresh))
        .clamp(1, available);

    let whitening = Mat::from_fn(p, k, |i, c| eig.vectors[(i, c)] / eig.values[c].sqrt());
    let centered = Mat::from_fn(n, p, |i, j| data[(i, j)] - center[j]);
    let white = &centered * &whitening;

    let mut rng = StdRng::seed_from_u64(params.seed);
    let init = Mat::from_fn(k, k, |_, _| rng.gen_range(-1.0..1.0));
    let mut w = decorrelate(&init)?;

    let mut iterations = 0;
    let mut converged = false;
    while iterations < params.max_iter {
        iterations += 1;
        let projected = &white * w.transpose();
        let g = Mat::from_fn(n, k, |i, c| projected[(i, c)].tanh());
        let g_prime_mean: Vec<f64> = (0..k)
            .map(|c| (0..n).map(|i| 1.0 - g[(i, c)] * g[(i, c)]).sum::<f64>() / n as f64)
            .collect();
        let gx = g.transpose() * &white;
        let update = Mat::from_fn(k, k, |r, c| gx[(r, c)] / n as f64 - g_prime_mean[r] * w[(r, c)]);
        let next = decorrelate(&update)?;

        let alignment = &next * w.transpose();
        let change = (0..k)
            .map(|c| (alignment[(c, c)].abs() - 1.0).abs())
            .fold(0.0, f64::max);
        w = next;
        if change < params.tol {
            converged = true;
            break;
        }
    }

    let mut diagnostics = Vec::new();
    if !converged {
        diagnostics.push(Diagnostic {
            step: Operation::Ica,
            column: None,
            kind: DiagnosticKind::NotConverged,
            message: format!("FastICA did not converge in {iterations} iterations"),
        });
    }

    tracing::debug!(components = k, iterations, converged, "independent components estimated");
    Ok((
        IcaModel {
            center,
            whitening: to_rows(&whitening),
            unmixing: to_rows(&w),
            iterations,
            converged,
        },
        diagnostics,
    ))
}

pub(crate) fn apply_ica(model: &IcaModel, matrix: &Matrix) -> Matrix {
    // Fold unmixing into the whitening loadings: S = (x - c) K W^T
    let k = model.unmixing.len();
    let loadings: Vec<Vec<f64>> = model
        .whitening
        .iter()
        .map(|row| {
            (0..k)
                .map(|s| (0..k).map(|c| row[c] * model.unmixing[s][c]).sum())
                .collect()
        })
        .collect();
    let names = (1..=k).map(|c| format!("ICA{c}")).collect();
    Matrix::from_parts(names, project(matrix, &model.center, &loadings))
}

/// Symmetric decorrelation `(W W^T)^{-1/2} W`
fn decorrelate(w: &Mat<f64>) -> Result<Mat<f64>> {
    let gram = w * w.transpose();
    Ok(&inverse_sqrt(&gram)? * w)
}

fn to_rows(m: &Mat<f64>) -> Vec<Vec<f64>> {
    (0..m.nrows())
        .map(|i| (0..m.ncols()).map(|j| m[(i, j)]).collect())
        .collect()
}
