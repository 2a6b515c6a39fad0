//! Dense linear algebra helpers shared by projection and class distance

use faer::{Mat, Side};

use crate::error::{PrepError, Result};

/// Relative cutoff below which an eigenvalue is treated as zero
pub(crate) const EIGEN_RELATIVE_TOLERANCE: f64 = 1e-10;

/// Eigenpairs of a symmetric matrix, sorted by descending eigenvalue.
#[derive(Debug, Clone)]
pub(crate) struct Eigenpairs {
    pub values: Vec<f64>,
    /// One eigenvector per column, same order as `values`
    pub vectors: Mat<f64>,
}

impl Eigenpairs {
    /// Number of eigenvalues above the relative tolerance
    pub fn positive_count(&self) -> usize {
        let largest = self.values.first().copied().unwrap_or(0.0).max(0.0);
        let tol = largest * EIGEN_RELATIVE_TOLERANCE;
        self.values.iter().filter(|&&v| v > tol && v > 0.0).count()
    }
}

/// Column means of a complete matrix
pub(crate) fn column_means(data: &Mat<f64>) -> Vec<f64> {
    let n = data.nrows() as f64;
    (0..data.ncols())
        .map(|j| (0..data.nrows()).map(|i| data[(i, j)]).sum::<f64>() / n)
        .collect()
}

/// Sample covariance (n - 1 denominator) around the given means.
pub(crate) fn covariance(data: &Mat<f64>, means: &[f64]) -> Mat<f64> {
    let n = data.nrows();
    let p = data.ncols();
    let centered = Mat::from_fn(n, p, |i, j| data[(i, j)] - means[j]);
    let denom = (n.max(2) - 1) as f64;
    let gram = centered.transpose() * &centered;
    Mat::from_fn(p, p, |i, j| gram[(i, j)] / denom)
}

/// Symmetric eigendecomposition with descending eigenvalues.
///
/// Each eigenvector is sign-normalized so its largest-magnitude entry is
/// positive, which makes projections reproducible across runs.
pub(crate) fn symmetric_eigen(matrix: &Mat<f64>) -> Result<Eigenpairs> {
    let p = matrix.nrows();
    if p == 0 {
        return Ok(Eigenpairs {
            values: Vec::new(),
            vectors: Mat::zeros(0, 0),
        });
    }

    let eig = matrix
        .as_ref()
        .self_adjoint_eigen(Side::Lower)
        .map_err(|err| PrepError::InvalidMatrix(format!("eigendecomposition failed: {err:?}")))?;

    let diag = eig.S();
    let basis = eig.U();

    let mut order: Vec<(usize, f64)> = (0..p).map(|i| (i, diag[i])).collect();
    order.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut vectors = Mat::<f64>::zeros(p, p);
    for (out, &(src, _)) in order.iter().enumerate() {
        let mut pivot = 0.0f64;
        for i in 0..p {
            if basis[(i, src)].abs() > pivot.abs() {
                pivot = basis[(i, src)];
            }
        }
        let sign = if pivot < 0.0 { -1.0 } else { 1.0 };
        for i in 0..p {
            vectors[(i, out)] = sign * basis[(i, src)];
        }
    }

    Ok(Eigenpairs {
        values: order.iter().map(|&(_, v)| v).collect(),
        vectors,
    })
}

/// Fewest leading components whose cumulative share of the total variance
/// reaches `thresh`. Never less than one when any variance exists.
pub(crate) fn components_for_variance(values: &[f64], thresh: f64) -> usize {
    let total: f64 = values.iter().filter(|v| **v > 0.0).sum();
    if total <= 0.0 {
        return 0;
    }
    let mut cumulative = 0.0;
    for (k, v) in values.iter().enumerate() {
        cumulative += v.max(0.0);
        if cumulative / total >= thresh - 1e-12 {
            return k + 1;
        }
    }
    values.len()
}

/// Inverse square root of a symmetric positive definite matrix, via its
/// eigendecomposition.
pub(crate) fn inverse_sqrt(matrix: &Mat<f64>) -> Result<Mat<f64>> {
    let eig = symmetric_eigen(matrix)?;
    let p = matrix.nrows();
    if eig.positive_count() < p {
        return Err(PrepError::InvalidMatrix(
            "matrix is not positive definite".to_string(),
        ));
    }
    let scaled = Mat::from_fn(p, p, |i, j| eig.vectors[(i, j)] / eig.values[j].sqrt());
    Ok(&scaled * eig.vectors.transpose())
}
