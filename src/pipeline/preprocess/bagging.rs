//! Bagged regression trees for model-based imputation
//!
//! One bag per column, each tree grown on a bootstrap sample of the complete
//! training rows and predicting the column from every other column.

use faer::Mat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::operation::Operation;
use super::{Diagnostic, DiagnosticKind};
use crate::pipeline::matrix::Matrix;

/// Tree growth limits
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    pub max_depth: usize,
    pub min_node: usize,
}

/// A node of a fitted regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        /// Position within the model's predictor list
        feature: usize,
        threshold: f64,
        /// Where a missing predictor goes: the child that saw more rows
        missing_left: bool,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    missing_left,
                    left,
                    right,
                } => {
                    let v = x[*feature];
                    let go_left = if v.is_nan() { *missing_left } else { v <= *threshold };
                    node = if go_left { left } else { right };
                }
            }
        }
    }
}

/// Bagged model imputing one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaggedColumnModel {
    pub column: String,
    /// Predictor columns, in the order the trees index them
    pub predictors: Vec<String>,
    pub trees: Vec<TreeNode>,
}

impl BaggedColumnModel {
    pub fn predict(&self, x: &[f64]) -> f64 {
        self.trees.iter().map(|t| t.predict(x)).sum::<f64>() / self.trees.len() as f64
    }
}

/// Fit a bag of trees for every column. Columns are independent and fitted
/// in parallel; each column's sampler is seeded from `seed` and its position.
pub(crate) fn fit_bagged(
    matrix: &Matrix,
    n_trees: usize,
    params: TreeParams,
    seed: u64,
) -> (Vec<Option<BaggedColumnModel>>, Vec<Diagnostic>) {
    let complete = matrix.complete_rows();
    let p = matrix.ncols();

    let models: Vec<Option<BaggedColumnModel>> = (0..p)
        .into_par_iter()
        .map(|target| {
            if complete.len() < 2 {
                return None;
            }
            let predictors: Vec<usize> = (0..p).filter(|&j| j != target).collect();
            let x: Vec<Vec<f64>> = complete
                .iter()
                .map(|&i| predictors.iter().map(|&j| matrix.get(i, j)).collect())
                .collect();
            let y: Vec<f64> = complete.iter().map(|&i| matrix.get(i, target)).collect();

            let mut rng = StdRng::seed_from_u64(seed ^ (target as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
            let trees = (0..n_trees)
                .map(|_| {
                    let sample: Vec<usize> = (0..y.len()).map(|_| rng.gen_range(0..y.len())).collect();
                    grow(&x, &y, sample, 0, params)
                })
                .collect();

            Some(BaggedColumnModel {
                column: matrix.names()[target].clone(),
                predictors: predictors.iter().map(|&j| matrix.names()[j].clone()).collect(),
                trees,
            })
        })
        .collect();

    let diagnostics = models
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_none())
        .map(|(j, _)| {
            Diagnostic::column(
                Operation::BagImpute,
                &matrix.names()[j],
                DiagnosticKind::TooFewUnique,
                "fewer than two complete training rows; column not imputed",
            )
        })
        .collect();

    (models, diagnostics)
}

pub(crate) fn apply_bagged(models: &[Option<BaggedColumnModel>], matrix: &Matrix) -> Matrix {
    let p = matrix.ncols();
    let rows: Vec<Vec<f64>> = (0..matrix.nrows())
        .into_par_iter()
        .map(|i| {
            let original = matrix.row(i);
            let mut row = original.clone();
            for target in (0..p).filter(|&j| original[j].is_nan()) {
                if let Some(model) = &models[target] {
                    let x: Vec<f64> = (0..p).filter(|&j| j != target).map(|j| original[j]).collect();
                    row[target] = model.predict(&x);
                }
            }
            row
        })
        .collect();
    let data = Mat::from_fn(matrix.nrows(), p, |i, j| rows[i][j]);
    matrix.with_data(data)
}

/// Grow a regression tree by greedy variance reduction.
fn grow(x: &[Vec<f64>], y: &[f64], rows: Vec<usize>, depth: usize, params: TreeParams) -> TreeNode {
    let n = rows.len();
    let mean = rows.iter().map(|&r| y[r]).sum::<f64>() / n as f64;

    if depth >= params.max_depth || n < 2 * params.min_node {
        return TreeNode::Leaf { value: mean };
    }

    let Some((feature, threshold)) = best_split(x, y, &rows, params.min_node) else {
        return TreeNode::Leaf { value: mean };
    };

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
        rows.into_iter().partition(|&r| x[r][feature] <= threshold);
    let missing_left = left_rows.len() >= right_rows.len();

    TreeNode::Split {
        feature,
        threshold,
        missing_left,
        left: Box::new(grow(x, y, left_rows, depth + 1, params)),
        right: Box::new(grow(x, y, right_rows, depth + 1, params)),
    }
}

/// Split with the largest reduction in squared error, or `None` when no
/// split leaves `min_node` rows on both sides and reduces the error.
fn best_split(x: &[Vec<f64>], y: &[f64], rows: &[usize], min_node: usize) -> Option<(usize, f64)> {
    let n = rows.len();
    let n_features = x.first().map_or(0, |r| r.len());
    let total_sum: f64 = rows.iter().map(|&r| y[r]).sum();
    let total_sq: f64 = rows.iter().map(|&r| y[r] * y[r]).sum();
    let parent_sse = total_sq - total_sum * total_sum / n as f64;

    let mut best: Option<(usize, f64, f64)> = None;
    let mut order: Vec<usize> = rows.to_vec();

    for feature in 0..n_features {
        order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for split in 1..n {
            let prev = order[split - 1];
            left_sum += y[prev];
            left_sq += y[prev] * y[prev];

            let (lo, hi) = (x[prev][feature], x[order[split]][feature]);
            if split < min_node || n - split < min_node || lo == hi {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / split as f64)
                + (right_sq - right_sum * right_sum / (n - split) as f64);

            if sse < parent_sse - 1e-12 && best.map_or(true, |(_, _, b)| sse < b) {
                best = Some((feature, (lo + hi) / 2.0, sse));
            }
        }
    }

    best.map(|(feature, threshold, _)| (feature, threshold))
}
