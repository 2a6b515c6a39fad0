//! Box-Cox, Yeo-Johnson and Manly exponential transforms
//!
//! Each column's power parameter is chosen by maximising the profile
//! log-likelihood over a fixed grid. Columns that cannot be estimated pass
//! through untouched and are reported as diagnostics.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::operation::Operation;
use super::scaling::{map_columns, present};
use super::{Diagnostic, DiagnosticKind};
use crate::pipeline::matrix::Matrix;
use crate::pipeline::nzv::distinct_count;

/// Which power family a fitted step uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerKind {
    BoxCox,
    YeoJohnson,
    ExpoTrans,
}

impl PowerKind {
    pub fn operation(&self) -> Operation {
        match self {
            PowerKind::BoxCox => Operation::BoxCox,
            PowerKind::YeoJohnson => Operation::YeoJohnson,
            PowerKind::ExpoTrans => Operation::ExpoTrans,
        }
    }

    /// Candidate lambdas, in tenths
    fn grid(&self) -> impl Iterator<Item = f64> {
        let limit = match self {
            PowerKind::BoxCox | PowerKind::YeoJohnson => 20,
            PowerKind::ExpoTrans => 40,
        };
        (-limit..=limit).map(|i| i as f64 / 10.0)
    }

    /// Transform a single value
    pub fn transform(&self, x: f64, lambda: f64) -> f64 {
        match self {
            PowerKind::BoxCox => {
                if x <= 0.0 {
                    f64::NAN
                } else if lambda == 0.0 {
                    x.ln()
                } else {
                    (x.powf(lambda) - 1.0) / lambda
                }
            }
            PowerKind::YeoJohnson => {
                if x >= 0.0 {
                    if lambda == 0.0 {
                        x.ln_1p()
                    } else {
                        ((x + 1.0).powf(lambda) - 1.0) / lambda
                    }
                } else if lambda == 2.0 {
                    -(-x).ln_1p()
                } else {
                    -((1.0 - x).powf(2.0 - lambda) - 1.0) / (2.0 - lambda)
                }
            }
            PowerKind::ExpoTrans => {
                if lambda == 0.0 {
                    x
                } else {
                    ((lambda * x).exp() - 1.0) / lambda
                }
            }
        }
    }

    /// Log of the Jacobian summed over the sample
    fn log_jacobian(&self, values: &[f64], lambda: f64) -> f64 {
        match self {
            PowerKind::BoxCox => (lambda - 1.0) * values.iter().map(|x| x.ln()).sum::<f64>(),
            PowerKind::YeoJohnson => {
                (lambda - 1.0)
                    * values
                        .iter()
                        .map(|x| x.signum() * x.abs().ln_1p())
                        .sum::<f64>()
            }
            PowerKind::ExpoTrans => lambda * values.iter().sum::<f64>(),
        }
    }

    fn log_likelihood(&self, values: &[f64], lambda: f64) -> f64 {
        let n = values.len() as f64;
        let transformed: Vec<f64> = values.iter().map(|&x| self.transform(x, lambda)).collect();
        let mean = transformed.iter().sum::<f64>() / n;
        let var = transformed.iter().map(|y| (y - mean) * (y - mean)).sum::<f64>() / n;
        if !(var > 0.0) || !var.is_finite() {
            return f64::NEG_INFINITY;
        }
        -0.5 * n * var.ln() + self.log_jacobian(values, lambda)
    }
}

/// Fitted power parameter for one column. `None` means pass-through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnLambda {
    pub column: String,
    pub lambda: Option<f64>,
}

/// Estimate one lambda per column, in parallel.
pub(crate) fn fit_power(
    kind: PowerKind,
    matrix: &Matrix,
    fudge: f64,
    num_unique: usize,
) -> (Vec<ColumnLambda>, Vec<Diagnostic>) {
    let results: Vec<(ColumnLambda, Option<Diagnostic>)> = (0..matrix.ncols())
        .into_par_iter()
        .map(|j| {
            let name = &matrix.names()[j];
            let values = present(&matrix.column(j));
            let (lambda, diagnostic) = estimate_lambda(kind, name, &values, fudge, num_unique);
            (
                ColumnLambda {
                    column: name.clone(),
                    lambda,
                },
                diagnostic,
            )
        })
        .collect();

    let mut params = Vec::with_capacity(results.len());
    let mut diagnostics = Vec::new();
    for (param, diagnostic) in results {
        params.push(param);
        diagnostics.extend(diagnostic);
    }
    (params, diagnostics)
}

fn estimate_lambda(
    kind: PowerKind,
    column: &str,
    values: &[f64],
    fudge: f64,
    num_unique: usize,
) -> (Option<f64>, Option<Diagnostic>) {
    let op = kind.operation();

    if distinct_count(values) < num_unique.max(2) {
        return (
            None,
            Some(Diagnostic::column(
                op,
                column,
                DiagnosticKind::TooFewUnique,
                "too few distinct values to estimate a transform",
            )),
        );
    }

    if kind == PowerKind::BoxCox && values.iter().any(|&x| x <= 0.0) {
        return (
            None,
            Some(Diagnostic::column(
                op,
                column,
                DiagnosticKind::NonPositiveData,
                "column contains non-positive values; not transformed",
            )),
        );
    }

    let mut best: Option<(f64, f64)> = None;
    for lambda in kind.grid() {
        let ll = kind.log_likelihood(values, lambda);
        if ll.is_finite() && best.map_or(true, |(_, b)| ll > b) {
            best = Some((lambda, ll));
        }
    }

    let Some((mut lambda, _)) = best else {
        return (
            None,
            Some(Diagnostic::column(
                op,
                column,
                DiagnosticKind::ZeroVariance,
                "likelihood could not be evaluated; not transformed",
            )),
        );
    };

    let identity = match kind {
        PowerKind::BoxCox | PowerKind::YeoJohnson => {
            if lambda.abs() < fudge {
                lambda = 0.0;
            }
            (lambda - 1.0).abs() < fudge
        }
        PowerKind::ExpoTrans => lambda == 0.0,
    };

    if identity {
        return (
            None,
            Some(Diagnostic::column(
                op,
                column,
                DiagnosticKind::NoTransformNeeded,
                "estimated transform is the identity",
            )),
        );
    }

    tracing::debug!(operation = %op, column, lambda, "power parameter estimated");
    (Some(lambda), None)
}

pub(crate) fn apply_power(kind: PowerKind, params: &[ColumnLambda], matrix: &Matrix) -> Matrix {
    map_columns(matrix, |j, x| match params[j].lambda {
        Some(lambda) => kind.transform(x, lambda),
        None => x,
    })
}
