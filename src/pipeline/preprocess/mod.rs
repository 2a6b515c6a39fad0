//! Preprocessing estimator and applicator
//!
//! [`fit`] runs the requested operations in their fixed order on a training
//! matrix and freezes every estimated parameter into a
//! [`FittedPreprocessor`]. [`apply`] replays those parameters on any matrix
//! with the same columns, without looking at its statistics.

pub mod bagging;
pub mod impute;
pub mod operation;
pub mod options;
pub mod plan;
pub mod power;
pub mod projection;
pub mod scaling;

use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};
use crate::pipeline::correlation::{correlation_matrix, find_correlated};
use crate::pipeline::matrix::Matrix;
use crate::pipeline::nzv::{detect_nzv, zero_variance_columns};

pub use bagging::BaggedColumnModel;
pub use impute::KnnModel;
pub use operation::{parse_operations, Operation};
pub use options::PreprocessOptions;
pub use plan::resolve_plan;
pub use power::{ColumnLambda, PowerKind};
pub use projection::{IcaModel, PcaModel};
pub use scaling::{ColumnRange, ColumnValue};

use bagging::TreeParams;
use projection::ProjectionParams;

/// Category of a non-fatal estimation event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    NonPositiveData,
    TooFewUnique,
    ZeroVariance,
    NoTransformNeeded,
    PlanAdjusted,
    NotConverged,
}

/// A degradation or adjustment recorded during fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub step: Operation,
    pub column: Option<String>,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub(crate) fn column(step: Operation, column: &str, kind: DiagnosticKind, message: &str) -> Self {
        Self {
            step,
            column: Some(column.to_string()),
            kind,
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.column {
            Some(column) => write!(f, "[{}] {}: {}", self.step, column, self.message),
            None => write!(f, "[{}] {}", self.step, self.message),
        }
    }
}

/// A column dropped by a filter step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedColumn {
    pub name: String,
    pub reason: Operation,
}

/// One estimated step with its frozen parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum FittedStep {
    Filter {
        operation: Operation,
        removed: Vec<String>,
    },
    MedianImpute {
        medians: Vec<ColumnValue>,
    },
    KnnImpute {
        model: KnnModel,
    },
    BagImpute {
        models: Vec<Option<BaggedColumnModel>>,
    },
    Power {
        kind: PowerKind,
        lambdas: Vec<ColumnLambda>,
    },
    Center {
        means: Vec<ColumnValue>,
    },
    Scale {
        sds: Vec<ColumnValue>,
    },
    Range {
        ranges: Vec<ColumnRange>,
        bounds: (f64, f64),
    },
    Pca {
        model: PcaModel,
    },
    Ica {
        model: IcaModel,
    },
    SpatialSign,
}

impl FittedStep {
    pub fn operation(&self) -> Operation {
        match self {
            FittedStep::Filter { operation, .. } => *operation,
            FittedStep::MedianImpute { .. } => Operation::MedianImpute,
            FittedStep::KnnImpute { .. } => Operation::KnnImpute,
            FittedStep::BagImpute { .. } => Operation::BagImpute,
            FittedStep::Power { kind, .. } => kind.operation(),
            FittedStep::Center { .. } => Operation::Center,
            FittedStep::Scale { .. } => Operation::Scale,
            FittedStep::Range { .. } => Operation::Range,
            FittedStep::Pca { .. } => Operation::Pca,
            FittedStep::Ica { .. } => Operation::Ica,
            FittedStep::SpatialSign => Operation::SpatialSign,
        }
    }

    /// Number of input columns the step's per-column parameters cover
    fn expected_width(&self) -> Option<usize> {
        match self {
            FittedStep::Filter { .. } | FittedStep::SpatialSign => None,
            FittedStep::MedianImpute { medians } => Some(medians.len()),
            FittedStep::KnnImpute { model } => Some(model.means.len()),
            FittedStep::BagImpute { models } => Some(models.len()),
            FittedStep::Power { lambdas, .. } => Some(lambdas.len()),
            FittedStep::Center { means } => Some(means.len()),
            FittedStep::Scale { sds } => Some(sds.len()),
            FittedStep::Range { ranges, .. } => Some(ranges.len()),
            FittedStep::Pca { model } => Some(model.center.len()),
            FittedStep::Ica { model } => Some(model.center.len()),
        }
    }

    /// Replay the step using only its stored parameters.
    fn apply(&self, matrix: &Matrix) -> Result<Matrix> {
        if let Some(expected) = self.expected_width() {
            if expected != matrix.ncols() {
                return Err(PrepError::DimensionMismatch {
                    expected,
                    actual: matrix.ncols(),
                });
            }
        }

        Ok(match self {
            FittedStep::Filter { removed, .. } => {
                let drop: Vec<usize> = removed
                    .iter()
                    .filter_map(|name| matrix.column_index(name))
                    .collect();
                matrix.drop_indices(&drop)
            }
            FittedStep::MedianImpute { medians } => impute::apply_median(medians, matrix),
            FittedStep::KnnImpute { model } => model.apply(matrix),
            FittedStep::BagImpute { models } => bagging::apply_bagged(models, matrix),
            FittedStep::Power { kind, lambdas } => power::apply_power(*kind, lambdas, matrix),
            FittedStep::Center { means } => scaling::apply_center(means, matrix),
            FittedStep::Scale { sds } => scaling::apply_scale(sds, matrix),
            FittedStep::Range { ranges, bounds } => scaling::apply_range(ranges, *bounds, matrix),
            FittedStep::Pca { model } => projection::apply_pca(model, matrix),
            FittedStep::Ica { model } => projection::apply_ica(model, matrix),
            FittedStep::SpatialSign => scaling::apply_spatial_sign(matrix),
        })
    }
}

/// Immutable result of [`fit`], consumed by [`apply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    input_columns: Vec<String>,
    required_columns: Vec<String>,
    output_columns: Vec<String>,
    operations: Vec<Operation>,
    steps: Vec<FittedStep>,
    removed: Vec<RemovedColumn>,
    diagnostics: Vec<Diagnostic>,
    options: PreprocessOptions,
}

impl FittedPreprocessor {
    /// Columns of the training matrix
    pub fn input_columns(&self) -> &[String] {
        &self.input_columns
    }

    /// Columns a matrix must carry for [`apply`]
    pub fn required_columns(&self) -> &[String] {
        &self.required_columns
    }

    pub fn output_columns(&self) -> &[String] {
        &self.output_columns
    }

    /// Resolved operations in execution order
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn steps(&self) -> &[FittedStep] {
        &self.steps
    }

    pub fn removed(&self) -> &[RemovedColumn] {
        &self.removed
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn options(&self) -> &PreprocessOptions {
        &self.options
    }

    pub fn apply(&self, matrix: &Matrix) -> Result<Matrix> {
        apply(self, matrix)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Estimate every requested operation on `matrix`.
///
/// # Arguments
/// * `matrix` - Training data; missing entries are `NaN`
/// * `operations` - Requested operations in any order
/// * `options` - Estimation settings, validated before use
///
/// # Returns
/// The frozen parameters, or an error for invalid options, conflicting
/// operations, an empty matrix or a projection without enough complete rows
pub fn fit(
    matrix: &Matrix,
    operations: &[Operation],
    options: &PreprocessOptions,
) -> Result<FittedPreprocessor> {
    options.validate()?;
    if matrix.nrows() == 0 || matrix.ncols() == 0 {
        return Err(PrepError::InsufficientRank {
            rows: matrix.nrows(),
            cols: matrix.ncols(),
        });
    }

    let (plan, mut diagnostics) = resolve_plan(operations)?;
    tracing::debug!(plan = ?plan, "resolved operations");

    let mut current = matrix.clone();
    let mut steps = Vec::with_capacity(plan.len());
    let mut removed = Vec::new();

    for &op in &plan {
        let (step, step_diagnostics) = fit_step(op, &current, options)?;
        if let FittedStep::Filter { removed: names, .. } = &step {
            removed.extend(names.iter().map(|name| RemovedColumn {
                name: name.clone(),
                reason: op,
            }));
        }
        diagnostics.extend(step_diagnostics);
        current = step.apply(&current)?;
        tracing::debug!(operation = %op, columns = current.ncols(), "step estimated");
        steps.push(step);
    }

    for diagnostic in &diagnostics {
        tracing::warn!("{}", diagnostic);
    }

    let required_columns = matrix
        .names()
        .iter()
        .filter(|name| !removed.iter().any(|r: &RemovedColumn| &r.name == *name))
        .cloned()
        .collect();

    tracing::info!(
        input = matrix.ncols(),
        output = current.ncols(),
        removed = removed.len(),
        "preprocessor fitted"
    );

    Ok(FittedPreprocessor {
        input_columns: matrix.names().to_vec(),
        required_columns,
        output_columns: current.names().to_vec(),
        operations: plan,
        steps,
        removed,
        diagnostics,
        options: options.clone(),
    })
}

fn fit_step(
    op: Operation,
    matrix: &Matrix,
    options: &PreprocessOptions,
) -> Result<(FittedStep, Vec<Diagnostic>)> {
    let projection = |n_components| ProjectionParams {
        thresh: options.thresh,
        n_components,
        max_iter: options.ica_max_iter,
        tol: options.ica_tol,
        seed: options.seed,
    };

    let fitted = match op {
        Operation::Zv | Operation::Nzv | Operation::Corr => {
            let indices = match op {
                Operation::Zv => zero_variance_columns(matrix),
                Operation::Nzv => detect_nzv(matrix, &options.nzv_thresholds()).flags,
                _ => find_correlated(
                    &correlation_matrix(matrix, options.corr_missing),
                    options.corr_cutoff,
                ),
            };
            let removed = indices.iter().map(|&j| matrix.names()[j].clone()).collect();
            (
                FittedStep::Filter {
                    operation: op,
                    removed,
                },
                Vec::new(),
            )
        }
        Operation::MedianImpute => {
            let (medians, diagnostics) = impute::fit_median(matrix);
            (FittedStep::MedianImpute { medians }, diagnostics)
        }
        Operation::KnnImpute => (
            FittedStep::KnnImpute {
                model: impute::fit_knn(matrix, options.k)?,
            },
            Vec::new(),
        ),
        Operation::BagImpute => {
            let params = TreeParams {
                max_depth: options.bag_max_depth,
                min_node: options.bag_min_node,
            };
            let (models, diagnostics) =
                bagging::fit_bagged(matrix, options.bag_trees, params, options.seed);
            (FittedStep::BagImpute { models }, diagnostics)
        }
        Operation::BoxCox | Operation::YeoJohnson | Operation::ExpoTrans => {
            let kind = match op {
                Operation::BoxCox => PowerKind::BoxCox,
                Operation::YeoJohnson => PowerKind::YeoJohnson,
                _ => PowerKind::ExpoTrans,
            };
            let (lambdas, diagnostics) =
                power::fit_power(kind, matrix, options.fudge, options.num_unique);
            (FittedStep::Power { kind, lambdas }, diagnostics)
        }
        Operation::Center => {
            let (means, diagnostics) = scaling::fit_center(matrix);
            (FittedStep::Center { means }, diagnostics)
        }
        Operation::Scale => {
            let (sds, diagnostics) = scaling::fit_scale(matrix);
            (FittedStep::Scale { sds }, diagnostics)
        }
        Operation::Range => {
            let (ranges, diagnostics) = scaling::fit_range(matrix);
            (
                FittedStep::Range {
                    ranges,
                    bounds: options.range_bounds,
                },
                diagnostics,
            )
        }
        Operation::Pca => (
            FittedStep::Pca {
                model: projection::fit_pca(matrix, &projection(options.pca_comp))?,
            },
            Vec::new(),
        ),
        Operation::Ica => {
            let (model, diagnostics) = projection::fit_ica(matrix, &projection(options.ica_comp))?;
            (FittedStep::Ica { model }, diagnostics)
        }
        Operation::SpatialSign => (FittedStep::SpatialSign, Vec::new()),
    };
    Ok(fitted)
}

/// Apply a fitted preprocessor to `matrix`.
///
/// Columns are matched by name; extra columns are ignored and absent
/// required columns are reported together as a schema mismatch.
pub fn apply(fitted: &FittedPreprocessor, matrix: &Matrix) -> Result<Matrix> {
    let mut current = matrix.select(&fitted.required_columns)?;
    for step in &fitted.steps {
        current = step.apply(&current)?;
    }
    tracing::info!(
        rows = current.nrows(),
        columns = current.ncols(),
        "preprocessor applied"
    );
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn training() -> Matrix {
        Matrix::from_columns(vec![
            ("a", vec![1.0, 2.0, 3.0, 4.0, 5.0]),
            ("b", vec![2.0, 1.0, 4.0, 3.0, 6.0]),
            ("constant", vec![7.0; 5]),
        ])
        .unwrap()
    }

    #[test]
    fn test_fitted_preprocessor_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FittedPreprocessor>();
    }

    #[test]
    fn test_filter_records_removed_columns() {
        let fitted = fit(&training(), &[Operation::Zv, Operation::Center], &Default::default()).unwrap();
        assert_eq!(fitted.removed().len(), 1);
        assert_eq!(fitted.removed()[0].name, "constant");
        assert_eq!(fitted.removed()[0].reason, Operation::Zv);
        assert_eq!(fitted.required_columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(fitted.output_columns(), fitted.required_columns());
    }

    #[test]
    fn test_apply_ignores_extra_and_reports_missing() {
        let fitted = fit(&training(), &[Operation::Zv, Operation::Center], &Default::default()).unwrap();

        let extra = Matrix::from_columns(vec![
            ("z", vec![0.0]),
            ("b", vec![3.2]),
            ("a", vec![3.0]),
        ])
        .unwrap();
        let out = apply(&fitted, &extra).unwrap();
        assert_eq!(out.row(0), vec![0.0, 0.0]);

        let missing = Matrix::from_columns(vec![("z", vec![0.0])]).unwrap();
        match apply(&fitted, &missing).unwrap_err() {
            PrepError::SchemaMismatch { missing } => {
                assert_eq!(missing, vec!["a".to_string(), "b".to_string()])
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_matrix_rejected() {
        let empty = Matrix::from_columns::<String>(vec![]).unwrap();
        assert!(matches!(
            fit(&empty, &[Operation::Center], &Default::default()),
            Err(PrepError::InsufficientRank { .. })
        ));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = PreprocessOptions {
            corr_cutoff: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            fit(&training(), &[Operation::Corr], &options),
            Err(PrepError::InvalidOption(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let fitted = fit(
            &training(),
            &[Operation::Zv, Operation::YeoJohnson, Operation::Range],
            &Default::default(),
        )
        .unwrap();
        let restored = FittedPreprocessor::from_json(&fitted.to_json().unwrap()).unwrap();
        assert_eq!(restored, fitted);
    }
}
