//! Class-centroid distance features
//!
//! Fits one centroid and inverse covariance per class, then scores any matrix
//! with the squared Mahalanobis distance from each row to every class.

use std::collections::BTreeSet;

use faer::Mat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};
use crate::pipeline::linalg::{column_means, components_for_variance, covariance, symmetric_eigen};
use crate::pipeline::matrix::Matrix;

/// Class labels for each training row
#[derive(Debug, Clone, PartialEq)]
pub enum Labels {
    Classes(Vec<String>),
    /// Numeric outcome, binned into quantile groups before fitting
    Numeric(Vec<f64>),
}

impl Labels {
    pub fn len(&self) -> usize {
        match self {
            Labels::Classes(v) => v.len(),
            Labels::Numeric(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve every row to a class name (`None` for a missing numeric
    /// outcome) plus the ordered list of distinct classes.
    fn resolve(&self, groups: usize) -> (Vec<Option<String>>, Vec<String>) {
        match self {
            Labels::Classes(values) => {
                let classes: BTreeSet<&String> = values.iter().collect();
                (
                    values.iter().cloned().map(Some).collect(),
                    classes.into_iter().cloned().collect(),
                )
            }
            Labels::Numeric(values) => {
                let breaks = quantile_breaks(values, groups);
                let assigned: Vec<Option<usize>> =
                    values.iter().map(|&v| quantile_group(&breaks, v)).collect();
                let used: BTreeSet<usize> = assigned.iter().flatten().copied().collect();
                (
                    assigned.iter().map(|g| g.map(|g| format!("Q{g}"))).collect(),
                    used.into_iter().map(|g| format!("Q{g}")).collect(),
                )
            }
        }
    }
}

/// Distinct quantile cut points of the non-missing values
fn quantile_breaks(values: &[f64], groups: usize) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return Vec::new();
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let mut breaks: Vec<f64> = (0..=groups)
        .map(|i| {
            let h = (n - 1) as f64 * i as f64 / groups as f64;
            let lo = h.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
        })
        .collect();
    breaks.dedup();
    breaks
}

/// 1-based interval index; the lowest break belongs to the first group.
fn quantile_group(breaks: &[f64], value: f64) -> Option<usize> {
    if value.is_nan() || breaks.is_empty() {
        return None;
    }
    if breaks.len() == 1 {
        return Some(1);
    }
    let idx = breaks[1..].iter().position(|&b| value <= b).unwrap_or(breaks.len() - 2);
    Some(idx + 1)
}

/// Transform applied to each squared distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceTransform {
    #[default]
    Log1p,
    Log,
    Identity,
}

impl DistanceTransform {
    pub fn apply(&self, d: f64) -> f64 {
        match self {
            DistanceTransform::Log1p => d.ln_1p(),
            DistanceTransform::Log if d.is_nan() => d,
            // A row on the centroid has distance zero
            DistanceTransform::Log => d.max(f64::MIN_POSITIVE).ln(),
            DistanceTransform::Identity => d,
        }
    }
}

impl std::str::FromStr for DistanceTransform {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "log1p" => Ok(DistanceTransform::Log1p),
            "log" => Ok(DistanceTransform::Log),
            "identity" | "none" => Ok(DistanceTransform::Identity),
            other => Err(PrepError::InvalidOption(format!(
                "unknown distance transform '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassDistanceOptions {
    /// Project each class onto its own principal components first
    pub pca: bool,
    /// Fixed number of components per class, overrides `thresh`
    pub keep: Option<usize>,
    pub thresh: f64,
    /// Quantile groups for numeric outcomes
    pub groups: usize,
    pub transform: DistanceTransform,
    pub max_columns: usize,
}

impl Default for ClassDistanceOptions {
    fn default() -> Self {
        Self {
            pca: false,
            keep: None,
            thresh: 0.95,
            groups: 5,
            transform: DistanceTransform::Log1p,
            max_columns: 5000,
        }
    }
}

impl ClassDistanceOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.thresh > 0.0 && self.thresh <= 1.0) {
            return Err(PrepError::InvalidOption(format!(
                "thresh must be in (0, 1], got {}",
                self.thresh
            )));
        }
        if self.groups < 2 {
            return Err(PrepError::InvalidOption("groups must be at least 2".to_string()));
        }
        if self.keep == Some(0) {
            return Err(PrepError::InvalidOption("keep must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassStatus {
    Fitted,
    /// Covariance could not be inverted; the class scores NaN
    Singular,
}

/// Centroid and inverse covariance of one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassModel {
    pub label: String,
    pub n_samples: usize,
    pub centroid: Vec<f64>,
    /// `p x k` principal axes when fitted with PCA
    pub rotation: Option<Vec<Vec<f64>>>,
    /// Inverse covariance in the space distances are measured in
    pub inverse_covariance: Vec<Vec<f64>>,
    pub components: usize,
    pub status: ClassStatus,
}

impl ClassModel {
    fn squared_distance(&self, x: &[f64]) -> f64 {
        if self.status == ClassStatus::Singular || x.iter().any(|v| v.is_nan()) {
            return f64::NAN;
        }
        let diff: Vec<f64> = x.iter().zip(&self.centroid).map(|(a, c)| a - c).collect();
        let z: Vec<f64> = match &self.rotation {
            Some(rotation) => (0..self.components)
                .map(|c| diff.iter().zip(rotation).map(|(d, r)| d * r[c]).sum())
                .collect(),
            None => diff,
        };
        let q: f64 = self
            .inverse_covariance
            .iter()
            .zip(&z)
            .map(|(row, zi)| zi * row.iter().zip(&z).map(|(s, zj)| s * zj).sum::<f64>())
            .sum();
        q.max(0.0)
    }
}

/// Fitted per-class centroids, ready to score new rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassCentroidModel {
    pub columns: Vec<String>,
    pub classes: Vec<ClassModel>,
    pub transform: DistanceTransform,
}

impl ClassCentroidModel {
    /// Labels of classes whose covariance could not be inverted
    pub fn singular_classes(&self) -> Vec<String> {
        self.classes
            .iter()
            .filter(|c| c.status == ClassStatus::Singular)
            .map(|c| c.label.clone())
            .collect()
    }

    /// Fail if any class is singular.
    pub fn ensure_complete(&self) -> Result<()> {
        let classes = self.singular_classes();
        if classes.is_empty() {
            Ok(())
        } else {
            Err(PrepError::SingularCovariance { classes })
        }
    }

    /// Output column names, `dist.<class>`
    pub fn output_columns(&self) -> Vec<String> {
        self.classes.iter().map(|c| format!("dist.{}", c.label)).collect()
    }

    pub fn score(&self, matrix: &Matrix) -> Result<Matrix> {
        score(self, matrix)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Fit class centroids and inverse covariances.
///
/// Classes that cannot be inverted are kept with a `Singular` status so the
/// remaining classes still score.
pub fn fit_class_distance(
    matrix: &Matrix,
    labels: &Labels,
    options: &ClassDistanceOptions,
) -> Result<ClassCentroidModel> {
    options.validate()?;
    if labels.len() != matrix.nrows() {
        return Err(PrepError::DimensionMismatch {
            expected: matrix.nrows(),
            actual: labels.len(),
        });
    }
    if matrix.nrows() == 0 || matrix.ncols() == 0 {
        return Err(PrepError::InsufficientRank {
            rows: matrix.nrows(),
            cols: matrix.ncols(),
        });
    }
    if matrix.ncols() > options.max_columns {
        return Err(PrepError::ColumnLimitExceeded {
            cols: matrix.ncols(),
            max: options.max_columns,
        });
    }

    let (assigned, class_names) = labels.resolve(options.groups);
    let complete = matrix.complete_rows();

    let classes: Vec<ClassModel> = class_names
        .par_iter()
        .map(|label| {
            let rows: Vec<usize> = complete
                .iter()
                .copied()
                .filter(|&i| assigned[i].as_deref() == Some(label.as_str()))
                .collect();
            fit_class(label, matrix.select_rows(&rows).data(), options)
        })
        .collect::<Result<_>>()?;

    let model = ClassCentroidModel {
        columns: matrix.names().to_vec(),
        classes,
        transform: options.transform,
    };

    let singular = model.singular_classes();
    if !singular.is_empty() {
        tracing::warn!(classes = ?singular, "singular class covariance; these classes score NaN");
    }
    tracing::info!(classes = model.classes.len(), columns = model.columns.len(), "class centroids fitted");
    Ok(model)
}

fn fit_class(label: &str, data: &Mat<f64>, options: &ClassDistanceOptions) -> Result<ClassModel> {
    let (n, p) = (data.nrows(), data.ncols());
    let centroid = if n > 0 { column_means(data) } else { vec![f64::NAN; p] };
    let singular = |centroid: Vec<f64>| ClassModel {
        label: label.to_string(),
        n_samples: n,
        centroid: centroid.into_iter().map(|c| if c.is_nan() { 0.0 } else { c }).collect(),
        rotation: None,
        inverse_covariance: Vec::new(),
        components: 0,
        status: ClassStatus::Singular,
    };

    if n < 2 {
        return Ok(singular(centroid));
    }

    let eig = symmetric_eigen(&covariance(data, &centroid))?;
    let positive = eig.positive_count();

    if options.pca {
        let wanted = options
            .keep
            .unwrap_or_else(|| components_for_variance(&eig.values, options.thresh));
        let k = wanted.min(positive);
        if k == 0 {
            return Ok(singular(centroid));
        }
        let rotation = (0..p).map(|i| (0..k).map(|c| eig.vectors[(i, c)]).collect()).collect();
        let inverse_covariance = (0..k)
            .map(|r| (0..k).map(|c| if r == c { 1.0 / eig.values[c] } else { 0.0 }).collect())
            .collect();
        return Ok(ClassModel {
            label: label.to_string(),
            n_samples: n,
            centroid,
            rotation: Some(rotation),
            inverse_covariance,
            components: k,
            status: ClassStatus::Fitted,
        });
    }

    if positive < p {
        tracing::debug!(class = label, rank = positive, cols = p, "class covariance is singular");
        return Ok(singular(centroid));
    }

    let inverse_covariance = (0..p)
        .map(|r| {
            (0..p)
                .map(|c| {
                    (0..p)
                        .map(|m| eig.vectors[(r, m)] * eig.vectors[(c, m)] / eig.values[m])
                        .sum()
                })
                .collect()
        })
        .collect();

    Ok(ClassModel {
        label: label.to_string(),
        n_samples: n,
        centroid,
        rotation: None,
        inverse_covariance,
        components: p,
        status: ClassStatus::Fitted,
    })
}

/// Score every row of `matrix` against each class.
pub fn score(model: &ClassCentroidModel, matrix: &Matrix) -> Result<Matrix> {
    let selected = matrix.select(&model.columns)?;
    let rows: Vec<Vec<f64>> = (0..selected.nrows())
        .into_par_iter()
        .map(|i| {
            let x = selected.row(i);
            model
                .classes
                .iter()
                .map(|class| model.transform.apply(class.squared_distance(&x)))
                .collect()
        })
        .collect();

    let data = Mat::from_fn(rows.len(), model.classes.len(), |i, j| rows[i][j]);
    Matrix::new(model.output_columns(), data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_clusters() -> (Matrix, Labels) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..10 {
            let jitter = (i as f64 * 0.37).sin();
            rows.push(vec![jitter, 0.5 * (i as f64 * 0.91).cos()]);
            labels.push("a".to_string());
            rows.push(vec![10.0 + jitter, 10.0 + 0.5 * (i as f64 * 1.3).cos()]);
            labels.push("b".to_string());
        }
        (Matrix::from_rows(&["x", "y"], &rows).unwrap(), Labels::Classes(labels))
    }

    #[test]
    fn test_own_class_is_closer() {
        let (m, labels) = two_clusters();
        let model = fit_class_distance(&m, &labels, &ClassDistanceOptions::default()).unwrap();
        assert!(model.ensure_complete().is_ok());

        let point = Matrix::from_rows(&["x", "y"], &[vec![0.1, 0.1]]).unwrap();
        let scores = score(&model, &point).unwrap();
        assert_eq!(scores.names(), &["dist.a".to_string(), "dist.b".to_string()]);
        assert!(scores.get(0, 0) < scores.get(0, 1));
    }

    #[test]
    fn test_label_length_checked() {
        let (m, _) = two_clusters();
        let labels = Labels::Classes(vec!["a".to_string()]);
        assert!(matches!(
            fit_class_distance(&m, &labels, &ClassDistanceOptions::default()),
            Err(PrepError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_singular_class_scores_nan() {
        let m = Matrix::from_rows(
            &["x", "y"],
            &[
                vec![0.0, 0.0],
                vec![1.0, 0.3],
                vec![0.2, 1.0],
                vec![0.7, 0.9],
                vec![5.0, 5.0],
            ],
        )
        .unwrap();
        let labels = Labels::Classes(["a", "a", "a", "a", "b"].map(String::from).to_vec());
        let model = fit_class_distance(&m, &labels, &ClassDistanceOptions::default()).unwrap();
        assert_eq!(model.singular_classes(), vec!["b".to_string()]);
        assert!(matches!(
            model.ensure_complete(),
            Err(PrepError::SingularCovariance { .. })
        ));

        let scores = score(&model, &m).unwrap();
        assert!(scores.get(0, 0).is_finite());
        assert!(scores.get(0, 1).is_nan());
    }

    #[test]
    fn test_pca_handles_rank_deficient_class() {
        let rows: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64, 2.0 * i as f64]).collect();
        let m = Matrix::from_rows(&["x", "y"], &rows).unwrap();
        let labels = Labels::Classes(vec!["only".to_string(); 8]);

        let plain = fit_class_distance(&m, &labels, &ClassDistanceOptions::default()).unwrap();
        assert_eq!(plain.singular_classes().len(), 1);

        let options = ClassDistanceOptions {
            pca: true,
            ..Default::default()
        };
        let projected = fit_class_distance(&m, &labels, &options).unwrap();
        assert!(projected.ensure_complete().is_ok());
        assert_eq!(projected.classes[0].components, 1);
    }

    #[test]
    fn test_numeric_labels_binned() {
        let values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let breaks = quantile_breaks(&values, 5);
        assert_eq!(breaks.len(), 6);
        assert_eq!(quantile_group(&breaks, 1.0), Some(1));
        assert_eq!(quantile_group(&breaks, 10.0), Some(5));
        assert_eq!(quantile_group(&breaks, f64::NAN), None);

        let (assigned, classes) = Labels::Numeric(values).resolve(5);
        assert_eq!(classes, vec!["Q1", "Q2", "Q3", "Q4", "Q5"]);
        assert_eq!(assigned[0].as_deref(), Some("Q1"));
    }

    #[test]
    fn test_json_round_trip() {
        let (m, labels) = two_clusters();
        let model = fit_class_distance(&m, &labels, &ClassDistanceOptions::default()).unwrap();
        let restored = ClassCentroidModel::from_json(&model.to_json().unwrap()).unwrap();
        assert_eq!(restored, model);
    }

    #[test]
    fn test_log_transform_floors_zero_distance() {
        let log = DistanceTransform::Log;
        assert!(log.apply(0.0).is_finite());
        assert!(log.apply(f64::NAN).is_nan());
        assert_eq!(log.apply(1.0), 0.0);
    }
}
