//! Named-column numeric matrix
//!
//! Missing entries are stored as `NaN`. Infinite values are rejected at
//! construction so every non-missing entry is a finite real number.

use std::collections::HashSet;

use faer::Mat;

use crate::error::{PrepError, Result};

/// A 2-D numeric table with unique column names and ordered rows.
#[derive(Debug, Clone)]
pub struct Matrix {
    names: Vec<String>,
    data: Mat<f64>,
}

impl Matrix {
    /// Build a matrix from column names and a dense faer matrix.
    pub fn new(names: Vec<String>, data: Mat<f64>) -> Result<Self> {
        if names.len() != data.ncols() {
            return Err(PrepError::DimensionMismatch {
                expected: data.ncols(),
                actual: names.len(),
            });
        }

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if name.is_empty() {
                return Err(PrepError::InvalidMatrix("empty column name".to_string()));
            }
            if !seen.insert(name.as_str()) {
                return Err(PrepError::InvalidMatrix(format!(
                    "duplicate column name '{}'",
                    name
                )));
            }
        }

        for j in 0..data.ncols() {
            for i in 0..data.nrows() {
                if data[(i, j)].is_infinite() {
                    return Err(PrepError::InvalidMatrix(format!(
                        "column '{}' row {} is infinite",
                        names[j], i
                    )));
                }
            }
        }

        Ok(Self { names, data })
    }

    /// Build a matrix from `(name, values)` pairs. All columns must share a length.
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<f64>)>) -> Result<Self> {
        let nrows = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        let mut names = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        for (name, col) in columns {
            if col.len() != nrows {
                return Err(PrepError::DimensionMismatch {
                    expected: nrows,
                    actual: col.len(),
                });
            }
            names.push(name.into());
            values.push(col);
        }
        let data = Mat::from_fn(nrows, values.len(), |i, j| values[j][i]);
        Self::new(names, data)
    }

    /// Build a matrix from row vectors.
    pub fn from_rows<S: AsRef<str>>(names: &[S], rows: &[Vec<f64>]) -> Result<Self> {
        let ncols = names.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != ncols) {
            return Err(PrepError::DimensionMismatch {
                expected: ncols,
                actual: bad.len(),
            });
        }
        let data = Mat::from_fn(rows.len(), ncols, |i, j| rows[i][j]);
        Self::new(names.iter().map(|s| s.as_ref().to_string()).collect(), data)
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn data(&self) -> &Mat<f64> {
        &self.data
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[(row, col)]
    }

    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.nrows()).map(|i| self.data[(i, col)]).collect()
    }

    pub fn row(&self, row: usize) -> Vec<f64> {
        (0..self.ncols()).map(|j| self.data[(row, j)]).collect()
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.nrows()).map(|i| self.row(i)).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn has_missing(&self) -> bool {
        (0..self.ncols()).any(|j| (0..self.nrows()).any(|i| self.data[(i, j)].is_nan()))
    }

    /// Indices of rows with no missing entries.
    pub fn complete_rows(&self) -> Vec<usize> {
        (0..self.nrows())
            .filter(|&i| (0..self.ncols()).all(|j| !self.data[(i, j)].is_nan()))
            .collect()
    }

    /// Select columns by name, in the order given.
    ///
    /// Returns `SchemaMismatch` listing every requested name that is absent.
    pub fn select(&self, names: &[String]) -> Result<Self> {
        let mut indices = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.column_index(name) {
                Some(idx) => indices.push(idx),
                None => missing.push(name.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(PrepError::SchemaMismatch { missing });
        }
        Ok(self.select_indices(&indices))
    }

    /// Select columns by position. Indices must be in range and unique.
    pub fn select_indices(&self, indices: &[usize]) -> Self {
        let data = Mat::from_fn(self.nrows(), indices.len(), |i, j| {
            self.data[(i, indices[j])]
        });
        Self {
            names: indices.iter().map(|&j| self.names[j].clone()).collect(),
            data,
        }
    }

    /// Drop columns by position, keeping the remaining order.
    pub fn drop_indices(&self, drop: &[usize]) -> Self {
        let keep: Vec<usize> = (0..self.ncols()).filter(|j| !drop.contains(j)).collect();
        self.select_indices(&keep)
    }

    /// Select rows by position.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let data = Mat::from_fn(rows.len(), self.ncols(), |i, j| self.data[(rows[i], j)]);
        Self {
            names: self.names.clone(),
            data,
        }
    }

    /// Replace the values while keeping names. Shape must match.
    pub(crate) fn with_data(&self, data: Mat<f64>) -> Self {
        debug_assert_eq!(data.ncols(), self.names.len());
        Self {
            names: self.names.clone(),
            data,
        }
    }

    /// Assemble from parts that are already known to be valid.
    pub(crate) fn from_parts(names: Vec<String>, data: Mat<f64>) -> Self {
        debug_assert_eq!(names.len(), data.ncols());
        Self { names, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Matrix {
        Matrix::from_columns(vec![
            ("a", vec![1.0, 2.0, 3.0]),
            ("b", vec![4.0, f64::NAN, 6.0]),
            ("c", vec![7.0, 8.0, 9.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_shape_and_access() {
        let m = sample();
        assert_eq!(m.nrows(), 3);
        assert_eq!(m.ncols(), 3);
        assert_eq!(m.get(2, 0), 3.0);
        assert_eq!(m.column(2), vec![7.0, 8.0, 9.0]);
        assert_eq!(m.column_index("b"), Some(1));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = Matrix::from_columns(vec![("a", vec![1.0]), ("a", vec![2.0])]);
        assert!(matches!(result, Err(PrepError::InvalidMatrix(_))));
    }

    #[test]
    fn test_infinite_rejected() {
        let result = Matrix::from_columns(vec![("a", vec![1.0, f64::INFINITY])]);
        assert!(matches!(result, Err(PrepError::InvalidMatrix(_))));
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let result = Matrix::from_columns(vec![("a", vec![1.0, 2.0]), ("b", vec![1.0])]);
        assert!(matches!(result, Err(PrepError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_complete_rows_skip_missing() {
        let m = sample();
        assert!(m.has_missing());
        assert_eq!(m.complete_rows(), vec![0, 2]);
    }

    #[test]
    fn test_select_reports_all_missing_names() {
        let m = sample();
        let err = m
            .select(&["c".to_string(), "x".to_string(), "y".to_string()])
            .unwrap_err();
        match err {
            PrepError::SchemaMismatch { missing } => assert_eq!(missing, vec!["x", "y"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_select_reorders() {
        let m = sample();
        let s = m.select(&["c".to_string(), "a".to_string()]).unwrap();
        assert_eq!(s.names(), &["c".to_string(), "a".to_string()]);
        assert_eq!(s.row(0), vec![7.0, 1.0]);
    }

    #[test]
    fn test_drop_indices() {
        let m = sample().drop_indices(&[1]);
        assert_eq!(m.names(), &["a".to_string(), "c".to_string()]);
    }
}
