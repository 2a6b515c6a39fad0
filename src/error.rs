//! Error types for the preprocessing engine.
//!
//! Global failures (schema mismatch on apply, degenerate input, bad options)
//! abort the call with a `PrepError`. Per-column degradations never surface
//! here; they are recorded as diagnostics on the fitted bundle.

use thiserror::Error;

/// Errors returned by the library entry points.
#[derive(Debug, Error)]
pub enum PrepError {
    /// A fitted bundle was applied to a matrix lacking required columns.
    #[error("schema mismatch: required column(s) absent: {}", .missing.join(", "))]
    SchemaMismatch {
        /// Names of the required columns that were not found
        missing: Vec<String>,
    },

    /// An operation name that the engine does not recognise.
    #[error("unknown preprocessing operation: '{0}'")]
    InvalidOperation(String),

    /// Two requested operations that cannot be combined in one pipeline.
    #[error("operations '{0}' and '{1}' are mutually exclusive")]
    ConflictingOperations(String, String),

    /// Box-Cox requested on a column holding zero or negative values.
    ///
    /// Fitting never returns this; it is the error kind behind the
    /// pass-through diagnostic recorded for the column.
    #[error("column '{column}' contains non-positive values")]
    NonPositiveData { column: String },

    /// One or more classes have a singular covariance matrix.
    #[error("singular covariance for class(es): {}", .classes.join(", "))]
    SingularCovariance { classes: Vec<String> },

    /// The matrix has no rows or no columns.
    #[error("degenerate matrix ({rows} rows x {cols} columns)")]
    InsufficientRank { rows: usize, cols: usize },

    /// A parallel vector does not line up with the matrix rows.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The matrix violates a structural requirement.
    #[error("invalid matrix: {0}")]
    InvalidMatrix(String),

    /// An option is out of its valid range.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// The matrix is wider than the configured decomposition limit.
    #[error("{cols} columns exceeds the configured maximum of {max}")]
    ColumnLimitExceeded { cols: usize, max: usize },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),
}

pub type Result<T> = std::result::Result<T, PrepError>;
