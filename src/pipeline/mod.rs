//! Pipeline module - column screening, estimation and application

pub mod class_distance;
pub mod correlation;
pub(crate) mod linalg;
pub mod linear_combos;
pub mod loader;
pub mod matrix;
pub mod nzv;
pub mod preprocess;

pub use class_distance::{
    fit_class_distance, score, ClassCentroidModel, ClassDistanceOptions, ClassStatus,
    DistanceTransform, Labels,
};
pub use correlation::*;
pub use linear_combos::{find_linear_combos, LinearComboReport, RankTolerance};
pub use loader::*;
pub use matrix::Matrix;
pub use nzv::*;
pub use preprocess::{
    apply, fit, parse_operations, Diagnostic, DiagnosticKind, FittedPreprocessor, FittedStep,
    Operation, PreprocessOptions, RemovedColumn,
};
