//! tabprep: fit-once, apply-anywhere preprocessing for numeric matrices
//!
//! A library for screening columns (near-zero variance, pairwise
//! correlation, exact linear dependencies), estimating a preprocessing
//! pipeline on training data and replaying it on new data, and scoring rows
//! by their distance to class centroids.

pub mod cli;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod utils;

pub use error::{PrepError, Result};
