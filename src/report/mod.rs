//! Report module - summarizing screening and fitting results

pub mod summary;

pub use summary::*;
