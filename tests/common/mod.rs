//! Shared test utilities and fixture generators

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tabprep::pipeline::Matrix;
use tempfile::TempDir;

/// Two-way layout with an intercept: one row per (A, B) cell, A with two
/// levels and B with three, each coded by a full set of indicators.
///
/// Columns: `int`, `a1`, `a2`, `b1`, `b2`, `b3`. Both indicator sets sum to
/// the intercept, so `a2` and `b3` are linear combinations of the others.
pub fn two_way_layout() -> Matrix {
    let mut rows = Vec::new();
    for a in 0..2 {
        for b in 0..3 {
            rows.push(vec![
                1.0,
                (a == 0) as u8 as f64,
                (a == 1) as u8 as f64,
                (b == 0) as u8 as f64,
                (b == 1) as u8 as f64,
                (b == 2) as u8 as f64,
            ]);
        }
    }
    Matrix::from_rows(&["int", "a1", "a2", "b1", "b2", "b3"], &rows).unwrap()
}

/// Uniform random matrix with columns `x0..x{cols-1}`.
pub fn random_matrix(rows: usize, cols: usize, seed: u64) -> Matrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let columns: Vec<(String, Vec<f64>)> = (0..cols)
        .map(|j| {
            let values: Vec<f64> = (0..rows).map(|_| rng.gen::<f64>()).collect();
            (format!("x{}", j), values)
        })
        .collect();
    Matrix::from_columns(columns).unwrap()
}

/// Random matrix where `x1` tracks `x0` closely and `x3` mirrors `x2`.
pub fn correlated_matrix(rows: usize, seed: u64) -> Matrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let x0: Vec<f64> = (0..rows).map(|_| rng.gen::<f64>()).collect();
    let x1: Vec<f64> = x0.iter().map(|v| v + 0.05 * rng.gen::<f64>()).collect();
    let x2: Vec<f64> = (0..rows).map(|_| rng.gen::<f64>()).collect();
    let x3: Vec<f64> = x2.iter().map(|v| 1.0 - v + 0.05 * rng.gen::<f64>()).collect();
    let x4: Vec<f64> = (0..rows).map(|_| rng.gen::<f64>()).collect();
    Matrix::from_columns(vec![("x0", x0), ("x1", x1), ("x2", x2), ("x3", x3), ("x4", x4)]).unwrap()
}

/// Mixed-type frame with an id column, a class label and numeric features
pub fn create_test_dataframe() -> DataFrame {
    df! {
        "id" => ["r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10"],
        "label" => ["a", "a", "a", "a", "a", "b", "b", "b", "b", "b"],
        "x" => [1.0f64, 1.4, 0.8, 1.2, 0.9, 5.0, 5.3, 4.8, 5.1, 4.7],
        "y" => [2.0f64, 2.3, 1.9, 2.6, 2.2, 7.1, 6.8, 7.4, 6.9, 7.2],
        "flat" => [3.0f64; 10],
        "gappy" => [Some(1.0f64), None, Some(3.0), Some(4.0), Some(2.5), Some(6.0), None, Some(8.0), Some(9.0), Some(7.5)],
    }
    .unwrap()
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("test_data.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, csv_path)
}

/// Create a temporary directory with a test Parquet file
pub fn create_temp_parquet(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let parquet_path = temp_dir.path().join("test_data.parquet");

    let file = std::fs::File::create(&parquet_path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();

    (temp_dir, parquet_path)
}

/// Bitwise equality of two matrices, treating NaN entries as equal
pub fn assert_bit_identical(a: &Matrix, b: &Matrix) {
    assert_eq!(a.names(), b.names(), "column names differ");
    assert_eq!(a.nrows(), b.nrows(), "row counts differ");
    for i in 0..a.nrows() {
        for j in 0..a.ncols() {
            assert_eq!(
                a.get(i, j).to_bits(),
                b.get(i, j).to_bits(),
                "entry ({}, {}) differs: {} vs {}",
                i,
                j,
                a.get(i, j),
                b.get(i, j)
            );
        }
    }
}
