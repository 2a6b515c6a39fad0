//! Tests for correlation matrices and greedy pruning

use tabprep::pipeline::{
    correlation_matrix, find_correlated, find_correlated_names, CorrelationMatrix, Matrix,
    MissingPolicy,
};

#[path = "common/mod.rs"]
mod common;

#[test]
fn test_pruning_drops_one_of_each_correlated_pair() {
    let m = common::correlated_matrix(200, 7);
    let corr = correlation_matrix(&m, MissingPolicy::Pairwise);
    let names = find_correlated_names(&corr, 0.9);

    assert_eq!(names.len(), 2, "Expected one drop per pair, got {:?}", names);
    assert!(names.contains(&"x0".to_string()) ^ names.contains(&"x1".to_string()));
    assert!(names.contains(&"x2".to_string()) ^ names.contains(&"x3".to_string()));
}

#[test]
fn test_pruning_is_idempotent() {
    let m = common::correlated_matrix(200, 11);
    let corr = correlation_matrix(&m, MissingPolicy::Pairwise);
    let drop = find_correlated(&corr, 0.75);
    assert!(!drop.is_empty());

    let pruned = m.drop_indices(&drop);
    let again = correlation_matrix(&pruned, MissingPolicy::Pairwise);
    assert!(
        find_correlated(&again, 0.75).is_empty(),
        "Second pass at the same cutoff should drop nothing"
    );
}

#[test]
fn test_constant_column_never_drives_pruning() {
    let m = Matrix::from_columns(vec![
        ("x", vec![1.0, 2.0, 3.0, 4.0]),
        ("flat", vec![2.0; 4]),
    ])
    .unwrap();
    let corr = correlation_matrix(&m, MissingPolicy::Pairwise);

    assert_eq!(corr.get(0, 0), 1.0);
    assert_eq!(corr.get(1, 1), 1.0);
    assert!(corr.get(0, 1).is_nan());
    assert!(find_correlated(&corr, 0.5).is_empty());
}

#[test]
fn test_pairwise_and_listwise_differ_with_missing() {
    let m = Matrix::from_columns(vec![
        ("a", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
        ("b", vec![1.0, 2.0, 3.0, 4.0, 5.0, 1.0]),
        ("c", vec![f64::NAN, 1.0, 2.0, 3.0, 4.0, f64::NAN]),
    ])
    .unwrap();

    let pairwise = correlation_matrix(&m, MissingPolicy::Pairwise);
    let listwise = correlation_matrix(&m, MissingPolicy::Listwise);

    // Listwise drops rows 0 and 5, where a and b disagree
    assert!((listwise.get(0, 1) - 1.0).abs() < 1e-12);
    assert!(pairwise.get(0, 1) < 0.9);
}

#[test]
fn test_tie_drops_larger_index() {
    let corr = CorrelationMatrix::from_rows(
        &["a", "b"],
        &[vec![1.0, 0.95], vec![0.95, 1.0]],
    )
    .unwrap();
    assert_eq!(find_correlated(&corr, 0.9), vec![1]);
}
