//! Tests for the preprocessing estimator and applicator

use tabprep::pipeline::{
    apply, fit, parse_operations, DiagnosticKind, FittedPreprocessor, FittedStep, Matrix, Operation,
    PreprocessOptions,
};
use tabprep::PrepError;

#[path = "common/mod.rs"]
mod common;

fn ops(list: &str) -> Vec<Operation> {
    parse_operations(list).unwrap()
}

#[test]
fn test_center_scale_known_values() {
    let train = Matrix::from_columns(vec![("x", vec![1.0, 2.0, 3.0, 4.0, 5.0])]).unwrap();
    let fitted = fit(&train, &ops("center,scale"), &PreprocessOptions::default()).unwrap();

    let test = Matrix::from_columns(vec![("x", vec![10.0])]).unwrap();
    let out = apply(&fitted, &test).unwrap();

    let expected = (10.0 - 3.0) / 2.5f64.sqrt();
    assert!(
        (out.get(0, 0) - expected).abs() < 1e-12,
        "Expected {}, got {}",
        expected,
        out.get(0, 0)
    );
}

#[test]
fn test_apply_never_recomputes_statistics() {
    let train = common::random_matrix(50, 3, 21);
    let fitted = fit(
        &train,
        &ops("medianImpute,YeoJohnson,center,scale"),
        &PreprocessOptions::default(),
    )
    .unwrap();

    // Applying to a single row must match applying to that row inside a batch
    let batch = common::random_matrix(10, 3, 99);
    let full = apply(&fitted, &batch).unwrap();
    for i in 0..batch.nrows() {
        let single = apply(&fitted, &batch.select_rows(&[i])).unwrap();
        for j in 0..full.ncols() {
            assert_eq!(single.get(0, j).to_bits(), full.get(i, j).to_bits());
        }
    }
}

#[test]
fn test_stored_center_scale_match_training_statistics() {
    let train = common::random_matrix(50, 3, 21);
    let fitted = fit(&train, &ops("center,scale"), &PreprocessOptions::default()).unwrap();

    apply(&fitted, &common::random_matrix(10, 3, 5)).unwrap();
    apply(&fitted, &common::random_matrix(7, 3, 6)).unwrap();

    let n = train.nrows() as f64;
    let means: Vec<f64> = (0..3).map(|j| train.column(j).iter().sum::<f64>() / n).collect();
    let sds: Vec<f64> = (0..3)
        .map(|j| {
            let ss: f64 = train.column(j).iter().map(|x| (x - means[j]).powi(2)).sum();
            (ss / (n - 1.0)).sqrt()
        })
        .collect();

    let mut checked = 0;
    for step in fitted.steps() {
        match step {
            FittedStep::Center { means: stored } => {
                for (j, param) in stored.iter().enumerate() {
                    assert!((param.value.unwrap() - means[j]).abs() < 1e-12);
                }
                checked += 1;
            }
            FittedStep::Scale { sds: stored } => {
                for (j, param) in stored.iter().enumerate() {
                    assert!((param.value.unwrap() - sds[j]).abs() < 1e-12);
                }
                checked += 1;
            }
            _ => {}
        }
    }
    assert_eq!(checked, 2);
}

#[test]
fn test_projection_after_filters_remove_every_column() {
    let m = Matrix::from_columns(vec![("a", vec![1.0; 6]), ("b", vec![2.0; 6])]).unwrap();
    for list in ["zv,pca", "zv,ica"] {
        let err = fit(&m, &ops(list), &PreprocessOptions::default()).unwrap_err();
        assert!(
            matches!(err, PrepError::InsufficientRank { cols: 0, .. }),
            "'{}' should fail with no columns, got {:?}",
            list,
            err
        );
    }
}

#[test]
fn test_fit_and_apply_are_deterministic() {
    let mut train = common::correlated_matrix(80, 5).to_rows();
    for (i, row) in train.iter_mut().enumerate() {
        if i % 9 == 0 {
            row[i % 5] = f64::NAN;
        }
    }
    let names = ["x0", "x1", "x2", "x3", "x4"];
    let train = Matrix::from_rows(&names, &train).unwrap();
    let options = PreprocessOptions {
        bag_trees: 5,
        ..Default::default()
    };

    for list in ["bagImpute,center,scale,ica", "knnImpute,pca,spatialSign"] {
        let first = fit(&train, &ops(list), &options).unwrap();
        let second = fit(&train, &ops(list), &options).unwrap();
        assert_eq!(first, second, "Fitting '{}' twice should agree", list);

        let a = apply(&first, &train).unwrap();
        let b = apply(&second, &train).unwrap();
        common::assert_bit_identical(&a, &b);
    }
}

#[test]
fn test_pca_naming_and_component_count() {
    let train = common::random_matrix(40, 4, 8);
    let fitted = fit(&train, &ops("pca"), &PreprocessOptions::default()).unwrap();

    let k = fitted.output_columns().len();
    assert!((1..=4).contains(&k), "Expected 1..=4 components, got {}", k);
    for (c, name) in fitted.output_columns().iter().enumerate() {
        assert_eq!(name, &format!("PC{}", c + 1));
    }
    assert_eq!(
        fitted.operations(),
        &[Operation::Center, Operation::Scale, Operation::Pca]
    );

    let fixed = PreprocessOptions {
        pca_comp: Some(2),
        ..Default::default()
    };
    let fitted = fit(&train, &ops("pca"), &fixed).unwrap();
    assert_eq!(fitted.output_columns(), &["PC1".to_string(), "PC2".to_string()]);
}

#[test]
fn test_spatial_sign_unit_norm() {
    let train = common::random_matrix(20, 3, 4);
    let fitted = fit(&train, &ops("center,scale,spatialSign"), &PreprocessOptions::default()).unwrap();
    let out = apply(&fitted, &train).unwrap();

    for row in out.to_rows() {
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12, "Row norm should be 1, got {}", norm);
    }
}

#[test]
fn test_filters_chain_and_record_reasons() {
    let m = Matrix::from_columns(vec![
        ("x0", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
        ("x1", vec![1.1, 2.0, 3.2, 3.9, 5.1, 6.0]),
        ("flat", vec![1.0; 6]),
        ("z", vec![3.0, 1.0, 4.0, 1.0, 5.0, 9.0]),
    ])
    .unwrap();
    let fitted = fit(&m, &ops("corr,zv"), &PreprocessOptions::default()).unwrap();

    let removed: Vec<(&str, Operation)> = fitted
        .removed()
        .iter()
        .map(|r| (r.name.as_str(), r.reason))
        .collect();
    assert_eq!(removed.len(), 2);
    assert_eq!(removed[0], ("flat", Operation::Zv));
    assert_eq!(removed[1].1, Operation::Corr);
    assert_eq!(fitted.output_columns().len(), 2);
    assert_eq!(fitted.required_columns(), fitted.output_columns());
}

#[test]
fn test_box_cox_degrades_on_non_positive_column() {
    let m = Matrix::from_columns(vec![
        ("pos", (1..=20).map(|i| (i as f64 / 4.0).exp()).collect()),
        ("signed", (0..20).map(|i| i as f64 - 10.0).collect()),
    ])
    .unwrap();
    let fitted = fit(&m, &ops("BoxCox"), &PreprocessOptions::default()).unwrap();

    let diag = fitted
        .diagnostics()
        .iter()
        .find(|d| d.column.as_deref() == Some("signed"))
        .expect("signed column should be reported");
    assert_eq!(diag.kind, DiagnosticKind::NonPositiveData);

    let out = apply(&fitted, &m).unwrap();
    assert_eq!(out.column(1), m.column(1), "Non-positive column passes through");
    assert!((out.get(0, 0) - 0.25).abs() < 1e-12, "Positive column is log transformed");
}

#[test]
fn test_median_impute_uses_training_median() {
    let train = Matrix::from_columns(vec![("x", vec![1.0, 2.0, 3.0, 100.0, f64::NAN])]).unwrap();
    let fitted = fit(&train, &ops("medianImpute"), &PreprocessOptions::default()).unwrap();

    let test = Matrix::from_columns(vec![("x", vec![f64::NAN, 7.0])]).unwrap();
    let out = apply(&fitted, &test).unwrap();
    assert_eq!(out.column(0), vec![2.5, 7.0]);
}

#[test]
fn test_knn_impute_forces_standardization() {
    let train = common::random_matrix(30, 3, 12);
    let fitted = fit(&train, &ops("knnImpute,range"), &PreprocessOptions::default()).unwrap();
    assert_eq!(
        fitted.operations(),
        &[Operation::KnnImpute, Operation::Center, Operation::Scale]
    );
    assert!(fitted
        .diagnostics()
        .iter()
        .any(|d| d.kind == DiagnosticKind::PlanAdjusted));
}

#[test]
fn test_ica_outputs_named_components() {
    let train = common::random_matrix(100, 3, 17);
    let options = PreprocessOptions {
        ica_comp: Some(2),
        ..Default::default()
    };
    let fitted = fit(&train, &ops("pca,ica"), &options).unwrap();
    assert_eq!(fitted.output_columns(), &["ICA1".to_string(), "ICA2".to_string()]);
    assert!(matches!(fitted.steps().last(), Some(FittedStep::Ica { .. })));
}

#[test]
fn test_conflicting_operations_rejected() {
    let train = common::random_matrix(10, 2, 1);
    let err = fit(&train, &ops("BoxCox,expoTrans"), &PreprocessOptions::default()).unwrap_err();
    assert!(matches!(err, PrepError::ConflictingOperations(_, _)));
}

#[test]
fn test_unknown_operation_rejected() {
    assert!(matches!(
        parse_operations("center,whiten"),
        Err(PrepError::InvalidOperation(name)) if name == "whiten"
    ));
}

#[test]
fn test_schema_mismatch_lists_absent_columns() {
    let train = common::random_matrix(10, 3, 2);
    let fitted = fit(&train, &ops("center"), &PreprocessOptions::default()).unwrap();
    let partial = train.select(&["x1".to_string()]).unwrap();

    match apply(&fitted, &partial) {
        Err(PrepError::SchemaMismatch { missing }) => {
            assert_eq!(missing, vec!["x0".to_string(), "x2".to_string()])
        }
        other => panic!("Expected schema mismatch, got {:?}", other.map(|m| m.names().to_vec())),
    }
}

#[test]
fn test_json_round_trip_preserves_output() {
    let train = common::random_matrix(40, 4, 31);
    let fitted = fit(
        &train,
        &ops("zv,YeoJohnson,center,scale,pca"),
        &PreprocessOptions::default(),
    )
    .unwrap();
    let restored = FittedPreprocessor::from_json(&fitted.to_json().unwrap()).unwrap();

    let a = apply(&fitted, &train).unwrap();
    let b = apply(&restored, &train).unwrap();
    common::assert_bit_identical(&a, &b);
}
