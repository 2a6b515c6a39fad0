//! Subcommand execution

use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::DataFrame;

use super::args::{derive_output_path, FitArgs};
use crate::pipeline::{
    correlation_matrix, detect_nzv, extract_labels, find_correlated, find_linear_combos,
    fit, fit_class_distance, load_dataset, save_dataset, ClassCentroidModel, ClassDistanceOptions,
    FittedPreprocessor, Matrix, MissingPolicy, NzvThresholds, RankTolerance,
};
use crate::report::{print_class_table, print_combos_table, print_nzv_table, FitSummary};
use crate::utils::{
    create_spinner, finish_with_success, finish_with_warning, print_count, print_info,
    print_list, print_paths, print_step_header, print_success, print_warning,
};

/// Load a dataset and convert its numeric columns, leaving out `exclude`.
fn load_matrix(path: &Path, exclude: &[String]) -> Result<(DataFrame, Matrix)> {
    let spinner = create_spinner("Loading dataset...");
    let df = load_dataset(path)?;
    let loaded = Matrix::from_dataframe(&df, exclude)
        .with_context(|| format!("Failed to convert dataset: {}", path.display()))?;
    finish_with_success(
        &spinner,
        &format!(
            "Loaded {} rows × {} numeric columns",
            loaded.matrix.nrows(),
            loaded.matrix.ncols()
        ),
    );
    if !loaded.skipped.is_empty() {
        print_warning(&format!(
            "Skipped {} non-numeric column(s): {}",
            loaded.skipped.len(),
            loaded.skipped.join(", ")
        ));
    }
    Ok((df, loaded.matrix))
}

fn write_json(path: &Path, json: &str) -> Result<()> {
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write model file: {}", path.display()))
}

fn read_json(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read model file: {}", path.display()))
}

pub fn run_nzv(input: &Path, freq_cut: f64, unique_cut: f64, metrics: bool) -> Result<()> {
    print_paths(input, None);
    let (_, matrix) = load_matrix(input, &[])?;

    print_step_header(1, "Near-Zero Variance");
    let report = detect_nzv(&matrix, &NzvThresholds { freq_cut, unique_cut });
    print_count(
        "near-zero-variance columns",
        report.flags.len(),
        Some(&format!("(freq ratio > {freq_cut}, unique < {unique_cut}%)")),
    );
    if metrics || !report.flags.is_empty() {
        print_nzv_table(&report, metrics);
    }
    Ok(())
}

pub fn run_correlated(input: &Path, cutoff: f64, listwise: bool) -> Result<()> {
    print_paths(input, None);
    let (_, matrix) = load_matrix(input, &[])?;

    print_step_header(1, "Correlation Pruning");
    let policy = if listwise {
        MissingPolicy::Listwise
    } else {
        MissingPolicy::Pairwise
    };
    let spinner = create_spinner("Computing correlation matrix...");
    let corr = correlation_matrix(&matrix, policy);
    finish_with_success(&spinner, &format!("{0} × {0} correlation matrix", corr.size()));

    let drop = find_correlated(&corr, cutoff);
    print_count("columns to drop", drop.len(), Some(&format!("(|r| > {cutoff})")));
    let names: Vec<String> = drop.iter().map(|&j| matrix.names()[j].clone()).collect();
    print_list(&names);
    Ok(())
}

pub fn run_combos(input: &Path, relative: f64) -> Result<()> {
    print_paths(input, None);
    let (_, matrix) = load_matrix(input, &[])?;

    print_step_header(1, "Linear Dependencies");
    let tolerance = RankTolerance {
        relative,
        ..Default::default()
    };
    let report = find_linear_combos(&matrix, &tolerance)?;
    if report.is_empty() {
        print_success("Columns have full rank");
        return Ok(());
    }
    print_count("dependency groups", report.groups.len(), None);
    print_combos_table(&report, matrix.names());
    print_info(&format!("Remove: {}", report.remove_names(&matrix).join(", ")));
    Ok(())
}

pub fn run_fit(args: &FitArgs) -> Result<()> {
    print_paths(&args.input, Some(&args.output));
    let operations = args.operations()?;
    let options = args.to_options();
    let (_, matrix) = load_matrix(&args.input, &args.exclude)?;

    print_step_header(1, "Estimate");
    let spinner = create_spinner("Fitting preprocessing steps...");
    let fitted = fit(&matrix, &operations, &options)?;
    let degraded = fitted.diagnostics().len();
    if degraded == 0 {
        finish_with_success(&spinner, "Preprocessor fitted");
    } else {
        finish_with_warning(&spinner, &format!("Preprocessor fitted with {degraded} diagnostic(s)"));
        for diagnostic in fitted.diagnostics() {
            print_info(&diagnostic.to_string());
        }
    }

    print_step_header(2, "Save");
    write_json(&args.output, &fitted.to_json()?)?;
    print_success(&format!("Saved model to {}", args.output.display()));

    FitSummary::new(&fitted).display();
    Ok(())
}

pub fn run_apply(model: &Path, input: &Path, output: Option<&Path>, keep: &[String]) -> Result<()> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| derive_output_path(input, "_processed"));
    print_paths(input, Some(&output));

    let fitted = FittedPreprocessor::from_json(&read_json(model)?)
        .with_context(|| format!("Invalid preprocessor file: {}", model.display()))?;
    let (df, matrix) = load_matrix(input, &[])?;

    print_step_header(1, "Apply");
    let spinner = create_spinner("Applying preprocessing steps...");
    let processed = fitted.apply(&matrix)?;
    finish_with_success(
        &spinner,
        &format!("{} rows × {} columns", processed.nrows(), processed.ncols()),
    );

    let mut out = with_kept_columns(processed.to_dataframe()?, &df, keep)?;
    save_dataset(&mut out, &output)?;
    print_success(&format!("Saved to {}", output.display()));
    Ok(())
}

pub fn run_class_fit(
    input: &Path,
    target: &str,
    output: &Path,
    as_classes: bool,
    options: &ClassDistanceOptions,
    strict: bool,
) -> Result<()> {
    print_paths(input, Some(output));
    let (df, matrix) = load_matrix(input, &[target.to_string()])?;
    let labels = extract_labels(&df, target, as_classes)
        .with_context(|| format!("Failed to read label column '{}'", target))?;

    print_step_header(1, "Class Centroids");
    let spinner = create_spinner("Fitting class centroids...");
    let model = fit_class_distance(&matrix, &labels, options)?;
    let singular = model.singular_classes();
    if singular.is_empty() {
        finish_with_success(&spinner, &format!("{} classes fitted", model.classes.len()));
    } else {
        finish_with_warning(
            &spinner,
            &format!("{} singular class(es): {}", singular.len(), singular.join(", ")),
        );
    }
    if strict {
        model.ensure_complete()?;
    }

    write_json(output, &model.to_json()?)?;
    print_success(&format!("Saved model to {}", output.display()));
    print_class_table(&model);
    Ok(())
}

pub fn run_class_score(model: &Path, input: &Path, output: Option<&Path>) -> Result<()> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| derive_output_path(input, "_distances"));
    print_paths(input, Some(&output));

    let model = ClassCentroidModel::from_json(&read_json(model)?)
        .with_context(|| format!("Invalid class model file: {}", model.display()))?;
    let (_, matrix) = load_matrix(input, &[])?;

    let scores = model.score(&matrix)?;
    let mut out = scores.to_dataframe()?;
    save_dataset(&mut out, &output)?;
    print_success(&format!("Saved {} distance columns to {}", scores.ncols(), output.display()));
    Ok(())
}

/// Append columns copied unchanged from the source frame.
fn with_kept_columns(out: DataFrame, source: &DataFrame, keep: &[String]) -> Result<DataFrame> {
    if keep.is_empty() {
        return Ok(out);
    }
    let kept = source
        .select(keep.iter().map(String::as_str))
        .context("Failed to select columns to keep")?;
    out.hstack(kept.get_columns())
        .context("Failed to combine kept columns with the output")
}
