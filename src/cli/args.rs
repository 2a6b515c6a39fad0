//! Command-line argument definitions using clap

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::pipeline::{MissingPolicy, Operation, PreprocessOptions};

/// tabprep - Screen, fit and apply preprocessing to numeric datasets
#[derive(Parser, Debug)]
#[command(name = "tabprep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report near-zero-variance columns
    Nzv {
        /// Input file path (CSV or Parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Ratio of most to second most frequent value above which a column is suspect
        #[arg(long, default_value = "19.0")]
        freq_cut: f64,

        /// Percentage of distinct values below which a column is suspect
        #[arg(long, default_value = "10.0", value_parser = validate_percentage)]
        unique_cut: f64,

        /// Print the full per-column metrics table
        #[arg(long, default_value = "false")]
        metrics: bool,
    },

    /// Report columns to drop so no pairwise correlation exceeds the cutoff
    Correlated {
        /// Input file path (CSV or Parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Absolute correlation cutoff
        #[arg(long, default_value = "0.9", value_parser = validate_unit_interval)]
        cutoff: f64,

        /// Use only fully complete rows instead of pairwise-complete rows
        #[arg(long, default_value = "false")]
        listwise: bool,
    },

    /// Report exact linear dependencies between columns
    Combos {
        /// Input file path (CSV or Parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Relative residual tolerance for declaring a column dependent
        #[arg(long, default_value = "1e-7")]
        tolerance: f64,
    },

    /// Estimate a preprocessing pipeline and save it as JSON
    Fit(FitArgs),

    /// Apply a saved preprocessing pipeline to a dataset
    Apply {
        /// Saved preprocessor (JSON)
        #[arg(short, long)]
        model: PathBuf,

        /// Input file path (CSV or Parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (CSV or Parquet, determined by extension).
        /// Defaults to the input directory with a '_processed' suffix.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Columns copied unchanged from the input next to the processed columns
        #[arg(long, value_delimiter = ',')]
        keep: Vec<String>,
    },

    /// Fit class centroids for distance features
    ClassFit {
        /// Input file path (CSV or Parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Label column
        #[arg(short, long)]
        target: String,

        /// Saved class model (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Treat a numeric label column as class names instead of binning it
        #[arg(long, default_value = "false")]
        classes: bool,

        /// Project each class onto its principal components first
        #[arg(long, default_value = "false")]
        pca: bool,

        /// Fixed number of components per class (with --pca)
        #[arg(long)]
        keep: Option<usize>,

        /// Cumulative variance share kept per class (with --pca)
        #[arg(long, default_value = "0.95", value_parser = validate_unit_interval)]
        thresh: f64,

        /// Quantile groups for a numeric label
        #[arg(long, default_value = "5")]
        groups: usize,

        /// Distance transform: log1p, log or identity
        #[arg(long, default_value = "log1p")]
        transform: String,

        /// Fail instead of warning when a class covariance is singular
        #[arg(long, default_value = "false")]
        strict: bool,
    },

    /// Score a dataset against saved class centroids
    ClassScore {
        /// Saved class model (JSON)
        #[arg(short, long)]
        model: PathBuf,

        /// Input file path (CSV or Parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path. Defaults to a '_distances' suffix next to the input.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Options for the `fit` subcommand
#[derive(Args, Debug)]
pub struct FitArgs {
    /// Input file path (CSV or Parquet)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Comma-separated operations, e.g. "nzv,corr,medianImpute,YeoJohnson,pca"
    #[arg(long)]
    pub ops: String,

    /// Saved preprocessor (JSON)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Columns to leave out of estimation (comma-separated), e.g. ids or labels
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Frequency-ratio cutoff for nzv
    #[arg(long, default_value = "19.0")]
    pub freq_cut: f64,

    /// Unique-percentage cutoff for nzv
    #[arg(long, default_value = "10.0", value_parser = validate_percentage)]
    pub unique_cut: f64,

    /// Absolute correlation cutoff for corr
    #[arg(long, default_value = "0.9", value_parser = validate_unit_interval)]
    pub cutoff: f64,

    /// Listwise instead of pairwise missing handling for corr
    #[arg(long, default_value = "false")]
    pub listwise: bool,

    /// Cumulative variance share kept by pca
    #[arg(long, default_value = "0.95", value_parser = validate_unit_interval)]
    pub thresh: f64,

    /// Fixed number of principal components
    #[arg(long)]
    pub pca_comp: Option<usize>,

    /// Number of independent components
    #[arg(long)]
    pub ica_comp: Option<usize>,

    /// Neighbours for knnImpute
    #[arg(long, default_value = "5")]
    pub k: usize,

    /// Trees per column for bagImpute
    #[arg(long, default_value = "25")]
    pub bag_trees: usize,

    /// Lower bound for range
    #[arg(long, default_value = "0.0", allow_negative_numbers = true)]
    pub range_min: f64,

    /// Upper bound for range
    #[arg(long, default_value = "1.0", allow_negative_numbers = true)]
    pub range_max: f64,

    /// Seed for bagImpute sampling and the ica starting point
    #[arg(long, default_value = "42")]
    pub seed: u64,
}

impl FitArgs {
    /// Parse the requested operation list.
    pub fn operations(&self) -> crate::error::Result<Vec<Operation>> {
        crate::pipeline::parse_operations(&self.ops)
    }

    /// Build estimation options from the flags; unset options keep defaults.
    pub fn to_options(&self) -> PreprocessOptions {
        PreprocessOptions {
            freq_cut: self.freq_cut,
            unique_cut: self.unique_cut,
            corr_cutoff: self.cutoff,
            corr_missing: if self.listwise {
                MissingPolicy::Listwise
            } else {
                MissingPolicy::Pairwise
            },
            thresh: self.thresh,
            pca_comp: self.pca_comp,
            ica_comp: self.ica_comp,
            k: self.k,
            bag_trees: self.bag_trees,
            range_bounds: (self.range_min, self.range_max),
            seed: self.seed,
            ..Default::default()
        }
    }
}

/// Derive an output path next to `input`: `<stem><suffix>.<ext>`.
pub fn derive_output_path(input: &Path, suffix: &str) -> PathBuf {
    let parent = input.parent().unwrap_or_else(|| Path::new("."));
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("parquet");
    parent.join(format!("{}{}.{}", stem, suffix, extension))
}

/// Validator for cutoffs and variance shares
fn validate_unit_interval(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if !(0.0..=1.0).contains(&value) {
        Err(format!("value must be between 0.0 and 1.0, got {}", value))
    } else {
        Ok(value)
    }
}

/// Validator for percentage parameters
fn validate_percentage(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if !(0.0..=100.0).contains(&value) {
        Err(format!(
            "percentage must be between 0.0 and 100.0, got {}",
            value
        ))
    } else {
        Ok(value)
    }
}
