//! tabprep: preprocessing CLI
//!
//! Screens numeric datasets for degenerate columns, fits preprocessing
//! pipelines and class-centroid models, and applies them to new data.

use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use console::style;

use tabprep::cli::{commands, Cli, Commands};
use tabprep::pipeline::{ClassDistanceOptions, DistanceTransform};
use tabprep::utils::{print_banner, print_completion};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    print_banner(env!("CARGO_PKG_VERSION"));
    let start = Instant::now();

    match &cli.command {
        Commands::Nzv {
            input,
            freq_cut,
            unique_cut,
            metrics,
        } => commands::run_nzv(input, *freq_cut, *unique_cut, *metrics)?,
        Commands::Correlated {
            input,
            cutoff,
            listwise,
        } => commands::run_correlated(input, *cutoff, *listwise)?,
        Commands::Combos { input, tolerance } => commands::run_combos(input, *tolerance)?,
        Commands::Fit(args) => commands::run_fit(args)?,
        Commands::Apply {
            model,
            input,
            output,
            keep,
        } => commands::run_apply(model, input, output.as_deref(), keep)?,
        Commands::ClassFit {
            input,
            target,
            output,
            classes,
            pca,
            keep,
            thresh,
            groups,
            transform,
            strict,
        } => {
            let options = ClassDistanceOptions {
                pca: *pca,
                keep: *keep,
                thresh: *thresh,
                groups: *groups,
                transform: transform.parse::<DistanceTransform>()?,
                ..Default::default()
            };
            commands::run_class_fit(input, target, output, *classes, &options, *strict)?
        }
        Commands::ClassScore {
            model,
            input,
            output,
        } => commands::run_class_score(model, input, output.as_deref())?,
    }

    println!(
        "\n    {}",
        style(format!("Completed in {:.2}s", start.elapsed().as_secs_f64())).dim()
    );
    print_completion();
    Ok(())
}

/// Route library logs to stderr; INFO by default, more with each `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
