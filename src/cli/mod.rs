//! CLI module - argument parsing and subcommand execution

mod args;
pub mod commands;

pub use args::{derive_output_path, Cli, Commands, FitArgs};
