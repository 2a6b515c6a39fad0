//! Summary tables for screening reports and fitted models

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::pipeline::{
    ClassCentroidModel, ClassStatus, DiagnosticKind, FittedPreprocessor, LinearComboReport, NzvReport,
};

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    table
}

fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

fn print_section(icon: &str, title: &str) {
    println!();
    println!("    {} {}", style(icon).cyan(), style(title).white().bold());
    println!("    {}", style("─".repeat(50)).dim());
    println!();
}

/// Summary of a fitted preprocessor
#[derive(Debug, Default)]
pub struct FitSummary {
    pub input_columns: usize,
    pub output_columns: usize,
    pub operations: Vec<String>,
    pub removed: Vec<(String, String)>,
    pub degraded: usize,
    pub adjustments: usize,
}

impl FitSummary {
    pub fn new(fitted: &FittedPreprocessor) -> Self {
        let adjustments = fitted
            .diagnostics()
            .iter()
            .filter(|d| d.kind == DiagnosticKind::PlanAdjusted)
            .count();
        Self {
            input_columns: fitted.input_columns().len(),
            output_columns: fitted.output_columns().len(),
            operations: fitted.operations().iter().map(|o| o.to_string()).collect(),
            removed: fitted
                .removed()
                .iter()
                .map(|r| (r.name.clone(), r.reason.to_string()))
                .collect(),
            degraded: fitted.diagnostics().len() - adjustments,
            adjustments,
        }
    }

    pub fn display(&self) {
        print_section("📋", "FIT SUMMARY");

        let mut table = new_table(&["Metric", "Value"]);
        table.add_row(vec![Cell::new("📁 Input Columns"), Cell::new(self.input_columns)]);
        table.add_row(vec![
            Cell::new("⚙️  Operations"),
            Cell::new(self.operations.join(" → ")),
        ]);
        table.add_row(vec![
            Cell::new("🗑️  Removed"),
            Cell::new(self.removed.len()).fg(if self.removed.is_empty() {
                Color::White
            } else {
                Color::Red
            }),
        ]);
        table.add_row(vec![
            Cell::new("⚠️  Diagnostics"),
            Cell::new(self.degraded).fg(if self.degraded == 0 {
                Color::White
            } else {
                Color::Yellow
            }),
        ]);
        table.add_row(vec![Cell::new("🔧 Plan Adjustments"), Cell::new(self.adjustments)]);
        table.add_row(vec![
            Cell::new("✅ Output Columns"),
            Cell::new(self.output_columns)
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
        ]);
        print_indented(&table);

        if !self.removed.is_empty() {
            print_section("📝", "REMOVED COLUMNS");
            let mut table = new_table(&["Column", "Reason"]);
            for (name, reason) in &self.removed {
                table.add_row(vec![Cell::new(name), Cell::new(reason).fg(Color::Yellow)]);
            }
            print_indented(&table);
        }
    }
}

/// Print the near-zero-variance metrics, all columns or only flagged ones
pub fn print_nzv_table(report: &NzvReport, all: bool) {
    print_section("📊", "NEAR-ZERO VARIANCE");
    let mut table = new_table(&["Column", "Freq Ratio", "% Unique", "Zero Var", "NZV"]);
    for stat in report.metrics.iter().filter(|s| all || s.nzv) {
        let ratio = match stat.freq_ratio {
            Some(r) => format!("{:.2}", r),
            None => "∞".to_string(),
        };
        let flag = |on: bool| {
            if on {
                Cell::new("yes").fg(Color::Red)
            } else {
                Cell::new("no")
            }
        };
        table.add_row(vec![
            Cell::new(&stat.name),
            Cell::new(ratio),
            Cell::new(format!("{:.2}", stat.percent_unique)),
            flag(stat.zero_var),
            flag(stat.nzv),
        ]);
    }
    print_indented(&table);
}

/// Print dependency groups with their column names
pub fn print_combos_table(report: &LinearComboReport, names: &[String]) {
    print_section("🔗", "LINEAR DEPENDENCIES");
    let mut table = new_table(&["Dependent", "Combination Of", "Remove"]);
    for group in &report.groups {
        let Some((&dependent, rest)) = group.split_first() else {
            continue;
        };
        let parts: Vec<&str> = rest.iter().map(|&i| names[i].as_str()).collect();
        let removed = report.remove.contains(&dependent);
        table.add_row(vec![
            Cell::new(&names[dependent]),
            Cell::new(parts.join(", ")),
            if removed {
                Cell::new("yes").fg(Color::Red)
            } else {
                Cell::new("no")
            },
        ]);
    }
    print_indented(&table);
}

/// Print per-class sample counts and status
pub fn print_class_table(model: &ClassCentroidModel) {
    print_section("🎯", "CLASS CENTROIDS");
    let mut table = new_table(&["Class", "Samples", "Components", "Status"]);
    for class in &model.classes {
        let status = match class.status {
            ClassStatus::Fitted => Cell::new("fitted").fg(Color::Green),
            ClassStatus::Singular => Cell::new("singular").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(&class.label),
            Cell::new(class.n_samples),
            Cell::new(class.components),
            status,
        ]);
    }
    print_indented(&table);
}
