//! Resolution of a requested operation list into an executable plan

use super::operation::Operation;
use super::{Diagnostic, DiagnosticKind};
use crate::error::{PrepError, Result};

/// Resolve duplicates, prerequisites and conflicts, returning operations in
/// execution order plus a diagnostic for every adjustment made.
pub fn resolve_plan(requested: &[Operation]) -> Result<(Vec<Operation>, Vec<Diagnostic>)> {
    let mut ops: Vec<Operation> = Vec::with_capacity(requested.len());
    for op in requested {
        if !ops.contains(op) {
            ops.push(*op);
        }
    }

    check_exclusive(&ops, Operation::is_power_transform)?;
    check_exclusive(&ops, Operation::is_imputation)?;

    let mut diagnostics = Vec::new();
    let position = |ops: &[Operation], op: Operation| ops.iter().position(|o| *o == op);

    let forcing = ops.iter().copied().find(Operation::requires_standardization);

    if let Some(range_pos) = position(&ops, Operation::Range) {
        if let Some(forcing) = forcing {
            ops.retain(|o| *o != Operation::Range);
            diagnostics.push(adjusted(
                Operation::Range,
                format!("range dropped: {} requires centering and scaling", forcing),
            ));
        } else {
            let standardize_pos = [Operation::Center, Operation::Scale]
                .iter()
                .filter_map(|op| position(&ops, *op))
                .max();
            if let Some(standardize_pos) = standardize_pos {
                if range_pos > standardize_pos {
                    ops.retain(|o| !matches!(o, Operation::Center | Operation::Scale));
                    diagnostics.push(adjusted(
                        Operation::Range,
                        "center/scale dropped: range was listed later".to_string(),
                    ));
                } else {
                    ops.retain(|o| *o != Operation::Range);
                    diagnostics.push(adjusted(
                        Operation::Range,
                        "range dropped: center/scale was listed later".to_string(),
                    ));
                }
            }
        }
    }

    if let Some(forcing) = forcing {
        for required in [Operation::Center, Operation::Scale] {
            if !ops.contains(&required) {
                ops.push(required);
                diagnostics.push(adjusted(
                    required,
                    format!("{} added as a prerequisite of {}", required, forcing),
                ));
            }
        }
    }

    if ops.contains(&Operation::Ica) && ops.contains(&Operation::Pca) {
        ops.retain(|o| *o != Operation::Pca);
        diagnostics.push(adjusted(
            Operation::Pca,
            "pca runs as the whitening stage of ica".to_string(),
        ));
    }

    ops.sort();
    Ok((ops, diagnostics))
}

fn check_exclusive(ops: &[Operation], group: fn(&Operation) -> bool) -> Result<()> {
    let members: Vec<&Operation> = ops.iter().filter(|o| group(o)).collect();
    if members.len() > 1 {
        return Err(PrepError::ConflictingOperations(
            members[0].to_string(),
            members[1].to_string(),
        ));
    }
    Ok(())
}

fn adjusted(step: Operation, message: String) -> Diagnostic {
    Diagnostic {
        step,
        column: None,
        kind: DiagnosticKind::PlanAdjusted,
        message,
    }
}
