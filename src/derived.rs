use crate::schema::{Field, TotalFormula};
use crate::OrderLine;

/// Fills the derived total of each line from already-numeric columns.
///
/// Must run after normalization and before anything that reads `total`.
pub fn apply_totals(lines: Vec<OrderLine>, formula: &TotalFormula) -> Vec<OrderLine> {
    lines
        .into_iter()
        .map(|mut line| {
            line.total = compute_total(&line, formula);
            line
        })
        .collect()
}

pub fn compute_total(line: &OrderLine, formula: &TotalFormula) -> f64 {
    match formula {
        TotalFormula::Column { field } => line.numeric(*field),
        TotalFormula::Sum { fields } => fields.iter().map(|f| line.numeric(*f)).sum(),
    }
}

/// Column names of the formula, for diagnostics.
pub fn describe(formula: &TotalFormula) -> String {
    let names: Vec<&str> = formula.fields().iter().map(Field::logical_name).collect();
    match formula {
        TotalFormula::Column { .. } => names.join(""),
        TotalFormula::Sum { .. } => names.join(" + "),
    }
}
