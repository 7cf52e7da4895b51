//! Named-range extension.
//!
//! After rows are merged, list names such as `InvoiceNumbersList` are
//! stretched to the last populated row of their column. Extension is
//! best-effort: every failure becomes an [`ExtendOutcome`], never an error.

use serde::Serialize;

use crate::config::NamedRangeSpec;
use crate::engine::{NameScope, SheetEngine, WorkbookEngine};
use crate::model::MAX_COLS;
use crate::resolver::{column_index_to_letter, column_letter_to_index};

/// What happened to one named range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ExtendOutcome {
    /// An existing name was redefined.
    Updated { refers_to: String, sheet_scoped: bool },
    /// No name existed; a workbook-scoped one was created.
    Created { refers_to: String },
    /// Configuration made the extension impossible.
    Skipped(String),
    /// The engine rejected the change.
    Failed(String),
}

/// Per-name result for the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedRangeOutcome {
    pub name: String,
    pub outcome: ExtendOutcome,
}

/// Absolute single-column address `='Sheet'!$B$5:$B$20`.
pub fn range_formula(sheet: &str, column: &str, start_row: u32, end_row: u32) -> String {
    let quoted = sheet.replace('\'', "''");
    format!("='{quoted}'!${column}${start_row}:${column}${end_row}")
}

/// Extends `spec.name` over `spec.column` from `spec.start_row` to the last
/// populated row.
///
/// Looks for a workbook-scoped name first, then a sheet-scoped one, and
/// creates a workbook-scoped name when neither exists.
pub fn extend_named_range<W: WorkbookEngine>(wb: &mut W, spec: &NamedRangeSpec) -> ExtendOutcome {
    let Some(col) = column_letter_to_index(&spec.column).filter(|&c| c <= MAX_COLS) else {
        return skipped(spec, format!("invalid column {:?}", spec.column));
    };
    let column = column_index_to_letter(col);
    if spec.start_row == 0 {
        return skipped(spec, "start row must be positive".to_string());
    }
    let Some(sheet) = wb.sheet(&spec.sheet) else {
        return skipped(spec, format!("sheet {:?} not found", spec.sheet));
    };

    let last = sheet.last_row_in_column(col).unwrap_or(spec.start_row);
    let end_row = last.max(spec.start_row);
    let refers_to = range_formula(&spec.sheet, &column, spec.start_row, end_row);

    let sheet_scope = NameScope::Sheet(spec.sheet.clone());
    let (scope, outcome) = if wb.defined_name(&NameScope::Workbook, &spec.name).is_some() {
        (
            NameScope::Workbook,
            ExtendOutcome::Updated {
                refers_to: refers_to.clone(),
                sheet_scoped: false,
            },
        )
    } else if wb.defined_name(&sheet_scope, &spec.name).is_some() {
        (
            sheet_scope,
            ExtendOutcome::Updated {
                refers_to: refers_to.clone(),
                sheet_scoped: true,
            },
        )
    } else {
        (
            NameScope::Workbook,
            ExtendOutcome::Created {
                refers_to: refers_to.clone(),
            },
        )
    };

    match wb.set_defined_name(scope, &spec.name, &refers_to) {
        Ok(()) => {
            tracing::info!(name = %spec.name, %refers_to, "named range extended");
            outcome
        }
        Err(e) => {
            tracing::warn!(name = %spec.name, "named range extension failed: {e}");
            ExtendOutcome::Failed(e.to_string())
        }
    }
}

fn skipped(spec: &NamedRangeSpec, reason: String) -> ExtendOutcome {
    tracing::warn!(name = %spec.name, "named range skipped: {reason}");
    ExtendOutcome::Skipped(reason)
}

/// Extends every configured name, collecting outcomes.
pub fn extend_all<W: WorkbookEngine>(wb: &mut W, specs: &[NamedRangeSpec]) -> Vec<NamedRangeOutcome> {
    specs
        .iter()
        .map(|spec| NamedRangeOutcome {
            name: spec.name.clone(),
            outcome: extend_named_range(wb, spec),
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
