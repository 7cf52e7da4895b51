//! Row block transformation.
//!
//! [`transform`] reshapes a source block column by column and reports the
//! number format each destination column needs. [`merge_sheet`] drives one
//! sheet pair through an engine: read, transform, insert, format, write.

use crate::classify::{classify_column, ColumnClass};
use crate::config::{MergeConfig, SheetRules};
use crate::engine::SheetEngine;
use crate::error::EngineError;
use crate::normalize::{normalize, round_half_away};
use crate::resolver::{ColumnRule, ResolvedColumns};
use crate::types::{Area, CellBlock, CellValue, SheetOutcome};

// ─────────────────────────────────────────────────────────────────────────────
// Column Formats
// ─────────────────────────────────────────────────────────────────────────────

/// Number format directive for a destination column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFormat {
    /// Leave whatever format the destination has.
    Unchanged,
    /// Text (`@`).
    Text,
    /// Exactly this many fractional digits.
    Fixed(u32),
    /// Plain integer.
    Integer,
    /// Up to twenty fractional digits, none forced.
    Decimal,
}

impl ColumnFormat {
    /// The number format string, or `None` to leave the column alone.
    pub fn pattern(self) -> Option<String> {
        match self {
            Self::Unchanged => None,
            Self::Text => Some("@".to_string()),
            Self::Integer | Self::Fixed(0) => Some("0".to_string()),
            Self::Fixed(digits) => Some(format!("0.{}", "0".repeat(digits as usize))),
            Self::Decimal => Some(format!("0.{}", "#".repeat(20))),
        }
    }
}

/// A transformed block ready to write, plus one format per column.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedBlock {
    pub values: Vec<Vec<CellValue>>,
    pub formats: Vec<ColumnFormat>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Cell Rules
// ─────────────────────────────────────────────────────────────────────────────

/// Appends `%` to numbers and numeric strings; everything else is kept.
pub fn percent_cell(value: &CellValue) -> CellValue {
    match value {
        CellValue::Int(_) | CellValue::Number(_) => CellValue::Text(format!("{}%", normalize(value))),
        CellValue::Text(s) if !s.is_empty() => {
            let trimmed = s.trim();
            if trimmed.ends_with('%') {
                CellValue::Text(trimmed.to_string())
            } else if trimmed.parse::<f64>().is_ok() {
                CellValue::Text(format!("{trimmed}%"))
            } else {
                value.clone()
            }
        }
        _ => value.clone(),
    }
}

/// Left-pads `s` with zeros to `len` characters. Never truncates and never
/// pads an empty string.
pub fn pad_left_zeros(s: &str, len: usize) -> String {
    let count = s.chars().count();
    if s.is_empty() || count >= len {
        return s.to_string();
    }
    let mut out = "0".repeat(len - count);
    out.push_str(s);
    out
}

/// Displayed text when present, otherwise the normalized raw value.
fn text_of(value: &CellValue, displayed: &str) -> String {
    if displayed.is_empty() {
        normalize(value)
    } else {
        displayed.to_string()
    }
}

fn precision_cell(value: &CellValue, digits: u32) -> CellValue {
    match value {
        CellValue::Number(n) => CellValue::Number(round_half_away(*n, digits)),
        CellValue::Int(_) => value.clone(),
        CellValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_or_else(|_| value.clone(), |n| CellValue::Number(round_half_away(n, digits))),
        _ => value.clone(),
    }
}

/// Turns numeric-looking strings into native numbers.
fn coerce_numeric(value: &CellValue) -> CellValue {
    let CellValue::Text(s) = value else {
        return value.clone();
    };
    let trimmed = s.trim();
    let parsed = if trimmed.contains('.') {
        trimmed.parse::<f64>().ok().map(CellValue::Number)
    } else {
        trimmed.parse::<i64>().ok().map(CellValue::Int)
    };
    parsed.unwrap_or_else(|| value.clone())
}

// ─────────────────────────────────────────────────────────────────────────────
// Column Plans
// ─────────────────────────────────────────────────────────────────────────────

/// What happens to one column: the configured rule, or the classifier's
/// verdict when no rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnPlan {
    Percent,
    Pad(usize),
    Precision(u32),
    Text,
    Numeric(ColumnClass),
}

impl ColumnPlan {
    fn for_column(block: &CellBlock, columns: &ResolvedColumns, col: usize) -> Self {
        match columns.rule_for(col) {
            ColumnRule::Percent => Self::Percent,
            ColumnRule::Pad(len) => Self::Pad(len),
            ColumnRule::Precision(digits) => Self::Precision(digits),
            ColumnRule::Inferred => match classify_column(block, col) {
                ColumnClass::Text => Self::Text,
                class => Self::Numeric(class),
            },
        }
    }

    const fn format(self) -> ColumnFormat {
        match self {
            Self::Percent => ColumnFormat::Unchanged,
            Self::Pad(_) | Self::Text => ColumnFormat::Text,
            Self::Precision(digits) => ColumnFormat::Fixed(digits),
            Self::Numeric(ColumnClass::Decimal) => ColumnFormat::Decimal,
            Self::Numeric(_) => ColumnFormat::Integer,
        }
    }

    fn apply(self, value: &CellValue, displayed: &str) -> CellValue {
        match self {
            Self::Percent => percent_cell(value),
            Self::Pad(len) => CellValue::text_or_empty(pad_left_zeros(&text_of(value, displayed), len)),
            Self::Precision(digits) => precision_cell(value, digits),
            Self::Text => CellValue::text_or_empty(text_of(value, displayed)),
            Self::Numeric(_) => coerce_numeric(value),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transform
// ─────────────────────────────────────────────────────────────────────────────

/// Applies each column's rule to `block`.
pub fn transform(block: &CellBlock, columns: &ResolvedColumns) -> TransformedBlock {
    let cols = block.cols();
    let mut values = vec![Vec::with_capacity(cols); block.rows()];
    let mut formats = Vec::with_capacity(cols);

    for col in 0..cols {
        let plan = ColumnPlan::for_column(block, columns, col);
        for (row, (value, displayed)) in values.iter_mut().zip(block.column(col)) {
            row.push(plan.apply(value, displayed));
        }
        formats.push(plan.format());
    }

    TransformedBlock { values, formats }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sheet Merge
// ─────────────────────────────────────────────────────────────────────────────

/// Merges one sheet pair and returns the rows and columns written.
///
/// A source without real values below the start row writes nothing and
/// inserts nothing.
pub fn merge_sheet<S: SheetEngine>(
    src: &S,
    dst: &mut S,
    rules: &SheetRules,
    config: &MergeConfig,
) -> Result<SheetOutcome, EngineError> {
    let name = src.name().to_string();
    let start_row = config.start_row;

    let Some((last_row, last_col)) = src.used_extent() else {
        return Ok(SheetOutcome::skipped(&name));
    };
    if last_row < start_row || last_col == 0 {
        return Ok(SheetOutcome::skipped(&name));
    }

    let area = Area::new(start_row, 1, last_row, last_col);
    let values = src.read_values(area);
    let displayed = src.read_displayed(area);
    let block = CellBlock::new(values, displayed)?;
    if block.is_blank() {
        tracing::debug!(sheet = %name, "source block is blank, nothing to merge");
        return Ok(SheetOutcome::skipped(&name));
    }

    let columns = ResolvedColumns::resolve(&name, rules, block.cols());
    let out = transform(&block, &columns);

    let write_rows = area.row_count();
    let write_cols = area.col_count();
    let dest = Area::rows_from(start_row, write_rows, write_cols);

    if config.insert_rows {
        dst.insert_rows(start_row, write_rows)?;
    }
    // Formats go on before values so the written values do not get re-detected.
    if config.apply_reference_format {
        dst.copy_row_format(config.reference_row, dest, config.clear_static_fill)?;
    }
    for (col, format) in (1..).zip(&out.formats) {
        if let Some(pattern) = format.pattern() {
            dst.set_number_format(dest.column(col), &pattern)?;
        }
    }
    dst.write_values(start_row, &out.values)?;

    tracing::info!(sheet = %name, rows = write_rows, cols = write_cols, "sheet merged");
    Ok(SheetOutcome {
        sheet: name,
        rows: write_rows,
        cols: write_cols,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
