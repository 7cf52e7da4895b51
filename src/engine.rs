//! Spreadsheet engine capabilities.
//!
//! The merge only needs a handful of operations from whatever holds the
//! workbooks; they are expressed here as traits so the transform pipeline does
//! not care whether the sheets live in memory or behind a live session.
//! Rows and columns are 1-based throughout.

use crate::error::EngineError;
use crate::types::{Area, CellValue};

// ─────────────────────────────────────────────────────────────────────────────
// Sheet Engine
// ─────────────────────────────────────────────────────────────────────────────

/// Operations on one worksheet.
pub trait SheetEngine {
    /// Sheet name.
    fn name(&self) -> &str;

    /// Last used `(row, col)`, or `None` for an empty sheet.
    fn used_extent(&self) -> Option<(u32, u32)>;

    /// Raw values of `area`, one inner vector per row.
    fn read_values(&self, area: Area) -> Vec<Vec<CellValue>>;

    /// Displayed text of `area`, as the engine would render it.
    fn read_displayed(&self, area: Area) -> Vec<Vec<String>>;

    /// Writes `values` with their top-left corner at (`top_row`, 1).
    fn write_values(&mut self, top_row: u32, values: &[Vec<CellValue>]) -> Result<(), EngineError>;

    /// Sets the number format of every cell in `area`.
    fn set_number_format(&mut self, area: Area, pattern: &str) -> Result<(), EngineError>;

    /// Inserts `count` blank rows at `at`, shifting existing rows down.
    fn insert_rows(&mut self, at: u32, count: u32) -> Result<(), EngineError>;

    /// Copies validation and formatting from `reference_row` onto `area`,
    /// optionally dropping any inherited fill.
    fn copy_row_format(
        &mut self,
        reference_row: u32,
        area: Area,
        clear_fill: bool,
    ) -> Result<(), EngineError>;

    /// Last non-blank row in `col`, searching upward from the bottom.
    fn last_row_in_column(&self, col: u32) -> Option<u32>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Workbook Engine
// ─────────────────────────────────────────────────────────────────────────────

/// Where a defined name lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameScope {
    Workbook,
    Sheet(String),
}

/// Operations on a whole workbook.
pub trait WorkbookEngine {
    type Sheet: SheetEngine;

    /// Sheet names in workbook order.
    fn sheet_names(&self) -> Vec<String>;

    fn sheet(&self, name: &str) -> Option<&Self::Sheet>;

    fn sheet_mut(&mut self, name: &str) -> Option<&mut Self::Sheet>;

    /// The refers-to formula of `name` in `scope`, if defined.
    fn defined_name(&self, scope: &NameScope, name: &str) -> Option<&str>;

    /// Defines or redefines `name` in `scope`.
    fn set_defined_name(
        &mut self,
        scope: NameScope,
        name: &str,
        refers_to: &str,
    ) -> Result<(), EngineError>;

    /// Moves references into `sheet` held by defined names and by other
    /// sheets after `count` rows were inserted at `at` in `sheet`.
    fn rows_inserted(&mut self, sheet: &str, at: u32, count: u32);
}
