//! In-memory workbook.
//!
//! Holds cell values, formulas and styles plus the sheet-level parts a
//! template carries (column widths, row heights, merged areas, data
//! validations) and defined names. Implements [`SheetEngine`] and
//! [`WorkbookEngine`].

use std::collections::BTreeMap;

use crate::engine::{NameScope, SheetEngine, WorkbookEngine};
use crate::error::EngineError;
use crate::normalize::{bool_text, normalize, plain_number};
use crate::reference::shift_rows;
use crate::types::{Area, CellValue};

/// Rows in an Excel worksheet.
pub const MAX_ROWS: u32 = 1_048_576;
/// Columns in an Excel worksheet.
pub const MAX_COLS: u32 = 16_384;

// ─────────────────────────────────────────────────────────────────────────────
// Styles
// ─────────────────────────────────────────────────────────────────────────────

/// Horizontal alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
    Justify,
}

/// Vertical alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Center,
    Bottom,
}

/// Font settings that differ from the workbook default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Font {
    pub name: Option<String>,
    /// Size in points.
    pub size: Option<f64>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    /// Color as `0xRRGGBB`.
    pub color: Option<u32>,
}

/// Line style of one cell edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderLine {
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
    Hair,
}

/// The four edges of a cell border.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Borders {
    pub left: Option<BorderLine>,
    pub right: Option<BorderLine>,
    pub top: Option<BorderLine>,
    pub bottom: Option<BorderLine>,
}

/// Formatting of a single cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellStyle {
    pub num_format: Option<String>,
    /// `None` keeps the workbook default font.
    pub font: Option<Font>,
    pub borders: Borders,
    pub h_align: Option<HAlign>,
    pub v_align: Option<VAlign>,
    pub wrap: bool,
    pub indent: u8,
    /// Solid fill color as `0xRRGGBB`.
    pub fill: Option<u32>,
}

impl CellStyle {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Validations
// ─────────────────────────────────────────────────────────────────────────────

/// A data validation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// Allowed values come from a formula such as `Lists!$A$1:$A$9`.
    ListFormula(String),
    /// Allowed values are spelled out.
    ListValues(Vec<String>),
    /// Input must make this formula true.
    Custom(String),
}

impl Validation {
    fn shift_rows(&mut self, sheet: &str, home: bool, at: u32, count: u32) {
        match self {
            Self::ListFormula(formula) | Self::Custom(formula) => {
                *formula = shift_rows(formula, sheet, home, at, count);
            }
            Self::ListValues(_) => {}
        }
    }
}

/// A validation rule and the areas it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetValidation {
    pub areas: Vec<Area>,
    pub rule: Validation,
}

impl SheetValidation {
    pub fn covers(&self, row: u32, col: u32) -> bool {
        self.areas.iter().any(|a| a.contains(row, col))
    }

    /// Adds `area`, widening the last area instead when `area` continues it
    /// one column to the right.
    fn push_area(&mut self, area: Area) {
        match self.areas.last_mut() {
            Some(last)
                if last.first_row == area.first_row
                    && last.last_row == area.last_row
                    && last.last_col + 1 == area.first_col =>
            {
                last.last_col = area.last_col;
            }
            _ => self.areas.push(area),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cells
// ─────────────────────────────────────────────────────────────────────────────

/// One cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    /// The value, or the last computed result of `formula`.
    pub value: CellValue,
    /// Formula text without the leading `=`.
    pub formula: Option<String>,
    pub style: CellStyle,
}

impl Cell {
    fn has_content(&self) -> bool {
        !self.value.is_blank() || self.formula.is_some()
    }

    /// What a spreadsheet would show for this cell.
    pub fn displayed(&self) -> String {
        render_display(&self.value, self.style.num_format.as_deref())
    }
}

/// Renders `value` under a number format.
///
/// Understands the formats the merge itself applies: General and `@` show the
/// plain value, all-zero patterns like `000` pad integers, and `0.00` style
/// patterns fix the fractional digits.
pub fn render_display(value: &CellValue, num_format: Option<&str>) -> String {
    let Some(number) = value.as_number() else {
        return match value {
            CellValue::Bool(b) => bool_text(*b).to_string(),
            _ => normalize(value),
        };
    };
    let format = num_format.unwrap_or("General");
    if let Some((whole, frac)) = format.split_once('.') {
        if !whole.is_empty()
            && whole.chars().all(|c| c == '0')
            && !frac.is_empty()
            && frac.chars().all(|c| c == '0')
        {
            return format!("{number:.prec$}", prec = frac.len());
        }
    } else if !format.is_empty() && format.chars().all(|c| c == '0') && number.fract() == 0.0 {
        let digits = plain_number(number.abs());
        let padded = format!("{digits:0>width$}", width = format.len());
        return if number < 0.0 { format!("-{padded}") } else { padded };
    }
    normalize(value)
}

/// Where `row` lands after `count` rows are inserted at `at`.
fn shifted_row(row: u32, at: u32, count: u32) -> Option<u32> {
    if row < at {
        return Some(row);
    }
    row.checked_add(count).filter(|&r| r <= MAX_ROWS)
}

/// Moves an area down past inserted rows. An area spanning the insertion
/// point grows; one pushed off the sheet is dropped.
fn shifted_area(area: Area, at: u32, count: u32) -> Option<Area> {
    let first_row = shifted_row(area.first_row, at, count)?;
    let last_row = shifted_row(area.last_row, at, count).unwrap_or(MAX_ROWS);
    Some(Area {
        first_row,
        last_row,
        ..area
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Worksheet
// ─────────────────────────────────────────────────────────────────────────────

/// A sheet stored as dense rows of cells (index 0 is row 1).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Worksheet {
    name: String,
    rows: Vec<Vec<Cell>>,
    /// Widths in character units, by 1-based column.
    col_widths: BTreeMap<u32, f64>,
    /// Heights in points, by 1-based row.
    row_heights: BTreeMap<u32, f64>,
    merges: Vec<Area>,
    validations: Vec<SheetValidation>,
}

impl Worksheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// The cell at 1-based (`row`, `col`), if it has been touched.
    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        let (r, c) = (row.checked_sub(1)?, col.checked_sub(1)?);
        self.rows.get(r as usize)?.get(c as usize)
    }

    /// The cell at 1-based (`row`, `col`), created on demand.
    pub fn cell_mut(&mut self, row: u32, col: u32) -> Result<&mut Cell, EngineError> {
        check_bounds(row, col)?;
        let (r, c) = ((row - 1) as usize, (col - 1) as usize);
        if self.rows.len() <= r {
            self.rows.resize_with(r + 1, Vec::new);
        }
        let cells = &mut self.rows[r];
        if cells.len() <= c {
            cells.resize_with(c + 1, Cell::default);
        }
        Ok(&mut cells[c])
    }

    /// Sets a value, keeping the cell's style. Any formula is dropped.
    pub fn set_value(&mut self, row: u32, col: u32, value: impl Into<CellValue>) -> Result<(), EngineError> {
        let cell = self.cell_mut(row, col)?;
        cell.value = value.into();
        cell.formula = None;
        Ok(())
    }

    pub fn value(&self, row: u32, col: u32) -> CellValue {
        self.cell(row, col).map(|c| c.value.clone()).unwrap_or_default()
    }

    /// Sets a formula, keeping the cell's value as its cached result.
    pub fn set_formula(&mut self, row: u32, col: u32, formula: &str) -> Result<(), EngineError> {
        let formula = formula.strip_prefix('=').unwrap_or(formula);
        self.cell_mut(row, col)?.formula = Some(formula.to_string());
        Ok(())
    }

    pub fn formula(&self, row: u32, col: u32) -> Option<&str> {
        self.cell(row, col)?.formula.as_deref()
    }

    pub fn style(&self, row: u32, col: u32) -> CellStyle {
        self.cell(row, col).map(|c| c.style.clone()).unwrap_or_default()
    }

    pub fn style_mut(&mut self, row: u32, col: u32) -> Result<&mut CellStyle, EngineError> {
        Ok(&mut self.cell_mut(row, col)?.style)
    }

    /// Touched cells as `(row, col, cell)`, 1-based, row-major.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32, &Cell)> {
        (1u32..).zip(&self.rows).flat_map(|(row, cells)| {
            (1u32..).zip(cells).map(move |(col, cell)| (row, col, cell))
        })
    }

    pub fn set_column_width(&mut self, col: u32, width: f64) -> Result<(), EngineError> {
        check_bounds(1, col)?;
        self.col_widths.insert(col, width);
        Ok(())
    }

    /// Custom column widths as `(col, width)`.
    pub fn column_widths(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.col_widths.iter().map(|(&c, &w)| (c, w))
    }

    pub fn set_row_height(&mut self, row: u32, height: f64) -> Result<(), EngineError> {
        check_bounds(row, 1)?;
        self.row_heights.insert(row, height);
        Ok(())
    }

    /// Custom row heights as `(row, height)`.
    pub fn row_heights(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.row_heights.iter().map(|(&r, &h)| (r, h))
    }

    pub fn add_merge(&mut self, area: Area) -> Result<(), EngineError> {
        check_bounds(area.first_row, area.first_col)?;
        check_bounds(area.last_row, area.last_col)?;
        self.merges.push(area);
        Ok(())
    }

    pub fn merges(&self) -> &[Area] {
        &self.merges
    }

    pub fn add_validation(&mut self, rule: Validation, areas: Vec<Area>) {
        self.validations.push(SheetValidation { areas, rule });
    }

    pub fn validations(&self) -> &[SheetValidation] {
        &self.validations
    }

    /// The validation rule covering (`row`, `col`), if any.
    pub fn validation_at(&self, row: u32, col: u32) -> Option<&Validation> {
        self.validations
            .iter()
            .find(|v| v.covers(row, col))
            .map(|v| &v.rule)
    }

    /// Moves references to rows of `sheet` held in this sheet's formulas and
    /// validation rules. `sheet` is another sheet of the same workbook.
    fn shift_references(&mut self, sheet: &str, at: u32, count: u32) {
        for cell in self.rows.iter_mut().flatten() {
            if let Some(formula) = &mut cell.formula {
                *formula = shift_rows(formula, sheet, false, at, count);
            }
        }
        for validation in &mut self.validations {
            validation.rule.shift_rows(sheet, false, at, count);
        }
    }
}

fn check_bounds(row: u32, col: u32) -> Result<(), EngineError> {
    if row == 0 || row > MAX_ROWS {
        return Err(EngineError::RowOutOfBounds(row));
    }
    if col == 0 || col > MAX_COLS {
        return Err(EngineError::ColumnOutOfBounds(col));
    }
    Ok(())
}

impl SheetEngine for Worksheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn used_extent(&self) -> Option<(u32, u32)> {
        let mut extent: Option<(u32, u32)> = None;
        for (row, col, cell) in self.cells() {
            if cell.has_content() {
                let (r, c) = extent.unwrap_or((0, 0));
                extent = Some((r.max(row), c.max(col)));
            }
        }
        extent
    }

    fn read_values(&self, area: Area) -> Vec<Vec<CellValue>> {
        (area.first_row..=area.last_row)
            .map(|row| {
                (area.first_col..=area.last_col)
                    .map(|col| self.value(row, col))
                    .collect()
            })
            .collect()
    }

    fn read_displayed(&self, area: Area) -> Vec<Vec<String>> {
        (area.first_row..=area.last_row)
            .map(|row| {
                (area.first_col..=area.last_col)
                    .map(|col| self.cell(row, col).map(Cell::displayed).unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    fn write_values(&mut self, top_row: u32, values: &[Vec<CellValue>]) -> Result<(), EngineError> {
        for (row, cells) in (top_row..).zip(values) {
            for (col, value) in (1u32..).zip(cells) {
                self.set_value(row, col, value.clone())?;
            }
        }
        Ok(())
    }

    fn set_number_format(&mut self, area: Area, pattern: &str) -> Result<(), EngineError> {
        for row in area.first_row..=area.last_row {
            for col in area.first_col..=area.last_col {
                self.style_mut(row, col)?.num_format = Some(pattern.to_string());
            }
        }
        Ok(())
    }

    fn insert_rows(&mut self, at: u32, count: u32) -> Result<(), EngineError> {
        check_bounds(at, 1)?;
        if count == 0 {
            return Ok(());
        }
        let index = (at - 1) as usize;
        if self.rows.len() > index {
            let blank = std::iter::repeat_with(Vec::new).take(count as usize);
            self.rows.splice(index..index, blank);
            self.rows.truncate(MAX_ROWS as usize);
        }

        let name = self.name.clone();
        for cell in self.rows.iter_mut().flatten() {
            if let Some(formula) = &mut cell.formula {
                *formula = shift_rows(formula, &name, true, at, count);
            }
        }
        self.row_heights = std::mem::take(&mut self.row_heights)
            .into_iter()
            .filter_map(|(row, height)| shifted_row(row, at, count).map(|r| (r, height)))
            .collect();
        self.merges = std::mem::take(&mut self.merges)
            .into_iter()
            .filter_map(|area| shifted_area(area, at, count))
            .collect();
        for validation in &mut self.validations {
            validation.areas = std::mem::take(&mut validation.areas)
                .into_iter()
                .filter_map(|area| shifted_area(area, at, count))
                .collect();
            validation.rule.shift_rows(&name, true, at, count);
        }
        self.validations.retain(|v| !v.areas.is_empty());
        Ok(())
    }

    fn copy_row_format(
        &mut self,
        reference_row: u32,
        area: Area,
        clear_fill: bool,
    ) -> Result<(), EngineError> {
        check_bounds(reference_row, 1)?;
        check_bounds(area.last_row, area.last_col)?;
        let reference: Vec<CellStyle> = (area.first_col..=area.last_col)
            .map(|col| self.style(reference_row, col))
            .collect();
        for row in area.first_row..=area.last_row {
            for (col, source) in (area.first_col..).zip(&reference) {
                let style = self.style_mut(row, col)?;
                *style = source.clone();
                if clear_fill {
                    style.fill = None;
                }
            }
        }

        for col in area.first_col..=area.last_col {
            let Some(validation) = self
                .validations
                .iter_mut()
                .find(|v| v.covers(reference_row, col))
            else {
                continue;
            };
            let target = area.column(col);
            if !validation.areas.iter().any(|a| a.contains_area(&target)) {
                validation.push_area(target);
            }
        }

        if let Some(&height) = self.row_heights.get(&reference_row) {
            for row in area.first_row..=area.last_row {
                self.row_heights.insert(row, height);
            }
        }
        Ok(())
    }

    fn last_row_in_column(&self, col: u32) -> Option<u32> {
        let c = col.checked_sub(1)? as usize;
        self.rows
            .iter()
            .rposition(|cells| cells.get(c).is_some_and(|cell| !cell.value.is_blank()))
            .and_then(|r| u32::try_from(r + 1).ok())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Workbook
// ─────────────────────────────────────────────────────────────────────────────

/// A defined name and what it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedName {
    pub name: String,
    pub scope: NameScope,
    /// Formula text including the leading `=`.
    pub refers_to: String,
}

/// Sheets in workbook order plus defined names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Worksheet>,
    names: Vec<DefinedName>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty sheet and returns it.
    pub fn add_sheet(&mut self, name: &str) -> &mut Worksheet {
        self.sheets.push(Worksheet::new(name));
        let last = self.sheets.len() - 1;
        &mut self.sheets[last]
    }

    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    pub fn names(&self) -> &[DefinedName] {
        &self.names
    }
}

/// Defined names compare case-insensitively, as in Excel.
fn same_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

impl WorkbookEngine for Workbook {
    type Sheet = Worksheet;

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn sheet(&self, name: &str) -> Option<&Worksheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    fn sheet_mut(&mut self, name: &str) -> Option<&mut Worksheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    fn defined_name(&self, scope: &NameScope, name: &str) -> Option<&str> {
        self.names
            .iter()
            .find(|n| n.scope == *scope && same_name(&n.name, name))
            .map(|n| n.refers_to.as_str())
    }

    fn set_defined_name(
        &mut self,
        scope: NameScope,
        name: &str,
        refers_to: &str,
    ) -> Result<(), EngineError> {
        if let NameScope::Sheet(sheet) = &scope {
            if self.sheet(sheet).is_none() {
                return Err(EngineError::UnknownSheet(sheet.clone()));
            }
        }
        let refers_to = if refers_to.starts_with('=') {
            refers_to.to_string()
        } else {
            format!("={refers_to}")
        };
        if let Some(existing) = self
            .names
            .iter_mut()
            .find(|n| n.scope == scope && same_name(&n.name, name))
        {
            existing.refers_to = refers_to;
        } else {
            self.names.push(DefinedName {
                name: name.to_string(),
                scope,
                refers_to,
            });
        }
        Ok(())
    }

    fn rows_inserted(&mut self, sheet: &str, at: u32, count: u32) {
        for other in self.sheets.iter_mut().filter(|s| s.name != sheet) {
            other.shift_references(sheet, at, count);
        }
        for defined in &mut self.names {
            let home = matches!(&defined.scope, NameScope::Sheet(s) if s == sheet);
            let body = defined.refers_to.strip_prefix('=').unwrap_or(&defined.refers_to);
            defined.refers_to = format!("={}", shift_rows(body, sheet, home, at, count));
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ─────────────────────────────────────────────────────────────────────────
    // Displayed Text
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn display_follows_number_format() {
        let seven = CellValue::Number(7.0);
        assert_eq!(render_display(&seven, None), "7");
        assert_eq!(render_display(&seven, Some("General")), "7");
        assert_eq!(render_display(&seven, Some("@")), "7");
        assert_eq!(render_display(&seven, Some("000")), "007");
        assert_eq!(render_display(&CellValue::Number(-7.0), Some("000")), "-007");
        assert_eq!(render_display(&CellValue::Number(1.5), Some("000")), "1.5");
        assert_eq!(render_display(&CellValue::Number(1.5), Some("0.00")), "1.50");
        assert_eq!(render_display(&CellValue::from("abc"), Some("000")), "abc");
        assert_eq!(render_display(&CellValue::Bool(false), None), "FALSE");
    }

    #[test]
    fn displayed_text_tracks_number_format() {
        let mut sheet = Worksheet::new("S");
        sheet.set_value(1, 1, 7.0).unwrap();
        assert_eq!(sheet.read_displayed(Area::new(1, 1, 1, 1)), vec![vec!["7".to_string()]]);
        sheet.set_number_format(Area::new(1, 1, 1, 1), "0000").unwrap();
        assert_eq!(sheet.read_displayed(Area::new(1, 1, 1, 1)), vec![vec!["0007".to_string()]]);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sheet Operations
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn used_extent_ignores_untouched_cells() {
        let mut sheet = Worksheet::new("S");
        assert_eq!(sheet.used_extent(), None);
        sheet.set_value(3, 2, "x").unwrap();
        sheet.set_value(1, 4, 1.0).unwrap();
        assert_eq!(sheet.used_extent(), Some((3, 4)));
        sheet.set_value(3, 2, CellValue::Empty).unwrap();
        assert_eq!(sheet.used_extent(), Some((1, 4)));
    }

    #[test]
    fn read_area_pads_missing_cells() {
        let mut sheet = Worksheet::new("S");
        sheet.set_value(2, 2, 5.0).unwrap();
        let values = sheet.read_values(Area::new(1, 1, 2, 3));
        assert_eq!(
            values,
            vec![
                vec![CellValue::Empty, CellValue::Empty, CellValue::Empty],
                vec![CellValue::Empty, CellValue::Number(5.0), CellValue::Empty],
            ]
        );
    }

    #[test]
    fn insert_rows_shifts_down() {
        let mut sheet = Worksheet::new("S");
        sheet.set_value(5, 1, "reference").unwrap();
        sheet.set_value(6, 1, "old").unwrap();
        sheet.insert_rows(6, 2).unwrap();
        assert_eq!(sheet.value(5, 1), CellValue::from("reference"));
        assert_eq!(sheet.value(6, 1), CellValue::Empty);
        assert_eq!(sheet.value(7, 1), CellValue::Empty);
        assert_eq!(sheet.value(8, 1), CellValue::from("old"));
    }

    #[test]
    fn insert_rows_past_end_is_noop() {
        let mut sheet = Worksheet::new("S");
        sheet.set_value(1, 1, "a").unwrap();
        sheet.insert_rows(6, 3).unwrap();
        assert_eq!(sheet.used_extent(), Some((1, 1)));
        assert!(sheet.insert_rows(0, 1).is_err());
    }

    #[test]
    fn copy_row_format_clears_fill() {
        let mut sheet = Worksheet::new("S");
        *sheet.style_mut(5, 1).unwrap() = CellStyle {
            h_align: Some(HAlign::Center),
            wrap: true,
            indent: 2,
            fill: Some(0x00FF_FF00),
            borders: Borders {
                bottom: Some(BorderLine::Thin),
                ..Borders::default()
            },
            ..CellStyle::default()
        };
        sheet.copy_row_format(5, Area::new(6, 1, 7, 2), true).unwrap();

        let copied = sheet.style(7, 1);
        assert_eq!(copied.h_align, Some(HAlign::Center));
        assert!(copied.wrap);
        assert_eq!(copied.indent, 2);
        assert_eq!(copied.fill, None);
        assert_eq!(copied.borders.bottom, Some(BorderLine::Thin));
        assert_eq!(sheet.style(6, 2), CellStyle::default());
        assert_eq!(sheet.style(5, 1).fill, Some(0x00FF_FF00));

        sheet.copy_row_format(5, Area::new(8, 1, 8, 1), false).unwrap();
        assert_eq!(sheet.style(8, 1).fill, Some(0x00FF_FF00));
    }

    #[test]
    fn copy_row_format_extends_reference_validations() {
        let mut sheet = Worksheet::new("S");
        let list = Validation::ListFormula("Lists!$A$1:$A$3".to_string());
        sheet.add_validation(list.clone(), vec![Area::new(5, 1, 5, 2)]);
        sheet.add_validation(
            Validation::ListValues(vec!["Y".to_string()]),
            vec![Area::new(5, 4, 100, 4)],
        );
        sheet.set_row_height(5, 30.0).unwrap();

        sheet.copy_row_format(5, Area::new(6, 1, 9, 4), true).unwrap();

        assert_eq!(sheet.validation_at(9, 1), Some(&list));
        assert_eq!(sheet.validation_at(6, 2), Some(&list));
        assert_eq!(sheet.validation_at(7, 3), None);
        assert_eq!(
            sheet.validations()[0].areas,
            vec![Area::new(5, 1, 5, 2), Area::new(6, 1, 9, 2)]
        );
        // Already covered, so nothing is added.
        assert_eq!(sheet.validations()[1].areas, vec![Area::new(5, 4, 100, 4)]);
        assert_eq!(sheet.row_heights().collect::<Vec<_>>().len(), 5);
    }

    #[test]
    fn insert_rows_moves_formulas_and_sheet_parts() {
        let mut sheet = Worksheet::new("Documents");
        sheet.set_value(3, 2, 10.0).unwrap();
        sheet.set_formula(3, 2, "=SUM(B6:B10)").unwrap();
        sheet.set_value(10, 2, 1.0).unwrap();
        sheet.set_formula(10, 3, "B10*2").unwrap();
        sheet.set_row_height(2, 20.0).unwrap();
        sheet.set_row_height(7, 25.0).unwrap();
        sheet.add_merge(Area::new(1, 1, 1, 3)).unwrap();
        sheet.add_merge(Area::new(8, 1, 8, 2)).unwrap();
        sheet.add_validation(
            Validation::ListFormula("$H$6:$H$9".to_string()),
            vec![Area::new(5, 2, 5, 2), Area::new(5, 4, 20, 4)],
        );

        sheet.insert_rows(6, 3).unwrap();

        assert_eq!(sheet.formula(3, 2), Some("SUM(B9:B13)"));
        assert_eq!(sheet.formula(13, 3), Some("B13*2"));
        assert_eq!(sheet.value(13, 2), CellValue::Number(1.0));
        assert_eq!(sheet.row_heights().collect::<Vec<_>>(), vec![(2, 20.0), (10, 25.0)]);
        assert_eq!(sheet.merges(), &[Area::new(1, 1, 1, 3), Area::new(11, 1, 11, 2)]);
        let validation = &sheet.validations()[0];
        assert_eq!(validation.rule, Validation::ListFormula("$H$9:$H$12".to_string()));
        assert_eq!(validation.areas, vec![Area::new(5, 2, 5, 2), Area::new(5, 4, 23, 4)]);
    }

    #[test]
    fn set_value_replaces_formula() {
        let mut sheet = Worksheet::new("S");
        sheet.set_value(1, 1, 2.0).unwrap();
        sheet.set_formula(1, 1, "=1+1").unwrap();
        assert_eq!(sheet.formula(1, 1), Some("1+1"));
        assert_eq!(sheet.used_extent(), Some((1, 1)));
        sheet.set_value(1, 1, "x").unwrap();
        assert_eq!(sheet.formula(1, 1), None);
    }

    #[test]
    fn last_row_in_column_skips_blanks() {
        let mut sheet = Worksheet::new("S");
        sheet.set_value(5, 2, "a").unwrap();
        sheet.set_value(20, 2, "b").unwrap();
        sheet.set_value(25, 3, "c").unwrap();
        sheet.set_value(22, 2, "").unwrap();
        assert_eq!(sheet.last_row_in_column(2), Some(20));
        assert_eq!(sheet.last_row_in_column(4), None);
        assert_eq!(sheet.last_row_in_column(0), None);
    }

    #[test]
    fn write_values_keeps_styles() {
        let mut sheet = Worksheet::new("S");
        sheet.set_number_format(Area::new(6, 1, 6, 1), "@").unwrap();
        sheet
            .write_values(6, &[vec![CellValue::from("05"), CellValue::Number(1.0)]])
            .unwrap();
        assert_eq!(sheet.value(6, 1), CellValue::from("05"));
        assert_eq!(sheet.style(6, 1).num_format.as_deref(), Some("@"));
        assert_eq!(sheet.value(6, 2), CellValue::Number(1.0));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Defined Names
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn defined_names_by_scope() {
        let mut wb = Workbook::new();
        wb.add_sheet("Documents");
        wb.set_defined_name(NameScope::Workbook, "List", "Documents!$B$5").unwrap();
        wb.set_defined_name(NameScope::Sheet("Documents".to_string()), "Local", "=$A$1")
            .unwrap();

        assert_eq!(wb.defined_name(&NameScope::Workbook, "list"), Some("=Documents!$B$5"));
        assert_eq!(wb.defined_name(&NameScope::Workbook, "Local"), None);
        assert_eq!(
            wb.defined_name(&NameScope::Sheet("Documents".to_string()), "Local"),
            Some("=$A$1")
        );

        wb.set_defined_name(NameScope::Workbook, "LIST", "=Documents!$B$5:$B$9").unwrap();
        assert_eq!(wb.names().len(), 2);
        assert!(wb
            .set_defined_name(NameScope::Sheet("Nope".to_string()), "X", "=1")
            .is_err());
    }

    #[test]
    fn inserted_rows_move_names_and_other_sheets() {
        let mut wb = Workbook::new();
        wb.add_sheet("Documents");
        wb.add_sheet("Summary").set_formula(1, 1, "COUNTA(Documents!$B$6:$B$10)+B10").unwrap();
        wb.set_defined_name(NameScope::Workbook, "Totals", "=Documents!$B$10").unwrap();
        wb.set_defined_name(NameScope::Workbook, "Header", "=Documents!$B$5").unwrap();
        wb.set_defined_name(NameScope::Sheet("Documents".to_string()), "Local", "=$B$10")
            .unwrap();
        wb.set_defined_name(NameScope::Sheet("Summary".to_string()), "Other", "=$B$10")
            .unwrap();

        wb.sheet_mut("Documents").unwrap().insert_rows(6, 3).unwrap();
        wb.rows_inserted("Documents", 6, 3);

        assert_eq!(wb.defined_name(&NameScope::Workbook, "Totals"), Some("=Documents!$B$13"));
        assert_eq!(wb.defined_name(&NameScope::Workbook, "Header"), Some("=Documents!$B$5"));
        assert_eq!(
            wb.defined_name(&NameScope::Sheet("Documents".to_string()), "Local"),
            Some("=$B$13")
        );
        assert_eq!(
            wb.defined_name(&NameScope::Sheet("Summary".to_string()), "Other"),
            Some("=$B$10")
        );
        assert_eq!(
            wb.sheet("Summary").unwrap().formula(1, 1),
            Some("COUNTA(Documents!$B$9:$B$13)+B10")
        );
    }

    #[test]
    fn sheet_lookup() {
        let mut wb = Workbook::new();
        wb.add_sheet("A");
        wb.add_sheet("B").set_value(1, 1, 1.0).unwrap();
        assert_eq!(wb.sheet_names(), vec!["A".to_string(), "B".to_string()]);
        assert!(wb.sheet("B").is_some());
        assert!(wb.sheet_mut("C").is_none());
        assert_eq!(wb.sheets().len(), 2);
    }
}
