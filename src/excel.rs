//! Excel file I/O.
//!
//! Provides:
//! - Load any calamine-readable workbook into a [`model::Workbook`]
//! - For XLSX packages, also load styles, column widths, row heights, merged
//!   areas, data validations and name scopes
//! - Save a [`model::Workbook`] as XLSX with all of the above

use std::io::{Seek, Write};
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::Timelike;
use rust_xlsxwriter::{
    Color, DataValidation, Format, FormatAlign, FormatBorder, FormatPattern, FormatUnderline, Formula,
};

use crate::engine::{NameScope, SheetEngine, WorkbookEngine};
use crate::error::{EngineError, ExcelError};
use crate::model::{self, BorderLine, Cell, CellStyle, HAlign, VAlign, Validation, MAX_COLS};
use crate::normalize::normalize;
use crate::types::CellValue;
use crate::xlsx_parts::{self, SheetParts};

// ─────────────────────────────────────────────────────────────────────────────
// Cell Conversion
// ─────────────────────────────────────────────────────────────────────────────

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Self::Empty,
            Data::Int(i) => Self::Int(*i),
            Data::Float(f) => Self::Number(*f),
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Self::Text(s.clone()),
            Data::Bool(b) => Self::Bool(*b),
            Data::Error(e) => Self::Error(e.to_string()),
            // Dates keep the text a reader would see rather than a serial number.
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(d) if !dt.is_duration() => {
                    let pattern = if d.num_seconds_from_midnight() == 0 {
                        "%Y-%m-%d"
                    } else {
                        "%Y-%m-%d %H:%M:%S"
                    };
                    Self::Text(d.format(pattern).to_string())
                }
                _ => Self::Number(dt.as_f64()),
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading
// ─────────────────────────────────────────────────────────────────────────────

/// Loads every sheet and defined name from `path`.
///
/// Values and formulas come from calamine. For XLSX packages the remaining
/// template parts are read from the package itself and sheet-scoped names
/// keep their scope; other formats load values, formulas and
/// workbook-scoped names only.
pub fn load_workbook(path: &Path) -> Result<model::Workbook, ExcelError> {
    let mut book = open_workbook_auto(path).map_err(|source| ExcelError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let parts = if xlsx_parts::is_xlsx_package(path) {
        let parts = xlsx_parts::read_parts(path).map_err(|source| ExcelError::Parts {
            path: path.display().to_string(),
            source,
        })?;
        Some(parts)
    } else {
        None
    };

    let mut workbook = model::Workbook::new();
    for name in book.sheet_names() {
        let range = book
            .worksheet_range(&name)
            .map_err(|source| ExcelError::Sheet {
                sheet: name.clone(),
                source,
            })?;
        let sheet = workbook.add_sheet(&name);
        if let Some((first_row, first_col)) = range.start() {
            for (r, c, data) in range.used_cells() {
                let row = first_row + to_u32(r)? + 1;
                let col = first_col + to_u32(c)? + 1;
                sheet.set_value(row, col, CellValue::from(data))?;
            }
        }

        match book.worksheet_formula(&name) {
            Ok(formulas) => {
                if let Some((first_row, first_col)) = formulas.start() {
                    for (r, c, formula) in formulas.used_cells() {
                        if formula.is_empty() {
                            continue;
                        }
                        let row = first_row + to_u32(r)? + 1;
                        let col = first_col + to_u32(c)? + 1;
                        sheet.set_formula(row, col, formula)?;
                    }
                }
            }
            Err(e) => tracing::warn!(sheet = %name, error = %e, "formulas not loaded"),
        }

        if let Some(sheet_parts) = parts.as_ref().and_then(|p| p.sheet(&name)) {
            apply_parts(sheet, sheet_parts)?;
        }
    }

    match &parts {
        Some(parts) => {
            for defined in &parts.names {
                if is_builtin_name(&defined.name) {
                    continue;
                }
                let scope = defined
                    .sheet
                    .clone()
                    .map_or(NameScope::Workbook, NameScope::Sheet);
                workbook.set_defined_name(scope, &defined.name, &defined.formula)?;
            }
        }
        None => {
            for (name, formula) in book.defined_names() {
                if !is_builtin_name(name) {
                    workbook.set_defined_name(NameScope::Workbook, name, formula)?;
                }
            }
        }
    }

    Ok(workbook)
}

/// Built-in names (print areas, filters) belong to sheet features we do not carry.
fn is_builtin_name(name: &str) -> bool {
    name.starts_with("_xlnm.")
}

fn apply_parts(sheet: &mut model::Worksheet, parts: &SheetParts) -> Result<(), EngineError> {
    for (row, col, style) in &parts.styles {
        *sheet.style_mut(*row, *col)? = style.clone();
    }
    for &(first, last, width) in &parts.col_widths {
        for col in first..=last.min(MAX_COLS) {
            sheet.set_column_width(col, width)?;
        }
    }
    for &(row, height) in &parts.row_heights {
        sheet.set_row_height(row, height)?;
    }
    for &area in &parts.merges {
        sheet.add_merge(area)?;
    }
    for (rule, areas) in &parts.validations {
        sheet.add_validation(rule.clone(), areas.clone());
    }
    Ok(())
}

fn to_u32(n: usize) -> Result<u32, EngineError> {
    u32::try_from(n).map_err(|_| EngineError::RowOutOfBounds(u32::MAX))
}

// ─────────────────────────────────────────────────────────────────────────────
// Saving
// ─────────────────────────────────────────────────────────────────────────────

/// Saves `workbook` as an XLSX file at `path`.
#[cfg(test)]
pub fn save_workbook(workbook: &model::Workbook, path: &Path) -> Result<(), ExcelError> {
    let mut book = build_xlsx(workbook)?;
    book.save(path)?;
    Ok(())
}

/// Writes `workbook` as XLSX into `writer`.
pub fn write_workbook<W: Write + Seek + Send>(
    workbook: &model::Workbook,
    writer: W,
) -> Result<(), ExcelError> {
    let mut book = build_xlsx(workbook)?;
    book.save_to_writer(writer)?;
    Ok(())
}

fn build_xlsx(workbook: &model::Workbook) -> Result<rust_xlsxwriter::Workbook, ExcelError> {
    let mut book = rust_xlsxwriter::Workbook::new();

    for sheet in workbook.sheets() {
        let ws = book.add_worksheet();
        ws.set_name(sheet.name())?;
        for (col, width) in sheet.column_widths() {
            ws.set_column_width(xlsx_col(col)?, width)?;
        }
        for (row, height) in sheet.row_heights() {
            ws.set_row_height(row - 1, height)?;
        }
        // Merges go first so the top-left value written below replaces the
        // merge placeholder.
        for area in sheet.merges().iter().filter(|a| !a.is_single_cell()) {
            let format = build_format(&sheet.style(area.first_row, area.first_col));
            ws.merge_range(
                area.first_row - 1,
                xlsx_col(area.first_col)?,
                area.last_row - 1,
                xlsx_col(area.last_col)?,
                "",
                &format,
            )?;
        }
        for (row, col, cell) in sheet.cells() {
            write_cell(ws, row - 1, xlsx_col(col)?, cell)?;
        }
        write_validations(ws, sheet)?;
    }

    for defined in workbook.names() {
        let name = match &defined.scope {
            NameScope::Workbook => defined.name.clone(),
            NameScope::Sheet(sheet) => format!("{}!{}", quote_sheet_name(sheet), defined.name),
        };
        if let Err(e) = book.define_name(&name, &defined.refers_to) {
            tracing::warn!(%name, error = %e, "defined name not written");
        }
    }

    Ok(book)
}

fn xlsx_col(col: u32) -> Result<u16, EngineError> {
    u16::try_from(col - 1).map_err(|_| EngineError::ColumnOutOfBounds(col))
}

fn quote_sheet_name(sheet: &str) -> String {
    if sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        sheet.to_string()
    } else {
        format!("'{}'", sheet.replace('\'', "''"))
    }
}

#[allow(clippy::cast_precision_loss)]
fn write_cell(
    ws: &mut rust_xlsxwriter::Worksheet,
    row: u32,
    col: u16,
    cell: &Cell,
) -> Result<(), ExcelError> {
    let format = build_format(&cell.style);
    if let Some(formula) = &cell.formula {
        let mut formula = Formula::new(formula);
        if !cell.value.is_blank() {
            formula = formula.set_result(normalize(&cell.value));
        }
        ws.write_formula_with_format(row, col, formula, &format)?;
        return Ok(());
    }
    match &cell.value {
        CellValue::Empty => {
            if !cell.style.is_default() {
                ws.write_blank(row, col, &format)?;
            }
        }
        CellValue::Text(s) | CellValue::Error(s) => {
            ws.write_string_with_format(row, col, s, &format)?;
        }
        CellValue::Number(n) => {
            ws.write_number_with_format(row, col, *n, &format)?;
        }
        CellValue::Int(i) => {
            ws.write_number_with_format(row, col, *i as f64, &format)?;
        }
        CellValue::Bool(b) => {
            ws.write_boolean_with_format(row, col, *b, &format)?;
        }
    }
    Ok(())
}

const fn border(line: BorderLine) -> FormatBorder {
    match line {
        BorderLine::Thin => FormatBorder::Thin,
        BorderLine::Medium => FormatBorder::Medium,
        BorderLine::Thick => FormatBorder::Thick,
        BorderLine::Dashed => FormatBorder::Dashed,
        BorderLine::Dotted => FormatBorder::Dotted,
        BorderLine::Double => FormatBorder::Double,
        BorderLine::Hair => FormatBorder::Hair,
    }
}

fn build_format(style: &CellStyle) -> Format {
    let mut format = Format::new();
    if let Some(num_format) = &style.num_format {
        format = format.set_num_format(num_format);
    }
    if let Some(font) = &style.font {
        if let Some(name) = &font.name {
            format = format.set_font_name(name);
        }
        if let Some(size) = font.size {
            format = format.set_font_size(size);
        }
        if font.bold {
            format = format.set_bold();
        }
        if font.italic {
            format = format.set_italic();
        }
        if font.underline {
            format = format.set_underline(FormatUnderline::Single);
        }
        if let Some(rgb) = font.color {
            format = format.set_font_color(Color::RGB(rgb));
        }
    }
    let borders = style.borders;
    if let Some(line) = borders.left {
        format = format.set_border_left(border(line));
    }
    if let Some(line) = borders.right {
        format = format.set_border_right(border(line));
    }
    if let Some(line) = borders.top {
        format = format.set_border_top(border(line));
    }
    if let Some(line) = borders.bottom {
        format = format.set_border_bottom(border(line));
    }
    if let Some(h) = style.h_align {
        format = format.set_align(match h {
            HAlign::Left => FormatAlign::Left,
            HAlign::Center => FormatAlign::Center,
            HAlign::Right => FormatAlign::Right,
            HAlign::Justify => FormatAlign::Justify,
        });
    }
    if let Some(v) = style.v_align {
        format = format.set_align(match v {
            VAlign::Top => FormatAlign::Top,
            VAlign::Center => FormatAlign::VerticalCenter,
            VAlign::Bottom => FormatAlign::Bottom,
        });
    }
    if style.wrap {
        format = format.set_text_wrap();
    }
    if style.indent > 0 {
        format = format.set_indent(style.indent);
    }
    if let Some(rgb) = style.fill {
        format = format
            .set_pattern(FormatPattern::Solid)
            .set_background_color(Color::RGB(rgb));
    }
    format
}

/// Writes each validation once per area it covers.
fn write_validations(
    ws: &mut rust_xlsxwriter::Worksheet,
    sheet: &model::Worksheet,
) -> Result<(), ExcelError> {
    for validation in sheet.validations() {
        let rule = match &validation.rule {
            Validation::ListFormula(formula) => {
                DataValidation::new().allow_list_formula(Formula::new(formula))
            }
            Validation::ListValues(values) => {
                let values: Vec<&str> = values.iter().map(String::as_str).collect();
                DataValidation::new().allow_list_strings(&values)?
            }
            Validation::Custom(formula) => DataValidation::new().allow_custom(Formula::new(formula)),
        };
        for area in &validation.areas {
            ws.add_data_validation(
                area.first_row - 1,
                xlsx_col(area.first_col)?,
                area.last_row - 1,
                xlsx_col(area.last_col)?,
                &rule,
            )?;
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
