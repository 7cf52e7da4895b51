//! Error types for sheet-merge.

use thiserror::Error;

/// Failures reported by a spreadsheet engine implementation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("sheet not found: {0}")]
    UnknownSheet(String),

    #[error("row {0} is outside the sheet")]
    RowOutOfBounds(u32),

    #[error("column {0} is outside the sheet")]
    ColumnOutOfBounds(u32),

    #[error(transparent)]
    Block(#[from] BlockError),
}

/// A value block and its displayed-text block disagree on shape.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockError {
    #[error("value block has {values} rows but displayed block has {displayed}")]
    RowCount { values: usize, displayed: usize },

    #[error("row {row}: expected {expected} columns, got {values} values and {displayed} displayed")]
    Ragged {
        row: usize,
        expected: usize,
        values: usize,
        displayed: usize,
    },
}

/// Why a configured column identifier was dropped.
///
/// These are policy skips: the column falls back to inferred behavior.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColumnSkip {
    #[error("malformed column identifier {0:?}")]
    Malformed(String),

    #[error("column {index} is outside 1..={width}")]
    OutOfRange { index: i64, width: usize },
}

/// Failures loading or saving a workbook file.
#[derive(Debug, Error)]
pub enum ExcelError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        source: calamine::Error,
    },

    #[error("failed to read sheet {sheet}: {source}")]
    Sheet {
        sheet: String,
        source: calamine::Error,
    },

    #[error("failed to read {path}: {source}")]
    Parts { path: String, source: PartError },

    #[error("failed to write workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Failures reading XLSX package parts directly.
#[derive(Debug, Error)]
pub enum PartError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("missing part: {0}")]
    MissingPart(String),
}
