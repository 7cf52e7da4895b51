//! Common types for sheet-merge: cell values, areas, and the value/displayed
//! block pair read from a source sheet.

use serde::Serialize;

use crate::error::BlockError;

// ─────────────────────────────────────────────────────────────────────────────
// Cell Values
// ─────────────────────────────────────────────────────────────────────────────

/// A raw cell value as the spreadsheet engine stores it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// Empty cell.
    #[default]
    Empty,
    /// Native integer (ODS and some XLSB cells).
    Int(i64),
    /// Numeric value.
    Number(f64),
    /// String value.
    Text(String),
    /// Boolean value.
    Bool(bool),
    /// Error value, kept as its display text (e.g. `#N/A`).
    Error(String),
}

impl CellValue {
    /// Returns true for empty cells and empty strings.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Returns the numeric value if this is a number.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Wraps a string, mapping the empty string to [`CellValue::Empty`].
    pub fn text_or_empty(s: String) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s)
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Areas
// ─────────────────────────────────────────────────────────────────────────────

/// A rectangular cell area with 1-based, inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Area {
    pub first_row: u32,
    pub first_col: u32,
    pub last_row: u32,
    pub last_col: u32,
}

impl Area {
    pub const fn new(first_row: u32, first_col: u32, last_row: u32, last_col: u32) -> Self {
        Self {
            first_row,
            first_col,
            last_row,
            last_col,
        }
    }

    /// Area spanning `rows` rows from `first_row`, columns `1..=cols`.
    pub const fn rows_from(first_row: u32, rows: u32, cols: u32) -> Self {
        Self::new(first_row, 1, first_row + rows - 1, cols)
    }

    /// The single-column slice of this area at 1-based column `col`.
    pub const fn column(&self, col: u32) -> Self {
        Self::new(self.first_row, col, self.last_row, col)
    }

    pub const fn row_count(&self) -> u32 {
        self.last_row + 1 - self.first_row
    }

    pub const fn col_count(&self) -> u32 {
        self.last_col + 1 - self.first_col
    }

    pub const fn contains(&self, row: u32, col: u32) -> bool {
        row >= self.first_row && row <= self.last_row && col >= self.first_col && col <= self.last_col
    }

    /// True when `other` lies entirely inside this area.
    pub const fn contains_area(&self, other: &Self) -> bool {
        self.contains(other.first_row, other.first_col) && self.contains(other.last_row, other.last_col)
    }

    /// True for a one-cell area.
    pub const fn is_single_cell(&self) -> bool {
        self.first_row == self.last_row && self.first_col == self.last_col
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cell Block
// ─────────────────────────────────────────────────────────────────────────────

/// Source rows paired position-for-position with their displayed text.
///
/// The displayed text is captured before any transformation and keeps literal
/// formatting (leading zeros) that the raw value may have lost.
#[derive(Debug, Clone, PartialEq)]
pub struct CellBlock {
    values: Vec<Vec<CellValue>>,
    displayed: Vec<Vec<String>>,
    cols: usize,
}

impl CellBlock {
    /// Pairs a value block with its displayed block.
    ///
    /// Fails unless both blocks are rectangular with identical dimensions.
    pub fn new(values: Vec<Vec<CellValue>>, displayed: Vec<Vec<String>>) -> Result<Self, BlockError> {
        let cols = values.first().map_or(0, Vec::len);
        if displayed.len() != values.len() {
            return Err(BlockError::RowCount {
                values: values.len(),
                displayed: displayed.len(),
            });
        }
        for (row, (v, d)) in values.iter().zip(&displayed).enumerate() {
            if v.len() != cols || d.len() != cols {
                return Err(BlockError::Ragged {
                    row,
                    expected: cols,
                    values: v.len(),
                    displayed: d.len(),
                });
            }
        }
        Ok(Self {
            values,
            displayed,
            cols,
        })
    }

    pub fn rows(&self) -> usize {
        self.values.len()
    }

    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Returns true when no cell holds a real value.
    pub fn is_blank(&self) -> bool {
        self.values.iter().flatten().all(CellValue::is_blank)
    }

    /// Iterates `(value, displayed)` pairs down column `col`.
    pub fn column(&self, col: usize) -> impl Iterator<Item = (&CellValue, &str)> {
        self.values
            .iter()
            .zip(&self.displayed)
            .map(move |(v, d)| (&v[col], d[col].as_str()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────────────────────────────────────

/// Rows and columns written for one sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetOutcome {
    pub sheet: String,
    pub rows: u32,
    pub cols: u32,
}

impl SheetOutcome {
    pub fn skipped(sheet: &str) -> Self {
        Self {
            sheet: sheet.to_string(),
            rows: 0,
            cols: 0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|s| (*s).to_string()).collect())
            .collect()
    }

    #[test]
    fn blank_detection() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::Text(String::new()).is_blank());
        assert!(!CellValue::Text(" ".to_string()).is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
        assert!(!CellValue::Bool(false).is_blank());
    }

    #[test]
    fn text_or_empty_maps_empty_string() {
        assert_eq!(CellValue::text_or_empty(String::new()), CellValue::Empty);
        assert_eq!(
            CellValue::text_or_empty("05".to_string()),
            CellValue::Text("05".to_string())
        );
    }

    #[test]
    fn area_counts() {
        let area = Area::rows_from(6, 3, 4);
        assert_eq!(area, Area::new(6, 1, 8, 4));
        assert_eq!(area.row_count(), 3);
        assert_eq!(area.col_count(), 4);
        assert_eq!(area.column(3), Area::new(6, 3, 8, 3));
        assert!(area.contains(8, 4));
        assert!(!area.contains(9, 1));
        assert!(area.contains_area(&Area::new(7, 2, 8, 2)));
        assert!(!area.contains_area(&Area::new(7, 2, 9, 2)));
        assert!(Area::new(2, 2, 2, 2).is_single_cell());
    }

    #[test]
    fn block_rejects_mismatched_shapes() {
        let values = vec![vec![CellValue::from(1.0), CellValue::from(2.0)]];
        assert!(CellBlock::new(values.clone(), texts(&[&["1"]])).is_err());
        assert!(CellBlock::new(values.clone(), texts(&[&["1", "2"], &["3", "4"]])).is_err());
        assert!(CellBlock::new(values, texts(&[&["1", "2"]])).is_ok());
    }

    #[test]
    fn block_blank_and_column_access() {
        let block = CellBlock::new(
            vec![
                vec![CellValue::Empty, CellValue::from("")],
                vec![CellValue::Empty, CellValue::from(7.0)],
            ],
            texts(&[&["", ""], &["", "007"]]),
        )
        .unwrap();
        assert!(!block.is_blank());
        assert_eq!(block.rows(), 2);
        assert_eq!(block.cols(), 2);
        let col: Vec<_> = block.column(1).map(|(_, d)| d).collect();
        assert_eq!(col, vec!["", "007"]);

        let empty = CellBlock::new(
            vec![vec![CellValue::Empty, CellValue::from("")]],
            texts(&[&["", ""]]),
        )
        .unwrap();
        assert!(empty.is_blank());
    }
}
