//! Column classification.
//!
//! One pass over a column decides whether it can be written as native numbers
//! or must be forced to text to keep what the source showed.

use crate::normalize::{integer_digits, parse_plain_decimal, plain_number};
use crate::types::{CellBlock, CellValue};

/// Digits beyond which an integer is no longer exact in an `f64`.
pub const MAX_EXACT_DIGITS: usize = 15;

// ─────────────────────────────────────────────────────────────────────────────
// Column Scan
// ─────────────────────────────────────────────────────────────────────────────

/// Flags gathered from every non-blank cell of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnScan {
    /// Displayed text like `"007"`: digits only, more than one, leading zero.
    pub text_leading_zero: bool,
    /// An integer-like value with more than [`MAX_EXACT_DIGITS`] digits.
    pub very_long_int: bool,
    /// A numeric value with a fractional part.
    pub any_decimal: bool,
    /// Every non-blank value is numeric.
    pub all_numeric: bool,
}

impl Default for ColumnScan {
    fn default() -> Self {
        Self {
            text_leading_zero: false,
            very_long_int: false,
            any_decimal: false,
            all_numeric: true,
        }
    }
}

/// Final verdict for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnClass {
    /// Write every cell as a string.
    Text,
    /// Native numbers with a decimal display format.
    Decimal,
    /// Native numbers with an integer display format.
    Integer,
}

impl ColumnScan {
    pub const fn class(&self) -> ColumnClass {
        if self.text_leading_zero || self.very_long_int || !self.all_numeric {
            ColumnClass::Text
        } else if self.any_decimal {
            ColumnClass::Decimal
        } else {
            ColumnClass::Integer
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scanning
// ─────────────────────────────────────────────────────────────────────────────

/// How a single value looks numerically.
enum Numeric {
    IntLike { digits: usize },
    Fraction,
    NotNumeric,
}

fn numeric_kind(value: &CellValue) -> Numeric {
    match value {
        CellValue::Int(i) => Numeric::IntLike {
            digits: i.unsigned_abs().to_string().len(),
        },
        CellValue::Number(n) if n.is_finite() && (n - n.round()).abs() <= 1e-9 => {
            let whole = plain_number(n.round().abs());
            Numeric::IntLike {
                digits: whole.chars().filter(char::is_ascii_digit).count(),
            }
        }
        CellValue::Number(_) => Numeric::Fraction,
        CellValue::Text(s) => match parse_plain_decimal(s) {
            Some(d) if d.fract().is_zero() => Numeric::IntLike {
                digits: integer_digits(d),
            },
            Some(_) => Numeric::Fraction,
            None => Numeric::NotNumeric,
        },
        CellValue::Bool(_) | CellValue::Error(_) | CellValue::Empty => Numeric::NotNumeric,
    }
}

fn is_leading_zero_text(displayed: &str) -> bool {
    let trimmed = displayed.trim();
    displayed.len() > 1
        && trimmed.starts_with('0')
        && trimmed.chars().all(|c| c.is_ascii_digit())
}

/// Scans column `col` of `block`, skipping blank values.
pub fn scan_column(block: &CellBlock, col: usize) -> ColumnScan {
    let mut scan = ColumnScan::default();
    for (value, displayed) in block.column(col) {
        if value.is_blank() {
            continue;
        }
        if is_leading_zero_text(displayed) {
            scan.text_leading_zero = true;
        }
        match numeric_kind(value) {
            Numeric::IntLike { digits } => {
                if digits > MAX_EXACT_DIGITS {
                    scan.very_long_int = true;
                }
            }
            Numeric::Fraction => scan.any_decimal = true,
            Numeric::NotNumeric => scan.all_numeric = false,
        }
    }
    scan
}

/// Scans and classifies column `col` of `block`.
pub fn classify_column(block: &CellBlock, col: usize) -> ColumnClass {
    let scan = scan_column(block, col);
    let class = scan.class();
    tracing::debug!(col, ?scan, ?class, "column classified");
    class
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn single_column(values: Vec<CellValue>, displayed: &[&str]) -> CellBlock {
        CellBlock::new(
            values.into_iter().map(|v| vec![v]).collect(),
            displayed.iter().map(|d| vec![(*d).to_string()]).collect(),
        )
        .unwrap()
    }

    #[test]
    fn plain_integers_are_integer_class() {
        let block = single_column(
            vec![1.0.into(), 2.0.into(), 3.0.into()],
            &["1", "2", "3"],
        );
        assert_eq!(classify_column(&block, 0), ColumnClass::Integer);
    }

    #[test]
    fn fractions_make_decimal_class() {
        let block = single_column(vec![1.0.into(), 2.5.into()], &["1", "2.5"]);
        let scan = scan_column(&block, 0);
        assert!(scan.any_decimal);
        assert_eq!(scan.class(), ColumnClass::Decimal);
    }

    #[test]
    fn displayed_leading_zeros_force_text() {
        let block = single_column(vec![7.0.into(), 13.0.into()], &["007", "013"]);
        let scan = scan_column(&block, 0);
        assert!(scan.text_leading_zero);
        assert!(scan.all_numeric);
        assert_eq!(scan.class(), ColumnClass::Text);
    }

    #[test]
    fn single_zero_is_not_a_leading_zero() {
        let block = single_column(vec![0.0.into(), 5.0.into()], &["0", "5"]);
        assert_eq!(classify_column(&block, 0), ColumnClass::Integer);
    }

    #[test]
    fn one_word_among_numbers_forces_text() {
        let block = single_column(
            vec![1.0.into(), "n/a".into(), 3.0.into()],
            &["1", "n/a", "3"],
        );
        let scan = scan_column(&block, 0);
        assert!(!scan.all_numeric);
        assert_eq!(scan.class(), ColumnClass::Text);
    }

    #[test]
    fn numeric_strings_count_as_numbers() {
        let block = single_column(vec!["12".into(), " 4.75 ".into()], &["12", " 4.75 "]);
        assert_eq!(classify_column(&block, 0), ColumnClass::Decimal);
    }

    #[test]
    fn long_integers_force_text() {
        let block = single_column(
            vec![CellValue::Number(1_234_567_890_123_456.0)],
            &["1.23457E+15"],
        );
        assert!(scan_column(&block, 0).very_long_int);

        let block = single_column(vec!["12345678901234567890".into()], &["12345678901234567890"]);
        assert_eq!(classify_column(&block, 0), ColumnClass::Text);

        let block = single_column(vec![CellValue::Int(999_999_999_999_999)], &["999999999999999"]);
        assert_eq!(classify_column(&block, 0), ColumnClass::Integer);
    }

    #[test]
    fn booleans_are_not_numeric() {
        let block = single_column(vec![1.0.into(), CellValue::Bool(true)], &["1", "TRUE"]);
        assert_eq!(classify_column(&block, 0), ColumnClass::Text);
    }

    #[test]
    fn blanks_are_ignored() {
        let block = single_column(
            vec![CellValue::Empty, "".into(), 4.0.into()],
            &["", "", "4"],
        );
        assert_eq!(scan_column(&block, 0), ColumnScan::default());
        assert_eq!(classify_column(&block, 0), ColumnClass::Integer);
    }
}
