//! Plain-text rendering of cell values.
//!
//! Numbers go through `rust_decimal` so large or small values never come out
//! in scientific notation.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::types::CellValue;

/// Renders a cell value as canonical plain text.
///
/// Strings pass through unchanged (leading zeros included), integers have no
/// decimal point, and fractions lose trailing zeros.
pub fn normalize(value: &CellValue) -> String {
    match value {
        CellValue::Empty => String::new(),
        CellValue::Text(s) | CellValue::Error(s) => s.clone(),
        CellValue::Int(i) => i.to_string(),
        CellValue::Number(n) => plain_number(*n),
        CellValue::Bool(b) => bool_text(*b).to_string(),
    }
}

/// Renders a float without exponent notation.
pub fn plain_number(n: f64) -> String {
    // f64 Display is the shortest round-trip form and never uses an exponent.
    // Past 28 fractional digits a Decimal would round, so the text stays as is.
    let rendered = n.to_string();
    Decimal::from_str_exact(&rendered).map_or(rendered, plain_decimal)
}

fn plain_decimal(d: Decimal) -> String {
    if d.is_zero() {
        return "0".to_string();
    }
    d.normalize().to_string()
}

pub const fn bool_text(b: bool) -> &'static str {
    if b {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Parses text that is a plain decimal number (no exponent), ignoring
/// surrounding whitespace.
pub fn parse_plain_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    if s.is_empty() || s.contains(['e', 'E']) {
        return None;
    }
    Decimal::from_str_exact(s).ok()
}

/// Rounds half away from zero to `digits` fractional digits.
pub fn round_half_away(n: f64, digits: u32) -> f64 {
    if !n.is_finite() {
        return n;
    }
    Decimal::from_str_exact(&n.to_string())
        .ok()
        .and_then(|d| {
            d.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero)
                .to_string()
                .parse::<f64>()
                .ok()
        })
        .unwrap_or_else(|| {
            let scale = 10f64.powi(i32::try_from(digits).unwrap_or(i32::MAX));
            (n * scale).round() / scale
        })
}

/// Number of decimal digits in the integer part of `d`, sign excluded.
pub fn integer_digits(d: Decimal) -> usize {
    let whole = d.trunc().abs().normalize().to_string();
    whole.chars().filter(char::is_ascii_digit).count()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
