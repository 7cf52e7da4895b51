//! Column spec resolution.
//!
//! Turns the operator's column identifiers into 0-based indices valid for the
//! sheet being merged, and picks one rule per column.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{ColumnId, SheetRules};
use crate::error::ColumnSkip;
use crate::model::{MAX_COLS, MAX_ROWS};
use crate::types::Area;

// ─────────────────────────────────────────────────────────────────────────────
// Column Letters
// ─────────────────────────────────────────────────────────────────────────────

/// Converts column letters to a 1-based index: `"A"` → 1, `"AA"` → 27.
///
/// Case-insensitive; surrounding whitespace is ignored.
pub fn column_letter_to_index(letters: &str) -> Option<u32> {
    let letters = letters.trim();
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, ch| {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = u32::from(ch.to_ascii_uppercase()) - u32::from('A') + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })
}

/// Converts a 1-based column index to letters: 1 → `"A"`, 27 → `"AA"`.
pub fn column_index_to_letter(mut index: u32) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push(char::from_u32(u32::from('A') + rem).unwrap_or('A'));
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Resolves an identifier to a 1-based sheet column, ignoring any sheet width.
///
/// `"E"`, `"e"` and `5` all resolve to 5.
pub fn column_number(id: &ColumnId) -> Option<u32> {
    match id {
        ColumnId::Index(i) => u32::try_from(*i).ok().filter(|c| (1..=MAX_COLS).contains(c)),
        ColumnId::Letter(s) => column_letter_to_index(s).filter(|&c| c <= MAX_COLS),
    }
}

/// Resolves one identifier to a 0-based column index within `width` columns.
pub fn resolve_column(id: &ColumnId, width: usize) -> Result<usize, ColumnSkip> {
    let one_based = match id {
        ColumnId::Index(i) => *i,
        ColumnId::Letter(s) => column_letter_to_index(s)
            .map(i64::from)
            .ok_or_else(|| ColumnSkip::Malformed(s.clone()))?,
    };
    match usize::try_from(one_based) {
        Ok(j) if (1..=width).contains(&j) => Ok(j - 1),
        _ => Err(ColumnSkip::OutOfRange {
            index: one_based,
            width,
        }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cell References
// ─────────────────────────────────────────────────────────────────────────────

/// Parses an A1 reference such as `B5` or `$B$5` into 1-based `(row, col)`.
pub fn parse_cell_ref(reference: &str) -> Option<(u32, u32)> {
    let reference = reference.trim();
    let rest = reference.strip_prefix('$').unwrap_or(reference);
    let split = rest.find(|c: char| !c.is_ascii_alphabetic())?;
    let (letters, digits) = rest.split_at(split);
    let digits = digits.strip_prefix('$').unwrap_or(digits);
    if letters.is_empty() || letters.len() > 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let col = column_letter_to_index(letters).filter(|&c| c <= MAX_COLS)?;
    let row = digits.parse::<u32>().ok().filter(|r| (1..=MAX_ROWS).contains(r))?;
    Some((row, col))
}

/// Parses `A1:C3` (or a single cell) into an [`Area`].
pub fn parse_area(reference: &str) -> Option<Area> {
    let (first, last) = reference.split_once(':').unwrap_or((reference, reference));
    let (r1, c1) = parse_cell_ref(first)?;
    let (r2, c2) = parse_cell_ref(last)?;
    Some(Area::new(r1.min(r2), c1.min(c2), r1.max(r2), c1.max(c2)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolved Rules
// ─────────────────────────────────────────────────────────────────────────────

/// The rule applied to one destination column, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRule {
    /// Write `"<value>%"` strings.
    Percent,
    /// Left-pad with zeros to this total length.
    Pad(usize),
    /// Round to this many fractional digits.
    Precision(u32),
    /// Let the classifier decide.
    Inferred,
}

/// Rule tables for one sheet keyed by 0-based column index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub percent: BTreeSet<usize>,
    pub pad: BTreeMap<usize, usize>,
    pub precision: BTreeMap<usize, u32>,
}

impl ResolvedColumns {
    /// Resolves a sheet's rules against its width, dropping identifiers that
    /// are malformed or outside the sheet.
    pub fn resolve(sheet: &str, rules: &SheetRules, width: usize) -> Self {
        let mut out = Self::default();
        for id in &rules.percent {
            if let Some(j) = accept(sheet, "percent", id, width) {
                out.percent.insert(j);
            }
        }
        for (id, len) in &rules.pad {
            if let Some(j) = accept(sheet, "pad", id, width) {
                out.pad.insert(j, *len);
            }
        }
        for (id, digits) in &rules.precision {
            if let Some(j) = accept(sheet, "precision", id, width) {
                out.precision.insert(j, *digits);
            }
        }
        out
    }

    /// The single rule for column `col`: percent > pad > precision > inferred.
    pub fn rule_for(&self, col: usize) -> ColumnRule {
        if self.percent.contains(&col) {
            ColumnRule::Percent
        } else if let Some(len) = self.pad.get(&col) {
            ColumnRule::Pad(*len)
        } else if let Some(digits) = self.precision.get(&col) {
            ColumnRule::Precision(*digits)
        } else {
            ColumnRule::Inferred
        }
    }
}

fn accept(sheet: &str, table: &str, id: &ColumnId, width: usize) -> Option<usize> {
    match resolve_column(id, width) {
        Ok(j) => Some(j),
        Err(skip) => {
            tracing::debug!(sheet, table, column = %id, "column rule skipped: {skip}");
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
