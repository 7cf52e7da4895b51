//! Row shifting for A1 references inside formula text.
//!
//! Inserting rows in a sheet moves every cell at or below the insertion
//! point. Formulas, list sources and defined names that point at those cells
//! have to move with them, wherever they live in the workbook.

use crate::model::MAX_ROWS;
use crate::resolver::parse_cell_ref;

/// Rewrites `formula` as if `count` rows had been inserted at row `at` of
/// `sheet`.
///
/// References qualified with `sheet` always move. Unqualified references move
/// only when `home` is set, that is when the formula itself belongs to
/// `sheet`. Absolute and relative rows move alike. String literals and
/// function names are left untouched, and a reference pushed past the last
/// row becomes `#REF!`.
pub fn shift_rows(formula: &str, sheet: &str, home: bool, at: u32, count: u32) -> String {
    if count == 0 {
        return formula.to_string();
    }
    let chars: Vec<char> = formula.chars().collect();
    let mut out = String::with_capacity(formula.len() + 4);
    // Sheet named immediately before the next token.
    let mut qualifier: Option<String> = None;
    // Sheet of a reference that opened a `A1:B2` range.
    let mut range_sheet: Option<String> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '"' {
            let end = string_end(&chars, i);
            out.extend(&chars[i..end]);
            i = end;
            qualifier = None;
            range_sheet = None;
        } else if c == '\'' {
            let end = string_end(&chars, i);
            if chars.get(end) == Some(&'!') {
                let inner: String = chars[i + 1..end - 1].iter().collect();
                qualifier = Some(inner.replace("''", "'"));
                out.extend(&chars[i..=end]);
                i = end + 1;
            } else {
                out.extend(&chars[i..end]);
                i = end;
            }
        } else if is_word_char(c) {
            let start = i;
            while i < chars.len() && is_word_char(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            match chars.get(i) {
                Some('!') => {
                    out.push_str(&word);
                    out.push('!');
                    qualifier = Some(word);
                    i += 1;
                    continue;
                }
                Some('(') => {
                    out.push_str(&word);
                    qualifier = None;
                    range_sheet = None;
                    continue;
                }
                _ => {}
            }

            let owner = qualifier.take().or_else(|| range_sheet.take());
            let Some((row, _)) = parse_cell_ref(&word) else {
                out.push_str(&word);
                continue;
            };
            let applies = owner
                .as_deref()
                .map_or(home, |name| name.eq_ignore_ascii_case(sheet));
            if applies && row >= at {
                out.push_str(&moved_ref(&word, row, count));
            } else {
                out.push_str(&word);
            }
            if chars.get(i) == Some(&':') {
                range_sheet = owner;
            }
        } else {
            out.push(c);
            if c != ':' {
                range_sheet = None;
            }
            i += 1;
        }
    }
    out
}

/// `word` with its row digits replaced by `row + count`.
fn moved_ref(word: &str, row: u32, count: u32) -> String {
    let digits = word.len() - word.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    match row.checked_add(count).filter(|&r| r <= MAX_ROWS) {
        Some(moved) => format!("{}{moved}", &word[..word.len() - digits]),
        None => "#REF!".to_string(),
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '.')
}

/// Index just past the quoted run opening at `start`. A doubled quote is an
/// escaped quote.
fn string_end(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn own_sheet_references_move_below_insert_point() {
        assert_eq!(shift_rows("SUM(B6:B10)", "Documents", true, 6, 3), "SUM(B9:B13)");
        assert_eq!(shift_rows("$B$5+B7", "Documents", true, 6, 3), "$B$5+B10");
        assert_eq!(shift_rows("A1*2", "Documents", true, 6, 3), "A1*2");
    }

    #[test]
    fn unqualified_references_stay_on_other_sheets() {
        assert_eq!(shift_rows("B10", "Documents", false, 6, 2), "B10");
        assert_eq!(shift_rows("Documents!B10", "Documents", false, 6, 2), "Documents!B12");
        assert_eq!(shift_rows("Lists!B10", "Documents", false, 6, 2), "Lists!B10");
    }

    #[test]
    fn qualified_ranges_move_both_ends() {
        assert_eq!(
            shift_rows("'Line Items'!$C$5:$C$20", "Line Items", false, 6, 10),
            "'Line Items'!$C$5:$C$30"
        );
        assert_eq!(
            shift_rows("'Bob''s'!A7", "Bob's", false, 6, 1),
            "'Bob''s'!A8"
        );
        assert_eq!(
            shift_rows("documents!$B$10", "Documents", false, 6, 4),
            "documents!$B$14"
        );
    }

    #[test]
    fn literals_and_functions_are_untouched() {
        assert_eq!(
            shift_rows("IF(B7=\"B7\",LOG10(B8),1.5E7)", "S", true, 6, 1),
            "IF(B8=\"B7\",LOG10(B9),1.5E7)"
        );
        assert_eq!(shift_rows("InvoiceNumbersList", "S", true, 1, 5), "InvoiceNumbersList");
        assert_eq!(shift_rows("B7", "S", true, 6, 0), "B7");
    }

    #[test]
    fn references_past_the_last_row_become_ref_errors() {
        assert_eq!(shift_rows("A1048576", "S", true, 6, 1), "#REF!");
    }
}
