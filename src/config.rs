//! Operator-editable merge configuration.
//!
//! Loaded from YAML; every field has a default so a partial file is valid.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::resolver;

// ─────────────────────────────────────────────────────────────────────────────
// Column Identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// A column as written by the operator: a 1-based index or letters like `"AM"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(untagged)]
pub enum ColumnId {
    Index(i64),
    Letter(String),
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Letter(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ColumnId {
    fn from(s: &str) -> Self {
        Self::Letter(s.to_string())
    }
}

impl From<i64> for ColumnId {
    fn from(i: i64) -> Self {
        Self::Index(i)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-Sheet Rules
// ─────────────────────────────────────────────────────────────────────────────

/// Column rule tables for one sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SheetRules {
    /// Columns written as `"<value>%"` strings.
    pub percent: Vec<ColumnId>,
    /// Columns left-padded with zeros to a total length.
    pub pad: BTreeMap<ColumnId, usize>,
    /// Columns rounded to a fixed number of fractional digits.
    pub precision: BTreeMap<ColumnId, u32>,
}

/// A named range to stretch over the merged rows.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedRangeSpec {
    pub sheet: String,
    pub name: String,
    pub column: String,
    pub start_row: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Merge Config
// ─────────────────────────────────────────────────────────────────────────────

/// Full merge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// First data row in both workbooks.
    pub start_row: u32,
    /// Insert blank rows in the destination before writing.
    pub insert_rows: bool,
    /// Copy validation and formatting from the reference row onto new rows.
    pub apply_reference_format: bool,
    /// Remove fills inherited from the reference row.
    pub clear_static_fill: bool,
    /// Destination row whose formatting new rows inherit.
    pub reference_row: u32,
    /// Column rules keyed by sheet name.
    pub sheets: BTreeMap<String, SheetRules>,
    /// Named ranges extended after the merge.
    pub named_ranges: Vec<NamedRangeSpec>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            start_row: 6,
            insert_rows: true,
            apply_reference_format: true,
            clear_static_fill: true,
            reference_row: 5,
            sheets: BTreeMap::new(),
            named_ranges: Vec::new(),
        }
    }
}

impl MergeConfig {
    /// Loads a configuration file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        if config.start_row == 0 || config.reference_row == 0 {
            anyhow::bail!("start_row and reference_row are 1-based and must be positive");
        }
        Ok(config)
    }

    /// Rules for `sheet`, empty when none are configured.
    pub fn rules_for(&self, sheet: &str) -> SheetRules {
        self.sheets.get(sheet).cloned().unwrap_or_default()
    }

    /// Lists `(sheet, column)` pairs configured in more than one rule table.
    ///
    /// Identifiers naming the same column (`E`, `e`, `5`) count as one; the
    /// first one written is reported. Identifiers that resolve to no column
    /// compare by their text.
    pub fn overlaps(&self) -> Vec<(String, ColumnId)> {
        let mut out = Vec::new();
        for (sheet, rules) in &self.sheets {
            let tables: [Vec<&ColumnId>; 3] = [
                rules.percent.iter().collect(),
                rules.pad.keys().collect(),
                rules.precision.keys().collect(),
            ];
            // Column -> (first identifier, tables naming it).
            let mut named: BTreeMap<ColumnKey, (&ColumnId, usize)> = BTreeMap::new();
            for table in tables {
                let mut in_table = BTreeSet::new();
                for col in table {
                    let key = ColumnKey::of(col);
                    if in_table.insert(key.clone()) {
                        named.entry(key).or_insert((col, 0)).1 += 1;
                    }
                }
            }
            out.extend(
                named
                    .into_values()
                    .filter(|(_, tables)| *tables > 1)
                    .map(|(col, _)| (sheet.clone(), col.clone())),
            );
        }
        out
    }
}

/// What a [`ColumnId`] refers to, for comparing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum ColumnKey {
    Number(u32),
    Unresolved(String),
}

impl ColumnKey {
    fn of(id: &ColumnId) -> Self {
        resolver::column_number(id).map_or_else(|| Self::Unresolved(id.to_string()), Self::Number)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
