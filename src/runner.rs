//! Merge runner - executes one template/source merge.
//!
//! Orchestrates the pipeline:
//! 1. Load the template and the source workbook
//! 2. Merge every sheet present in both, in name order
//! 3. Extend the configured named ranges over the merged rows
//! 4. Save the result to a new timestamped file

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use crate::config::MergeConfig;
use crate::engine::WorkbookEngine;
use crate::error::EngineError;
use crate::excel;
use crate::named_range::{extend_all, NamedRangeOutcome};
use crate::transform::merge_sheet;
use crate::types::SheetOutcome;

// ─────────────────────────────────────────────────────────────────────────────
// Report
// ─────────────────────────────────────────────────────────────────────────────

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    /// Path of the file written.
    pub output: PathBuf,
    /// `HHMM_DDMMYYYY` stamp used in the file name.
    pub timestamp: String,
    pub sheets: Vec<SheetOutcome>,
    pub named_ranges: Vec<NamedRangeOutcome>,
}

impl MergeReport {
    /// Total rows written across all sheets.
    pub fn total_rows(&self) -> u32 {
        self.sheets.iter().map(|s| s.rows).sum()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Merge Runner
// ─────────────────────────────────────────────────────────────────────────────

/// Runs merges under one configuration.
pub struct MergeRunner {
    config: MergeConfig,
}

impl MergeRunner {
    /// Creates a runner, warning about columns claimed by several rule tables.
    pub fn new(config: MergeConfig) -> Self {
        for (sheet, column) in config.overlaps() {
            tracing::warn!(
                %sheet,
                %column,
                "column has more than one rule; percent wins over pad, pad over precision"
            );
        }
        Self { config }
    }

    /// Merges every sheet `src` and `dst` have in common into `dst`.
    ///
    /// Sheets are visited in sorted name order. After rows are inserted into a
    /// sheet, references to it from names and other sheets are moved down.
    pub fn merge<W: WorkbookEngine>(&self, src: &W, dst: &mut W) -> Result<Vec<SheetOutcome>, EngineError> {
        let src_names: BTreeSet<String> = src.sheet_names().into_iter().collect();
        let dst_names: BTreeSet<String> = dst.sheet_names().into_iter().collect();

        let mut outcomes = Vec::new();
        for name in src_names.intersection(&dst_names) {
            let (Some(src_sheet), Some(dst_sheet)) = (src.sheet(name), dst.sheet_mut(name)) else {
                continue;
            };
            let rules = self.config.rules_for(name);
            let outcome = merge_sheet(src_sheet, dst_sheet, &rules, &self.config)?;
            if self.config.insert_rows && outcome.rows > 0 {
                dst.rows_inserted(name, self.config.start_row, outcome.rows);
            }
            outcomes.push(outcome);
        }

        for name in src_names.difference(&dst_names) {
            tracing::debug!(sheet = %name, "source sheet has no template counterpart");
        }
        Ok(outcomes)
    }

    /// Merges `source` into a copy of `template` and saves it in `output_dir`.
    ///
    /// The template file is only read. The output appears atomically: it is
    /// written to a temporary file in `output_dir` and persisted under its
    /// final name once complete.
    pub fn run(
        &self,
        template: &Path,
        source: &Path,
        output_dir: &Path,
        user: &str,
    ) -> anyhow::Result<MergeReport> {
        let mut dst = excel::load_workbook(template)
            .with_context(|| format!("Failed to open template {}", template.display()))?;
        let src = excel::load_workbook(source)
            .with_context(|| format!("Failed to open source {}", source.display()))?;

        let sheets = self.merge(&src, &mut dst).context("Failed to merge sheets")?;
        drop(src);
        let named_ranges = extend_all(&mut dst, &self.config.named_ranges);

        fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
        let timestamp = output_timestamp();
        let output = output_dir.join(output_file_name(user, &timestamp));

        let mut tmp = tempfile::Builder::new()
            .prefix(".sheet-merge-")
            .suffix(".xlsx")
            .tempfile_in(output_dir)
            .with_context(|| format!("Failed to create temporary file in {}", output_dir.display()))?;
        excel::write_workbook(&dst, tmp.as_file_mut())
            .with_context(|| format!("Failed to write {}", output.display()))?;
        tmp.persist(&output)
            .with_context(|| format!("Failed to save {}", output.display()))?;

        tracing::info!(output = %output.display(), "merged workbook saved");
        Ok(MergeReport {
            output,
            timestamp,
            sheets,
            named_ranges,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output Naming
// ─────────────────────────────────────────────────────────────────────────────

/// Local time as `HHMM_DDMMYYYY`.
pub fn output_timestamp() -> String {
    chrono::Local::now().format("%H%M_%d%m%Y").to_string()
}

/// `{user}_{timestamp}.xlsx`, with path separators in `user` replaced.
pub fn output_file_name(user: &str, timestamp: &str) -> String {
    let user: String = user
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    let user = if user.is_empty() { "user".to_string() } else { user };
    format!("{user}_{timestamp}.xlsx")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NamedRangeSpec, SheetRules};
    use crate::engine::{NameScope, SheetEngine};
    use crate::model::{BorderLine, Borders, CellStyle, Font, HAlign, Validation, Workbook};
    use crate::named_range::ExtendOutcome;
    use crate::types::{Area, CellValue};
    use pretty_assertions::assert_eq;

    fn documents_config() -> MergeConfig {
        let mut config = MergeConfig::default();
        let mut rules = SheetRules::default();
        rules.pad.insert("C".into(), 2);
        config.sheets.insert("Documents".to_string(), rules);
        config
    }

    /// Template with a header, a counting formula, a styled reference row 5
    /// with a list validation, and one stale data row.
    fn template() -> Workbook {
        let mut wb = Workbook::new();
        let sheet = wb.add_sheet("Documents");
        sheet.set_value(1, 1, "Documents").unwrap();
        sheet.set_value(2, 1, 1.0).unwrap();
        sheet.set_formula(2, 1, "=COUNTA(A6:A10)").unwrap();
        for col in 1..=3 {
            *sheet.style_mut(5, col).unwrap() = CellStyle {
                font: Some(Font {
                    bold: true,
                    ..Font::default()
                }),
                borders: Borders {
                    bottom: Some(BorderLine::Thin),
                    ..Borders::default()
                },
                h_align: Some(HAlign::Center),
                fill: Some(0x00FF_FF00),
                ..CellStyle::default()
            };
        }
        sheet.add_validation(
            Validation::ListValues(vec!["X".to_string()]),
            vec![Area::new(5, 1, 5, 3)],
        );
        sheet.set_row_height(5, 18.0).unwrap();
        sheet.set_value(6, 1, "existing").unwrap();
        wb.add_sheet("TemplateOnly");
        wb.set_defined_name(NameScope::Workbook, "Stale", "=Documents!$A$6").unwrap();
        wb
    }

    fn source(rows: &[(&str, f64)]) -> Workbook {
        let mut wb = Workbook::new();
        let sheet = wb.add_sheet("Documents");
        sheet.set_value(1, 1, "Documents").unwrap();
        for (row, (number, kind)) in (6..).zip(rows) {
            sheet.set_value(row, 1, *number).unwrap();
            sheet.set_value(row, 3, *kind).unwrap();
        }
        wb.add_sheet("SourceOnly").set_value(6, 1, "ignored").unwrap();
        wb
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Merge
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn pads_document_types_and_inserts_rows() {
        let runner = MergeRunner::new(documents_config());
        let src = source(&[("INV-1", 5.0), ("INV-2", 12.0), ("INV-3", 7.0)]);
        let mut dst = template();

        let outcomes = runner.merge(&src, &mut dst).unwrap();
        assert_eq!(
            outcomes,
            vec![SheetOutcome {
                sheet: "Documents".to_string(),
                rows: 3,
                cols: 3,
            }]
        );

        let sheet = dst.sheet("Documents").unwrap();
        assert_eq!(
            sheet.read_values(Area::new(6, 3, 8, 3)),
            vec![
                vec![CellValue::from("05")],
                vec![CellValue::from("12")],
                vec![CellValue::from("07")],
            ]
        );
        assert_eq!(sheet.style(7, 3).num_format.as_deref(), Some("@"));
        assert_eq!(sheet.value(9, 1), CellValue::from("existing"));

        let inherited = sheet.style(6, 2);
        assert_eq!(inherited.h_align, Some(HAlign::Center));
        assert_eq!(inherited.fill, None);
        assert_eq!(inherited.borders.bottom, Some(BorderLine::Thin));
        let list = Validation::ListValues(vec!["X".to_string()]);
        assert_eq!(sheet.validation_at(6, 2), Some(&list));
        assert_eq!(sheet.validation_at(8, 3), Some(&list));
        assert_eq!(sheet.validation_at(9, 1), None);
        assert_eq!(
            sheet.row_heights().collect::<Vec<_>>(),
            vec![(5, 18.0), (6, 18.0), (7, 18.0), (8, 18.0)]
        );

        // References below the insertion point follow the moved rows.
        assert_eq!(sheet.formula(2, 1), Some("COUNTA(A9:A13)"));
        assert_eq!(dst.defined_name(&NameScope::Workbook, "Stale"), Some("=Documents!$A$9"));
    }

    #[test]
    fn references_stay_put_without_row_insertion() {
        let mut config = documents_config();
        config.insert_rows = false;
        let runner = MergeRunner::new(config);
        let mut dst = template();

        runner.merge(&source(&[("INV-1", 5.0)]), &mut dst).unwrap();
        let sheet = dst.sheet("Documents").unwrap();
        assert_eq!(sheet.value(6, 1), CellValue::from("INV-1"));
        assert_eq!(sheet.formula(2, 1), Some("COUNTA(A6:A10)"));
        assert_eq!(dst.defined_name(&NameScope::Workbook, "Stale"), Some("=Documents!$A$6"));
    }

    #[test]
    fn blank_source_inserts_nothing() {
        let runner = MergeRunner::new(documents_config());
        let src = source(&[]);
        let mut dst = template();

        let outcomes = runner.merge(&src, &mut dst).unwrap();
        assert_eq!(outcomes, vec![SheetOutcome::skipped("Documents")]);
        assert_eq!(dst.sheet("Documents").unwrap().value(6, 1), CellValue::from("existing"));
    }

    #[test]
    fn only_shared_sheets_are_merged() {
        let runner = MergeRunner::new(MergeConfig::default());
        let src = source(&[("INV-1", 1.0)]);
        let mut dst = template();

        let outcomes = runner.merge(&src, &mut dst).unwrap();
        let names: Vec<_> = outcomes.iter().map(|o| o.sheet.as_str()).collect();
        assert_eq!(names, vec!["Documents"]);
        assert!(dst.sheet("SourceOnly").is_none());
    }

    #[test]
    fn invoice_list_grows_with_merged_rows() {
        let mut config = MergeConfig::default();
        config.named_ranges.push(NamedRangeSpec {
            sheet: "Documents".to_string(),
            name: "InvoiceNumbersList".to_string(),
            column: "B".to_string(),
            start_row: 5,
        });
        let runner = MergeRunner::new(config);

        let mut src = Workbook::new();
        let sheet = src.add_sheet("Documents");
        for row in 6..=20 {
            sheet.set_value(row, 2, format!("INV-{row}").as_str()).unwrap();
        }
        let mut dst = Workbook::new();
        dst.add_sheet("Documents");
        dst.set_defined_name(NameScope::Workbook, "InvoiceNumbersList", "='Documents'!$B$5:$B$6")
            .unwrap();

        runner.merge(&src, &mut dst).unwrap();
        let outcomes = extend_all(&mut dst, &runner.config.named_ranges);
        assert!(matches!(outcomes[0].outcome, ExtendOutcome::Updated { .. }));
        assert_eq!(
            dst.defined_name(&NameScope::Workbook, "InvoiceNumbersList"),
            Some("='Documents'!$B$5:$B$20")
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Files
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn run_writes_new_file_and_leaves_template() {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("template.xlsx");
        let source_path = dir.path().join("source.xlsx");
        excel::save_workbook(&template(), &template_path).unwrap();
        excel::save_workbook(&source(&[("INV-1", 5.0)]), &source_path).unwrap();
        let template_bytes = fs::read(&template_path).unwrap();

        let out_dir = dir.path().join("out");
        let runner = MergeRunner::new(documents_config());
        let report = runner
            .run(&template_path, &source_path, &out_dir, "alice")
            .unwrap();

        assert_eq!(fs::read(&template_path).unwrap(), template_bytes);
        assert!(report.output.starts_with(&out_dir));
        assert_eq!(report.total_rows(), 1);

        let files: Vec<_> = fs::read_dir(&out_dir).unwrap().collect();
        assert_eq!(files.len(), 1);

        let merged = excel::load_workbook(&report.output).unwrap();
        let sheet = merged.sheet("Documents").unwrap();
        assert_eq!(sheet.value(6, 3), CellValue::from("05"));
        assert_eq!(sheet.value(7, 1), CellValue::from("existing"));

        // Template parts survive the file round trip and cover the new row.
        assert_eq!(sheet.formula(2, 1), Some("COUNTA(A7:A11)"));
        let inherited = sheet.style(6, 1);
        assert_eq!(inherited.h_align, Some(HAlign::Center));
        assert_eq!(inherited.fill, None);
        assert!(inherited.font.is_some_and(|f| f.bold));
        assert_eq!(inherited.borders.bottom, Some(BorderLine::Thin));
        assert_eq!(sheet.style(5, 1).fill, Some(0x00FF_FF00));
        assert_eq!(sheet.style(6, 3).num_format.as_deref(), Some("@"));
        assert_eq!(
            sheet.validation_at(6, 2),
            Some(&Validation::ListValues(vec!["X".to_string()]))
        );
        assert!(sheet.row_heights().any(|(row, height)| row == 6 && height == 18.0));
        let stale = merged.defined_name(&NameScope::Workbook, "Stale").unwrap();
        assert!(stale.ends_with("$A$7"));
    }

    #[test]
    fn run_keeps_leading_zeros_shown_by_source_formats() {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("template.xlsx");
        let source_path = dir.path().join("source.xlsx");
        excel::save_workbook(&template(), &template_path).unwrap();

        let mut src = Workbook::new();
        let sheet = src.add_sheet("Documents");
        sheet.set_value(6, 1, 7.0).unwrap();
        sheet.set_value(7, 1, 13.0).unwrap();
        sheet.set_number_format(Area::new(6, 1, 7, 1), "000").unwrap();
        excel::save_workbook(&src, &source_path).unwrap();

        let runner = MergeRunner::new(MergeConfig::default());
        let report = runner
            .run(&template_path, &source_path, &dir.path().join("out"), "carol")
            .unwrap();

        let merged = excel::load_workbook(&report.output).unwrap();
        let sheet = merged.sheet("Documents").unwrap();
        assert_eq!(sheet.value(6, 1), CellValue::from("007"));
        assert_eq!(sheet.value(7, 1), CellValue::from("013"));
        assert_eq!(sheet.style(6, 1).num_format.as_deref(), Some("@"));
    }

    #[test]
    fn run_reports_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("template.xlsx");
        excel::save_workbook(&template(), &template_path).unwrap();

        let runner = MergeRunner::new(MergeConfig::default());
        let err = runner
            .run(&template_path, &dir.path().join("missing.xlsx"), dir.path(), "bob")
            .unwrap_err();
        assert!(err.to_string().contains("Failed to open source"));
        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn output_names() {
        assert_eq!(output_file_name("alice", "0930_01022024"), "alice_0930_01022024.xlsx");
        assert_eq!(output_file_name("DOMAIN\\bob", "0930_01022024"), "DOMAIN_bob_0930_01022024.xlsx");
        assert_eq!(output_file_name("  ", "0930_01022024"), "user_0930_01022024.xlsx");
        assert_eq!(output_timestamp().len(), "HHMM_DDMMYYYY".len());
    }
}
