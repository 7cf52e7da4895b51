//! sheet-merge: merges source spreadsheet rows into a template workbook.
//!
//! Every sheet present in both workbooks has its data rows (from the start
//! row down) transformed column by column and inserted into the template.
//! The result is saved as a new file; the template is never modified.

mod classify;
mod config;
mod engine;
mod error;
mod excel;
mod model;
mod named_range;
mod normalize;
mod reference;
mod resolver;
mod runner;
mod transform;
mod types;
mod xlsx_parts;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use crate::config::MergeConfig;
use crate::named_range::ExtendOutcome;
use crate::runner::{MergeReport, MergeRunner};

// ─────────────────────────────────────────────────────────────────────────────
// CLI
// ─────────────────────────────────────────────────────────────────────────────

/// CLI arguments for sheet-merge.
#[derive(Parser)]
#[command(name = "sheet-merge")]
#[command(about = "Merge source spreadsheet rows into a template workbook")]
#[command(version)]
struct Cli {
    /// Template workbook (read only).
    template: PathBuf,

    /// Source workbook with the rows to merge.
    source: PathBuf,

    /// Directory for the merged workbook.
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// YAML merge configuration (column rules, named ranges).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// User name for the output file name. Defaults to the login name.
    #[arg(short, long)]
    user: Option<String>,

    /// Print the run report as JSON.
    #[arg(long)]
    json: bool,

    /// Log per-column decisions.
    #[arg(short, long)]
    verbose: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {e:#}", "ERROR:".red().bold());
            return ExitCode::FAILURE;
        }
    };

    let user = cli.user.unwrap_or_else(current_user);
    let runner = MergeRunner::new(config);
    let report = match runner.run(&cli.template, &cli.source, &cli.output, &user) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{} {e:#}", "ERROR:".red().bold());
            return ExitCode::FAILURE;
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("{} Failed to serialize report: {e}", "ERROR:".red().bold());
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_report(&report);
    }
    ExitCode::SUCCESS
}

/// Installs the stderr log subscriber. `RUST_LOG` takes precedence.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<MergeConfig> {
    path.map_or_else(|| Ok(MergeConfig::default()), MergeConfig::load)
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "user".to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_report(report: &MergeReport) {
    for sheet in &report.sheets {
        if sheet.rows > 0 {
            println!(
                "  {} {} {} rows x {} cols",
                "✓".green().bold(),
                sheet.sheet.white(),
                sheet.rows.to_string().green(),
                sheet.cols
            );
        } else {
            println!(
                "  {} {} ({})",
                "⊘".yellow().bold(),
                sheet.sheet.white(),
                "no data".yellow()
            );
        }
    }

    for range in &report.named_ranges {
        match &range.outcome {
            ExtendOutcome::Updated { refers_to, .. } | ExtendOutcome::Created { refers_to } => {
                println!("  {} {} = {}", "✓".green().bold(), range.name.white(), refers_to.cyan());
            }
            ExtendOutcome::Skipped(reason) => {
                println!("  {} {} ({})", "⊘".yellow().bold(), range.name.white(), reason.yellow());
            }
            ExtendOutcome::Failed(reason) => {
                println!("  {} {} ({})", "✗".red().bold(), range.name.white(), reason.red());
            }
        }
    }

    println!(
        "{} {} rows merged into {}",
        "Done:".green().bold(),
        report.total_rows(),
        report.output.display()
    );
}
