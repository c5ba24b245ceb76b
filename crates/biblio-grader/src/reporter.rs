//! Reporters for grading runs.
//!
//! This module provides multiple reporter types:
//! - `TerminalReporter`: Colored terminal output for progress and results
//! - `TextReporter`: Long-form plain-text report
//! - `JsonReporter`: Machine-readable JSON report
//! - `ReportWriter`: Writes reports to files
//!
//! # Example
//!
//! ```no_run
//! use biblio_grader::{ReportFormat, ReportWriter, TerminalReporter, TestConfig, TestRunner};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() {
//!     let report = TestRunner::new(TestConfig::new()).unwrap().run().await;
//!
//!     TerminalReporter::new().print_summary(&report);
//!
//!     let writer = ReportWriter::new(PathBuf::from("grading"));
//!     writer.write(&report, ReportFormat::Both).unwrap();
//! }
//! ```

use crate::models::{OutcomeStatus, ReportFormat, TestOutcome, TestReport};
use crate::runner::{Progress, ProgressCallback};
use crate::scoring::{category_breakdown, missing_features, percentage};
use colored::Colorize;
use regex::Regex;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

/// Verbosity level for terminal output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Show only the final grade line.
    Quiet,
    /// Progress and summary.
    #[default]
    Normal,
    /// Also show diagnosis details for failed outcomes.
    Verbose,
}

/// Terminal reporter for grading runs.
#[derive(Debug, Default)]
pub struct TerminalReporter {
    verbosity: Verbosity,
}

impl TerminalReporter {
    /// Creates a new terminal reporter with normal verbosity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reporter with the specified verbosity.
    pub fn with_verbosity(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Handles a progress event, printing appropriate output.
    pub fn handle_progress(&self, progress: &Progress) {
        if self.verbosity == Verbosity::Quiet {
            return;
        }
        let percent = format!("[{:>3}%]", progress.percent).dimmed();
        println!("{percent} {}", progress.message);
    }

    /// Prints the grade and status counts.
    pub fn print_summary(&self, report: &TestReport) {
        if self.verbosity == Verbosity::Quiet {
            println!("{}", colorize_by_percentage(&summary_line(report), report.percentage));
            return;
        }

        println!("\n{}", "━".repeat(60).dimmed());

        let grade = format!("Grade: {:.2}/{:.2}", report.grade, report.grade_ceiling);
        println!(
            "{} {}",
            colorize_by_percentage(&grade, report.percentage).bold(),
            format!(
                "({}/{} points, {:.1}%)",
                report.total_score, report.max_score, report.percentage
            )
            .dimmed()
        );

        let mut parts = vec![format!("{} passed", report.summary.passed).green().to_string()];
        if report.summary.failed > 0 {
            parts.push(format!("{} failed", report.summary.failed).red().to_string());
        }
        if report.summary.warnings > 0 {
            parts.push(
                format!("{} warnings", report.summary.warnings)
                    .yellow()
                    .to_string(),
            );
        }
        println!("   {} of {}", parts.join(", "), report.summary.total);
    }

    /// Prints failed and warned outcomes.
    pub fn print_failures(&self, report: &TestReport) {
        if self.verbosity == Verbosity::Quiet {
            return;
        }
        let problems: Vec<&TestOutcome> = report.tests.iter().filter(|t| !t.is_pass()).collect();
        if problems.is_empty() {
            return;
        }

        println!("\n{}", "Problems:".red().bold());
        for outcome in problems {
            let mark = if outcome.is_fail() {
                "✗".red()
            } else {
                "!".yellow()
            };
            println!(
                "  {mark} {} {} {}",
                outcome.method.as_str().bold(),
                outcome.endpoint,
                format!("(-{} points)", outcome.lost_points()).dimmed()
            );
            println!("    {}", outcome.message);

            if self.verbosity == Verbosity::Verbose
                && let Some(details) = &outcome.details
            {
                for line in details.lines() {
                    println!("      {}", line.dimmed());
                }
            }
        }
    }

    /// Prints the prioritized suggestions.
    pub fn print_suggestions(&self, report: &TestReport) {
        if self.verbosity == Verbosity::Quiet || report.suggestions.is_empty() {
            return;
        }
        println!("\n{}", "Suggestions:".bold());
        for suggestion in &report.suggestions {
            println!("  → {}", suggestion.text);
        }
    }

    /// Prints each outcome of a single-endpoint run.
    pub fn print_outcomes(&self, outcomes: &[TestOutcome]) {
        for outcome in outcomes {
            let mark = match outcome.status {
                OutcomeStatus::Pass => "✓".green(),
                OutcomeStatus::Warning => "!".yellow(),
                OutcomeStatus::Fail => "✗".red(),
            };
            println!(
                "  {mark} {} {} {} {}",
                outcome.method.as_str().bold(),
                outcome.endpoint,
                format!("[{}/{}]", outcome.score, outcome.max_score).dimmed(),
                outcome.message
            );
            if self.verbosity == Verbosity::Verbose
                && let Some(details) = &outcome.details
            {
                for line in details.lines() {
                    println!("      {}", line.dimmed());
                }
            }
        }
    }
}

fn colorize_by_percentage(text: &str, percentage: f64) -> colored::ColoredString {
    if percentage >= 90.0 {
        text.green()
    } else if percentage >= 50.0 {
        text.yellow()
    } else {
        text.red()
    }
}

/// Creates a progress callback for use with `TestRunner`.
pub fn create_progress_callback(verbosity: Verbosity) -> ProgressCallback {
    let reporter = TerminalReporter::with_verbosity(verbosity);
    Box::new(move |progress| reporter.handle_progress(&progress))
}

/// One-line plain summary of a report.
pub fn summary_line(report: &TestReport) -> String {
    format!(
        "Grade {:.2}/{:.2} ({:.1}%): {} passed, {} failed, {} warnings of {} checks",
        report.grade,
        report.grade_ceiling,
        report.percentage,
        report.summary.passed,
        report.summary.failed,
        report.summary.warnings,
        report.summary.total
    )
}

// ============================================================================
// File reporters
// ============================================================================

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReporterError {
    /// Failed to write report file.
    #[error("failed to write report: {0}")]
    WriteError(#[from] std::io::Error),

    /// Failed to serialize report to JSON.
    #[error("failed to serialize report: {0}")]
    SerializationError(#[from] serde_json::Error),
}

const RULE: &str = "================================================================================";
const THIN_RULE: &str = "--------------------------------------------------------------------------------";

/// Contract surface the grader exercises, listed at the end of the text
/// report.
const CHECKLIST: &[(&str, &[&str])] = &[
    (
        "Authors",
        &[
            "GET    /authors              list authors (200, array)",
            "POST   /authors              create author (201, 422 on invalid data)",
            "GET    /authors/{id}         show author (200, 404)",
            "PUT    /authors/{id}         update author (200, 404, 422)",
            "DELETE /authors/{id}         delete author (204, 404, 409 with books)",
            "GET    /authors/{id}/books   books of author (200, array)",
        ],
    ),
    (
        "Books",
        &[
            "GET    /books                list books, `q` searches titles (200, array)",
            "POST   /books                create book (201, 409 duplicate, 422 on invalid data)",
            "GET    /books/{id}           show book (200, 404)",
            "PUT    /books/{id}           update book (200, 404, 422)",
            "DELETE /books/{id}           delete book (204, 404)",
        ],
    ),
    (
        "Validation",
        &[
            "Author `nome` required, 2 to 255 characters; `bio` at most 1000",
            "Book `titulo` required; `autor_id` must exist",
            "Book `ano_publicacao` from 1450 to the current year; `paginas` at least 1",
            "Book `genero` at most 100 characters; `disponivel` boolean",
        ],
    ),
    (
        "Business rules",
        &[
            "An author with books cannot be deleted (409)",
            "Title must be unique per author (409)",
        ],
    ),
];

/// Generates the long-form plain-text report.
///
/// Output depends only on the report value, so the same report always renders
/// the same text.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextReporter;

impl TextReporter {
    /// Creates a new text reporter.
    pub fn new() -> Self {
        Self
    }

    /// Generates the full report.
    pub fn generate(&self, report: &TestReport) -> String {
        let mut out = String::new();

        self.write_header(&mut out, report);
        self.write_statistics(&mut out, report);
        self.write_missing_features(&mut out, report);
        self.write_categories(&mut out, report);
        self.write_next_steps(&mut out, report);
        self.write_failed(&mut out, report);
        self.write_warnings(&mut out, report);
        self.write_passed(&mut out, report);
        self.write_checklist(&mut out);

        out
    }

    fn section(&self, out: &mut String, title: &str) {
        let _ = writeln!(out, "\n{title}\n{THIN_RULE}");
    }

    fn write_header(&self, out: &mut String, report: &TestReport) {
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "LIBRARY API CONFORMANCE REPORT");
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(
            out,
            "Generated: {}",
            report.generated_at.format("%Y-%m-%dT%H:%M:%SZ")
        );
        let _ = writeln!(out, "Grader:    {}", crate::VERSION);
        let _ = writeln!(
            out,
            "Grade:     {:.2} / {:.2}",
            report.grade, report.grade_ceiling
        );
        let _ = writeln!(
            out,
            "Score:     {} / {} points ({:.1}%)",
            report.total_score, report.max_score, report.percentage
        );
        let verdict = if report.all_passed() {
            "All checks passed".to_string()
        } else {
            format!("{} checks failed - action required", report.summary.failed)
        };
        let _ = writeln!(out, "Verdict:   {verdict}");
    }

    fn write_statistics(&self, out: &mut String, report: &TestReport) {
        self.section(out, "STATISTICS");
        let _ = writeln!(out, "  Passed:   {}", report.summary.passed);
        let _ = writeln!(out, "  Failed:   {}", report.summary.failed);
        let _ = writeln!(out, "  Warnings: {}", report.summary.warnings);
        let _ = writeln!(out, "  Total:    {}", report.summary.total);
    }

    fn write_missing_features(&self, out: &mut String, report: &TestReport) {
        let missing = missing_features(report);
        if missing.is_empty() {
            return;
        }

        self.section(out, "WHAT IS MISSING");
        for (title, items) in missing.sections() {
            if items.is_empty() {
                continue;
            }
            let _ = writeln!(out, "{title}");
            for item in items {
                let _ = writeln!(out, "  - {item}");
            }
            out.push('\n');
        }
    }

    fn write_categories(&self, out: &mut String, report: &TestReport) {
        let breakdown = category_breakdown(report);
        if breakdown.is_empty() {
            return;
        }

        self.section(out, "SCORE BY CATEGORY");
        for score in breakdown {
            let _ = writeln!(
                out,
                "  {:<24} {:>4}/{:<4} ({:.1}%)",
                score.category.label(),
                score.earned,
                score.available,
                percentage(score.earned, score.available)
            );
        }
    }

    fn write_next_steps(&self, out: &mut String, report: &TestReport) {
        if report.suggestions.is_empty() {
            return;
        }

        self.section(out, "NEXT STEPS");
        for (i, suggestion) in report.suggestions.iter().take(5).enumerate() {
            let _ = writeln!(out, "  {}. {}", i + 1, clean_step(&suggestion.text));
        }
    }

    fn write_failed(&self, out: &mut String, report: &TestReport) {
        let failed = report.failed_tests();
        if failed.is_empty() {
            return;
        }

        self.section(out, &format!("FAILED CHECKS ({})", failed.len()));
        for outcome in failed {
            let _ = writeln!(
                out,
                "  [FAIL] {} {} (-{} points)",
                outcome.method,
                outcome.endpoint,
                outcome.lost_points()
            );
            let _ = writeln!(out, "         {}", outcome.message);
            if let Some(first) = outcome.details.as_deref().and_then(|d| d.lines().next()) {
                let _ = writeln!(out, "         {first}");
            }
        }
    }

    fn write_warnings(&self, out: &mut String, report: &TestReport) {
        let warned: Vec<&TestOutcome> = report
            .tests
            .iter()
            .filter(|t| t.status == OutcomeStatus::Warning)
            .collect();
        if warned.is_empty() {
            return;
        }

        self.section(out, &format!("WARNINGS ({})", warned.len()));
        for outcome in warned {
            let _ = writeln!(
                out,
                "  [WARN] {} {} (-{} points): {}",
                outcome.method,
                outcome.endpoint,
                outcome.lost_points(),
                outcome.message
            );
        }
    }

    fn write_passed(&self, out: &mut String, report: &TestReport) {
        let passed = report.passed_tests();
        if passed.is_empty() {
            return;
        }

        self.section(out, &format!("PASSED CHECKS ({})", passed.len()));
        for outcome in passed {
            let _ = writeln!(
                out,
                "  [PASS] {} {}: {}",
                outcome.method, outcome.endpoint, outcome.message
            );
        }
    }

    fn write_checklist(&self, out: &mut String) {
        self.section(out, "TECHNICAL CHECKLIST");
        for (group, items) in CHECKLIST {
            let _ = writeln!(out, "  {group}");
            for item in *items {
                let _ = writeln!(out, "    [ ] {item}");
            }
        }
    }
}

static PRIORITY_TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z ]+:\s*").ok());

/// Drops a leading all-caps tag such as `TOP PRIORITY:` and capitalizes what
/// remains.
fn clean_step(text: &str) -> String {
    let stripped = PRIORITY_TAG
        .as_ref()
        .map_or_else(|| text.to_string(), |re| re.replace(text, "").into_owned());

    let mut chars = stripped.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => stripped,
    }
}

/// Generates machine-readable JSON reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReporter;

impl JsonReporter {
    /// Creates a new JSON reporter.
    pub fn new() -> Self {
        Self
    }

    /// Generates the pretty-printed JSON report.
    pub fn generate(&self, report: &TestReport) -> Result<String, ReporterError> {
        report.to_json().map_err(ReporterError::from)
    }
}

// ============================================================================
// Report Writer
// ============================================================================

/// Writes reports to files.
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    /// Creates a new report writer with the given output directory.
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    /// Returns the output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes reports in the specified format(s).
    pub fn write(
        &self,
        report: &TestReport,
        format: ReportFormat,
    ) -> Result<Vec<PathBuf>, ReporterError> {
        std::fs::create_dir_all(&self.output_dir)?;

        let mut written_files = Vec::new();
        match format {
            ReportFormat::Text => written_files.push(self.write_text(report)?),
            ReportFormat::Json => written_files.push(self.write_json(report)?),
            ReportFormat::Both => {
                written_files.push(self.write_text(report)?);
                written_files.push(self.write_json(report)?);
            }
        }

        Ok(written_files)
    }

    /// Writes the plain-text report.
    pub fn write_text(&self, report: &TestReport) -> Result<PathBuf, ReporterError> {
        let content = TextReporter::new().generate(report);
        let path = self.output_dir.join("report.txt");
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Writes the JSON report.
    pub fn write_json(&self, report: &TestReport) -> Result<PathBuf, ReporterError> {
        let content = JsonReporter::new().generate(report)?;
        let path = self.output_dir.join("report.json");
        std::fs::write(&path, content)?;
        Ok(path)
    }
}
