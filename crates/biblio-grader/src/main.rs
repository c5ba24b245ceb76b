//! # biblio-grader
//!
//! Grades a running authors/books library API against its REST contract.
//!
//! ## Usage
//!
//! ```bash
//! # Grade the API at the default address (http://localhost:8000/api)
//! biblio-grader
//!
//! # Grade another host and keep the reports
//! biblio-grader --base-url http://127.0.0.1:3000 --output grading --report both
//!
//! # Run only the checks touching one endpoint
//! biblio-grader --endpoint /books --method POST
//!
//! # List suites and weights
//! biblio-grader --list
//! ```

use anyhow::{Context, Result};
use biblio_grader::suites;
use biblio_grader::{
    HttpMethod, ReportFormat as LibReportFormat, ReportWriter, TerminalReporter, TestConfig,
    TestOutcome, TestRunner, TextReporter, Verbosity, create_progress_callback,
};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Conformance grader for the authors/books library API.
///
/// Probes the API, runs the author and book suites, and prints a graded
/// report with diagnoses and next steps.
#[derive(Parser, Debug)]
#[command(name = "biblio-grader")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the API, without the API prefix
    #[arg(long, env = "BIBLIO_BASE_URL")]
    pub base_url: Option<String>,

    /// Prefix the API routes are mounted under
    #[arg(long)]
    pub api_prefix: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Upper bound of the final grade
    #[arg(long)]
    pub grade_ceiling: Option<f64>,

    /// Skip the book suite when the author suite has failures
    #[arg(long)]
    pub stop_on_first_error: bool,

    /// YAML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// List suites and case weights without running them
    #[arg(long)]
    pub list: bool,

    /// Run only the checks whose endpoint contains this path
    #[arg(long, value_name = "PATH")]
    pub endpoint: Option<String>,

    /// Restrict --endpoint to one HTTP method
    #[arg(long, requires = "endpoint")]
    pub method: Option<HttpMethod>,

    /// Format of the report files written to --output
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub report: ReportFormat,

    /// Directory to write report files into
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Print the raw JSON report to stdout instead of the text report
    #[arg(long)]
    pub json: bool,

    /// Show diagnosis details and debug logs
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print the grade line
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    /// Long-form plain text
    #[default]
    Text,
    /// JSON format (machine-readable)
    Json,
    /// Both text and JSON
    Both,
}

impl ReportFormat {
    /// Converts CLI report format to library report format.
    fn to_lib_format(self) -> LibReportFormat {
        match self {
            ReportFormat::Text => LibReportFormat::Text,
            ReportFormat::Json => LibReportFormat::Json,
            ReportFormat::Both => LibReportFormat::Both,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else if cli.verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    };

    let config = match command(&cli) {
        Ok(Command::List) => {
            list_suites();
            return ExitCode::SUCCESS;
        }
        Ok(Command::Grade(config)) => config,
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".red().bold());
            return ExitCode::from(2);
        }
    };

    match run(&cli, config, verbosity).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".red().bold());
            ExitCode::from(2)
        }
    }
}

/// Logs go to stderr so stdout carries only the report.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "biblio_grader=debug"
    } else {
        "biblio_grader=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// What the invocation asks for.
#[derive(Debug)]
enum Command {
    /// Print the static suite tables.
    List,
    /// Grade the API with this configuration.
    Grade(TestConfig),
}

/// Listing needs no configuration, so a broken config file or variable
/// does not block it.
fn command(cli: &Cli) -> Result<Command> {
    if cli.list {
        return Ok(Command::List);
    }
    build_config(cli).map(Command::Grade)
}

/// Layers the configuration: file, then `BIBLIO_*` variables, then flags.
fn build_config(cli: &Cli) -> Result<TestConfig> {
    let mut config = match &cli.config {
        Some(path) => TestConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => TestConfig::new(),
    };
    config = config
        .with_env_overrides()
        .context("invalid environment override")?;

    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url.as_str());
    }
    if let Some(prefix) = &cli.api_prefix {
        config = config.with_api_prefix(prefix.as_str());
    }
    if let Some(secs) = cli.timeout {
        let timeout = Duration::try_from_secs_f64(secs).context("--timeout is out of range")?;
        config = config.with_timeout(timeout);
    }
    if let Some(ceiling) = cli.grade_ceiling {
        config = config.with_grade_ceiling(ceiling);
    }
    if cli.stop_on_first_error {
        config = config.stop_on_first_error(true);
    }

    config.validate()?;
    Ok(config)
}

fn list_suites() {
    println!("{}\n", "Available suites:".bold());

    let mut total = 0;
    for suite in suites::all() {
        println!(
            "  {} {}",
            suite.name.bold().underline(),
            format!("({} points)", suite.max_score()).dimmed()
        );
        for case in suite.cases {
            println!(
                "    {} {:<6} {:<22} {}",
                format!("{:<32}", case.id).cyan(),
                case.method.as_str(),
                case.path.template(),
                format!("{:>3} pts", case.weight).dimmed()
            );
        }
        println!();
        total += suite.max_score();
    }

    println!("  {}", format!("Total: {total} points").dimmed());
}

/// Runs the grader. Returns whether every outcome avoided a failure.
async fn run(cli: &Cli, config: TestConfig, verbosity: Verbosity) -> Result<bool> {
    // JSON on stdout must not be interleaved with progress lines
    let progress_verbosity = if cli.json {
        Verbosity::Quiet
    } else {
        verbosity
    };

    let runner = TestRunner::new(config)
        .context("failed to set up the HTTP client")?
        .on_progress(create_progress_callback(progress_verbosity));
    let reporter = TerminalReporter::with_verbosity(verbosity);

    if let Some(endpoint) = &cli.endpoint {
        let outcomes = runner.run_endpoint(endpoint, cli.method).await?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
        } else if outcomes.is_empty() {
            println!("{}", format!("No checks matched {endpoint}").yellow());
        } else {
            reporter.print_outcomes(&outcomes);
        }
        return Ok(!outcomes.iter().any(TestOutcome::is_fail));
    }

    let report = runner.run().await;

    if cli.json {
        println!("{}", report.to_json()?);
    } else {
        if verbosity != Verbosity::Quiet {
            println!();
            print!("{}", TextReporter::new().generate(&report));
            if verbosity == Verbosity::Verbose {
                reporter.print_failures(&report);
            }
        }
        reporter.print_summary(&report);
    }

    if let Some(dir) = &cli.output {
        let writer = ReportWriter::new(dir.clone());
        match writer.write(&report, cli.report.to_lib_format()) {
            Ok(paths) => {
                if verbosity != Verbosity::Quiet && !cli.json {
                    for path in &paths {
                        println!("{}", format!("Report written: {}", path.display()).dimmed());
                    }
                }
            }
            Err(e) => {
                eprintln!("{} Failed to write report: {}", "Warning:".yellow(), e);
            }
        }
    }

    Ok(report.all_passed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["biblio-grader"]).unwrap();
        assert_eq!(cli.report, ReportFormat::Text);
        assert!(!cli.list);
        assert!(cli.endpoint.is_none());
    }

    #[test]
    fn test_cli_endpoint_and_method() {
        let cli =
            Cli::try_parse_from(["biblio-grader", "--endpoint", "/books", "--method", "post"])
                .unwrap();
        assert_eq!(cli.endpoint.as_deref(), Some("/books"));
        assert_eq!(cli.method, Some(HttpMethod::Post));
    }

    #[test]
    fn test_cli_method_requires_endpoint() {
        assert!(Cli::try_parse_from(["biblio-grader", "--method", "GET"]).is_err());
    }

    #[test]
    fn test_cli_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["biblio-grader", "-q", "-v"]).is_err());
    }

    #[test]
    fn test_build_config_applies_flags() {
        let cli = Cli::try_parse_from([
            "biblio-grader",
            "--base-url",
            "http://127.0.0.1:3000/",
            "--api-prefix",
            "v1/",
            "--timeout",
            "2.5",
            "--grade-ceiling",
            "10",
            "--stop-on-first-error",
        ])
        .unwrap();

        let config = build_config(&cli).unwrap();
        assert_eq!(config.api_root(), "http://127.0.0.1:3000/v1");
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert!((config.grade_ceiling - 10.0).abs() < f64::EPSILON);
        assert!(config.stop_on_first_error);
    }

    #[test]
    fn test_build_config_rejects_bad_ceiling() {
        let cli = Cli::try_parse_from(["biblio-grader", "--grade-ceiling", "0"]).unwrap();
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn test_list_skips_config_validation() {
        let cli = Cli::try_parse_from([
            "biblio-grader",
            "--list",
            "--grade-ceiling",
            "0",
            "--config",
            "/nonexistent/biblio.yml",
        ])
        .unwrap();
        assert!(matches!(command(&cli).unwrap(), Command::List));

        let cli = Cli::try_parse_from(["biblio-grader", "--grade-ceiling", "0"]).unwrap();
        assert!(command(&cli).is_err());
    }

    #[test]
    fn test_report_format_conversion() {
        assert_eq!(ReportFormat::Both.to_lib_format(), LibReportFormat::Both);
        assert_eq!(ReportFormat::Json.to_lib_format(), LibReportFormat::Json);
    }
}
