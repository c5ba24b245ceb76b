//! # biblio-grader
//!
//! Automated conformance grader for an authors/books library REST API.
//!
//! The grader probes a running API, drives it through two fixed scenario
//! suites, scores every request against the expected contract and renders a
//! graded, diagnostic report. It is used both as a CLI and as a library.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  TestRunner │────▶│   Suites    │────▶│  Transport  │
//! └─────────────┘     │ (Executor)  │     │ (HttpClient)│
//!        │            └─────────────┘     └─────────────┘
//!        ▼                   │
//! ┌─────────────┐     ┌─────────────┐
//! │  Reporter   │◀────│   Scoring   │
//! └─────────────┘     └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - `client`: HTTP transport and response normalization
//! - `classifier`: Failure diagnosis tables
//! - `state`: Fixture ids captured during a run
//! - `suites`: Author and book case tables and their executor
//! - `runner`: Connectivity probe and suite sequencing
//! - `scoring`: Report aggregation, suggestions and breakdowns
//! - `reporter`: Terminal, text and JSON output
//! - `testing`: In-memory reference API for tests

pub use crate::classifier::{Category, Diagnosis, Failure, classify, classify_connection};
pub use crate::client::{
    ApiResponse, ClientError, HttpClient, NetworkErrorCode, NetworkFailure, Transport,
};
pub use crate::config::{ConfigError, TestConfig};
pub use crate::models::{
    CaseCategory, HttpMethod, OutcomeStatus, ReportFormat, ReportSummary, Suggestion,
    SuggestionKind, TestOutcome, TestReport,
};
pub use crate::reporter::{
    JsonReporter, ReportWriter, ReporterError, TerminalReporter, TextReporter, Verbosity,
    create_progress_callback, summary_line,
};
pub use crate::runner::{Progress, ProgressCallback, RunPhase, RunnerError, TestRunner};
pub use crate::scoring::{
    CategoryScore, MissingFeatures, build_report, category_breakdown, missing_features,
};
pub use crate::state::{Fixture, RunState};

pub mod classifier;
pub mod client;
pub mod config;
mod models;
pub mod reporter;
pub mod runner;
pub mod scoring;
pub mod state;
pub mod suites;
pub mod testing;

/// Library version, matching the crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
