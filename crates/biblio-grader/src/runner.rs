//! Test run orchestration.
//!
//! The [`TestRunner`] probes the API once, runs the author suite and then the
//! book suite, and aggregates every outcome into a [`TestReport`]. A failed
//! probe ends the run immediately with a single zero-score outcome.
//!
//! # Example
//!
//! ```no_run
//! use biblio_grader::{TestConfig, TestRunner};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TestConfig::new().with_base_url("http://localhost:8000");
//!     let runner = TestRunner::new(config)
//!         .unwrap()
//!         .on_progress(Box::new(|p| println!("[{:>3}%] {}", p.percent, p.message)));
//!
//!     let report = runner.run().await;
//!     println!("Grade: {:.2}/{:.1}", report.grade, report.grade_ceiling);
//! }
//! ```

use crate::classifier::{Failure, classify_connection};
use crate::client::{ClientError, HttpClient, Transport};
use crate::config::TestConfig;
use crate::models::{CaseCategory, HttpMethod, TestOutcome, TestReport};
use crate::scoring::build_report;
use crate::state::RunState;
use crate::suites::{self, Executor, Suite};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Case id of the connectivity probe outcome.
pub const PROBE_CASE_ID: &str = "connectivity.probe";

/// Endpoint label of the connectivity probe outcome.
pub const PROBE_ENDPOINT: &str = "Connection test";

/// Weight of the connectivity probe outcome.
pub const PROBE_WEIGHT: u32 = 50;

/// Path the connectivity probe requests.
const PROBE_PATH: &str = "/authors";

/// Errors that prevent a run from starting.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The HTTP client could not be built.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// No suite covers the requested endpoint.
    #[error("no suite covers endpoint: {0}")]
    UnknownEndpoint(String),
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    Idle,
    ProbingConnectivity,
    RunningAuthorSuite,
    RunningBookSuite,
    Aggregating,
    Done,
    /// Terminal: the probe failed and no suite ran.
    ConnectivityFailed,
}

impl RunPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::ProbingConnectivity => "probing_connectivity",
            RunPhase::RunningAuthorSuite => "running_author_suite",
            RunPhase::RunningBookSuite => "running_book_suite",
            RunPhase::Aggregating => "aggregating",
            RunPhase::Done => "done",
            RunPhase::ConnectivityFailed => "connectivity_failed",
        }
    }

    /// Returns true for phases a run ends in.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::ConnectivityFailed)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A progress notification. Percentages never decrease within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub percent: u8,
    pub phase: RunPhase,
    pub message: String,
}

/// Progress callback for run updates.
pub type ProgressCallback = Box<dyn Fn(Progress) + Send + Sync>;

/// Drives a grading run against one API.
pub struct TestRunner {
    config: TestConfig,
    transport: Arc<dyn Transport>,
    on_progress: Option<ProgressCallback>,
}

impl TestRunner {
    /// Creates a runner that talks to the configured API over HTTP.
    pub fn new(config: TestConfig) -> Result<Self, RunnerError> {
        let client = HttpClient::new(&config)?;
        Ok(Self::with_transport(Arc::new(client), config))
    }

    /// Creates a runner over an arbitrary transport.
    pub fn with_transport(transport: Arc<dyn Transport>, config: TestConfig) -> Self {
        Self {
            config,
            transport,
            on_progress: None,
        }
    }

    /// Sets a callback for progress updates.
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Runs the probe and both suites, and builds the report.
    ///
    /// Never fails: unreachable APIs and broken endpoints are scored, not
    /// raised.
    pub async fn run(&self) -> TestReport {
        let api_root = self.config.api_root();
        info!(%api_root, "starting grading run");

        self.emit(0, RunPhase::ProbingConnectivity, "Checking connectivity with the API...");

        if let Err(failure) = self.probe().await {
            let diagnosis = classify_connection(&failure, &api_root);
            warn!(
                category = ?diagnosis.category,
                error = %failure.message(),
                "connectivity probe failed, aborting run"
            );
            let outcome = TestOutcome::new(
                PROBE_CASE_ID,
                HttpMethod::Get,
                PROBE_ENDPOINT,
                CaseCategory::Connectivity,
                PROBE_WEIGHT,
            )
            .failed(0, diagnosis.title)
            .with_details(diagnosis.details)
            .with_error(failure.message());

            self.emit(100, RunPhase::ConnectivityFailed, "Connectivity check failed");
            return build_report(vec![outcome], self.config.grade_ceiling);
        }

        let [authors, books] = suites::all();
        let executor = Executor::new(self.transport.as_ref(), &self.config);
        let mut state = RunState::new();

        self.emit(10, RunPhase::RunningAuthorSuite, "Connected. Running author tests...");
        info!(phase = %RunPhase::RunningAuthorSuite, "phase started");
        let mut outcomes = executor.run(&authors, &mut state).await;

        if self.config.stop_on_first_error && outcomes.iter().any(TestOutcome::is_fail) {
            info!("author suite produced failures, skipping book suite");
        } else {
            self.emit(50, RunPhase::RunningBookSuite, "Running book tests...");
            info!(phase = %RunPhase::RunningBookSuite, "phase started");
            outcomes.extend(executor.run(&books, &mut state).await);
        }

        self.emit(90, RunPhase::Aggregating, "Computing final grade...");
        let report = build_report(outcomes, self.config.grade_ceiling);
        info!(
            total_score = report.total_score,
            max_score = report.max_score,
            grade = report.grade,
            failed = report.summary.failed,
            "grading run finished"
        );

        self.emit(100, RunPhase::Done, "Run complete");
        report
    }

    /// Runs the suite owning `endpoint` and keeps only the outcomes whose
    /// endpoint contains it (and whose method matches, when given).
    ///
    /// No connectivity probe is made; an unreachable API shows up as failed
    /// outcomes.
    pub async fn run_endpoint(
        &self,
        endpoint: &str,
        method: Option<HttpMethod>,
    ) -> Result<Vec<TestOutcome>, RunnerError> {
        let suite = self.suite_for(endpoint)?;
        let phase = if suite.resource == "books" {
            RunPhase::RunningBookSuite
        } else {
            RunPhase::RunningAuthorSuite
        };

        self.emit(0, phase, format!("Running {} for {endpoint}...", suite.name));
        let mut state = RunState::new();
        let outcomes = Executor::new(self.transport.as_ref(), &self.config)
            .run(&suite, &mut state)
            .await;

        let selected: Vec<TestOutcome> = outcomes
            .into_iter()
            .filter(|o| o.endpoint.contains(endpoint) && method.is_none_or(|m| o.method == m))
            .collect();

        info!(%endpoint, selected = selected.len(), "endpoint run finished");
        self.emit(100, RunPhase::Done, "Run complete");
        Ok(selected)
    }

    /// Finds the suite whose resource is the first segment of `endpoint`,
    /// with or without the API prefix.
    fn suite_for(&self, endpoint: &str) -> Result<Suite, RunnerError> {
        let relative = endpoint
            .strip_prefix(self.config.api_prefix.as_str())
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .unwrap_or(endpoint);
        let resource = relative
            .trim_start_matches('/')
            .split(['/', '?'])
            .next()
            .unwrap_or_default();

        suites::all()
            .into_iter()
            .find(|suite| suite.resource == resource)
            .ok_or_else(|| RunnerError::UnknownEndpoint(endpoint.to_string()))
    }

    async fn probe(&self) -> Result<(), Failure> {
        let response = self.transport.send(HttpMethod::Get, PROBE_PATH, None).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(Failure::Status {
                status: response.status,
                body: response.body,
            })
        }
    }

    /// Emits a progress event if a callback is registered.
    fn emit(&self, percent: u8, phase: RunPhase, message: impl Into<String>) {
        if let Some(callback) = &self.on_progress {
            callback(Progress {
                percent,
                phase,
                message: message.into(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Faults, MockLibrary};
    use std::sync::Mutex;

    fn runner(library: &MockLibrary, config: TestConfig) -> TestRunner {
        TestRunner::with_transport(Arc::new(library.clone()), config)
    }

    fn recording(runner: TestRunner) -> (TestRunner, Arc<Mutex<Vec<Progress>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let runner = runner.on_progress(Box::new(move |p| sink.lock().unwrap().push(p)));
        (runner, events)
    }

    #[tokio::test]
    async fn test_compliant_api_gets_the_ceiling() {
        let library = MockLibrary::new();
        let (runner, events) = recording(runner(&library, TestConfig::new()));

        let report = runner.run().await;

        assert_eq!(report.max_score, 445);
        assert_eq!(report.total_score, 445);
        assert!((report.grade - 2.0).abs() < f64::EPSILON);
        assert_eq!(report.summary.total, 36);
        assert_eq!(report.summary.failed, 0);
        assert_eq!(library.author_count(), 0);
        assert_eq!(library.book_count(), 0);

        let events = events.lock().unwrap();
        let percents: Vec<u8> = events.iter().map(|p| p.percent).collect();
        assert_eq!(percents, vec![0, 10, 50, 90, 100]);
        assert_eq!(events.last().unwrap().phase, RunPhase::Done);
    }

    #[tokio::test]
    async fn test_refused_connection_yields_degenerate_report() {
        let library = MockLibrary::with_faults(Faults {
            refuse_connections: true,
            ..Faults::default()
        });
        let (runner, events) = recording(runner(&library, TestConfig::new()));

        let report = runner.run().await;

        assert_eq!(report.tests.len(), 1);
        let probe = &report.tests[0];
        assert_eq!(probe.case_id, PROBE_CASE_ID);
        assert_eq!(probe.endpoint, PROBE_ENDPOINT);
        assert_eq!(probe.max_score, PROBE_WEIGHT);
        assert_eq!(probe.message, "API server is not running");
        assert!(probe.details.as_deref().unwrap().contains("Start the API server"));
        assert!(report.grade.abs() < f64::EPSILON);
        assert!(
            report
                .suggestions
                .iter()
                .all(|s| s.kind == crate::models::SuggestionKind::Connectivity)
        );

        let events = events.lock().unwrap();
        let phases: Vec<RunPhase> = events.iter().map(|p| p.phase).collect();
        assert_eq!(
            phases,
            vec![RunPhase::ProbingConnectivity, RunPhase::ConnectivityFailed]
        );
        assert_eq!(events.last().unwrap().percent, 100);
    }

    #[tokio::test]
    async fn test_probe_404_is_a_routing_diagnosis() {
        let library = MockLibrary::with_faults(Faults {
            missing_routes: vec!["/authors".to_string()],
            ..Faults::default()
        });
        let report = runner(&library, TestConfig::new()).run().await;

        assert_eq!(report.tests.len(), 1);
        assert_eq!(report.tests[0].message, "API routes not found (404)");
        // Only the probe request was made
        assert_eq!(library.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_on_first_error_skips_book_suite() {
        let library = MockLibrary::with_faults(Faults {
            accept_invalid: true,
            ..Faults::default()
        });
        let config = TestConfig::new().stop_on_first_error(true);
        let (runner, events) = recording(runner(&library, config));

        let report = runner.run().await;

        assert_eq!(report.tests.len(), 19);
        assert!(report.tests.iter().all(|o| o.case_id.starts_with("authors.")));
        assert!(report.summary.failed > 0);

        let percents: Vec<u8> = events.lock().unwrap().iter().map(|p| p.percent).collect();
        assert_eq!(percents, vec![0, 10, 90, 100]);
    }

    #[tokio::test]
    async fn test_stop_on_first_error_runs_everything_when_clean() {
        let library = MockLibrary::new();
        let config = TestConfig::new().stop_on_first_error(true);
        let report = runner(&library, config).run().await;
        assert_eq!(report.tests.len(), 36);
    }

    #[tokio::test]
    async fn test_internal_errors_on_books_are_scored() {
        let library = MockLibrary::with_faults(Faults {
            internal_errors: vec!["/books".to_string()],
            ..Faults::default()
        });
        let report = runner(&library, TestConfig::new()).run().await;

        let book_list = report
            .tests
            .iter()
            .find(|o| o.case_id == "books.list")
            .unwrap();
        assert!(book_list.is_fail());
        assert_eq!(book_list.message, "Internal error on endpoint /api/books (500)");
        assert!(report.total_score < report.max_score);
        assert!(report.grade < 2.0);
    }

    #[tokio::test]
    async fn test_run_endpoint_filters_by_path_and_method() {
        let library = MockLibrary::new();
        let runner = runner(&library, TestConfig::new());

        let outcomes = runner
            .run_endpoint("/books", Some(HttpMethod::Post))
            .await
            .unwrap();

        assert!(!outcomes.is_empty());
        assert!(
            outcomes
                .iter()
                .all(|o| o.method == HttpMethod::Post && o.endpoint.contains("/books"))
        );
        assert!(outcomes.iter().all(|o| o.case_id != "books.create_owner"));
    }

    #[tokio::test]
    async fn test_run_endpoint_accepts_prefixed_paths() {
        let library = MockLibrary::new();
        let runner = runner(&library, TestConfig::new());

        let outcomes = runner.run_endpoint("/api/authors", None).await.unwrap();
        assert!(outcomes.iter().any(|o| o.case_id == "authors.list"));
        assert!(outcomes.iter().all(|o| o.endpoint.contains("/api/authors")));
    }

    #[tokio::test]
    async fn test_run_endpoint_rejects_unknown_resource() {
        let library = MockLibrary::new();
        let runner = runner(&library, TestConfig::new());

        let result = runner.run_endpoint("/publishers", None).await;
        assert!(matches!(result, Err(RunnerError::UnknownEndpoint(_))));
        assert!(library.requests().is_empty());
    }

    #[test]
    fn test_terminal_phases() {
        assert!(RunPhase::Done.is_terminal());
        assert!(RunPhase::ConnectivityFailed.is_terminal());
        assert!(!RunPhase::Aggregating.is_terminal());
        assert_eq!(RunPhase::RunningBookSuite.to_string(), "running_book_suite");
    }
}
