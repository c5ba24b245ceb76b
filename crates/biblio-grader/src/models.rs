//! Data models for the grader.
//!
//! This module defines the core data structures shared by the suites, the
//! runner and the reporters: scored outcomes, the aggregated report and
//! report output formats. JSON field names are camelCase so serialized
//! reports stay readable by the existing report viewers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Long-form plain text (human-readable)
    #[default]
    Text,
    /// JSON format (machine-readable)
    Json,
    /// Both text and JSON
    Both,
}

/// HTTP verbs used by the library API contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Returns the canonical upper-case verb.
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(format!("unsupported HTTP method: {other}")),
        }
    }
}

/// Verdict of a single outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Pass,
    Fail,
    Warning,
}

/// Grading category an outcome counts towards in the breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseCategory {
    /// Reachability of the API and its routes.
    Connectivity,
    /// Collection endpoints and response shape.
    Listing,
    /// Create, show, update and delete of single records.
    Crud,
    /// Rejection of invalid payloads.
    Validation,
    /// Referential integrity and uniqueness rules.
    Business,
}

impl CaseCategory {
    /// All categories in report order.
    pub const ALL: [CaseCategory; 5] = [
        CaseCategory::Connectivity,
        CaseCategory::Listing,
        CaseCategory::Crud,
        CaseCategory::Validation,
        CaseCategory::Business,
    ];

    /// Human-readable label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            CaseCategory::Connectivity => "Connection and routes",
            CaseCategory::Listing => "Listings and structure",
            CaseCategory::Crud => "Basic functionality",
            CaseCategory::Validation => "Validations",
            CaseCategory::Business => "Business rules",
        }
    }
}

/// The scored result of one test case.
///
/// Outcomes are built once by the suite executor and then only moved into the
/// run's outcome list. `details` is only ever kept on failed outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    /// Identifier of the case descriptor that produced this outcome
    pub case_id: String,
    /// Endpoint path as requested (including the API prefix)
    pub endpoint: String,
    /// HTTP verb used
    pub method: HttpMethod,
    /// Breakdown category
    pub category: CaseCategory,
    /// Verdict
    pub status: OutcomeStatus,
    /// Points awarded
    pub score: u32,
    /// Points available
    pub max_score: u32,
    /// One-line verdict
    pub message: String,
    /// Multi-line diagnosis and remediation (failures only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Payload that was sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
    /// Body that was received
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// What the contract expects (JSON shape or prose)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    /// Raw transport or protocol error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestOutcome {
    /// Starts an outcome for the given case. The outcome is a zero-score
    /// failure until one of `passed`, `failed` or `warned` is applied.
    pub fn new(
        case_id: impl Into<String>,
        method: HttpMethod,
        endpoint: impl Into<String>,
        category: CaseCategory,
        max_score: u32,
    ) -> Self {
        debug_assert!(max_score > 0, "outcomes must carry a positive weight");
        Self {
            case_id: case_id.into(),
            endpoint: endpoint.into(),
            method,
            category,
            status: OutcomeStatus::Fail,
            score: 0,
            max_score,
            message: String::new(),
            details: None,
            request: None,
            response: None,
            expected: None,
            error: None,
        }
    }

    /// Marks the outcome as passed with full credit.
    pub fn passed(mut self, message: impl Into<String>) -> Self {
        self.status = OutcomeStatus::Pass;
        self.score = self.max_score;
        self.message = message.into();
        self.details = None;
        self
    }

    /// Marks the outcome as failed, awarding `score` points of partial credit.
    pub fn failed(mut self, score: u32, message: impl Into<String>) -> Self {
        self.status = OutcomeStatus::Fail;
        self.score = score.min(self.max_score);
        self.message = message.into();
        self
    }

    /// Marks the outcome as a warning, awarding `score` points.
    pub fn warned(mut self, score: u32, message: impl Into<String>) -> Self {
        self.status = OutcomeStatus::Warning;
        self.score = score.min(self.max_score);
        self.message = message.into();
        self.details = None;
        self
    }

    /// Attaches diagnosis text. Ignored unless the outcome is a failure.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        if self.status == OutcomeStatus::Fail {
            self.details = Some(details.into());
        }
        self
    }

    pub fn with_request(mut self, request: Value) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_response(mut self, response: Value) -> Self {
        self.response = Some(response);
        self
    }

    pub fn with_expected(mut self, expected: impl Into<Value>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Returns true if the outcome passed.
    pub fn is_pass(&self) -> bool {
        self.status == OutcomeStatus::Pass
    }

    /// Returns true if the outcome failed.
    pub fn is_fail(&self) -> bool {
        self.status == OutcomeStatus::Fail
    }

    /// Points lost on this outcome.
    pub fn lost_points(&self) -> u32 {
        self.max_score - self.score
    }
}

/// Status counts over a report's outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub passed: usize,
    pub failed: usize,
    pub warnings: usize,
    pub total: usize,
}

/// What a suggestion is about; doubles as its priority (lower sorts first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Connectivity,
    Routing,
    InternalError,
    StatusCode,
    Validation,
    Structure,
    BusinessRule,
    Resource,
    Overall,
}

/// A prioritized remediation hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub text: String,
}

impl Suggestion {
    pub fn new(kind: SuggestionKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Aggregate of a full run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    /// When the report was built. The only time-dependent field.
    pub generated_at: DateTime<Utc>,
    /// Sum of awarded points
    pub total_score: u32,
    /// Sum of available points
    pub max_score: u32,
    /// totalScore / maxScore * 100, or 0 for an empty run
    pub percentage: f64,
    /// Final grade, rounded to two decimals, within `[0, grade_ceiling]`
    pub grade: f64,
    /// Grade ceiling the grade was computed against
    pub grade_ceiling: f64,
    /// Outcomes in execution order
    pub tests: Vec<TestOutcome>,
    /// Status counts
    pub summary: ReportSummary,
    /// Prioritized remediation hints
    pub suggestions: Vec<Suggestion>,
}

impl TestReport {
    /// Returns only failed outcomes, in execution order.
    pub fn failed_tests(&self) -> Vec<&TestOutcome> {
        self.tests.iter().filter(|t| t.is_fail()).collect()
    }

    /// Returns only passed outcomes, in execution order.
    pub fn passed_tests(&self) -> Vec<&TestOutcome> {
        self.tests.iter().filter(|t| t.is_pass()).collect()
    }

    /// Returns true if no outcome failed.
    pub fn all_passed(&self) -> bool {
        self.summary.failed == 0
    }

    /// Serializes the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Serde helper for Duration serialization as fractional seconds.
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
