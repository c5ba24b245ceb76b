//! Score aggregation and report analysis.
//!
//! Reduces the ordered outcome list of a run into a [`TestReport`] (totals,
//! percentage, bounded grade, status counts, suggestions) and derives the
//! analyses the text report renders: missing features and the per-category
//! breakdown.

use crate::models::{
    CaseCategory, ReportSummary, Suggestion, SuggestionKind, TestOutcome, TestReport,
};
use crate::runner::PROBE_CASE_ID;
use chrono::{DateTime, Utc};

/// Builds the report for a finished run, stamped with the current time.
pub fn build_report(outcomes: Vec<TestOutcome>, grade_ceiling: f64) -> TestReport {
    build_report_at(outcomes, grade_ceiling, Utc::now())
}

/// Builds the report with an explicit timestamp.
pub fn build_report_at(
    outcomes: Vec<TestOutcome>,
    grade_ceiling: f64,
    generated_at: DateTime<Utc>,
) -> TestReport {
    let total_score: u32 = outcomes.iter().map(|o| o.score).sum();
    let max_score: u32 = outcomes.iter().map(|o| o.max_score).sum();
    let percentage = percentage(total_score, max_score);
    let suggestions = suggestions(&outcomes, percentage);

    TestReport {
        generated_at,
        total_score,
        max_score,
        percentage,
        grade: grade(percentage, grade_ceiling),
        grade_ceiling,
        summary: summarize(&outcomes),
        tests: outcomes,
        suggestions,
    }
}

/// `earned / available * 100`, or 0 when nothing was available.
pub fn percentage(earned: u32, available: u32) -> f64 {
    if available == 0 {
        0.0
    } else {
        f64::from(earned) / f64::from(available) * 100.0
    }
}

/// Scales a percentage onto `[0, ceiling]`, rounded to two decimals.
pub fn grade(percentage: f64, ceiling: f64) -> f64 {
    let raw = (percentage / 100.0 * ceiling * 100.0).round() / 100.0;
    raw.clamp(0.0, ceiling)
}

/// Counts outcomes by status.
pub fn summarize(outcomes: &[TestOutcome]) -> ReportSummary {
    ReportSummary {
        passed: outcomes.iter().filter(|o| o.is_pass()).count(),
        failed: outcomes.iter().filter(|o| o.is_fail()).count(),
        warnings: outcomes
            .iter()
            .filter(|o| !o.is_pass() && !o.is_fail())
            .count(),
        total: outcomes.len(),
    }
}

fn mentions(outcome: &TestOutcome, needle: &str) -> bool {
    outcome.message.contains(needle)
}

fn mentions_ignore_case(outcome: &TestOutcome, needle: &str) -> bool {
    outcome
        .message
        .to_lowercase()
        .contains(&needle.to_lowercase())
}

fn is_connectivity_failure(outcome: &TestOutcome) -> bool {
    outcome.case_id == PROBE_CASE_ID
        || mentions(outcome, "not running")
        || mentions(outcome, "Connection")
        || mentions(outcome, "ECONNREFUSED")
}

fn is_route_failure(outcome: &TestOutcome) -> bool {
    mentions(outcome, "(404)") || mentions(outcome, "not found")
}

fn is_internal_failure(outcome: &TestOutcome) -> bool {
    mentions(outcome, "(500)") || mentions_ignore_case(outcome, "internal error")
}

/// Prioritized remediation hints for a set of outcomes.
///
/// Connectivity problems suppress every other hint: nothing else can be
/// judged until the API answers.
pub fn suggestions(outcomes: &[TestOutcome], percentage: f64) -> Vec<Suggestion> {
    let failed: Vec<&TestOutcome> = outcomes.iter().filter(|o| o.is_fail()).collect();

    if failed.is_empty() {
        return vec![Suggestion::new(
            SuggestionKind::Overall,
            "Congratulations! Your API passes every check.",
        )];
    }

    if failed.iter().any(|o| is_connectivity_failure(o)) {
        return vec![
            Suggestion::new(
                SuggestionKind::Connectivity,
                "TOP PRIORITY: start the API server",
            ),
            Suggestion::new(
                SuggestionKind::Connectivity,
                "Check that the base URL answers in a browser",
            ),
        ];
    }

    let mut hints = Vec::new();
    let any = |predicate: &dyn Fn(&TestOutcome) -> bool| failed.iter().any(|o| predicate(o));

    if any(&is_route_failure) {
        hints.push(Suggestion::new(
            SuggestionKind::Routing,
            "Register the author and book routes",
        ));
        hints.push(Suggestion::new(
            SuggestionKind::Routing,
            "List the registered routes and compare them with the contract",
        ));
    }

    if any(&is_internal_failure) {
        hints.push(Suggestion::new(
            SuggestionKind::InternalError,
            "Configure the database and run the migrations",
        ));
        hints.push(Suggestion::new(
            SuggestionKind::InternalError,
            "Read the server log for the failing query or stack trace",
        ));
    }

    if any(&|o: &TestOutcome| mentions(o, "Incorrect HTTP status")) {
        hints.push(Suggestion::new(
            SuggestionKind::StatusCode,
            "Review the HTTP status codes returned by the controllers (200, 201, 204, 404, 409, 422)",
        ));
    }

    if any(&|o: &TestOutcome| mentions(o, "Validation")) {
        hints.push(Suggestion::new(
            SuggestionKind::Validation,
            "Validate request bodies and answer 422 with the field errors",
        ));
    }

    if any(&|o: &TestOutcome| mentions(o, "structure")) {
        hints.push(Suggestion::new(
            SuggestionKind::Structure,
            "Return created and updated records with their id and fields, and lists as arrays",
        ));
        hints.push(Suggestion::new(
            SuggestionKind::Structure,
            "Keep one response envelope for every endpoint: {data: [], meta: {}}",
        ));
    }

    if any(&|o: &TestOutcome| mentions(o, "Business rule")) {
        hints.push(Suggestion::new(
            SuggestionKind::BusinessRule,
            "Enforce the rules: no deleting authors with books, no duplicate title for the same author (409)",
        ));
    }

    if failed.iter().filter(|o| o.endpoint.contains("authors")).count() > 5 {
        hints.push(Suggestion::new(
            SuggestionKind::Resource,
            "Prioritize the author endpoints",
        ));
    }
    if failed.iter().filter(|o| o.endpoint.contains("books")).count() > 5 {
        hints.push(Suggestion::new(
            SuggestionKind::Resource,
            "Prioritize the book endpoints",
        ));
    }

    let bucket = if percentage <= 0.0 {
        "URGENT: no endpoint works yet, start from the basic setup"
    } else if percentage < 30.0 {
        "Initial implementation needed: focus on the basic endpoints (GET/POST)"
    } else if percentage < 70.0 {
        "Good foundation! Now add validations and business rules"
    } else if percentage < 90.0 {
        "Almost there! Adjust a few validation and structure details"
    } else {
        "Excellent implementation! Only small adjustments left"
    };
    hints.push(Suggestion::new(SuggestionKind::Overall, bucket));
    hints.push(Suggestion::new(
        SuggestionKind::Overall,
        "Check the API contract for the complete list of endpoints and rules",
    ));

    dedup(&mut hints);
    hints.sort_by_key(|s| s.kind);
    hints
}

fn dedup(hints: &mut Vec<Suggestion>) {
    let mut seen = std::collections::HashSet::new();
    hints.retain(|s| seen.insert(s.text.clone()));
}

/// Findings derived from the failed outcomes, grouped for the text report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingFeatures {
    pub critical: Vec<String>,
    pub endpoints: Vec<String>,
    pub validations: Vec<String>,
    pub business_rules: Vec<String>,
    pub structure: Vec<String>,
    pub http_status: Vec<String>,
}

impl MissingFeatures {
    /// Returns true if there are no findings at all.
    pub fn is_empty(&self) -> bool {
        self.sections().iter().all(|(_, items)| items.is_empty())
    }

    /// Titled sections in report order.
    pub fn sections(&self) -> [(&'static str, &[String]); 6] {
        [
            ("CRITICAL PROBLEMS BLOCKING EVERYTHING", &self.critical),
            ("ENDPOINTS NOT WORKING", &self.endpoints),
            ("MISSING VALIDATIONS", &self.validations),
            ("BUSINESS RULES NOT ENFORCED", &self.business_rules),
            ("RESPONSE STRUCTURE PROBLEMS", &self.structure),
            ("INCORRECT HTTP STATUS CODES", &self.http_status),
        ]
    }
}

fn push_unique(items: &mut Vec<String>, item: String) {
    if !items.contains(&item) {
        items.push(item);
    }
}

/// What a failing validation case says is missing.
fn validation_hint(case_id: &str) -> Option<&'static str> {
    let hint = match case_id {
        "authors.validate.empty_name" => "Author `nome` is required",
        "authors.validate.short_name" => "Author `nome` needs at least 2 characters",
        "authors.validate.long_name" => "Author `nome` accepts at most 255 characters",
        "authors.validate.long_bio" => "Author `bio` accepts at most 1000 characters",
        "authors.validate.wrong_types" => "Author `nome` and `bio` must be strings",
        "authors.validate.empty_payload" => "An empty author payload must be rejected",
        "books.validate.empty_title" => "Book `titulo` is required",
        "books.validate.unknown_author" => "Book `autor_id` must reference an existing author",
        "books.validate.ancient_year" => "Book `ano_publicacao` must be 1450 or later",
        "books.validate.zero_pages" => "Book `paginas` must be at least 1",
        "books.validate.negative_pages" => "Book updates must validate `paginas` too",
        _ => return None,
    };
    Some(hint)
}

fn status_label(status: u64) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        404 => "Not Found",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        _ => "",
    }
}

/// Groups the failed outcomes of a report into missing-feature findings.
pub fn missing_features(report: &TestReport) -> MissingFeatures {
    let mut missing = MissingFeatures::default();

    for outcome in report.failed_tests() {
        if is_connectivity_failure(outcome) {
            push_unique(
                &mut missing.critical,
                "The API server is not running or not reachable".to_string(),
            );
            push_unique(
                &mut missing.critical,
                "Check that the configured base URL is reachable".to_string(),
            );
            continue;
        }

        if is_route_failure(outcome) {
            push_unique(
                &mut missing.endpoints,
                format!("{} {}: route not registered", outcome.method, outcome.endpoint),
            );
        }
        if is_internal_failure(outcome) {
            push_unique(
                &mut missing.endpoints,
                format!("{} {}: controller fails internally", outcome.method, outcome.endpoint),
            );
        }

        if mentions(outcome, "Validation") {
            let hint = validation_hint(&outcome.case_id).map_or_else(
                || format!("{} {}: validate the payload and answer 422", outcome.method, outcome.endpoint),
                str::to_string,
            );
            push_unique(&mut missing.validations, hint);
        }

        if mentions(outcome, "Business rule") {
            let rule = match outcome.case_id.as_str() {
                "authors.delete_with_books" => {
                    "Refuse deleting an author that still has books (409)".to_string()
                }
                "books.duplicate" => {
                    "Refuse a second book with the same title and author (409)".to_string()
                }
                _ => format!("{} {}: enforce the business rule", outcome.method, outcome.endpoint),
            };
            push_unique(&mut missing.business_rules, rule);
        }

        if mentions(outcome, "structure") {
            push_unique(
                &mut missing.structure,
                format!("{} must return records with their id and fields", outcome.endpoint),
            );
        }

        if mentions(outcome, "Incorrect HTTP status") {
            let expected = outcome
                .expected
                .as_ref()
                .and_then(|e| e.get("status"))
                .and_then(serde_json::Value::as_u64);
            if let Some(status) = expected {
                push_unique(
                    &mut missing.http_status,
                    format!(
                        "{} {} must answer {status} {}",
                        outcome.method,
                        outcome.endpoint,
                        status_label(status)
                    )
                    .trim_end()
                    .to_string(),
                );
            }
        }
    }

    missing
}

/// Earned and available points for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryScore {
    pub category: CaseCategory,
    pub earned: u32,
    pub available: u32,
}

/// Per-category points, in category order, skipping categories with no
/// outcomes.
pub fn category_breakdown(report: &TestReport) -> Vec<CategoryScore> {
    CaseCategory::ALL
        .iter()
        .map(|category| {
            let (earned, available) = report
                .tests
                .iter()
                .filter(|o| o.category == *category)
                .fold((0, 0), |(earned, available), o| {
                    (earned + o.score, available + o.max_score)
                });
            CategoryScore {
                category: *category,
                earned,
                available,
            }
        })
        .filter(|score| score.available > 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HttpMethod, OutcomeStatus};
    use serde_json::json;

    fn outcome(id: &str, endpoint: &str, category: CaseCategory, max: u32) -> TestOutcome {
        TestOutcome::new(id, HttpMethod::Post, endpoint, category, max)
    }

    fn pass(id: &str, max: u32) -> TestOutcome {
        outcome(id, "/api/authors", CaseCategory::Crud, max).passed("ok")
    }

    fn fail(id: &str, endpoint: &str, message: &str) -> TestOutcome {
        outcome(id, endpoint, CaseCategory::Crud, 10).failed(0, message)
    }

    #[test]
    fn test_totals_and_grade() {
        let outcomes = vec![
            pass("a", 20),
            outcome("b", "/api/books", CaseCategory::Crud, 20).failed(10, "partial"),
            outcome("c", "/api/books", CaseCategory::Crud, 10).warned(5, "warn"),
        ];
        let report = build_report(outcomes, 2.0);

        assert_eq!(report.total_score, 35);
        assert_eq!(report.max_score, 50);
        assert!((report.percentage - 70.0).abs() < 1e-9);
        assert!((report.grade - 1.4).abs() < 1e-9);
        assert_eq!(
            report.summary,
            ReportSummary {
                passed: 1,
                failed: 1,
                warnings: 1,
                total: 3
            }
        );
    }

    #[test]
    fn test_grade_rounding_and_bounds() {
        assert!((grade(33.333, 2.0) - 0.67).abs() < 1e-9);
        assert!((grade(100.0, 2.0) - 2.0).abs() < 1e-9);
        assert!((grade(0.0, 10.0)).abs() < 1e-9);
        assert!((grade(50.0, 10.0) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_run() {
        let report = build_report(Vec::new(), 2.0);
        assert_eq!(report.max_score, 0);
        assert!(report.percentage.abs() < f64::EPSILON);
        assert!(report.grade.abs() < f64::EPSILON);
        assert_eq!(report.summary.total, 0);
    }

    #[test]
    fn test_no_failures_congratulates() {
        let hints = suggestions(&[pass("a", 10)], 100.0);
        assert_eq!(hints.len(), 1);
        assert!(hints[0].text.starts_with("Congratulations"));
    }

    #[test]
    fn test_connectivity_suppresses_everything_else() {
        let outcomes = vec![
            fail(PROBE_CASE_ID, "Connection test", "Unknown connection error"),
            fail("x", "/api/authors", "Validation failed: API accepted invalid data"),
        ];
        let hints = suggestions(&outcomes, 0.0);
        assert_eq!(hints.len(), 2);
        assert!(hints.iter().all(|h| h.kind == SuggestionKind::Connectivity));
    }

    #[test]
    fn test_keyword_rules_and_priority() {
        let outcomes = vec![
            fail("v", "/api/authors", "Validation failed: API accepted invalid data (x)"),
            fail("r", "/api/books/1", "Route GET /api/books/1 not found (404)"),
            fail("b", "/api/books", "Business rule violated: duplicate was accepted"),
            fail("v2", "/api/authors", "Validation returned incorrect status: 400 (expected: 422)"),
        ];
        let hints = suggestions(&outcomes, 50.0);
        let kinds: Vec<SuggestionKind> = hints.iter().map(|h| h.kind).collect();

        assert_eq!(kinds.first(), Some(&SuggestionKind::Routing));
        assert!(kinds.contains(&SuggestionKind::Validation));
        assert!(kinds.contains(&SuggestionKind::BusinessRule));
        assert!(!kinds.contains(&SuggestionKind::InternalError));
        assert!(kinds.windows(2).all(|w| w[0] <= w[1]), "sorted by priority");

        // Validation hint appears once even though two outcomes triggered it
        let validation = hints
            .iter()
            .filter(|h| h.kind == SuggestionKind::Validation)
            .count();
        assert_eq!(validation, 1);

        assert!(hints.iter().any(|h| h.text.starts_with("Good foundation")));
    }

    #[test]
    fn test_expected_404_is_not_a_route_failure() {
        let outcomes = vec![fail(
            "s",
            "/api/authors/99999",
            "Incorrect HTTP status: 200 (expected: 404)",
        )];
        let hints = suggestions(&outcomes, 90.0);
        assert!(hints.iter().all(|h| h.kind != SuggestionKind::Routing));
        assert!(hints.iter().any(|h| h.kind == SuggestionKind::StatusCode));
    }

    #[test]
    fn test_resource_hint_after_many_failures() {
        let outcomes: Vec<TestOutcome> = (0..6)
            .map(|i| fail(&format!("c{i}"), "/api/books", "Prerequisite unavailable"))
            .collect();
        let hints = suggestions(&outcomes, 10.0);
        assert!(hints.iter().any(|h| h.text == "Prioritize the book endpoints"));
        assert!(!hints.iter().any(|h| h.text == "Prioritize the author endpoints"));
    }

    #[test]
    fn test_missing_features_groups_findings() {
        let outcomes = vec![
            fail(
                "authors.validate.short_name",
                "/api/authors",
                "Validation failed: API accepted invalid data (x)",
            ),
            fail(
                "authors.delete_with_books",
                "/api/authors/1",
                "Business rule violated: delete author with books was accepted",
            ),
            fail("r", "/api/books", "Route POST /api/books not found (404)"),
            fail("r", "/api/books", "Route POST /api/books not found (404)"),
            outcome("s", "/api/authors", CaseCategory::Crud, 20)
                .failed(0, "Incorrect HTTP status: 200 (expected: 201)")
                .with_expected(json!({"status": 201})),
        ];
        let report = build_report(outcomes, 2.0);
        let missing = missing_features(&report);

        assert_eq!(missing.validations, vec!["Author `nome` needs at least 2 characters"]);
        assert_eq!(
            missing.business_rules,
            vec!["Refuse deleting an author that still has books (409)"]
        );
        assert_eq!(missing.endpoints, vec!["POST /api/books: route not registered"]);
        assert_eq!(
            missing.http_status,
            vec!["POST /api/authors must answer 201 Created"]
        );
        assert!(missing.critical.is_empty());
        assert!(!missing.is_empty());
    }

    #[test]
    fn test_category_breakdown_skips_empty_categories() {
        let outcomes = vec![
            outcome("a", "/api/authors", CaseCategory::Validation, 10).passed("ok"),
            outcome("b", "/api/authors", CaseCategory::Validation, 15).failed(5, "x"),
            outcome("c", "/api/books", CaseCategory::Business, 20).failed(0, "y"),
        ];
        let report = build_report(outcomes, 2.0);
        let breakdown = category_breakdown(&report);

        assert_eq!(
            breakdown,
            vec![
                CategoryScore {
                    category: CaseCategory::Validation,
                    earned: 15,
                    available: 25
                },
                CategoryScore {
                    category: CaseCategory::Business,
                    earned: 0,
                    available: 20
                },
            ]
        );
        assert_eq!(report.tests[0].status, OutcomeStatus::Pass);
    }
}
