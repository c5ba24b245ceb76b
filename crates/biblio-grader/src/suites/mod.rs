//! Scenario suites.
//!
//! A suite is an ordered, static table of [`Case`] descriptors. One
//! [`Executor`] interprets every table: it resolves the case path against the
//! run's fixtures, builds the payload, issues the request and grades the
//! response against the case's [`Expectation`]. Every failure, network or
//! protocol, becomes a `fail` outcome; nothing aborts a suite.

pub mod authors;
pub mod books;

use crate::classifier::{Category, Failure, classify};
use crate::client::{ApiResponse, Transport};
use crate::config::TestConfig;
use crate::models::{CaseCategory, HttpMethod, TestOutcome};
use crate::state::{Fixture, RunState};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

/// Builds a request payload, possibly reading fixtures or drawing unique names.
pub type PayloadFn = for<'a> fn(&mut PayloadContext<'a>) -> Value;

/// What a payload builder may read while building a request body.
pub struct PayloadContext<'a> {
    state: &'a mut RunState,
    missing_id: u64,
}

impl<'a> PayloadContext<'a> {
    pub fn new(state: &'a mut RunState, missing_id: u64) -> Self {
        Self { state, missing_id }
    }

    /// Id held for `fixture` as JSON, or `null` when it was never created.
    pub fn id(&self, fixture: Fixture) -> Value {
        self.state.get(fixture).map_or(Value::Null, Value::from)
    }

    /// Identifier presumed not to exist on the API.
    pub fn missing_id(&self) -> u64 {
        self.missing_id
    }

    /// `prefix` followed by a run-unique suffix.
    pub fn unique(&mut self, prefix: &str) -> String {
        format!("{prefix} {}", self.state.unique_suffix())
    }
}

/// Request path of a case, relative to the API root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSpec {
    /// Fixed path, e.g. `/authors`.
    Static(&'static str),
    /// Template whose `{id}` is the id held for a fixture.
    Fixture(&'static str, Fixture),
    /// Template whose `{id}` is the configured missing id.
    Missing(&'static str),
}

impl PathSpec {
    /// The path template as written in the case table.
    pub fn template(self) -> &'static str {
        match self {
            PathSpec::Static(path) | PathSpec::Fixture(path, _) | PathSpec::Missing(path) => path,
        }
    }

    /// The fixture the path depends on, if any.
    pub fn fixture(self) -> Option<Fixture> {
        match self {
            PathSpec::Fixture(_, fixture) => Some(fixture),
            _ => None,
        }
    }

    /// Resolves the template, or names the fixture that is not available.
    pub fn resolve(self, state: &RunState, missing_id: u64) -> Result<String, Fixture> {
        match self {
            PathSpec::Static(path) => Ok(path.to_string()),
            PathSpec::Fixture(template, fixture) => state
                .get(fixture)
                .map(|id| template.replace("{id}", &id.to_string()))
                .ok_or(fixture),
            PathSpec::Missing(template) => Ok(template.replace("{id}", &missing_id.to_string())),
        }
    }
}

/// How a case grades the response it gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// 200 with an array body.
    ListShape,
    /// 200 with an array whose first element carries these fields.
    SampleFields(&'static [&'static str]),
    /// 201 echoing the payload with an id, captured into the fixture.
    Created(Fixture),
    /// 422.
    Rejected,
    /// 200 whose id equals the fixture id.
    Fetched(Fixture),
    /// 200 echoing the payload.
    Updated,
    /// 404.
    NotFound,
    /// Exactly this status.
    Status(u16),
    /// 409; a 2xx breaks a business rule.
    Conflict,
    /// Payload sent twice: the first must succeed (id captured into the
    /// fixture), the second must answer 409.
    DuplicateConflict(Fixture),
    /// 200 or 204, releasing the fixture. With `missing_warning`, a 404 is a
    /// warning worth that many points instead of a failure.
    Deleted {
        fixture: Fixture,
        missing_warning: Option<u32>,
    },
}

impl Expectation {
    /// The status the contract prescribes for the case.
    pub fn expected_status(self) -> u16 {
        match self {
            Expectation::ListShape
            | Expectation::SampleFields(_)
            | Expectation::Fetched(_)
            | Expectation::Updated => 200,
            Expectation::Created(_) => 201,
            Expectation::Rejected => 422,
            Expectation::NotFound => 404,
            Expectation::Status(status) => status,
            Expectation::Conflict | Expectation::DuplicateConflict(_) => 409,
            Expectation::Deleted { .. } => 204,
        }
    }
}

/// One entry of a suite table.
#[derive(Debug, Clone, Copy)]
pub struct Case {
    pub id: &'static str,
    pub label: &'static str,
    pub category: CaseCategory,
    pub method: HttpMethod,
    pub path: PathSpec,
    pub payload: Option<PayloadFn>,
    pub expectation: Expectation,
    pub weight: u32,
    /// Points awarded for a near miss (right status, wrong shape; or a wrong
    /// non-success status where a rejection was expected).
    pub partial: u32,
    pub requires: &'static [Fixture],
}

/// A named, ordered case table for one resource.
#[derive(Debug, Clone, Copy)]
pub struct Suite {
    pub name: &'static str,
    /// Collection the suite owns, as it appears in endpoint paths.
    pub resource: &'static str,
    pub cases: &'static [Case],
}

impl Suite {
    /// Sum of case weights.
    pub fn max_score(&self) -> u32 {
        self.cases.iter().map(|case| case.weight).sum()
    }
}

/// Both suites in execution order.
pub fn all() -> [Suite; 2] {
    [authors::suite(), books::suite()]
}

/// Runs suite tables against a transport.
pub struct Executor<'a> {
    transport: &'a dyn Transport,
    api_prefix: String,
    missing_id: u64,
}

impl<'a> Executor<'a> {
    pub fn new(transport: &'a dyn Transport, config: &TestConfig) -> Self {
        Self {
            transport,
            api_prefix: config.api_prefix.clone(),
            missing_id: config.missing_id,
        }
    }

    /// Runs every case of `suite` in order, then deletes the fixtures still
    /// held in `state`.
    pub async fn run(&self, suite: &Suite, state: &mut RunState) -> Vec<TestOutcome> {
        let mut outcomes = Vec::with_capacity(suite.cases.len());

        for case in suite.cases {
            outcomes.push(self.run_case(case, state).await);
        }

        self.cleanup(state).await;

        let passed = outcomes.iter().filter(|o| o.is_pass()).count();
        let score: u32 = outcomes.iter().map(|o| o.score).sum();
        info!(
            suite = suite.name,
            passed,
            total = outcomes.len(),
            score,
            max_score = suite.max_score(),
            "suite finished"
        );

        outcomes
    }

    /// Runs a single case and grades it.
    pub async fn run_case(&self, case: &Case, state: &mut RunState) -> TestOutcome {
        let resolved = match state.first_missing(case.requires) {
            Some(fixture) => Err(fixture),
            None => case.path.resolve(state, self.missing_id),
        };
        let path = match resolved {
            Ok(path) => path,
            Err(fixture) => {
                debug!(case = case.id, %fixture, "prerequisite missing, case skipped");
                return self.prerequisite_failure(case, fixture);
            }
        };

        let endpoint = self.endpoint(&path);
        let payload = case
            .payload
            .map(|build| build(&mut PayloadContext::new(state, self.missing_id)));
        let mut outcome =
            TestOutcome::new(case.id, case.method, &endpoint, case.category, case.weight);
        if let Some(payload) = &payload {
            outcome = outcome.with_request(payload.clone());
        }

        debug!(case = case.id, method = %case.method, %endpoint, "running case");

        let outcome = match case.expectation {
            Expectation::DuplicateConflict(seed) => {
                self.run_duplicate(case, &path, payload.as_ref(), seed, outcome, state)
                    .await
            }
            expectation => {
                let result = self.request(case.method, &path, payload.as_ref()).await;
                grade(case, expectation, payload.as_ref(), result, outcome, state)
            }
        };

        debug!(
            case = case.id,
            status = ?outcome.status,
            score = outcome.score,
            max_score = outcome.max_score,
            "case graded"
        );
        outcome
    }

    /// Sends the payload twice; only the second attempt is graded.
    async fn run_duplicate(
        &self,
        case: &Case,
        path: &str,
        payload: Option<&Value>,
        seed: Fixture,
        outcome: TestOutcome,
        state: &mut RunState,
    ) -> TestOutcome {
        let first = self.request(case.method, path, payload).await;
        match require_status(first, &[200, 201]) {
            Ok(response) => {
                if let Some(id) = extract_id(response.data()) {
                    state.set(seed, id);
                }
            }
            Err(failure) => return unexpected(outcome, &failure, 201),
        }

        let second = self.request(case.method, path, payload).await;
        if let Ok(response) = &second
            && response.is_success()
            && let Some(id) = extract_id(response.data())
        {
            self.discard(seed.collection(), id).await;
        }

        let text = RejectionText::business(case.label);
        expect_rejection(outcome, second, 409, case.partial, &text)
    }

    /// Deletes wrongly accepted records and every fixture still held, books
    /// before authors. Failures are only logged.
    async fn cleanup(&self, state: &mut RunState) {
        for collection in ["/books", "/authors"] {
            for id in state.take_strays(collection) {
                debug!(collection, id, "removing wrongly accepted record");
                self.discard(collection, id).await;
            }
            for fixture in Fixture::CLEANUP_ORDER
                .into_iter()
                .filter(|f| f.collection() == collection)
            {
                if let Some(id) = state.take(fixture) {
                    debug!(%fixture, id, "cleaning up fixture");
                    self.discard(collection, id).await;
                }
            }
        }
    }

    async fn discard(&self, collection: &str, id: u64) {
        let path = format!("{collection}/{id}");
        match self.request(HttpMethod::Delete, &path, None).await {
            Ok(response) if response.is_success() || response.status == 404 => {}
            Ok(response) => {
                warn!(%path, status = response.status, "cleanup delete returned unexpected status");
            }
            Err(failure) => warn!(%path, error = %failure.message(), "cleanup delete failed"),
        }
    }

    fn prerequisite_failure(&self, case: &Case, fixture: Fixture) -> TestOutcome {
        TestOutcome::new(
            case.id,
            case.method,
            self.endpoint(case.path.template()),
            case.category,
            case.weight,
        )
        .failed(
            0,
            format!("Prerequisite unavailable for {}", case.label.to_lowercase()),
        )
        .with_details(format!(
            "The `{fixture}` record this case depends on was not created by an earlier case.\n\n\
             FIX: make the earlier creation case pass first"
        ))
    }

    async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, Failure> {
        self.transport
            .send(method, path, body)
            .await
            .map_err(Failure::from)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_prefix, path)
    }
}

/// Grades a single-request case.
fn grade(
    case: &Case,
    expectation: Expectation,
    payload: Option<&Value>,
    result: Result<ApiResponse, Failure>,
    outcome: TestOutcome,
    state: &mut RunState,
) -> TestOutcome {
    match expectation {
        Expectation::ListShape => match require_status(result, &[200]) {
            Ok(response) if response.data().is_array() => {
                outcome.passed(format!("{}: returns a list", case.label))
            }
            Ok(response) => outcome
                .failed(case.partial, "Incorrect response structure (expected: array)")
                .with_details("The endpoint must answer with a JSON array, optionally wrapped in `data`.")
                .with_response(response.body)
                .with_expected("array"),
            Err(failure) => unexpected(outcome, &failure, 200),
        },

        Expectation::SampleFields(fields) => match require_status(result, &[200]) {
            Ok(response) => match response.data().as_array() {
                None => outcome
                    .failed(case.partial, "Incorrect response structure (expected: array)")
                    .with_response(response.body)
                    .with_expected("array"),
                Some(items) if items.is_empty() => {
                    outcome.passed(format!("{}: empty list returned", case.label))
                }
                Some(items) => {
                    let missing: Vec<&str> = fields
                        .iter()
                        .copied()
                        .filter(|field| items[0].get(*field).is_none())
                        .collect();
                    if missing.is_empty() {
                        outcome.passed(format!("{}: required fields present", case.label))
                    } else {
                        outcome
                            .failed(
                                case.partial,
                                format!(
                                    "Incorrect record structure: missing fields ({})",
                                    missing.join(", ")
                                ),
                            )
                            .with_details(format!(
                                "Every record must carry the fields {}.",
                                fields.join(", ")
                            ))
                            .with_response(items[0].clone())
                            .with_expected(json!({ "fields": fields }))
                    }
                }
            },
            Err(failure) => unexpected(outcome, &failure, 200),
        },

        Expectation::Created(capture) => match require_status(result, &[201]) {
            Ok(response) => {
                let data = response.data();
                let id = extract_id(data);
                if let Some(id) = id {
                    state.set(capture, id);
                }
                if id.is_some() && echoes(payload, data) {
                    outcome.passed(format!("{}: created", case.label))
                } else {
                    outcome
                        .failed(case.partial, "Record created but response structure is incorrect")
                        .with_details(
                            "The created record must be returned with its `id` and the submitted fields.",
                        )
                        .with_response(response.body)
                        .with_expected(expected_echo(payload))
                }
            }
            Err(failure) => unexpected(outcome, &failure, 201),
        },

        Expectation::Fetched(fixture) => match require_status(result, &[200]) {
            Ok(response) => {
                let wanted = state.get(fixture);
                if wanted.is_some() && extract_id(response.data()) == wanted {
                    outcome.passed(format!("{}: record found", case.label))
                } else {
                    outcome
                        .failed(case.partial, "Returned id does not match the requested record")
                        .with_response(response.body)
                        .with_expected(json!({ "id": wanted }))
                }
            }
            Err(failure) => unexpected(outcome, &failure, 200),
        },

        Expectation::Updated => match require_status(result, &[200]) {
            Ok(response) if echoes(payload, response.data()) => {
                outcome.passed(format!("{}: updated", case.label))
            }
            Ok(response) => outcome
                .failed(
                    case.partial,
                    "Record updated but response structure does not echo the submitted fields",
                )
                .with_details("The updated record must be returned with the new values.")
                .with_response(response.body)
                .with_expected(expected_echo(payload)),
            Err(failure) => unexpected(outcome, &failure, 200),
        },

        Expectation::Status(status) => match require_status(result, &[status]) {
            Ok(_) => outcome.passed(format!("{}: responds {status}", case.label)),
            Err(failure) => unexpected(outcome, &failure, status),
        },

        Expectation::Rejected => {
            if case.method == HttpMethod::Post
                && let Ok(response) = &result
                && response.is_success()
                && let Some(id) = extract_id(response.data())
            {
                state.track_stray(case.path.template(), id);
            }
            expect_rejection(outcome, result, 422, case.partial, &RejectionText::validation(case.label))
        }

        Expectation::NotFound => {
            expect_rejection(outcome, result, 404, case.partial, &RejectionText::not_found(case.label))
        }

        Expectation::Conflict => {
            expect_rejection(outcome, result, 409, case.partial, &RejectionText::business(case.label))
        }

        Expectation::Deleted {
            fixture,
            missing_warning,
        } => match result {
            Ok(response) if matches!(response.status, 200 | 204) => {
                state.take(fixture);
                outcome.passed(format!("{}: removed ({})", case.label, response.status))
            }
            Ok(response) if response.is_success() => {
                state.take(fixture);
                outcome
                    .failed(
                        case.partial,
                        format!("Incorrect HTTP status: {} (expected: 204)", response.status),
                    )
                    .with_response(response.body)
                    .with_expected(json!({ "status": 204 }))
            }
            Ok(response) if response.status == 404 && missing_warning.is_some() => {
                state.take(fixture);
                outcome.warned(
                    missing_warning.unwrap_or_default(),
                    "Record already deleted or missing (404)",
                )
            }
            Ok(response) => unexpected(
                outcome,
                &Failure::Status {
                    status: response.status,
                    body: response.body,
                },
                204,
            ),
            Err(failure) => unexpected(outcome, &failure, 204),
        },

        Expectation::DuplicateConflict(_) => outcome.failed(0, "Duplicate check needs two requests"),
    }
}

/// Wording for cases that expect the API to refuse a request.
struct RejectionText {
    pass: String,
    accepted: String,
    wrong_status: &'static str,
    fix: &'static str,
}

impl RejectionText {
    fn validation(label: &str) -> Self {
        Self {
            pass: format!("Validation works: {}", label.to_lowercase()),
            accepted: format!("Validation failed: API accepted invalid data ({})", label.to_lowercase()),
            wrong_status: "Validation returned incorrect status",
            fix: "Validate the request body and answer 422 with the field errors.",
        }
    }

    fn not_found(label: &str) -> Self {
        Self {
            pass: format!("{label}: returns 404"),
            accepted: format!("{label}: the API answered success for a missing record"),
            wrong_status: "Incorrect HTTP status",
            fix: "Answer 404 when the requested record does not exist.",
        }
    }

    fn business(label: &str) -> Self {
        Self {
            pass: format!("Business rule works: {}", label.to_lowercase()),
            accepted: format!("Business rule violated: {} was accepted", label.to_lowercase()),
            wrong_status: "Business rule returned incorrect status",
            fix: "Refuse the operation with 409 Conflict.",
        }
    }
}

/// Grades a response against a refusal status.
fn expect_rejection(
    outcome: TestOutcome,
    result: Result<ApiResponse, Failure>,
    expected: u16,
    partial: u32,
    text: &RejectionText,
) -> TestOutcome {
    let response = match result {
        Ok(response) => response,
        Err(failure) => return unexpected(outcome, &failure, expected),
    };

    if response.status == expected {
        return outcome.passed(text.pass.clone()).with_response(response.body);
    }

    if response.is_success() {
        return outcome
            .failed(0, text.accepted.clone())
            .with_details(format!(
                "Expected status {expected}, got {}.\n\nFIX: {}",
                response.status, text.fix
            ))
            .with_response(response.body)
            .with_expected(json!({ "status": expected }));
    }

    // Broken routes and crashes earn nothing; any other refusal is a near miss.
    let status = response.status;
    let failure = Failure::Status {
        status,
        body: response.body.clone(),
    };
    if classify(&failure, outcome.method, &outcome.endpoint).category != Category::Unclassified {
        return unexpected(outcome, &failure, expected);
    }

    outcome
        .failed(
            partial,
            format!("{}: {status} (expected: {expected})", text.wrong_status),
        )
        .with_details(format!("FIX: {}", text.fix))
        .with_response(response.body)
        .with_expected(json!({ "status": expected }))
}

/// Turns a response with a status outside `accepted` into a failure.
fn require_status(
    result: Result<ApiResponse, Failure>,
    accepted: &[u16],
) -> Result<ApiResponse, Failure> {
    let response = result?;
    if accepted.contains(&response.status) {
        Ok(response)
    } else {
        Err(Failure::Status {
            status: response.status,
            body: response.body,
        })
    }
}

/// Zero-credit failure carrying the classifier's diagnosis.
fn unexpected(outcome: TestOutcome, failure: &Failure, expected: u16) -> TestOutcome {
    let diagnosis = classify(failure, outcome.method, &outcome.endpoint);
    let message = match (diagnosis.category, failure) {
        (Category::Unclassified, Failure::Status { status, .. }) => {
            format!("Incorrect HTTP status: {status} (expected: {expected})")
        }
        _ => diagnosis.title,
    };

    let outcome = outcome
        .failed(0, message)
        .with_details(diagnosis.details)
        .with_error(failure.message())
        .with_expected(json!({ "status": expected }));

    match failure {
        Failure::Status { body, .. } => outcome.with_response(body.clone()),
        Failure::Network(_) => outcome,
    }
}

/// Reads a record id, accepting numeric strings.
fn extract_id(data: &Value) -> Option<u64> {
    match data.get("id")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// True if every field of the payload object comes back with the same value.
fn echoes(payload: Option<&Value>, data: &Value) -> bool {
    let Some(Value::Object(sent)) = payload else {
        return data.is_object();
    };
    sent.iter().all(|(key, value)| {
        data.get(key)
            .is_some_and(|returned| loosely_equal(value, returned))
    })
}

/// Equality tolerant of the usual serialization drift: booleans stored as
/// 0/1 and numbers rendered as strings.
fn loosely_equal(sent: &Value, returned: &Value) -> bool {
    match (sent, returned) {
        (a, b) if a == b => true,
        (Value::Bool(flag), Value::Number(n)) => n.as_u64() == Some(u64::from(*flag)),
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
            _ => false,
        },
        (Value::Number(a), Value::String(s)) => match (a.as_f64(), s.parse::<f64>()) {
            (Some(a), Ok(b)) => (a - b).abs() < f64::EPSILON,
            _ => false,
        },
        _ => false,
    }
}

fn expected_echo(payload: Option<&Value>) -> Value {
    let mut expected = payload.cloned().unwrap_or_else(|| json!({}));
    if let Value::Object(map) = &mut expected {
        map.insert("id".to_string(), json!("<generated>"));
    }
    expected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NetworkFailure;
    use crate::models::OutcomeStatus;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses in order and records the requests.
    struct Scripted {
        replies: Mutex<VecDeque<Result<ApiResponse, NetworkFailure>>>,
        seen: Mutex<Vec<(HttpMethod, String)>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<ApiResponse, NetworkFailure>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<(HttpMethod, String)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(
            &self,
            method: HttpMethod,
            path: &str,
            _body: Option<&Value>,
        ) -> Result<ApiResponse, NetworkFailure> {
            self.seen.lock().unwrap().push((method, path.to_string()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ApiResponse::new(204, Value::Null)))
        }
    }

    fn ok(status: u16, body: Value) -> Result<ApiResponse, NetworkFailure> {
        Ok(ApiResponse::new(status, body))
    }

    fn new_author(ctx: &mut PayloadContext<'_>) -> Value {
        json!({ "nome": ctx.unique("Author") })
    }

    fn empty_name(_: &mut PayloadContext<'_>) -> Value {
        json!({ "nome": "" })
    }

    const CREATE: Case = Case {
        id: "t.create",
        label: "Create author",
        category: CaseCategory::Crud,
        method: HttpMethod::Post,
        path: PathSpec::Static("/authors"),
        payload: Some(new_author),
        expectation: Expectation::Created(Fixture::Author),
        weight: 20,
        partial: 10,
        requires: &[],
    };

    const REJECT: Case = Case {
        id: "t.reject",
        label: "Empty name",
        category: CaseCategory::Validation,
        method: HttpMethod::Post,
        path: PathSpec::Static("/authors"),
        payload: Some(empty_name),
        expectation: Expectation::Rejected,
        weight: 15,
        partial: 5,
        requires: &[],
    };

    const SHOW: Case = Case {
        id: "t.show",
        label: "Show author",
        category: CaseCategory::Crud,
        method: HttpMethod::Get,
        path: PathSpec::Fixture("/authors/{id}", Fixture::Author),
        payload: None,
        expectation: Expectation::Fetched(Fixture::Author),
        weight: 15,
        partial: 0,
        requires: &[],
    };

    const DELETE_BOOK: Case = Case {
        id: "t.delete",
        label: "Delete book",
        category: CaseCategory::Crud,
        method: HttpMethod::Delete,
        path: PathSpec::Fixture("/books/{id}", Fixture::Book),
        payload: None,
        expectation: Expectation::Deleted {
            fixture: Fixture::Book,
            missing_warning: Some(10),
        },
        weight: 15,
        partial: 5,
        requires: &[],
    };

    async fn run_one(
        case: &Case,
        replies: Vec<Result<ApiResponse, NetworkFailure>>,
        state: &mut RunState,
    ) -> TestOutcome {
        let transport = Scripted::new(replies);
        let config = TestConfig::new();
        Executor::new(&transport, &config).run_case(case, state).await
    }

    #[tokio::test]
    async fn test_created_captures_id_from_envelope() {
        let mut state = RunState::with_tag("t");
        let outcome = run_one(
            &CREATE,
            vec![ok(201, json!({"data": {"id": 12, "nome": "Author t-1"}}))],
            &mut state,
        )
        .await;

        assert!(outcome.is_pass(), "{outcome:?}");
        assert_eq!(outcome.score, 20);
        assert_eq!(outcome.endpoint, "/api/authors");
        assert_eq!(state.get(Fixture::Author), Some(12));
    }

    #[tokio::test]
    async fn test_created_with_wrong_body_gets_partial_credit() {
        let mut state = RunState::with_tag("t");
        let outcome = run_one(&CREATE, vec![ok(201, json!({"id": 3}))], &mut state).await;

        assert!(outcome.is_fail());
        assert_eq!(outcome.score, 10);
        assert!(outcome.message.contains("structure"));
        // The record exists, so it is still tracked for later cases and cleanup
        assert_eq!(state.get(Fixture::Author), Some(3));
    }

    #[tokio::test]
    async fn test_created_with_200_is_status_failure() {
        let mut state = RunState::new();
        let outcome = run_one(&CREATE, vec![ok(200, json!({"id": 3}))], &mut state).await;

        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.message, "Incorrect HTTP status: 200 (expected: 201)");
        assert!(state.get(Fixture::Author).is_none());
    }

    #[tokio::test]
    async fn test_rejected_branches() {
        let mut state = RunState::new();

        let pass = run_one(&REJECT, vec![ok(422, json!({"errors": {}}))], &mut state).await;
        assert!(pass.is_pass());

        let accepted = run_one(&REJECT, vec![ok(201, json!({"id": 1}))], &mut state).await;
        assert!(accepted.is_fail());
        assert_eq!(accepted.score, 0);
        assert!(accepted.message.starts_with("Validation failed"));

        let wrong = run_one(&REJECT, vec![ok(400, Value::Null)], &mut state).await;
        assert_eq!(wrong.score, 5);
        assert_eq!(
            wrong.message,
            "Validation returned incorrect status: 400 (expected: 422)"
        );

        let crashed = run_one(&REJECT, vec![ok(500, Value::Null)], &mut state).await;
        assert_eq!(crashed.score, 0);
        assert_eq!(crashed.message, "Internal error on endpoint /api/authors (500)");
    }

    #[tokio::test]
    async fn test_missing_prerequisite_skips_request() {
        let transport = Scripted::new(vec![]);
        let config = TestConfig::new();
        let mut state = RunState::new();

        let outcome = Executor::new(&transport, &config)
            .run_case(&SHOW, &mut state)
            .await;

        assert!(outcome.is_fail());
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.endpoint, "/api/authors/{id}");
        assert!(outcome.message.starts_with("Prerequisite unavailable"));
        assert!(transport.seen().is_empty());
    }

    #[tokio::test]
    async fn test_network_failure_is_classified() {
        let mut state = RunState::new();
        state.set(Fixture::Author, 4);

        let outcome = run_one(
            &SHOW,
            vec![Err(NetworkFailure::refused("connection refused"))],
            &mut state,
        )
        .await;

        assert_eq!(outcome.message, "API server is not running");
        assert_eq!(outcome.error.as_deref(), Some("connection refused"));
        assert!(outcome.details.is_some());
    }

    #[tokio::test]
    async fn test_fetched_compares_ids() {
        let mut state = RunState::new();
        state.set(Fixture::Author, 4);

        let found = run_one(&SHOW, vec![ok(200, json!({"id": "4"}))], &mut state).await;
        assert!(found.is_pass());

        let other = run_one(&SHOW, vec![ok(200, json!({"id": 5}))], &mut state).await;
        assert!(other.is_fail());
    }

    #[tokio::test]
    async fn test_deleted_branches() {
        let mut state = RunState::new();
        state.set(Fixture::Book, 9);
        let removed = run_one(&DELETE_BOOK, vec![ok(204, Value::Null)], &mut state).await;
        assert!(removed.is_pass());
        assert!(state.get(Fixture::Book).is_none());

        state.set(Fixture::Book, 9);
        let missing = run_one(&DELETE_BOOK, vec![ok(404, Value::Null)], &mut state).await;
        assert_eq!(missing.status, OutcomeStatus::Warning);
        assert_eq!(missing.score, 10);

        state.set(Fixture::Book, 9);
        let accepted = run_one(&DELETE_BOOK, vec![ok(202, Value::Null)], &mut state).await;
        assert!(accepted.is_fail());
        assert_eq!(accepted.score, 5);
    }

    #[tokio::test]
    async fn test_suite_cleans_up_held_fixtures() {
        static CASES: &[Case] = &[CREATE];
        let suite = Suite {
            name: "test",
            resource: "authors",
            cases: CASES,
        };
        let transport = Scripted::new(vec![ok(201, json!({"id": 21, "nome": "Author t-1"}))]);
        let config = TestConfig::new();
        let mut state = RunState::with_tag("t");

        let outcomes = Executor::new(&transport, &config).run(&suite, &mut state).await;

        assert_eq!(outcomes.len(), 1);
        assert!(state.is_empty());
        assert_eq!(
            transport.seen(),
            vec![
                (HttpMethod::Post, "/authors".to_string()),
                (HttpMethod::Delete, "/authors/21".to_string()),
            ]
        );
    }

    #[test]
    fn test_loose_equality() {
        assert!(loosely_equal(&json!(true), &json!(1)));
        assert!(loosely_equal(&json!(2020), &json!("2020")));
        assert!(loosely_equal(&json!("x"), &json!("x")));
        assert!(!loosely_equal(&json!("x"), &json!("y")));
        assert!(!loosely_equal(&json!(false), &json!(1)));
    }

    #[test]
    fn test_path_resolution() {
        let mut state = RunState::new();
        assert_eq!(
            PathSpec::Missing("/books/{id}").resolve(&state, 99_999),
            Ok("/books/99999".to_string())
        );
        assert_eq!(
            PathSpec::Fixture("/authors/{id}/books", Fixture::Author).resolve(&state, 1),
            Err(Fixture::Author)
        );
        state.set(Fixture::Author, 3);
        assert_eq!(
            PathSpec::Fixture("/authors/{id}/books", Fixture::Author).resolve(&state, 1),
            Ok("/authors/3/books".to_string())
        );
    }
}
