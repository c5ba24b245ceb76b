//! Failure classification.
//!
//! Maps a failed request (no response at all, or a response with an unexpected
//! status) to a diagnostic category with a title and remediation text. Both
//! entry points walk an ordered `(predicate, category)` table and the first
//! matching row wins. Classification is pure: the same failure always yields
//! the same diagnosis.

use crate::client::{NetworkErrorCode, NetworkFailure};
use crate::models::HttpMethod;
use serde::Serialize;
use serde_json::Value;

/// A request that did not go the way the contract expects.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// No HTTP response was received.
    Network(NetworkFailure),
    /// A response arrived with a status the case did not expect.
    Status { status: u16, body: Value },
}

impl Failure {
    /// HTTP status, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Failure::Network(_) => None,
            Failure::Status { status, .. } => Some(*status),
        }
    }

    /// Network failure code, when no response was received.
    pub fn code(&self) -> Option<NetworkErrorCode> {
        match self {
            Failure::Network(failure) => failure.code,
            Failure::Status { .. } => None,
        }
    }

    /// Raw error text for the outcome's `error` field.
    pub fn message(&self) -> String {
        match self {
            Failure::Network(failure) => failure.message.clone(),
            Failure::Status { status, .. } => format!("Request failed with status code {status}"),
        }
    }
}

impl From<NetworkFailure> for Failure {
    fn from(failure: NetworkFailure) -> Self {
        Failure::Network(failure)
    }
}

/// Diagnostic category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    RouteNotFound,
    InternalError,
    MethodNotAllowed,
    ServerNotRunning,
    ConnectionTimeout,
    InvalidUrl,
    /// Connectivity probe failure matching no known signature.
    UnknownConnection,
    /// Endpoint failure matching no known signature.
    Unclassified,
}

/// Classifier verdict: a category, a one-line title and remediation text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnosis {
    pub category: Category,
    pub title: String,
    pub details: String,
}

type Predicate = fn(&Failure) -> bool;

/// Rows evaluated for failures observed by suite cases.
const ENDPOINT_RULES: &[(Predicate, Category)] = &[
    (is_not_found, Category::RouteNotFound),
    (is_internal_error, Category::InternalError),
    (is_method_not_allowed, Category::MethodNotAllowed),
    (is_refused, Category::ServerNotRunning),
];

/// Rows evaluated for the connectivity probe.
const CONNECTION_RULES: &[(Predicate, Category)] = &[
    (is_refused, Category::ServerNotRunning),
    (is_not_found, Category::RouteNotFound),
    (is_internal_error, Category::InternalError),
    (is_slow_or_unresolved, Category::ConnectionTimeout),
    (is_invalid_url, Category::InvalidUrl),
];

fn is_not_found(failure: &Failure) -> bool {
    failure.status() == Some(404)
}

fn is_internal_error(failure: &Failure) -> bool {
    failure.status() == Some(500)
}

fn is_method_not_allowed(failure: &Failure) -> bool {
    failure.status() == Some(405)
}

fn is_refused(failure: &Failure) -> bool {
    match failure {
        Failure::Network(network) => {
            network.code == Some(NetworkErrorCode::ConnectionRefused)
                || network.message.to_lowercase().contains("econnrefused")
        }
        Failure::Status { .. } => false,
    }
}

fn is_slow_or_unresolved(failure: &Failure) -> bool {
    matches!(
        failure.code(),
        Some(NetworkErrorCode::Timeout | NetworkErrorCode::Dns)
    )
}

fn is_invalid_url(failure: &Failure) -> bool {
    failure.code() == Some(NetworkErrorCode::InvalidUrl)
}

fn first_match(rules: &[(Predicate, Category)], failure: &Failure) -> Option<Category> {
    rules
        .iter()
        .find(|(predicate, _)| predicate(failure))
        .map(|(_, category)| *category)
}

/// Diagnoses a failure observed while exercising `method endpoint`.
pub fn classify(failure: &Failure, method: HttpMethod, endpoint: &str) -> Diagnosis {
    let category = first_match(ENDPOINT_RULES, failure).unwrap_or(Category::Unclassified);

    let (title, details) = match category {
        Category::RouteNotFound => (
            format!("Route {method} {endpoint} not found (404)"),
            format!(
                "The route is not registered on the API.\n\n\
                 FIXES:\n\
                 1. Register {method} {endpoint} in the route table\n\
                 2. Check that the controller handling it exists and is imported\n\
                 3. List the registered routes and compare paths and verbs\n\n\
                 EXPECTED: {method} {endpoint} routed and responding"
            ),
        ),
        Category::InternalError => (
            format!("Internal error on endpoint {endpoint} (500)"),
            format!(
                "The endpoint exists but fails internally.\n\n\
                 FIXES:\n\
                 1. Read the server log for the stack trace\n\
                 2. Check the database connection settings\n\
                 3. Run the pending migrations\n\
                 4. Call {method} {endpoint} manually to reproduce\n\n\
                 LIKELY CAUSES: controller bug, database not configured, missing dependency"
            ),
        ),
        Category::MethodNotAllowed => (
            format!("Method {method} not allowed for {endpoint} (405)"),
            format!(
                "The route exists but does not accept {method}.\n\n\
                 FIXES:\n\
                 1. Register the route for the {method} verb\n\
                 2. List the registered routes to see the allowed verbs\n\n\
                 EXPECTED: {endpoint} accepts {method}"
            ),
        ),
        Category::ServerNotRunning => (
            "API server is not running".to_string(),
            format!(
                "Could not connect to the server.\n\n\
                 FIXES:\n\
                 1. Start the API server\n\
                 2. Check that the configured port is not taken by another process\n\
                 3. Look for startup errors in the server terminal\n\n\
                 NETWORK ERROR: {}",
                failure.message()
            ),
        ),
        _ => (
            format!("Error on endpoint {method} {endpoint}"),
            format!(
                "Unidentified problem while calling the endpoint.\n\n\
                 TECHNICAL ERROR: {}\n\
                 HTTP STATUS: {}\n\n\
                 GENERAL FIXES:\n\
                 1. Check that the API server is running\n\
                 2. Check that the routes are registered\n\
                 3. Call the endpoint manually and read the server log",
                failure.message(),
                failure
                    .status()
                    .map_or_else(|| "not received".to_string(), |s| s.to_string())
            ),
        ),
    };

    Diagnosis {
        category,
        title,
        details,
    }
}

/// Diagnoses a failure of the initial connectivity probe against `api_root`.
pub fn classify_connection(failure: &Failure, api_root: &str) -> Diagnosis {
    let category = first_match(CONNECTION_RULES, failure).unwrap_or(Category::UnknownConnection);
    let raw = failure.message();

    let (title, details) = match category {
        Category::ServerNotRunning => (
            "API server is not running".to_string(),
            format!(
                "The API is not reachable at the configured URL.\n\n\
                 FIXES:\n\
                 1. Start the API server\n\
                 2. Confirm it listens on {api_root}\n\
                 3. Look for startup errors in the server terminal\n\
                 4. Open {api_root}/authors in a browser\n\n\
                 TECHNICAL ERROR: {raw}"
            ),
        ),
        Category::RouteNotFound => (
            "API routes not found (404)".to_string(),
            format!(
                "The server is running but the API routes are not registered.\n\n\
                 FIXES:\n\
                 1. Register the author and book routes\n\
                 2. Check that the controllers exist and are imported\n\
                 3. Check that the base URL does not already include the API prefix\n\n\
                 TECHNICAL ERROR: GET {api_root}/authors returned 404"
            ),
        ),
        Category::InternalError => (
            "Internal API error (500)".to_string(),
            "The server is running but fails internally.\n\n\
             FIXES:\n\
             1. Read the server log for the stack trace\n\
             2. Check the database settings\n\
             3. Run the pending migrations\n\
             4. Install the project dependencies\n\n\
             TECHNICAL ERROR: the API returned status 500"
                .to_string(),
        ),
        Category::ConnectionTimeout => (
            "Connection timeout".to_string(),
            format!(
                "The request took too long or the host could not be resolved.\n\n\
                 FIXES:\n\
                 1. Check the base URL\n\
                 2. Check for network problems\n\
                 3. Open the URL directly in a browser\n\
                 4. Check that the server is not overloaded\n\n\
                 TECHNICAL ERROR: {raw}"
            ),
        ),
        Category::InvalidUrl => (
            "Invalid base URL".to_string(),
            format!(
                "The API URL is malformed.\n\n\
                 FIXES:\n\
                 1. Use the form http://localhost:8000\n\
                 2. Do not append the API prefix to the base URL\n\
                 3. Remove spaces and special characters\n\n\
                 CURRENT URL: {api_root}"
            ),
        ),
        _ => (
            "Unknown connection error".to_string(),
            format!(
                "An unidentified error occurred while connecting to the API.\n\n\
                 GENERAL FIXES:\n\
                 1. Check that the API server is running\n\
                 2. Check that the database is configured and running\n\
                 3. Open {api_root}/authors in a browser\n\
                 4. Check that no firewall blocks the port\n\n\
                 TECHNICAL ERROR: {raw}\n\
                 CODE: {}",
                failure
                    .code()
                    .map_or_else(|| "not provided".to_string(), |c| c.to_string())
            ),
        ),
    };

    Diagnosis {
        category,
        title,
        details,
    }
}
