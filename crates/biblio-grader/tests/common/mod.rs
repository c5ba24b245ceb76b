//! Shared helpers for integration tests: serves a `MockLibrary` over real HTTP.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
};
use biblio_grader::testing::{Faults, MockLibrary};
use biblio_grader::{HttpMethod, TestConfig};
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A reference library API listening on an ephemeral local port.
pub struct TestServer {
    pub base_url: String,
    pub library: MockLibrary,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Starts a compliant server.
    pub async fn start() -> Self {
        Self::with_library(MockLibrary::new()).await
    }

    /// Starts a server with the given faults.
    pub async fn with_faults(faults: Faults) -> Self {
        Self::with_library(MockLibrary::with_faults(faults)).await
    }

    async fn with_library(library: MockLibrary) -> Self {
        let app = Router::new()
            .route("/api/{*path}", any(serve))
            .with_state(library.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            library,
            handle,
        }
    }

    /// Grader configuration pointing at this server.
    pub fn config(&self) -> TestConfig {
        TestConfig::new()
            .with_base_url(self.base_url.as_str())
            .with_timeout(Duration::from_secs(5))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Returns a base URL nothing is listening on.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

async fn serve(
    State(library): State<MockLibrary>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let Ok(method) = method.as_str().parse::<HttpMethod>() else {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    };

    let path = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |pq| pq.as_str());
    let relative = path.strip_prefix("/api").unwrap_or(path);
    let body: Option<Value> = serde_json::from_slice(&body).ok();

    let (status, payload) = library.handle(method, relative, body.as_ref());
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status == StatusCode::NO_CONTENT || payload.is_null() {
        status.into_response()
    } else {
        (status, Json(payload)).into_response()
    }
}
