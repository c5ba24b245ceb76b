//! In-memory reference implementation of the library API.
//!
//! [`MockLibrary`] answers the authors/books contract the way a compliant API
//! would (status codes, validation, the delete-with-books and duplicate
//! title rules, `data` envelopes). [`Faults`] switch individual behaviors off
//! so tests can check how the grader scores a non-compliant API. It can be
//! used directly as a [`Transport`] or mounted behind an HTTP server.

use crate::client::{ApiResponse, NetworkFailure, Transport};
use crate::models::HttpMethod;
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Deliberate deviations from the contract.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Skip payload validation; invalid records are stored as sent.
    pub accept_invalid: bool,
    /// Delete authors even when they still own books.
    pub allow_delete_with_books: bool,
    /// Accept a second book with the same title and author.
    pub allow_duplicates: bool,
    /// Route prefixes answered with 404, e.g. `/books`.
    pub missing_routes: Vec<String>,
    /// Route prefixes answered with 500.
    pub internal_errors: Vec<String>,
    /// Fail every request as if nothing were listening.
    pub refuse_connections: bool,
}

fn blocks(routes: &[String], path: &str) -> bool {
    routes.iter().any(|route| {
        path == route
            || path
                .strip_prefix(route.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// A request the library received.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
}

type Record = Map<String, Value>;
type Reply = (u16, Value);

#[derive(Debug, Default)]
struct Library {
    authors: BTreeMap<u64, Record>,
    books: BTreeMap<u64, Record>,
    next_id: u64,
    requests: Vec<RecordedRequest>,
}

/// Shared, cloneable handle to an in-memory library.
#[derive(Debug, Clone, Default)]
pub struct MockLibrary {
    state: Arc<Mutex<Library>>,
    faults: Faults,
}

impl MockLibrary {
    /// Creates an empty, fully compliant library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty library with the given deviations.
    pub fn with_faults(faults: Faults) -> Self {
        Self {
            state: Arc::default(),
            faults,
        }
    }

    /// Number of stored authors.
    pub fn author_count(&self) -> usize {
        self.lock().authors.len()
    }

    /// Number of stored books.
    pub fn book_count(&self) -> usize {
        self.lock().books.len()
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Serves one request. `path` is relative to the API root and may carry a
    /// query string.
    pub fn handle(&self, method: HttpMethod, path: &str, body: Option<&Value>) -> (u16, Value) {
        let mut library = self.lock();
        library.requests.push(RecordedRequest {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });

        let (route, query) = path.split_once('?').unwrap_or((path, ""));
        if blocks(&self.faults.missing_routes, route) {
            return (404, json!({ "message": "Not Found" }));
        }
        if blocks(&self.faults.internal_errors, route) {
            return (500, json!({ "message": "Server Error" }));
        }

        let body = body.cloned().unwrap_or(Value::Null);
        let segments: Vec<&str> = route.split('/').filter(|s| !s.is_empty()).collect();
        let faults = &self.faults;

        match (method, segments.as_slice()) {
            (HttpMethod::Get, ["authors"]) => library.list_authors(),
            (HttpMethod::Post, ["authors"]) => library.create_author(&body, faults),
            (HttpMethod::Get, ["authors", id]) => library.show_author(id),
            (HttpMethod::Put, ["authors", id]) => library.update_author(id, &body, faults),
            (HttpMethod::Delete, ["authors", id]) => library.delete_author(id, faults),
            (HttpMethod::Get, ["authors", id, "books"]) => library.author_books(id),
            (HttpMethod::Get, ["books"]) => library.list_books(query),
            (HttpMethod::Post, ["books"]) => library.create_book(&body, faults),
            (HttpMethod::Get, ["books", id]) => library.show_book(id),
            (HttpMethod::Put, ["books", id]) => library.update_book(id, &body, faults),
            (HttpMethod::Delete, ["books", id]) => library.delete_book(id),
            (_, ["authors" | "books"] | ["authors" | "books", _] | ["authors", _, "books"]) => {
                (405, json!({ "message": "Method Not Allowed" }))
            }
            _ => (404, json!({ "message": "Not Found" })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Library> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for MockLibrary {
    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, NetworkFailure> {
        if self.faults.refuse_connections {
            return Err(NetworkFailure::refused(
                "error sending request: tcp connect error: Connection refused (os error 111)",
            ));
        }
        let (status, body) = self.handle(method, path, body);
        Ok(ApiResponse::new(status, body))
    }
}

impl Library {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn list_authors(&self) -> Reply {
        let data: Vec<&Record> = self.authors.values().collect();
        let total = data.len();
        (200, json!({ "data": data, "meta": { "total": total } }))
    }

    fn create_author(&mut self, body: &Value, faults: &Faults) -> Reply {
        if !faults.accept_invalid
            && let Err(errors) = validate_author(body, false)
        {
            return invalid(errors);
        }

        let id = self.next_id();
        let mut record = Record::new();
        record.insert("id".into(), json!(id));
        record.insert("bio".into(), Value::Null);
        merge(&mut record, body);
        self.authors.insert(id, record.clone());
        (201, json!({ "data": record }))
    }

    fn show_author(&self, id: &str) -> Reply {
        match parse_id(id).and_then(|id| self.authors.get(&id)) {
            Some(record) => (200, json!({ "data": record })),
            None => not_found("Author"),
        }
    }

    fn update_author(&mut self, id: &str, body: &Value, faults: &Faults) -> Reply {
        let Some(id) = parse_id(id).filter(|id| self.authors.contains_key(id)) else {
            return not_found("Author");
        };
        if !faults.accept_invalid
            && let Err(errors) = validate_author(body, true)
        {
            return invalid(errors);
        }

        let Some(record) = self.authors.get_mut(&id) else {
            return not_found("Author");
        };
        merge(record, body);
        (200, json!({ "data": record }))
    }

    fn delete_author(&mut self, id: &str, faults: &Faults) -> Reply {
        let Some(id) = parse_id(id).filter(|id| self.authors.contains_key(id)) else {
            return not_found("Author");
        };
        if !faults.allow_delete_with_books && self.books.values().any(|b| owner_of(b) == Some(id)) {
            return (
                409,
                json!({ "message": "The author still has books and cannot be deleted." }),
            );
        }
        self.authors.remove(&id);
        (204, Value::Null)
    }

    fn author_books(&self, id: &str) -> Reply {
        let Some(id) = parse_id(id).filter(|id| self.authors.contains_key(id)) else {
            return not_found("Author");
        };
        let data: Vec<&Record> = self
            .books
            .values()
            .filter(|b| owner_of(b) == Some(id))
            .collect();
        (200, json!({ "data": data }))
    }

    fn list_books(&self, query: &str) -> Reply {
        let needle = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "q")
            .map(|(_, value)| value.to_lowercase());

        let data: Vec<&Record> = self
            .books
            .values()
            .filter(|book| match &needle {
                Some(needle) => book
                    .get("titulo")
                    .and_then(Value::as_str)
                    .is_some_and(|title| title.to_lowercase().contains(needle.as_str())),
                None => true,
            })
            .collect();
        let total = data.len();
        (200, json!({ "data": data, "meta": { "total": total } }))
    }

    fn create_book(&mut self, body: &Value, faults: &Faults) -> Reply {
        if !faults.accept_invalid
            && let Err(errors) = self.validate_book(body, false)
        {
            return invalid(errors);
        }
        if !faults.allow_duplicates && self.is_duplicate(body, None) {
            return duplicate();
        }

        let id = self.next_id();
        let mut record = Record::new();
        record.insert("id".into(), json!(id));
        record.insert("disponivel".into(), json!(true));
        merge(&mut record, body);
        self.books.insert(id, record.clone());
        (201, json!({ "data": record }))
    }

    fn show_book(&self, id: &str) -> Reply {
        match parse_id(id).and_then(|id| self.books.get(&id)) {
            Some(record) => (200, json!({ "data": record })),
            None => not_found("Book"),
        }
    }

    fn update_book(&mut self, id: &str, body: &Value, faults: &Faults) -> Reply {
        let Some(id) = parse_id(id).filter(|id| self.books.contains_key(id)) else {
            return not_found("Book");
        };
        if !faults.accept_invalid
            && let Err(errors) = self.validate_book(body, true)
        {
            return invalid(errors);
        }

        let Some(record) = self.books.get(&id) else {
            return not_found("Book");
        };
        let mut merged = record.clone();
        merge(&mut merged, body);
        if !faults.allow_duplicates && self.is_duplicate(&Value::Object(merged.clone()), Some(id)) {
            return duplicate();
        }
        self.books.insert(id, merged.clone());
        (200, json!({ "data": merged }))
    }

    fn delete_book(&mut self, id: &str) -> Reply {
        match parse_id(id).and_then(|id| self.books.remove(&id)) {
            Some(_) => (204, Value::Null),
            None => not_found("Book"),
        }
    }

    /// True if another book already has the same title and author.
    fn is_duplicate(&self, candidate: &Value, except: Option<u64>) -> bool {
        let title = candidate.get("titulo").and_then(Value::as_str);
        let author = candidate.get("autor_id").and_then(Value::as_u64);
        let (Some(title), Some(author)) = (title, author) else {
            return false;
        };
        self.books.iter().any(|(id, book)| {
            Some(*id) != except
                && owner_of(book) == Some(author)
                && book.get("titulo").and_then(Value::as_str) == Some(title)
        })
    }

    fn validate_book(&self, body: &Value, partial: bool) -> Result<(), Record> {
        let Some(fields) = body.as_object() else {
            return Err(error_map("payload", "The payload must be a JSON object."));
        };
        let mut errors = Record::new();

        match fields.get("titulo") {
            None | Some(Value::Null) if !partial => {
                push(&mut errors, "titulo", "The titulo field is required.");
            }
            None => {}
            Some(Value::String(title)) => {
                let len = title.trim().chars().count();
                if len == 0 {
                    push(&mut errors, "titulo", "The titulo field is required.");
                } else if len > 255 {
                    push(&mut errors, "titulo", "The titulo may not be greater than 255 characters.");
                }
            }
            Some(_) => push(&mut errors, "titulo", "The titulo must be a string."),
        }

        match fields.get("autor_id") {
            None | Some(Value::Null) if !partial => {
                push(&mut errors, "autor_id", "The autor_id field is required.");
            }
            None => {}
            Some(value) => {
                if !value.as_u64().is_some_and(|id| self.authors.contains_key(&id)) {
                    push(&mut errors, "autor_id", "The selected autor_id is invalid.");
                }
            }
        }

        if let Some(year) = fields.get("ano_publicacao").filter(|v| !v.is_null()) {
            let current = i64::from(Utc::now().year());
            if !year.as_i64().is_some_and(|y| (1450..=current).contains(&y)) {
                push(
                    &mut errors,
                    "ano_publicacao",
                    &format!("The ano_publicacao must be between 1450 and {current}."),
                );
            }
        }

        if let Some(pages) = fields.get("paginas").filter(|v| !v.is_null())
            && !pages.as_i64().is_some_and(|p| p >= 1)
        {
            push(&mut errors, "paginas", "The paginas must be at least 1.");
        }

        if let Some(genre) = fields.get("genero").filter(|v| !v.is_null())
            && !genre.as_str().is_some_and(|g| g.chars().count() <= 100)
        {
            push(&mut errors, "genero", "The genero must be a string of at most 100 characters.");
        }

        if let Some(available) = fields.get("disponivel").filter(|v| !v.is_null())
            && !available.is_boolean()
        {
            push(&mut errors, "disponivel", "The disponivel field must be true or false.");
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

fn validate_author(body: &Value, partial: bool) -> Result<(), Record> {
    let Some(fields) = body.as_object() else {
        return Err(error_map("payload", "The payload must be a JSON object."));
    };
    let mut errors = Record::new();

    match fields.get("nome") {
        None | Some(Value::Null) if !partial => {
            push(&mut errors, "nome", "The nome field is required.");
        }
        None => {}
        Some(Value::String(name)) => {
            let len = name.trim().chars().count();
            if len == 0 {
                push(&mut errors, "nome", "The nome field is required.");
            } else if len < 2 {
                push(&mut errors, "nome", "The nome must be at least 2 characters.");
            } else if len > 255 {
                push(&mut errors, "nome", "The nome may not be greater than 255 characters.");
            }
        }
        Some(_) => push(&mut errors, "nome", "The nome must be a string."),
    }

    match fields.get("bio") {
        None | Some(Value::Null) => {}
        Some(Value::String(bio)) if bio.chars().count() > 1000 => {
            push(&mut errors, "bio", "The bio may not be greater than 1000 characters.");
        }
        Some(Value::String(_)) => {}
        Some(_) => push(&mut errors, "bio", "The bio must be a string."),
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn parse_id(raw: &str) -> Option<u64> {
    raw.parse().ok()
}

fn owner_of(book: &Record) -> Option<u64> {
    book.get("autor_id").and_then(Value::as_u64)
}

/// Copies the fields of an object body onto a record, never touching `id`.
fn merge(record: &mut Record, body: &Value) {
    if let Some(fields) = body.as_object() {
        for (key, value) in fields {
            if key != "id" {
                record.insert(key.clone(), value.clone());
            }
        }
    }
}

fn push(errors: &mut Record, field: &str, message: &str) {
    let entry = errors
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(messages) = entry {
        messages.push(Value::from(message));
    }
}

fn error_map(field: &str, message: &str) -> Record {
    let mut errors = Record::new();
    push(&mut errors, field, message);
    errors
}

fn invalid(errors: Record) -> Reply {
    (
        422,
        json!({ "message": "The given data was invalid.", "errors": errors }),
    )
}

fn not_found(resource: &str) -> Reply {
    (404, json!({ "message": format!("{resource} not found.") }))
}

fn duplicate() -> Reply {
    (
        409,
        json!({ "message": "A book with this title already exists for this author." }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_author(library: &MockLibrary, name: &str) -> u64 {
        let (status, body) = library.handle(HttpMethod::Post, "/authors", Some(&json!({"nome": name})));
        assert_eq!(status, 201, "{body}");
        body["data"]["id"].as_u64().unwrap()
    }

    fn create_book(library: &MockLibrary, title: &str, author: u64) -> (u16, Value) {
        library.handle(
            HttpMethod::Post,
            "/books",
            Some(&json!({"titulo": title, "autor_id": author, "paginas": 10})),
        )
    }

    #[test]
    fn test_author_crud() {
        let library = MockLibrary::new();
        let id = create_author(&library, "Machado de Assis");

        let (status, body) = library.handle(HttpMethod::Get, &format!("/authors/{id}"), None);
        assert_eq!(status, 200);
        assert_eq!(body["data"]["nome"], "Machado de Assis");

        let (status, body) = library.handle(
            HttpMethod::Put,
            &format!("/authors/{id}"),
            Some(&json!({"bio": "Novelist"})),
        );
        assert_eq!(status, 200);
        assert_eq!(body["data"]["bio"], "Novelist");
        assert_eq!(body["data"]["nome"], "Machado de Assis");

        let (status, _) = library.handle(HttpMethod::Delete, &format!("/authors/{id}"), None);
        assert_eq!(status, 204);
        assert_eq!(library.author_count(), 0);

        let (status, _) = library.handle(HttpMethod::Get, &format!("/authors/{id}"), None);
        assert_eq!(status, 404);
    }

    #[test]
    fn test_author_validation() {
        let library = MockLibrary::new();
        for payload in [
            json!({"nome": ""}),
            json!({"nome": "A"}),
            json!({"nome": "A".repeat(256)}),
            json!({"nome": "Valid", "bio": "B".repeat(1001)}),
            json!({"nome": 123, "bio": true}),
            json!({}),
        ] {
            let (status, body) = library.handle(HttpMethod::Post, "/authors", Some(&payload));
            assert_eq!(status, 422, "payload {payload} was accepted");
            assert!(body["errors"].is_object());
        }
        assert_eq!(library.author_count(), 0);
    }

    #[test]
    fn test_delete_author_with_books_conflicts() {
        let library = MockLibrary::new();
        let author = create_author(&library, "Clarice Lispector");
        let (status, _) = create_book(&library, "A Hora da Estrela", author);
        assert_eq!(status, 201);

        let (status, _) = library.handle(HttpMethod::Delete, &format!("/authors/{author}"), None);
        assert_eq!(status, 409);

        let (status, body) =
            library.handle(HttpMethod::Get, &format!("/authors/{author}/books"), None);
        assert_eq!(status, 200);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_book_rules() {
        let library = MockLibrary::new();
        let author = create_author(&library, "Jorge Amado");

        assert_eq!(create_book(&library, "Capitaes da Areia", author).0, 201);
        assert_eq!(create_book(&library, "Capitaes da Areia", author).0, 409);
        assert_eq!(create_book(&library, "Orphan", 99_999).0, 422);

        let (status, _) = library.handle(
            HttpMethod::Post,
            "/books",
            Some(&json!({"titulo": "Old", "autor_id": author, "ano_publicacao": 1400})),
        );
        assert_eq!(status, 422);

        let (status, body) = library.handle(HttpMethod::Get, "/books?q=areia", None);
        assert_eq!(status, 200);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_routes_and_methods() {
        let library = MockLibrary::new();
        assert_eq!(library.handle(HttpMethod::Get, "/publishers", None).0, 404);
        assert_eq!(library.handle(HttpMethod::Delete, "/books", None).0, 405);
        assert_eq!(library.handle(HttpMethod::Get, "/books/abc", None).0, 404);
    }

    #[test]
    fn test_route_faults() {
        let library = MockLibrary::with_faults(Faults {
            missing_routes: vec!["/books".to_string()],
            internal_errors: vec!["/authors".to_string()],
            ..Faults::default()
        });
        assert_eq!(library.handle(HttpMethod::Get, "/books?q=x", None).0, 404);
        assert_eq!(library.handle(HttpMethod::Get, "/books/1", None).0, 404);
        assert_eq!(library.handle(HttpMethod::Get, "/authors/1/books", None).0, 500);
        assert_eq!(library.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_refused_connections() {
        let library = MockLibrary::with_faults(Faults {
            refuse_connections: true,
            ..Faults::default()
        });
        let failure = library
            .send(HttpMethod::Get, "/authors", None)
            .await
            .unwrap_err();
        assert_eq!(
            failure.code,
            Some(crate::client::NetworkErrorCode::ConnectionRefused)
        );
        assert!(library.requests().is_empty());
    }
}
