//! Author suite: listing, creation, validation, lookup, update and the
//! delete-with-books rule.

use super::{Case, Expectation, PathSpec, PayloadContext, Suite};
use crate::models::{CaseCategory, HttpMethod};
use crate::state::Fixture;
use serde_json::{Value, json};

pub fn suite() -> Suite {
    Suite {
        name: "Author Suite",
        resource: "authors",
        cases: CASES,
    }
}

fn new_author(ctx: &mut PayloadContext<'_>) -> Value {
    json!({
        "nome": ctx.unique("Test Author"),
        "bio": "Author created by the conformance grader",
    })
}

fn empty_name(_: &mut PayloadContext<'_>) -> Value {
    json!({ "nome": "" })
}

fn short_name(_: &mut PayloadContext<'_>) -> Value {
    json!({ "nome": "A" })
}

fn long_name(_: &mut PayloadContext<'_>) -> Value {
    json!({ "nome": "A".repeat(256) })
}

fn long_bio(ctx: &mut PayloadContext<'_>) -> Value {
    json!({
        "nome": ctx.unique("Bio Length Check"),
        "bio": "B".repeat(1001),
    })
}

fn wrong_types(_: &mut PayloadContext<'_>) -> Value {
    json!({ "nome": 123, "bio": true })
}

fn empty_payload(_: &mut PayloadContext<'_>) -> Value {
    json!({})
}

fn updated_author(ctx: &mut PayloadContext<'_>) -> Value {
    json!({
        "nome": ctx.unique("Updated Author"),
        "bio": "Bio updated by the conformance grader",
    })
}

fn dependent_book(ctx: &mut PayloadContext<'_>) -> Value {
    json!({
        "titulo": ctx.unique("Blocking Book"),
        "autor_id": ctx.id(Fixture::Author),
        "ano_publicacao": 2020,
        "paginas": 120,
        "genero": "Romance",
        "disponivel": true,
    })
}

static CASES: &[Case] = &[
    Case {
        id: "authors.list",
        label: "List authors",
        category: CaseCategory::Listing,
        method: HttpMethod::Get,
        path: PathSpec::Static("/authors"),
        payload: None,
        expectation: Expectation::ListShape,
        weight: 15,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "authors.sample_fields",
        label: "Author record fields",
        category: CaseCategory::Listing,
        method: HttpMethod::Get,
        path: PathSpec::Static("/authors"),
        payload: None,
        expectation: Expectation::SampleFields(&["id", "nome"]),
        weight: 10,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "authors.create",
        label: "Create author",
        category: CaseCategory::Crud,
        method: HttpMethod::Post,
        path: PathSpec::Static("/authors"),
        payload: Some(new_author),
        expectation: Expectation::Created(Fixture::Author),
        weight: 20,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "authors.validate.empty_name",
        label: "Empty name rejected",
        category: CaseCategory::Validation,
        method: HttpMethod::Post,
        path: PathSpec::Static("/authors"),
        payload: Some(empty_name),
        expectation: Expectation::Rejected,
        weight: 15,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "authors.validate.short_name",
        label: "Single-character name rejected",
        category: CaseCategory::Validation,
        method: HttpMethod::Post,
        path: PathSpec::Static("/authors"),
        payload: Some(short_name),
        expectation: Expectation::Rejected,
        weight: 10,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "authors.validate.long_name",
        label: "Name over 255 characters rejected",
        category: CaseCategory::Validation,
        method: HttpMethod::Post,
        path: PathSpec::Static("/authors"),
        payload: Some(long_name),
        expectation: Expectation::Rejected,
        weight: 10,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "authors.validate.long_bio",
        label: "Bio over 1000 characters rejected",
        category: CaseCategory::Validation,
        method: HttpMethod::Post,
        path: PathSpec::Static("/authors"),
        payload: Some(long_bio),
        expectation: Expectation::Rejected,
        weight: 10,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "authors.validate.wrong_types",
        label: "Wrong field types rejected",
        category: CaseCategory::Validation,
        method: HttpMethod::Post,
        path: PathSpec::Static("/authors"),
        payload: Some(wrong_types),
        expectation: Expectation::Rejected,
        weight: 10,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "authors.validate.empty_payload",
        label: "Empty payload rejected",
        category: CaseCategory::Validation,
        method: HttpMethod::Post,
        path: PathSpec::Static("/authors"),
        payload: Some(empty_payload),
        expectation: Expectation::Rejected,
        weight: 10,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "authors.show",
        label: "Show author",
        category: CaseCategory::Crud,
        method: HttpMethod::Get,
        path: PathSpec::Fixture("/authors/{id}", Fixture::Author),
        payload: None,
        expectation: Expectation::Fetched(Fixture::Author),
        weight: 15,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "authors.show_missing",
        label: "Show missing author",
        category: CaseCategory::Crud,
        method: HttpMethod::Get,
        path: PathSpec::Missing("/authors/{id}"),
        payload: None,
        expectation: Expectation::NotFound,
        weight: 10,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "authors.update",
        label: "Update author",
        category: CaseCategory::Crud,
        method: HttpMethod::Put,
        path: PathSpec::Fixture("/authors/{id}", Fixture::Author),
        payload: Some(updated_author),
        expectation: Expectation::Updated,
        weight: 15,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "authors.update_missing",
        label: "Update missing author",
        category: CaseCategory::Crud,
        method: HttpMethod::Put,
        path: PathSpec::Missing("/authors/{id}"),
        payload: Some(updated_author),
        expectation: Expectation::NotFound,
        weight: 10,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "authors.books",
        label: "Books of author",
        category: CaseCategory::Listing,
        method: HttpMethod::Get,
        path: PathSpec::Fixture("/authors/{id}/books", Fixture::Author),
        payload: None,
        expectation: Expectation::ListShape,
        weight: 15,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "authors.create_dependent_book",
        label: "Create book for author",
        category: CaseCategory::Business,
        method: HttpMethod::Post,
        path: PathSpec::Static("/books"),
        payload: Some(dependent_book),
        expectation: Expectation::Created(Fixture::BlockingBook),
        weight: 5,
        partial: 0,
        requires: &[Fixture::Author],
    },
    Case {
        id: "authors.delete_with_books",
        label: "Delete author with books",
        category: CaseCategory::Business,
        method: HttpMethod::Delete,
        path: PathSpec::Fixture("/authors/{id}", Fixture::Author),
        payload: None,
        expectation: Expectation::Conflict,
        weight: 20,
        partial: 0,
        requires: &[Fixture::BlockingBook],
    },
    Case {
        id: "authors.remove_dependent_book",
        label: "Remove dependent book",
        category: CaseCategory::Business,
        method: HttpMethod::Delete,
        path: PathSpec::Fixture("/books/{id}", Fixture::BlockingBook),
        payload: None,
        expectation: Expectation::Deleted {
            fixture: Fixture::BlockingBook,
            missing_warning: None,
        },
        weight: 5,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "authors.delete",
        label: "Delete author",
        category: CaseCategory::Crud,
        method: HttpMethod::Delete,
        path: PathSpec::Fixture("/authors/{id}", Fixture::Author),
        payload: None,
        expectation: Expectation::Deleted {
            fixture: Fixture::Author,
            missing_warning: None,
        },
        weight: 15,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "authors.delete_missing",
        label: "Delete missing author",
        category: CaseCategory::Crud,
        method: HttpMethod::Delete,
        path: PathSpec::Missing("/authors/{id}"),
        payload: None,
        expectation: Expectation::NotFound,
        weight: 10,
        partial: 0,
        requires: &[],
    },
];
