//! Book suite. It creates its own owning author first so it does not depend
//! on anything the author suite left behind.

use super::{Case, Expectation, PathSpec, PayloadContext, Suite};
use crate::models::{CaseCategory, HttpMethod};
use crate::state::Fixture;
use serde_json::{Value, json};

pub fn suite() -> Suite {
    Suite {
        name: "Book Suite",
        resource: "books",
        cases: CASES,
    }
}

fn owner(ctx: &mut PayloadContext<'_>) -> Value {
    json!({
        "nome": ctx.unique("Book Owner"),
        "bio": "Owner of the books created by the conformance grader",
    })
}

/// A book the contract accepts, owned by the suite's author.
fn valid_book(ctx: &mut PayloadContext<'_>, prefix: &str) -> Value {
    json!({
        "titulo": ctx.unique(prefix),
        "autor_id": ctx.id(Fixture::BookAuthor),
        "ano_publicacao": 2020,
        "paginas": 300,
        "genero": "Romance",
        "disponivel": true,
    })
}

fn new_book(ctx: &mut PayloadContext<'_>) -> Value {
    valid_book(ctx, "Test Book")
}

fn empty_title(ctx: &mut PayloadContext<'_>) -> Value {
    json!({
        "titulo": "",
        "autor_id": ctx.id(Fixture::BookAuthor),
    })
}

fn unknown_author(ctx: &mut PayloadContext<'_>) -> Value {
    let mut book = valid_book(ctx, "Orphan Book");
    book["autor_id"] = Value::from(ctx.missing_id());
    book
}

fn ancient_year(ctx: &mut PayloadContext<'_>) -> Value {
    let mut book = valid_book(ctx, "Ancient Book");
    book["ano_publicacao"] = json!(1400);
    book
}

fn zero_pages(ctx: &mut PayloadContext<'_>) -> Value {
    let mut book = valid_book(ctx, "Empty Book");
    book["paginas"] = json!(0);
    book
}

fn duplicate_seed(ctx: &mut PayloadContext<'_>) -> Value {
    valid_book(ctx, "Duplicate Book")
}

fn updated_book(ctx: &mut PayloadContext<'_>) -> Value {
    json!({
        "titulo": ctx.unique("Updated Book"),
        "ano_publicacao": 2021,
        "paginas": 400,
        "disponivel": false,
    })
}

fn negative_pages(_: &mut PayloadContext<'_>) -> Value {
    json!({ "paginas": -5 })
}

static CASES: &[Case] = &[
    Case {
        id: "books.create_owner",
        label: "Create author for books",
        category: CaseCategory::Crud,
        method: HttpMethod::Post,
        path: PathSpec::Static("/authors"),
        payload: Some(owner),
        expectation: Expectation::Created(Fixture::BookAuthor),
        weight: 5,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "books.list",
        label: "List books",
        category: CaseCategory::Listing,
        method: HttpMethod::Get,
        path: PathSpec::Static("/books"),
        payload: None,
        expectation: Expectation::ListShape,
        weight: 15,
        partial: 5,
        requires: &[],
    },
    Case {
        id: "books.sample_fields",
        label: "Book record fields",
        category: CaseCategory::Listing,
        method: HttpMethod::Get,
        path: PathSpec::Static("/books"),
        payload: None,
        expectation: Expectation::SampleFields(&["id", "titulo", "autor_id"]),
        weight: 10,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "books.search",
        label: "Search books by title",
        category: CaseCategory::Listing,
        method: HttpMethod::Get,
        path: PathSpec::Static("/books?q=teste"),
        payload: None,
        expectation: Expectation::Status(200),
        weight: 10,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "books.create",
        label: "Create book",
        category: CaseCategory::Crud,
        method: HttpMethod::Post,
        path: PathSpec::Static("/books"),
        payload: Some(new_book),
        expectation: Expectation::Created(Fixture::Book),
        weight: 20,
        partial: 10,
        requires: &[Fixture::BookAuthor],
    },
    Case {
        id: "books.validate.empty_title",
        label: "Empty title rejected",
        category: CaseCategory::Validation,
        method: HttpMethod::Post,
        path: PathSpec::Static("/books"),
        payload: Some(empty_title),
        expectation: Expectation::Rejected,
        weight: 15,
        partial: 5,
        requires: &[],
    },
    Case {
        id: "books.validate.unknown_author",
        label: "Unknown author rejected",
        category: CaseCategory::Validation,
        method: HttpMethod::Post,
        path: PathSpec::Static("/books"),
        payload: Some(unknown_author),
        expectation: Expectation::Rejected,
        weight: 15,
        partial: 5,
        requires: &[],
    },
    Case {
        id: "books.validate.ancient_year",
        label: "Publication year before 1450 rejected",
        category: CaseCategory::Validation,
        method: HttpMethod::Post,
        path: PathSpec::Static("/books"),
        payload: Some(ancient_year),
        expectation: Expectation::Rejected,
        weight: 10,
        partial: 2,
        requires: &[Fixture::BookAuthor],
    },
    Case {
        id: "books.validate.zero_pages",
        label: "Zero pages rejected",
        category: CaseCategory::Validation,
        method: HttpMethod::Post,
        path: PathSpec::Static("/books"),
        payload: Some(zero_pages),
        expectation: Expectation::Rejected,
        weight: 10,
        partial: 2,
        requires: &[Fixture::BookAuthor],
    },
    Case {
        id: "books.duplicate",
        label: "Duplicate title for the same author",
        category: CaseCategory::Business,
        method: HttpMethod::Post,
        path: PathSpec::Static("/books"),
        payload: Some(duplicate_seed),
        expectation: Expectation::DuplicateConflict(Fixture::DuplicateBook),
        weight: 20,
        partial: 5,
        requires: &[Fixture::BookAuthor],
    },
    Case {
        id: "books.show",
        label: "Show book",
        category: CaseCategory::Crud,
        method: HttpMethod::Get,
        path: PathSpec::Fixture("/books/{id}", Fixture::Book),
        payload: None,
        expectation: Expectation::Fetched(Fixture::Book),
        weight: 15,
        partial: 5,
        requires: &[],
    },
    Case {
        id: "books.show_missing",
        label: "Show missing book",
        category: CaseCategory::Crud,
        method: HttpMethod::Get,
        path: PathSpec::Missing("/books/{id}"),
        payload: None,
        expectation: Expectation::NotFound,
        weight: 10,
        partial: 2,
        requires: &[],
    },
    Case {
        id: "books.update",
        label: "Update book",
        category: CaseCategory::Crud,
        method: HttpMethod::Put,
        path: PathSpec::Fixture("/books/{id}", Fixture::Book),
        payload: Some(updated_book),
        expectation: Expectation::Updated,
        weight: 15,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "books.update_missing",
        label: "Update missing book",
        category: CaseCategory::Crud,
        method: HttpMethod::Put,
        path: PathSpec::Missing("/books/{id}"),
        payload: Some(updated_book),
        expectation: Expectation::NotFound,
        weight: 10,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "books.validate.negative_pages",
        label: "Negative pages rejected on update",
        category: CaseCategory::Validation,
        method: HttpMethod::Put,
        path: PathSpec::Fixture("/books/{id}", Fixture::Book),
        payload: Some(negative_pages),
        expectation: Expectation::Rejected,
        weight: 10,
        partial: 0,
        requires: &[],
    },
    Case {
        id: "books.delete",
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
    },
    Case {
        id: "books.delete_missing",
        label: "Delete missing book",
        category: CaseCategory::Crud,
        method: HttpMethod::Delete,
        path: PathSpec::Missing("/books/{id}"),
        payload: None,
        expectation: Expectation::NotFound,
        weight: 10,
        partial: 0,
        requires: &[],
    },
];
