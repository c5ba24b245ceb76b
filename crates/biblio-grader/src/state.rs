//! Per-run fixture identifiers.
//!
//! Cases that create records capture the server-assigned id into a named
//! [`Fixture`] slot; later cases read it back to build their paths and
//! payloads. A [`RunState`] belongs to exactly one run and is threaded through
//! the suites as `&mut`.

use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt;

/// Named slot for an identifier created during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Fixture {
    /// Author created by the author suite.
    Author,
    /// Book that keeps [`Fixture::Author`] from being deleted.
    BlockingBook,
    /// Author owned by the book suite.
    BookAuthor,
    /// Book created by the book suite.
    Book,
    /// First record of the duplicate title+author probe.
    DuplicateBook,
}

impl Fixture {
    /// Resource collection the fixture lives in, relative to the API root.
    pub fn collection(self) -> &'static str {
        match self {
            Fixture::Author | Fixture::BookAuthor => "/authors",
            Fixture::BlockingBook | Fixture::Book | Fixture::DuplicateBook => "/books",
        }
    }

    /// Cleanup order: books before the authors that own them.
    pub const CLEANUP_ORDER: [Fixture; 5] = [
        Fixture::BlockingBook,
        Fixture::DuplicateBook,
        Fixture::Book,
        Fixture::Author,
        Fixture::BookAuthor,
    ];
}

impl fmt::Display for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Fixture::Author => "author",
            Fixture::BlockingBook => "blocking_book",
            Fixture::BookAuthor => "book_author",
            Fixture::Book => "book",
            Fixture::DuplicateBook => "duplicate_book",
        };
        f.write_str(name)
    }
}

/// Fixture identifiers captured so far in one run.
#[derive(Debug, Default, Clone)]
pub struct RunState {
    ids: BTreeMap<Fixture, u64>,
    strays: Vec<(&'static str, u64)>,
    tag: String,
    sequence: u64,
}

impl RunState {
    /// Creates an empty state tagged with the current time, so names generated
    /// by different runs against the same API do not collide.
    pub fn new() -> Self {
        Self::with_tag(format!("{:x}", Utc::now().timestamp_millis()))
    }

    /// Creates an empty state with a fixed tag.
    pub fn with_tag(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Returns the id held for `fixture`, if any.
    pub fn get(&self, fixture: Fixture) -> Option<u64> {
        self.ids.get(&fixture).copied()
    }

    /// Stores `id` for `fixture`, replacing any previous value.
    pub fn set(&mut self, fixture: Fixture, id: u64) {
        self.ids.insert(fixture, id);
    }

    /// Removes and returns the id held for `fixture`.
    pub fn take(&mut self, fixture: Fixture) -> Option<u64> {
        self.ids.remove(&fixture)
    }

    /// First fixture in `required` that is not held.
    pub fn first_missing(&self, required: &[Fixture]) -> Option<Fixture> {
        required.iter().copied().find(|f| !self.ids.contains_key(f))
    }

    /// Returns a suffix unique within this run (and across runs when tagged).
    pub fn unique_suffix(&mut self) -> String {
        self.sequence += 1;
        if self.tag.is_empty() {
            self.sequence.to_string()
        } else {
            format!("{}-{}", self.tag, self.sequence)
        }
    }

    /// Remembers a record created by a request that should have been refused.
    pub fn track_stray(&mut self, collection: &'static str, id: u64) {
        self.strays.push((collection, id));
    }

    /// Removes and returns the stray ids recorded for `collection`.
    pub fn take_strays(&mut self, collection: &str) -> Vec<u64> {
        let (taken, kept): (Vec<_>, Vec<_>) = self
            .strays
            .drain(..)
            .partition(|(c, _)| *c == collection);
        self.strays = kept;
        taken.into_iter().map(|(_, id)| id).collect()
    }

    /// Returns true if no fixture or stray record is held.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.strays.is_empty()
    }
}
