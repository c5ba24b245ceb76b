//! Testing utilities: an in-memory reference implementation of the library
//! API that the suites can be run against without a network.

pub mod mock_library;

pub use mock_library::{Faults, MockLibrary, RecordedRequest};
