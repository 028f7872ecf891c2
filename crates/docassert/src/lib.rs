//! Fluent checks on MongoDB collections for integration tests.
//!
//! Bind a collection to the running test with [`bind`], then pick how
//! mismatches are handled:
//!
//! - [`Condition`] prepares a precondition, writing missing documents and
//!   emptying collections; what it cannot fix stops the test.
//! - [`Require`] stops the test at the first mismatch.
//! - [`Assert`] records every mismatch and lets the test continue.
//!
//! Filters are anything that serializes into a BSON document: `doc!`
//! literals, `#[derive(Serialize)]` structs, JSON objects, or [`of_id`].
//!
//! ```rust,no_run
//! use bson::doc;
//! use docassert::{bind, from_client, TestReporter};
//!
//! # async fn example() -> docassert::Result<()> {
//! let t = TestReporter::current();
//! let client = docassert::connect("mongodb://localhost:27017").await?;
//! let people = from_client(&client, "company", "person");
//!
//! bind(&t, &people)
//!     .condition()
//!     .empty()
//!     .await
//!     .exists([doc! { "name": "Alice", "age": 22 }])
//!     .await;
//!
//! // ... code under test ...
//!
//! bind(&t, &people)
//!     .assert()
//!     .exists([doc! { "name": "Alice", "age": 24 }])
//!     .await
//!     .not_exists([doc! { "name": "Bob" }])
//!     .await;
//! # Ok(())
//! # }
//! ```

pub mod binding;
mod check;
pub mod error;
pub mod facade;
pub mod filter;
pub mod handle;
pub mod memory;
pub mod report;

pub use binding::{bind, Binding};
pub use check::Mode;
pub use error::{DocAssertError, Result};
pub use facade::{Assert, Condition, Require};
pub use filter::{of_id, to_filter};
pub use handle::{connect, from_client, DocumentCollection};
pub use memory::{MemoryCollection, Operation, OperationKind};
pub use report::{Channel, Failure, FailureKind, Halted, RecordingReporter, Report, Reporter, TestReporter};
