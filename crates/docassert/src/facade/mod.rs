//! The chainable condition, require and assert façades.
//!
//! The three types share one `Checker`; they only differ in the [`Mode`] it
//! runs with. Every predicate awaits its round-trips and hands back the same
//! façade, so checks chain left to right:
//!
//! ```rust
//! use bson::doc;
//! use docassert::{bind, MemoryCollection, RecordingReporter};
//!
//! # async fn example() {
//! let people = MemoryCollection::new("person");
//! let t = RecordingReporter::new();
//!
//! bind(&t, &people)
//!     .condition()
//!     .empty()
//!     .await
//!     .exists([doc! { "name": "Alice", "age": 22 }])
//!     .await;
//!
//! assert_eq!(people.len(), 1);
//! # }
//! ```

#![allow(clippy::future_not_send, reason = "checks are awaited inline by the test that owns the reporter")]


use serde::Serialize;

use crate::{
    check::{Checker, Mode},
    DocumentCollection,
    Reporter,
};

/// Prepares the state a test starts from.
///
/// Missing documents are written and `empty` drops the collection. A
/// document that must not exist is only verified: `not_exists` stops the test
/// when it finds one and never deletes it. Any failure stops the test.
#[derive(Debug)]
pub struct Condition<'a, C: ?Sized, R: ?Sized> {
    /// Shared evaluator, running in [`Mode::Condition`].
    checker: Checker<'a, C, R>,
}

impl<'a, C, R> Condition<'a, C, R>
where
    C: DocumentCollection + ?Sized,
    R: Reporter + ?Sized,
{
    pub(crate) const fn new(collection: &'a C, reporter: &'a R) -> Self {
        Self {
            checker: Checker::new(collection, reporter, Mode::Condition),
        }
    }

    /// Returns [`Mode::Condition`].
    pub const fn mode(&self) -> Mode { self.checker.mode() }

    /// Makes sure a document matching each filter exists.
    ///
    /// Each filter is looked up; when nothing matches, the filter itself is
    /// upserted as the document. A failed lookup or write stops the test.
    /// Calling it twice with the same filter leaves a single document.
    pub async fn exists<I, T>(&self, filters: I) -> &Self
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        self.checker.exists(filters).await;
        self
    }

    /// Stops the test if any filter matches a document. Nothing is deleted.
    pub async fn not_exists<I, T>(&self, filters: I) -> &Self
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        self.checker.not_exists(filters).await;
        self
    }

    /// Drops the collection. A failed drop stops the test.
    pub async fn empty(&self) -> &Self {
        self.checker.empty().await;
        self
    }
}

/// Checks state mid-test; the first mismatch stops the test.
#[derive(Debug)]
pub struct Require<'a, C: ?Sized, R: ?Sized> {
    /// Shared evaluator, running in [`Mode::Require`].
    checker: Checker<'a, C, R>,
}

impl<'a, C, R> Require<'a, C, R>
where
    C: DocumentCollection + ?Sized,
    R: Reporter + ?Sized,
{
    pub(crate) const fn new(collection: &'a C, reporter: &'a R) -> Self {
        Self {
            checker: Checker::new(collection, reporter, Mode::Require),
        }
    }

    /// Returns [`Mode::Require`].
    pub const fn mode(&self) -> Mode { self.checker.mode() }

    /// Stops the test unless every filter matches a document.
    ///
    /// Filters are checked in order; the ones after the first miss are not
    /// looked up. The collection is never modified.
    pub async fn exists<I, T>(&self, filters: I) -> &Self
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        self.checker.exists(filters).await;
        self
    }

    /// Stops the test if any filter matches a document.
    pub async fn not_exists<I, T>(&self, filters: I) -> &Self
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        self.checker.not_exists(filters).await;
        self
    }

    /// Stops the test unless the collection holds no document.
    pub async fn empty(&self) -> &Self {
        self.checker.empty().await;
        self
    }
}

/// Checks post-conditions; mismatches are recorded and the test goes on.
///
/// Every filter is checked and every mismatch reported. The one exception is
/// a failed count in `empty`, which stops the test.
#[derive(Debug)]
pub struct Assert<'a, C: ?Sized, R: ?Sized> {
    /// Shared evaluator, running in [`Mode::Assert`].
    checker: Checker<'a, C, R>,
}

impl<'a, C, R> Assert<'a, C, R>
where
    C: DocumentCollection + ?Sized,
    R: Reporter + ?Sized,
{
    pub(crate) const fn new(collection: &'a C, reporter: &'a R) -> Self {
        Self {
            checker: Checker::new(collection, reporter, Mode::Assert),
        }
    }

    /// Returns [`Mode::Assert`].
    pub const fn mode(&self) -> Mode { self.checker.mode() }

    /// Records a failure for every filter that matches no document.
    pub async fn exists<I, T>(&self, filters: I) -> &Self
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        self.checker.exists(filters).await;
        self
    }

    /// Records a failure for every filter that matches a document.
    pub async fn not_exists<I, T>(&self, filters: I) -> &Self
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        self.checker.not_exists(filters).await;
        self
    }

    /// Records a failure, with the observed count, unless the collection is
    /// empty.
    pub async fn empty(&self) -> &Self {
        self.checker.empty().await;
        self
    }
}
