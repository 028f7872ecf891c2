//! Pairing a collection with the reporter of the running test.

use crate::{Assert, Condition, DocumentCollection, Reporter, Require};

/// A collection paired with the reporter of the running test.
///
/// This is the entry point of every check: pick a mode with
/// [`condition`](Self::condition), [`require`](Self::require) or
/// [`assert`](Self::assert), then chain predicates on the façade it returns.
/// Binding is free; nothing is validated until a predicate runs.
///
/// # Example
///
/// ```rust
/// use bson::doc;
/// use docassert::{bind, of_id, MemoryCollection, TestReporter};
///
/// # async fn example() {
/// let t = TestReporter::new("person_is_created");
/// let people = MemoryCollection::new("person");
/// let person = bind(&t, &people);
///
/// // Precondition
/// person.condition().empty().await.not_exists([of_id("alice")]).await;
///
/// // ... code under test inserts Alice ...
/// # people.insert(doc! { "_id": "alice", "name": "Alice", "age": 24 });
///
/// // Post-condition
/// person
///     .assert()
///     .exists([doc! { "name": "Alice", "age": 24 }])
///     .await
///     .not_exists([doc! { "name": "Bob" }])
///     .await;
/// # }
/// # futures::executor::block_on(example());
/// ```
#[derive(Debug)]
pub struct Binding<'a, C: ?Sized, R: ?Sized> {
    /// The collection every façade checks.
    collection: &'a C,
    /// The sink every façade reports to.
    reporter:   &'a R,
}

impl<C: ?Sized, R: ?Sized> Clone for Binding<'_, C, R> {
    fn clone(&self) -> Self { *self }
}

impl<C: ?Sized, R: ?Sized> Copy for Binding<'_, C, R> {}

impl<'a, C, R> Binding<'a, C, R>
where
    C: DocumentCollection + ?Sized,
    R: Reporter + ?Sized,
{
    /// Binds `collection` to `reporter`.
    pub const fn new(reporter: &'a R, collection: &'a C) -> Self {
        Self {
            collection,
            reporter,
        }
    }

    /// A façade that repairs the collection into the declared state.
    pub const fn condition(&self) -> Condition<'a, C, R> { Condition::new(self.collection, self.reporter) }

    /// A façade that stops the test at the first mismatch.
    pub const fn require(&self) -> Require<'a, C, R> { Require::new(self.collection, self.reporter) }

    /// A façade that records mismatches and lets the test continue.
    pub const fn assert(&self) -> Assert<'a, C, R> { Assert::new(self.collection, self.reporter) }

    /// Name of the bound collection.
    pub fn collection_name(&self) -> &str { self.collection.collection_name() }
}

/// Binds a collection to the reporter of the running test.
///
/// Shorthand for [`Binding::new`].
pub const fn bind<'a, R, C>(reporter: &'a R, collection: &'a C) -> Binding<'a, C, R>
where
    C: DocumentCollection + ?Sized,
    R: Reporter + ?Sized,
{
    Binding::new(reporter, collection)
}
