//! A process-local [`DocumentCollection`] for unit tests.

mod matching;
mod ordering;

use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document};
use tracing::{debug, trace};

use self::matching::matches_filter;
use crate::{
    filter::{equality_fields, ID_FIELD},
    DocAssertError,
    DocumentCollection,
    Result,
};

/// A remote call received by a [`MemoryCollection`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// `find_one_matching` with the given filter.
    FindOne(Document),
    /// `upsert_matching` with the given filter.
    Upsert(Document),
    /// `count_all`.
    Count,
    /// `drop_collection`.
    Drop,
}

/// Operation kinds, used to target injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// `find_one_matching`.
    FindOne,
    /// `upsert_matching`.
    Upsert,
    /// `count_all`.
    Count,
    /// `drop_collection`.
    Drop,
}

impl Operation {
    /// Returns the kind of this operation.
    pub const fn kind(&self) -> OperationKind {
        match *self {
            Self::FindOne(_) => OperationKind::FindOne,
            Self::Upsert(_) => OperationKind::Upsert,
            Self::Count => OperationKind::Count,
            Self::Drop => OperationKind::Drop,
        }
    }

    /// Returns true if this operation can change the collection contents.
    pub const fn is_write(&self) -> bool { matches!(*self, Self::Upsert(_) | Self::Drop) }
}

/// An in-memory document collection.
///
/// Behaves like a MongoDB collection for the four calls the checking façades
/// make, so the whole condition / require / assert machinery can be exercised
/// without a server. On top of that it keeps a journal of every call it
/// received and can be told to fail the next call of a given kind.
///
/// # Example
///
/// ```rust
/// use bson::doc;
/// use docassert::{bind, MemoryCollection, RecordingReporter};
///
/// # async fn example() {
/// let people = MemoryCollection::with_documents("person", [doc! { "name": "Alice", "age": 24 }]);
/// let reporter = RecordingReporter::new();
///
/// bind(&reporter, &people)
///     .assert()
///     .exists([doc! { "name": "Alice" }])
///     .await
///     .not_exists([doc! { "name": "Bob" }])
///     .await;
///
/// assert!(reporter.is_clean());
/// assert_eq!(people.journal().len(), 2);
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryCollection {
    /// Collection name reported in failure messages.
    name:      String,
    /// Stored documents, in insertion order.
    documents: RwLock<Vec<Document>>,
    /// Every call received so far.
    journal:   Mutex<Vec<Operation>>,
    /// Pending injected faults, consumed first-in first-out per kind.
    faults:    Mutex<Vec<(OperationKind, String)>>,
}

impl MemoryCollection {
    /// Creates an empty collection.
    pub fn new<S>(name: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            name:      name.into(),
            documents: RwLock::new(Vec::new()),
            journal:   Mutex::new(Vec::new()),
            faults:    Mutex::new(Vec::new()),
        }
    }

    /// Creates a collection seeded with `documents`.
    ///
    /// Seeding is not journaled. Documents without an `_id` get a fresh
    /// `ObjectId`, as the server would assign one.
    pub fn with_documents<S, I>(name: S, documents: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = Document>,
    {
        let collection = Self::new(name);
        for document in documents {
            collection.insert(document);
        }
        collection
    }

    /// Inserts a document directly, bypassing the journal.
    pub fn insert(&self, document: Document) {
        let document = with_id(document);
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(document);
    }

    /// Returns a snapshot of the stored documents.
    pub fn documents(&self) -> Vec<Document> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no document is stored.
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Returns every call received so far, oldest first.
    pub fn journal(&self) -> Vec<Operation> {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns true if any journaled call could have changed the contents.
    pub fn was_written(&self) -> bool { self.journal().iter().any(Operation::is_write) }

    /// Forgets the calls received so far.
    pub fn clear_journal(&self) {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Makes the next call of `kind` fail with a backend error carrying
    /// `message`. Faults queue up: two calls to `fail_next` fail the next two
    /// calls of that kind.
    pub fn fail_next<S>(&self, kind: OperationKind, message: S)
    where
        S: Into<String>,
    {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((kind, message.into()));
    }

    /// Journals `operation` and returns the fault queued for its kind, if any.
    fn receive(&self, operation: Operation) -> Result<()> {
        let kind = operation.kind();
        trace!("Collection {} received {:?}", self.name, operation);
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(operation);

        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(position) = faults.iter().position(|&(target, _)| target == kind) else {
            return Ok(());
        };
        let (_, message) = faults.remove(position);
        drop(faults);

        debug!("Injected {:?} fault in collection {}: {}", kind, self.name, message);
        Err(DocAssertError::Backend {
            message,
        })
    }
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    fn collection_name(&self) -> &str { &self.name }

    async fn find_one_matching(&self, filter: &Document) -> Result<Option<Document>> {
        self.receive(Operation::FindOne(filter.clone()))?;

        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        for document in documents.iter() {
            if matches_filter(document, filter)? {
                return Ok(Some(document.clone()));
            }
        }
        Ok(None)
    }

    async fn upsert_matching(&self, filter: &Document) -> Result<()> {
        self.receive(Operation::Upsert(filter.clone()))?;

        let mut documents = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        for document in documents.iter() {
            if matches_filter(document, filter)? {
                return Ok(());
            }
        }

        let document = with_id(seed_from_filter(filter)?);
        debug!("Inserted {} into collection {}", document, self.name);
        documents.push(document);
        Ok(())
    }

    async fn count_all(&self) -> Result<u64> {
        self.receive(Operation::Count)?;
        Ok(self.len() as u64)
    }

    async fn drop_collection(&self) -> Result<()> {
        self.receive(Operation::Drop)?;
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

/// Builds the document an upsert inserts: the equality parts of the filter,
/// with dotted paths expanded into embedded documents.
fn seed_from_filter(filter: &Document) -> Result<Document> {
    let mut seed = Document::new();
    for (key, value) in equality_fields(filter) {
        set_path(&mut seed, &key, value)?;
    }
    Ok(seed)
}

/// Sets `value` at a dotted `path`, creating embedded documents on the way.
fn set_path(document: &mut Document, path: &str, value: Bson) -> Result<()> {
    let Some((head, rest)) = path.split_once('.') else {
        document.insert(path, value);
        return Ok(());
    };

    let child = document
        .entry(head.to_owned())
        .or_insert_with(|| Bson::Document(Document::new()));
    match *child {
        Bson::Document(ref mut embedded) => set_path(embedded, rest, value),
        _ => {
            Err(DocAssertError::Backend {
                message: format!("cannot create field '{rest}' inside non-document '{head}'"),
            })
        },
    }
}

/// Puts an `_id` first, generating one when the document has none.
fn with_id(document: Document) -> Document {
    if document.contains_key(ID_FIELD) {
        return document;
    }

    let mut identified = Document::new();
    identified.insert(ID_FIELD, ObjectId::new());
    for (key, value) in document {
        identified.insert(key, value);
    }
    identified
}
