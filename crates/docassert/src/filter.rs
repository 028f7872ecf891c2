//! Helpers for building document filters.

use bson::{Bson, Document};
use serde::Serialize;

use crate::{DocAssertError, Result};

/// Name of the primary key field of every MongoDB document.
pub const ID_FIELD: &str = "_id";

/// Returns a filter matching the document whose `_id` equals `id`.
///
/// # Example
///
/// ```rust
/// use bson::doc;
/// use docassert::of_id;
///
/// assert_eq!(of_id("user-123"), doc! { "_id": "user-123" });
/// assert_eq!(of_id(42_i64), doc! { "_id": 42_i64 });
/// ```
pub fn of_id<I>(id: I) -> Document
where
    I: Into<Bson>,
{
    let mut filter = Document::new();
    filter.insert(ID_FIELD, id);
    filter
}

/// Encodes any serializable value into a filter document.
///
/// Accepts BSON documents, `#[derive(Serialize)]` structs, JSON objects and
/// maps. Values that encode to something other than a document (numbers,
/// strings, arrays) are rejected.
///
/// # Errors
///
/// Returns [`DocAssertError::Encode`] when serialization fails and
/// [`DocAssertError::NotADocument`] when the value is not a document.
pub fn to_filter<T>(value: &T) -> Result<Document>
where
    T: Serialize + ?Sized,
{
    match bson::to_bson(value)? {
        Bson::Document(filter) => Ok(filter),
        other => {
            Err(DocAssertError::NotADocument {
                element_type: other.element_type(),
            })
        },
    }
}

/// Returns true when `value` is a document made only of `$` operators, such
/// as `{ "$gt": 18 }`.
pub fn is_operator_document(value: &Bson) -> bool {
    value
        .as_document()
        .is_some_and(|doc| !doc.is_empty() && doc.keys().all(|key| key.starts_with('$')))
}

/// The plain equality clauses of a filter.
///
/// Drops top-level operators (`$or`, ...) and fields compared through
/// operators. What is left is what an upsert copies into a new document.
pub fn equality_fields(filter: &Document) -> Document {
    filter
        .iter()
        .filter(|&(key, value)| !key.starts_with('$') && !is_operator_document(value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
