//! The seam between the checking façades and the remote collection.

use async_trait::async_trait;
use bson::{doc, Document};
use mongodb::{options::ClientOptions, Client};
use tracing::{debug, trace};

use crate::{
    filter::{equality_fields, ID_FIELD},
    Result,
};

/// Driver application name reported to the server by [`connect`].
pub const APP_NAME: &str = "docassert";

/// The remote operations a checking façade needs from a collection.
///
/// Every method is exactly one round-trip to the remote service. The
/// façades never call anything else, so implementing this trait is enough to
/// run them against another backend.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Name of the collection, used in failure messages.
    fn collection_name(&self) -> &str;

    /// Find one document matching `filter`.
    async fn find_one_matching(&self, filter: &Document) -> Result<Option<Document>>;

    /// Make sure a document matching `filter` exists, inserting the filter
    /// itself as the document when nothing matches. Existing matches are
    /// left untouched.
    async fn upsert_matching(&self, filter: &Document) -> Result<()>;

    /// Count every document in the collection.
    async fn count_all(&self) -> Result<u64>;

    /// Drop the collection and all of its documents.
    async fn drop_collection(&self) -> Result<()>;
}

#[async_trait]
impl DocumentCollection for mongodb::Collection<Document> {
    fn collection_name(&self) -> &str { self.name() }

    async fn find_one_matching(&self, filter: &Document) -> Result<Option<Document>> {
        trace!("Finding one document in {}: {}", self.name(), filter);
        Ok(self.find_one(filter.clone()).await?)
    }

    async fn upsert_matching(&self, filter: &Document) -> Result<()> {
        trace!("Upserting document in {}: {}", self.name(), filter);
        // The server seeds the new document from the filter's equality
        // clauses; `$setOnInsert` repeats them minus the immutable `_id`,
        // which stays when it is all there is so the operand is never empty.
        let seed = upsert_seed(filter);
        let result = self
            .update_one(filter.clone(), doc! { "$setOnInsert": seed })
            .upsert(true)
            .await?;
        debug!(
            "Upsert in {} matched {} document(s), upserted id {:?}",
            self.name(),
            result.matched_count,
            result.upserted_id
        );
        Ok(())
    }

    async fn count_all(&self) -> Result<u64> {
        trace!("Counting documents in collection: {}", self.name());
        Ok(self.count_documents(doc! {}).await?)
    }

    async fn drop_collection(&self) -> Result<()> {
        trace!("Dropping collection: {}", self.name());
        self.drop().await?;
        Ok(())
    }
}

/// The `$setOnInsert` operand for an upsert on `filter`.
fn upsert_seed(filter: &Document) -> Document {
    let mut seed = equality_fields(filter);
    if seed.len() > 1 {
        seed.remove(ID_FIELD);
    }
    seed
}

/// Shortcut for reaching a collection when only the client is at hand.
///
/// # Example
///
/// ```rust,no_run
/// # async fn example() -> docassert::Result<()> {
/// let client = docassert::connect("mongodb://localhost:27017").await?;
/// let people = docassert::from_client(&client, "company", "person");
/// assert_eq!(people.name(), "person");
/// # Ok(())
/// # }
/// ```
pub fn from_client(client: &Client, database: &str, collection: &str) -> mongodb::Collection<Document> {
    client.database(database).collection(collection)
}

/// Creates a MongoDB client from a connection string.
///
/// Pool sizes, timeouts and the rest of the driver configuration come from
/// the connection string options. The client identifies itself with
/// [`APP_NAME`] unless the string already sets `appName`.
///
/// # Errors
///
/// Returns [`crate::DocAssertError::Driver`] if the string cannot be parsed or
/// the client cannot be built. No connection is attempted here.
pub async fn connect<S>(connection_string: S) -> Result<Client>
where
    S: AsRef<str>,
{
    let mut options = ClientOptions::parse(connection_string.as_ref()).await?;
    if options.app_name.is_none() {
        options.app_name = Some(APP_NAME.to_owned());
    }

    debug!("Creating MongoDB client for hosts {:?}", options.hosts);
    Ok(Client::with_options(options)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_does_not_touch_the_network() {
        let client = connect("mongodb://localhost:27017/?appName=suite")
            .await
            .unwrap();
        let people = from_client(&client, "company", "person");
        assert_eq!(people.collection_name(), "person");
        assert_eq!(people.namespace().db, "company");
    }

    #[test]
    fn test_upsert_seed_drops_id_next_to_other_fields() {
        let seed = upsert_seed(&doc! { "_id": "alice", "name": "Alice", "age": { "$gt": 18 } });
        assert_eq!(seed, doc! { "name": "Alice" });
    }

    #[test]
    fn test_upsert_seed_keeps_lone_id() {
        assert_eq!(upsert_seed(&doc! { "_id": "bob" }), doc! { "_id": "bob" });
        assert_eq!(
            upsert_seed(&doc! { "_id": "bob", "age": { "$gt": 18 } }),
            doc! { "_id": "bob" }
        );
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_uri() {
        let err = connect("postgres://localhost").await.unwrap_err();
        assert!(matches!(err, crate::DocAssertError::Driver { .. }));
    }
}
