//! Document store interface.
//!
//! The service talks to its database only through [`DocumentStore`]. A store
//! is bound to one default database; collection and document operations act
//! on that database.

mod document;
mod error;
mod memory;

pub use document::{Attribute, AttributeType, Collection, Document, Operator, Query};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;

use async_trait::async_trait;

/// Document database backend.
///
/// Implementations must be safe to share between concurrent requests: one
/// handle serves the whole process.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Name of the database collection operations use
    fn default_database(&self) -> &str;

    /// Namespace prefixed to physical collection names
    fn namespace(&self) -> &str;

    /// Check whether a database exists.
    async fn exists(&self, database: &str) -> StoreResult<bool>;

    /// Create a database.
    ///
    /// Fails with [`StoreError::DatabaseExists`] if it is already there.
    async fn create(&self, database: &str) -> StoreResult<()>;

    /// Get a collection, `Ok(None)` if it does not exist.
    async fn get_collection(&self, name: &str) -> StoreResult<Option<Collection>>;

    /// Create a collection with its whole schema.
    ///
    /// The collection becomes visible with every attribute in place. Fails
    /// with [`StoreError::CollectionExists`] if it is already there, or
    /// [`StoreError::AttributeExists`] if `attributes` repeats a key.
    async fn create_collection(
        &self,
        name: &str,
        attributes: Vec<Attribute>,
    ) -> StoreResult<Collection>;

    /// Add an attribute to a collection's schema.
    async fn create_attribute(&self, collection: &str, attribute: Attribute) -> StoreResult<()>;

    /// Get a document, `Ok(None)` if it does not exist.
    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Store a new document.
    ///
    /// An empty `$id` is replaced by a generated one. The stored document is
    /// returned.
    async fn create_document(&self, collection: &str, document: Document) -> StoreResult<Document>;

    /// Replace a document's permissions and attributes.
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        document: Document,
    ) -> StoreResult<Document>;

    /// Delete a document.
    ///
    /// Fails with [`StoreError::DocumentNotFound`] if there is no such document.
    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()>;

    /// Documents matching every query, in insertion order.
    async fn find(&self, collection: &str, queries: &[Query]) -> StoreResult<Vec<Document>>;
}
