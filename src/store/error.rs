//! Document store error types.

use thiserror::Error;

/// Errors raised by a document store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    #[error("Database already exists: {0}")]
    DatabaseExists(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Collection already exists: {0}")]
    CollectionExists(String),

    #[error("Attribute already exists: {0}")]
    AttributeExists(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Document already exists: {0}")]
    DocumentExists(String),

    /// Document does not fit the collection schema
    #[error("Invalid document structure: {0}")]
    Structure(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::DatabaseNotFound(_)
                | StoreError::CollectionNotFound(_)
                | StoreError::DocumentNotFound(_)
        )
    }
}

impl From<StoreError> for lattice_core::Error {
    fn from(err: StoreError) -> Self {
        if err.is_not_found() {
            lattice_core::Error::NotFound(err.to_string())
        } else {
            lattice_core::Error::UpstreamStore(err.to_string())
        }
    }
}
