//! In-memory document store.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Attribute, Collection, Document, DocumentStore, Query, StoreError, StoreResult};

#[derive(Debug)]
struct CollectionState {
    schema: Collection,
    /// Insertion order
    documents: Vec<Document>,
}

impl CollectionState {
    fn position(&self, id: &str) -> Option<usize> {
        self.documents.iter().position(|d| d.id == id)
    }
}

type Databases = HashMap<String, HashMap<String, CollectionState>>;

/// Document store kept in process memory.
///
/// Writers are serialized and readers run concurrently behind one
/// `parking_lot::RwLock`; no lock is held across an await point.
pub struct MemoryStore {
    default_database: String,
    namespace: String,
    databases: RwLock<Databases>,
}

impl MemoryStore {
    pub fn new(default_database: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            default_database: default_database.into(),
            namespace: namespace.into(),
            databases: RwLock::new(HashMap::new()),
        }
    }

    fn physical(&self, collection: &str) -> String {
        format!("{}_{}", self.namespace, collection)
    }

    fn read_collection<T>(
        &self,
        collection: &str,
        f: impl FnOnce(&CollectionState) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let databases = self.databases.read();
        let collections = databases
            .get(&self.default_database)
            .ok_or_else(|| StoreError::DatabaseNotFound(self.default_database.clone()))?;
        let state = collections
            .get(&self.physical(collection))
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        f(state)
    }

    fn write_collection<T>(
        &self,
        collection: &str,
        f: impl FnOnce(&mut CollectionState) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut databases = self.databases.write();
        let collections = databases
            .get_mut(&self.default_database)
            .ok_or_else(|| StoreError::DatabaseNotFound(self.default_database.clone()))?;
        let state = collections
            .get_mut(&self.physical(collection))
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        f(state)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("default", "ns")
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn default_database(&self) -> &str {
        &self.default_database
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn exists(&self, database: &str) -> StoreResult<bool> {
        Ok(self.databases.read().contains_key(database))
    }

    async fn create(&self, database: &str) -> StoreResult<()> {
        let mut databases = self.databases.write();
        if databases.contains_key(database) {
            return Err(StoreError::DatabaseExists(database.to_string()));
        }
        databases.insert(database.to_string(), HashMap::new());
        info!(database, "Database created");
        Ok(())
    }

    async fn get_collection(&self, name: &str) -> StoreResult<Option<Collection>> {
        match self.read_collection(name, |state| Ok(state.schema.clone())) {
            Ok(collection) => Ok(Some(collection)),
            Err(StoreError::CollectionNotFound(_) | StoreError::DatabaseNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_collection(
        &self,
        name: &str,
        attributes: Vec<Attribute>,
    ) -> StoreResult<Collection> {
        let mut schema = Collection::new(name);
        for attribute in attributes {
            if schema.attribute(&attribute.key).is_some() {
                return Err(StoreError::AttributeExists(attribute.key));
            }
            schema.attributes.push(attribute);
        }

        let physical = self.physical(name);
        let mut databases = self.databases.write();
        let collections = databases
            .get_mut(&self.default_database)
            .ok_or_else(|| StoreError::DatabaseNotFound(self.default_database.clone()))?;
        if collections.contains_key(&physical) {
            return Err(StoreError::CollectionExists(name.to_string()));
        }

        collections.insert(
            physical,
            CollectionState {
                schema: schema.clone(),
                documents: Vec::new(),
            },
        );
        info!(collection = name, attributes = schema.attributes.len(), "Collection created");
        Ok(schema)
    }

    async fn create_attribute(&self, collection: &str, attribute: Attribute) -> StoreResult<()> {
        self.write_collection(collection, |state| {
            if state.schema.attribute(&attribute.key).is_some() {
                return Err(StoreError::AttributeExists(attribute.key.clone()));
            }
            debug!(collection, attribute = %attribute.key, kind = ?attribute.kind, "Attribute created");
            state.schema.attributes.push(attribute);
            Ok(())
        })
    }

    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.read_collection(collection, |state| {
            Ok(state.position(id).map(|i| state.documents[i].clone()))
        })
    }

    async fn create_document(
        &self,
        collection: &str,
        mut document: Document,
    ) -> StoreResult<Document> {
        self.write_collection(collection, |state| {
            if document.id.is_empty() {
                document.id = Uuid::new_v4().simple().to_string();
            }
            if state.position(&document.id).is_some() {
                return Err(StoreError::DocumentExists(document.id.clone()));
            }
            document.collection = collection.to_string();
            state
                .schema
                .check(&mut document)
                .map_err(StoreError::Structure)?;

            debug!(collection, id = %document.id, "Document created");
            state.documents.push(document.clone());
            Ok(document)
        })
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        mut document: Document,
    ) -> StoreResult<Document> {
        self.write_collection(collection, |state| {
            let index = state
                .position(id)
                .ok_or_else(|| StoreError::DocumentNotFound(id.to_string()))?;

            document.id = id.to_string();
            document.collection = collection.to_string();
            state
                .schema
                .check(&mut document)
                .map_err(StoreError::Structure)?;

            debug!(collection, id, "Document updated");
            state.documents[index] = document.clone();
            Ok(document)
        })
    }

    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.write_collection(collection, |state| {
            let index = state
                .position(id)
                .ok_or_else(|| StoreError::DocumentNotFound(id.to_string()))?;
            state.documents.remove(index);
            debug!(collection, id, "Document deleted");
            Ok(())
        })
    }

    async fn find(&self, collection: &str, queries: &[Query]) -> StoreResult<Vec<Document>> {
        self.read_collection(collection, |state| {
            Ok(state
                .documents
                .iter()
                .filter(|doc| queries.iter().all(|q| q.matches(doc)))
                .cloned()
                .collect())
        })
    }
}
