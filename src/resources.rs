//! Resources injected into routes and hooks.
//!
//! `registry` holds the process's backend connections and opens them lazily.
//! `db` is the shared document store handle taken from it, so every request
//! talks to the same store.

use crate::config::DatabaseSettings;
use crate::store::{DocumentStore, MemoryStore, StoreError};
use lattice_core::{Error, ResourceKey, StaticFiles};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Shared document store handle
pub type Db = Arc<dyn DocumentStore>;

/// Opens a document store for the given settings
pub type Connector = Arc<dyn Fn(&DatabaseSettings) -> Result<Db, StoreError> + Send + Sync>;

pub const REGISTRY: ResourceKey<Arc<Connections>> = ResourceKey::new("registry");
pub const DB: ResourceKey<Db> = ResourceKey::new("db");
pub const FILES: ResourceKey<Arc<StaticFiles>> = ResourceKey::new("files");

/// Backend connections, each opened at most once.
pub struct Connections {
    settings: DatabaseSettings,
    connector: Connector,
    db: OnceCell<Db>,
}

impl Connections {
    /// Connections backed by the in-memory store
    pub fn new(settings: DatabaseSettings) -> Self {
        Self::with_connector(settings, Arc::new(connect_memory))
    }

    pub fn with_connector(settings: DatabaseSettings, connector: Connector) -> Self {
        Self {
            settings,
            connector,
            db: OnceCell::new(),
        }
    }

    /// The database handle, connecting on first use
    pub fn database(&self) -> Result<Db, Error> {
        self.db
            .get_or_try_init(|| {
                let db = (self.connector)(&self.settings)?;
                info!(
                    database = %self.settings.name,
                    namespace = %self.settings.namespace,
                    "Database connected"
                );
                Ok::<_, StoreError>(db)
            })
            .cloned()
            .map_err(Error::from)
    }

    pub fn is_connected(&self) -> bool {
        self.db.get().is_some()
    }
}

fn connect_memory(settings: &DatabaseSettings) -> Result<Db, StoreError> {
    Ok(Arc::new(MemoryStore::new(&settings.name, &settings.namespace)))
}

impl fmt::Debug for Connections {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connections")
            .field("settings", &self.settings)
            .field("connected", &self.is_connected())
            .finish()
    }
}
