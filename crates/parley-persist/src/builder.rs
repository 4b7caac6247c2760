use std::sync::Arc;

use crate::client::PersistClient;
use crate::dbs::MemoryStorage;
use crate::error::{PersistError, Result};
use crate::log_store::LogStore;
use crate::storage::StorageEngine;

pub struct PersistClientBuilder {
    mongodb_uri: Option<String>,
    database: Option<String>,
    event_capacity: usize,
    storage: Option<Arc<dyn StorageEngine>>,
}

impl PersistClientBuilder {
    pub fn new() -> Self {
        Self {
            mongodb_uri: None,
            database: None,
            event_capacity: 256,
            storage: None,
        }
    }

    pub fn mongodb_uri(mut self, uri: impl Into<String>) -> Self {
        self.mongodb_uri = Some(uri.into());
        self
    }

    pub fn database(mut self, db: impl Into<String>) -> Self {
        self.database = Some(db.into());
        self
    }

    /// Capacity of the log event broadcast channel
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Use an already constructed storage engine
    pub fn storage(mut self, storage: Arc<dyn StorageEngine>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Build the client
    ///
    /// Precedence: explicit storage, then MongoDB when a URI is set, then
    /// in-memory storage.
    pub async fn build(self) -> Result<PersistClient> {
        let storage: Arc<dyn StorageEngine> = match (self.storage, self.mongodb_uri) {
            (Some(storage), _) => storage,
            (None, Some(uri)) => {
                let database = self
                    .database
                    .ok_or_else(|| PersistError::InvalidConfig("database is required".to_string()))?;
                Self::connect_mongo(&uri, &database).await?
            }
            (None, None) => {
                tracing::info!("No database configured, using in-memory storage");
                Arc::new(MemoryStorage::new())
            }
        };

        let log_store = Arc::new(LogStore::with_event_capacity(
            storage.clone(),
            self.event_capacity,
        ));
        Ok(PersistClient::from_log_store(storage, log_store))
    }

    #[cfg(feature = "mongodb")]
    async fn connect_mongo(uri: &str, database: &str) -> Result<Arc<dyn StorageEngine>> {
        let storage = crate::dbs::MongoStorage::connect(uri, database).await?;
        Ok(Arc::new(storage))
    }

    #[cfg(not(feature = "mongodb"))]
    async fn connect_mongo(_uri: &str, _database: &str) -> Result<Arc<dyn StorageEngine>> {
        Err(PersistError::Unavailable(
            "built without the mongodb feature".to_string(),
        ))
    }
}

impl Default for PersistClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
