use parley_types::LogEvent;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::dbs::MemoryStorage;
use crate::error::Result;
use crate::log_store::LogStore;
use crate::pagination::PaginationService;
use crate::repositories::{SummaryRepository, ThreadRepository};
use crate::storage::StorageEngine;

/// Entry point to everything persisted for chat threads
#[derive(Clone)]
pub struct PersistClient {
    storage: Arc<dyn StorageEngine>,
    log_store: Arc<LogStore>,
    thread_repo: ThreadRepository,
    summary_repo: SummaryRepository,
    pagination: PaginationService,
}

impl PersistClient {
    pub fn new(storage: Arc<dyn StorageEngine>) -> Self {
        Self::from_log_store(storage.clone(), Arc::new(LogStore::new(storage)))
    }

    pub(crate) fn from_log_store(storage: Arc<dyn StorageEngine>, log_store: Arc<LogStore>) -> Self {
        let thread_repo = ThreadRepository::new(storage.clone());
        let summary_repo = SummaryRepository::new(storage.clone(), log_store.events());
        let pagination = PaginationService::new(storage.clone(), log_store.clone());

        Self {
            storage,
            log_store,
            thread_repo,
            summary_repo,
            pagination,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn storage(&self) -> &Arc<dyn StorageEngine> {
        &self.storage
    }

    pub fn log(&self) -> &Arc<LogStore> {
        &self.log_store
    }

    pub fn threads(&self) -> &ThreadRepository {
        &self.thread_repo
    }

    pub fn summaries(&self) -> &SummaryRepository {
        &self.summary_repo
    }

    pub fn pagination(&self) -> &PaginationService {
        &self.pagination
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.log_store.subscribe()
    }

    /// Delete a thread with its messages, summaries and summary state
    pub async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.log_store.delete_thread(thread_id).await
    }
}
