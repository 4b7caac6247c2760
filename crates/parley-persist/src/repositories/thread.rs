use chrono::Utc;
use parley_types::{Thread, ThreadConfig};
use std::sync::Arc;

use crate::error::{PersistError, Result};
use crate::storage::StorageEngine;

#[derive(Clone)]
pub struct ThreadRepository {
    storage: Arc<dyn StorageEngine>,
}

impl ThreadRepository {
    pub fn new(storage: Arc<dyn StorageEngine>) -> Self {
        Self { storage }
    }

    /// Create a new thread
    pub async fn create_thread(
        &self,
        title: impl Into<String>,
        config: ThreadConfig,
    ) -> Result<Thread> {
        let thread = Thread::new(title, config);
        self.storage.put_thread(thread.clone()).await?;
        tracing::info!("Created thread {} ({})", thread.id, thread.title);
        Ok(thread)
    }

    /// Get thread by ID
    pub async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        self.storage.get_thread(thread_id).await
    }

    pub async fn require_thread(&self, thread_id: &str) -> Result<Thread> {
        self.get_thread(thread_id)
            .await?
            .ok_or_else(|| PersistError::ThreadNotFound(thread_id.to_string()))
    }

    /// Threads ordered by most recent activity
    pub async fn list_threads(&self) -> Result<Vec<Thread>> {
        let mut threads = self.storage.list_threads().await?;
        threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(threads)
    }

    pub async fn rename_thread(&self, thread_id: &str, title: impl Into<String>) -> Result<Thread> {
        let mut thread = self.require_thread(thread_id).await?;
        thread.title = title.into();
        thread.updated_at = Utc::now();
        self.storage.put_thread(thread.clone()).await?;
        Ok(thread)
    }

    pub async fn update_config(&self, thread_id: &str, config: ThreadConfig) -> Result<Thread> {
        let mut thread = self.require_thread(thread_id).await?;
        thread.config = config;
        thread.updated_at = Utc::now();
        self.storage.put_thread(thread.clone()).await?;
        Ok(thread)
    }

    /// Bump `updated_at` after activity; a missing thread is ignored
    pub async fn touch(&self, thread_id: &str) -> Result<()> {
        if let Some(mut thread) = self.get_thread(thread_id).await? {
            thread.updated_at = Utc::now();
            self.storage.put_thread(thread).await?;
        }
        Ok(())
    }
}
