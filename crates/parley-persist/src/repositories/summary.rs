use parley_types::{LogEvent, Summary, SummaryState};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use crate::error::Result;
use crate::storage::StorageEngine;

/// Summaries and the per-thread summarization state
#[derive(Clone)]
pub struct SummaryRepository {
    storage: Arc<dyn StorageEngine>,
    events: broadcast::Sender<LogEvent>,
    write_lock: Arc<Mutex<()>>,
}

impl SummaryRepository {
    pub fn new(storage: Arc<dyn StorageEngine>, events: broadcast::Sender<LogEvent>) -> Self {
        Self {
            storage,
            events,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// All summaries, oldest first
    pub async fn list(&self, thread_id: &str) -> Result<Vec<Summary>> {
        self.storage.list_summaries(thread_id).await
    }

    /// The `limit` most recent summaries, oldest first
    pub async fn latest(&self, thread_id: &str, limit: usize) -> Result<Vec<Summary>> {
        let mut summaries = self.list(thread_id).await?;
        let skip = summaries.len().saturating_sub(limit);
        Ok(summaries.split_off(skip))
    }

    /// Store a summary with the next summary sequence number
    pub async fn save(&self, thread_id: &str, text: impl Into<String>) -> Result<Summary> {
        let _guard = self.write_lock.lock().await;
        let next = self
            .storage
            .list_summaries(thread_id)
            .await?
            .iter()
            .map(|s| s.sequence)
            .max()
            .map_or(1, |seq| seq + 1);

        let summary = Summary::new(thread_id, text, next);
        self.storage.put_summary(summary.clone()).await?;
        tracing::info!("Saved summary {} for thread {}", summary.sequence, thread_id);

        let _ = self.events.send(LogEvent::SummarySaved {
            summary: summary.clone(),
        });
        Ok(summary)
    }

    /// Keep the `retain` most recent summaries; returns how many were removed
    pub async fn prune(&self, thread_id: &str, retain: usize) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let summaries = self.storage.list_summaries(thread_id).await?;
        let excess = summaries.len().saturating_sub(retain);
        for summary in summaries.iter().take(excess) {
            self.storage.delete_summary(thread_id, &summary.id).await?;
        }
        if excess > 0 {
            tracing::debug!("Pruned {} summaries from thread {}", excess, thread_id);
        }
        Ok(excess)
    }

    /// Stored state, or a fresh one if the thread has never been summarized
    pub async fn state(&self, thread_id: &str) -> Result<SummaryState> {
        Ok(self
            .storage
            .get_summary_state(thread_id)
            .await?
            .unwrap_or_else(|| SummaryState::new(thread_id)))
    }

    pub async fn save_state(&self, state: SummaryState) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.storage.put_summary_state(state).await
    }

    /// Read, change and write back the state of a thread as one step
    ///
    /// Concurrent updates of the same thread are applied one after another.
    pub async fn update_state<F>(&self, thread_id: &str, change: F) -> Result<SummaryState>
    where
        F: FnOnce(&mut SummaryState),
    {
        let _guard = self.write_lock.lock().await;
        let mut state = self
            .storage
            .get_summary_state(thread_id)
            .await?
            .unwrap_or_else(|| SummaryState::new(thread_id));
        change(&mut state);
        self.storage.put_summary_state(state.clone()).await?;
        Ok(state)
    }
}
