use parley_types::{LogEvent, Message};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use crate::error::{PersistError, Result};
use crate::filter::is_content_bearing;
use crate::sequencer::{is_consistent, sort_messages, RepairReport, Sequencer};
use crate::storage::StorageEngine;

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Durable, sequenced message log for all threads
///
/// Writes are serialized through one lock so sequence assignment and repair
/// never interleave. Every stored change is published on a broadcast channel.
pub struct LogStore {
    storage: Arc<dyn StorageEngine>,
    sequencer: Sequencer,
    events: broadcast::Sender<LogEvent>,
    write_lock: Mutex<()>,
}

impl LogStore {
    pub fn new(storage: Arc<dyn StorageEngine>) -> Self {
        Self::with_event_capacity(storage, DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(storage: Arc<dyn StorageEngine>, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            sequencer: Sequencer::new(storage.clone()),
            storage,
            events,
            write_lock: Mutex::new(()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.events.subscribe()
    }

    /// Publish an event produced outside the log (summaries, thread deletes)
    pub fn publish(&self, event: LogEvent) {
        // No receivers is not an error
        let _ = self.events.send(event);
    }

    pub(crate) fn events(&self) -> broadcast::Sender<LogEvent> {
        self.events.clone()
    }

    /// Insert or update a message
    ///
    /// A new message gets the next sequence number unless one is given. An
    /// existing id always keeps the sequence already stored for it.
    pub async fn append(&self, thread_id: &str, mut message: Message) -> Result<Message> {
        message.thread_id = thread_id.to_string();

        let _guard = self.write_lock.lock().await;
        let existing = self.storage.get_message(thread_id, &message.id).await?;
        self.store_locked(thread_id, message, existing).await
    }

    /// Apply a change to a stored message and write it back
    ///
    /// The read, the change and the write happen under the write lock, so a
    /// repair cannot renumber the row in between.
    pub async fn update<F>(&self, thread_id: &str, message_id: &str, change: F) -> Result<Message>
    where
        F: FnOnce(&mut Message),
    {
        let _guard = self.write_lock.lock().await;
        let existing = self
            .storage
            .get_message(thread_id, message_id)
            .await?
            .ok_or_else(|| PersistError::MessageNotFound(message_id.to_string()))?;

        let mut message = existing.clone();
        change(&mut message);
        message.id = existing.id.clone();
        message.thread_id = thread_id.to_string();
        self.store_locked(thread_id, message, Some(existing)).await
    }

    // Caller holds `write_lock`
    async fn store_locked(
        &self,
        thread_id: &str,
        mut message: Message,
        existing: Option<Message>,
    ) -> Result<Message> {
        message.sequence = match existing.and_then(|m| m.sequence) {
            Some(stored) => Some(stored),
            None => match message.sequence {
                Some(given) => Some(given),
                None => Some(self.sequencer.next_sequence(thread_id).await?),
            },
        };

        self.storage.put_message(message.clone()).await?;
        tracing::debug!(
            "Stored {} message {} in thread {} at sequence {}",
            message.role,
            message.id,
            thread_id,
            message.sequence_or_default()
        );

        self.publish(LogEvent::MessageUpserted {
            message: message.clone(),
        });
        Ok(message)
    }

    pub async fn get(&self, thread_id: &str, message_id: &str) -> Result<Option<Message>> {
        self.storage.get_message(thread_id, message_id).await
    }

    /// Every message of the thread in canonical order
    pub async fn list_all(&self, thread_id: &str) -> Result<Vec<Message>> {
        let mut messages = self.storage.list_messages(thread_id).await?;
        sort_messages(&mut messages);
        Ok(messages)
    }

    pub async fn list_content_bearing(&self, thread_id: &str) -> Result<Vec<Message>> {
        let mut messages = self.list_all(thread_id).await?;
        messages.retain(is_content_bearing);
        Ok(messages)
    }

    pub async fn count(&self, thread_id: &str) -> Result<usize> {
        Ok(self.storage.list_messages(thread_id).await?.len())
    }

    /// Restore canonical order and dense numbering unconditionally
    pub async fn repair(&self, thread_id: &str) -> Result<RepairReport> {
        let _guard = self.write_lock.lock().await;
        let report = self.sequencer.repair(thread_id).await?;
        if report.renumbered > 0 {
            self.publish(LogEvent::Repaired {
                thread_id: thread_id.to_string(),
                renumbered: report.renumbered,
            });
        }
        Ok(report)
    }

    /// Repair only if the stored rows are inconsistent; returns whether it ran
    pub async fn ensure_consistent(&self, thread_id: &str) -> Result<bool> {
        let rows = self.storage.list_messages(thread_id).await?;
        if is_consistent(&rows) {
            return Ok(false);
        }
        tracing::warn!("Thread {} has inconsistent sequences, repairing", thread_id);
        self.repair(thread_id).await?;
        Ok(true)
    }

    /// Load a thread for display, repairing lazily
    pub async fn load(&self, thread_id: &str) -> Result<Vec<Message>> {
        self.ensure_consistent(thread_id).await?;
        self.list_all(thread_id).await
    }

    /// Remove a thread and everything it owns
    ///
    /// The thread row goes first so it leaves the visible set even when a
    /// cascade step fails; cascade failures are logged, not returned.
    pub async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.storage.delete_thread(thread_id).await?;

        if let Err(e) = self.storage.delete_messages(thread_id).await {
            tracing::warn!("Failed to delete messages of thread {}: {}", thread_id, e);
        }
        if let Err(e) = self.storage.delete_summaries(thread_id).await {
            tracing::warn!("Failed to delete summaries of thread {}: {}", thread_id, e);
        }
        if let Err(e) = self.storage.delete_summary_state(thread_id).await {
            tracing::warn!("Failed to delete summary state of thread {}: {}", thread_id, e);
        }

        tracing::info!("Deleted thread {}", thread_id);
        self.publish(LogEvent::ThreadDeleted {
            thread_id: thread_id.to_string(),
        });
        Ok(())
    }
}
