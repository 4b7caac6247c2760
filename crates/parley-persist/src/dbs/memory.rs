use async_trait::async_trait;
use parley_types::{Message, Summary, SummaryState, Thread};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::storage::StorageEngine;

/// In-process storage engine
///
/// Holds each table behind its own lock. Used by the CLI when no database is
/// configured and by every test in the workspace.
#[derive(Default)]
pub struct MemoryStorage {
    threads: RwLock<HashMap<String, Thread>>,
    messages: RwLock<HashMap<String, Vec<Message>>>,
    summaries: RwLock<HashMap<String, Vec<Summary>>>,
    states: RwLock<HashMap<String, SummaryState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row without the id upsert, so a thread can end up holding
    /// duplicates the way an interrupted multi-writer store would
    pub async fn insert_raw(&self, message: Message) {
        self.messages
            .write()
            .await
            .entry(message.thread_id.clone())
            .or_default()
            .push(message);
    }
}

#[async_trait]
impl StorageEngine for MemoryStorage {
    async fn put_thread(&self, thread: Thread) -> Result<()> {
        self.threads.write().await.insert(thread.id.clone(), thread);
        Ok(())
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        Ok(self.threads.read().await.get(thread_id).cloned())
    }

    async fn list_threads(&self) -> Result<Vec<Thread>> {
        Ok(self.threads.read().await.values().cloned().collect())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.threads.write().await.remove(thread_id);
        Ok(())
    }

    async fn put_message(&self, message: Message) -> Result<()> {
        let mut messages = self.messages.write().await;
        let rows = messages.entry(message.thread_id.clone()).or_default();
        match rows.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message,
            None => rows.push(message),
        }
        Ok(())
    }

    async fn get_message(&self, thread_id: &str, message_id: &str) -> Result<Option<Message>> {
        Ok(self
            .messages
            .read()
            .await
            .get(thread_id)
            .and_then(|rows| rows.iter().find(|m| m.id == message_id).cloned()))
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>> {
        Ok(self
            .messages
            .read()
            .await
            .get(thread_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn messages_before(&self, thread_id: &str, before: u64) -> Result<Vec<Message>> {
        let mut rows: Vec<Message> = self
            .messages
            .read()
            .await
            .get(thread_id)
            .map(|rows| {
                rows.iter()
                    .filter(|m| m.sequence.is_some_and(|seq| seq < before))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by_key(|m| m.sequence);
        Ok(rows)
    }

    async fn last_sequence(&self, thread_id: &str) -> Result<Option<u64>> {
        Ok(self
            .messages
            .read()
            .await
            .get(thread_id)
            .and_then(|rows| rows.iter().filter_map(|m| m.sequence).max()))
    }

    async fn delete_message(&self, thread_id: &str, message_id: &str) -> Result<()> {
        if let Some(rows) = self.messages.write().await.get_mut(thread_id) {
            rows.retain(|m| m.id != message_id);
        }
        Ok(())
    }

    async fn delete_messages(&self, thread_id: &str) -> Result<()> {
        self.messages.write().await.remove(thread_id);
        Ok(())
    }

    async fn put_summary(&self, summary: Summary) -> Result<()> {
        let mut summaries = self.summaries.write().await;
        let rows = summaries.entry(summary.thread_id.clone()).or_default();
        match rows.iter_mut().find(|s| s.id == summary.id) {
            Some(existing) => *existing = summary,
            None => rows.push(summary),
        }
        Ok(())
    }

    async fn list_summaries(&self, thread_id: &str) -> Result<Vec<Summary>> {
        let mut rows = self
            .summaries
            .read()
            .await
            .get(thread_id)
            .cloned()
            .unwrap_or_default();
        rows.sort_by_key(|s| s.sequence);
        Ok(rows)
    }

    async fn delete_summary(&self, thread_id: &str, summary_id: &str) -> Result<()> {
        if let Some(rows) = self.summaries.write().await.get_mut(thread_id) {
            rows.retain(|s| s.id != summary_id);
        }
        Ok(())
    }

    async fn delete_summaries(&self, thread_id: &str) -> Result<()> {
        self.summaries.write().await.remove(thread_id);
        Ok(())
    }

    async fn get_summary_state(&self, thread_id: &str) -> Result<Option<SummaryState>> {
        Ok(self.states.read().await.get(thread_id).cloned())
    }

    async fn put_summary_state(&self, state: SummaryState) -> Result<()> {
        self.states.write().await.insert(state.thread_id.clone(), state);
        Ok(())
    }

    async fn delete_summary_state(&self, thread_id: &str) -> Result<()> {
        self.states.write().await.remove(thread_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::MessageRole;

    fn msg(id: &str, seq: u64) -> Message {
        Message::user("t1", format!("m{}", seq))
            .with_id(id)
            .with_sequence(seq)
    }

    #[tokio::test]
    async fn test_put_message_upserts_by_id() {
        let storage = MemoryStorage::new();
        storage.put_message(msg("a", 1)).await.unwrap();
        storage
            .put_message(Message::assistant("t1", "edited").with_id("a").with_sequence(1))
            .await
            .unwrap();

        let rows = storage.list_messages("t1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "edited");
        assert_eq!(rows[0].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn test_messages_before_is_ascending_and_exclusive() {
        let storage = MemoryStorage::new();
        for (id, seq) in [("c", 3), ("a", 1), ("b", 2), ("d", 4)] {
            storage.put_message(msg(id, seq)).await.unwrap();
        }

        let rows = storage.messages_before("t1", 3).await.unwrap();
        let seqs: Vec<_> = rows.iter().filter_map(|m| m.sequence).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(storage.last_sequence("t1").await.unwrap(), Some(4));
        assert_eq!(storage.last_sequence("t2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_message_removes_duplicates() {
        let storage = MemoryStorage::new();
        storage.insert_raw(msg("a", 1)).await;
        storage.insert_raw(msg("a", 2)).await;
        storage.insert_raw(msg("b", 3)).await;

        storage.delete_message("t1", "a").await.unwrap();
        let rows = storage.list_messages("t1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "b");
    }
}
