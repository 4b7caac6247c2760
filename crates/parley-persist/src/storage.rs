use async_trait::async_trait;
use parley_types::{Message, Summary, SummaryState, Thread};

use crate::error::Result;

/// Durable keyed tables for threads, messages, summaries and summary state
///
/// No cross-table transactions are assumed. Every write is a single-row
/// upsert or a delete scoped to one thread, so a partially applied sequence of
/// writes can be re-derived on the next load.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    async fn put_thread(&self, thread: Thread) -> Result<()>;

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>>;

    async fn list_threads(&self) -> Result<Vec<Thread>>;

    async fn delete_thread(&self, thread_id: &str) -> Result<()>;

    /// Insert or replace the message with the same id in its thread
    async fn put_message(&self, message: Message) -> Result<()>;

    async fn get_message(&self, thread_id: &str, message_id: &str) -> Result<Option<Message>>;

    /// Every stored row of a thread, in no particular order
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>>;

    /// Rows with `sequence < before`, ascending by sequence
    async fn messages_before(&self, thread_id: &str, before: u64) -> Result<Vec<Message>>;

    async fn last_sequence(&self, thread_id: &str) -> Result<Option<u64>>;

    /// Remove every row carrying this id
    async fn delete_message(&self, thread_id: &str, message_id: &str) -> Result<()>;

    async fn delete_messages(&self, thread_id: &str) -> Result<()>;

    async fn put_summary(&self, summary: Summary) -> Result<()>;

    /// All summaries of a thread, ascending by sequence
    async fn list_summaries(&self, thread_id: &str) -> Result<Vec<Summary>>;

    async fn delete_summary(&self, thread_id: &str, summary_id: &str) -> Result<()>;

    async fn delete_summaries(&self, thread_id: &str) -> Result<()>;

    async fn get_summary_state(&self, thread_id: &str) -> Result<Option<SummaryState>>;

    async fn put_summary_state(&self, state: SummaryState) -> Result<()>;

    async fn delete_summary_state(&self, thread_id: &str) -> Result<()>;
}
