use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Client, Collection, IndexModel};
use parley_types::{Message, Summary, SummaryState, Thread};

use crate::error::{PersistError, Result};
use crate::storage::StorageEngine;

/// MongoDB storage engine
///
/// Domain types are stored as-is; the driver-generated `_id` is ignored on
/// read and rows are addressed by their own `id` field.
pub struct MongoStorage {
    threads: Collection<Thread>,
    messages: Collection<Message>,
    summaries: Collection<Summary>,
    summary_states: Collection<SummaryState>,
}

impl MongoStorage {
    /// Connect to MongoDB and ensure indexes exist
    pub async fn connect(mongodb_uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Unavailable(e.to_string()))?;
        let db = client.database(database);

        let storage = Self {
            threads: db.collection("threads"),
            messages: db.collection("messages"),
            summaries: db.collection("summaries"),
            summary_states: db.collection("summary_states"),
        };
        storage.ensure_indexes().await?;

        tracing::info!("Connected to MongoDB database {}", database);
        Ok(storage)
    }

    async fn ensure_indexes(&self) -> Result<()> {
        self.messages
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "conversation_id": 1, "sequence": 1 })
                    .build(),
            )
            .await?;
        self.messages
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "conversation_id": 1, "id": 1 })
                    .build(),
            )
            .await?;
        self.summaries
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "thread_id": 1, "sequence": 1 })
                    .build(),
            )
            .await?;
        Ok(())
    }
}

fn sequence_bound(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl StorageEngine for MongoStorage {
    async fn put_thread(&self, thread: Thread) -> Result<()> {
        self.threads
            .replace_one(doc! { "id": thread.id.as_str() }, &thread)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        Ok(self.threads.find_one(doc! { "id": thread_id }).await?)
    }

    async fn list_threads(&self) -> Result<Vec<Thread>> {
        let threads = self
            .threads
            .find(doc! {})
            .sort(doc! { "updated_at": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(threads)
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.threads.delete_one(doc! { "id": thread_id }).await?;
        Ok(())
    }

    async fn put_message(&self, message: Message) -> Result<()> {
        let filter = doc! { "conversation_id": message.thread_id.as_str(), "id": message.id.as_str() };
        self.messages
            .replace_one(filter, &message)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn get_message(&self, thread_id: &str, message_id: &str) -> Result<Option<Message>> {
        let filter = doc! { "conversation_id": thread_id, "id": message_id };
        Ok(self.messages.find_one(filter).await?)
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>> {
        let messages = self
            .messages
            .find(doc! { "conversation_id": thread_id })
            .await?
            .try_collect()
            .await?;
        Ok(messages)
    }

    async fn messages_before(&self, thread_id: &str, before: u64) -> Result<Vec<Message>> {
        let filter = doc! {
            "conversation_id": thread_id,
            "sequence": { "$lt": sequence_bound(before) }
        };
        let messages = self
            .messages
            .find(filter)
            .sort(doc! { "sequence": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(messages)
    }

    async fn last_sequence(&self, thread_id: &str) -> Result<Option<u64>> {
        let filter = doc! { "conversation_id": thread_id, "sequence": { "$ne": null } };
        let last = self
            .messages
            .find_one(filter)
            .sort(doc! { "sequence": -1 })
            .await?;
        Ok(last.and_then(|m| m.sequence))
    }

    async fn delete_message(&self, thread_id: &str, message_id: &str) -> Result<()> {
        self.messages
            .delete_many(doc! { "conversation_id": thread_id, "id": message_id })
            .await?;
        Ok(())
    }

    async fn delete_messages(&self, thread_id: &str) -> Result<()> {
        self.messages
            .delete_many(doc! { "conversation_id": thread_id })
            .await?;
        Ok(())
    }

    async fn put_summary(&self, summary: Summary) -> Result<()> {
        self.summaries
            .replace_one(doc! { "id": summary.id.as_str() }, &summary)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn list_summaries(&self, thread_id: &str) -> Result<Vec<Summary>> {
        let summaries = self
            .summaries
            .find(doc! { "thread_id": thread_id })
            .sort(doc! { "sequence": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(summaries)
    }

    async fn delete_summary(&self, thread_id: &str, summary_id: &str) -> Result<()> {
        self.summaries
            .delete_one(doc! { "thread_id": thread_id, "id": summary_id })
            .await?;
        Ok(())
    }

    async fn delete_summaries(&self, thread_id: &str) -> Result<()> {
        self.summaries
            .delete_many(doc! { "thread_id": thread_id })
            .await?;
        Ok(())
    }

    async fn get_summary_state(&self, thread_id: &str) -> Result<Option<SummaryState>> {
        Ok(self
            .summary_states
            .find_one(doc! { "thread_id": thread_id })
            .await?)
    }

    async fn put_summary_state(&self, state: SummaryState) -> Result<()> {
        self.summary_states
            .replace_one(doc! { "thread_id": state.thread_id.as_str() }, &state)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn delete_summary_state(&self, thread_id: &str) -> Result<()> {
        self.summary_states
            .delete_one(doc! { "thread_id": thread_id })
            .await?;
        Ok(())
    }
}
