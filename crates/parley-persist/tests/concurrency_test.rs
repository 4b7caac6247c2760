use async_trait::async_trait;
use chrono::{Duration as Delta, TimeZone, Utc};
use parley_persist::{
    LogStore, MemoryStorage, Message, PersistClient, Result, StorageEngine, Summary,
    SummaryState, Thread,
};
use std::sync::Arc;
use std::time::Duration;

/// Memory storage whose single-row reads return a snapshot after a delay
struct SlowReads {
    inner: MemoryStorage,
    delay: Duration,
}

impl SlowReads {
    fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStorage::new(),
            delay,
        }
    }
}

#[async_trait]
impl StorageEngine for SlowReads {
    async fn put_thread(&self, thread: Thread) -> Result<()> {
        self.inner.put_thread(thread).await
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        self.inner.get_thread(thread_id).await
    }

    async fn list_threads(&self) -> Result<Vec<Thread>> {
        self.inner.list_threads().await
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.inner.delete_thread(thread_id).await
    }

    async fn put_message(&self, message: Message) -> Result<()> {
        self.inner.put_message(message).await
    }

    async fn get_message(&self, thread_id: &str, message_id: &str) -> Result<Option<Message>> {
        let row = self.inner.get_message(thread_id, message_id).await;
        tokio::time::sleep(self.delay).await;
        row
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>> {
        self.inner.list_messages(thread_id).await
    }

    async fn messages_before(&self, thread_id: &str, before: u64) -> Result<Vec<Message>> {
        self.inner.messages_before(thread_id, before).await
    }

    async fn last_sequence(&self, thread_id: &str) -> Result<Option<u64>> {
        self.inner.last_sequence(thread_id).await
    }

    async fn delete_message(&self, thread_id: &str, message_id: &str) -> Result<()> {
        self.inner.delete_message(thread_id, message_id).await
    }

    async fn delete_messages(&self, thread_id: &str) -> Result<()> {
        self.inner.delete_messages(thread_id).await
    }

    async fn put_summary(&self, summary: Summary) -> Result<()> {
        self.inner.put_summary(summary).await
    }

    async fn list_summaries(&self, thread_id: &str) -> Result<Vec<Summary>> {
        self.inner.list_summaries(thread_id).await
    }

    async fn delete_summary(&self, thread_id: &str, summary_id: &str) -> Result<()> {
        self.inner.delete_summary(thread_id, summary_id).await
    }

    async fn delete_summaries(&self, thread_id: &str) -> Result<()> {
        self.inner.delete_summaries(thread_id).await
    }

    async fn get_summary_state(&self, thread_id: &str) -> Result<Option<SummaryState>> {
        let state = self.inner.get_summary_state(thread_id).await;
        tokio::time::sleep(self.delay).await;
        state
    }

    async fn put_summary_state(&self, state: SummaryState) -> Result<()> {
        self.inner.put_summary_state(state).await
    }

    async fn delete_summary_state(&self, thread_id: &str) -> Result<()> {
        self.inner.delete_summary_state(thread_id).await
    }
}

fn at(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Delta::seconds(secs)
}

#[tokio::test(start_paused = true)]
async fn test_update_and_repair_do_not_interleave() {
    let storage = Arc::new(SlowReads::new(Duration::from_millis(50)));
    // Gap at sequence 1, so a repair renumbers both rows
    storage
        .put_message(Message::user("t", "hello").with_id("a").with_timestamp(at(0)).with_sequence(2))
        .await
        .unwrap();
    storage
        .put_message(
            Message::assistant_placeholder("t")
                .with_id("p")
                .with_timestamp(at(1))
                .with_sequence(3),
        )
        .await
        .unwrap();
    let log = Arc::new(LogStore::new(storage.clone()));

    let updater = {
        let log = log.clone();
        tokio::spawn(async move { log.update("t", "p", |m| m.complete("hi")).await })
    };
    let repairer = {
        let log = log.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            log.repair("t").await
        })
    };

    let completed = updater.await.unwrap().unwrap();
    repairer.await.unwrap().unwrap();
    assert_eq!(completed.content, "hi");

    let mut rows = storage.list_messages("t").await.unwrap();
    rows.sort_by_key(|m| m.sequence);
    let placed: Vec<_> = rows.iter().map(|m| (m.id.as_str(), m.sequence)).collect();
    assert_eq!(placed, vec![("a", Some(1)), ("p", Some(2))]);
    assert_eq!(rows[1].content, "hi");
    assert!(!log.ensure_consistent("t").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_state_updates_are_all_counted() {
    let storage = Arc::new(SlowReads::new(Duration::from_millis(50)));
    let client = PersistClient::new(storage);
    let summaries = client.summaries();

    let (first, second) = tokio::join!(
        summaries.update_state("t", |s| s.record_message()),
        summaries.update_state("t", |s| s.record_message()),
    );
    first.unwrap();
    second.unwrap();

    assert_eq!(summaries.state("t").await.unwrap().message_count, 2);
}
