use parley_types::BatcherConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

const FLUSH_CHANNEL_CAPACITY: usize = 1000;

/// One piece of user input waiting to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub id: String,
    pub content: String,
}

impl Fragment {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
        }
    }
}

/// A flushed batch: one logical user turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFlush {
    pub thread_id: String,
    /// Fragment contents joined by newline, in submission order
    pub content: String,
    pub fragment_ids: Vec<String>,
}

impl BatchFlush {
    fn from_fragments(thread_id: String, fragments: Vec<Fragment>) -> Self {
        let content = fragments
            .iter()
            .map(|f| f.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            thread_id,
            content,
            fragment_ids: fragments.into_iter().map(|f| f.id).collect(),
        }
    }
}

struct PendingBatch {
    fragments: Vec<Fragment>,
    generation: u64,
    timer: JoinHandle<()>,
}

struct BatcherInner {
    config: BatcherConfig,
    pending: Mutex<HashMap<String, PendingBatch>>,
    flush_tx: mpsc::Sender<BatchFlush>,
    generation: AtomicU64,
}

/// Per-thread debouncer for rapid user input
///
/// Every submit restarts the thread's timer. When the window passes without
/// another submit, the buffered fragments go out as one `BatchFlush` on the
/// channel returned by `new`.
#[derive(Clone)]
pub struct Batcher {
    inner: Arc<BatcherInner>,
}

impl Batcher {
    pub fn new(config: BatcherConfig) -> (Self, mpsc::Receiver<BatchFlush>) {
        let (flush_tx, flush_rx) = mpsc::channel(FLUSH_CHANNEL_CAPACITY);
        let batcher = Self {
            inner: Arc::new(BatcherInner {
                config,
                pending: Mutex::new(HashMap::new()),
                flush_tx,
                generation: AtomicU64::new(0),
            }),
        };
        (batcher, flush_rx)
    }

    pub fn config(&self) -> &BatcherConfig {
        &self.inner.config
    }

    /// Buffer content for a thread; returns the new fragment id
    pub async fn submit(&self, thread_id: &str, content: impl Into<String>) -> String {
        let fragment = Fragment::new(content);
        let id = fragment.id.clone();
        self.submit_fragment(thread_id, fragment).await;
        id
    }

    /// Buffer a fragment whose id the caller already assigned
    pub async fn submit_fragment(&self, thread_id: &str, fragment: Fragment) {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);

        let mut pending = self.inner.pending.lock().await;
        let timer = self.spawn_timer(thread_id.to_string(), generation);
        match pending.get_mut(thread_id) {
            Some(batch) => {
                batch.timer.abort();
                batch.timer = timer;
                batch.generation = generation;
                batch.fragments.push(fragment);
            }
            None => {
                pending.insert(
                    thread_id.to_string(),
                    PendingBatch {
                        fragments: vec![fragment],
                        generation,
                        timer,
                    },
                );
            }
        }
        tracing::debug!(
            "Buffered fragment for thread {} ({} pending)",
            thread_id,
            pending.get(thread_id).map_or(0, |b| b.fragments.len())
        );
    }

    fn spawn_timer(&self, thread_id: String, generation: u64) -> JoinHandle<()> {
        let batcher = self.clone();
        let window = self.inner.config.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let batch = {
                let mut pending = batcher.inner.pending.lock().await;
                match pending.get(&thread_id) {
                    Some(batch) if batch.generation == generation => pending.remove(&thread_id),
                    _ => None,
                }
            };
            if let Some(batch) = batch {
                batcher.emit(thread_id, batch.fragments).await;
            }
        })
    }

    async fn emit(&self, thread_id: String, fragments: Vec<Fragment>) {
        let flush = BatchFlush::from_fragments(thread_id, fragments);
        tracing::info!(
            "Flushing {} fragments for thread {}",
            flush.fragment_ids.len(),
            flush.thread_id
        );
        if self.inner.flush_tx.send(flush).await.is_err() {
            tracing::warn!("Flush receiver dropped, batch discarded");
        }
    }

    /// Flush a thread now, bypassing its timer; returns whether anything was pending
    pub async fn force_flush(&self, thread_id: &str) -> bool {
        let batch = self.inner.pending.lock().await.remove(thread_id);
        match batch {
            Some(batch) => {
                batch.timer.abort();
                self.emit(thread_id.to_string(), batch.fragments).await;
                true
            }
            None => false,
        }
    }

    /// Drop a thread's buffered fragments without sending them; returns how many
    pub async fn discard(&self, thread_id: &str) -> usize {
        match self.inner.pending.lock().await.remove(thread_id) {
            Some(batch) => {
                batch.timer.abort();
                batch.fragments.len()
            }
            None => 0,
        }
    }

    pub async fn pending_len(&self, thread_id: &str) -> usize {
        self.inner
            .pending
            .lock()
            .await
            .get(thread_id)
            .map_or(0, |b| b.fragments.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_rapid_submits_flush_once() {
        let (batcher, mut flushes) = Batcher::new(BatcherConfig::interactive());

        let a = batcher.submit("t", "first").await;
        tokio::time::sleep(Duration::from_millis(800)).await;
        let b = batcher.submit("t", "second").await;
        tokio::time::sleep(Duration::from_millis(900)).await;
        let c = batcher.submit("t", "third").await;

        let flush = flushes.recv().await.unwrap();
        assert_eq!(flush.thread_id, "t");
        assert_eq!(flush.content, "first\nsecond\nthird");
        assert_eq!(flush.fragment_ids, vec![a, b, c]);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(flushes.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_resets_on_each_submit() {
        let (batcher, mut flushes) = Batcher::new(BatcherConfig::interactive());

        batcher.submit("t", "a").await;
        tokio::time::sleep(Duration::from_secs(9)).await;
        batcher.submit("t", "b").await;
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert!(flushes.try_recv().is_err());
        assert_eq!(batcher.pending_len("t").await, 2);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(flushes.try_recv().unwrap().content, "a\nb");
        assert_eq!(batcher.pending_len("t").await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_threads_do_not_interfere() {
        let (batcher, mut flushes) = Batcher::new(BatcherConfig::interactive());

        batcher.submit("a", "for a").await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        batcher.submit("b", "for b").await;

        let first = flushes.recv().await.unwrap();
        let second = flushes.recv().await.unwrap();
        assert_eq!((first.thread_id.as_str(), first.content.as_str()), ("a", "for a"));
        assert_eq!((second.thread_id.as_str(), second.content.as_str()), ("b", "for b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_discard_drops_pending_batch() {
        let (batcher, mut flushes) = Batcher::new(BatcherConfig::interactive());

        batcher.submit("t", "never sent").await;
        batcher.submit("t", "nor this").await;
        batcher.submit("u", "kept").await;
        assert_eq!(batcher.discard("t").await, 2);
        assert_eq!(batcher.discard("t").await, 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(flushes.try_recv().unwrap().thread_id, "u");
        assert!(flushes.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_flush_bypasses_timer() {
        let (batcher, mut flushes) = Batcher::new(BatcherConfig::concatenation());

        batcher.submit("t", "leaving").await;
        assert!(batcher.force_flush("t").await);
        assert_eq!(flushes.try_recv().unwrap().content, "leaving");
        assert!(!batcher.force_flush("t").await);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(flushes.try_recv().is_err());
    }
}
