use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::Result;

/// Source of media sent when the assistant asks for one
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Pick the next media item for a thread, or None when the store is empty
    async fn next_media(&self, thread_id: &str) -> Result<Option<String>>;

    async fn get_media(&self, media_id: &str) -> Result<Option<Vec<u8>>>;
}

struct MediaItem {
    id: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct MediaInner {
    items: Vec<MediaItem>,
    // (thread, media) -> logical time of last use
    last_used: HashMap<(String, String), u64>,
    clock: u64,
}

/// In-memory media store
///
/// Rotates per thread: never-sent items first in insertion order, then the
/// least recently sent.
#[derive(Default)]
pub struct MemoryMediaStore {
    inner: Mutex<MediaInner>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_media(&self, bytes: Vec<u8>) -> String {
        let id = Uuid::new_v4().to_string();
        self.inner.lock().await.items.push(MediaItem {
            id: id.clone(),
            bytes,
        });
        id
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn next_media(&self, thread_id: &str) -> Result<Option<String>> {
        let mut inner = self.inner.lock().await;

        // Option orders None first, so unused items win; position breaks ties
        let chosen = inner
            .items
            .iter()
            .enumerate()
            .min_by_key(|(position, item)| {
                let used = inner
                    .last_used
                    .get(&(thread_id.to_string(), item.id.clone()))
                    .copied();
                (used, *position)
            })
            .map(|(_, item)| item.id.clone());

        if let Some(id) = &chosen {
            inner.clock += 1;
            let now = inner.clock;
            inner.last_used.insert((thread_id.to_string(), id.clone()), now);
        }
        Ok(chosen)
    }

    async fn get_media(&self, media_id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .inner
            .lock()
            .await
            .items
            .iter()
            .find(|item| item.id == media_id)
            .map(|item| item.bytes.clone()))
    }
}
