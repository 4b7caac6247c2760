use parley_types::{LogEvent, Message};
use std::sync::Arc;

use crate::error::Result;
use crate::filter::is_content_bearing;
use crate::log_store::LogStore;
use crate::storage::StorageEngine;

pub const DEFAULT_PAGE_SIZE: usize = 20;

/// One page of content-bearing messages, ascending by sequence
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub messages: Vec<Message>,
    /// Smallest sequence in the page; pass it to `load_older` for the next page
    pub cursor: Option<u64>,
    pub has_more: bool,
}

impl Page {
    fn from_tail(mut candidates: Vec<Message>, page_size: usize, initial: bool) -> Self {
        candidates.retain(is_content_bearing);
        let skip = candidates.len().saturating_sub(page_size);
        let messages = candidates.split_off(skip);
        let cursor = messages.first().and_then(|m| m.sequence);

        // Optimistic: the first page always claims more when it has anything.
        // Older pages stop once they reach sequence 1 or come back empty.
        let has_more = match cursor {
            None => false,
            Some(_) if initial => true,
            Some(min) => min > 1,
        };

        Self {
            messages,
            cursor,
            has_more,
        }
    }
}

/// Per-view scroll position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationCursor {
    pub thread_id: String,
    pub oldest_loaded_sequence: Option<u64>,
    pub has_more: bool,
}

/// Loads history pages by stored sequence
#[derive(Clone)]
pub struct PaginationService {
    storage: Arc<dyn StorageEngine>,
    log: Arc<LogStore>,
}

impl PaginationService {
    pub fn new(storage: Arc<dyn StorageEngine>, log: Arc<LogStore>) -> Self {
        Self { storage, log }
    }

    /// Newest page of a thread, repairing the log first if it is inconsistent
    pub async fn load_initial(&self, thread_id: &str, page_size: usize) -> Result<Page> {
        self.log.ensure_consistent(thread_id).await?;
        let rows = self.storage.messages_before(thread_id, u64::MAX).await?;
        Ok(Page::from_tail(rows, page_size, true))
    }

    /// The page immediately older than `cursor`
    pub async fn load_older(&self, thread_id: &str, cursor: u64, page_size: usize) -> Result<Page> {
        let rows = self.storage.messages_before(thread_id, cursor).await?;
        Ok(Page::from_tail(rows, page_size, false))
    }
}

/// What a view should do after a log event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowUpdate {
    Unchanged,
    Updated,
    /// Sequences moved underneath the window; reload from `load_initial`
    ReloadRequired,
    Closed,
}

/// Messages currently shown for a thread, kept live from log events
#[derive(Debug, Clone)]
pub struct PaginationWindow {
    thread_id: String,
    messages: Vec<Message>,
    oldest_loaded_sequence: Option<u64>,
    has_more: bool,
}

impl PaginationWindow {
    pub fn new(thread_id: impl Into<String>, initial: Page) -> Self {
        Self {
            thread_id: thread_id.into(),
            oldest_loaded_sequence: initial.cursor,
            has_more: initial.has_more,
            messages: initial.messages,
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn cursor(&self) -> PaginationCursor {
        PaginationCursor {
            thread_id: self.thread_id.clone(),
            oldest_loaded_sequence: self.oldest_loaded_sequence,
            has_more: self.has_more,
        }
    }

    /// Prepend an older page; the cursor only ever moves backwards
    pub fn prepend(&mut self, page: Page) {
        self.has_more = page.has_more;
        if let Some(cursor) = page.cursor {
            self.oldest_loaded_sequence = Some(match self.oldest_loaded_sequence {
                Some(current) => current.min(cursor),
                None => cursor,
            });
        }
        let mut merged = page.messages;
        merged.retain(|m| !self.messages.iter().any(|shown| shown.id == m.id));
        merged.append(&mut self.messages);
        self.messages = merged;
    }

    /// Fold a log event into the window
    pub fn apply(&mut self, event: &LogEvent) -> WindowUpdate {
        if event.thread_id() != self.thread_id {
            return WindowUpdate::Unchanged;
        }

        match event {
            LogEvent::MessageUpserted { message } => {
                if let Some(shown) = self.messages.iter_mut().find(|m| m.id == message.id) {
                    *shown = message.clone();
                    WindowUpdate::Updated
                } else if is_content_bearing(message) {
                    self.messages.push(message.clone());
                    if self.oldest_loaded_sequence.is_none() {
                        self.oldest_loaded_sequence = message.sequence;
                    }
                    WindowUpdate::Updated
                } else {
                    WindowUpdate::Unchanged
                }
            }
            LogEvent::Repaired { .. } => WindowUpdate::ReloadRequired,
            LogEvent::SummarySaved { .. } => WindowUpdate::Unchanged,
            LogEvent::ThreadDeleted { .. } => {
                self.messages.clear();
                self.oldest_loaded_sequence = None;
                self.has_more = false;
                WindowUpdate::Closed
            }
        }
    }
}
