use anyhow::Result;
use async_trait::async_trait;
use parley_persist::PersistClient;
use std::collections::HashSet;

/// Inputs for one outbound turn
#[derive(Debug, Clone, Default)]
pub struct ContextRequest {
    pub thread_id: String,
    pub rules: String,
    pub bot_name: String,
    /// Messages to leave out, e.g. the fragments being sent in this turn
    pub exclude_ids: HashSet<String>,
}

impl ContextRequest {
    pub fn new(
        thread_id: impl Into<String>,
        rules: impl Into<String>,
        bot_name: impl Into<String>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            rules: rules.into(),
            bot_name: bot_name.into(),
            exclude_ids: HashSet::new(),
        }
    }

    pub fn excluding<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_ids.extend(ids.into_iter().map(Into::into));
        self
    }
}

/// Result of context assembly
#[derive(Debug, Clone)]
pub struct ContextWindow {
    pub text: String,
    pub word_count: usize,
    pub truncated: bool,
}

/// Strategy for building the context string sent with a turn
#[async_trait]
pub trait ContextStrategy: Send + Sync {
    async fn get_context_window(
        &self,
        request: &ContextRequest,
        persist: &PersistClient,
    ) -> Result<ContextWindow>;
}
