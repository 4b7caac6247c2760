use anyhow::Result;
use async_trait::async_trait;
use parley_persist::PersistClient;
use parley_types::{ContextConfig, Message, MessageRole};

use crate::strategy::{ContextRequest, ContextStrategy, ContextWindow};

/// Truncate to `max_words` whitespace-separated words
///
/// Text within the limit is returned untouched. Truncated text is re-joined
/// with single spaces and gets the ellipsis appended as one extra word.
pub fn cap_words(text: &str, max_words: usize, ellipsis: &str) -> (String, bool) {
    let mut words = text.split_whitespace();
    let kept: Vec<&str> = words.by_ref().take(max_words).collect();
    if words.next().is_none() {
        return (text.to_string(), false);
    }
    (format!("{} {}", kept.join(" "), ellipsis), true)
}

/// Rules, then recent summaries, then the last few conversational lines
pub struct DefaultContextStrategy {
    config: ContextConfig,
}

impl DefaultContextStrategy {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Assemble the context for a thread
    pub async fn generate_context(
        &self,
        persist: &PersistClient,
        thread_id: &str,
        rules: &str,
        bot_name: &str,
    ) -> Result<String> {
        let request = ContextRequest::new(thread_id, rules, bot_name);
        Ok(self.get_context_window(&request, persist).await?.text)
    }

    fn render_line(message: &Message, bot_name: &str) -> String {
        match message.role {
            MessageRole::User => format!("User: {}", message.content),
            MessageRole::Assistant => format!("{}: {}", bot_name, message.content),
        }
    }
}

impl Default for DefaultContextStrategy {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}

#[async_trait]
impl ContextStrategy for DefaultContextStrategy {
    async fn get_context_window(
        &self,
        request: &ContextRequest,
        persist: &PersistClient,
    ) -> Result<ContextWindow> {
        let mut sections: Vec<String> = Vec::new();

        // 1. Rules
        if !request.rules.trim().is_empty() {
            sections.push(request.rules.trim().to_string());
        }

        // 2. Most recent summaries, oldest first
        let summaries = persist
            .summaries()
            .latest(&request.thread_id, self.config.max_summaries)
            .await?;
        if !summaries.is_empty() {
            let lines: Vec<String> = summaries
                .iter()
                .map(|s| format!("Summary: {}", s.summary.trim()))
                .collect();
            sections.push(lines.join("\n"));
        }

        // 3. Recent conversation
        let mut messages = persist.log().list_content_bearing(&request.thread_id).await?;
        messages.retain(|m| !request.exclude_ids.contains(&m.id));
        let skip = messages.len().saturating_sub(self.config.recent_messages);
        let lines: Vec<String> = messages[skip..]
            .iter()
            .map(|m| Self::render_line(m, &request.bot_name))
            .collect();
        if !lines.is_empty() {
            sections.push(lines.join("\n"));
        }

        // 4. Word cap over the whole string
        let assembled = sections.join("\n\n");
        let (text, truncated) = cap_words(&assembled, self.config.max_words, &self.config.ellipsis);
        if truncated {
            tracing::debug!(
                "Context for thread {} truncated to {} words",
                request.thread_id,
                self.config.max_words
            );
        }

        Ok(ContextWindow {
            word_count: text.split_whitespace().count(),
            text,
            truncated,
        })
    }
}
