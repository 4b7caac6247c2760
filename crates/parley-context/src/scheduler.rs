use anyhow::Result;
use parley_llm::{complete_with_timeout, CompletionProvider, CompletionRequest};
use parley_persist::PersistClient;
use parley_types::{Message, MessageRole, SchedulerConfig, Summary, SummaryState};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::templates::{DEFAULT_SUMMARIZATION_PROMPT, NONE_YET, SUMMARY_INSTRUCTION};

/// Indices of `glimpses` messages spread evenly over `total`
///
/// Index i (1-based) is `floor(i * total / (glimpses + 1))`, clamped to the
/// last message. Repeats are dropped, so short histories yield fewer indices.
pub fn glimpse_indices(total: usize, glimpses: usize) -> Vec<usize> {
    if total == 0 {
        return Vec::new();
    }
    let mut indices: Vec<usize> = (1..=glimpses)
        .map(|i| (i * total / (glimpses + 1)).min(total - 1))
        .collect();
    indices.dedup();
    indices
}

fn first_clause(content: &str) -> &str {
    let end = content
        .find(['.', '!', '?', ',', ';', '\n'])
        .unwrap_or(content.len());
    content[..end].trim()
}

/// Local summary used when the provider cannot produce one
fn fallback_summary(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| m.role == MessageRole::User)
        .map(|m| first_clause(&m.content))
        .filter(|clause| !clause.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

fn transcript(messages: &[Message]) -> String {
    if messages.is_empty() {
        return NONE_YET.to_string();
    }
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text produced by one generation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSummary {
    pub text: String,
    /// True when the provider failed and `text` is the local fallback
    pub fallback: bool,
}

/// What a scheduler run did
#[derive(Debug, Clone)]
pub enum SummaryOutcome {
    /// Not due yet, or another run for the thread is in flight
    Skipped,
    Saved(Summary),
    /// Generation or save failed; the thread is now in retry mode
    Failed,
}

impl SummaryOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved(_))
    }
}

struct SchedulerInner {
    persist: PersistClient,
    provider: Arc<dyn CompletionProvider>,
    config: SchedulerConfig,
    timers: Mutex<HashMap<String, (u64, JoinHandle<()>)>>,
    in_flight: Mutex<HashSet<String>>,
    generation: AtomicU64,
}

/// Decides when to summarize a thread and keeps NORMAL/RETRY state durable
#[derive(Clone)]
pub struct SummaryScheduler {
    inner: Arc<SchedulerInner>,
}

impl SummaryScheduler {
    pub fn new(
        persist: PersistClient,
        provider: Arc<dyn CompletionProvider>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                persist,
                provider,
                config,
                timers: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashSet::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Count one content-bearing message, from either side, toward the next summary
    pub async fn record_message(&self, thread_id: &str) -> Result<SummaryState> {
        let state = self
            .inner
            .persist
            .summaries()
            .update_state(thread_id, |state| state.record_message())
            .await?;
        Ok(state)
    }

    /// RETRY is always due; NORMAL is due once TRIGGER messages have accrued
    pub async fn should_generate_or_retry(&self, thread_id: &str) -> Result<bool> {
        let state = self.inner.persist.summaries().state(thread_id).await?;
        Ok(state.is_in_retry_mode() || state.pending() >= self.inner.config.trigger)
    }

    /// Ask the provider for a summary, falling back locally on any failure
    ///
    /// Only storage reads can fail this call; provider errors, timeouts and
    /// blank replies all resolve to the fallback.
    pub async fn generate_summary_strict(&self, thread_id: &str) -> Result<GeneratedSummary> {
        let config = &self.inner.config;
        let persist = &self.inner.persist;

        // 1. Gather material
        let rules = persist
            .threads()
            .get_thread(thread_id)
            .await?
            .map(|t| t.config.rules)
            .unwrap_or_default();
        let prior = persist.summaries().latest(thread_id, config.prior_summaries).await?;
        let messages = persist.log().list_content_bearing(thread_id).await?;

        let glimpses: Vec<Message> = glimpse_indices(messages.len(), config.glimpses)
            .into_iter()
            .map(|i| messages[i].clone())
            .collect();
        let recent = &messages[messages.len().saturating_sub(config.recent_messages)..];

        // 2. Build prompt
        let previous = if prior.is_empty() {
            NONE_YET.to_string()
        } else {
            prior
                .iter()
                .map(|s| s.summary.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        };
        let rules_text = if rules.trim().is_empty() { NONE_YET } else { rules.as_str() };
        let prompt = DEFAULT_SUMMARIZATION_PROMPT
            .replace("<rules>", rules_text)
            .replace("<previous_summaries>", &previous)
            .replace("<glimpses>", &transcript(&glimpses))
            .replace("<recent_messages>", &transcript(recent));

        let request = CompletionRequest::new(SUMMARY_INSTRUCTION)
            .with_rules(prompt)
            .with_model(config.model.clone());

        // 3. Call provider under the timeout
        match complete_with_timeout(self.inner.provider.as_ref(), request, config.timeout).await {
            Ok(text) => Ok(GeneratedSummary {
                text: text.trim().to_string(),
                fallback: false,
            }),
            Err(e) => {
                tracing::warn!("Summary generation failed for thread {}: {}", thread_id, e);
                Ok(GeneratedSummary {
                    text: fallback_summary(recent),
                    fallback: true,
                })
            }
        }
    }

    /// Store a summary, return the thread to NORMAL and prune old summaries
    pub async fn save_summary(&self, thread_id: &str, text: &str) -> Result<Summary> {
        let summaries = self.inner.persist.summaries();
        let summary = summaries.save(thread_id, text).await?;

        summaries
            .update_state(thread_id, |state| state.record_success())
            .await?;

        summaries.prune(thread_id, self.inner.config.retention).await?;
        Ok(summary)
    }

    async fn mark_failed(&self, thread_id: &str) -> Result<()> {
        self.inner
            .persist
            .summaries()
            .update_state(thread_id, |state| state.record_failure())
            .await?;
        Ok(())
    }

    /// One attempt: check, generate, save
    ///
    /// A fallback is never saved; it counts as a failure so the next check
    /// retries.
    pub async fn run(&self, thread_id: &str) -> Result<SummaryOutcome> {
        if !self.should_generate_or_retry(thread_id).await? {
            return Ok(SummaryOutcome::Skipped);
        }

        let generated = self.generate_summary_strict(thread_id).await?;
        if generated.fallback {
            self.mark_failed(thread_id).await?;
            return Ok(SummaryOutcome::Failed);
        }

        match self.save_summary(thread_id, &generated.text).await {
            Ok(summary) => Ok(SummaryOutcome::Saved(summary)),
            Err(e) => {
                tracing::warn!("Failed to save summary for thread {}: {}", thread_id, e);
                self.mark_failed(thread_id).await?;
                Ok(SummaryOutcome::Failed)
            }
        }
    }

    /// Run if due, never failing the caller
    ///
    /// Concurrent calls for the same thread collapse into one attempt.
    pub async fn run_if_due(&self, thread_id: &str) -> SummaryOutcome {
        if !self.inner.in_flight.lock().await.insert(thread_id.to_string()) {
            tracing::debug!("Summary already running for thread {}", thread_id);
            return SummaryOutcome::Skipped;
        }

        let outcome = match self.run(thread_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Summary run failed for thread {}: {}", thread_id, e);
                if let Err(e) = self.mark_failed(thread_id).await {
                    tracing::warn!("Could not record summary failure for {}: {}", thread_id, e);
                }
                SummaryOutcome::Failed
            }
        };

        self.inner.in_flight.lock().await.remove(thread_id);
        outcome
    }

    /// Run after the configured delay, replacing any pending run for the thread
    pub async fn schedule(&self, thread_id: &str) {
        let generation = self
            .inner
            .generation
            .fetch_add(1, Ordering::Relaxed);
        let scheduler = self.clone();
        let thread = thread_id.to_string();
        let delay = self.inner.config.delay;

        // Hold the map while spawning so the task cannot look itself up first
        let mut timers = self.inner.timers.lock().await;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut timers = scheduler.inner.timers.lock().await;
                match timers.get(&thread) {
                    Some((current, _)) if *current == generation => {
                        timers.remove(&thread);
                    }
                    _ => return,
                }
            }
            scheduler.run_if_due(&thread).await;
        });

        if let Some((_, previous)) = timers.insert(thread_id.to_string(), (generation, handle)) {
            previous.abort();
        }
    }

    /// Drop a pending scheduled run; returns whether one existed
    pub async fn cancel(&self, thread_id: &str) -> bool {
        match self.inner.timers.lock().await.remove(thread_id) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub async fn has_pending(&self, thread_id: &str) -> bool {
        self.inner.timers.lock().await.contains_key(thread_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glimpse_indices() {
        assert_eq!(glimpse_indices(12, 5), vec![2, 4, 6, 8, 10]);
        assert_eq!(glimpse_indices(2, 5), vec![0, 1]);
        assert_eq!(glimpse_indices(1, 5), vec![0]);
        assert!(glimpse_indices(0, 5).is_empty());
        assert!(glimpse_indices(10, 0).is_empty());
    }

    #[test]
    fn test_fallback_takes_first_clause_of_user_lines() {
        let messages = vec![
            Message::user("t", "I moved to Porto. It rains a lot"),
            Message::assistant("t", "Nice, how is it?"),
            Message::user("t", "Great, thanks!"),
            Message::user("t", "..."),
        ];
        assert_eq!(fallback_summary(&messages), "I moved to Porto; Great");
    }

    #[test]
    fn test_transcript_labels_roles() {
        let messages = vec![Message::user("t", "hi"), Message::assistant("t", "yo")];
        assert_eq!(transcript(&messages), "user: hi\nassistant: yo");
        assert_eq!(transcript(&[]), NONE_YET);
    }
}
