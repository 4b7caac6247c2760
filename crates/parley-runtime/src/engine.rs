use anyhow::{anyhow, bail, Result};
use parley_context::{ContextRequest, ContextStrategy, SummaryScheduler};
use parley_llm::{complete_with_timeout, CompletionProvider, CompletionRequest};
use parley_persist::{
    is_content_bearing, is_media_request, media_tag, MediaStore, PersistClient,
};
use parley_types::{Delivery, Message, ThreadConfig, TurnConfig};
use std::sync::{Arc, OnceLock};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::batcher::{BatchFlush, Batcher, Fragment};

/// Result of one turn, published after everything is persisted
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    Replied {
        thread_id: String,
        fragment_ids: Vec<String>,
        reply: Message,
        /// Set when the reply asked for media and the store supplied one
        media: Option<Message>,
    },
    Failed {
        thread_id: String,
        fragment_ids: Vec<String>,
        error: String,
    },
}

impl TurnOutcome {
    pub fn thread_id(&self) -> &str {
        match self {
            Self::Replied { thread_id, .. } | Self::Failed { thread_id, .. } => thread_id,
        }
    }

    pub fn is_replied(&self) -> bool {
        matches!(self, Self::Replied { .. })
    }
}

pub(crate) struct EngineParts {
    pub persist: PersistClient,
    pub provider: Arc<dyn CompletionProvider>,
    pub context: Arc<dyn ContextStrategy>,
    pub scheduler: SummaryScheduler,
    pub batcher: Batcher,
    pub media: Option<Arc<dyn MediaStore>>,
    pub turn: TurnConfig,
}

struct EngineInner {
    parts: EngineParts,
    outcomes: broadcast::Sender<TurnOutcome>,
    dispatcher: OnceLock<JoinHandle<()>>,
}

/// Runs chat turns: batches input, calls the provider, persists the result
#[derive(Clone)]
pub struct ChatEngine {
    inner: Arc<EngineInner>,
}

impl ChatEngine {
    /// Create a builder for fluent construction
    pub fn builder() -> crate::builder::ChatEngineBuilder {
        crate::builder::ChatEngineBuilder::new()
    }

    pub(crate) fn start(parts: EngineParts, flushes: mpsc::Receiver<BatchFlush>) -> Self {
        let (outcomes, _) = broadcast::channel(256);
        let engine = Self {
            inner: Arc::new(EngineInner {
                parts,
                outcomes,
                dispatcher: OnceLock::new(),
            }),
        };
        let _ = engine.inner.dispatcher.set(engine.spawn_dispatcher(flushes));
        engine
    }

    /// Stop picking up flushes; turns already running finish on their own
    pub fn shutdown(&self) {
        if let Some(dispatcher) = self.inner.dispatcher.get() {
            dispatcher.abort();
        }
    }

    // Every flush gets its own task so threads never wait on each other
    fn spawn_dispatcher(&self, mut flushes: mpsc::Receiver<BatchFlush>) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            while let Some(flush) = flushes.recv().await {
                let engine = engine.clone();
                tokio::spawn(async move {
                    let outcome = engine.process_flush(flush).await;
                    let _ = engine.inner.outcomes.send(outcome);
                });
            }
            tracing::debug!("Flush channel closed, dispatcher stopping");
        })
    }

    pub fn persist(&self) -> &PersistClient {
        &self.inner.parts.persist
    }

    pub fn scheduler(&self) -> &SummaryScheduler {
        &self.inner.parts.scheduler
    }

    pub fn batcher(&self) -> &Batcher {
        &self.inner.parts.batcher
    }

    pub fn subscribe_turns(&self) -> broadcast::Receiver<TurnOutcome> {
        self.inner.outcomes.subscribe()
    }

    /// Accept user input for a thread
    ///
    /// The user row is stored right away as pending under the fragment's id,
    /// then the fragment waits in the batcher for the rest of the turn. A
    /// content-bearing row counts toward the next summary as soon as it is
    /// stored; whether one is due is checked after the reply.
    pub async fn submit(&self, thread_id: &str, content: impl Into<String>) -> Result<Message> {
        let fragment = Fragment::new(content);
        let message = Message::user(thread_id, fragment.content.clone()).with_id(fragment.id.clone());
        let stored = self.persist().log().append(thread_id, message).await?;
        if is_content_bearing(&stored) {
            self.count_for_summary(thread_id).await;
        }

        self.batcher().submit_fragment(thread_id, fragment).await;
        self.persist().threads().touch(thread_id).await?;
        Ok(stored)
    }

    /// Send pending input for a thread without waiting for the window
    pub async fn flush(&self, thread_id: &str) -> bool {
        self.batcher().force_flush(thread_id).await
    }

    /// Leaving a thread sends whatever was still buffered for it
    pub async fn switch_thread(&self, from_thread_id: &str) -> bool {
        let flushed = self.flush(from_thread_id).await;
        if flushed {
            tracing::info!("Flushed pending input of thread {} on switch", from_thread_id);
        }
        flushed
    }

    /// Delete a thread along with its buffered input and scheduled summary
    ///
    /// Returns how many buffered fragments were dropped. A turn already
    /// running for the thread is not interrupted.
    pub async fn delete_thread(&self, thread_id: &str) -> Result<usize> {
        if self.scheduler().cancel(thread_id).await {
            tracing::debug!("Cancelled scheduled summary of thread {}", thread_id);
        }
        let dropped = self.batcher().discard(thread_id).await;
        self.persist().delete_thread(thread_id).await?;
        tracing::info!("Deleted thread {} ({} buffered fragments dropped)", thread_id, dropped);
        Ok(dropped)
    }

    /// Queue an undelivered user message again
    pub async fn resend(&self, thread_id: &str, message_id: &str) -> Result<Message> {
        let message = self
            .persist()
            .log()
            .get(thread_id, message_id)
            .await?
            .ok_or_else(|| anyhow!("Message {} not found in thread {}", message_id, thread_id))?;

        if !message.is_user() {
            bail!("Only user messages can be resent");
        }
        if message.delivery != Delivery::Undelivered && !message.error {
            bail!("Message {} was not marked undelivered", message_id);
        }

        let updated = self
            .persist()
            .log()
            .update(thread_id, message_id, |m| {
                m.delivery = Delivery::Pending;
                m.error = false;
            })
            .await?;

        self.batcher()
            .submit_fragment(
                thread_id,
                Fragment {
                    id: updated.id.clone(),
                    content: updated.content.clone(),
                },
            )
            .await;
        Ok(updated)
    }

    /// Context the next turn of this thread would send
    pub async fn preview_context(&self, thread_id: &str) -> Result<String> {
        let config = self.thread_config(thread_id).await?;
        let request = ContextRequest::new(thread_id, config.rules, config.bot_name);
        let window = self
            .inner
            .parts
            .context
            .get_context_window(&request, self.persist())
            .await?;
        Ok(window.text)
    }

    async fn thread_config(&self, thread_id: &str) -> Result<ThreadConfig> {
        Ok(self
            .persist()
            .threads()
            .get_thread(thread_id)
            .await?
            .map(|t| t.config)
            .unwrap_or_default())
    }

    /// Run one flushed batch through the provider
    pub async fn process_flush(&self, flush: BatchFlush) -> TurnOutcome {
        let thread_id = flush.thread_id.clone();
        match self.run_turn(&flush).await {
            Ok((reply, media)) => TurnOutcome::Replied {
                thread_id,
                fragment_ids: flush.fragment_ids,
                reply,
                media,
            },
            Err(e) => {
                tracing::warn!("Turn failed for thread {}: {}", thread_id, e);
                if let Err(mark_err) = self.mark_fragments_failed(&flush).await {
                    tracing::error!(
                        "Could not mark fragments undelivered in thread {}: {}",
                        thread_id,
                        mark_err
                    );
                }
                TurnOutcome::Failed {
                    thread_id,
                    fragment_ids: flush.fragment_ids,
                    error: e.to_string(),
                }
            }
        }
    }

    async fn run_turn(&self, flush: &BatchFlush) -> Result<(Message, Option<Message>)> {
        let parts = &self.inner.parts;
        let thread_id = flush.thread_id.as_str();
        let log = parts.persist.log();

        // 1. Context without the fragments being sent now
        let config = self.thread_config(thread_id).await?;
        let request = ContextRequest::new(thread_id, config.rules.clone(), config.bot_name.clone())
            .excluding(flush.fragment_ids.iter().cloned());
        let context = parts.context.get_context_window(&request, &parts.persist).await?;

        // 2. Placeholder row for the reply
        let placeholder = log
            .append(thread_id, Message::assistant_placeholder(thread_id))
            .await?;

        // 3. Provider call
        let completion = CompletionRequest::new(flush.content.clone())
            .with_context(context.text)
            .with_user(config.user_name.clone())
            .with_rules(config.rules.clone())
            .with_model(parts.turn.model.clone());

        let reply_text =
            match complete_with_timeout(parts.provider.as_ref(), completion, parts.turn.timeout).await {
                Ok(text) => text,
                Err(e) => {
                    if let Err(close_err) = log.update(thread_id, &placeholder.id, |m| m.fail()).await {
                        tracing::error!("Could not close placeholder {}: {}", placeholder.id, close_err);
                    }
                    return Err(e.into());
                }
            };

        // 4. Persist the reply and the delivered fragments
        let reply = log
            .update(thread_id, &placeholder.id, |m| m.complete(reply_text.trim()))
            .await?;
        for fragment_id in &flush.fragment_ids {
            log.update(thread_id, fragment_id, |m| {
                m.delivery = Delivery::Delivered;
                m.error = false;
            })
            .await?;
        }

        // 5. Media request
        let media = if is_media_request(&reply.content) {
            self.send_media(thread_id).await?
        } else {
            None
        };

        // 6. Summaries never hold up or fail the turn
        if is_content_bearing(&reply) {
            self.count_for_summary(thread_id).await;
        }
        self.check_summary(thread_id).await;
        parts.persist.threads().touch(thread_id).await?;

        Ok((reply, media))
    }

    async fn send_media(&self, thread_id: &str) -> Result<Option<Message>> {
        let Some(store) = &self.inner.parts.media else {
            tracing::debug!("Media requested in thread {} but no media store configured", thread_id);
            return Ok(None);
        };
        let Some(media_id) = store.next_media(thread_id).await? else {
            tracing::debug!("Media requested in thread {} but the store is empty", thread_id);
            return Ok(None);
        };

        let message = Message::assistant(thread_id, media_tag(&media_id)).with_media_ref(media_id);
        let stored = self.persist().log().append(thread_id, message).await?;
        Ok(Some(stored))
    }

    async fn count_for_summary(&self, thread_id: &str) {
        if let Err(e) = self.scheduler().record_message(thread_id).await {
            tracing::warn!("Could not update summary state for thread {}: {}", thread_id, e);
        }
    }

    async fn check_summary(&self, thread_id: &str) {
        let scheduler = self.scheduler();
        if scheduler.config().delay.is_zero() {
            scheduler.run_if_due(thread_id).await;
        } else {
            scheduler.schedule(thread_id).await;
        }
    }

    async fn mark_fragments_failed(&self, flush: &BatchFlush) -> Result<()> {
        let log = self.persist().log();
        for fragment_id in &flush.fragment_ids {
            log.update(&flush.thread_id, fragment_id, |m| m.fail()).await?;
        }
        Ok(())
    }
}
