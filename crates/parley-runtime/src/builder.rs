use anyhow::{anyhow, Result};
use parley_context::{ContextStrategy, DefaultContextStrategy, SummaryScheduler};
use parley_llm::CompletionProvider;
use parley_persist::{MediaStore, PersistClient};
use parley_types::{BatcherConfig, ContextConfig, SchedulerConfig, TurnConfig};
use std::sync::Arc;

use crate::batcher::Batcher;
use crate::engine::{ChatEngine, EngineParts};

/// Builder for constructing a ChatEngine with optional components
pub struct ChatEngineBuilder {
    provider: Option<Arc<dyn CompletionProvider>>,
    summary_provider: Option<Arc<dyn CompletionProvider>>,
    persist: Option<PersistClient>,
    context: Option<Arc<dyn ContextStrategy>>,
    media: Option<Arc<dyn MediaStore>>,
    batcher: BatcherConfig,
    scheduler: SchedulerConfig,
    context_config: ContextConfig,
    turn: TurnConfig,
}

impl ChatEngineBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            summary_provider: None,
            persist: None,
            context: None,
            media: None,
            batcher: BatcherConfig::default(),
            scheduler: SchedulerConfig::default(),
            context_config: ContextConfig::default(),
            turn: TurnConfig::default(),
        }
    }

    /// Set the provider used for chat turns
    pub fn provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use a different provider for summaries (defaults to the chat provider)
    pub fn summary_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.summary_provider = Some(provider);
        self
    }

    /// Set the persistence client (defaults to in-memory storage)
    pub fn persist(mut self, persist: PersistClient) -> Self {
        self.persist = Some(persist);
        self
    }

    /// Replace the default word-capped context strategy
    pub fn context_strategy(mut self, strategy: Arc<dyn ContextStrategy>) -> Self {
        self.context = Some(strategy);
        self
    }

    pub fn media_store(mut self, media: Arc<dyn MediaStore>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn batcher_config(mut self, config: BatcherConfig) -> Self {
        self.batcher = config;
        self
    }

    pub fn scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = config;
        self
    }

    pub fn context_config(mut self, config: ContextConfig) -> Self {
        self.context_config = config;
        self
    }

    pub fn turn_config(mut self, config: TurnConfig) -> Self {
        self.turn = config;
        self
    }

    /// Build the engine and start its flush dispatcher
    ///
    /// Must be called inside a Tokio runtime.
    pub fn build(self) -> Result<ChatEngine> {
        let provider = self
            .provider
            .ok_or_else(|| anyhow!("Completion provider is required"))?;
        let persist = self.persist.unwrap_or_else(PersistClient::in_memory);
        let summary_provider = self.summary_provider.unwrap_or_else(|| provider.clone());
        let context: Arc<dyn ContextStrategy> = match self.context {
            Some(context) => context,
            None => Arc::new(DefaultContextStrategy::new(self.context_config)),
        };

        let scheduler = SummaryScheduler::new(persist.clone(), summary_provider, self.scheduler);
        let (batcher, flushes) = Batcher::new(self.batcher);

        tracing::info!(
            "Starting chat engine with {} provider, {:?} batch window",
            provider.name(),
            batcher.config().window
        );

        let parts = EngineParts {
            persist,
            provider,
            context,
            scheduler,
            batcher,
            media: self.media,
            turn: self.turn,
        };
        Ok(ChatEngine::start(parts, flushes))
    }
}

impl Default for ChatEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
