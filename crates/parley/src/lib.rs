//! # Parley
//!
//! Keeps per-thread chat logs consistent, paginated and summarized while
//! input arrives in bursts and the completion provider is unreliable.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let provider = ProviderFactory::create(ProviderConfig::openai(
//!         std::env::var("PARLEY_API_KEY")?,
//!     ))?;
//!
//!     let persist = PersistClient::in_memory();
//!     let thread = persist
//!         .threads()
//!         .create_thread("Evening chat", ThreadConfig::new("Mira", "Be warm and brief."))
//!         .await?;
//!
//!     let engine = ChatEngine::builder()
//!         .provider(provider)
//!         .persist(persist)
//!         .build()?;
//!
//!     let mut turns = engine.subscribe_turns();
//!     engine.submit(&thread.id, "hey").await?;
//!     engine.flush(&thread.id).await;
//!
//!     if let TurnOutcome::Replied { reply, .. } = turns.recv().await? {
//!         println!("{}", reply.content);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **`parley-types`**: threads, messages, summaries, runtime configuration
//! - **`parley-llm`**: completion providers (direct HTTP, OpenAI-style)
//! - **`parley-persist`**: storage engines, sequencer, log store, pagination
//! - **`parley-context`**: word-capped context assembly, summary scheduler
//! - **`parley-runtime`**: input batcher and chat turn pipeline

pub mod prelude;

pub use parley_types::{
    BatcherConfig, ContextConfig, Delivery, LogEvent, Message, MessageRole, SchedulerConfig,
    Summary, SummaryMode, SummaryState, Thread, ThreadConfig, TurnConfig,
};

pub use parley_llm::{
    complete_with_timeout, CompletionError, CompletionOptions, CompletionProvider,
    CompletionRequest, HttpCompletionClient, HttpConfig, OpenAIClient, OpenAIConfig,
    ProviderConfig, ProviderDetails, ProviderFactory, ProviderType,
};

pub use parley_persist::{
    is_content_bearing, is_media_request, media_tag, parse_media_id, LogStore, MediaStore,
    MemoryMediaStore, MemoryStorage, Page, PaginationCursor, PaginationService, PaginationWindow, PersistClient, PersistClientBuilder,
    PersistError, Sequencer, StorageEngine, SummaryRepository, ThreadRepository, WindowUpdate,
};

#[cfg(feature = "mongodb")]
pub use parley_persist::MongoStorage;

pub use parley_context::{
    ContextRequest, ContextStrategy, ContextWindow, DefaultContextStrategy, SummaryOutcome,
    SummaryScheduler,
};

pub use parley_runtime::{BatchFlush, Batcher, ChatEngine, ChatEngineBuilder, TurnOutcome};
