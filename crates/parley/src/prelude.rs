//! Prelude module for convenient imports
//!
//! Import everything you need with:
//! ```rust
//! use parley::prelude::*;
//! ```

pub use crate::{
    BatcherConfig, ChatEngine, ChatEngineBuilder, CompletionProvider, CompletionRequest,
    ContextStrategy, DefaultContextStrategy, Message, MessageRole, PaginationService,
    PaginationWindow, PersistClient, ProviderConfig, ProviderFactory, SchedulerConfig,
    SummaryScheduler, Thread, ThreadConfig, TurnConfig, TurnOutcome,
};
