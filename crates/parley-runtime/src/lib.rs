pub mod batcher;
pub mod builder;
pub mod engine;

pub use batcher::{BatchFlush, Batcher, Fragment};
pub use builder::ChatEngineBuilder;
pub use engine::{ChatEngine, TurnOutcome};

// Re-export key types from parley-types
pub use parley_types::{BatcherConfig, ContextConfig, SchedulerConfig, TurnConfig};
