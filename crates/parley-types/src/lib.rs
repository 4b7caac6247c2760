pub mod config;
pub mod events;
pub mod message;
pub mod summary;
pub mod thread;

pub use config::{BatcherConfig, ContextConfig, SchedulerConfig, TurnConfig};
pub use events::LogEvent;
pub use message::{Delivery, Message, MessageRole};
pub use summary::{Summary, SummaryMode, SummaryState};
pub use thread::{Thread, ThreadConfig};
