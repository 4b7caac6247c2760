mod default;
mod scheduler;
mod strategy;
mod templates;

pub use default::{cap_words, DefaultContextStrategy};
pub use scheduler::{glimpse_indices, GeneratedSummary, SummaryOutcome, SummaryScheduler};
pub use strategy::{ContextRequest, ContextStrategy, ContextWindow};
pub use templates::{DEFAULT_SUMMARIZATION_PROMPT, SUMMARY_INSTRUCTION};
