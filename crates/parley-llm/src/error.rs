use std::time::Duration;
use thiserror::Error;

/// Failure of a single completion attempt
///
/// Every variant is transient from the caller's point of view: turns mark the
/// user message undelivered, summaries fall back and enter retry mode.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Completion timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Provider error: {0}")]
    Provider(#[from] anyhow::Error),

    #[error("Provider returned an empty reply")]
    EmptyReply,
}

impl CompletionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
