use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A rolling summary of a thread, created only when generation succeeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub id: String,
    pub thread_id: String,
    pub summary: String,
    /// Per-thread counter, independent from message sequences
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
}

impl Summary {
    pub fn new(thread_id: impl Into<String>, summary: impl Into<String>, sequence: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            summary: summary.into(),
            sequence,
            created_at: Utc::now(),
        }
    }
}

/// Scheduler mode, persisted as `is_in_retry_mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "bool", into = "bool")]
pub enum SummaryMode {
    #[default]
    Normal,
    Retry,
}

impl From<bool> for SummaryMode {
    fn from(in_retry: bool) -> Self {
        if in_retry {
            Self::Retry
        } else {
            Self::Normal
        }
    }
}

impl From<SummaryMode> for bool {
    fn from(mode: SummaryMode) -> Self {
        mode == SummaryMode::Retry
    }
}

/// Per-thread bookkeeping for the summary scheduler
///
/// `last_summary_message_count <= message_count` holds after every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryState {
    pub thread_id: String,
    pub message_count: u64,
    pub last_summary_message_count: u64,
    #[serde(rename = "is_in_retry_mode")]
    pub mode: SummaryMode,
    pub last_updated: DateTime<Utc>,
}

impl SummaryState {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            message_count: 0,
            last_summary_message_count: 0,
            mode: SummaryMode::Normal,
            last_updated: Utc::now(),
        }
    }

    pub fn is_in_retry_mode(&self) -> bool {
        self.mode == SummaryMode::Retry
    }

    /// Messages counted since the last successful summary
    pub fn pending(&self) -> u64 {
        self.message_count.saturating_sub(self.last_summary_message_count)
    }

    pub fn record_message(&mut self) {
        self.message_count += 1;
        self.last_updated = Utc::now();
    }

    /// Successful save: back to NORMAL and caught up in one step
    pub fn record_success(&mut self) {
        self.mode = SummaryMode::Normal;
        self.last_summary_message_count = self.message_count;
        self.last_updated = Utc::now();
    }

    pub fn record_failure(&mut self) {
        self.mode = SummaryMode::Retry;
        self.last_updated = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_clears_retry_and_catches_up() {
        let mut state = SummaryState::new("t1");
        for _ in 0..7 {
            state.record_message();
        }
        state.record_failure();
        assert!(state.is_in_retry_mode());
        assert_eq!(state.pending(), 7);

        state.record_success();
        assert!(!state.is_in_retry_mode());
        assert_eq!(state.last_summary_message_count, 7);
        assert_eq!(state.pending(), 0);
    }

    #[test]
    fn test_mode_persists_as_flag() {
        let mut state = SummaryState::new("t1");
        state.record_failure();
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["is_in_retry_mode"], true);

        let back: SummaryState = serde_json::from_value(json).unwrap();
        assert_eq!(back.mode, SummaryMode::Retry);
    }
}
