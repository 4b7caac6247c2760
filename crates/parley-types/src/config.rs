use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Debounce policy for coalescing rapid user input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatcherConfig {
    /// Quiet period after the last submit before a thread's buffer flushes
    pub window: Duration,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self::interactive()
    }
}

impl BatcherConfig {
    /// Short window for conversational back-and-forth
    pub fn interactive() -> Self {
        Self {
            window: Duration::from_secs(10),
        }
    }

    /// Longer window that concatenates bursts of messages into one turn
    pub fn concatenation() -> Self {
        Self {
            window: Duration::from_secs(30),
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Content-bearing messages, user and assistant alike, between summaries in NORMAL mode
    pub trigger: u64,
    /// Summaries retained per thread
    pub retention: usize,
    pub timeout: Duration,
    pub glimpses: usize,
    /// Prior summaries fed back into the summarization prompt
    pub prior_summaries: usize,
    pub recent_messages: usize,
    /// Zero runs the scheduler inline after each turn
    pub delay: Duration,
    pub model: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            trigger: 5,
            retention: 5,
            timeout: Duration::from_secs(15),
            glimpses: 5,
            prior_summaries: 2,
            recent_messages: 10,
            delay: Duration::ZERO,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trigger(mut self, trigger: u64) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Hard cap over the whole assembled context
    pub max_words: usize,
    pub max_summaries: usize,
    pub recent_messages: usize,
    pub ellipsis: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_words: 1200,
            max_summaries: 3,
            recent_messages: 5,
            ellipsis: "...".to_string(),
        }
    }
}

impl ContextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_words(mut self, max_words: usize) -> Self {
        self.max_words = max_words;
        self
    }

    pub fn with_recent_messages(mut self, count: usize) -> Self {
        self.recent_messages = count;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Upper bound on a single chat completion
    pub timeout: Duration,
    pub model: String,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            model: "gpt-4o".to_string(),
        }
    }
}

impl TurnConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}
