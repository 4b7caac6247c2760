use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single row of a thread's message log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "conversation_id")]
    pub thread_id: String,
    pub role: MessageRole,
    /// May be empty while an assistant reply is pending
    pub content: String,
    /// Assigned by the log store on first append when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "is_delivered", default)]
    pub delivery: Delivery,
    #[serde(default)]
    pub is_loading: bool,
    #[serde(default)]
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_ref: Option<String>,
}

impl Message {
    fn new(thread_id: impl Into<String>, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            role,
            content: content.into(),
            sequence: None,
            timestamp: Utc::now(),
            delivery: Delivery::Pending,
            is_loading: false,
            error: false,
            media_ref: None,
        }
    }

    /// Create a user message awaiting delivery
    pub fn user(thread_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(thread_id, MessageRole::User, content)
    }

    /// Create a finished assistant message
    pub fn assistant(thread_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut message = Self::new(thread_id, MessageRole::Assistant, content);
        message.delivery = Delivery::Delivered;
        message
    }

    /// Create the empty, loading assistant row shown while a turn is in flight
    pub fn assistant_placeholder(thread_id: impl Into<String>) -> Self {
        let mut message = Self::new(thread_id, MessageRole::Assistant, "");
        message.is_loading = true;
        message
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn with_media_ref(mut self, media_ref: impl Into<String>) -> Self {
        self.media_ref = Some(media_ref.into());
        self
    }

    /// Sequence for ordering purposes; unsequenced rows sort as 0
    pub fn sequence_or_default(&self) -> u64 {
        self.sequence.unwrap_or(0)
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == MessageRole::Assistant
    }

    /// Finalize an in-flight assistant row with the provider's reply
    pub fn complete(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.is_loading = false;
        self.error = false;
        self.delivery = Delivery::Delivered;
    }

    /// Close a row whose turn failed
    pub fn fail(&mut self) {
        self.is_loading = false;
        self.error = true;
        self.delivery = Delivery::Undelivered;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery state of a message, persisted as a nullable boolean
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Delivery {
    #[default]
    Pending,
    Delivered,
    Undelivered,
}

impl From<Option<bool>> for Delivery {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Self::Pending,
            Some(true) => Self::Delivered,
            Some(false) => Self::Undelivered,
        }
    }
}

impl From<Delivery> for Option<bool> {
    fn from(value: Delivery) -> Self {
        match value {
            Delivery::Pending => None,
            Delivery::Delivered => Some(true),
            Delivery::Undelivered => Some(false),
        }
    }
}
