use serde::{Deserialize, Serialize};

use crate::traits::CompletionRequest;

/// Chat-completions message (OpenAI wire shape)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    /// System prompt (instructions)
    System { content: String },

    User {
        content: String,

        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    Assistant { content: String },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System { content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
            name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant { content: content.into() }
    }

    pub fn role(&self) -> &str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::System { content } | Self::User { content, .. } | Self::Assistant { content } => content,
        }
    }

    /// Map a completion request onto the chat message list
    ///
    /// Rules come first, then the assembled context, then the user's input.
    pub fn from_request(request: &CompletionRequest) -> Vec<Self> {
        let mut messages = Vec::with_capacity(3);

        if !request.rules.trim().is_empty() {
            messages.push(Self::system(request.rules.clone()));
        }
        if !request.context.trim().is_empty() {
            messages.push(Self::system(request.context.clone()));
        }
        messages.push(Self::user(request.message.clone()));

        messages
    }
}
