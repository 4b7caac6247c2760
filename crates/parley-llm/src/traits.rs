use anyhow::Result;
use async_trait::async_trait;

/// Text completion backend
///
/// The core only depends on `request -> text`; transports live behind this trait.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Single non-streaming completion
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Short identifier used in logs
    fn name(&self) -> &str;
}

/// One outbound completion: assembled context plus the new user input
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub context: String,
    pub message: String,
    pub user: String,
    pub rules: String,
    /// Overrides the backend's default model when set
    pub model: Option<String>,
    pub options: CompletionOptions,
}

impl CompletionRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Bare prompt with no conversational framing (used for summaries)
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::new(text)
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_rules(mut self, rules: impl Into<String>) -> Self {
        self.rules = rules.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }
}
