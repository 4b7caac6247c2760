pub mod config;
pub mod error;
pub mod http;
pub mod openai;
pub mod timeout;
pub mod traits;
pub mod types;

pub use config::{HttpConfig, OpenAIConfig, ProviderConfig, ProviderDetails, ProviderFactory, ProviderType};
pub use error::CompletionError;
pub use http::HttpCompletionClient;
pub use openai::OpenAIClient;
pub use timeout::complete_with_timeout;
pub use traits::{CompletionOptions, CompletionProvider, CompletionRequest};
pub use types::ChatMessage;
