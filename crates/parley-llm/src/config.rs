// Configuration layer for provider-agnostic completion client creation
// Backends are chosen by configuration, never inferred from response shape

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::traits::CompletionProvider;

/// Type of completion backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Http,
    OpenAI,
}

/// Configuration for the direct HTTP chat endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl HttpConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// Configuration for OpenAI-style chat completions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    pub api_key: String,
    /// Base URL (optional, defaults to https://api.openai.com/v1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            model: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Provider-specific configuration details
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderDetails {
    Http(HttpConfig),
    OpenAI(OpenAIConfig),
}

/// Complete provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(flatten)]
    pub details: ProviderDetails,
}

impl ProviderConfig {
    pub fn http(endpoint: impl Into<String>) -> Self {
        Self {
            details: ProviderDetails::Http(HttpConfig::new(endpoint)),
        }
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            details: ProviderDetails::OpenAI(OpenAIConfig::new(api_key)),
        }
    }

    pub fn provider_type(&self) -> ProviderType {
        match self.details {
            ProviderDetails::Http(_) => ProviderType::Http,
            ProviderDetails::OpenAI(_) => ProviderType::OpenAI,
        }
    }
}

/// Factory for creating completion providers from configuration
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create(config: ProviderConfig) -> Result<Arc<dyn CompletionProvider>> {
        match config.details {
            ProviderDetails::Http(http_config) => {
                let mut builder = crate::http::HttpCompletionClient::builder()
                    .endpoint(http_config.endpoint);
                if let Some(api_key) = http_config.api_key {
                    builder = builder.api_key(api_key);
                }
                Ok(Arc::new(builder.build()?))
            }
            ProviderDetails::OpenAI(openai_config) => {
                let mut client = crate::openai::OpenAIClient::new(openai_config.api_key)?;
                if let Some(base_url) = openai_config.base_url {
                    client = client.with_base_url(base_url);
                }
                if let Some(model) = openai_config.model {
                    client = client.with_model(model);
                }
                Ok(Arc::new(client))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_config() {
        let config = ProviderConfig::openai("test-key");
        assert_eq!(config.provider_type(), ProviderType::OpenAI);
    }

    #[test]
    fn test_http_config() {
        let config = ProviderConfig::http("https://bots.example.com/api/chat");
        assert_eq!(config.provider_type(), ProviderType::Http);
    }

    #[test]
    fn test_tagged_deserialization() {
        let config: ProviderConfig = serde_json::from_value(serde_json::json!({
            "type": "http",
            "endpoint": "https://bots.example.com/api/chat"
        }))
        .unwrap();
        assert_eq!(config.provider_type(), ProviderType::Http);

        let config: ProviderConfig = serde_json::from_value(serde_json::json!({
            "type": "openai",
            "api_key": "sk-test",
            "model": "gpt-4o-mini"
        }))
        .unwrap();
        match config.details {
            ProviderDetails::OpenAI(openai) => assert_eq!(openai.model.as_deref(), Some("gpt-4o-mini")),
            other => panic!("unexpected provider: {:?}", other),
        }
    }

    #[test]
    fn test_factory_builds_both_backends() {
        let http = ProviderFactory::create(ProviderConfig::http("https://bots.example.com/chat")).unwrap();
        assert_eq!(http.name(), "http");

        let openai = ProviderFactory::create(ProviderConfig::openai("sk-test")).unwrap();
        assert_eq!(openai.name(), "openai");
    }
}
