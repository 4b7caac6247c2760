// Direct HTTP backend: {context, message, user, rules} -> {reply}

use crate::traits::{CompletionProvider, CompletionRequest};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

/// Client for a chat endpoint that takes the assembled context and returns a reply
///
/// The endpoint owns model selection; the request carries only conversational
/// fields.
#[derive(Debug)]
pub struct HttpCompletionClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpCompletionClient {
    pub fn builder() -> HttpCompletionClientBuilder {
        HttpCompletionClientBuilder::default()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Debug, Serialize)]
struct ChatPayload<'a> {
    context: &'a str,
    message: &'a str,
    user: &'a str,
    rules: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    reply: String,
}

#[async_trait]
impl CompletionProvider for HttpCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let payload = ChatPayload {
            context: &request.context,
            message: &request.message,
            user: &request.user,
            rules: &request.rules,
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat endpoint error ({}): {}", status, error_text);
        }

        let body: ChatReply = response
            .json()
            .await
            .context("Failed to parse chat endpoint reply")?;

        Ok(body.reply)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Builder for HttpCompletionClient
#[derive(Default)]
pub struct HttpCompletionClientBuilder {
    endpoint: Option<String>,
    api_key: Option<String>,
}

impl HttpCompletionClientBuilder {
    /// Full URL of the chat endpoint, e.g. "https://bots.example.com/api/chat"
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Optional bearer token
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn build(self) -> Result<HttpCompletionClient> {
        let endpoint = self.endpoint.context("Endpoint is required")?;
        let endpoint = endpoint.trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(api_key) = self.api_key.filter(|k| !k.is_empty()) {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", api_key))
                    .context("Invalid API key format")?,
            );
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(HttpCompletionClient {
            http_client,
            endpoint,
        })
    }
}
