use parley_llm::{ChatMessage, CompletionOptions, CompletionProvider, CompletionRequest};
use std::sync::Arc;

#[test]
fn test_completion_request_creation() {
    let request = CompletionRequest::new("Hello");

    assert_eq!(request.message, "Hello");
    assert!(request.context.is_empty());
    assert!(request.model.is_none());
}

#[test]
fn test_completion_request_builder() {
    let request = CompletionRequest::new("Hello")
        .with_context("User: hi\nBot: hey")
        .with_user("Ana")
        .with_rules("Stay in character")
        .with_model("gpt-4o-mini")
        .with_options(CompletionOptions::new().temperature(0.7).max_tokens(100));

    assert_eq!(request.user, "Ana");
    assert_eq!(request.rules, "Stay in character");
    assert_eq!(request.model.as_deref(), Some("gpt-4o-mini"));
    assert_eq!(request.options.temperature, Some(0.7));
    assert_eq!(request.options.max_tokens, Some(100));
}

#[test]
fn test_completion_options_default() {
    let options = CompletionOptions::default();

    assert_eq!(options.temperature, None);
    assert_eq!(options.max_tokens, None);
}

#[test]
fn test_chat_messages_follow_request_order() {
    let request = CompletionRequest::new("What now?")
        .with_rules("R")
        .with_context("Summary: earlier talk");
    let roles: Vec<_> = ChatMessage::from_request(&request)
        .iter()
        .map(|m| m.role().to_string())
        .collect();

    assert_eq!(roles, vec!["system", "system", "user"]);
}

struct Echo;

#[async_trait::async_trait]
impl CompletionProvider for Echo {
    async fn complete(&self, request: CompletionRequest) -> anyhow::Result<String> {
        Ok(format!("echo: {}", request.message))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

#[tokio::test]
async fn test_provider_is_object_safe() {
    let provider: Arc<dyn CompletionProvider> = Arc::new(Echo);
    let reply = provider.complete(CompletionRequest::new("ping")).await.unwrap();
    assert_eq!(reply, "echo: ping");
}
