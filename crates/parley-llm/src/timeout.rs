use std::time::Duration;

use crate::error::CompletionError;
use crate::traits::{CompletionProvider, CompletionRequest};

/// Race a completion against a timer; whichever resolves first wins
///
/// Blank replies count as failures so callers never persist an empty turn.
pub async fn complete_with_timeout(
    provider: &dyn CompletionProvider,
    request: CompletionRequest,
    timeout: Duration,
) -> Result<String, CompletionError> {
    tokio::select! {
        result = provider.complete(request) => {
            let reply = result?;
            if reply.trim().is_empty() {
                return Err(CompletionError::EmptyReply);
            }
            Ok(reply)
        }
        _ = tokio::time::sleep(timeout) => {
            tracing::warn!("{} completion timed out after {:?}", provider.name(), timeout);
            Err(CompletionError::Timeout(timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct SlowProvider {
        delay: Duration,
        reply: &'static str,
    }

    #[async_trait]
    impl CompletionProvider for SlowProvider {
        async fn complete(&self, _request: CompletionRequest) -> anyhow::Result<String> {
            tokio::time::sleep(self.delay).await;
            Ok(self.reply.to_string())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl CompletionProvider for FailingProvider {
        async fn complete(&self, _request: CompletionRequest) -> anyhow::Result<String> {
            anyhow::bail!("connection refused")
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_before_timer_wins() {
        let provider = SlowProvider { delay: Duration::from_secs(1), reply: "hi" };
        let reply = complete_with_timeout(&provider, CompletionRequest::new("x"), Duration::from_secs(15))
            .await
            .unwrap();
        assert_eq!(reply, "hi");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_wins_over_slow_reply() {
        let provider = SlowProvider { delay: Duration::from_secs(30), reply: "late" };
        let err = complete_with_timeout(&provider, CompletionRequest::new("x"), Duration::from_secs(15))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_blank_reply_is_failure() {
        let provider = SlowProvider { delay: Duration::ZERO, reply: "   " };
        let err = complete_with_timeout(&provider, CompletionRequest::new("x"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::EmptyReply));
    }

    #[tokio::test]
    async fn test_provider_error_is_wrapped() {
        let err = complete_with_timeout(&FailingProvider, CompletionRequest::new("x"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Provider(_)));
        assert!(err.to_string().contains("connection refused"));
    }
}
