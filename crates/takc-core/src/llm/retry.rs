//! Bounded retry with exponential backoff around inference calls

use super::{CompletionRequest, LLMClient};
use crate::error::{Result, TakcError};
use std::time::Duration;

/// Retry settings for one logical inference call
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total calls, first one included
    max_attempts: u32,
    base_delay: Duration,
    /// Per-call deadline enforced locally
    call_timeout: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            call_timeout: None,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the failed attempt number `attempt` (0-based): base * 2^attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Result of a retried call
#[derive(Debug)]
pub struct RetryOutcome {
    pub result: Result<String>,
    /// Calls actually made
    pub attempts: u32,
}

/// Call `client` until it succeeds, fails fatally, or the policy is exhausted.
///
/// A local timeout counts as a transient failure. The returned error is the
/// last one observed.
pub async fn complete_with_retry(
    client: &dyn LLMClient,
    request: &CompletionRequest,
    policy: &RetryPolicy,
) -> RetryOutcome {
    let mut attempt: u32 = 0;
    loop {
        let call = client.complete(request.clone());
        let result = match policy.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(r) => r,
                Err(_) => Err(TakcError::TransientInference(format!(
                    "inference call timed out after {:?}",
                    limit
                ))),
            },
            None => call.await,
        };
        attempt += 1;

        match result {
            Ok(text) => {
                return RetryOutcome {
                    result: Ok(text),
                    attempts: attempt,
                }
            }
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_for_attempt(attempt - 1);
                tracing::warn!(
                    "Inference call failed ({}), retrying in {:?} (attempt {}/{})",
                    e,
                    delay,
                    attempt + 1,
                    policy.max_attempts
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return RetryOutcome {
                    result: Err(e),
                    attempts: attempt,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<VecDeque<Result<String>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LLMClient for Scripted {
        async fn complete(&self, _request: CompletionRequest) -> Result<String> {
            *self.calls.lock().unwrap() += 1;
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TakcError::FatalInference("script exhausted".into())))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new(vec![ChatMessage::user("compress")], 16, 0.1)
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_errors() {
        let client = Scripted::new(vec![
            Err(TakcError::RateLimited("429".into())),
            Err(TakcError::TransientInference("503".into())),
            Ok("done".into()),
        ]);
        let policy = RetryPolicy::new(3, Duration::from_secs(1));

        let outcome = complete_with_retry(&client, &request(), &policy).await;
        assert_eq!(outcome.result.unwrap(), "done");
        assert_eq!(outcome.attempts, 3);
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_is_not_retried() {
        let client = Scripted::new(vec![Err(TakcError::FatalInference("400".into()))]);
        let policy = RetryPolicy::new(3, Duration::from_secs(1));

        let outcome = complete_with_retry(&client, &request(), &policy).await;
        assert!(matches!(outcome.result, Err(TakcError::FatalInference(_))));
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let client = Scripted::new(vec![
            Err(TakcError::TransientInference("a".into())),
            Err(TakcError::TransientInference("b".into())),
            Err(TakcError::TransientInference("c".into())),
            Ok("never".into()),
        ]);
        let policy = RetryPolicy::new(3, Duration::from_secs(1));

        let outcome = complete_with_retry(&client, &request(), &policy).await;
        assert!(outcome.result.unwrap_err().is_retryable());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(client.calls(), 3);
    }

    struct Stalled;

    #[async_trait]
    impl LLMClient for Stalled {
        async fn complete(&self, _request: CompletionRequest) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".into())
        }

        fn model_name(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout_counts_as_transient() {
        let policy = RetryPolicy::new(2, Duration::from_secs(1))
            .with_call_timeout(Duration::from_secs(5));

        let outcome = complete_with_retry(&Stalled, &request(), &policy).await;
        let err = outcome.result.unwrap_err();
        assert!(matches!(err, TakcError::TransientInference(_)));
        assert!(err.to_string().contains("timed out"));
        assert_eq!(outcome.attempts, 2);
    }
}
