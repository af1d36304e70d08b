//! Retry policy for LLM calls.

use super::provider::{LlmProvider, LlmRequest, LlmResponse};
use crate::error::ServiceError;
use std::time::Duration;

/// Retryable: timeouts, connection failures, rate limits (429) and server
/// errors (5xx). Auth and request errors are final.
pub fn is_retryable(error: &ServiceError) -> bool {
    match error {
        ServiceError::Timeout { .. } | ServiceError::Connect { .. } => true,
        ServiceError::Llm {
            status_code: Some(code),
            ..
        } => *code == 429 || (500..=599).contains(code),
        _ => false,
    }
}

/// `base_delay * 2^attempt`, capped at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(30_000))
}

/// Call `provider` with a per-attempt timeout, retrying transient failures.
pub async fn generate_with_retry(
    provider: &dyn LlmProvider,
    request: &LlmRequest,
    retry_attempts: u32,
    retry_delay_ms: u64,
) -> Result<LlmResponse, ServiceError> {
    let timeout = provider.timeout();
    let mut attempt = 0;

    loop {
        let result = match tokio::time::timeout(timeout, provider.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout {
                stage: "llm".to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        };

        match result {
            Ok(response) => return Ok(response),
            Err(e) if attempt < retry_attempts && is_retryable(&e) => {
                let delay = backoff_duration(attempt, retry_delay_ms);
                attempt += 1;
                tracing::warn!(
                    provider = provider.name(),
                    "LLM call failed ({e}); retry {attempt}/{retry_attempts} in {delay:?}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
