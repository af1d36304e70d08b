//! LLM provider trait and request/response types.

use crate::config::LlmConfig;
use crate::error::ServiceError;
use async_trait::async_trait;
use std::time::Duration;

/// A single-prompt completion request.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Text prompt for the model
    pub prompt: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl LlmRequest {
    pub fn new(prompt: String, config: &LlmConfig) -> Self {
        Self {
            prompt,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// The response from an LLM call.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated text
    pub text: String,
    /// Model identifier used
    pub model: String,
    /// Number of tokens used (input + output), if reported
    pub tokens_used: Option<u32>,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
}

/// Trait that all LLM providers implement.
///
/// Uses `async_trait` so the enricher can hold an `Arc<dyn LlmProvider>`.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging and audit events (e.g., "groq").
    fn name(&self) -> &str;

    /// Check whether the provider is configured.
    async fn is_available(&self) -> bool;

    /// Generate a completion for the given request.
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, ServiceError>;

    /// Per-request timeout for this provider.
    fn timeout(&self) -> Duration;
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
