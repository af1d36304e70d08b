//! OpenAI-compatible provider using the Chat Completions API.
//!
//! Works against any endpoint that speaks the OpenAI wire format; the
//! default configuration points at Groq.

use super::provider::{resolve_env_var, LlmProvider, LlmRequest, LlmResponse};
use crate::config::LlmConfig;
use crate::error::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Chat Completions client.
pub struct OpenAiCompatProvider {
    name: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl OpenAiCompatProvider {
    pub fn new(api_key: &str, model: &str, endpoint: &str) -> Self {
        Self {
            name: provider_name(endpoint).to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Build from the `[llm]` config section, resolving the API key.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ServiceError> {
        let api_key = resolve_env_var(&config.api_key).ok_or_else(|| ServiceError::Llm {
            message: format!(
                "LLM API key not set. Set {} or llm.api_key in the config.",
                config.api_key
            ),
            status_code: None,
        })?;

        let mut provider = Self::new(&api_key, &config.model, &config.endpoint);
        provider.timeout = Duration::from_secs(config.timeout_secs);
        Ok(provider)
    }

    /// Classify a failed send so timeouts and refused connections can be retried.
    fn transport_error(&self, e: reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            ServiceError::Timeout {
                stage: "llm".to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else if e.is_connect() {
            ServiceError::Connect {
                service: self.name.clone(),
                message: e.to_string(),
            }
        } else {
            ServiceError::Llm {
                message: format!("{} request failed: {e}", self.name),
                status_code: None,
            }
        }
    }
}

fn provider_name(endpoint: &str) -> &'static str {
    if endpoint.contains("groq.com") {
        "groq"
    } else if endpoint.contains("openai.com") {
        "openai"
    } else {
        "openai-compatible"
    }
}

// --- Request types ---

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: String,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, ServiceError> {
        let start = Instant::now();

        let body = ChatRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(self.timeout())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Llm {
                message: format!("{} HTTP {status}: {text}", self.name),
                status_code: Some(status.as_u16()),
            });
        }

        let chat_resp: ChatResponse = resp.json().await.map_err(|e| ServiceError::Llm {
            message: format!("Failed to parse {} response: {e}", self.name),
            status_code: None,
        })?;

        let text = chat_resp
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| ServiceError::Llm {
                message: format!("{} returned no content", self.name),
                status_code: None,
            })?;

        tracing::debug!(
            provider = %self.name,
            model = %chat_resp.model,
            latency_ms = start.elapsed().as_millis() as u64,
            "LLM call complete"
        );

        Ok(LlmResponse {
            text: text.trim().to_string(),
            model: chat_resp.model,
            tokens_used: chat_resp.usage.map(|u| u.total_tokens),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
