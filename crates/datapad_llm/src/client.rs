//! HTTP adapter for chat completions.
//!
//! Supports OpenAI and Anthropic APIs, selected via environment variables.
//! Transport-level retry (5xx, rate limits, network errors) happens here
//! with exponential backoff and is invisible to the engine's repair-attempt
//! accounting.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{LlmError, LlmResult};

const MAX_TRANSPORT_RETRIES: u32 = 3;

/// LLM provider type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Anthropic,
}

/// Response from the LLM including usage info.
pub struct LlmResponse {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub model: String,
}

/// Low-level chat-completion client.
pub struct LlmClient {
    provider: LlmProvider,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl LlmClient {
    /// Create a client with explicit configuration.
    pub fn new(provider: LlmProvider, api_key: String, model: Option<String>) -> Self {
        let default_model = match provider {
            LlmProvider::OpenAI => "gpt-5-mini".to_string(),
            LlmProvider::Anthropic => "claude-sonnet-4.5".to_string(),
        };

        Self {
            provider,
            api_key,
            model: model.unwrap_or(default_model),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client from environment variables.
    ///
    /// Checks in order: `OPENAI_API_KEY`, then `ANTHROPIC_API_KEY`.
    /// `DATAPAD_LLM_MODEL` overrides the default model.
    pub fn from_env() -> LlmResult<Self> {
        let custom_model = std::env::var("DATAPAD_LLM_MODEL").ok();

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            if !api_key.is_empty() {
                return Ok(Self::new(LlmProvider::OpenAI, api_key, custom_model));
            }
        }

        if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
            if !api_key.is_empty() {
                return Ok(Self::new(LlmProvider::Anthropic, api_key, custom_model));
            }
        }

        Err(LlmError::NotConfigured)
    }

    /// Get the current provider.
    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    /// Get the current model.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Complete a system+user prompt pair.
    pub async fn complete(&self, system: &str, user: &str) -> LlmResult<LlmResponse> {
        let mut last_error = None;

        for attempt in 0..MAX_TRANSPORT_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_secs(1 << (attempt - 1));
                tokio::time::sleep(delay).await;
            }

            let response = match self.send(system, user).await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "collaborator transport error");
                    last_error = Some(LlmError::Transport(e.to_string()));
                    continue;
                }
            };

            let status = response.status();
            if status.is_server_error() || status.as_u16() == 429 {
                let body = response.text().await.unwrap_or_default();
                warn!(attempt = attempt + 1, status = status.as_u16(), "collaborator API retryable error");
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    body,
                });
            }

            return self.parse_response(response).await;
        }

        Err(last_error.unwrap_or_else(|| LlmError::Transport("max retries exceeded".to_string())))
    }

    async fn send(&self, system: &str, user: &str) -> Result<reqwest::Response, reqwest::Error> {
        match self.provider {
            LlmProvider::OpenAI => {
                let request = OpenAIRequest {
                    model: self.model.clone(),
                    messages: vec![
                        OpenAIMessage {
                            role: "system".to_string(),
                            content: system.to_string(),
                        },
                        OpenAIMessage {
                            role: "user".to_string(),
                            content: user.to_string(),
                        },
                    ],
                    max_completion_tokens: Some(4096),
                };
                self.client
                    .post("https://api.openai.com/v1/chat/completions")
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .header("Content-Type", "application/json")
                    .json(&request)
                    .send()
                    .await
            }
            LlmProvider::Anthropic => {
                let request = AnthropicRequest {
                    model: self.model.clone(),
                    max_tokens: 4096,
                    system: Some(system.to_string()),
                    messages: vec![AnthropicMessage {
                        role: "user".to_string(),
                        content: user.to_string(),
                    }],
                };
                self.client
                    .post("https://api.anthropic.com/v1/messages")
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", "2023-06-01")
                    .header("Content-Type", "application/json")
                    .json(&request)
                    .send()
                    .await
            }
        }
    }

    async fn parse_response(&self, response: reqwest::Response) -> LlmResult<LlmResponse> {
        match self.provider {
            LlmProvider::OpenAI => {
                let result: OpenAIResponse = response
                    .json()
                    .await
                    .map_err(|e| LlmError::MalformedReply(e.to_string()))?;
                let content = result
                    .choices
                    .first()
                    .map(|c| c.message.content.clone())
                    .ok_or(LlmError::EmptyReply)?;
                let (input_tokens, output_tokens) = result
                    .usage
                    .map(|u| (u.prompt_tokens, u.completion_tokens))
                    .unwrap_or((0, 0));
                Ok(LlmResponse {
                    content,
                    input_tokens,
                    output_tokens,
                    model: self.model.clone(),
                })
            }
            LlmProvider::Anthropic => {
                let result: AnthropicResponse = response
                    .json()
                    .await
                    .map_err(|e| LlmError::MalformedReply(e.to_string()))?;
                let content = result
                    .content
                    .first()
                    .map(|c| c.text.clone())
                    .ok_or(LlmError::EmptyReply)?;
                let (input_tokens, output_tokens) = result
                    .usage
                    .map(|u| (u.input_tokens, u.output_tokens))
                    .unwrap_or((0, 0));
                Ok(LlmResponse {
                    content,
                    input_tokens,
                    output_tokens,
                    model: self.model.clone(),
                })
            }
        }
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: String,
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: String,
}
