//! OpenAI-compatible chat completions provider.
//!
//! Works with any endpoint speaking the `/chat/completions` protocol (OpenAI,
//! Azure, Ollama, vLLM, LM Studio). Requests JSON-object output and parses the
//! first choice's message content.

use crate::brain::{CompletionRequest, LanguageModel, parse_json_text};
use crate::config::LlmConfig;
use crate::error::LlmError;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const SYSTEM_PROMPT: &str = "You are a careful research assistant. Base every statement on the \
material you are given, say so when evidence is thin, and follow the output format exactly.";

/// An OpenAI-compatible chat model.
pub struct OpenAiCompatibleModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: usize,
    timeout_ms: u64,
}

impl OpenAiCompatibleModel {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| LlmError::ModelUnavailable {
                message: format!("Failed to build HTTP client: {e}"),
            })?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client,
            base_url,
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout_ms: config.timeout_ms,
        })
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": format!("{SYSTEM_PROMPT}\n\n{}", request.expected_schema().instructions()),
                },
                { "role": "user", "content": request.prompt },
            ],
            "temperature": request.temperature,
            "max_tokens": self.max_tokens,
            "response_format": { "type": "json_object" },
            "stream": false,
        })
    }

    /// Map an HTTP status code to the appropriate LlmError.
    fn map_http_error(status: reqwest::StatusCode, body: &str) -> LlmError {
        let message = match status.as_u16() {
            401 | 403 => "authentication failed".to_string(),
            429 => "rate limited".to_string(),
            code if code >= 500 => format!("server error ({status}): {body}"),
            _ => format!("HTTP {status}: {body}"),
        };
        LlmError::ModelUnavailable { message }
    }

    /// Pull the JSON object out of a chat completion response.
    fn parse_response(json: &Value) -> Result<Value, LlmError> {
        let content = json
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| LlmError::MalformedResponse {
                message: "No message content in response".into(),
            })?;
        parse_json_text(content)
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %self.model, schema = ?request.expected_schema(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    LlmError::ModelUnavailable {
                        message: format!("Request failed: {e}"),
                    }
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| LlmError::ModelUnavailable {
            message: format!("Failed to read response body: {e}"),
        })?;
        if !status.is_success() {
            return Err(Self::map_http_error(status, &body));
        }

        let json: Value = serde_json::from_str(&body).map_err(|e| LlmError::MalformedResponse {
            message: format!("Invalid JSON: {e}"),
        })?;
        Self::parse_response(&json)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
