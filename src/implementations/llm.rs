use async_trait::async_trait;
use log::{ debug, info, warn };
use serde::{ Deserialize, Serialize };
use std::time::Duration;
use thiserror::Error;

use crate::errors::ForgeError;
use crate::implementations::config::{ ConfigError, GeneratorConfig };
use crate::traits::llm_client::LlmClient;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error: {0}")] ApiError(String),

    #[error("Configuration error: {0}")] ConfigError(#[from] ConfigError),

    #[error("Failed to parse API response: {0}")] ParseError(String),

    #[error("Network error: {0}")] NetworkError(String),

    #[error("HTTP error: {status} - {message}")] HttpError {
        status: u16,
        message: String,
    },
}

impl From<LlmError> for ForgeError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::ConfigError(err) => ForgeError::ConfigError(err.to_string()),
            other => ForgeError::LlmError(other.to_string()),
        }
    }
}

/// OpenAI-compatible request and response types
#[derive(Debug, Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct ChatResponseChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatResponseChoice>,
}

/// Chat-completion client for DeepSeek/OpenAI-style and Anthropic endpoints
///
/// # API Keys
/// The key comes from the `llm_api.api_key` config field, or else from the
/// environment: `DEEPSEEK_API_KEY`, `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`.
#[derive(Clone)]
pub struct HttpLlmClient {
    config: GeneratorConfig,
    http_client: reqwest::Client,
    provider: String,
    api_key: String,
}

impl HttpLlmClient {
    pub fn new(config: GeneratorConfig) -> Result<Self, LlmError> {
        let (provider, api_key) = config.get_api_key(&config.llm_api)?;
        let timeout = Duration::from_secs(config.request_timeout_secs.unwrap_or(180));
        let http_client = reqwest::Client
            ::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        info!("LLM client using provider {}", provider);
        Ok(Self { config, http_client, provider, api_key })
    }

    fn endpoint_and_model(&self) -> (String, String) {
        let configured_endpoint = self.config.llm_api.api_endpoint.clone();
        let configured_model = self.config.llm_api.model.clone();
        let configured_provider = self.config.llm_api.provider.as_deref().unwrap_or("deepseek");

        // A key found for a different provider means the configured endpoint does not apply.
        let same_provider = configured_provider == self.provider;
        let pick = |default_endpoint: &str, default_model: &str| {
            if same_provider {
                (
                    configured_endpoint.clone().unwrap_or_else(|| default_endpoint.to_string()),
                    configured_model.clone().unwrap_or_else(|| default_model.to_string()),
                )
            } else {
                (default_endpoint.to_string(), default_model.to_string())
            }
        };

        match self.provider.as_str() {
            "openai" => pick("https://api.openai.com/v1/chat/completions", "gpt-4o"),
            "anthropic" => pick("https://api.anthropic.com/v1/messages", "claude-3-5-sonnet-latest"),
            _ => pick("https://api.deepseek.com/v1/chat/completions", "deepseek-chat"),
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, LlmError> {
        let response = request.send().await.map_err(|e| {
            let error_msg = format!("Network error when calling {} API: {}", self.provider, e);
            warn!("{}", error_msg);
            if e.is_timeout() {
                warn!("Request timed out");
            }
            if e.is_connect() {
                warn!("Connection error - check network connectivity");
            }
            LlmError::NetworkError(error_msg)
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response
                .text().await
                .unwrap_or_else(|_| "Failed to get error message".to_string());
            warn!("API error: HTTP {} - {}", status, error_text);
            return Err(LlmError::HttpError { status, message: error_text });
        }

        response.text().await.map_err(|e| {
            warn!("Failed to get response text: {}", e);
            LlmError::ParseError(e.to_string())
        })
    }

    async fn call_anthropic(
        &self,
        endpoint: &str,
        model: &str,
        system: &str,
        prompt: &str
    ) -> Result<String, LlmError> {
        let request =
            serde_json::json!({
            "model": model,
            "max_tokens": self.config.max_tokens.unwrap_or(8192),
            "temperature": self.config.temperature.unwrap_or(0.1),
            "system": system,
            "messages": [{ "role": "user", "content": prompt }]
        });

        let builder = self.http_client
            .post(endpoint)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request);

        let response_text = self.send(builder).await?;
        let response_json: serde_json::Value = serde_json
            ::from_str(&response_text)
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        response_json["content"]
            .as_array()
            .and_then(|blocks| {
                let text: Vec<&str> = blocks
                    .iter()
                    .filter_map(|block| block["text"].as_str())
                    .collect();
                if text.is_empty() {
                    None
                } else {
                    Some(text.join(""))
                }
            })
            .ok_or_else(|| LlmError::ParseError("No text content in Anthropic response".to_string()))
    }

    async fn call_chat_completions(
        &self,
        endpoint: &str,
        model: &str,
        system: &str,
        prompt: &str
    ) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: system.to_string() },
                ChatMessage { role: "user".to_string(), content: prompt.to_string() }
            ],
            temperature: self.config.temperature.unwrap_or(0.1),
            max_tokens: self.config.max_tokens.unwrap_or(8192),
        };

        let builder = self.http_client
            .post(endpoint)
            .header("Content-Type", "application/json")
            .bearer_auth(&self.api_key)
            .json(&request);

        let response_text = self.send(builder).await?;
        let response: ChatResponse = serde_json
            ::from_str(&response_text)
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        response.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::ApiError("Response contained no choices".to_string()))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, system: &str, prompt: &str) -> crate::errors::ForgeResult<String> {
        let (endpoint, model) = self.endpoint_and_model();
        info!("Making LLM API request to {} ({})", self.provider, model);
        debug!("API endpoint: {}", endpoint);
        debug!("Prompt length: {} characters", prompt.len());

        let content = if self.provider == "anthropic" {
            self.call_anthropic(&endpoint, &model, system, prompt).await?
        } else {
            self.call_chat_completions(&endpoint, &model, system, prompt).await?
        };

        debug!("Response length: {} characters", content.len());
        Ok(content)
    }

    fn name(&self) -> &str {
        &self.provider
    }
}

/// Remove a surrounding markdown code fence (```yaml, ```json, ...) if present
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        // Some models add prose before the fence.
        if let Some(start) = trimmed.find("\n```") {
            return strip_code_fences(&trimmed[start + 1..]);
        }
        return trimmed.to_string();
    }

    let body = match trimmed.find('\n') {
        Some(newline) => &trimmed[newline + 1..],
        None => "",
    };
    let body = match body.rfind("```") {
        Some(end) => &body[..end],
        None => body,
    };
    body.trim_end().to_string()
}

/// Slice out the outermost JSON object of an LLM answer
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}
