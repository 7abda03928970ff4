//! OpenAI-compatible Chat Completions generator
//!
//! Resolves logical model ids (`summarizer-model`, `chat-model`, ...) to
//! provider model names and sends non-streaming Chat Completions requests.
//! Transport-level retries are bounded and only cover retryable failures
//! (timeouts, connection errors, 5xx); anything else surfaces immediately
//! so the summarizer can move on to its next model.

use super::{GenerateOptions, TextGenerator};
use crate::{MemoryError, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 200;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_ENV_KEY: &str = "OPENROUTER_API_KEY";

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

/// Built-in logical model map
fn built_in_models() -> HashMap<String, String> {
    HashMap::from([
        ("chat-model".to_string(), "openai/gpt-oss-120b".to_string()),
        ("chat-model-reasoning".to_string(), "openai/gpt-4o-mini".to_string()),
        ("title-model".to_string(), "meta-llama/llama-3.2-3b-instruct".to_string()),
        ("artifact-model".to_string(), "deepseek/deepseek-chat-v3-0324".to_string()),
        ("summarizer-model".to_string(), "openai/gpt-oss-20b".to_string()),
    ])
}

/// Where and how to reach the model provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Environment variable holding the API key
    pub env_key: Option<String>,
    pub timeout_secs: u64,
    /// Logical model id -> provider model name
    pub models: HashMap<String, String>,
    /// Extra static headers
    pub http_headers: HashMap<String, String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            env_key: Some(DEFAULT_ENV_KEY.to_string()),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            models: built_in_models(),
            http_headers: HashMap::new(),
        }
    }
}

impl ProviderConfig {
    /// Map a logical id to a provider model name; unknown ids pass through
    /// so a concrete name (`openai/gpt-4o-mini`) can be used directly.
    pub fn resolve_model<'a>(&'a self, model: &'a str) -> &'a str {
        self.models.get(model).map(String::as_str).unwrap_or(model)
    }
}

// ─── Chat Completions API types ─────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// ─── Generator ──────────────────────────────────────────────────────

/// [`TextGenerator`] over an OpenAI-compatible HTTP API
pub struct OpenAiCompatGenerator {
    client: Client,
    config: ProviderConfig,
    api_key: Option<String>,
}

impl OpenAiCompatGenerator {
    pub fn new(config: ProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(15))
            .user_agent(concat!("chat-memory/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        let api_key = config
            .env_key
            .as_deref()
            .and_then(|key| std::env::var(key).ok())
            .filter(|k| !k.trim().is_empty());

        if api_key.is_none() {
            warn!(
                "No API key found in {:?}; requests to {} will be unauthenticated",
                config.env_key, config.base_url
            );
        }

        info!(
            "Model provider: base_url={}, models={}, headers={}",
            config.base_url,
            config.models.len(),
            config.http_headers.len()
        );

        Self {
            client,
            config,
            api_key,
        }
    }

    /// Remove `<think>...</think>` blocks (and a dangling opening block) so
    /// reasoning models return only their answer.
    pub fn strip_reasoning(content: &str) -> String {
        let without_blocks = THINK_BLOCK.replace_all(content, "");
        match without_blocks.find("<think>") {
            Some(idx) => without_blocks[..idx].trim().to_string(),
            None => without_blocks.trim().to_string(),
        }
    }

    /// Exponential backoff with a little deterministic jitter
    fn retry_backoff(attempt: u32) -> Duration {
        let exp = 2u64.saturating_pow(attempt.saturating_sub(1));
        let base_ms = RETRY_BASE_DELAY_MS.saturating_mul(exp);
        let jitter = 1.0 + ((attempt as f64 * 0.37).sin() * 0.1);
        Duration::from_millis((base_ms as f64 * jitter) as u64)
    }

    fn is_retryable_error(msg: &str) -> bool {
        msg.contains("timeout")
            || msg.contains("network")
            || msg.contains("retryable")
            || msg.contains("error sending request")
            || msg.contains("connection")
    }

    fn generation_error(model: &str, message: impl Into<String>) -> MemoryError {
        MemoryError::Generation {
            model: model.to_string(),
            message: message.into(),
        }
    }

    fn map_reqwest_error(model: &str, e: reqwest::Error) -> MemoryError {
        if e.is_timeout() {
            Self::generation_error(model, format!("timeout: {e}"))
        } else if e.is_connect() {
            Self::generation_error(model, format!("network: {e}"))
        } else {
            Self::generation_error(model, e.to_string())
        }
    }

    fn extract_error_detail(body: &str) -> String {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return String::new();
        }

        if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
            if let Some(msg) = value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
            {
                return msg.to_string();
            }
            if let Some(msg) = value.get("message").and_then(|m| m.as_str()) {
                return msg.to_string();
            }
        }

        trimmed.chars().take(500).collect()
    }

    async fn check_response_status(model: &str, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let detail = Self::extract_error_detail(&body);
        let prefix = if status.is_server_error() {
            "retryable API error"
        } else {
            "API error"
        };
        if detail.is_empty() {
            Err(Self::generation_error(model, format!("{prefix} {status}")))
        } else {
            Err(Self::generation_error(model, format!("{prefix} {status}: {detail}")))
        }
    }

    /// Single-message, non-streaming request with no tool definitions
    fn build_chat_request(&self, model: &str, prompt: &str, options: &GenerateOptions) -> ChatRequest {
        ChatRequest {
            model: self.config.resolve_model(model).to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
        }
    }

    async fn send_chat_completions_request(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let request = self.build_chat_request(model, prompt, options);

        let mut req_builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        for (name, value) in &self.config.http_headers {
            req_builder = req_builder.header(name.as_str(), value.as_str());
        }
        if let Some(key) = &self.api_key {
            req_builder = req_builder.bearer_auth(key);
        }

        let response = req_builder
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::map_reqwest_error(model, e))?;
        let response = Self::check_response_status(model, response).await?;

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Self::generation_error(model, e.to_string()))?;

        Ok(chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatGenerator {
    async fn generate(&self, model: &str, prompt: &str, options: &GenerateOptions) -> Result<String> {
        debug!(
            "Calling model {} ({}) with prompt length: {}",
            model,
            self.config.resolve_model(model),
            prompt.len()
        );

        let mut last_err = None;
        for attempt in 0..MAX_RETRY_ATTEMPTS {
            if attempt > 0 {
                let delay = Self::retry_backoff(attempt);
                warn!(
                    "Model {} request failed (attempt {}/{}), retrying in {:?}...",
                    model, attempt, MAX_RETRY_ATTEMPTS, delay
                );
                tokio::time::sleep(delay).await;
            }

            match self.send_chat_completions_request(model, prompt, options).await {
                Ok(content) => return Ok(Self::strip_reasoning(&content)),
                Err(e) => {
                    if Self::is_retryable_error(&e.to_string()) && attempt + 1 < MAX_RETRY_ATTEMPTS {
                        last_err = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Self::generation_error(model, "all retry attempts exhausted")))
    }
}
