use std::time::{Duration, Instant};

use async_trait::async_trait;
use patchbot_core::{LlmConfig, PatchbotError};
use serde::Serialize;

/// Anything that can turn a prompt into review text.
///
/// [`ReviewClient`] is the production implementation; the pipeline only
/// depends on this trait.
#[async_trait]
pub trait Reviewer: Send + Sync {
    /// Send one prompt and return the model's plain-text answer.
    async fn review(&self, prompt: &str) -> Result<String, PatchbotError>;
}

/// A message in a chat conversation with the model.
///
/// # Examples
///
/// ```
/// use patchbot_review::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage {
///     role: Role::User,
///     content: "Review this code".into(),
/// };
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

/// Role in the chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User input.
    User,
}

/// OpenAI-compatible chat completions client.
///
/// Works with any provider that exposes `{base_url}/chat/completions`:
/// OpenAI, Azure-style proxies, Ollama, vLLM, LiteLLM.
///
/// # Examples
///
/// ```
/// use patchbot_core::LlmConfig;
/// use patchbot_review::llm::ReviewClient;
///
/// let config = LlmConfig {
///     api_key: Some("test-key".into()),
///     ..LlmConfig::default()
/// };
/// let client = ReviewClient::new(&config).unwrap();
/// assert_eq!(client.model(), "gpt-4o");
/// ```
pub struct ReviewClient {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: String,
}

impl ReviewClient {
    /// Create a new client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PatchbotError::Config`] if no API key is configured, or
    /// [`PatchbotError::ReviewRequestFailed`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, PatchbotError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| PatchbotError::Config("model API key is not set".into()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| {
                PatchbotError::ReviewRequestFailed(format!("failed to create HTTP client: {e}"))
            })?;
        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }

    /// Return the model name from the configuration.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Full URL of the chat completions endpoint.
    pub fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn check_budget(&self, prompt: &str) -> Result<(), PatchbotError> {
        let prompt_tokens = estimate_tokens(prompt);
        let needed = prompt_tokens + self.config.max_tokens as usize;
        if needed > self.config.max_model_tokens as usize {
            return Err(PatchbotError::ReviewRequestFailed(format!(
                "prompt of ~{prompt_tokens} tokens plus {} answer tokens exceeds the {} token budget",
                self.config.max_tokens, self.config.max_model_tokens
            )));
        }
        Ok(())
    }

    /// Send the prompt as a single user message and return the answer text.
    ///
    /// An empty prompt returns an empty answer without contacting the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`PatchbotError::ReviewRequestFailed`] on transport errors,
    /// non-success HTTP status, an unexpected response shape, or when the
    /// prompt does not fit the configured token budget.
    pub async fn complete(&self, prompt: &str) -> Result<String, PatchbotError> {
        if prompt.is_empty() {
            return Ok(String::new());
        }
        self.check_budget(prompt)?;

        let url = self.completions_url();
        let messages = vec![ChatMessage {
            role: Role::User,
            content: prompt.to_string(),
        }];
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
            "max_tokens": self.config.max_tokens,
        });

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| PatchbotError::ReviewRequestFailed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(PatchbotError::ReviewRequestFailed(format!(
                "model API error {status}: {body_text}"
            )));
        }

        let response_body: serde_json::Value = response.json().await.map_err(|e| {
            PatchbotError::ReviewRequestFailed(format!("failed to parse response: {e}"))
        })?;
        tracing::debug!(
            model = %self.config.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "code-review cost"
        );

        extract_content(&response_body)
    }
}

#[async_trait]
impl Reviewer for ReviewClient {
    async fn review(&self, prompt: &str) -> Result<String, PatchbotError> {
        self.complete(prompt).await
    }
}

/// Rough token estimate: four characters per token.
fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

fn extract_content(response_body: &serde_json::Value) -> Result<String, PatchbotError> {
    response_body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            PatchbotError::ReviewRequestFailed(format!(
                "unexpected response structure: {response_body}"
            ))
        })
}
