//! Chat-completion gateway (OpenRouter, OpenAI-compatible wire format).

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::config::OpenRouterConfig;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const APP_TITLE: &str = "ChatAI-SP";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the conversation sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("OpenRouter API key is missing")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response format: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends the ordered conversation and returns the assistant's reply text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn extract_reply(resp: CompletionResponse) -> Result<String, LlmError> {
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("no choices returned".into()))?;
    choice
        .message
        .and_then(|m| m.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| LlmError::InvalidResponse("first choice has no message content".into()))
}

pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: Option<SecretString>,
    model: String,
    app_url: String,
    endpoint: String,
}

impl OpenRouterClient {
    pub fn new(cfg: &OpenRouterConfig) -> Result<Self, LlmError> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            api_key: cfg
                .api_key
                .as_ref()
                .map(|k| SecretString::from(k.expose_secret())),
            model: cfg.model.clone(),
            app_url: cfg.app_url.clone(),
            endpoint: OPENROUTER_URL.to_string(),
        })
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    #[instrument(skip(self, messages), fields(model = %self.model, turns = messages.len()))]
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let api_key = self.api_key.as_ref().ok_or(LlmError::MissingApiKey)?;

        let body = CompletionRequest { model: &self.model, messages };
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key.expose_secret())
            .header("HTTP-Referer", self.app_url.as_str())
            .header("X-Title", APP_TITLE)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(%status, body = %body, "completion request rejected");
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let parsed: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let reply = extract_reply(parsed)?;
        debug!(reply_len = reply.len(), "completion received");
        Ok(reply)
    }
}
