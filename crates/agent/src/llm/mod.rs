//! Model-facing protocol shared by every provider.
//!
//! A provider receives the running transcript plus the tool catalog and answers with either
//! final text or a batch of tool calls. Hosted providers speak HTTP; the rule-based planner in
//! [`crate::conversation`] answers locally through the same trait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use tally_core::config::{AppConfig, LlmProvider};

use crate::conversation::RuleBasedPlanner;

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiCompatibleClient;

/// Prefix every failed tool result carries in the transcript.
pub const TOOL_ERROR_PREFIX: &str = "Error: ";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content.into())
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content.into())
    }

    fn plain(role: Role, content: String) -> Self {
        Self { role, content: Some(content), tool_calls: Vec::new(), tool_call_id: None }
    }

    pub fn assistant(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self { role: Role::Assistant, content, tool_calls, tool_call_id: None }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    pub fn is_failed_tool_result(&self) -> bool {
        self.role == Role::Tool
            && self.content.as_deref().is_some_and(|content| content.starts_with(TOOL_ERROR_PREFIX))
    }
}

/// Declarative description of a tool as shown to the model.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), tool_calls: Vec::new() }
    }

    pub fn calls(tool_calls: Vec<ToolCall>) -> Self {
        Self { content: None, tool_calls }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("provider returned an error: {0}")]
    Api(String),
    #[error("provider rejected credentials: {0}")]
    Auth(String),
    #[error("provider rate limit reached")]
    RateLimited,
    #[error("could not decode provider response: {0}")]
    Decode(String),
    #[error("provider call timed out")]
    Timeout,
}

impl LlmError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RateLimited | Self::Timeout)
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ChatResponse, LlmError>;
}

/// HTTP settings shared by the hosted providers.
#[derive(Clone, Debug)]
pub struct HttpSettings {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl HttpSettings {
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub(crate) fn http_client(&self) -> Result<reqwest::Client, LlmError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|error| LlmError::Transport(format!("could not build HTTP client: {error}")))
    }
}

/// Retries transport failures, rate limits and timeouts with exponential backoff.
pub(crate) async fn with_retries<T, F, Fut>(
    max_retries: u32,
    mut attempt: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, LlmError>>,
{
    let mut tries = 0u32;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_retryable() && tries < max_retries => {
                tries += 1;
                let backoff = Duration::from_millis(250 * 2u64.pow(tries.min(6)));
                tracing::warn!(
                    event_name = "agent.llm.retry",
                    attempt = tries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %error,
                    "retrying model call"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(error) => return Err(error),
        }
    }
}

/// Builds the client for the configured provider.
pub fn build_client(config: &AppConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let provider = config.llm.provider;
    if provider == LlmProvider::Rules {
        return Ok(Arc::new(RuleBasedPlanner::new()));
    }

    let settings = HttpSettings {
        base_url: config.llm_base_url().ok_or_else(|| {
            LlmError::Transport(format!("no base URL configured for `{}`", provider.as_str()))
        })?,
        model: config.llm.model.clone(),
        timeout: Duration::from_secs(config.llm.timeout_secs),
        max_retries: config.llm.max_retries,
    };
    let api_key =
        config.llm.api_key.as_ref().map(|key| key.expose_secret().to_string()).unwrap_or_default();

    let client: Arc<dyn LlmClient> = match provider {
        LlmProvider::OpenAi => Arc::new(OpenAiCompatibleClient::openai(settings, api_key)?),
        LlmProvider::Ollama => Arc::new(OpenAiCompatibleClient::ollama(settings)?),
        LlmProvider::Anthropic => Arc::new(AnthropicClient::new(settings, api_key)?),
        LlmProvider::Rules => Arc::new(RuleBasedPlanner::new()),
    };
    Ok(client)
}
