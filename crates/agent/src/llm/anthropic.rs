//! Anthropic messages API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    with_retries, ChatMessage, ChatResponse, HttpSettings, LlmClient, LlmError, Role, ToolCall,
    ToolSpec,
};

const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

pub struct AnthropicClient {
    settings: HttpSettings,
    api_key: String,
    http: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(settings: HttpSettings, api_key: String) -> Result<Self, LlmError> {
        let http = settings.http_client()?;
        Ok(Self { settings, api_key, http })
    }

    async fn send(&self, request: &WireRequest<'_>) -> Result<ChatResponse, LlmError> {
        let response = self
            .http
            .post(self.settings.endpoint("/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &body));
        }

        let body: WireResponse = response.json().await?;
        Ok(parse_response(body))
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ChatResponse, LlmError> {
        let request = build_request(&self.settings.model, messages, tools);
        with_retries(self.settings.max_retries, || self.send(&request)).await
    }
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    content: Vec<WireContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

fn build_request<'a>(
    model: &'a str,
    messages: &[ChatMessage],
    tools: &'a [ToolSpec],
) -> WireRequest<'a> {
    let system = messages
        .iter()
        .filter(|message| message.role == Role::System)
        .filter_map(|message| message.content.as_deref())
        .collect::<Vec<_>>();
    let system = (!system.is_empty()).then(|| system.join("\n\n"));

    let mut wire: Vec<WireMessage> = Vec::new();
    for message in messages.iter().filter(|message| message.role != Role::System) {
        let (role, blocks) = to_blocks(message);
        if blocks.is_empty() {
            continue;
        }
        // Tool results travel as user turns, and the API requires roles to alternate.
        match wire.last_mut() {
            Some(previous) if previous.role == role => previous.content.extend(blocks),
            _ => wire.push(WireMessage { role, content: blocks }),
        }
    }

    WireRequest {
        model,
        max_tokens: MAX_TOKENS,
        system,
        messages: wire,
        tools: tools
            .iter()
            .map(|tool| WireTool {
                name: tool.name,
                description: tool.description,
                input_schema: &tool.parameters,
            })
            .collect(),
    }
}

fn to_blocks(message: &ChatMessage) -> (&'static str, Vec<Value>) {
    match message.role {
        Role::Tool => {
            let mut block = json!({
                "type": "tool_result",
                "tool_use_id": message.tool_call_id.clone().unwrap_or_default(),
                "content": message.content.clone().unwrap_or_default(),
            });
            if message.is_failed_tool_result() {
                block["is_error"] = json!(true);
            }
            ("user", vec![block])
        }
        Role::Assistant => {
            let mut blocks = Vec::new();
            if let Some(text) = message.content.as_deref().filter(|text| !text.is_empty()) {
                blocks.push(json!({"type": "text", "text": text}));
            }
            for call in &message.tool_calls {
                let input =
                    if call.arguments.is_object() { call.arguments.clone() } else { json!({}) };
                blocks.push(json!({
                    "type": "tool_use",
                    "id": call.id,
                    "name": call.name,
                    "input": input,
                }));
            }
            ("assistant", blocks)
        }
        Role::User | Role::System => {
            let text = message.content.clone().unwrap_or_default();
            ("user", vec![json!({"type": "text", "text": text})])
        }
    }
}

fn parse_response(response: WireResponse) -> ChatResponse {
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in response.content {
        match block {
            WireContentBlock::Text { text: chunk } => text.push_str(&chunk),
            WireContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall { id, name, arguments: input });
            }
            WireContentBlock::Other => {}
        }
    }

    ChatResponse { content: (!text.trim().is_empty()).then_some(text), tool_calls }
}

fn classify_error(status: u16, body: &str) -> LlmError {
    match serde_json::from_str::<WireError>(body) {
        Ok(error) => match (status, error.error.error_type.as_str()) {
            (401, _) | (_, "authentication_error") => LlmError::Auth(error.error.message),
            (429, _) | (_, "rate_limit_error") => LlmError::RateLimited,
            (_, "overloaded_error") | (500..=599, _) => LlmError::Transport(error.error.message),
            _ => LlmError::Api(error.error.message),
        },
        Err(_) => match status {
            401 => LlmError::Auth("invalid API key".to_string()),
            429 => LlmError::RateLimited,
            500..=599 => LlmError::Transport(format!("upstream error ({status})")),
            _ => LlmError::Api(format!("API error ({status}): {body}")),
        },
    }
}
