//! OpenAI chat-completions wire format. Ollama exposes the same API under `/v1`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    with_retries, ChatMessage, ChatResponse, HttpSettings, LlmClient, LlmError, Role, ToolCall,
    ToolSpec,
};

pub struct OpenAiCompatibleClient {
    name: &'static str,
    settings: HttpSettings,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub fn openai(settings: HttpSettings, api_key: String) -> Result<Self, LlmError> {
        let http = settings.http_client()?;
        Ok(Self { name: "openai", settings, api_key: Some(api_key), http })
    }

    pub fn ollama(settings: HttpSettings) -> Result<Self, LlmError> {
        let http = settings.http_client()?;
        Ok(Self { name: "ollama", settings, api_key: None, http })
    }

    async fn send(&self, request: &WireRequest<'_>) -> Result<ChatResponse, LlmError> {
        let mut builder = self.http.post(self.settings.endpoint("/chat/completions")).json(request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &body));
        }

        let body: WireResponse = response.json().await?;
        parse_response(body)
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    fn name(&self) -> &'static str {
        self.name
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
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: WireFunction<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    tool_type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

fn function_type() -> String {
    "function".to_string()
}

fn build_request<'a>(
    model: &'a str,
    messages: &[ChatMessage],
    tools: &'a [ToolSpec],
) -> WireRequest<'a> {
    WireRequest {
        model,
        messages: messages.iter().map(to_wire_message).collect(),
        tools: tools
            .iter()
            .map(|tool| WireTool {
                tool_type: "function",
                function: WireFunction {
                    name: tool.name,
                    description: tool.description,
                    parameters: &tool.parameters,
                },
            })
            .collect(),
        temperature: 0.0,
        stream: false,
    }
}

fn to_wire_message(message: &ChatMessage) -> WireMessage {
    let tool_calls = (message.role == Role::Assistant && !message.tool_calls.is_empty()).then(|| {
        message
            .tool_calls
            .iter()
            .map(|call| WireToolCall {
                id: call.id.clone(),
                tool_type: function_type(),
                function: WireFunctionCall {
                    name: call.name.clone(),
                    arguments: call.arguments.to_string(),
                },
            })
            .collect()
    });

    WireMessage {
        role: message.role.as_str(),
        content: message.content.clone(),
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
    }
}

fn parse_response(response: WireResponse) -> Result<ChatResponse, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Decode("response contained no choices".to_string()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            name: call.function.name,
            // Malformed argument JSON is handed to the tool as a string so it can report it.
            arguments: serde_json::from_str(&call.function.arguments)
                .unwrap_or(Value::String(call.function.arguments)),
        })
        .collect();

    Ok(ChatResponse {
        content: choice.message.content.filter(|content| !content.trim().is_empty()),
        tool_calls,
    })
}

fn classify_error(status: u16, body: &str) -> LlmError {
    match serde_json::from_str::<WireError>(body) {
        Ok(error) => {
            let error_type = error.error.error_type.as_deref().unwrap_or("");
            if status == 401 || error_type == "invalid_api_key" {
                LlmError::Auth(error.error.message)
            } else if status == 429 || error_type == "rate_limit_exceeded" {
                LlmError::RateLimited
            } else if status >= 500 {
                LlmError::Transport(error.error.message)
            } else {
                LlmError::Api(error.error.message)
            }
        }
        Err(_) if status == 401 => LlmError::Auth("invalid API key".to_string()),
        Err(_) if status == 429 => LlmError::RateLimited,
        Err(_) if status >= 500 => LlmError::Transport(format!("upstream error ({status})")),
        Err(_) => LlmError::Api(format!("API error ({status}): {body}")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{build_request, classify_error, parse_response, WireResponse};
    use crate::llm::{ChatMessage, LlmError, ToolCall, ToolSpec};

    #[test]
    fn request_serializes_tool_calls_with_string_arguments() {
        let tools = vec![ToolSpec {
            name: "listClients",
            description: "List clients",
            parameters: json!({"type": "object", "properties": {}}),
        }];
        let messages = vec![
            ChatMessage::system("policy"),
            ChatMessage::user("who are my clients?"),
            ChatMessage::assistant(
                None,
                vec![ToolCall {
                    id: "call-1".to_string(),
                    name: "listClients".to_string(),
                    arguments: json!({}),
                }],
            ),
            ChatMessage::tool_result("call-1", "[]"),
        ];

        let request = build_request("gpt-4o-mini", &messages, &tools);
        let wire = serde_json::to_value(&request).expect("serialize");

        assert_eq!(wire["model"], "gpt-4o-mini");
        assert_eq!(wire["tools"][0]["type"], "function");
        assert_eq!(wire["tools"][0]["function"]["name"], "listClients");
        assert_eq!(wire["messages"][2]["tool_calls"][0]["function"]["arguments"], "{}");
        assert_eq!(wire["messages"][3]["role"], "tool");
        assert_eq!(wire["messages"][3]["tool_call_id"], "call-1");
    }

    #[test]
    fn response_tool_calls_are_decoded() {
        let body: WireResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call-9",
                        "type": "function",
                        "function": {
                            "name": "addTransaction",
                            "arguments": "{\"type\":\"expense\",\"amount\":45}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .expect("decode");

        let response = parse_response(body).expect("parse");
        assert_eq!(response.content, None);
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].arguments["amount"], 45);
    }

    #[test]
    fn error_bodies_are_classified() {
        let auth = classify_error(
            401,
            r#"{"error":{"message":"bad key","type":"invalid_request_error"}}"#,
        );
        assert!(matches!(auth, LlmError::Auth(message) if message == "bad key"));

        assert!(matches!(classify_error(429, "slow down"), LlmError::RateLimited));
        assert!(matches!(classify_error(503, "oops"), LlmError::Transport(_)));
        assert!(matches!(classify_error(400, "nope"), LlmError::Api(_)));
    }
}
