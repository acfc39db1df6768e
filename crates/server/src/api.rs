use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tally_agent::FinanceAgent;

/// Header the hosting application uses to pass the signed-in user.
pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct ApiState {
    agent: Arc<FinanceAgent>,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskResponse {
    pub reply: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_class: Option<String>,
}

pub fn router(agent: Arc<FinanceAgent>) -> Router {
    Router::new().route("/api/ask", post(ask)).with_state(ApiState { agent })
}

pub async fn ask(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<AskRequest>,
) -> (StatusCode, Json<AskResponse>) {
    let user_id =
        headers.get(USER_HEADER).and_then(|value| value.to_str().ok()).unwrap_or_default();

    // `ask` never fails, so neither does this route once the body parses.
    let body = match state.agent.converse(&request.question, user_id).await {
        Ok(reply) => AskResponse { reply: reply.text, error_class: None },
        Err(error) => AskResponse {
            reply: error.user_message().to_string(),
            error_class: Some(error.class().to_string()),
        },
    };
    (StatusCode::OK, Json(body))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tally_agent::{FinanceAgent, FALLBACK_REPLY};
    use tally_core::config::{AppConfig, LlmProvider};
    use tally_db::FinanceStore;
    use tower::ServiceExt;

    use crate::api::{router, AskResponse, USER_HEADER};

    fn agent_with(provider: LlmProvider) -> Arc<FinanceAgent> {
        let mut config = AppConfig::default();
        config.llm.provider = provider;
        config.llm.base_url = Some("http://127.0.0.1:9".to_string());
        config.llm.timeout_secs = 1;
        config.llm.max_retries = 0;
        Arc::new(FinanceAgent::from_config(&config, &FinanceStore::in_memory()).expect("agent"))
    }

    async fn post(
        agent: Arc<FinanceAgent>,
        user: Option<&str>,
        question: &str,
    ) -> (StatusCode, AskResponse) {
        let mut request = Request::post("/api/ask").header("content-type", "application/json");
        if let Some(user) = user {
            request = request.header(USER_HEADER, user);
        }
        let body = serde_json::json!({ "question": question }).to_string();
        let response = router(agent)
            .oneshot(request.body(Body::from(body)).expect("request"))
            .await
            .expect("router response");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn signed_in_users_get_the_agent_reply() {
        let agent = agent_with(LlmProvider::Rules);

        let (status, body) =
            post(agent.clone(), Some("owner-1"), "Add an expense of 45 for office supplies").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.reply.contains("USD 45.00"), "unexpected reply: {}", body.reply);
        assert_eq!(body.error_class, None);
    }

    #[tokio::test]
    async fn missing_user_header_gets_the_sign_in_message() {
        let (status, body) = post(agent_with(LlmProvider::Rules), None, "List my clients").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.reply, "You must be signed in to use the finance assistant.");
        assert_eq!(body.error_class.as_deref(), Some("unauthenticated"));
    }

    #[tokio::test]
    async fn unreachable_model_still_answers_with_the_fallback() {
        let agent = agent_with(LlmProvider::Ollama);

        let (status, body) = post(agent, Some("owner-1"), "List my clients").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.reply, FALLBACK_REPLY);
        assert_eq!(body.error_class.as_deref(), Some("llm"));
    }
}
