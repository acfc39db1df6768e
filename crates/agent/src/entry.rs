//! `ask`: the one call the hosting application makes.
//!
//! It never fails. A blank user id is answered with the sign-in message before anything else
//! runs, and any orchestration failure is logged with a correlation id and answered with a
//! fixed fallback.

use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use tally_core::config::AppConfig;
use tally_core::domain::tenant::TenantId;
use tally_db::FinanceStore;

use crate::llm::{build_client, LlmError};
use crate::runtime::{AgentError, AgentReply, AgentRuntime};
use crate::tools::{ToolContext, ToolRegistry};

pub const FALLBACK_REPLY: &str = "I had trouble processing that request. Please try again.";

pub const SIGN_IN_REPLY: &str = "You must be signed in to use the finance assistant.";

#[derive(Debug, Error)]
pub enum AskError {
    #[error("no signed-in user")]
    Unauthenticated,
    #[error("orchestration failed ({correlation_id}): {source}")]
    Agent { correlation_id: String, source: AgentError },
}

impl AskError {
    /// What the user sees instead of a reply.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unauthenticated => SIGN_IN_REPLY,
            Self::Agent { .. } => FALLBACK_REPLY,
        }
    }

    pub fn class(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Agent { source: AgentError::Llm(_), .. } => "llm",
            Self::Agent { source: AgentError::Timeout(_), .. } => "timeout",
            Self::Agent { source: AgentError::StepLimit(_), .. } => "step_limit",
        }
    }
}

pub struct FinanceAgent {
    runtime: AgentRuntime,
}

impl FinanceAgent {
    pub fn new(runtime: AgentRuntime) -> Self {
        Self { runtime }
    }

    /// Wires the configured model provider to the finance tools over `store`.
    pub fn from_config(config: &AppConfig, store: &FinanceStore) -> Result<Self, LlmError> {
        let llm = build_client(config)?;
        Ok(Self::new(AgentRuntime::from_config(config, llm, ToolRegistry::finance(store))))
    }

    pub fn runtime(&self) -> &AgentRuntime {
        &self.runtime
    }

    pub async fn ask(&self, question: &str, user_id: &str) -> String {
        match self.converse(question, user_id).await {
            Ok(reply) => reply.text,
            Err(error) => error.user_message().to_string(),
        }
    }

    /// Same as [`FinanceAgent::ask`] but keeps the tool transcript and the failure cause.
    pub async fn converse(&self, question: &str, user_id: &str) -> Result<AgentReply, AskError> {
        let Some(tenant) = TenantId::from_user_id(user_id) else {
            warn!(event_name = "agent.ask.unauthenticated", "question without a signed-in user");
            return Err(AskError::Unauthenticated);
        };

        let correlation_id = Uuid::new_v4().to_string();
        info!(
            event_name = "agent.ask.received",
            correlation_id = %correlation_id,
            tenant_id = %tenant,
            provider = self.runtime.provider(),
            "question received"
        );

        let context = ToolContext::new(tenant);
        match self.runtime.run(&context, question).await {
            Ok(reply) => {
                info!(
                    event_name = "agent.ask.answered",
                    correlation_id = %correlation_id,
                    tenant_id = %context.tenant,
                    tool_calls = reply.invocations.len(),
                    "question answered"
                );
                Ok(reply)
            }
            Err(source) => {
                error!(
                    event_name = "agent.ask.failed",
                    correlation_id = %correlation_id,
                    tenant_id = %context.tenant,
                    error = %source,
                    "orchestration failed"
                );
                Err(AskError::Agent { correlation_id, source })
            }
        }
    }
}
