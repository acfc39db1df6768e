use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use tally_core::config::AppConfig;

use crate::guardrails::{GuardrailDecision, GuardrailIntent, GuardrailPolicy};
use crate::llm::{ChatMessage, LlmClient, LlmError, ToolCall};
use crate::prompt::system_prompt;
use crate::tools::{ToolContext, ToolError, ToolOutcome, ToolRegistry};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("model step timed out after {0:?}")]
    Timeout(Duration),
    #[error("no final answer after {0} model steps")]
    StepLimit(u32),
}

/// Bounds for one turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeLimits {
    pub max_steps: u32,
    pub llm_timeout: Duration,
    pub tool_timeout: Duration,
}

impl Default for RuntimeLimits {
    fn default() -> Self {
        Self {
            max_steps: 5,
            llm_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(15),
        }
    }
}

impl RuntimeLimits {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_steps: config.agent.max_steps,
            llm_timeout: Duration::from_secs(config.llm.timeout_secs),
            tool_timeout: Duration::from_secs(config.agent.tool_timeout_secs),
        }
    }
}

/// One executed (or refused) tool call, in the order the model asked for it.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Value,
    pub result: String,
    pub failed: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AgentReply {
    pub text: String,
    pub invocations: Vec<ToolInvocation>,
}

impl AgentReply {
    pub fn tool_names(&self) -> Vec<&str> {
        self.invocations.iter().map(|invocation| invocation.name.as_str()).collect()
    }
}

/// Drives one question through model steps and tool calls until the model answers in text.
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    guardrails: GuardrailPolicy,
    limits: RuntimeLimits,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        guardrails: GuardrailPolicy,
        limits: RuntimeLimits,
    ) -> Self {
        Self { llm, tools, guardrails, limits }
    }

    pub fn from_config(config: &AppConfig, llm: Arc<dyn LlmClient>, tools: ToolRegistry) -> Self {
        Self::new(
            llm,
            tools,
            GuardrailPolicy::from_config(&config.agent),
            RuntimeLimits::from_config(config),
        )
    }

    pub fn provider(&self) -> &'static str {
        self.llm.name()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub async fn run(
        &self,
        context: &ToolContext,
        question: &str,
    ) -> Result<AgentReply, AgentError> {
        let specs = self.tools.specs();
        let mut messages = vec![
            ChatMessage::system(system_prompt(context.now, &specs)),
            ChatMessage::user(question),
        ];
        let mut invocations = Vec::new();
        let mut executed = 0u32;

        for step in 1..=self.limits.max_steps {
            let response =
                tokio::time::timeout(self.limits.llm_timeout, self.llm.complete(&messages, &specs))
                    .await
                    .map_err(|_| AgentError::Timeout(self.limits.llm_timeout))??;

            debug!(
                event_name = "agent.llm.step",
                provider = self.llm.name(),
                step,
                tool_calls = response.tool_calls.len(),
                "model step finished"
            );

            if response.tool_calls.is_empty() {
                let text = response.content.map(|text| text.trim().to_string()).unwrap_or_default();
                if text.is_empty() {
                    return Err(LlmError::Decode(
                        "model returned neither text nor tool calls".to_string(),
                    )
                    .into());
                }
                return Ok(AgentReply { text, invocations });
            }

            messages.push(ChatMessage::assistant(response.content, response.tool_calls.clone()));
            for call in response.tool_calls {
                let (outcome, ran) = self.dispatch(context, &call, executed).await;
                if ran {
                    executed += 1;
                }

                let result = outcome.render();
                messages.push(ChatMessage::tool_result(call.id.as_str(), result.as_str()));
                invocations.push(ToolInvocation {
                    name: call.name,
                    arguments: call.arguments,
                    result,
                    failed: outcome.is_failure(),
                });
            }
        }

        Err(AgentError::StepLimit(self.limits.max_steps))
    }

    /// Runs one call through the guardrail and then the tool. The flag reports whether the tool
    /// actually ran, which is what the per-turn budget counts.
    async fn dispatch(
        &self,
        context: &ToolContext,
        call: &ToolCall,
        calls_this_turn: u32,
    ) -> (ToolOutcome, bool) {
        let tool = self.tools.get(&call.name);
        let intent = match &tool {
            Some(tool) => GuardrailIntent::ToolCall {
                tool: call.name.clone(),
                mutates: tool.mutates(),
                calls_this_turn,
            },
            None => GuardrailIntent::UnknownTool { tool: call.name.clone() },
        };

        let tool = match (tool, self.guardrails.evaluate(&intent)) {
            (Some(tool), GuardrailDecision::Allow) => tool,
            (_, decision) => {
                warn!(
                    event_name = "agent.guardrail.blocked",
                    tenant_id = %context.tenant,
                    tool = intent.tool(),
                    action_key = %intent.action_key(),
                    reason_code = decision.reason_code().unwrap_or("unknown"),
                    fallback_path = decision.fallback_path().unwrap_or("none"),
                    "tool call blocked by guardrail"
                );
                let message = decision.user_message().unwrap_or("This action is not available.");
                return (ToolOutcome::Failed(ToolError::Refused(message.to_string())), false);
            }
        };

        let started = Instant::now();
        let outcome = match tokio::time::timeout(
            self.limits.tool_timeout,
            tool.execute(context, call.arguments.clone()),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => ToolOutcome::Failed(ToolError::Timeout {
                tool: call.name.clone(),
                after: self.limits.tool_timeout,
            }),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            ToolOutcome::Failed(error) => warn!(
                event_name = "agent.tool.failed",
                tenant_id = %context.tenant,
                tool = %call.name,
                error_class = error.class(),
                error = %error,
                elapsed_ms,
                "tool call failed"
            ),
            _ => info!(
                event_name = "agent.tool.completed",
                tenant_id = %context.tenant,
                tool = %call.name,
                elapsed_ms,
                "tool call completed"
            ),
        }
        (outcome, true)
    }
}
