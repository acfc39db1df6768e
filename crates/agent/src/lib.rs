//! Finance agent - turns a plain-language question into tool calls over the ledgers
//!
//! # Architecture
//!
//! One question runs a bounded loop:
//! 1. **Model step** (`llm`, `conversation`) - a provider reads the transcript and the tool
//!    catalog and answers with text or tool calls
//! 2. **Guardrails** (`guardrails`) - each requested call is allowed, denied or degraded
//! 3. **Tool execution** (`tools`) - validated reads and writes against `tally-db`
//! 4. **Final answer** - the model turns tool results into one reply
//!
//! [`entry::FinanceAgent::ask`] wraps the loop and never fails: missing users and
//! orchestration errors come back as fixed, user-safe strings.
//!
//! # Safety Principle
//!
//! The model only picks tools and arguments. Totals, document numbers and status rules are
//! computed by `tally-core` and enforced by the tools.

pub mod conversation;
pub mod entry;
pub mod guardrails;
pub mod llm;
pub mod prompt;
pub mod runtime;
pub mod tools;

pub use conversation::RuleBasedPlanner;
pub use entry::{AskError, FinanceAgent, FALLBACK_REPLY, SIGN_IN_REPLY};
pub use guardrails::{GuardrailDecision, GuardrailIntent, GuardrailPolicy};
pub use llm::{build_client, LlmClient, LlmError};
pub use runtime::{AgentError, AgentReply, AgentRuntime, RuntimeLimits, ToolInvocation};
pub use tools::{Tool, ToolContext, ToolError, ToolOutcome, ToolRegistry};
