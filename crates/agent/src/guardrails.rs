use tally_core::config::AgentConfig;

/// A tool call the model asked for, as seen by the policy before anything executes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailIntent {
    ToolCall { tool: String, mutates: bool, calls_this_turn: u32 },
    UnknownTool { tool: String },
}

impl GuardrailIntent {
    pub fn tool(&self) -> &str {
        match self {
            Self::ToolCall { tool, .. } | Self::UnknownTool { tool } => tool,
        }
    }

    pub fn action_key(&self) -> String {
        match self {
            Self::ToolCall { tool, mutates: true, .. } => format!("tool.write.{tool}"),
            Self::ToolCall { tool, mutates: false, .. } => format!("tool.read.{tool}"),
            Self::UnknownTool { .. } => "tool.unknown".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String, fallback_path: &'static str },
    Degrade { reason_code: &'static str, user_message: String, fallback_path: &'static str },
}

impl GuardrailDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn reason_code(&self) -> Option<&'static str> {
        match self {
            Self::Allow => None,
            Self::Deny { reason_code, .. } | Self::Degrade { reason_code, .. } => {
                Some(*reason_code)
            }
        }
    }

    pub fn user_message(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::Deny { user_message, .. } | Self::Degrade { user_message, .. } => {
                Some(user_message.as_str())
            }
        }
    }

    pub fn fallback_path(&self) -> Option<&'static str> {
        match self {
            Self::Allow => None,
            Self::Deny { fallback_path, .. } | Self::Degrade { fallback_path, .. } => {
                Some(*fallback_path)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub allow_mutations: bool,
    pub max_tool_calls: u32,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { allow_mutations: true, max_tool_calls: 8 }
    }
}

impl GuardrailPolicy {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self { allow_mutations: config.allow_mutations, max_tool_calls: config.max_tool_calls }
    }

    pub fn evaluate(&self, intent: &GuardrailIntent) -> GuardrailDecision {
        match intent {
            GuardrailIntent::UnknownTool { tool } => GuardrailDecision::Deny {
                reason_code: "unknown_tool",
                user_message: format!("`{tool}` is not one of the available finance tools."),
                fallback_path: "tool_catalog",
            },
            GuardrailIntent::ToolCall { calls_this_turn, .. }
                if *calls_this_turn >= self.max_tool_calls =>
            {
                GuardrailDecision::Degrade {
                    reason_code: "tool_budget_exhausted",
                    user_message: format!(
                        "Only {} actions can run per request, so this one was skipped. \
                         Ask again for the remaining steps.",
                        self.max_tool_calls
                    ),
                    fallback_path: "split_request",
                }
            }
            GuardrailIntent::ToolCall { mutates: true, .. } if !self.allow_mutations => {
                GuardrailDecision::Deny {
                    reason_code: "mutations_disabled",
                    user_message:
                        "Changes to financial records are disabled right now; only read-only \
                         questions can be answered."
                            .to_string(),
                    fallback_path: "read_only_mode",
                }
            }
            GuardrailIntent::ToolCall { .. } => GuardrailDecision::Allow,
        }
    }
}
