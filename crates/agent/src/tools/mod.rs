//! Tool layer: the fixed catalog of operations the orchestrator may invoke.
//!
//! Each tool decodes its own JSON arguments, validates and defaults them, checks any dependency
//! (such as client existence) before it writes, and reports the result as a [`ToolOutcome`].
//! Failures stay typed until [`ToolOutcome::render`] turns them into the `"Error: "` string the
//! model sees.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use tally_core::domain::money::Currency;
use tally_core::domain::tenant::TenantId;
use tally_core::errors::DomainError;
use tally_db::{FinanceStore, RepositoryError};

use crate::llm::TOOL_ERROR_PREFIX;

use crate::llm::ToolSpec;

pub mod clients;
pub mod documents;
pub mod summary;
pub mod transactions;

pub use clients::{AddClientTool, ListClientsTool};
pub use documents::{CreateDocumentTool, ListDocumentsTool, UpdateDocumentStatusTool};
pub use summary::FinancialSummaryTool;
pub use transactions::AddTransactionTool;

pub const ADD_TRANSACTION: &str = "addTransaction";
pub const ADD_CLIENT: &str = "addClient";
pub const CREATE_INVOICE: &str = "createInvoice";
pub const CREATE_QUOTATION: &str = "createQuotation";
pub const LIST_CLIENTS: &str = "listClients";
pub const LIST_INVOICES: &str = "listInvoices";
pub const LIST_QUOTATIONS: &str = "listQuotations";
pub const UPDATE_INVOICE_STATUS: &str = "updateInvoiceStatus";
pub const UPDATE_QUOTATION_STATUS: &str = "updateQuotationStatus";
pub const GET_FINANCIAL_SUMMARY: &str = "getFinancialSummary";

/// Per-call context: whose ledgers to touch and the instant that stands in for "now".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolContext {
    pub tenant: TenantId,
    pub now: DateTime<Utc>,
}

impl ToolContext {
    pub fn new(tenant: TenantId) -> Self {
        Self { tenant, now: Utc::now() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Persistence(String),
    #[error("{tool} timed out after {after:?}")]
    Timeout { tool: String, after: Duration },
    /// Blocked by the guardrail policy before it ran.
    #[error("{0}")]
    Refused(String),
}

impl ToolError {
    pub fn class(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Persistence(_) => "persistence",
            Self::Timeout { .. } => "timeout",
            Self::Refused(_) => "refused",
        }
    }
}

impl From<DomainError> for ToolError {
    fn from(error: DomainError) -> Self {
        Self::Validation(error.to_string())
    }
}

impl From<RepositoryError> for ToolError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound { .. } => Self::NotFound(error.to_string()),
            other => Self::Persistence(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutcome {
    /// Confirmation text from a mutating tool.
    Completed(String),
    /// Structured projection from a read-only tool.
    Records(Value),
    Failed(ToolError),
}

impl ToolOutcome {
    pub fn render(&self) -> String {
        match self {
            Self::Completed(message) => message.clone(),
            Self::Records(records) => records.to_string(),
            Self::Failed(error) => format!("{TOOL_ERROR_PREFIX}{error}"),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl From<Result<String, ToolError>> for ToolOutcome {
    fn from(result: Result<String, ToolError>) -> Self {
        match result {
            Ok(message) => Self::Completed(message),
            Err(error) => Self::Failed(error),
        }
    }
}

impl From<Result<Value, ToolError>> for ToolOutcome {
    fn from(result: Result<Value, ToolError>) -> Self {
        match result {
            Ok(records) => Self::Records(records),
            Err(error) => Self::Failed(error),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;

    fn mutates(&self) -> bool;

    async fn execute(&self, context: &ToolContext, arguments: Value) -> ToolOutcome;
}

/// Name-indexed tool catalog. Iteration order is the order shown to the model.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The ten finance tools over one store.
    pub fn finance(store: &FinanceStore) -> Self {
        let mut registry = Self::new();
        registry.register(AddTransactionTool::new(store.transactions.clone()));
        registry.register(AddClientTool::new(store.clients.clone()));
        registry.register(CreateDocumentTool::new(store.invoices.clone(), store.clients.clone()));
        registry
            .register(CreateDocumentTool::new(store.quotations.clone(), store.clients.clone()));
        registry.register(ListClientsTool::new(store.clients.clone()));
        registry.register(ListDocumentsTool::new(store.invoices.clone()));
        registry.register(ListDocumentsTool::new(store.quotations.clone()));
        registry.register(UpdateDocumentStatusTool::new(store.invoices.clone()));
        registry.register(UpdateDocumentStatusTool::new(store.quotations.clone()));
        registry.register(FinancialSummaryTool::new(
            store.invoices.clone(),
            store.transactions.clone(),
        ));
        registry
    }

    /// Adds a tool, replacing any earlier tool with the same name in place.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let tool: Arc<dyn Tool> = Arc::new(tool);
        match self.tools.iter_mut().find(|existing| existing.name() == tool.name()) {
            Some(slot) => *slot = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|tool| tool.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|tool| ToolSpec {
                name: tool.name(),
                description: tool.description(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Decodes tool arguments. Providers occasionally send the arguments object as a JSON string,
/// and a tool with no parameters may receive `null`.
pub(crate) fn parse_input<T: DeserializeOwned>(
    tool: &str,
    arguments: Value,
) -> Result<T, ToolError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        Value::String(raw) => serde_json::from_str(&raw).map_err(|error| {
            ToolError::Validation(format!("{tool} arguments are not valid JSON: {error}"))
        })?,
        other => other,
    };

    serde_json::from_value(arguments)
        .map_err(|error| ToolError::Validation(format!("invalid {tool} arguments: {error}")))
}

pub(crate) fn parse_currency(value: Option<&str>) -> Result<Currency, ToolError> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(code) => Ok(code.parse::<Currency>()?),
        None => Ok(Currency::default()),
    }
}

pub(crate) fn required_text(field: &str, value: &str) -> Result<String, ToolError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ToolError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}
