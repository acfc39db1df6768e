use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use tally_core::domain::dates::parse_date_or;
use tally_core::domain::transaction::{NewTransaction, TransactionKind};
use tally_core::pricing::format_money;
use tally_db::repositories::TransactionRepository;

use super::{parse_currency, parse_input, required_text, Tool, ToolContext, ToolError, ToolOutcome};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddTransactionInput {
    #[serde(rename = "type")]
    kind: String,
    amount: Decimal,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    vendor: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    currency: Option<String>,
}

pub struct AddTransactionTool {
    transactions: Arc<dyn TransactionRepository>,
}

impl AddTransactionTool {
    pub fn new(transactions: Arc<dyn TransactionRepository>) -> Self {
        Self { transactions }
    }

    async fn run(&self, context: &ToolContext, arguments: Value) -> Result<String, ToolError> {
        let input: AddTransactionInput = parse_input(super::ADD_TRANSACTION, arguments)?;

        let kind = match input.kind.trim().to_ascii_lowercase().as_str() {
            "income" => TransactionKind::income(input.source)?,
            "expense" => TransactionKind::expense(input.category, input.vendor),
            other => {
                return Err(ToolError::Validation(format!(
                    "transaction type must be `income` or `expense`, got `{other}`"
                )))
            }
        };
        let currency = parse_currency(input.currency.as_deref())?;
        let date = parse_date_or(input.date.as_deref(), context.now)?;
        let description = required_text("description", &input.description)?;
        let draft = NewTransaction::new(kind, input.amount, currency, date, description)?;

        let transaction = self.transactions.create(&context.tenant, draft).await?;
        let amount = format_money(transaction.amount, transaction.currency);

        Ok(match &transaction.kind {
            TransactionKind::Income { source } => format!(
                "Recorded income of {amount} from {source} for {}.",
                transaction.description
            ),
            TransactionKind::Expense { category, vendor: Some(vendor) } => format!(
                "Recorded expense of {amount} for {} at {vendor} (category: {category}).",
                transaction.description
            ),
            TransactionKind::Expense { category, vendor: None } => format!(
                "Recorded expense of {amount} for {} (category: {category}).",
                transaction.description
            ),
        })
    }
}

#[async_trait]
impl Tool for AddTransactionTool {
    fn name(&self) -> &'static str {
        super::ADD_TRANSACTION
    }

    fn description(&self) -> &'static str {
        "Record an income or expense transaction. Income requires a source; expenses take a \
         category (defaults to \"other\") and an optional vendor."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "type": {"type": "string", "enum": ["income", "expense"]},
                "amount": {"type": "number", "exclusiveMinimum": 0},
                "date": {"type": "string", "description": "ISO date, defaults to today"},
                "description": {"type": "string"},
                "category": {"type": "string", "description": "Expense category"},
                "vendor": {"type": "string", "description": "Expense vendor"},
                "source": {"type": "string", "description": "Income source, required for income"},
                "currency": {"type": "string", "enum": ["USD", "EUR", "GBP", "INR", "AED", "CAD"]}
            },
            "required": ["type", "amount", "description"]
        })
    }

    fn mutates(&self) -> bool {
        true
    }

    async fn execute(&self, context: &ToolContext, arguments: Value) -> ToolOutcome {
        self.run(context, arguments).await.into()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use tally_core::domain::tenant::TenantId;
    use tally_core::domain::transaction::TransactionKind;
    use tally_db::repositories::{InMemoryTransactionRepository, TransactionRepository};

    use super::AddTransactionTool;
    use crate::tools::{Tool, ToolContext, ToolOutcome};

    fn setup() -> (Arc<InMemoryTransactionRepository>, AddTransactionTool, ToolContext) {
        let repository = Arc::new(InMemoryTransactionRepository::default());
        let tool = AddTransactionTool::new(repository.clone());
        (repository, tool, ToolContext::new(TenantId("user-1".to_string())))
    }

    #[tokio::test]
    async fn expense_without_category_is_filed_as_other() {
        let (repository, tool, context) = setup();

        let outcome = tool
            .execute(
                &context,
                json!({"type": "expense", "amount": 45, "description": "office supplies"}),
            )
            .await;

        assert_eq!(
            outcome,
            ToolOutcome::Completed(
                "Recorded expense of USD 45.00 for office supplies (category: other).".to_string()
            )
        );
        let stored = repository.list(&context.tenant).await.expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(
            stored[0].kind,
            TransactionKind::Expense { category: "other".to_string(), vendor: None }
        );
        assert_eq!(stored[0].date, context.now);
    }

    #[tokio::test]
    async fn income_without_source_is_rejected_before_persisting() {
        let (repository, tool, context) = setup();

        let outcome = tool
            .execute(&context, json!({"type": "income", "amount": 900, "description": "grant"}))
            .await;

        assert!(outcome.render().starts_with("Error: "));
        assert!(outcome.render().contains("source"));
        assert!(repository.list(&context.tenant).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn income_ignores_expense_only_fields() {
        let (repository, tool, context) = setup();

        let outcome = tool
            .execute(
                &context,
                json!({
                    "type": "income",
                    "amount": "1500.50",
                    "description": "March retainer",
                    "source": "Acme Corp",
                    "category": "consulting",
                    "currency": "eur",
                    "date": "2026-03-01"
                }),
            )
            .await;

        assert_eq!(
            outcome.render(),
            "Recorded income of EUR 1500.50 from Acme Corp for March retainer."
        );
        let stored = repository.list(&context.tenant).await.expect("list");
        assert_eq!(stored[0].kind, TransactionKind::Income { source: "Acme Corp".to_string() });
    }

    #[tokio::test]
    async fn rejects_unknown_types_and_non_positive_amounts() {
        let (repository, tool, context) = setup();

        let unknown = tool
            .execute(&context, json!({"type": "refund", "amount": 5, "description": "x"}))
            .await;
        assert!(unknown.render().contains("`refund`"));

        let negative = tool
            .execute(&context, json!({"type": "expense", "amount": -5, "description": "x"}))
            .await;
        assert!(negative.render().contains("greater than zero"));

        let bad_date = tool
            .execute(
                &context,
                json!({"type": "expense", "amount": 5, "description": "x", "date": "soon"}),
            )
            .await;
        assert!(bad_date.render().contains("invalid date"));

        let out_of_range = tool
            .execute(
                &context,
                json!({
                    "type": "expense",
                    "amount": "1000000000000000000000000000000",
                    "description": "x"
                }),
            )
            .await;
        assert!(out_of_range.is_failure());
        assert!(out_of_range.render().starts_with("Error: "));

        assert!(repository.list(&context.tenant).await.expect("list").is_empty());
    }
}
