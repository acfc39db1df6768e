use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use tally_core::domain::document::InvoiceStatus;
use tally_core::reporting::FinancialSummary;
use tally_db::repositories::{DocumentRepository, TransactionRepository};

use super::{Tool, ToolContext, ToolError, ToolOutcome};

/// Revenue, expenses, profit and record counts across the tenant's ledgers.
pub struct FinancialSummaryTool {
    invoices: Arc<dyn DocumentRepository<InvoiceStatus>>,
    transactions: Arc<dyn TransactionRepository>,
}

impl FinancialSummaryTool {
    pub fn new(
        invoices: Arc<dyn DocumentRepository<InvoiceStatus>>,
        transactions: Arc<dyn TransactionRepository>,
    ) -> Self {
        Self { invoices, transactions }
    }

    async fn run(&self, context: &ToolContext) -> Result<Value, ToolError> {
        let invoices = self.invoices.list(&context.tenant, None).await?;
        let transactions = self.transactions.list(&context.tenant).await?;
        let summary = FinancialSummary::compute(&invoices, &transactions)?;

        serde_json::to_value(summary)
            .map_err(|error| ToolError::Persistence(format!("could not project summary: {error}")))
    }
}

#[async_trait]
impl Tool for FinancialSummaryTool {
    fn name(&self) -> &'static str {
        super::GET_FINANCIAL_SUMMARY
    }

    fn description(&self) -> &'static str {
        "Summarize finances: total revenue from paid invoices, total expenses, net profit, and \
         invoice and transaction counts."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn mutates(&self) -> bool {
        false
    }

    async fn execute(&self, context: &ToolContext, _arguments: Value) -> ToolOutcome {
        self.run(context).await.into()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::json;

    use tally_core::domain::client::ClientId;
    use tally_core::domain::document::{DocumentPatch, InvoiceStatus, LineItem, NewInvoice};
    use tally_core::domain::money::Currency;
    use tally_core::domain::tenant::TenantId;
    use tally_core::domain::transaction::{NewTransaction, TransactionKind};
    use tally_db::repositories::{
        DocumentRepository, InMemoryDocumentRepository, InMemoryTransactionRepository,
        TransactionRepository,
    };

    use super::FinancialSummaryTool;
    use crate::tools::{Tool, ToolContext, ToolOutcome};

    async fn add_invoice(
        invoices: &InMemoryDocumentRepository<InvoiceStatus>,
        tenant: &TenantId,
        number: &str,
        amount: i64,
        status: InvoiceStatus,
    ) {
        let items =
            vec![LineItem::priced("Work", Decimal::ONE, Decimal::from(amount)).expect("item")];
        let draft = NewInvoice::draft(
            number.to_string(),
            ClientId("c-1".to_string()),
            items,
            Currency::Usd,
            Utc::now(),
            Utc::now(),
        )
        .expect("draft");
        let invoice = invoices.create(tenant, draft).await.expect("create");
        invoices.update(tenant, &invoice.id, DocumentPatch::status(status)).await.expect("update");
    }

    #[tokio::test]
    async fn summary_counts_paid_revenue_against_expenses() {
        let invoices = Arc::new(InMemoryDocumentRepository::<InvoiceStatus>::default());
        let transactions = Arc::new(InMemoryTransactionRepository::default());
        let context = ToolContext::new(TenantId("user-1".to_string()));

        add_invoice(&invoices, &context.tenant, "INV-001", 100, InvoiceStatus::Paid).await;
        add_invoice(&invoices, &context.tenant, "INV-002", 50, InvoiceStatus::Paid).await;
        add_invoice(&invoices, &context.tenant, "INV-003", 30, InvoiceStatus::Draft).await;
        let expense = NewTransaction::new(
            TransactionKind::expense(None, None),
            Decimal::from(40),
            Currency::Usd,
            Utc::now(),
            "Software",
        )
        .expect("expense");
        transactions.create(&context.tenant, expense).await.expect("create");

        let tool = FinancialSummaryTool::new(invoices, transactions);
        let outcome = tool.execute(&context, json!({})).await;

        assert_eq!(
            outcome,
            ToolOutcome::Records(json!({
                "totalRevenue": 150.0,
                "totalExpenses": 40.0,
                "netProfit": 110.0,
                "totalInvoices": 3,
                "paidInvoices": 2,
                "unpaidInvoices": 1,
                "totalTransactions": 1
            }))
        );
    }

    #[tokio::test]
    async fn totals_past_decimal_range_come_back_as_an_error() {
        let invoices = Arc::new(InMemoryDocumentRepository::<InvoiceStatus>::default());
        let transactions = Arc::new(InMemoryTransactionRepository::default());
        let context = ToolContext::new(TenantId("user-1".to_string()));
        for description in ["Fleet", "Warehouse"] {
            let expense = NewTransaction::new(
                TransactionKind::expense(None, None),
                Decimal::MAX,
                Currency::Usd,
                Utc::now(),
                description,
            )
            .expect("expense");
            transactions.create(&context.tenant, expense).await.expect("create");
        }

        let tool = FinancialSummaryTool::new(invoices, transactions);
        let outcome = tool.execute(&context, json!({})).await;

        assert!(outcome.is_failure());
        assert_eq!(
            outcome.render(),
            "Error: domain invariant violation: expense amount is too large"
        );
    }

    #[tokio::test]
    async fn other_tenants_do_not_leak_into_the_summary() {
        let invoices = Arc::new(InMemoryDocumentRepository::<InvoiceStatus>::default());
        let transactions = Arc::new(InMemoryTransactionRepository::default());
        let other = TenantId("someone-else".to_string());
        add_invoice(&invoices, &other, "INV-001", 999, InvoiceStatus::Paid).await;

        let tool = FinancialSummaryTool::new(invoices, transactions);
        let context = ToolContext::new(TenantId("user-1".to_string()));
        let outcome = tool.execute(&context, json!({})).await;

        let ToolOutcome::Records(summary) = outcome else {
            panic!("summary should not fail");
        };
        assert_eq!(summary["totalRevenue"], json!(0.0));
        assert_eq!(summary["totalInvoices"], json!(0));
    }
}
