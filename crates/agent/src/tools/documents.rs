//! Invoice and quotation tools. One generic implementation per operation, specialised by the
//! document's status type; names, number keys and wording come from the document kind.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use tally_core::domain::dates::{parse_date, parse_date_or};
use tally_core::domain::document::{
    DocumentKind, DocumentPatch, DocumentStatus, LineItem, NewSalesDocument, SalesDocument,
};
use tally_core::pricing::{format_money, round_money};
use tally_db::repositories::{ClientRepository, DocumentRepository};

use super::{parse_currency, parse_input, required_text, Tool, ToolContext, ToolError, ToolOutcome};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn create_tool_name(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Invoice => super::CREATE_INVOICE,
        DocumentKind::Quotation => super::CREATE_QUOTATION,
    }
}

fn list_tool_name(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Invoice => super::LIST_INVOICES,
        DocumentKind::Quotation => super::LIST_QUOTATIONS,
    }
}

fn update_tool_name(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Invoice => super::UPDATE_INVOICE_STATUS,
        DocumentKind::Quotation => super::UPDATE_QUOTATION_STATUS,
    }
}

/// Argument and projection key carrying the document number.
pub fn number_field(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Invoice => "invoiceNumber",
        DocumentKind::Quotation => "quotationNumber",
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemInput {
    #[serde(default)]
    description: String,
    quantity: Decimal,
    unit_price: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDocumentInput {
    #[serde(default)]
    client_name: String,
    #[serde(default)]
    items: Vec<ItemInput>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    currency: Option<String>,
}

pub struct CreateDocumentTool<S: DocumentStatus> {
    documents: Arc<dyn DocumentRepository<S>>,
    clients: Arc<dyn ClientRepository>,
}

impl<S: DocumentStatus> CreateDocumentTool<S> {
    pub fn new(
        documents: Arc<dyn DocumentRepository<S>>,
        clients: Arc<dyn ClientRepository>,
    ) -> Self {
        Self { documents, clients }
    }

    async fn run(&self, context: &ToolContext, arguments: Value) -> Result<String, ToolError> {
        let kind = S::KIND;
        let input: CreateDocumentInput = parse_input(create_tool_name(kind), arguments)?;

        let client_name = required_text("clientName", &input.client_name)?;
        if input.items.is_empty() {
            return Err(ToolError::Validation(format!(
                "{} requires at least one line item",
                kind.label()
            )));
        }
        let items = input
            .items
            .into_iter()
            .map(|item| LineItem::priced(item.description, item.quantity, item.unit_price))
            .collect::<Result<Vec<_>, _>>()?;
        let due_date = match input.due_date.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => parse_date(value)?,
            _ => return Err(ToolError::Validation("dueDate is required".to_string())),
        };
        let date = parse_date_or(input.date.as_deref(), context.now)?;
        let currency = parse_currency(input.currency.as_deref())?;

        let client =
            self.clients.find_by_name(&context.tenant, &client_name).await?.ok_or_else(|| {
                ToolError::NotFound(format!(
                    "Client \"{client_name}\" was not found. Add the client before creating \
                     the {}.",
                    kind.label()
                ))
            })?;

        let existing = self.documents.count(&context.tenant).await?;
        let draft = NewSalesDocument::<S>::draft(
            kind.next_number(existing),
            client.id.clone(),
            items,
            currency,
            date,
            due_date,
        )?;
        let document = self.documents.create(&context.tenant, draft).await?;

        Ok(format!(
            "{} {} has been created for {} with a total of {} (due {}).",
            kind.title(),
            document.number,
            client.name,
            format_money(document.total_amount, document.currency),
            document.due_date.format(DATE_FORMAT)
        ))
    }
}

#[async_trait]
impl<S: DocumentStatus> Tool for CreateDocumentTool<S> {
    fn name(&self) -> &'static str {
        create_tool_name(S::KIND)
    }

    fn description(&self) -> &'static str {
        match S::KIND {
            DocumentKind::Invoice => {
                "Create a draft invoice for an existing client. The total is computed from the \
                 line items and the next invoice number is assigned automatically."
            }
            DocumentKind::Quotation => {
                "Create a draft quotation for an existing client. The total is computed from the \
                 line items and the next quotation number is assigned automatically."
            }
        }
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "clientName": {"type": "string", "description": "Name of an existing client"},
                "items": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "properties": {
                            "description": {"type": "string"},
                            "quantity": {"type": "number", "exclusiveMinimum": 0},
                            "unitPrice": {"type": "number", "minimum": 0}
                        },
                        "required": ["description", "quantity", "unitPrice"]
                    }
                },
                "dueDate": {"type": "string", "description": "ISO date"},
                "currency": {"type": "string", "enum": ["USD", "EUR", "GBP", "INR", "AED", "CAD"]}
            },
            "required": ["clientName", "items", "dueDate"]
        })
    }

    fn mutates(&self) -> bool {
        true
    }

    async fn execute(&self, context: &ToolContext, arguments: Value) -> ToolOutcome {
        self.run(context, arguments).await.into()
    }
}

#[derive(Debug, Deserialize)]
struct ListDocumentsInput {
    #[serde(default)]
    status: Option<String>,
}

pub struct ListDocumentsTool<S: DocumentStatus> {
    documents: Arc<dyn DocumentRepository<S>>,
}

impl<S: DocumentStatus> ListDocumentsTool<S> {
    pub fn new(documents: Arc<dyn DocumentRepository<S>>) -> Self {
        Self { documents }
    }

    async fn run(&self, context: &ToolContext, arguments: Value) -> Result<Value, ToolError> {
        let input: ListDocumentsInput = parse_input(list_tool_name(S::KIND), arguments)?;
        let status = match input.status.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => Some(parse_status::<S>(value)?),
            _ => None,
        };

        let documents = self.documents.list(&context.tenant, status).await?;
        Ok(Value::Array(documents.iter().map(project).collect()))
    }
}

fn project<S: DocumentStatus>(document: &SalesDocument<S>) -> Value {
    let mut record = Map::new();
    record.insert(number_field(S::KIND).to_string(), json!(document.number));
    record.insert("clientRef".to_string(), json!(document.client_id.0));
    record.insert("totalAmount".to_string(), money_value(document.total_amount));
    record.insert("currency".to_string(), json!(document.currency.code()));
    record.insert("status".to_string(), json!(document.status.as_str()));
    record.insert("dueDate".to_string(), json!(document.due_date.format(DATE_FORMAT).to_string()));
    Value::Object(record)
}

fn money_value(amount: Decimal) -> Value {
    use rust_decimal::prelude::ToPrimitive;
    round_money(amount).to_f64().map_or(Value::Null, |amount| json!(amount))
}

fn parse_status<S: DocumentStatus>(value: &str) -> Result<S, ToolError> {
    S::parse(value).map_err(|_| {
        ToolError::Validation(format!(
            "`{value}` is not a valid {} status (expected one of: {})",
            S::KIND.label(),
            S::allowed_values().join(", ")
        ))
    })
}

#[async_trait]
impl<S: DocumentStatus> Tool for ListDocumentsTool<S> {
    fn name(&self) -> &'static str {
        list_tool_name(S::KIND)
    }

    fn description(&self) -> &'static str {
        match S::KIND {
            DocumentKind::Invoice => "List invoices, optionally filtered by status.",
            DocumentKind::Quotation => "List quotations, optionally filtered by status.",
        }
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "status": {"type": "string", "enum": S::allowed_values()}
            }
        })
    }

    fn mutates(&self) -> bool {
        false
    }

    async fn execute(&self, context: &ToolContext, arguments: Value) -> ToolOutcome {
        self.run(context, arguments).await.into()
    }
}

#[derive(Debug, Deserialize)]
struct UpdateStatusInput {
    #[serde(default, alias = "invoiceNumber", alias = "quotationNumber")]
    number: String,
    #[serde(default)]
    status: String,
}

pub struct UpdateDocumentStatusTool<S: DocumentStatus> {
    documents: Arc<dyn DocumentRepository<S>>,
}

impl<S: DocumentStatus> UpdateDocumentStatusTool<S> {
    pub fn new(documents: Arc<dyn DocumentRepository<S>>) -> Self {
        Self { documents }
    }

    async fn run(&self, context: &ToolContext, arguments: Value) -> Result<String, ToolError> {
        let kind = S::KIND;
        let input: UpdateStatusInput = parse_input(update_tool_name(kind), arguments)?;
        let number = required_text(number_field(kind), &input.number)?.to_ascii_uppercase();
        let status = parse_status::<S>(&required_text("status", &input.status)?)?;

        let document =
            self.documents.find_by_number(&context.tenant, &number).await?.ok_or_else(|| {
                ToolError::NotFound(format!("{} {number} was not found.", kind.title()))
            })?;

        if document.status == status {
            return Ok(format!(
                "{} {} is already {}.",
                kind.title(),
                document.number,
                status.as_str()
            ));
        }

        self.documents.update(&context.tenant, &document.id, DocumentPatch::status(status)).await?;

        Ok(format!(
            "{} {} status has been updated from {} to {}.",
            kind.title(),
            document.number,
            document.status.as_str(),
            status.as_str()
        ))
    }
}

#[async_trait]
impl<S: DocumentStatus> Tool for UpdateDocumentStatusTool<S> {
    fn name(&self) -> &'static str {
        update_tool_name(S::KIND)
    }

    fn description(&self) -> &'static str {
        match S::KIND {
            DocumentKind::Invoice => {
                "Change the status of an invoice identified by its number (e.g. INV-001)."
            }
            DocumentKind::Quotation => {
                "Change the status of a quotation identified by its number (e.g. QUO-001)."
            }
        }
    }

    fn parameters(&self) -> Value {
        let number_key = number_field(S::KIND);
        json!({
            "type": "object",
            "properties": {
                number_key: {"type": "string"},
                "status": {"type": "string", "enum": S::allowed_values()}
            },
            "required": [number_key, "status"]
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

    use rust_decimal::Decimal;
    use serde_json::json;

    use tally_core::domain::client::NewClient;
    use tally_core::domain::document::{InvoiceStatus, QuotationStatus};
    use tally_core::domain::tenant::TenantId;
    use tally_core::pricing::subtotal;
    use tally_db::repositories::{
        ClientRepository, DocumentRepository, InMemoryClientRepository,
        InMemoryDocumentRepository,
    };

    use super::{CreateDocumentTool, ListDocumentsTool, UpdateDocumentStatusTool};
    use crate::tools::{Tool, ToolContext, ToolOutcome};

    struct Fixture {
        clients: Arc<InMemoryClientRepository>,
        invoices: Arc<InMemoryDocumentRepository<InvoiceStatus>>,
        quotations: Arc<InMemoryDocumentRepository<QuotationStatus>>,
        context: ToolContext,
    }

    async fn fixture() -> Fixture {
        let clients = Arc::new(InMemoryClientRepository::default());
        let context = ToolContext::new(TenantId("user-1".to_string()));
        clients
            .create(
                &context.tenant,
                NewClient {
                    name: "Acme Corp".to_string(),
                    contact_person: "Dana Reyes".to_string(),
                    email: "dana@acme.test".to_string(),
                    phone: None,
                    tax_id: None,
                    opportunity_worth: None,
                },
            )
            .await
            .expect("seed client");

        Fixture {
            clients,
            invoices: Arc::new(InMemoryDocumentRepository::default()),
            quotations: Arc::new(InMemoryDocumentRepository::default()),
            context,
        }
    }

    fn invoice_creator(fixture: &Fixture) -> CreateDocumentTool<InvoiceStatus> {
        CreateDocumentTool::new(fixture.invoices.clone(), fixture.clients.clone())
    }

    fn items() -> serde_json::Value {
        json!([
            {"description": "Consulting", "quantity": 2, "unitPrice": 50},
            {"description": "Hosting", "quantity": 1, "unitPrice": 25}
        ])
    }

    #[tokio::test]
    async fn invoice_total_is_the_item_subtotal() {
        let fixture = fixture().await;
        let tool = invoice_creator(&fixture);

        let outcome = tool
            .execute(
                &fixture.context,
                json!({"clientName": "acme corp", "items": items(), "dueDate": "2026-02-10"}),
            )
            .await;

        assert_eq!(
            outcome.render(),
            "Invoice INV-001 has been created for Acme Corp with a total of USD 125.00 \
             (due 2026-02-10)."
        );
        let stored = fixture.invoices.list(&fixture.context.tenant, None).await.expect("list");
        assert_eq!(stored[0].total_amount, Decimal::from(125));
        assert_eq!(subtotal(&stored[0].items), Ok(stored[0].total_amount));
        assert_eq!(stored[0].status, InvoiceStatus::Draft);
    }

    #[tokio::test]
    async fn numbering_continues_from_the_current_count() {
        let fixture = fixture().await;
        let tool = CreateDocumentTool::<QuotationStatus>::new(
            fixture.quotations.clone(),
            fixture.clients.clone(),
        );
        let arguments = json!({
            "clientName": "Acme Corp",
            "items": items(),
            "dueDate": "2026-02-10",
            "currency": "EUR"
        });

        for _ in 0..3 {
            assert!(!tool.execute(&fixture.context, arguments.clone()).await.is_failure());
        }
        let fourth = tool.execute(&fixture.context, arguments).await;

        assert!(fourth.render().starts_with("Quotation QUO-004 has been created"));
        assert!(fourth.render().contains("EUR 125.00"));
    }

    #[tokio::test]
    async fn unknown_client_fails_without_creating_anything() {
        let fixture = fixture().await;
        let tool = invoice_creator(&fixture);

        let outcome = tool
            .execute(
                &fixture.context,
                json!({"clientName": "Umbrella", "items": items(), "dueDate": "2026-02-10"}),
            )
            .await;

        assert!(outcome.render().starts_with("Error: "));
        assert!(outcome.render().contains("Umbrella"));
        assert_eq!(fixture.invoices.count(&fixture.context.tenant).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn line_totals_past_decimal_range_are_rejected_before_persistence() {
        let fixture = fixture().await;
        let tool = invoice_creator(&fixture);

        let outcome = tool
            .execute(
                &fixture.context,
                json!({
                    "clientName": "Acme Corp",
                    "items": [{"description": "x", "quantity": 1e20, "unitPrice": 1e20}],
                    "dueDate": "2026-02-10"
                }),
            )
            .await;

        assert_eq!(
            outcome.render(),
            "Error: domain invariant violation: line item amount is too large"
        );
        assert_eq!(fixture.invoices.count(&fixture.context.tenant).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn creation_requires_items_and_a_due_date() {
        let fixture = fixture().await;
        let tool = invoice_creator(&fixture);

        let no_items = tool
            .execute(
                &fixture.context,
                json!({"clientName": "Acme Corp", "items": [], "dueDate": "2026-02-10"}),
            )
            .await;
        assert_eq!(no_items.render(), "Error: invoice requires at least one line item");

        let no_due = tool
            .execute(&fixture.context, json!({"clientName": "Acme Corp", "items": items()}))
            .await;
        assert_eq!(no_due.render(), "Error: dueDate is required");

        let bad_item = tool
            .execute(
                &fixture.context,
                json!({
                    "clientName": "Acme Corp",
                    "items": [{"description": "Work", "quantity": 0, "unitPrice": 10}],
                    "dueDate": "2026-02-10"
                }),
            )
            .await;
        assert!(bad_item.render().contains("positive quantity"));
    }

    #[tokio::test]
    async fn status_update_touches_only_the_status() {
        let fixture = fixture().await;
        let create = invoice_creator(&fixture);
        let update = UpdateDocumentStatusTool::<InvoiceStatus>::new(fixture.invoices.clone());
        create
            .execute(
                &fixture.context,
                json!({"clientName": "Acme Corp", "items": items(), "dueDate": "2026-02-10"}),
            )
            .await;
        let before = fixture.invoices.list(&fixture.context.tenant, None).await.expect("list");

        let outcome = update
            .execute(&fixture.context, json!({"invoiceNumber": "inv-001", "status": "paid"}))
            .await;

        assert_eq!(
            outcome,
            ToolOutcome::Completed(
                "Invoice INV-001 status has been updated from draft to paid.".to_string()
            )
        );
        let after = fixture.invoices.list(&fixture.context.tenant, None).await.expect("list");
        assert_eq!(after[0].status, InvoiceStatus::Paid);
        assert_eq!(after[0].number, before[0].number);
        assert_eq!(after[0].items, before[0].items);
        assert_eq!(after[0].total_amount, before[0].total_amount);
    }

    #[tokio::test]
    async fn status_update_rejects_missing_numbers_and_foreign_statuses() {
        let fixture = fixture().await;
        let update = UpdateDocumentStatusTool::<InvoiceStatus>::new(fixture.invoices.clone());

        let missing = update
            .execute(&fixture.context, json!({"invoiceNumber": "INV-009", "status": "paid"}))
            .await;
        assert_eq!(missing.render(), "Error: Invoice INV-009 was not found.");

        let foreign = update
            .execute(&fixture.context, json!({"invoiceNumber": "INV-001", "status": "won"}))
            .await;
        assert_eq!(
            foreign.render(),
            "Error: `won` is not a valid invoice status (expected one of: draft, sent, paid, \
             overdue)"
        );
    }

    #[tokio::test]
    async fn listing_filters_by_status_and_rejects_unknown_filters() {
        let fixture = fixture().await;
        let create = invoice_creator(&fixture);
        let update = UpdateDocumentStatusTool::<InvoiceStatus>::new(fixture.invoices.clone());
        let list = ListDocumentsTool::<InvoiceStatus>::new(fixture.invoices.clone());
        let arguments =
            json!({"clientName": "Acme Corp", "items": items(), "dueDate": "2026-02-10"});
        create.execute(&fixture.context, arguments.clone()).await;
        create.execute(&fixture.context, arguments).await;
        update
            .execute(&fixture.context, json!({"invoiceNumber": "INV-002", "status": "sent"}))
            .await;

        let sent = list.execute(&fixture.context, json!({"status": "sent"})).await;
        let records = match sent {
            ToolOutcome::Records(records) => records,
            other => panic!("expected records, got {other:?}"),
        };
        assert_eq!(records.as_array().map(Vec::len), Some(1));
        assert_eq!(records[0]["invoiceNumber"], "INV-002");
        assert_eq!(records[0]["totalAmount"], json!(125.0));
        assert_eq!(records[0]["dueDate"], "2026-02-10");
        assert!(records[0]["clientRef"].is_string());

        let all = list.execute(&fixture.context, json!({})).await;
        assert!(matches!(
            all,
            ToolOutcome::Records(ref records) if records.as_array().map(Vec::len) == Some(2)
        ));

        let unknown = list.execute(&fixture.context, json!({"status": "archived"})).await;
        assert!(unknown.render().starts_with("Error: `archived` is not a valid invoice status"));
    }
}
