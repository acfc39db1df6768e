use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::{Validate, ValidationErrors};

use tally_core::domain::client::{ClientStatus, NewClient};
use tally_db::repositories::ClientRepository;

use super::{parse_input, required_text, Tool, ToolContext, ToolError, ToolOutcome};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct AddClientInput {
    #[serde(default)]
    name: String,
    #[serde(default)]
    contact_person: String,
    #[validate(email)]
    email: String,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    tax_id: Option<String>,
    #[serde(default)]
    opportunity_worth: Option<Decimal>,
}

pub struct AddClientTool {
    clients: Arc<dyn ClientRepository>,
}

impl AddClientTool {
    pub fn new(clients: Arc<dyn ClientRepository>) -> Self {
        Self { clients }
    }

    async fn run(&self, context: &ToolContext, arguments: Value) -> Result<String, ToolError> {
        let input: AddClientInput = parse_input(super::ADD_CLIENT, arguments)?;
        input.validate().map_err(|errors| invalid_fields(&input, &errors))?;

        let name = required_text("name", &input.name)?;
        let contact_person = required_text("contactPerson", &input.contact_person)?;
        if input.opportunity_worth.is_some_and(|worth| worth < Decimal::ZERO) {
            return Err(ToolError::Validation("opportunityWorth must not be negative".to_string()));
        }

        let client = self
            .clients
            .create(
                &context.tenant,
                NewClient {
                    name,
                    contact_person,
                    email: input.email,
                    phone: optional_text(input.phone),
                    tax_id: optional_text(input.tax_id),
                    opportunity_worth: input.opportunity_worth,
                },
            )
            .await?;

        Ok(format!(
            "Client {} has been added as a {} (contact: {}, {}).",
            client.name,
            client.status.as_str(),
            client.contact_person,
            client.email
        ))
    }
}

fn invalid_fields(input: &AddClientInput, errors: &ValidationErrors) -> ToolError {
    if errors.field_errors().contains_key("email") {
        return ToolError::Validation(format!(
            "`{}` is not a valid email address",
            input.email.trim()
        ));
    }
    ToolError::Validation(format!("invalid client details: {errors}"))
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

#[async_trait]
impl Tool for AddClientTool {
    fn name(&self) -> &'static str {
        super::ADD_CLIENT
    }

    fn description(&self) -> &'static str {
        "Add a new client. New clients always start with the \"lead\" status."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "Company or client name"},
                "contactPerson": {"type": "string"},
                "email": {"type": "string", "format": "email"},
                "phone": {"type": "string"},
                "taxId": {"type": "string"},
                "opportunityWorth": {"type": "number", "minimum": 0}
            },
            "required": ["name", "contactPerson", "email"]
        })
    }

    fn mutates(&self) -> bool {
        true
    }

    async fn execute(&self, context: &ToolContext, arguments: Value) -> ToolOutcome {
        self.run(context, arguments).await.into()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientRecord {
    name: String,
    status: ClientStatus,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    opportunity_worth: Option<Decimal>,
}

pub struct ListClientsTool {
    clients: Arc<dyn ClientRepository>,
}

impl ListClientsTool {
    pub fn new(clients: Arc<dyn ClientRepository>) -> Self {
        Self { clients }
    }

    async fn run(&self, context: &ToolContext) -> Result<Value, ToolError> {
        let records: Vec<ClientRecord> = self
            .clients
            .list(&context.tenant)
            .await?
            .into_iter()
            .map(|client| ClientRecord {
                name: client.name,
                status: client.status,
                opportunity_worth: client.opportunity_worth,
            })
            .collect();

        serde_json::to_value(records)
            .map_err(|error| ToolError::Persistence(format!("could not project clients: {error}")))
    }
}

#[async_trait]
impl Tool for ListClientsTool {
    fn name(&self) -> &'static str {
        super::LIST_CLIENTS
    }

    fn description(&self) -> &'static str {
        "List all clients with their status and opportunity worth."
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
