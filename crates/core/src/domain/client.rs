use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    #[default]
    Lead,
    Opportunity,
    Customer,
}

impl ClientStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::Opportunity => "opportunity",
            Self::Customer => "customer",
        }
    }
}

impl FromStr for ClientStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lead" => Ok(Self::Lead),
            "opportunity" => Ok(Self::Opportunity),
            "customer" => Ok(Self::Customer),
            _ => Err(DomainError::UnknownStatus { kind: "client", value: value.to_string() }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub contact_person: String,
    pub email: String,
    pub phone: Option<String>,
    pub tax_id: Option<String>,
    pub status: ClientStatus,
    pub opportunity_worth: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn matches_name(&self, name: &str) -> bool {
        normalize_name(&self.name) == normalize_name(name)
    }
}

/// Client fields supplied at creation. The registry assigns the id and the initial status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub contact_person: String,
    pub email: String,
    pub phone: Option<String>,
    pub tax_id: Option<String>,
    pub opportunity_worth: Option<Decimal>,
}

impl NewClient {
    pub fn into_client(self, id: ClientId, created_at: DateTime<Utc>) -> Client {
        Client {
            id,
            name: self.name.trim().to_string(),
            contact_person: self.contact_person.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone,
            tax_id: self.tax_id,
            status: ClientStatus::Lead,
            opportunity_worth: self.opportunity_worth,
            created_at,
        }
    }
}

/// Lowercases, trims, and collapses inner whitespace so "  Acme   Corp" finds "acme corp".
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Picks the client for a free-text name: an exact match wins over a normalized one.
pub fn resolve_by_name<'a>(clients: &'a [Client], name: &str) -> Option<&'a Client> {
    let trimmed = name.trim();
    clients
        .iter()
        .find(|client| client.name == trimmed)
        .or_else(|| clients.iter().find(|client| client.matches_name(trimmed)))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{normalize_name, resolve_by_name, ClientId, ClientStatus, NewClient};

    fn new_client(name: &str) -> NewClient {
        NewClient {
            name: name.to_string(),
            contact_person: "Dana Reyes".to_string(),
            email: "dana@example.com".to_string(),
            phone: None,
            tax_id: None,
            opportunity_worth: None,
        }
    }

    #[test]
    fn created_clients_always_start_as_leads() {
        let client = new_client(" Acme Corp ").into_client(ClientId::generate(), Utc::now());
        assert_eq!(client.status, ClientStatus::Lead);
        assert_eq!(client.name, "Acme Corp");
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_name("  Acme   CORP "), "acme corp");
    }

    #[test]
    fn exact_name_match_wins_over_normalized_match() {
        let clients = vec![
            new_client("acme corp").into_client(ClientId("c-1".to_string()), Utc::now()),
            new_client("Acme Corp").into_client(ClientId("c-2".to_string()), Utc::now()),
        ];

        let exact = resolve_by_name(&clients, "Acme Corp").expect("exact match");
        assert_eq!(exact.id, ClientId("c-2".to_string()));

        let loose = resolve_by_name(&clients, "ACME  corp").expect("normalized match");
        assert_eq!(loose.id, ClientId("c-1".to_string()));

        assert!(resolve_by_name(&clients, "Globex").is_none());
    }
}
