use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::Currency;
use crate::errors::DomainError;

pub const DEFAULT_EXPENSE_CATEGORY: &str = "other";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

impl TransactionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Income carries a source; an expense carries a category and optional vendor. Never both.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransactionKind {
    Income {
        source: String,
    },
    Expense {
        category: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vendor: Option<String>,
    },
}

impl TransactionKind {
    pub fn income(source: Option<String>) -> Result<Self, DomainError> {
        match non_blank(source) {
            Some(source) => Ok(Self::Income { source }),
            None => Err(DomainError::InvariantViolation(
                "source is required for income transactions".to_string(),
            )),
        }
    }

    pub fn expense(category: Option<String>, vendor: Option<String>) -> Self {
        Self::Expense {
            category: non_blank(category)
                .unwrap_or_else(|| DEFAULT_EXPENSE_CATEGORY.to_string()),
            vendor: non_blank(vendor),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Income { .. } => "income",
            Self::Expense { .. } => "expense",
        }
    }

    pub fn is_expense(&self) -> bool {
        matches!(self, Self::Expense { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    #[serde(flatten)]
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub currency: Currency,
    pub date: DateTime<Utc>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub currency: Currency,
    pub date: DateTime<Utc>,
    pub description: String,
}

impl NewTransaction {
    pub fn new(
        kind: TransactionKind,
        amount: Decimal,
        currency: Currency,
        date: DateTime<Utc>,
        description: impl Into<String>,
    ) -> Result<Self, DomainError> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::InvariantViolation(
                "transaction amount must be greater than zero".to_string(),
            ));
        }

        let description = description.into().trim().to_string();
        if description.is_empty() {
            return Err(DomainError::InvariantViolation(
                "transaction description must not be empty".to_string(),
            ));
        }

        Ok(Self { kind, amount, currency, date, description })
    }

    pub fn into_transaction(self, id: TransactionId, created_at: DateTime<Utc>) -> Transaction {
        Transaction {
            id,
            kind: self.kind,
            amount: self.amount,
            currency: self.currency,
            date: self.date,
            description: self.description,
            created_at,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}
