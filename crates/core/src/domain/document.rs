//! Invoices and quotations share one shape: a numbered, client-owned list of priced line
//! items. Only the number prefix and the status vocabulary differ, so both are expressed as
//! [`SalesDocument`] parameterised by a [`DocumentStatus`].

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::client::ClientId;
use crate::domain::money::Currency;
use crate::errors::DomainError;
use crate::pricing;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Invoice,
    Quotation,
}

impl DocumentKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::Quotation => "quotation",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Invoice => "Invoice",
            Self::Quotation => "Quotation",
        }
    }

    pub fn number_prefix(self) -> &'static str {
        match self {
            Self::Invoice => "INV",
            Self::Quotation => "QUO",
        }
    }

    /// Formats a sequence as `INV-001`; sequences past 999 keep growing (`INV-1000`).
    pub fn format_number(self, sequence: u64) -> String {
        format!("{}-{sequence:03}", self.number_prefix())
    }

    /// Mints the number that follows `existing_count` documents of this kind.
    pub fn next_number(self, existing_count: u64) -> String {
        self.format_number(existing_count.saturating_add(1))
    }
}

pub trait DocumentStatus:
    Copy + fmt::Debug + PartialEq + Eq + Send + Sync + Serialize + DeserializeOwned + 'static
{
    const KIND: DocumentKind;
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    fn initial() -> Self;

    fn parse(value: &str) -> Result<Self, DomainError> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL.iter().copied().find(|status| status.as_str() == normalized).ok_or_else(|| {
            DomainError::UnknownStatus { kind: Self::KIND.label(), value: value.to_string() }
        })
    }

    fn allowed_values() -> Vec<&'static str> {
        Self::ALL.iter().map(|status| status.as_str()).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
}

impl DocumentStatus for InvoiceStatus {
    const KIND: DocumentKind = DocumentKind::Invoice;
    const ALL: &'static [Self] = &[Self::Draft, Self::Sent, Self::Paid, Self::Overdue];

    fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        }
    }

    fn initial() -> Self {
        Self::Draft
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Won,
    Lost,
}

impl DocumentStatus for QuotationStatus {
    const KIND: DocumentKind = DocumentKind::Quotation;
    const ALL: &'static [Self] = &[Self::Draft, Self::Sent, Self::Won, Self::Lost];

    fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Won => "won",
            Self::Lost => "lost",
        }
    }

    fn initial() -> Self {
        Self::Draft
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A priced line. `total` is always derived from quantity and unit price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total: Decimal,
}

impl LineItem {
    pub fn priced(
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> Result<Self, DomainError> {
        let description = description.into().trim().to_string();
        if description.is_empty() {
            return Err(DomainError::InvariantViolation(
                "line item description must not be empty".to_string(),
            ));
        }
        if quantity <= Decimal::ZERO {
            return Err(DomainError::InvariantViolation(format!(
                "line item `{description}` must have a positive quantity"
            )));
        }
        if unit_price < Decimal::ZERO {
            return Err(DomainError::InvariantViolation(format!(
                "line item `{description}` must not have a negative unit price"
            )));
        }

        let total = pricing::item_total(quantity, unit_price)?;
        Ok(Self { description, quantity, unit_price, total })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesDocument<S> {
    pub id: DocumentId,
    pub number: String,
    pub client_id: ClientId,
    pub items: Vec<LineItem>,
    pub total_amount: Decimal,
    pub currency: Currency,
    pub date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub status: S,
    pub created_at: DateTime<Utc>,
}

pub type Invoice = SalesDocument<InvoiceStatus>;
pub type Quotation = SalesDocument<QuotationStatus>;

impl<S: DocumentStatus> SalesDocument<S> {
    pub fn kind(&self) -> DocumentKind {
        S::KIND
    }

    /// Applies the provided fields only. Identifiers, numbers, items and totals never change.
    pub fn apply(&mut self, patch: &DocumentPatch<S>) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
    }
}

/// Document fields supplied at creation; the ledger assigns the id and creation instant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSalesDocument<S> {
    pub number: String,
    pub client_id: ClientId,
    pub items: Vec<LineItem>,
    pub total_amount: Decimal,
    pub currency: Currency,
    pub date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub status: S,
}

pub type NewInvoice = NewSalesDocument<InvoiceStatus>;
pub type NewQuotation = NewSalesDocument<QuotationStatus>;

impl<S: DocumentStatus> NewSalesDocument<S> {
    /// Builds a draft, recomputing the total from the items rather than trusting a caller value.
    pub fn draft(
        number: String,
        client_id: ClientId,
        items: Vec<LineItem>,
        currency: Currency,
        date: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if items.is_empty() {
            return Err(DomainError::InvariantViolation(format!(
                "{} requires at least one line item",
                S::KIND.label()
            )));
        }

        let total_amount = pricing::subtotal(&items)?;
        Ok(Self {
            number,
            client_id,
            items,
            total_amount,
            currency,
            date,
            due_date,
            status: S::initial(),
        })
    }

    pub fn into_document(self, id: DocumentId, created_at: DateTime<Utc>) -> SalesDocument<S> {
        SalesDocument {
            id,
            number: self.number,
            client_id: self.client_id,
            items: self.items,
            total_amount: self.total_amount,
            currency: self.currency,
            date: self.date,
            due_date: self.due_date,
            status: self.status,
            created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPatch<S> {
    pub status: Option<S>,
    pub due_date: Option<DateTime<Utc>>,
}

impl<S> DocumentPatch<S> {
    pub fn status(status: S) -> Self {
        Self { status: Some(status), due_date: None }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{
        DocumentId, DocumentKind, DocumentPatch, DocumentStatus, InvoiceStatus, LineItem,
        NewInvoice, NewQuotation, QuotationStatus,
    };
    use crate::domain::client::ClientId;
    use crate::domain::money::Currency;
    use crate::errors::DomainError;

    #[test]
    fn document_numbers_are_zero_padded_and_sequential() {
        assert_eq!(DocumentKind::Invoice.next_number(0), "INV-001");
        assert_eq!(DocumentKind::Invoice.next_number(3), "INV-004");
        assert_eq!(DocumentKind::Quotation.next_number(41), "QUO-042");
        assert_eq!(DocumentKind::Invoice.next_number(999), "INV-1000");
    }

    #[test]
    fn status_vocabulary_is_per_document_kind() {
        assert_eq!(InvoiceStatus::parse("PAID"), Ok(InvoiceStatus::Paid));
        assert_eq!(QuotationStatus::parse("won"), Ok(QuotationStatus::Won));
        assert_eq!(
            InvoiceStatus::parse("won"),
            Err(DomainError::UnknownStatus { kind: "invoice", value: "won".to_string() })
        );
        assert_eq!(QuotationStatus::allowed_values(), vec!["draft", "sent", "won", "lost"]);
    }

    #[test]
    fn line_items_carry_their_derived_total() {
        let item = LineItem::priced("Design work", Decimal::new(25, 1), Decimal::from(40))
            .expect("valid item");
        assert_eq!(item.total, Decimal::from(100));
    }

    #[test]
    fn line_items_reject_non_positive_quantity_and_negative_price() {
        assert!(LineItem::priced("x", Decimal::ZERO, Decimal::ONE).is_err());
        assert!(LineItem::priced("x", Decimal::ONE, Decimal::NEGATIVE_ONE).is_err());
        assert!(LineItem::priced("  ", Decimal::ONE, Decimal::ONE).is_err());
        assert!(LineItem::priced("free sample", Decimal::ONE, Decimal::ZERO).is_ok());
    }

    #[test]
    fn drafts_recompute_total_from_items() {
        let items = vec![
            LineItem::priced("Consulting", Decimal::from(2), Decimal::from(50)).expect("item"),
            LineItem::priced("Hosting", Decimal::ONE, Decimal::from(25)).expect("item"),
        ];
        let draft = NewInvoice::draft(
            "INV-001".to_string(),
            ClientId("c-1".to_string()),
            items,
            Currency::Usd,
            Utc::now(),
            Utc::now(),
        )
        .expect("draft");

        assert_eq!(draft.total_amount, Decimal::from(125));
        assert_eq!(draft.status, InvoiceStatus::Draft);
    }

    #[test]
    fn amounts_beyond_decimal_range_are_invariant_violations() {
        let error = LineItem::priced("Audit", Decimal::MAX, Decimal::from(2))
            .expect_err("overflowing line should fail");
        assert_eq!(
            error,
            DomainError::InvariantViolation("line item amount is too large".to_string())
        );

        let items = vec![
            LineItem::priced("Audit", Decimal::ONE, Decimal::MAX).expect("item"),
            LineItem::priced("Travel", Decimal::ONE, Decimal::ONE).expect("item"),
        ];
        let error = NewInvoice::draft(
            "INV-001".to_string(),
            ClientId("c-1".to_string()),
            items,
            Currency::Usd,
            Utc::now(),
            Utc::now(),
        )
        .expect_err("overflowing total should fail");
        assert_eq!(
            error,
            DomainError::InvariantViolation("subtotal amount is too large".to_string())
        );
    }

    #[test]
    fn drafts_require_at_least_one_item() {
        let error = NewQuotation::draft(
            "QUO-001".to_string(),
            ClientId("c-1".to_string()),
            Vec::new(),
            Currency::Eur,
            Utc::now(),
            Utc::now(),
        )
        .expect_err("empty items should fail");

        assert_eq!(
            error,
            DomainError::InvariantViolation("quotation requires at least one line item".to_string())
        );
    }

    #[test]
    fn status_patch_leaves_number_items_and_total_untouched() {
        let items =
            vec![LineItem::priced("Audit", Decimal::ONE, Decimal::from(900)).expect("item")];
        let mut invoice = NewInvoice::draft(
            "INV-007".to_string(),
            ClientId("c-1".to_string()),
            items.clone(),
            Currency::Gbp,
            Utc::now(),
            Utc::now(),
        )
        .expect("draft")
        .into_document(DocumentId("doc-1".to_string()), Utc::now());

        invoice.apply(&DocumentPatch::status(InvoiceStatus::Paid));

        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.number, "INV-007");
        assert_eq!(invoice.items, items);
        assert_eq!(invoice.total_amount, Decimal::from(900));
    }
}
