pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;
pub mod reporting;

pub use domain::client::{Client, ClientId, ClientStatus, NewClient};
pub use domain::document::{
    DocumentId, DocumentKind, DocumentPatch, DocumentStatus, Invoice, InvoiceStatus, LineItem,
    NewInvoice, NewQuotation, NewSalesDocument, Quotation, QuotationStatus, SalesDocument,
};
pub use domain::money::Currency;
pub use domain::tenant::TenantId;
pub use domain::transaction::{NewTransaction, Transaction, TransactionId, TransactionKind};
pub use errors::DomainError;
pub use pricing::{Adjustments, DeterministicPricingEngine, PricingBreakdown, PricingEngine};
pub use reporting::FinancialSummary;
