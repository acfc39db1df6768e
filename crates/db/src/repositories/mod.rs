use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use tally_core::domain::client::{resolve_by_name, Client, NewClient};
use tally_core::domain::document::{
    DocumentId, DocumentPatch, DocumentStatus, InvoiceStatus, NewSalesDocument, QuotationStatus,
    SalesDocument,
};
use tally_core::domain::tenant::TenantId;
use tally_core::domain::transaction::{NewTransaction, Transaction};

mod columns;

pub mod client;
pub mod document;
pub mod memory;
pub mod transaction;

pub use client::SqlClientRepository;
pub use document::SqlDocumentRepository;
pub use memory::{
    InMemoryClientRepository, InMemoryDocumentRepository, InMemoryTransactionRepository,
};
pub use transaction::SqlTransactionRepository;

use crate::DbPool;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity} `{key}` was not found")]
    NotFound { entity: &'static str, key: String },
    #[error("{entity} `{key}` already exists")]
    Conflict { entity: &'static str, key: String },
}

/// Client registry. Creation assigns the id and forces the `lead` status.
#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// Clients in creation order.
    async fn list(&self, tenant: &TenantId) -> Result<Vec<Client>, RepositoryError>;

    async fn create(&self, tenant: &TenantId, client: NewClient)
        -> Result<Client, RepositoryError>;

    async fn find_by_name(
        &self,
        tenant: &TenantId,
        name: &str,
    ) -> Result<Option<Client>, RepositoryError> {
        let clients = self.list(tenant).await?;
        Ok(resolve_by_name(&clients, name).cloned())
    }
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn list(&self, tenant: &TenantId) -> Result<Vec<Transaction>, RepositoryError>;

    async fn create(
        &self,
        tenant: &TenantId,
        transaction: NewTransaction,
    ) -> Result<Transaction, RepositoryError>;
}

/// Invoice and quotation ledgers share this contract; `S` fixes the status vocabulary.
#[async_trait]
pub trait DocumentRepository<S: DocumentStatus>: Send + Sync {
    async fn list(
        &self,
        tenant: &TenantId,
        status: Option<S>,
    ) -> Result<Vec<SalesDocument<S>>, RepositoryError>;

    async fn count(&self, tenant: &TenantId) -> Result<u64, RepositoryError>;

    async fn create(
        &self,
        tenant: &TenantId,
        document: NewSalesDocument<S>,
    ) -> Result<SalesDocument<S>, RepositoryError>;

    async fn find_by_number(
        &self,
        tenant: &TenantId,
        number: &str,
    ) -> Result<Option<SalesDocument<S>>, RepositoryError>;

    /// Applies only the patch's fields. Fails with `NotFound` when the id is not in the tenant.
    async fn update(
        &self,
        tenant: &TenantId,
        id: &DocumentId,
        patch: DocumentPatch<S>,
    ) -> Result<(), RepositoryError>;
}

/// The four domain services the finance agent reads and writes.
#[derive(Clone)]
pub struct FinanceStore {
    pub clients: Arc<dyn ClientRepository>,
    pub transactions: Arc<dyn TransactionRepository>,
    pub invoices: Arc<dyn DocumentRepository<InvoiceStatus>>,
    pub quotations: Arc<dyn DocumentRepository<QuotationStatus>>,
}

impl FinanceStore {
    pub fn in_memory() -> Self {
        Self {
            clients: Arc::new(InMemoryClientRepository::default()),
            transactions: Arc::new(InMemoryTransactionRepository::default()),
            invoices: Arc::new(InMemoryDocumentRepository::<InvoiceStatus>::default()),
            quotations: Arc::new(InMemoryDocumentRepository::<QuotationStatus>::default()),
        }
    }

    pub fn sqlite(pool: DbPool) -> Self {
        Self {
            clients: Arc::new(SqlClientRepository::new(pool.clone())),
            transactions: Arc::new(SqlTransactionRepository::new(pool.clone())),
            invoices: Arc::new(SqlDocumentRepository::<InvoiceStatus>::new(pool.clone())),
            quotations: Arc::new(SqlDocumentRepository::<QuotationStatus>::new(pool)),
        }
    }
}
