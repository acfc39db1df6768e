use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use tally_core::domain::client::{Client, ClientId, NewClient};
use tally_core::domain::document::{
    DocumentId, DocumentPatch, DocumentStatus, NewSalesDocument, SalesDocument,
};
use tally_core::domain::tenant::TenantId;
use tally_core::domain::transaction::{NewTransaction, Transaction, TransactionId};

use super::{ClientRepository, DocumentRepository, RepositoryError, TransactionRepository};

#[derive(Default)]
pub struct InMemoryClientRepository {
    clients: RwLock<HashMap<TenantId, Vec<Client>>>,
}

#[async_trait::async_trait]
impl ClientRepository for InMemoryClientRepository {
    async fn list(&self, tenant: &TenantId) -> Result<Vec<Client>, RepositoryError> {
        let clients = self.clients.read().await;
        Ok(clients.get(tenant).cloned().unwrap_or_default())
    }

    async fn create(
        &self,
        tenant: &TenantId,
        client: NewClient,
    ) -> Result<Client, RepositoryError> {
        let client = client.into_client(ClientId::generate(), Utc::now());
        let mut clients = self.clients.write().await;
        clients.entry(tenant.clone()).or_default().push(client.clone());
        Ok(client)
    }
}

#[derive(Default)]
pub struct InMemoryTransactionRepository {
    transactions: RwLock<HashMap<TenantId, Vec<Transaction>>>,
}

#[async_trait::async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn list(&self, tenant: &TenantId) -> Result<Vec<Transaction>, RepositoryError> {
        let transactions = self.transactions.read().await;
        Ok(transactions.get(tenant).cloned().unwrap_or_default())
    }

    async fn create(
        &self,
        tenant: &TenantId,
        transaction: NewTransaction,
    ) -> Result<Transaction, RepositoryError> {
        let transaction = transaction.into_transaction(TransactionId::generate(), Utc::now());
        let mut transactions = self.transactions.write().await;
        transactions.entry(tenant.clone()).or_default().push(transaction.clone());
        Ok(transaction)
    }
}

pub struct InMemoryDocumentRepository<S> {
    documents: RwLock<HashMap<TenantId, Vec<SalesDocument<S>>>>,
}

impl<S> Default for InMemoryDocumentRepository<S> {
    fn default() -> Self {
        Self { documents: RwLock::new(HashMap::new()) }
    }
}

#[async_trait::async_trait]
impl<S: DocumentStatus> DocumentRepository<S> for InMemoryDocumentRepository<S> {
    async fn list(
        &self,
        tenant: &TenantId,
        status: Option<S>,
    ) -> Result<Vec<SalesDocument<S>>, RepositoryError> {
        let documents = self.documents.read().await;
        Ok(documents
            .get(tenant)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| status.map_or(true, |status| document.status == status))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, tenant: &TenantId) -> Result<u64, RepositoryError> {
        let documents = self.documents.read().await;
        Ok(documents.get(tenant).map_or(0, |documents| documents.len() as u64))
    }

    async fn create(
        &self,
        tenant: &TenantId,
        document: NewSalesDocument<S>,
    ) -> Result<SalesDocument<S>, RepositoryError> {
        let mut documents = self.documents.write().await;
        let ledger = documents.entry(tenant.clone()).or_default();
        if ledger.iter().any(|existing| existing.number == document.number) {
            return Err(RepositoryError::Conflict {
                entity: S::KIND.label(),
                key: document.number,
            });
        }

        let document = document.into_document(DocumentId::generate(), Utc::now());
        ledger.push(document.clone());
        Ok(document)
    }

    async fn find_by_number(
        &self,
        tenant: &TenantId,
        number: &str,
    ) -> Result<Option<SalesDocument<S>>, RepositoryError> {
        let documents = self.documents.read().await;
        let number = number.trim();
        Ok(documents
            .get(tenant)
            .and_then(|documents| documents.iter().find(|document| document.number == number))
            .cloned())
    }

    async fn update(
        &self,
        tenant: &TenantId,
        id: &DocumentId,
        patch: DocumentPatch<S>,
    ) -> Result<(), RepositoryError> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(tenant)
            .and_then(|documents| documents.iter_mut().find(|document| &document.id == id))
            .ok_or_else(|| RepositoryError::NotFound {
                entity: S::KIND.label(),
                key: id.0.clone(),
            })?;

        document.apply(&patch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use tally_core::domain::client::{ClientId, NewClient};
    use tally_core::domain::document::{
        DocumentId, DocumentPatch, InvoiceStatus, LineItem, NewInvoice,
    };
    use tally_core::domain::money::Currency;
    use tally_core::domain::tenant::TenantId;

    use crate::repositories::{
        ClientRepository, DocumentRepository, InMemoryClientRepository,
        InMemoryDocumentRepository, RepositoryError,
    };

    fn draft(number: &str) -> NewInvoice {
        let items =
            vec![LineItem::priced("Audit", Decimal::from(3), Decimal::from(40)).expect("item")];
        NewInvoice::draft(
            number.to_string(),
            ClientId("client-1".to_string()),
            items,
            Currency::Gbp,
            Utc::now(),
            Utc::now(),
        )
        .expect("valid draft")
    }

    #[tokio::test]
    async fn in_memory_client_repo_keeps_tenants_apart() {
        let repo = InMemoryClientRepository::default();
        let alice = TenantId("alice".to_string());
        let client = repo
            .create(
                &alice,
                NewClient {
                    name: "Acme Corp".to_string(),
                    contact_person: "Priya Shah".to_string(),
                    email: "priya@acme.test".to_string(),
                    phone: None,
                    tax_id: None,
                    opportunity_worth: None,
                },
            )
            .await
            .expect("create");

        assert_eq!(repo.list(&alice).await.expect("list"), vec![client.clone()]);
        assert_eq!(repo.find_by_name(&alice, "ACME CORP").await.expect("find"), Some(client));
        assert!(repo.list(&TenantId("bob".to_string())).await.expect("list bob").is_empty());
    }

    #[tokio::test]
    async fn in_memory_invoice_repo_round_trip_and_patch() {
        let repo = InMemoryDocumentRepository::<InvoiceStatus>::default();
        let tenant = TenantId("alice".to_string());

        let created = repo.create(&tenant, draft("INV-001")).await.expect("create");
        assert_eq!(created.total_amount, Decimal::from(120));
        assert_eq!(repo.count(&tenant).await.expect("count"), 1);

        repo.update(&tenant, &created.id, DocumentPatch::status(InvoiceStatus::Sent))
            .await
            .expect("update");
        let sent = repo.list(&tenant, Some(InvoiceStatus::Sent)).await.expect("list sent");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].number, "INV-001");
        assert_eq!(sent[0].total_amount, created.total_amount);
    }

    #[tokio::test]
    async fn in_memory_invoice_repo_rejects_duplicates_and_unknown_ids() {
        let repo = InMemoryDocumentRepository::<InvoiceStatus>::default();
        let tenant = TenantId("alice".to_string());
        repo.create(&tenant, draft("INV-001")).await.expect("create");

        let duplicate = repo.create(&tenant, draft("INV-001")).await;
        assert!(matches!(duplicate, Err(RepositoryError::Conflict { entity: "invoice", .. })));

        let missing = repo
            .update(
                &tenant,
                &DocumentId("nope".to_string()),
                DocumentPatch::status(InvoiceStatus::Paid),
            )
            .await;
        assert!(matches!(missing, Err(RepositoryError::NotFound { .. })));
    }
}
