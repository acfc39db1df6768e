use std::marker::PhantomData;

use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use tally_core::domain::client::ClientId;
use tally_core::domain::document::{
    DocumentId, DocumentKind, DocumentPatch, DocumentStatus, LineItem, NewSalesDocument,
    SalesDocument,
};
use tally_core::domain::tenant::TenantId;

use super::columns::{
    format_timestamp, parse_count, parse_decimal, parse_enum, parse_timestamp, stored_precision,
};
use super::{DocumentRepository, RepositoryError};
use crate::DbPool;

/// One ledger table per document kind; `S::KIND` picks the table.
pub struct SqlDocumentRepository<S> {
    pool: DbPool,
    _status: PhantomData<fn() -> S>,
}

impl<S: DocumentStatus> SqlDocumentRepository<S> {
    pub fn new(pool: DbPool) -> Self {
        Self { pool, _status: PhantomData }
    }

    fn table() -> &'static str {
        match S::KIND {
            DocumentKind::Invoice => "invoice",
            DocumentKind::Quotation => "quotation",
        }
    }
}

const DOCUMENT_COLUMNS: &str = "id, number, client_id, items_json, total_amount, currency, \
                                issued_on, due_on, status, created_at";

#[async_trait::async_trait]
impl<S: DocumentStatus> DocumentRepository<S> for SqlDocumentRepository<S> {
    async fn list(
        &self,
        tenant: &TenantId,
        status: Option<S>,
    ) -> Result<Vec<SalesDocument<S>>, RepositoryError> {
        let table = Self::table();
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM {table} \
                     WHERE tenant_id = ? AND status = ? \
                     ORDER BY created_at ASC, rowid ASC"
                ))
                .bind(tenant.as_str())
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM {table} \
                     WHERE tenant_id = ? \
                     ORDER BY created_at ASC, rowid ASC"
                ))
                .bind(tenant.as_str())
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(document_from_row::<S>).collect()
    }

    async fn count(&self, tenant: &TenantId) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM {} WHERE tenant_id = ?",
            Self::table()
        ))
        .bind(tenant.as_str())
        .fetch_one(&self.pool)
        .await?;

        parse_count("count", count)
    }

    async fn create(
        &self,
        tenant: &TenantId,
        document: NewSalesDocument<S>,
    ) -> Result<SalesDocument<S>, RepositoryError> {
        let mut document =
            document.into_document(DocumentId::generate(), stored_precision(Utc::now()));
        document.date = stored_precision(document.date);
        document.due_date = stored_precision(document.due_date);

        let items_json = serde_json::to_string(&document.items).map_err(|error| {
            RepositoryError::Decode(format!("could not encode line items: {error}"))
        })?;

        sqlx::query(&format!(
            "INSERT INTO {} (
                id, tenant_id, number, client_id, items_json, total_amount, currency,
                issued_on, due_on, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            Self::table()
        ))
        .bind(&document.id.0)
        .bind(tenant.as_str())
        .bind(&document.number)
        .bind(&document.client_id.0)
        .bind(items_json)
        .bind(document.total_amount.to_string())
        .bind(document.currency.code())
        .bind(format_timestamp(document.date))
        .bind(format_timestamp(document.due_date))
        .bind(document.status.as_str())
        .bind(format_timestamp(document.created_at))
        .execute(&self.pool)
        .await?;

        Ok(document)
    }

    async fn find_by_number(
        &self,
        tenant: &TenantId,
        number: &str,
    ) -> Result<Option<SalesDocument<S>>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM {} WHERE tenant_id = ? AND number = ?",
            Self::table()
        ))
        .bind(tenant.as_str())
        .bind(number.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| document_from_row::<S>(&r)).transpose()
    }

    async fn update(
        &self,
        tenant: &TenantId,
        id: &DocumentId,
        patch: DocumentPatch<S>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(&format!(
            "UPDATE {}
             SET status = COALESCE(?, status), due_on = COALESCE(?, due_on)
             WHERE tenant_id = ? AND id = ?",
            Self::table()
        ))
        .bind(patch.status.map(|status| status.as_str()))
        .bind(patch.due_date.map(|due| format_timestamp(stored_precision(due))))
        .bind(tenant.as_str())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound { entity: S::KIND.label(), key: id.0.clone() });
        }

        Ok(())
    }
}

fn document_from_row<S: DocumentStatus>(
    row: &SqliteRow,
) -> Result<SalesDocument<S>, RepositoryError> {
    let items_json = row.try_get::<String, _>("items_json")?;
    let items = serde_json::from_str::<Vec<LineItem>>(&items_json).map_err(|error| {
        RepositoryError::Decode(format!("invalid line items in `items_json`: {error}"))
    })?;
    let status_raw = row.try_get::<String, _>("status")?;
    let status = S::parse(&status_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid value in `status`: {error}")))?;

    Ok(SalesDocument {
        id: DocumentId(row.try_get("id")?),
        number: row.try_get("number")?,
        client_id: ClientId(row.try_get("client_id")?),
        items,
        total_amount: parse_decimal("total_amount", row.try_get("total_amount")?)?,
        currency: parse_enum("currency", row.try_get("currency")?)?,
        date: parse_timestamp("issued_on", row.try_get("issued_on")?)?,
        due_date: parse_timestamp("due_on", row.try_get("due_on")?)?,
        status,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
