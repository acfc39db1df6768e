use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use tally_core::domain::tenant::TenantId;
use tally_core::domain::transaction::{
    NewTransaction, Transaction, TransactionId, TransactionKind,
};

use super::columns::{
    format_timestamp, parse_decimal, parse_enum, parse_timestamp, stored_precision,
};
use super::{RepositoryError, TransactionRepository};
use crate::DbPool;

pub struct SqlTransactionRepository {
    pool: DbPool,
}

impl SqlTransactionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TransactionRepository for SqlTransactionRepository {
    async fn list(&self, tenant: &TenantId) -> Result<Vec<Transaction>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, source, category, vendor, amount, currency, occurred_on,
                   description, created_at
            FROM finance_transaction
            WHERE tenant_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(tenant.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(transaction_from_row).collect()
    }

    async fn create(
        &self,
        tenant: &TenantId,
        transaction: NewTransaction,
    ) -> Result<Transaction, RepositoryError> {
        let mut transaction =
            transaction.into_transaction(TransactionId::generate(), stored_precision(Utc::now()));
        transaction.date = stored_precision(transaction.date);
        let (source, category, vendor) = match &transaction.kind {
            TransactionKind::Income { source } => (Some(source.as_str()), None, None),
            TransactionKind::Expense { category, vendor } => {
                (None, Some(category.as_str()), vendor.as_deref())
            }
        };

        sqlx::query(
            r#"
            INSERT INTO finance_transaction (
                id, tenant_id, kind, source, category, vendor, amount, currency,
                occurred_on, description, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&transaction.id.0)
        .bind(tenant.as_str())
        .bind(transaction.kind.label())
        .bind(source)
        .bind(category)
        .bind(vendor)
        .bind(transaction.amount.to_string())
        .bind(transaction.currency.code())
        .bind(format_timestamp(transaction.date))
        .bind(&transaction.description)
        .bind(format_timestamp(transaction.created_at))
        .execute(&self.pool)
        .await?;

        Ok(transaction)
    }
}

fn transaction_from_row(row: &SqliteRow) -> Result<Transaction, RepositoryError> {
    let kind_raw = row.try_get::<String, _>("kind")?;
    let kind = match kind_raw.as_str() {
        "income" => TransactionKind::Income {
            source: row.try_get::<Option<String>, _>("source")?.ok_or_else(|| {
                RepositoryError::Decode("income transaction is missing `source`".to_string())
            })?,
        },
        "expense" => TransactionKind::Expense {
            category: row.try_get::<Option<String>, _>("category")?.ok_or_else(|| {
                RepositoryError::Decode("expense transaction is missing `category`".to_string())
            })?,
            vendor: row.try_get("vendor")?,
        },
        other => {
            return Err(RepositoryError::Decode(format!("unknown transaction kind `{other}`")))
        }
    };

    Ok(Transaction {
        id: TransactionId(row.try_get("id")?),
        kind,
        amount: parse_decimal("amount", row.try_get("amount")?)?,
        currency: parse_enum("currency", row.try_get("currency")?)?,
        date: parse_timestamp("occurred_on", row.try_get("occurred_on")?)?,
        description: row.try_get("description")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use tally_core::domain::money::Currency;
    use tally_core::domain::tenant::TenantId;
    use tally_core::domain::transaction::{NewTransaction, TransactionKind};

    use super::SqlTransactionRepository;
    use crate::repositories::TransactionRepository;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn sql_transaction_repo_preserves_the_tagged_kind() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlTransactionRepository::new(pool);
        let tenant = TenantId("alice".to_string());
        let date = Utc.with_ymd_and_hms(2026, 2, 14, 0, 0, 0).single().expect("date");

        let expense = NewTransaction::new(
            TransactionKind::expense(None, Some("Staples".to_string())),
            Decimal::new(4250, 2),
            Currency::Usd,
            date,
            "Printer paper",
        )
        .expect("valid expense");
        let income = NewTransaction::new(
            TransactionKind::income(Some("Consulting".to_string())).expect("income kind"),
            Decimal::from(900),
            Currency::Eur,
            date,
            "Workshop",
        )
        .expect("valid income");

        let saved_expense = repo.create(&tenant, expense).await.expect("create expense");
        let saved_income = repo.create(&tenant, income).await.expect("create income");

        let listed = repo.list(&tenant).await.expect("list");
        assert_eq!(listed, vec![saved_expense, saved_income]);
        assert_eq!(
            listed[0].kind,
            TransactionKind::Expense {
                category: "other".to_string(),
                vendor: Some("Staples".to_string())
            }
        );
        assert!(repo.list(&TenantId("bob".to_string())).await.expect("list bob").is_empty());
    }
}
