use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use tally_core::domain::client::{Client, ClientId, NewClient};
use tally_core::domain::tenant::TenantId;

use super::columns::{
    format_timestamp, parse_enum, parse_optional_decimal, parse_timestamp, stored_precision,
};
use super::{ClientRepository, RepositoryError};
use crate::DbPool;

pub struct SqlClientRepository {
    pool: DbPool,
}

impl SqlClientRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ClientRepository for SqlClientRepository {
    async fn list(&self, tenant: &TenantId) -> Result<Vec<Client>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, contact_person, email, phone, tax_id, status,
                   opportunity_worth, created_at
            FROM client
            WHERE tenant_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(tenant.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(client_from_row).collect()
    }

    async fn create(
        &self,
        tenant: &TenantId,
        client: NewClient,
    ) -> Result<Client, RepositoryError> {
        let client = client.into_client(ClientId::generate(), stored_precision(Utc::now()));

        sqlx::query(
            r#"
            INSERT INTO client (
                id, tenant_id, name, contact_person, email, phone, tax_id, status,
                opportunity_worth, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&client.id.0)
        .bind(tenant.as_str())
        .bind(&client.name)
        .bind(&client.contact_person)
        .bind(&client.email)
        .bind(client.phone.as_deref())
        .bind(client.tax_id.as_deref())
        .bind(client.status.as_str())
        .bind(client.opportunity_worth.map(|worth| worth.to_string()))
        .bind(format_timestamp(client.created_at))
        .execute(&self.pool)
        .await?;

        Ok(client)
    }
}

fn client_from_row(row: &SqliteRow) -> Result<Client, RepositoryError> {
    Ok(Client {
        id: ClientId(row.try_get("id")?),
        name: row.try_get("name")?,
        contact_person: row.try_get("contact_person")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        tax_id: row.try_get("tax_id")?,
        status: parse_enum("status", row.try_get("status")?)?,
        opportunity_worth: parse_optional_decimal(
            "opportunity_worth",
            row.try_get("opportunity_worth")?,
        )?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
