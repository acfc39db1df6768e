use std::time::Duration;

use sqlx::migrate::MigrateError;
use sqlx::sqlite::SqlitePoolOptions;
use thiserror::Error;

use tally_core::config::DatabaseConfig;

use crate::migrations;
use crate::repositories::FinanceStore;

/// `database.url` value that selects the in-process ledgers.
pub const IN_PROCESS_URL: &str = ":memory:";

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

/// Ledgers opened from `database.url`, plus the pool when they live in SQLite.
pub struct OpenedStore {
    pub store: FinanceStore,
    pub pool: Option<DbPool>,
}

impl OpenedStore {
    pub async fn close(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
        }
    }
}

#[derive(Debug, Error)]
pub enum OpenStoreError {
    #[error("database connection failed: {0}")]
    Connect(#[from] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migrate(#[from] MigrateError),
}

impl OpenStoreError {
    pub fn class(&self) -> &'static str {
        match self {
            Self::Connect(_) => "db_connectivity",
            Self::Migrate(_) => "migration",
        }
    }
}

/// `:memory:` keeps the ledgers in process; any other URL is connected and migrated.
pub async fn open_store(config: &DatabaseConfig) -> Result<OpenedStore, OpenStoreError> {
    if config.url.trim() == IN_PROCESS_URL {
        return Ok(OpenedStore { store: FinanceStore::in_memory(), pool: None });
    }

    let pool =
        connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await?;
    migrations::run_pending(&pool).await?;
    Ok(OpenedStore { store: FinanceStore::sqlite(pool.clone()), pool: Some(pool) })
}
