use std::sync::Arc;

use tally_agent::{FinanceAgent, LlmError};
use tally_core::config::{AppConfig, ConfigError, LoadOptions};
use tally_db::{open_store, DbPool, FinanceStore, OpenStoreError};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub store: FinanceStore,
    /// `None` when the ledgers live in process.
    pub db_pool: Option<DbPool>,
    pub agent: Arc<FinanceAgent>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] OpenStoreError),
    #[error("model provider setup failed: {0}")]
    Llm(#[from] LlmError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        provider = config.llm.provider.as_str(),
        "starting application bootstrap"
    );

    let opened = open_store(&config.database).await?;
    info!(
        event_name = "system.bootstrap.store_ready",
        correlation_id = "bootstrap",
        backend = if opened.pool.is_some() { "sqlite" } else { "in_process" },
        "ledgers opened and migrated"
    );

    let agent = FinanceAgent::from_config(&config, &opened.store)?;
    info!(
        event_name = "system.bootstrap.agent_ready",
        correlation_id = "bootstrap",
        provider = agent.runtime().provider(),
        tools = agent.runtime().tools().len(),
        "finance agent initialized"
    );

    Ok(Application {
        config,
        store: opened.store,
        db_pool: opened.pool,
        agent: Arc::new(agent),
    })
}
