pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{
    connect, connect_with_settings, open_store, DbPool, OpenStoreError, OpenedStore,
    IN_PROCESS_URL,
};
pub use fixtures::{DemoDataset, SeedResult};
pub use repositories::{FinanceStore, RepositoryError};
