use tally_core::config::LoadOptions;
use tally_core::domain::tenant::TenantId;
use tally_db::{open_store, DemoDataset, RepositoryError, SeedResult};

use crate::commands::{prepare, CommandResult, StepFailure};

pub fn run(options: LoadOptions, user: &str) -> CommandResult {
    let Some(tenant) = TenantId::from_user_id(user) else {
        return CommandResult::failure("seed", "invalid_argument", "--user must not be blank", 2);
    };
    let (config, runtime) = match prepare("seed", options) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result: Result<SeedResult, StepFailure> = runtime.block_on(async {
        let opened = open_store(&config.database)
            .await
            .map_err(|error| (error.class(), error.to_string(), 4u8))?;
        let loaded = DemoDataset::load(&opened.store, &tenant).await;
        opened.close().await;
        loaded.map_err(|error| match error {
            RepositoryError::Conflict { .. } => ("seed_conflict", error.to_string(), 6u8),
            other => ("seed_execution", other.to_string(), 5u8),
        })
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", describe(&seeded)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn describe(seeded: &SeedResult) -> String {
    format!(
        "loaded demo ledgers for {}: {} clients, {} invoices, {} quotations, {} transactions",
        seeded.tenant_id,
        seeded.clients,
        seeded.invoices,
        seeded.quotations,
        seeded.transactions
    )
}
