use tally_core::config::LoadOptions;
use tally_db::{connect_with_settings, migrations, IN_PROCESS_URL};

use crate::commands::{prepare, CommandResult, StepFailure};

pub fn run(options: LoadOptions) -> CommandResult {
    let (config, runtime) = match prepare("migrate", options) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    if config.database.url.trim() == IN_PROCESS_URL {
        return CommandResult::success("migrate", "in-process ledgers need no migrations");
    }

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<(), StepFailure>(())
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
