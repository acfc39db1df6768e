use tally_agent::FinanceAgent;
use tally_core::config::LoadOptions;
use tally_db::open_store;

use crate::commands::{prepare, CommandResult, StepFailure};

pub fn run(options: LoadOptions, user: &str, question: &str) -> CommandResult {
    let (config, runtime) = match prepare("ask", options) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let opened = open_store(&config.database)
            .await
            .map_err(|error| (error.class(), error.to_string(), 4u8))?;
        let agent = match FinanceAgent::from_config(&config, &opened.store) {
            Ok(agent) => agent,
            Err(error) => {
                opened.close().await;
                return Err(("llm_setup", error.to_string(), 2u8));
            }
        };
        let answered = agent.converse(question, user).await;
        opened.close().await;
        Ok::<_, StepFailure>(answered)
    });

    match result {
        Ok(Ok(reply)) => CommandResult::success("ask", reply.text),
        Ok(Err(error)) => CommandResult::failure("ask", error.class(), error.user_message(), 6),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("ask", error_class, message, exit_code)
        }
    }
}
