pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tally_core::config::LoadOptions;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "tally",
    about = "Tally operator CLI",
    long_about = "Ask the finance agent questions, prepare the ledger database, load demo data, \
                  and inspect effective configuration.",
    after_help = "Examples:\n  tally ask --user owner-1 \"List my overdue invoices\"\n  \
                  tally seed --user owner-1\n  tally config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Config file (defaults to tally.toml or config/tally.toml)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Ask the finance agent a question on behalf of a user")]
    Ask {
        #[arg(long, help = "User id whose ledgers the agent works on")]
        user: String,
        #[arg(help = "The question, in plain language")]
        question: String,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo ledgers into an empty user")]
    Seed {
        #[arg(long, help = "User id that receives the demo data")]
        user: String,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let options = LoadOptions { config_path: cli.config, ..LoadOptions::default() };
    let result = match cli.command {
        Command::Ask { user, question } => commands::ask::run(options, &user, &question),
        Command::Migrate => commands::migrate::run(options),
        Command::Seed { user } => commands::seed::run(options, &user),
        Command::Config => commands::config::run(options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Diagnostics go to stderr so stdout stays a single JSON outcome.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
