//! datapad CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Cell failure (a cell exhausted its repair budget)
//! - 4: Collaborator not configured or unreachable

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const CELL_FAILURE: u8 = 3;
    pub const COLLABORATOR_ERROR: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(
            EnvFilter::from_default_env()
                .add_directive("datapad=info".parse().expect("static directive"))
                .add_directive("warn".parse().expect("static directive")),
        )
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::New(args) => commands::new::execute(args).await,
        Commands::Add(args) => commands::add::execute(args).await,
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::Edit(args) => commands::edit::execute(args).await,
        Commands::Show(args) => commands::show::execute(args).await,
        Commands::Clear(args) => commands::clear::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    let msg = e.to_string().to_lowercase();

    if msg.contains("cell failure") {
        ExitCodes::CELL_FAILURE
    } else if msg.contains("collaborator") || msg.contains("api key") {
        ExitCodes::COLLABORATOR_ERROR
    } else if msg.contains("argument") || msg.contains("not found") || msg.contains("no cell") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
