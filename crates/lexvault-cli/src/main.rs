#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod command;
mod config;

use std::process;

use crate::config::Cli;

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "lexvault_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "lexvault_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "lexvault_cli::config";
pub const TRACING_TARGET_COMMAND: &str = "lexvault_cli::command";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::debug!(target: TRACING_TARGET_SHUTDOWN, "Command finished");
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %error,
            "Command failed"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    Cli::init_tracing();
    cli.log();
    cli.validate()?;

    command::execute(&cli).await
}
