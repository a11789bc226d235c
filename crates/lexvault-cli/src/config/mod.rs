//! CLI configuration.
//!
//! ```text
//! Cli
//! ├── storage: StorageConfig   # backend, bucket, credentials, retries
//! ├── library: LibraryConfig   # library id, staging root, catalog fan-out
//! └── command: Command         # what to do
//! ```

mod library;

use std::process;

use anyhow::Context;
use clap::Parser;
pub use library::LibraryConfig;
use lexvault_storage::StorageConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::command::Command;
use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "lexvault")]
#[command(about = "Legal document storage operator tool")]
#[command(version)]
pub struct Cli {
    /// Object store selection and tuning.
    #[clap(flatten)]
    pub storage: StorageConfig,

    /// Library and collection locations.
    #[clap(flatten)]
    pub library: LibraryConfig,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Loads `.env` (if enabled) and parses the command line.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with `RUST_LOG` filtering, `info` by default.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.library
            .validate()
            .context("invalid library configuration")?;
        Ok(())
    }

    /// Logs configuration (no secrets).
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            features = ?Self::enabled_features(),
            "Build information"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            backend = ?self.storage.storage_backend,
            bucket = ?self.storage.bucket,
            base_path = ?self.storage.base_path,
            endpoint = ?self.storage.endpoint,
            max_retries = ?self.storage.max_retries,
            "Storage configuration"
        );
        self.library.log();
    }

    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use lexvault_storage::BackendKind;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_and_subcommand() {
        let cli = Cli::try_parse_from([
            "lexvault",
            "--storage-backend",
            "null",
            "--library",
            "acts",
            "show",
            "ipc",
        ])
        .unwrap();

        assert_eq!(cli.storage.storage_backend, BackendKind::Null);
        assert_eq!(cli.library.library, "acts");
        assert!(matches!(cli.command, Command::Show { ref id } if id == "ipc"));
        cli.validate().unwrap();
    }

    #[test]
    fn add_requires_title_and_file() {
        assert!(Cli::try_parse_from(["lexvault", "add", "--title", "IPC"]).is_err());
        let cli =
            Cli::try_parse_from(["lexvault", "add", "--title", "IPC", "--file", "ipc.pdf"]).unwrap();
        assert!(matches!(cli.command, Command::Add { id: None, .. }));
    }
}
