//! Library and collection locations.

use std::path::PathBuf;

use anyhow::{Result as AnyhowResult, bail};
use clap::Args;

use crate::TRACING_TARGET_CONFIG;

/// Which library commands operate on and where collections are staged.
#[derive(Debug, Clone, Args)]
#[must_use = "config does nothing unless you use it"]
pub struct LibraryConfig {
    /// Library id (top-level folder in the store)
    #[arg(long, env = "LEXVAULT_LIBRARY", default_value = "library")]
    pub library: String,

    /// Local directory collections are staged in
    #[arg(long, env = "LEXVAULT_STAGING_ROOT", default_value = "./lexvault-staging")]
    pub staging_root: PathBuf,

    /// Concurrent metadata reads while building the catalog
    #[arg(long, env = "LEXVAULT_CATALOG_CONCURRENCY", default_value_t = 16)]
    pub catalog_concurrency: usize,
}

impl LibraryConfig {
    pub fn validate(&self) -> AnyhowResult<()> {
        if self.library.trim().is_empty() {
            bail!("library id cannot be empty");
        }
        if self.catalog_concurrency == 0 {
            bail!("catalog concurrency must be at least 1");
        }
        Ok(())
    }

    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            library = %self.library,
            staging_root = %self.staging_root.display(),
            catalog_concurrency = self.catalog_concurrency,
            "Library configuration"
        );
    }
}
