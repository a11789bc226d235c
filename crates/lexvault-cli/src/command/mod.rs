//! Subcommands of the `lexvault` binary.

mod document;
mod ingest;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;
use lexvault_library::Library;
use lexvault_storage::ObjectStore;

use crate::TRACING_TARGET_COMMAND;
use crate::config::Cli;

/// What the binary should do.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List every document of the library
    Catalog,

    /// Print a document's metadata
    Show { id: String },

    /// Add a document from a local file
    Add {
        /// Document title
        #[arg(long)]
        title: String,

        /// File holding the document content
        #[arg(long)]
        file: PathBuf,

        /// Document id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Delete a document and all of its artifacts
    Remove { id: String },

    /// Publish a document's content, or one of its supporting files
    Publish {
        id: String,

        /// Supporting file to publish instead of the content
        #[arg(long)]
        supporting: Option<String>,
    },

    /// Print the saved state of a document pipeline
    PipelineState { id: String, pipeline: String },

    /// Stage files into a new collection and mirror it to the store
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

impl Command {
    /// Short name used in logs.
    fn name(&self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Show { .. } => "show",
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Publish { .. } => "publish",
            Self::PipelineState { .. } => "pipeline-state",
            Self::Ingest { .. } => "ingest",
        }
    }
}

/// Builds the store, runs the command and shuts the store down.
pub async fn execute(cli: &Cli) -> anyhow::Result<()> {
    let store: Arc<dyn ObjectStore> = cli
        .storage
        .build()
        .context("failed to build object store")?;

    tracing::debug!(
        target: TRACING_TARGET_COMMAND,
        command = cli.command.name(),
        store = ?store,
        "Running command"
    );

    let result = dispatch(cli, store.clone()).await;
    store.shutdown().await;
    result
}

fn open_library(cli: &Cli, store: Arc<dyn ObjectStore>) -> anyhow::Result<Library> {
    let library = Library::new(cli.library.library.clone(), store)
        .context("invalid library id")?
        .with_catalog_concurrency(cli.library.catalog_concurrency);
    Ok(library)
}

async fn dispatch(cli: &Cli, store: Arc<dyn ObjectStore>) -> anyhow::Result<()> {
    match &cli.command {
        Command::Catalog => document::catalog(&open_library(cli, store)?).await,
        Command::Show { id } => document::show(&open_library(cli, store)?, id).await,
        Command::Add { title, file, id } => {
            document::add(&open_library(cli, store)?, title, file, id.as_deref()).await
        }
        Command::Remove { id } => document::remove(&open_library(cli, store)?, id).await,
        Command::Publish { id, supporting } => {
            document::publish(&open_library(cli, store)?, id, supporting.as_deref()).await
        }
        Command::PipelineState { id, pipeline } => {
            document::pipeline_state(&open_library(cli, store)?, id, pipeline).await
        }
        Command::Ingest { files } => ingest::run(&cli.library.staging_root, store, files).await,
    }
}
