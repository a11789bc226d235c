//! Collection ingestion.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use lexvault_collection::{DocumentRepository, SourceFile};
use lexvault_storage::{LocalStore, ObjectStore};

use crate::TRACING_TARGET_COMMAND;

pub async fn run(
    staging_root: &Path,
    store: Arc<dyn ObjectStore>,
    files: &[PathBuf],
) -> anyhow::Result<()> {
    let mut sources = Vec::with_capacity(files.len());
    for file in files {
        let Some(name) = file.file_name().and_then(|name| name.to_str()) else {
            bail!("'{}' has no usable file name", file.display());
        };
        let reader = tokio::fs::File::open(file)
            .await
            .with_context(|| format!("failed to open '{}'", file.display()))?;
        sources.push(SourceFile::new(name, reader));
    }

    let repository = DocumentRepository::new(LocalStore::new(staging_root), store);
    let collection = repository
        .new_collection()
        .await
        .context("failed to create collection")?;
    let staged = collection
        .init_from_files(sources)
        .await
        .context("failed to stage files")?;
    let synced = collection.sync().await.context("failed to mirror collection")?;

    tracing::info!(
        target: TRACING_TARGET_COMMAND,
        collection = %collection.id(),
        staged = staged.len(),
        synced,
        "Collection ingested"
    );
    println!("{}", collection.id());
    for name in staged {
        println!("  {name}");
    }
    Ok(())
}
