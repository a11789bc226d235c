//! Library and document commands.

use std::path::Path;

use anyhow::{Context, bail};
use bytes::Bytes;
use lexvault_library::{Artifact, DocumentFormat, DocumentMetaData, Library};

use crate::TRACING_TARGET_COMMAND;

pub async fn catalog(library: &Library) -> anyhow::Result<()> {
    let catalog = library.catalog().await.context("failed to load catalog")?;
    for (id, metadata) in catalog.iter() {
        println!("{id}\t{}\t{}", metadata.original_format, metadata.title);
    }

    tracing::info!(target: TRACING_TARGET_COMMAND, documents = catalog.len(), "Catalog listed");
    Ok(())
}

pub async fn show(library: &Library, id: &str) -> anyhow::Result<()> {
    let metadata = library
        .get_document(id)
        .read_metadata()
        .await
        .with_context(|| format!("failed to read metadata of '{id}'"))?;
    println!("{}", serde_json::to_string_pretty(&*metadata)?);
    Ok(())
}

pub async fn add(
    library: &Library,
    title: &str,
    file: &Path,
    id: Option<&str>,
) -> anyhow::Result<()> {
    let Some(file_name) = file.file_name().and_then(|name| name.to_str()) else {
        bail!("'{}' has no usable file name", file.display());
    };
    let format = DocumentFormat::from_file_name(file_name);
    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read '{}'", file.display()))?;

    let mut metadata = DocumentMetaData::new(title, file_name, format);
    if let Some(id) = id {
        metadata.id = id.to_string();
    }

    let document = library
        .add_document(metadata, Bytes::from(content))
        .await
        .context("failed to add document")?;
    println!("{}", document.id());
    Ok(())
}

pub async fn remove(library: &Library, id: &str) -> anyhow::Result<()> {
    library
        .remove_document(id)
        .await
        .with_context(|| format!("failed to remove '{id}'"))?;
    Ok(())
}

pub async fn publish(library: &Library, id: &str, supporting: Option<&str>) -> anyhow::Result<()> {
    let artifact = match supporting {
        Some(file) => Artifact::supporting(file),
        None => Artifact::content(),
    };
    let url = library
        .get_document(id)
        .make_public(artifact)
        .await
        .with_context(|| format!("failed to publish '{id}'"))?;
    println!("{url}");
    Ok(())
}

pub async fn pipeline_state(library: &Library, id: &str, pipeline: &str) -> anyhow::Result<()> {
    let state = library
        .get_document(id)
        .read_pipeline_state(pipeline)
        .await
        .with_context(|| format!("failed to read pipeline '{pipeline}' of '{id}'"))?;

    match state {
        Some(state) => println!("{}", String::from_utf8_lossy(&state)),
        None => eprintln!("pipeline '{pipeline}' has not run for '{id}'"),
    }
    Ok(())
}
