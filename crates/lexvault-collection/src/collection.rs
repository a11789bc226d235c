//! One ephemeral set of staged files and derived index artifacts.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_stream::try_stream;
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream};
use futures::{StreamExt, TryStreamExt};
use lexvault_core::{Error, Result};
use lexvault_library::DocumentFormat;
use lexvault_storage::{LocalStore, ObjectStore, path};

use crate::TRACING_TARGET_COLLECTION;
use crate::source::SourceFile;

const INDEX_DIR: &str = "__index__";
const SYNC_CONCURRENCY: usize = 8;

/// Files of one collection, staged locally and mirrored remotely.
///
/// Cloning is cheap; clones address the same directories.
#[derive(Clone)]
pub struct DocumentCollection {
    id: String,
    local: LocalStore,
    remote: Arc<dyn ObjectStore>,
}

/// Swaps the extension of `name` for the one of `format`.
fn retarget(name: &str, format: Option<DocumentFormat>) -> String {
    match format.filter(|format| *format != DocumentFormat::Default) {
        None => name.to_string(),
        Some(format) => {
            let stem = match name.rsplit_once('.') {
                Some((stem, _)) if !stem.is_empty() => stem,
                _ => name,
            };
            format!("{stem}.{}", format.extension())
        }
    }
}

impl DocumentCollection {
    pub(crate) fn new(id: String, local: LocalStore, remote: Arc<dyn ObjectStore>) -> Self {
        Self { id, local, remote }
    }

    /// Returns the collection id.
    pub fn id(&self) -> &str {
        &self.id
    }

    fn file_key(&self, name: &str, format: Option<DocumentFormat>) -> Result<String> {
        let name = retarget(name, format);
        path::validate_segment(&name)?;
        Ok(path::join(&self.id, &name))
    }

    fn index_folder_key(&self, namespace: &str) -> Result<String> {
        path::validate_segment(namespace)?;
        Ok(path::join(&self.id, &path::join(INDEX_DIR, namespace)))
    }

    fn index_key(&self, namespace: &str, file: &str) -> Result<String> {
        path::validate_segment(file)?;
        Ok(path::join(&self.index_folder_key(namespace)?, file))
    }

    /// Stages every source file into the local tier and returns the staged
    /// names. Archives contribute one staged file per entry.
    ///
    /// Nothing is written when two files would be staged under the same name.
    #[tracing::instrument(name = "collection.init", skip_all, fields(collection = %self.id))]
    pub async fn init_from_files(&self, files: Vec<SourceFile>) -> Result<Vec<String>> {
        let mut pending = Vec::new();
        let mut names = HashSet::new();
        for file in files {
            for (name, content) in file.expand().await? {
                if !names.insert(name.clone()) {
                    return Err(Error::invalid_input()
                        .with_message(format!("more than one upload is named '{name}'")));
                }
                pending.push((self.file_key(&name, None)?, name, content));
            }
        }

        let mut staged = Vec::with_capacity(pending.len());
        for (key, name, content) in pending {
            tracing::debug!(
                target: TRACING_TARGET_COLLECTION,
                file = %name,
                size = content.len(),
                "Staging file"
            );
            self.local.write(&key, content).await?;
            staged.push(name);
        }

        tracing::info!(
            target: TRACING_TARGET_COLLECTION,
            collection = %self.id,
            files = staged.len(),
            "Collection staged"
        );
        Ok(staged)
    }

    /// Staged file names: local ones first, then files only the remote has.
    ///
    /// Every call starts a fresh listing.
    pub fn list_files(&self) -> BoxStream<'_, Result<String>> {
        self.files().boxed()
    }

    fn files(&self) -> impl Stream<Item = Result<String>> + Send + '_ {
        try_stream! {
            let mut seen = HashSet::new();

            let mut local = self.local.list(&self.id);
            while let Some(name) = local.try_next().await? {
                seen.insert(name.clone());
                yield name;
            }

            let mut remote = self.remote.list(&self.id);
            while let Some(name) = remote.try_next().await? {
                if !seen.contains(&name) {
                    yield name;
                }
            }
        }
    }

    /// Local read with remote fallback; a remote hit is copied back locally.
    async fn read_through(&self, key: &str) -> Result<Bytes> {
        match self.local.read(key).await {
            Ok(content) => Ok(content),
            Err(err) if err.is_not_found() => {
                let content = self.remote.read(key).await?;
                self.local.write(key, content.clone()).await?;
                tracing::debug!(
                    target: TRACING_TARGET_COLLECTION,
                    path = %key,
                    "Local copy restored from remote"
                );
                Ok(content)
            }
            Err(err) => Err(err),
        }
    }

    async fn write_through(&self, key: &str, content: Bytes) -> Result<()> {
        self.local.write(key, content.clone()).await?;
        self.remote.write(key, content).await
    }

    /// Reads a staged file, or its rendition in `format`.
    pub async fn read_file(&self, name: &str, format: Option<DocumentFormat>) -> Result<Bytes> {
        self.read_through(&self.file_key(name, format)?).await
    }

    /// Writes a file to both tiers.
    pub async fn write_file(
        &self,
        name: &str,
        content: Bytes,
        format: Option<DocumentFormat>,
    ) -> Result<()> {
        self.write_through(&self.file_key(name, format)?, content)
            .await
    }

    /// Writes an index file of `namespace` to both tiers.
    pub async fn write_index_file(&self, namespace: &str, file: &str, content: Bytes) -> Result<()> {
        self.write_through(&self.index_key(namespace, file)?, content)
            .await
    }

    /// Reads an index file, falling back to the non-namespaced `file`.
    pub async fn read_index_file(&self, namespace: &str, file: &str) -> Result<Bytes> {
        match self.read_through(&self.index_key(namespace, file)?).await {
            Err(err) if err.is_not_found() => {
                tracing::debug!(
                    target: TRACING_TARGET_COLLECTION,
                    collection = %self.id,
                    namespace = %namespace,
                    file = %file,
                    "Namespaced index file missing, trying legacy path"
                );
                self.read_file(file, None).await
            }
            result => result,
        }
    }

    /// Materialises index files as local files below
    /// [`local_index_folder`](Self::local_index_folder). Safe to repeat.
    pub async fn download_index_files(&self, namespace: &str, files: &[&str]) -> Result<()> {
        for file in files {
            let content = self.read_index_file(namespace, file).await?;
            self.local
                .write(&self.index_key(namespace, file)?, content)
                .await?;
        }

        tracing::debug!(
            target: TRACING_TARGET_COLLECTION,
            collection = %self.id,
            namespace = %namespace,
            files = files.len(),
            "Index files downloaded"
        );
        Ok(())
    }

    /// Local path a staged file lives at. No I/O.
    pub fn local_file_path(&self, name: &str) -> Result<PathBuf> {
        self.local.file_path(&self.file_key(name, None)?)
    }

    /// Local path an index file is downloaded to. No I/O.
    pub fn local_index_file_path(&self, namespace: &str, file: &str) -> Result<PathBuf> {
        self.local.file_path(&self.index_key(namespace, file)?)
    }

    /// Local folder holding the index files of `namespace`. No I/O.
    pub fn local_index_folder(&self, namespace: &str) -> Result<PathBuf> {
        self.local.file_path(&self.index_folder_key(namespace)?)
    }

    /// Mirrors every local file of the collection to the remote tier and
    /// returns how many were copied.
    #[tracing::instrument(name = "collection.sync", skip(self), fields(collection = %self.id))]
    pub async fn sync(&self) -> Result<usize> {
        let files: Vec<String> = self
            .local
            .list_all_files_recursive(&self.id)
            .try_collect()
            .await?;
        let count = files.len();

        stream::iter(files)
            .map(Ok::<_, Error>)
            .try_for_each_concurrent(SYNC_CONCURRENCY, |relative| async move {
                let key = path::join(&self.id, &relative);
                let content = self.local.read(&key).await?;
                self.remote.write(&key, content).await
            })
            .await?;

        tracing::info!(target: TRACING_TARGET_COLLECTION, files = count, "Collection synced");
        Ok(count)
    }

    /// Drops the local staging directory. Remote copies are kept.
    pub async fn purge_local(&self) -> Result<()> {
        self.local.remove(&self.id).await?;
        tracing::debug!(target: TRACING_TARGET_COLLECTION, collection = %self.id, "Local copy purged");
        Ok(())
    }

    /// Publishes the remote copy of a file and returns its URL.
    pub async fn make_public(&self, name: &str, format: Option<DocumentFormat>) -> Result<String> {
        self.remote.make_public(&self.file_key(name, format)?).await
    }

    /// URL of the remote copy of a file. No I/O, nothing is published.
    pub async fn public_url(&self, name: &str, format: Option<DocumentFormat>) -> Result<String> {
        self.remote.public_url(&self.file_key(name, format)?).await
    }

    /// Releases the remote store's network resources.
    ///
    /// The remote tier is shared with the repository and its other
    /// collections, which can no longer reach it afterwards.
    pub async fn shutdown(&self) {
        tracing::debug!(target: TRACING_TARGET_COLLECTION, collection = %self.id, "Shutting down");
        self.remote.shutdown().await;
    }
}

impl fmt::Debug for DocumentCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentCollection")
            .field("id", &self.id)
            .field("local", &self.local)
            .field("remote", &self.remote)
            .finish()
    }
}
