//! Filesystem-backed object store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_stream::try_stream;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use lexvault_core::{Error, Result};
use tokio::fs;
use url::Url;

use crate::TRACING_TARGET_LOCAL;
use crate::path::{self, StorageLocation};
use crate::store::{ListStream, ObjectStore};

/// Object store rooted at a directory on the local filesystem.
///
/// Object paths map one-to-one onto files below the root; folders are
/// created on write. Bytes are stored verbatim.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps an object path onto the filesystem.
    pub fn file_path(&self, path: &str) -> Result<PathBuf> {
        path::validate_relative(path)?;
        Ok(path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |acc, segment| acc.join(segment)))
    }

    fn file_url(file: &Path) -> Result<String> {
        let absolute = std::path::absolute(file)?;
        Url::from_file_path(&absolute)
            .map(String::from)
            .map_err(|()| {
                Error::invalid_input()
                    .with_message(format!("cannot express {} as a file URL", absolute.display()))
            })
    }
}

async fn read_dir_if_exists(dir: &Path) -> Result<Option<fs::ReadDir>> {
    match fs::read_dir(dir).await {
        Ok(entries) => Ok(Some(entries)),
        Err(err) if matches!(
            err.kind(),
            std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
        ) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn entry_name(entry: &fs::DirEntry) -> String {
    entry.file_name().to_string_lossy().into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Folder,
}

impl LocalStore {
    fn entries<'a>(
        &'a self,
        prefix: &'a str,
        kind: EntryKind,
    ) -> impl Stream<Item = Result<String>> + Send + 'a {
        try_stream! {
            let dir = self.file_path(prefix)?;
            if let Some(mut entries) = read_dir_if_exists(&dir).await? {
                while let Some(entry) = entries.next_entry().await? {
                    let file_type = entry.file_type().await?;
                    let wanted = match kind {
                        EntryKind::File => file_type.is_file(),
                        EntryKind::Folder => file_type.is_dir(),
                    };
                    if wanted {
                        yield entry_name(&entry);
                    }
                }
            }
        }
    }

    fn walk<'a>(&'a self, prefix: &'a str) -> impl Stream<Item = Result<String>> + Send + 'a {
        try_stream! {
            let root = self.file_path(prefix)?;
            let mut pending = vec![(root, String::new())];
            while let Some((dir, relative)) = pending.pop() {
                let Some(mut entries) = read_dir_if_exists(&dir).await? else {
                    continue;
                };
                while let Some(entry) = entries.next_entry().await? {
                    let name = path::join(&relative, &entry_name(&entry));
                    let file_type = entry.file_type().await?;
                    if file_type.is_dir() {
                        pending.push((entry.path(), name));
                    } else if file_type.is_file() {
                        yield name;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn write(&self, path: &str, data: Bytes) -> Result<()> {
        if path.is_empty() {
            return Err(Error::invalid_input().with_message("cannot write to the store root"));
        }
        let file = self.file_path(path)?;

        tracing::debug!(
            target: TRACING_TARGET_LOCAL,
            path = %path,
            size = data.len(),
            "Writing file"
        );

        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&file, &data).await?;
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        let file = self.file_path(path)?;
        match fs::read(&file).await {
            Ok(data) => {
                tracing::debug!(
                    target: TRACING_TARGET_LOCAL,
                    path = %path,
                    size = data.len(),
                    "File read complete"
                );
                Ok(Bytes::from(data))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(Error::not_found(path)),
            Err(err) => Err(err.into()),
        }
    }

    fn list<'a>(&'a self, prefix: &'a str) -> ListStream<'a> {
        Box::pin(self.entries(prefix, EntryKind::File))
    }

    fn list_subfolders<'a>(&'a self, prefix: &'a str) -> ListStream<'a> {
        Box::pin(self.entries(prefix, EntryKind::Folder))
    }

    fn list_all_files_recursive<'a>(&'a self, prefix: &'a str) -> ListStream<'a> {
        Box::pin(self.walk(prefix))
    }

    async fn make_public(&self, path: &str) -> Result<String> {
        let file = self.file_path(path)?;
        if !fs::try_exists(&file).await? {
            return Err(Error::not_found(path));
        }
        Self::file_url(&file)
    }

    async fn public_url(&self, path: &str) -> Result<String> {
        Self::file_url(&self.file_path(path)?)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let file = self.file_path(path)?;
        Ok(fs::try_exists(&file).await?)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(Error::invalid_input().with_message("refusing to remove the store root"));
        }

        let file = self.file_path(path)?;
        let metadata = match fs::symlink_metadata(&file).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        tracing::debug!(target: TRACING_TARGET_LOCAL, path = %path, "Removing");
        if metadata.is_dir() {
            fs::remove_dir_all(&file).await?;
        } else {
            fs::remove_file(&file).await?;
        }
        Ok(())
    }

    async fn copy(&self, path: &str, dest_bucket: &str, dest_path: &str) -> Result<()> {
        let source = self.file_path(path)?;
        let dest_root = if dest_bucket.is_empty() {
            self.clone()
        } else {
            LocalStore::new(dest_bucket)
        };
        let dest = dest_root.file_path(dest_path)?;

        tracing::debug!(
            target: TRACING_TARGET_LOCAL,
            from = %path,
            to = %dest.display(),
            "Copying file"
        );

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        match fs::copy(&source, &dest).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(Error::not_found(path)),
            Err(err) => Err(err.into()),
        }
    }

    fn new_scoped_store(&self, sub_path: &str) -> Result<Arc<dyn ObjectStore>> {
        Ok(Arc::new(LocalStore::new(self.file_path(sub_path)?)))
    }

    fn location(&self, path: &str) -> StorageLocation {
        StorageLocation::new(self.root.display().to_string(), path)
    }

    async fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;

    fn store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        (dir, store)
    }

    async fn sorted(stream: ListStream<'_>) -> Vec<String> {
        let mut names: Vec<String> = stream.try_collect().await.unwrap();
        names.sort();
        names
    }

    #[tokio::test]
    async fn write_then_read_is_byte_exact() {
        let (_dir, store) = store();
        let payload = Bytes::from_static(b"\x00\xffSection 420\n");
        store.write("lib/doc/doc.pdf", payload.clone()).await.unwrap();
        assert_eq!(store.read("lib/doc/doc.pdf").await.unwrap(), payload);
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let (_dir, store) = store();
        assert!(store.read("nope.txt").await.unwrap_err().is_not_found());
        assert!(!store.exists("nope.txt").await.unwrap());
    }

    #[tokio::test]
    async fn listings_split_files_and_folders() {
        let (_dir, store) = store();
        store.write("lib/a.txt", Bytes::from_static(b"a")).await.unwrap();
        store.write("lib/d1/x.json", Bytes::from_static(b"x")).await.unwrap();
        store.write("lib/d1/deep/y.json", Bytes::from_static(b"y")).await.unwrap();
        store.write("lib/d2/z.json", Bytes::from_static(b"z")).await.unwrap();

        assert_eq!(sorted(store.list("lib")).await, vec!["a.txt"]);
        assert_eq!(sorted(store.list_subfolders("lib")).await, vec!["d1", "d2"]);
        assert_eq!(
            sorted(store.list_all_files_recursive("lib/d1")).await,
            vec!["deep/y.json", "x.json"]
        );
        assert!(sorted(store.list("missing")).await.is_empty());
        assert!(sorted(store.list_subfolders("missing")).await.is_empty());
    }

    #[tokio::test]
    async fn remove_respects_segment_boundaries() {
        let (_dir, store) = store();
        store.write("lib/doc/metadata.json", Bytes::from_static(b"{}")).await.unwrap();
        store.write("lib/doc/doc.pdf", Bytes::from_static(b"%PDF")).await.unwrap();
        store.write("lib/doc2/metadata.json", Bytes::from_static(b"{}")).await.unwrap();

        store.remove("lib/doc").await.unwrap();

        assert!(!store.exists("lib/doc/metadata.json").await.unwrap());
        assert!(!store.exists("lib/doc/doc.pdf").await.unwrap());
        assert!(store.exists("lib/doc2/metadata.json").await.unwrap());

        // Removing again is a no-op.
        store.remove("lib/doc").await.unwrap();
    }

    #[tokio::test]
    async fn copy_into_another_root() {
        let (_dir, store) = store();
        let other = tempfile::tempdir().unwrap();
        store.write("a/b.txt", Bytes::from_static(b"hello")).await.unwrap();

        store
            .copy("a/b.txt", other.path().to_str().unwrap(), "copied/b.txt")
            .await
            .unwrap();

        let copied = LocalStore::new(other.path());
        assert_eq!(copied.read("copied/b.txt").await.unwrap(), Bytes::from_static(b"hello"));
        assert!(store.copy("absent", "", "x").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn public_urls_are_file_urls() {
        let (_dir, store) = store();
        store.write("lib/doc/doc.pdf", Bytes::from_static(b"%PDF")).await.unwrap();

        let url = store.make_public("lib/doc/doc.pdf").await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("/lib/doc/doc.pdf"));
        assert_eq!(store.public_url("lib/doc/doc.pdf").await.unwrap(), url);
        assert!(store.make_public("lib/other.pdf").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn scoped_store_sees_subtree() {
        let (_dir, store) = store();
        store.write("lib/__tasks__/review/request.json", Bytes::from_static(b"{}")).await.unwrap();

        let scoped = store.new_scoped_store("lib/__tasks__/review").unwrap();
        assert!(scoped.exists("request.json").await.unwrap());

        scoped.write("response.json", Bytes::from_static(b"[]")).await.unwrap();
        assert!(store.exists("lib/__tasks__/review/response.json").await.unwrap());
    }

    #[tokio::test]
    async fn rejects_escaping_paths() {
        let (_dir, store) = store();
        let err = store.read("../etc/passwd").await.unwrap_err();
        assert_eq!(err.kind(), lexvault_core::ErrorKind::InvalidInput);
        assert!(store.remove("").await.is_err());
    }
}
