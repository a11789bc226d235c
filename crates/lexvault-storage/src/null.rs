//! Store that discards everything written to it.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use lexvault_core::{Error, Result};

use crate::TRACING_TARGET_NULL;
use crate::path::{self, StorageLocation};
use crate::store::{ListStream, ObjectStore};

/// A remote tier that never holds anything.
///
/// Writes succeed and are dropped; reads fail with not-found; listings are
/// empty. URLs use the `null://` scheme.
#[derive(Debug, Clone, Default)]
pub struct NullStore {
    base_path: String,
}

impl NullStore {
    /// Creates a new null store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for NullStore {
    async fn write(&self, path: &str, data: Bytes) -> Result<()> {
        path::validate_relative(path)?;
        tracing::trace!(
            target: TRACING_TARGET_NULL,
            path = %path,
            size = data.len(),
            "Discarding write"
        );
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        Err(Error::not_found(path))
    }

    fn list<'a>(&'a self, _prefix: &'a str) -> ListStream<'a> {
        Box::pin(stream::empty())
    }

    fn list_subfolders<'a>(&'a self, _prefix: &'a str) -> ListStream<'a> {
        Box::pin(stream::empty())
    }

    fn list_all_files_recursive<'a>(&'a self, _prefix: &'a str) -> ListStream<'a> {
        Box::pin(stream::empty())
    }

    async fn make_public(&self, path: &str) -> Result<String> {
        self.public_url(path).await
    }

    async fn public_url(&self, path: &str) -> Result<String> {
        path::validate_relative(path)?;
        Ok(format!("null:///{}", path::join(&self.base_path, path)))
    }

    async fn exists(&self, _path: &str) -> Result<bool> {
        Ok(false)
    }

    async fn remove(&self, _path: &str) -> Result<()> {
        Ok(())
    }

    async fn copy(&self, path: &str, _dest_bucket: &str, _dest_path: &str) -> Result<()> {
        Err(Error::not_found(path))
    }

    fn new_scoped_store(&self, sub_path: &str) -> Result<Arc<dyn ObjectStore>> {
        path::validate_relative(sub_path)?;
        Ok(Arc::new(Self {
            base_path: path::join(&self.base_path, sub_path),
        }))
    }

    fn location(&self, path: &str) -> StorageLocation {
        StorageLocation::new("null://", path::join(&self.base_path, path))
    }

    async fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;

    #[tokio::test]
    async fn forgets_everything() {
        let store = NullStore::new();
        store.write("a/b.txt", Bytes::from_static(b"data")).await.unwrap();

        assert!(store.read("a/b.txt").await.unwrap_err().is_not_found());
        assert!(!store.exists("a/b.txt").await.unwrap());
        let names: Vec<String> = store.list("a").try_collect().await.unwrap();
        assert!(names.is_empty());
        store.remove("a").await.unwrap();
    }

    #[tokio::test]
    async fn urls_carry_scope() {
        let store = NullStore::new().new_scoped_store("coll").unwrap();
        assert_eq!(store.public_url("f.txt").await.unwrap(), "null:///coll/f.txt");
    }
}
