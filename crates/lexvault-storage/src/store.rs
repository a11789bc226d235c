//! The object store contract shared by every storage tier.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use lexvault_core::Result;

use crate::path::StorageLocation;

/// Lazily produced listing of names, relative to the listed prefix.
pub type ListStream<'a> = BoxStream<'a, Result<String>>;

/// Uniform access to a tree of named blobs.
///
/// Paths are relative to the store root (see [`crate::path`]). Reading a
/// path that does not exist fails with
/// [`NotFound`](lexvault_core::ErrorKind::NotFound); listing a prefix that
/// does not exist yields nothing.
#[async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug + 'static {
    /// Stores `data` at `path`, replacing any existing object.
    async fn write(&self, path: &str, data: Bytes) -> Result<()>;

    /// Returns the full contents of the object at `path`.
    async fn read(&self, path: &str) -> Result<Bytes>;

    /// Names of the objects directly under `prefix` (one level, files only).
    fn list<'a>(&'a self, prefix: &'a str) -> ListStream<'a>;

    /// Names of the immediate sub-folders of `prefix`.
    fn list_subfolders<'a>(&'a self, prefix: &'a str) -> ListStream<'a>;

    /// Every object below `prefix` at any depth, as paths relative to it.
    fn list_all_files_recursive<'a>(&'a self, prefix: &'a str) -> ListStream<'a>;

    /// Grants anonymous read access to `path` and returns its public URL.
    async fn make_public(&self, path: &str) -> Result<String>;

    /// Returns the URL `path` would be served at once public.
    ///
    /// Deterministic: it does not check that the object exists.
    async fn public_url(&self, path: &str) -> Result<String>;

    /// Whether an object exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Deletes the object at `path` and every object below `path/`.
    ///
    /// Objects that merely share a name prefix (`a/b` vs `a/bc`) are kept.
    async fn remove(&self, path: &str) -> Result<()>;

    /// Copies `path` to `dest_path` inside another bucket or root.
    async fn copy(&self, path: &str, dest_bucket: &str, dest_path: &str) -> Result<()>;

    /// Returns a store rooted at `sub_path` inside this one.
    ///
    /// The scoped store shares this store's connection resources.
    fn new_scoped_store(&self, sub_path: &str) -> Result<Arc<dyn ObjectStore>>;

    /// Where `path` physically lives.
    fn location(&self, path: &str) -> StorageLocation;

    /// Releases network resources. Idempotent; errors are logged, not returned.
    async fn shutdown(&self);
}
