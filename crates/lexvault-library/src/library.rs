//! Catalog of documents rooted at a library id.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{TryStreamExt, future};
use lexvault_core::{Error, Result, TtlCache};
use lexvault_storage::{ObjectStore, path};

use crate::TRACING_TARGET_LIBRARY;
use crate::document::Document;
use crate::metadata::{DocumentMetaData, epoch_seconds};

/// Every document id in a library mapped to its metadata.
pub type Catalog = BTreeMap<String, DocumentMetaData>;

/// Sub-folders starting with this prefix hold internal state, not documents.
pub const RESERVED_PREFIX: &str = "__";

const TASKS_DIR: &str = "__tasks__";
const CATALOG_TTL: Duration = Duration::from_secs(15 * 60);
const TASK_STORE_TTL: Duration = Duration::from_secs(15 * 60);
const DEFAULT_CATALOG_CONCURRENCY: usize = 16;

struct LibraryInner {
    id: String,
    store: Arc<dyn ObjectStore>,
    catalog: TtlCache<(), Arc<Catalog>>,
    task_stores: TtlCache<String, Arc<dyn ObjectStore>>,
}

/// Handle on the documents stored under `{id}/` of an object store.
///
/// Cloning is cheap and clones share caches.
#[derive(Clone)]
pub struct Library {
    inner: Arc<LibraryInner>,
    catalog_concurrency: usize,
}

impl Library {
    /// Opens the library `id` on `store`. No I/O happens until first use.
    pub fn new(id: impl Into<String>, store: Arc<dyn ObjectStore>) -> Result<Self> {
        let id = id.into();
        path::validate_relative(&id)?;
        if id.is_empty() {
            return Err(Error::invalid_input().with_message("library id cannot be empty"));
        }

        Ok(Self {
            inner: Arc::new(LibraryInner {
                id,
                store,
                catalog: TtlCache::new("library-catalog", 2, CATALOG_TTL),
                task_stores: TtlCache::new("library-task-stores", 2, TASK_STORE_TTL),
            }),
            catalog_concurrency: DEFAULT_CATALOG_CONCURRENCY,
        })
    }

    /// Limits concurrent metadata reads while building the catalog.
    #[must_use]
    pub fn with_catalog_concurrency(mut self, limit: usize) -> Self {
        self.catalog_concurrency = limit.max(1);
        self
    }

    /// Returns the library id.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.inner.store
    }

    /// Path of `suffix` inside the library.
    pub(crate) fn file_path(&self, suffix: &str) -> String {
        path::join(&self.inner.id, suffix)
    }

    /// All documents with their metadata, cached for 15 minutes.
    ///
    /// Fails as a whole if any document's metadata cannot be read.
    pub async fn catalog(&self) -> Result<Arc<Catalog>> {
        self.inner
            .catalog
            .get_or_try_populate((), || self.load_catalog())
            .await
    }

    #[tracing::instrument(name = "library.catalog", skip(self), fields(library = %self.inner.id))]
    async fn load_catalog(&self) -> Result<Arc<Catalog>> {
        let entries: Vec<(String, DocumentMetaData)> = self
            .inner
            .store
            .list_subfolders(&self.inner.id)
            .try_filter(|doc_id| future::ready(!doc_id.starts_with(RESERVED_PREFIX)))
            .map_ok(|doc_id| {
                let document = self.get_document(&doc_id);
                async move {
                    let metadata = document.read_metadata().await?;
                    Ok::<_, Error>((doc_id, Arc::unwrap_or_clone(metadata)))
                }
            })
            .try_buffer_unordered(self.catalog_concurrency)
            .try_collect()
            .await?;

        tracing::debug!(
            target: TRACING_TARGET_LIBRARY,
            library = %self.inner.id,
            documents = entries.len(),
            "Catalog loaded"
        );

        Ok(Arc::new(entries.into_iter().collect()))
    }

    /// Whether `document_id` is in the catalog.
    pub async fn document_exists(&self, document_id: &str) -> Result<bool> {
        Ok(self.catalog().await?.contains_key(document_id))
    }

    /// Stores a new document: metadata first, then content.
    ///
    /// An empty `metadata.id` is replaced with a fresh time-ordered UUID and
    /// `create_ts` is stamped. The two writes are not atomic: a failure in
    /// between leaves metadata without content.
    pub async fn add_document(
        &self,
        mut metadata: DocumentMetaData,
        content: Bytes,
    ) -> Result<Document> {
        if metadata.id.is_empty() {
            metadata.id = uuid::Uuid::now_v7().to_string();
        }
        path::validate_segment(&metadata.id)?;
        metadata.create_ts = epoch_seconds();

        let document = self.get_document(&metadata.id);
        document.write_metadata(&metadata).await?;
        document.write_document(content, None).await?;
        self.inner.catalog.invalidate_all();

        tracing::info!(
            target: TRACING_TARGET_LIBRARY,
            library = %self.inner.id,
            document = %metadata.id,
            "Document added"
        );
        Ok(document)
    }

    /// Deletes every artifact of `document_id`.
    pub async fn remove_document(&self, document_id: &str) -> Result<()> {
        path::validate_segment(document_id)?;
        self.inner.store.remove(&self.file_path(document_id)).await?;
        self.inner.catalog.invalidate_all();

        tracing::info!(
            target: TRACING_TARGET_LIBRARY,
            library = %self.inner.id,
            document = %document_id,
            "Document removed"
        );
        Ok(())
    }

    /// Returns a handle on `document_id` without touching storage.
    pub fn get_document(&self, document_id: &str) -> Document {
        Document::new(self.clone(), document_id)
    }

    /// Store scoped to `__tasks__/{name}`, memoized per name.
    pub fn get_task_manager_store(&self, task_manager_name: &str) -> Result<Arc<dyn ObjectStore>> {
        let key = task_manager_name.to_string();
        if let Some(store) = self.inner.task_stores.get(&key) {
            return Ok(store);
        }

        path::validate_segment(task_manager_name)?;
        let sub_path = self.file_path(&path::join(TASKS_DIR, task_manager_name));
        let store = self.inner.store.new_scoped_store(&sub_path)?;
        self.inner.task_stores.insert(key, store.clone());
        Ok(store)
    }

    /// Releases the store's network resources.
    pub async fn shutdown(&self) {
        self.inner.store.shutdown().await;
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("id", &self.inner.id)
            .field("store", &self.inner.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use lexvault_storage::LocalStore;

    use super::*;
    use crate::artifact::Artifact;
    use crate::metadata::DocumentFormat;

    fn library() -> (tempfile::TempDir, Library) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
        (dir, Library::new("acts", store).unwrap())
    }

    fn metadata(title: &str) -> DocumentMetaData {
        DocumentMetaData::new(title, format!("{title}.pdf"), DocumentFormat::Pdf)
    }

    #[tokio::test]
    async fn add_assigns_id_and_timestamp() {
        let (_dir, library) = library();
        let document = library
            .add_document(metadata("ipc"), Bytes::from_static(b"%PDF-1.7"))
            .await
            .unwrap();

        assert!(!document.id().is_empty());
        let stored = document.read_metadata().await.unwrap();
        assert_eq!(stored.id, document.id());
        assert!(stored.create_ts > 0.0);
        assert_eq!(
            document.read_document(None).await.unwrap(),
            Bytes::from_static(b"%PDF-1.7")
        );
    }

    #[tokio::test]
    async fn catalog_skips_reserved_folders() {
        let (_dir, library) = library();
        let mut first = metadata("ipc");
        first.id = "ipc".into();
        library.add_document(first, Bytes::from_static(b"a")).await.unwrap();
        library.add_document(metadata("crpc"), Bytes::from_static(b"b")).await.unwrap();
        library
            .store()
            .write("acts/__tasks__/review/x.json", Bytes::from_static(b"{}"))
            .await
            .unwrap();

        let catalog = library.catalog().await.unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog["ipc"].title, "ipc");
        assert!(library.document_exists("ipc").await.unwrap());
        assert!(!library.document_exists("__tasks__").await.unwrap());
    }

    #[tokio::test]
    async fn catalog_hit_does_not_touch_storage() {
        let (dir, library) = library();
        let mut doc = metadata("ipc");
        doc.id = "ipc".into();
        library.add_document(doc, Bytes::from_static(b"a")).await.unwrap();
        assert_eq!(library.catalog().await.unwrap().len(), 1);

        // A document written behind the library's back stays invisible until the TTL lapses.
        let other = LocalStore::new(dir.path());
        other
            .write("acts/sneaky/metadata.json", Bytes::from(serde_json::to_vec(&metadata("s")).unwrap()))
            .await
            .unwrap();
        assert_eq!(library.catalog().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn catalog_fails_when_any_metadata_is_unreadable() {
        let (_dir, library) = library();
        library.add_document(metadata("ok"), Bytes::from_static(b"a")).await.unwrap();
        library
            .store()
            .write("acts/broken/broken.pdf", Bytes::from_static(b"no metadata"))
            .await
            .unwrap();

        let err = library.catalog().await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn remove_document_drops_it_from_the_catalog() {
        let (_dir, library) = library();
        let mut doc1 = metadata("doc1");
        doc1.id = "doc1".into();
        let mut doc10 = metadata("doc10");
        doc10.id = "doc10".into();
        let removed = library.add_document(doc1, Bytes::from_static(b"1")).await.unwrap();
        library.add_document(doc10, Bytes::from_static(b"10")).await.unwrap();
        removed
            .write_sections(Bytes::from_static(b"[]"))
            .await
            .unwrap();
        assert!(library.document_exists("doc1").await.unwrap());

        library.remove_document("doc1").await.unwrap();

        assert!(!library.document_exists("doc1").await.unwrap());
        assert!(library.document_exists("doc10").await.unwrap());
        assert!(!library.catalog().await.unwrap().contains_key("doc1"));
        assert!(
            !library
                .store()
                .exists(&library.file_path("doc1/sections.json"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn task_manager_store_is_scoped_and_memoized() {
        let (_dir, library) = library();
        let first = library.get_task_manager_store("label-studio").unwrap();
        let second = library.get_task_manager_store("label-studio").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        first.write("doc/review", Bytes::from_static(b"{}")).await.unwrap();
        assert!(
            library
                .store()
                .exists("acts/__tasks__/label-studio/doc/review")
                .await
                .unwrap()
        );
        assert!(library.get_task_manager_store("../x").is_err());
    }

    #[tokio::test]
    async fn metadata_and_content_round_trip() {
        let (_dir, library) = library();
        let document = library
            .add_document(metadata("ipc"), Bytes::from_static(b"\x00binary\xff"))
            .await
            .unwrap();

        let original = document.read_metadata().await.unwrap();
        document.write_metadata(&original).await.unwrap();
        assert_eq!(document.read_metadata().await.unwrap(), original);

        let content = document.read_document(None).await.unwrap();
        document.write_document(content.clone(), None).await.unwrap();
        assert_eq!(document.read_document(None).await.unwrap(), content);

        let path = document.artifact_path(Artifact::content()).await.unwrap();
        assert_eq!(path, format!("acts/{}/{}.pdf", document.id(), document.id()));
    }
}
