//! Handle on a single cataloged document.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use lexvault_core::{Result, TtlCache};
use lexvault_storage::ObjectStore;

use crate::TRACING_TARGET_DOCUMENT;
use crate::artifact::{Artifact, PIPELINE_STATE_FILE, THUMBNAIL_FILE};
use crate::library::Library;
use crate::metadata::{
    DocumentFormat, DocumentMetaData, DocumentSection, DocumentSupportingMetadata, epoch_seconds,
};

const METADATA_TTL: Duration = Duration::from_secs(5 * 60);

/// One document of a [`Library`].
///
/// Every operation resolves an [`Artifact`] to a path below
/// `{library}/{id}/` and delegates to the library's store; storage errors
/// are returned unchanged. Metadata reads are cached per handle for five
/// minutes and the cache is dropped on every metadata write made through
/// the handle. Clones share the cache.
#[derive(Clone)]
pub struct Document {
    library: Library,
    id: String,
    metadata_cache: Arc<TtlCache<(), Arc<DocumentMetaData>>>,
}

impl Document {
    pub(crate) fn new(library: Library, id: impl Into<String>) -> Self {
        Self {
            library,
            id: id.into(),
            metadata_cache: Arc::new(TtlCache::new("document-metadata", 2, METADATA_TTL)),
        }
    }

    /// Returns the document id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the owning library.
    pub fn library(&self) -> &Library {
        &self.library
    }

    fn store(&self) -> &Arc<dyn ObjectStore> {
        self.library.store()
    }

    /// Resolves `artifact` to its full store path.
    ///
    /// Reads metadata only for content without an explicit format.
    pub async fn artifact_path(&self, artifact: Artifact<'_>) -> Result<String> {
        let recorded = if artifact.needs_recorded_format() {
            self.read_metadata().await?.original_format
        } else {
            DocumentFormat::Default
        };
        Ok(self.library.file_path(&artifact.resolve(&self.id, recorded)?))
    }

    async fn write(&self, artifact: Artifact<'_>, content: Bytes) -> Result<()> {
        let path = self.artifact_path(artifact).await?;
        self.store().write(&path, content).await
    }

    async fn read(&self, artifact: Artifact<'_>) -> Result<Bytes> {
        let path = self.artifact_path(artifact).await?;
        self.store().read(&path).await
    }

    async fn read_optional(&self, artifact: Artifact<'_>) -> Result<Option<Bytes>> {
        match self.read(artifact).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Replaces `metadata.json` and drops the cached copy.
    pub async fn write_metadata(&self, metadata: &DocumentMetaData) -> Result<()> {
        let content = serde_json::to_vec(metadata)?;
        self.write(Artifact::Metadata, Bytes::from(content)).await?;
        self.metadata_cache.invalidate_all();
        Ok(())
    }

    /// Reads `metadata.json`, served from cache when fresh.
    pub async fn read_metadata(&self) -> Result<Arc<DocumentMetaData>> {
        self.metadata_cache
            .get_or_try_populate((), || async {
                let path = self
                    .library
                    .file_path(&Artifact::Metadata.resolve(&self.id, DocumentFormat::Default)?);
                let content = self.store().read(&path).await?;
                let metadata: DocumentMetaData = serde_json::from_slice(&content)?;
                Ok(Arc::new(metadata))
            })
            .await
    }

    /// Stores the primary content, in `format` or the recorded format.
    pub async fn write_document(&self, content: Bytes, format: Option<DocumentFormat>) -> Result<()> {
        self.write(Artifact::Content { format }, content).await
    }

    /// Reads the primary content, in `format` or the recorded format.
    pub async fn read_document(&self, format: Option<DocumentFormat>) -> Result<Bytes> {
        self.read(Artifact::Content { format }).await
    }

    /// Reads the primary content and saves it to `local_path`.
    pub async fn read_document_to(
        &self,
        local_path: impl AsRef<Path>,
        format: Option<DocumentFormat>,
    ) -> Result<Bytes> {
        let content = self.read_document(format).await?;
        let local_path = local_path.as_ref();
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local_path, &content).await?;

        tracing::debug!(
            target: TRACING_TARGET_DOCUMENT,
            document = %self.id,
            local_path = %local_path.display(),
            "Content saved locally"
        );
        Ok(content)
    }

    /// Stores the extracted section boundaries as an opaque JSON blob.
    pub async fn write_sections(&self, content: Bytes) -> Result<()> {
        self.write(Artifact::Sections, content).await
    }

    /// Reads the raw `sections.json` blob.
    pub async fn read_sections(&self) -> Result<Bytes> {
        self.read(Artifact::Sections).await
    }

    /// Parses `sections.json` as a list of sections.
    pub async fn read_section_list(&self) -> Result<Vec<DocumentSection>> {
        let content = self.read_sections().await?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// Overwrites the saved state of `pipeline`.
    pub async fn write_pipeline_state(&self, pipeline: &str, content: Bytes) -> Result<()> {
        self.write(Artifact::pipeline(pipeline, PIPELINE_STATE_FILE), content)
            .await
    }

    /// Reads a pipeline's saved state, `None` if the pipeline never ran.
    pub async fn read_pipeline_state(&self, pipeline: &str) -> Result<Option<Bytes>> {
        self.read_optional(Artifact::pipeline(pipeline, PIPELINE_STATE_FILE))
            .await
    }

    /// Stores `file` for `task`, overwriting an earlier version.
    pub async fn write_task_file(&self, task: &str, file: &str, content: Bytes) -> Result<()> {
        self.write(Artifact::task(task, file), content).await
    }

    /// Reads a task file, `None` if it does not exist.
    pub async fn read_task_file(&self, task: &str, file: &str) -> Result<Option<Bytes>> {
        self.read_optional(Artifact::task(task, file)).await
    }

    /// Writes a supporting blob, then records it in the parent metadata.
    ///
    /// The metadata update is a read-modify-write: callers must not run two
    /// supporting writes for the same document concurrently.
    pub async fn write_supporting_document(
        &self,
        mut supporting: DocumentSupportingMetadata,
        name: &str,
        content: Bytes,
    ) -> Result<DocumentMetaData> {
        self.write(Artifact::supporting(name), content).await?;

        let mut metadata = Arc::unwrap_or_clone(self.read_metadata().await?);
        supporting.create_ts = epoch_seconds();
        metadata
            .supportings
            .insert(supporting.name.clone(), supporting);
        self.write_metadata(&metadata).await?;
        Ok(metadata)
    }

    /// Reads the blob of supporting file `name`.
    pub async fn read_supporting_document(&self, name: &str) -> Result<Bytes> {
        self.read(Artifact::supporting(name)).await
    }

    /// Publishes an artifact and returns its URL.
    ///
    /// Publishing content records `public_url` in metadata. Publishing a
    /// supporting file records the URL on its `supportings` entry (and as
    /// `thumbnail_url` for the thumbnail); an unrecorded supporting file is
    /// published without touching metadata.
    #[tracing::instrument(name = "document.make_public", skip(self), fields(document = %self.id))]
    pub async fn make_public(&self, artifact: Artifact<'_>) -> Result<String> {
        let path = self.artifact_path(artifact).await?;
        let url = self.store().make_public(&path).await?;
        tracing::info!(target: TRACING_TARGET_DOCUMENT, path = %path, "Artifact published");

        match artifact {
            Artifact::Content { .. } => {
                let mut metadata = Arc::unwrap_or_clone(self.read_metadata().await?);
                metadata.public_url = Some(url.clone());
                self.write_metadata(&metadata).await?;
            }
            Artifact::Supporting { file } => {
                let mut metadata = Arc::unwrap_or_clone(self.read_metadata().await?);
                match metadata.supportings.get_mut(file) {
                    Some(entry) => {
                        entry.public_url = Some(url.clone());
                        if file == THUMBNAIL_FILE {
                            metadata.thumbnail_url = Some(url.clone());
                        }
                        self.write_metadata(&metadata).await?;
                    }
                    None => {
                        tracing::warn!(
                            target: TRACING_TARGET_DOCUMENT,
                            document = %self.id,
                            file = %file,
                            "Supporting file not in metadata"
                        );
                    }
                }
            }
            _ => {}
        }

        Ok(url)
    }

    /// URL an artifact is (or would be) published at. No metadata side effect.
    pub async fn public_url(&self, artifact: Artifact<'_>) -> Result<String> {
        let path = self.artifact_path(artifact).await?;
        self.store().public_url(&path).await
    }

    /// Store scoped to a task manager's workspace in the owning library.
    pub fn get_task_manager_store(&self, task_manager_name: &str) -> Result<Arc<dyn ObjectStore>> {
        self.library.get_task_manager_store(task_manager_name)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("library", &self.library.id())
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use lexvault_core::ErrorKind;
    use lexvault_storage::LocalStore;

    use super::*;

    async fn document() -> (tempfile::TempDir, Document) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
        let library = Library::new("judgements", store).unwrap();
        let mut metadata = DocumentMetaData::new("State v. Rao", "rao.pdf", DocumentFormat::Pdf);
        metadata.id = "rao".into();
        let document = library
            .add_document(metadata, Bytes::from_static(b"%PDF"))
            .await
            .unwrap();
        (dir, document)
    }

    #[tokio::test]
    async fn metadata_write_is_visible_immediately() {
        let (_dir, document) = document().await;
        let mut metadata = Arc::unwrap_or_clone(document.read_metadata().await.unwrap());

        metadata.title = "State of Karnataka v. Rao".into();
        metadata.extra_data.insert("court".into(), "HC".into());
        document.write_metadata(&metadata).await.unwrap();

        assert_eq!(*document.read_metadata().await.unwrap(), metadata);
    }

    #[tokio::test]
    async fn cached_metadata_survives_external_changes_until_invalidated() {
        let (_dir, document) = document().await;
        let before = document.read_metadata().await.unwrap();

        let mut changed = (*before).clone();
        changed.title = "changed elsewhere".into();
        document
            .library()
            .store()
            .write(
                "judgements/rao/metadata.json",
                Bytes::from(serde_json::to_vec(&changed).unwrap()),
            )
            .await
            .unwrap();

        assert_eq!(document.read_metadata().await.unwrap().title, before.title);
        let fresh = document.library().get_document("rao");
        assert_eq!(fresh.read_metadata().await.unwrap().title, "changed elsewhere");
    }

    #[tokio::test]
    async fn explicit_format_overrides_recorded_one() {
        let (_dir, document) = document().await;
        document
            .write_document(Bytes::from_static(b"plain text"), Some(DocumentFormat::Text))
            .await
            .unwrap();

        assert_eq!(
            document.read_document(Some(DocumentFormat::Text)).await.unwrap(),
            Bytes::from_static(b"plain text")
        );
        assert_eq!(document.read_document(None).await.unwrap(), Bytes::from_static(b"%PDF"));
    }

    #[tokio::test]
    async fn pipeline_state_is_absent_until_written() {
        let (_dir, document) = document().await;
        assert!(document.read_pipeline_state("ingest").await.unwrap().is_none());

        document
            .write_pipeline_state("ingest", Bytes::from_static(b"{}"))
            .await
            .unwrap();
        assert_eq!(
            document.read_pipeline_state("ingest").await.unwrap(),
            Some(Bytes::from_static(b"{}"))
        );

        let err = document.read_pipeline_state("").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAddressing);
    }

    #[tokio::test]
    async fn task_files_round_trip() {
        let (_dir, document) = document().await;
        assert!(document.read_task_file("review", "response.json").await.unwrap().is_none());
        document
            .write_task_file("review", "response.json", Bytes::from_static(b"ok"))
            .await
            .unwrap();
        assert_eq!(
            document.read_task_file("review", "response.json").await.unwrap(),
            Some(Bytes::from_static(b"ok"))
        );
    }

    #[tokio::test]
    async fn sections_parse_into_typed_list() {
        let (_dir, document) = document().await;
        let metadata = Arc::unwrap_or_clone(document.read_metadata().await.unwrap());
        let sections = vec![DocumentSection {
            section_id: "302".into(),
            section_name: "Punishment for murder".into(),
            start_page: 12,
            metadata,
        }];
        document
            .write_sections(Bytes::from(serde_json::to_vec(&sections).unwrap()))
            .await
            .unwrap();

        assert_eq!(document.read_section_list().await.unwrap(), sections);
    }

    #[tokio::test]
    async fn supporting_write_updates_parent_metadata() {
        let (_dir, document) = document().await;
        let supporting = DocumentSupportingMetadata::new("rao", THUMBNAIL_FILE, "cover.png");

        let metadata = document
            .write_supporting_document(supporting, THUMBNAIL_FILE, Bytes::from_static(b"\x89PNG"))
            .await
            .unwrap();

        let entry = &metadata.supportings[THUMBNAIL_FILE];
        assert!(entry.create_ts > 0.0);
        assert_eq!(document.read_metadata().await.unwrap().supportings.len(), 1);
        assert_eq!(
            document.read_supporting_document(THUMBNAIL_FILE).await.unwrap(),
            Bytes::from_static(b"\x89PNG")
        );
    }

    #[tokio::test]
    async fn publishing_content_records_public_url() {
        let (_dir, document) = document().await;
        let url = document.make_public(Artifact::content()).await.unwrap();

        let metadata = document.read_metadata().await.unwrap();
        assert!(!url.is_empty());
        assert_eq!(metadata.public_url.as_deref(), Some(url.as_str()));
        assert_eq!(document.public_url(Artifact::content()).await.unwrap(), url);
    }

    #[tokio::test]
    async fn publishing_thumbnail_sets_thumbnail_url() {
        let (_dir, document) = document().await;
        let supporting = DocumentSupportingMetadata::new("rao", THUMBNAIL_FILE, "cover.png");
        document
            .write_supporting_document(supporting, THUMBNAIL_FILE, Bytes::from_static(b"png"))
            .await
            .unwrap();

        let url = document
            .make_public(Artifact::supporting(THUMBNAIL_FILE))
            .await
            .unwrap();

        let metadata = document.read_metadata().await.unwrap();
        assert_eq!(metadata.thumbnail_url.as_deref(), Some(url.as_str()));
        assert_eq!(
            metadata.supportings[THUMBNAIL_FILE].public_url.as_deref(),
            Some(url.as_str())
        );
    }

    #[tokio::test]
    async fn publishing_unrecorded_supporting_leaves_metadata_alone() {
        let (_dir, document) = document().await;
        document
            .store()
            .write("judgements/rao/__support__/section.txt", Bytes::from_static(b"s"))
            .await
            .unwrap();
        let before = document.read_metadata().await.unwrap();

        let url = document
            .make_public(Artifact::supporting("section.txt"))
            .await
            .unwrap();

        assert!(!url.is_empty());
        assert_eq!(document.read_metadata().await.unwrap(), before);
    }

    #[tokio::test]
    async fn read_document_to_writes_local_copy() {
        let (dir, document) = document().await;
        let target = dir.path().join("scratch/local.pdf");

        document.read_document_to(&target, None).await.unwrap();
        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"%PDF");
    }
}
