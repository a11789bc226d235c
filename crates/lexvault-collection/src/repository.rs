//! Factory for document collections over a local and a remote tier.

use std::sync::Arc;

use lexvault_core::Result;
use lexvault_storage::{LocalStore, ObjectStore, path};

use crate::TRACING_TARGET_COLLECTION;
use crate::collection::DocumentCollection;

/// Hands out collections that stage on `local` and mirror to `remote`.
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    local: LocalStore,
    remote: Arc<dyn ObjectStore>,
}

impl DocumentRepository {
    /// Stages collections below `local` and mirrors them to `remote`.
    pub fn new(local: LocalStore, remote: Arc<dyn ObjectStore>) -> Self {
        Self { local, remote }
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    pub fn remote(&self) -> &Arc<dyn ObjectStore> {
        &self.remote
    }

    /// Allocates a fresh collection id and its local staging directory.
    pub async fn new_collection(&self) -> Result<DocumentCollection> {
        let id = uuid::Uuid::new_v4().to_string();
        tokio::fs::create_dir_all(self.local.file_path(&id)?).await?;

        tracing::info!(target: TRACING_TARGET_COLLECTION, collection = %id, "Collection created");
        Ok(DocumentCollection::new(id, self.local.clone(), self.remote.clone()))
    }

    /// Reopens an existing collection. No I/O.
    pub fn get_collection(&self, id: &str) -> Result<DocumentCollection> {
        path::validate_segment(id)?;
        Ok(DocumentCollection::new(
            id.to_string(),
            self.local.clone(),
            self.remote.clone(),
        ))
    }

    /// Releases the remote store's network resources.
    pub async fn shutdown(&self) {
        self.remote.shutdown().await;
    }
}
