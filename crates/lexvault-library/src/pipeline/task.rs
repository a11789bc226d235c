//! External task managers that pipelines hand human work to.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use lexvault_core::Result;
use lexvault_storage::path;

use crate::TRACING_TARGET_PIPELINE;
use crate::document::Document;

/// Task file holding the submitted request.
pub const REQUEST_FILE: &str = "request.json";

/// Task file holding the reviewer's answer.
pub const RESPONSE_FILE: &str = "response.json";

/// Capability of an external tool (e.g. a labeling service) that accepts
/// review tasks and eventually answers them.
#[async_trait]
pub trait TaskManager: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Submits `request` as task `task` for `document`. Resubmitting an
    /// already pending task must be harmless.
    async fn submit(&self, document: &Document, task: &str, request: Bytes) -> Result<()>;

    /// The answer to `task`, `None` while it is pending.
    async fn response(&self, document: &Document, task: &str) -> Result<Option<Bytes>>;
}

/// Task manager that keeps everything in the document's own storage.
///
/// Requests and responses are the task files `request.json` and
/// `response.json`; pending tasks are registered as `{doc_id}/{task}` in the
/// library's `__tasks__/{name}` store so the external tool can discover them.
#[derive(Debug, Clone)]
pub struct StoreTaskManager {
    name: String,
}

impl StoreTaskManager {
    /// Creates a task manager registered under `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn registration(document: &Document, task: &str) -> Result<String> {
        path::validate_segment(task)?;
        Ok(path::join(document.id(), task))
    }

    /// Records `response` for `task` and drops its registration.
    pub async fn complete(&self, document: &Document, task: &str, response: Bytes) -> Result<()> {
        document.write_task_file(task, RESPONSE_FILE, response).await?;
        let store = document.get_task_manager_store(&self.name)?;
        store.remove(&Self::registration(document, task)?).await?;

        tracing::info!(
            target: TRACING_TARGET_PIPELINE,
            manager = %self.name,
            document = %document.id(),
            task = %task,
            "Task completed"
        );
        Ok(())
    }
}

#[async_trait]
impl TaskManager for StoreTaskManager {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, document: &Document, task: &str, request: Bytes) -> Result<()> {
        let registration = Self::registration(document, task)?;
        document.write_task_file(task, REQUEST_FILE, request).await?;

        let store = document.get_task_manager_store(&self.name)?;
        let entry = serde_json::json!({
            "library": document.library().id(),
            "document": document.id(),
            "task": task,
        });
        store
            .write(&registration, Bytes::from(serde_json::to_vec(&entry)?))
            .await?;

        tracing::info!(
            target: TRACING_TARGET_PIPELINE,
            manager = %self.name,
            document = %document.id(),
            task = %task,
            "Task submitted"
        );
        Ok(())
    }

    async fn response(&self, document: &Document, task: &str) -> Result<Option<Bytes>> {
        document.read_task_file(task, RESPONSE_FILE).await
    }
}
