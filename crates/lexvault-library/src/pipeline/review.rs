//! Pipeline step that waits for a human review.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use lexvault_core::{Error, Result};

use super::process::{DocumentProcess, ProcessOutcome};
use super::task::{RESPONSE_FILE, TaskManager};
use crate::artifact::Artifact;
use crate::document::Document;

/// Hands the document to a [`TaskManager`] and completes once it answers.
///
/// Until a response exists every run (re)submits the task and fails with
/// "awaiting review", so the pipeline records the step as `failed` and picks
/// it up again on the next invocation.
#[derive(Clone)]
pub struct ReviewProcess {
    name: String,
    task: String,
    task_manager: Arc<dyn TaskManager>,
}

impl ReviewProcess {
    /// Creates the step `review:{task}` handing `task` to `task_manager`.
    pub fn new(task: impl Into<String>, task_manager: Arc<dyn TaskManager>) -> Self {
        let task = task.into();
        Self {
            name: format!("review:{task}"),
            task,
            task_manager,
        }
    }

    async fn request(&self, document: &Document) -> Result<Bytes> {
        let metadata = document.read_metadata().await?;
        let request = serde_json::json!({
            "document_id": document.id(),
            "title": metadata.title,
            "task": self.task,
        });
        Ok(Bytes::from(serde_json::to_vec(&request)?))
    }
}

#[async_trait]
impl DocumentProcess for ReviewProcess {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, document: &Document) -> Result<ProcessOutcome> {
        if self.task_manager.response(document, &self.task).await?.is_some() {
            let output = document
                .artifact_path(Artifact::task(&self.task, RESPONSE_FILE))
                .await?;
            return Ok(ProcessOutcome::with_output(output));
        }

        let request = self.request(document).await?;
        self.task_manager
            .submit(document, &self.task, request)
            .await?;
        Err(Error::pipeline_step().with_message("awaiting review"))
    }
}

impl fmt::Debug for ReviewProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewProcess")
            .field("task", &self.task)
            .field("task_manager", &self.task_manager.name())
            .finish()
    }
}
