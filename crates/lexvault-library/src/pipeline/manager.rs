//! Registry of task managers and named pipelines.

use std::collections::HashMap;
use std::sync::Arc;

use lexvault_core::{Error, Result};

use super::process::{DocumentPipeline, PipelineRun};
use super::task::TaskManager;
use crate::TRACING_TARGET_PIPELINE;
use crate::document::Document;

/// Holds the task managers and pipelines available to an application.
#[derive(Debug, Clone, Default)]
pub struct PipelineManager {
    task_managers: HashMap<String, Arc<dyn TaskManager>>,
    pipelines: HashMap<String, Arc<DocumentPipeline>>,
}

impl PipelineManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task manager under its own name, replacing any previous one.
    pub fn register_task_manager(&mut self, task_manager: Arc<dyn TaskManager>) {
        let name = task_manager.name().to_string();
        tracing::debug!(target: TRACING_TARGET_PIPELINE, task_manager = %name, "Task manager registered");
        self.task_managers.insert(name, task_manager);
    }

    /// Looks up a task manager by name.
    pub fn get_task_manager(&self, name: &str) -> Option<Arc<dyn TaskManager>> {
        self.task_managers.get(name).cloned()
    }

    /// Registers a pipeline under its own name, replacing any previous one.
    pub fn register_pipeline(&mut self, pipeline: DocumentPipeline) {
        let name = pipeline.name().to_string();
        tracing::debug!(target: TRACING_TARGET_PIPELINE, pipeline = %name, "Pipeline registered");
        self.pipelines.insert(name, Arc::new(pipeline));
    }

    /// Looks up a pipeline by name.
    pub fn get_pipeline(&self, name: &str) -> Option<Arc<DocumentPipeline>> {
        self.pipelines.get(name).cloned()
    }

    /// Runs the pipeline registered as `pipeline` on `document`.
    pub async fn run(&self, pipeline: &str, document: &Document) -> Result<PipelineRun> {
        let Some(registered) = self.get_pipeline(pipeline) else {
            return Err(Error::invalid_input()
                .with_message(format!("no pipeline registered as '{pipeline}'")));
        };
        registered.run(document).await
    }
}
