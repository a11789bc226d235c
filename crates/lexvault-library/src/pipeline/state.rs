//! Persisted per-pipeline completion state.

use bytes::Bytes;
use lexvault_core::Result;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::document::Document;

/// Lifecycle of one process within a pipeline.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProcessStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

/// Overall outcome of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PipelineStatus {
    Completed,
    Failed,
}

/// Completion record of one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub process_name: String,
    #[serde(default)]
    pub status: ProcessStatus,
    /// Where the process left its output, if anywhere.
    #[serde(default)]
    pub output_ref: Option<String>,
    /// Message of the last failure.
    #[serde(default)]
    pub error: Option<String>,
}

impl ProcessRecord {
    fn pending(process_name: &str) -> Self {
        Self {
            process_name: process_name.to_string(),
            status: ProcessStatus::Pending,
            output_ref: None,
            error: None,
        }
    }
}

/// Ordered process records of one `(document, pipeline)` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineState {
    #[serde(default)]
    pub processes: Vec<ProcessRecord>,
}

impl PipelineState {
    /// Loads the saved state, or an empty one if the pipeline never ran.
    pub async fn load(document: &Document, pipeline: &str) -> Result<Self> {
        match document.read_pipeline_state(pipeline).await? {
            Some(content) => Ok(serde_json::from_slice(&content)?),
            None => Ok(Self::default()),
        }
    }

    /// Overwrites the saved state.
    pub async fn save(&self, document: &Document, pipeline: &str) -> Result<()> {
        let content = serde_json::to_vec(self)?;
        document
            .write_pipeline_state(pipeline, Bytes::from(content))
            .await
    }

    /// The record of `process_name`, if the process ever ran.
    pub fn record(&self, process_name: &str) -> Option<&ProcessRecord> {
        self.processes
            .iter()
            .find(|record| record.process_name == process_name)
    }

    /// Status of `process_name`, `Pending` if it has no record.
    pub fn status_of(&self, process_name: &str) -> ProcessStatus {
        self.record(process_name)
            .map(|record| record.status)
            .unwrap_or_default()
    }

    /// Adds a pending record for every name that has none, keeping order.
    pub(crate) fn ensure<'a>(&mut self, process_names: impl IntoIterator<Item = &'a str>) {
        for name in process_names {
            if self.record(name).is_none() {
                self.processes.push(ProcessRecord::pending(name));
            }
        }
    }

    fn record_mut(&mut self, process_name: &str) -> &mut ProcessRecord {
        let index = match self
            .processes
            .iter()
            .position(|record| record.process_name == process_name)
        {
            Some(index) => index,
            None => {
                self.processes.push(ProcessRecord::pending(process_name));
                self.processes.len() - 1
            }
        };
        &mut self.processes[index]
    }

    pub(crate) fn complete(&mut self, process_name: &str, output_ref: Option<String>) {
        let record = self.record_mut(process_name);
        record.status = ProcessStatus::Completed;
        record.output_ref = output_ref;
        record.error = None;
    }

    pub(crate) fn fail(&mut self, process_name: &str, error: String) {
        let record = self.record_mut(process_name);
        record.status = ProcessStatus::Failed;
        record.output_ref = None;
        record.error = Some(error);
    }

    /// `Completed` only if every listed process has completed.
    pub fn status_for<'a>(&self, process_names: impl IntoIterator<Item = &'a str>) -> PipelineStatus {
        let all_done = process_names
            .into_iter()
            .all(|name| self.status_of(name) == ProcessStatus::Completed);
        if all_done {
            PipelineStatus::Completed
        } else {
            PipelineStatus::Failed
        }
    }
}
