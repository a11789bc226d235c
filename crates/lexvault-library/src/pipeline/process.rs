//! Document processes and the pipeline that runs them in order.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use lexvault_core::{Error, Result};

use super::state::{PipelineState, PipelineStatus, ProcessStatus};
use crate::TRACING_TARGET_PIPELINE;
use crate::document::Document;

/// What a successful process leaves behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Path or identifier of the produced output, if any.
    pub output_ref: Option<String>,
}

impl ProcessOutcome {
    /// Outcome pointing at the artifact the process produced.
    pub fn with_output(output_ref: impl Into<String>) -> Self {
        Self {
            output_ref: Some(output_ref.into()),
        }
    }
}

/// One idempotent step of a [`DocumentPipeline`].
#[async_trait]
pub trait DocumentProcess: Send + Sync + fmt::Debug {
    /// Stable name used as the key in the saved state.
    fn name(&self) -> &str;

    /// Whether a failure is recorded and tolerated (`true`) or aborts the run.
    fn recoverable(&self) -> bool {
        true
    }

    async fn execute(&self, document: &Document) -> Result<ProcessOutcome>;
}

/// Result of [`DocumentPipeline::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRun {
    pub status: PipelineStatus,
    pub state: PipelineState,
}

/// Ordered, resumable list of processes.
///
/// State lives at `{doc}/__pipeline__/{name}/state.json` and is saved after
/// every executed step. Completed steps are skipped on later runs; failed
/// ones are executed again.
#[derive(Clone)]
pub struct DocumentPipeline {
    name: String,
    processes: Vec<Arc<dyn DocumentProcess>>,
    continue_on_failure: bool,
}

impl DocumentPipeline {
    /// Creates an empty pipeline; add steps with [`with_process`](Self::with_process).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            processes: Vec::new(),
            continue_on_failure: false,
        }
    }

    /// Appends a step.
    #[must_use]
    pub fn with_process(mut self, process: Arc<dyn DocumentProcess>) -> Self {
        self.processes.push(process);
        self
    }

    /// Keep executing later steps after a recoverable failure.
    #[must_use]
    pub fn continue_on_failure(mut self, enabled: bool) -> Self {
        self.continue_on_failure = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn process_names(&self) -> impl Iterator<Item = &str> {
        self.processes.iter().map(|process| process.name())
    }

    /// Runs every process not yet completed for `document`.
    ///
    /// A recoverable failure is recorded as `failed` with its message. A
    /// non-recoverable one is recorded, saved, and returned as
    /// [`PipelineStep`](lexvault_core::ErrorKind::PipelineStep). Storage
    /// errors while loading or saving state are returned unchanged.
    #[tracing::instrument(
        name = "pipeline.run",
        skip(self, document),
        fields(pipeline = %self.name, document = %document.id())
    )]
    pub async fn run(&self, document: &Document) -> Result<PipelineRun> {
        let mut state = PipelineState::load(document, &self.name).await?;
        state.ensure(self.process_names());

        for process in &self.processes {
            let process_name = process.name();
            if state.status_of(process_name) == ProcessStatus::Completed {
                tracing::debug!(
                    target: TRACING_TARGET_PIPELINE,
                    process = %process_name,
                    "Process already completed, skipping"
                );
                continue;
            }

            match process.execute(document).await {
                Ok(outcome) => {
                    tracing::info!(
                        target: TRACING_TARGET_PIPELINE,
                        process = %process_name,
                        output_ref = ?outcome.output_ref,
                        "Process completed"
                    );
                    state.complete(process_name, outcome.output_ref);
                    state.save(document, &self.name).await?;
                }
                Err(err) if process.recoverable() => {
                    tracing::warn!(
                        target: TRACING_TARGET_PIPELINE,
                        process = %process_name,
                        error = %err,
                        "Process failed"
                    );
                    state.fail(process_name, err.to_string());
                    state.save(document, &self.name).await?;
                    if !self.continue_on_failure {
                        break;
                    }
                }
                Err(err) => {
                    tracing::error!(
                        target: TRACING_TARGET_PIPELINE,
                        process = %process_name,
                        error = %err,
                        "Non-recoverable process failure"
                    );
                    state.fail(process_name, err.to_string());
                    state.save(document, &self.name).await?;
                    return Err(Error::pipeline_step()
                        .with_message(format!(
                            "process '{process_name}' of pipeline '{}' failed",
                            self.name
                        ))
                        .with_source(err));
                }
            }
        }

        let status = state.status_for(self.process_names());
        tracing::info!(target: TRACING_TARGET_PIPELINE, status = %status, "Pipeline finished");
        Ok(PipelineRun { status, state })
    }
}

impl fmt::Debug for DocumentPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentPipeline")
            .field("name", &self.name)
            .field("processes", &self.process_names().collect::<Vec<_>>())
            .field("continue_on_failure", &self.continue_on_failure)
            .finish()
    }
}
