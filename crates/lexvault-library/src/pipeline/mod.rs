//! Resumable per-document pipelines and the task managers they delegate to.

mod manager;
mod process;
mod review;
mod state;
mod task;

pub use manager::PipelineManager;
pub use process::{DocumentPipeline, DocumentProcess, PipelineRun, ProcessOutcome};
pub use review::ReviewProcess;
pub use state::{PipelineState, PipelineStatus, ProcessRecord, ProcessStatus};
pub use task::{REQUEST_FILE, RESPONSE_FILE, StoreTaskManager, TaskManager};
