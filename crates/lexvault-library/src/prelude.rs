//! Convenience re-exports for library consumers.

pub use crate::artifact::Artifact;
pub use crate::document::Document;
pub use crate::library::{Catalog, Library};
pub use crate::metadata::{
    DocumentFormat, DocumentMetaData, DocumentSection, DocumentSupportingMetadata,
};
pub use crate::pipeline::{
    DocumentPipeline, DocumentProcess, PipelineManager, PipelineStatus, ProcessOutcome,
    TaskManager,
};
