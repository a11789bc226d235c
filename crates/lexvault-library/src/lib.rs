#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod artifact;
mod document;
mod library;
mod metadata;
pub mod pipeline;

#[doc(hidden)]
pub mod prelude;

pub use artifact::{Artifact, PIPELINE_STATE_FILE, THUMBNAIL_FILE};
pub use document::Document;
pub use library::{Catalog, Library, RESERVED_PREFIX};
pub use metadata::{DocumentFormat, DocumentMetaData, DocumentSection, DocumentSupportingMetadata};

/// Tracing target for catalog and document lifecycle events.
pub const TRACING_TARGET_LIBRARY: &str = "lexvault_library::library";

/// Tracing target for per-document artifact operations.
pub const TRACING_TARGET_DOCUMENT: &str = "lexvault_library::document";

/// Tracing target for pipeline runs and task managers.
pub const TRACING_TARGET_PIPELINE: &str = "lexvault_library::pipeline";
