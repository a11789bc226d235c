#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod collection;
mod repository;
mod source;

#[doc(hidden)]
pub mod prelude;

pub use collection::DocumentCollection;
pub use repository::DocumentRepository;
pub use source::SourceFile;

/// Tracing target for collection staging, mirroring and index files.
pub const TRACING_TARGET_COLLECTION: &str = "lexvault_collection::collection";

/// Tracing target for source file and archive handling.
pub const TRACING_TARGET_SOURCE: &str = "lexvault_collection::source";
