//! Convenience re-exports for collection consumers.

pub use crate::collection::DocumentCollection;
pub use crate::repository::DocumentRepository;
pub use crate::source::SourceFile;
