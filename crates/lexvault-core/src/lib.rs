#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for cache population and invalidation.
pub const TRACING_TARGET_CACHE: &str = "lexvault_core::cache";

mod cache;
mod error;

#[doc(hidden)]
pub mod prelude;

pub use cache::TtlCache;
pub use error::{BoxedError, Error, ErrorKind, Result};
