//! Prelude module for convenient imports.

pub use crate::cache::TtlCache;
pub use crate::error::{BoxedError, Error, ErrorKind, Result};
