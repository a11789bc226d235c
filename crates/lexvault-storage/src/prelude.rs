//! Convenience re-exports for storage consumers.

pub use crate::config::{BackendKind, StorageConfig};
pub use crate::local::LocalStore;
pub use crate::null::NullStore;
pub use crate::path::StorageLocation;
pub use crate::remote::{RemoteConfig, RemoteStore};
pub use crate::retry::RetryPolicy;
pub use crate::store::{ListStream, ObjectStore};
