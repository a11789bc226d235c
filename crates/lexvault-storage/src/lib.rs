#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod local;
mod null;
pub mod path;
mod remote;
mod retry;
mod store;

#[doc(hidden)]
pub mod prelude;

pub use config::{BackendKind, StorageConfig};
pub use local::LocalStore;
pub use null::NullStore;
pub use path::StorageLocation;
pub use remote::{
    AccessToken, CREDENTIAL_REUSE, GcpCredentials, NoAuth, RemoteAuth, RemoteConfig,
    RemoteStore, StaticToken, TokenProvider,
};
pub use retry::RetryPolicy;
pub use store::{ListStream, ObjectStore};

/// Tracing target for the local filesystem store.
pub const TRACING_TARGET_LOCAL: &str = "lexvault_storage::local";

/// Tracing target for the null store.
pub const TRACING_TARGET_NULL: &str = "lexvault_storage::null";

/// Tracing target for the remote store and its session.
pub const TRACING_TARGET_REMOTE: &str = "lexvault_storage::remote";

/// Tracing target for retry decisions.
pub const TRACING_TARGET_RETRY: &str = "lexvault_storage::retry";
