//! Storage tier selection.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

#[cfg(feature = "config")]
use clap::{Args, ValueEnum};
use lexvault_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::local::LocalStore;
use crate::null::NullStore;
use crate::remote::{RemoteAuth, RemoteConfig, RemoteStore};
use crate::retry::RetryPolicy;
use crate::store::ObjectStore;

/// Which object store implementation to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Directory on the local filesystem.
    #[default]
    Local,
    /// Cloud object storage bucket.
    Remote,
    /// Discard writes, read nothing.
    Null,
}

/// Storage configuration, usable as clap arguments with the `config` feature.
#[derive(Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct StorageConfig {
    /// Storage backend
    #[cfg_attr(
        feature = "config",
        arg(
            long = "storage-backend",
            env = "LEXVAULT_STORAGE_BACKEND",
            value_enum,
            default_value_t = BackendKind::Local
        )
    )]
    #[serde(default)]
    pub storage_backend: BackendKind,

    /// Root directory of the local backend
    #[cfg_attr(feature = "config", arg(long = "local-root", env = "LEXVAULT_LOCAL_ROOT"))]
    #[serde(default)]
    pub local_root: Option<PathBuf>,

    /// Bucket of the remote backend
    #[cfg_attr(feature = "config", arg(long = "bucket", env = "LEXVAULT_BUCKET"))]
    #[serde(default)]
    pub bucket: Option<String>,

    /// Path inside the bucket every object lives under
    #[cfg_attr(feature = "config", arg(long = "base-path", env = "LEXVAULT_BASE_PATH"))]
    #[serde(default)]
    pub base_path: Option<String>,

    /// Storage API endpoint override (emulator address)
    #[cfg_attr(
        feature = "config",
        arg(long = "storage-endpoint", env = "STORAGE_EMULATOR_HOST")
    )]
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Static bearer token, takes precedence over a service account
    #[cfg_attr(
        feature = "config",
        arg(long = "access-token", env = "LEXVAULT_ACCESS_TOKEN", hide_env_values = true)
    )]
    #[serde(default)]
    pub access_token: Option<String>,

    /// Service account key file; application default credentials are used when unset
    #[cfg_attr(
        feature = "config",
        arg(long = "service-account", env = "LEXVAULT_SERVICE_ACCOUNT")
    )]
    #[serde(default)]
    pub service_account: Option<PathBuf>,

    /// Retries per request on transient failures (unbounded when unset)
    #[cfg_attr(feature = "config", arg(long = "max-retries", env = "LEXVAULT_MAX_RETRIES"))]
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Results per listing page
    #[cfg_attr(feature = "config", arg(long = "page-size", env = "LEXVAULT_PAGE_SIZE"))]
    #[serde(default)]
    pub page_size: Option<usize>,
}

const DEFAULT_LOCAL_ROOT: &str = "./lexvault-data";

impl StorageConfig {
    /// Configuration for a local store rooted at `root`.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            storage_backend: BackendKind::Local,
            local_root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Configuration for a remote store on `bucket`.
    pub fn remote(bucket: impl Into<String>) -> Self {
        Self {
            storage_backend: BackendKind::Remote,
            bucket: Some(bucket.into()),
            ..Self::default()
        }
    }

    /// Returns the local root, using the default if not set.
    pub fn local_root(&self) -> PathBuf {
        self.local_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_ROOT))
    }

    /// Builds the local store described by this configuration.
    pub fn local_store(&self) -> LocalStore {
        LocalStore::new(self.local_root())
    }

    /// Derives the remote tier configuration.
    pub fn remote_config(&self) -> Result<RemoteConfig> {
        let bucket = self.bucket.clone().ok_or_else(|| {
            Error::configuration().with_message("a bucket is required for the remote backend")
        })?;

        let auth = match (&self.access_token, &self.service_account, &self.endpoint) {
            (Some(token), _, _) => RemoteAuth::Static {
                token: token.clone(),
            },
            (None, Some(key), _) => RemoteAuth::ServiceAccount {
                path: key.to_string_lossy().into_owned(),
            },
            (None, None, Some(_)) => RemoteAuth::None,
            (None, None, None) => RemoteAuth::ApplicationDefault,
        };

        let retry = match self.max_retries {
            Some(max) => RetryPolicy::bounded(max),
            None => RetryPolicy::default(),
        };

        let mut config = RemoteConfig::new(bucket)
            .with_base_path(self.base_path.clone().unwrap_or_default())
            .with_auth(auth)
            .with_retry(retry);
        if let Some(endpoint) = &self.endpoint {
            config = config.with_endpoint(endpoint.clone());
        }
        if let Some(page_size) = self.page_size {
            config = config.with_page_size(page_size);
        }

        config.validate()?;
        Ok(config)
    }

    /// Builds the configured store.
    pub fn build(&self) -> Result<Arc<dyn ObjectStore>> {
        let store: Arc<dyn ObjectStore> = match self.storage_backend {
            BackendKind::Local => Arc::new(self.local_store()),
            BackendKind::Null => Arc::new(NullStore::new()),
            BackendKind::Remote => Arc::new(RemoteStore::new(self.remote_config()?)?),
        };
        Ok(store)
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("storage_backend", &self.storage_backend)
            .field("local_root", &self.local_root)
            .field("bucket", &self.bucket)
            .field("base_path", &self.base_path)
            .field("endpoint", &self.endpoint)
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("service_account", &self.service_account)
            .field("max_retries", &self.max_retries)
            .field("page_size", &self.page_size)
            .finish()
    }
}
