//! Remote tier configuration.

use std::fmt;
use std::time::Duration;

use lexvault_core::{Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::retry::RetryPolicy;

// Default values
const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";
const DEFAULT_PAGE_SIZE: usize = 100;
const DEFAULT_MAX_IDLE_CONNECTIONS: usize = 128;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// How the remote tier obtains bearer tokens.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteAuth {
    /// Send requests unauthenticated (emulators, public buckets).
    None,
    /// Send a fixed, caller-provided access token.
    Static {
        /// The bearer token.
        token: String,
    },
    /// Use the service account key file at `path`.
    ServiceAccount {
        /// Path of the JSON key file.
        path: String,
    },
    /// Application default credentials, ending at the instance metadata server.
    #[default]
    ApplicationDefault,
}

impl fmt::Debug for RemoteAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Static { .. } => f.debug_struct("Static").field("token", &"***").finish(),
            Self::ServiceAccount { path } => {
                f.debug_struct("ServiceAccount").field("path", path).finish()
            }
            Self::ApplicationDefault => f.write_str("ApplicationDefault"),
        }
    }
}

/// Configuration for a [`RemoteStore`](super::RemoteStore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Bucket holding every object of this store.
    pub bucket: String,
    /// Path inside the bucket all object paths are relative to.
    #[serde(default)]
    pub base_path: String,
    /// API endpoint override (emulators).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Host public URLs are built on, defaults to the endpoint.
    #[serde(default)]
    pub public_host: Option<String>,
    /// Results requested per listing page.
    #[serde(default)]
    pub page_size: Option<usize>,
    /// Idle connections kept per host by the shared pool.
    #[serde(default)]
    pub max_idle_connections: Option<usize>,
    /// Per-request timeout in seconds.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Credentials source.
    #[serde(default)]
    pub auth: RemoteAuth,
    /// Backoff applied to transient failures.
    #[serde(skip)]
    pub retry: RetryPolicy,
}

impl RemoteConfig {
    /// Create a configuration for `bucket` with every other setting defaulted.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            base_path: String::new(),
            endpoint: None,
            public_host: None,
            page_size: None,
            max_idle_connections: None,
            request_timeout_secs: None,
            auth: RemoteAuth::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Returns the API endpoint.
    #[inline]
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    /// Returns the listing page size.
    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1)
    }

    /// Returns the idle connection limit.
    #[inline]
    pub fn max_idle_connections(&self) -> usize {
        self.max_idle_connections.unwrap_or(DEFAULT_MAX_IDLE_CONNECTIONS)
    }

    /// Returns the per-request timeout.
    #[inline]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    /// Parses the API endpoint.
    pub fn endpoint_url(&self) -> Result<Url> {
        parse_base(self.endpoint())
    }

    /// Parses the host public URLs are built on.
    pub fn public_url_base(&self) -> Result<Url> {
        parse_base(self.public_host.as_deref().unwrap_or(self.endpoint()))
    }

    /// Set the base path inside the bucket.
    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Set the API endpoint, usually an emulator address.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the public URL host.
    #[must_use]
    pub fn with_public_host(mut self, host: impl Into<String>) -> Self {
        self.public_host = Some(host.into());
        self
    }

    /// Set the listing page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Authenticate with a fixed bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth = RemoteAuth::Static {
            token: token.into(),
        };
        self
    }

    /// Set the credentials source.
    #[must_use]
    pub fn with_auth(mut self, auth: RemoteAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(Error::configuration().with_message("bucket name cannot be empty"));
        }
        if self.bucket.contains('/') {
            return Err(Error::configuration()
                .with_message(format!("bucket name '{}' must not contain '/'", self.bucket)));
        }
        crate::path::validate_relative(self.base_path.trim_matches('/'))?;
        self.endpoint_url()?;
        self.public_url_base()?;
        Ok(())
    }
}

fn parse_base(raw: &str) -> Result<Url> {
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    let url = Url::parse(&with_scheme).map_err(|err| {
        Error::configuration()
            .with_message(format!("invalid endpoint '{raw}'"))
            .with_source(err)
    })?;

    if url.cannot_be_a_base() {
        return Err(Error::configuration().with_message(format!("endpoint '{raw}' is not a base URL")));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RemoteConfig::new("legal-docs");
        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(config.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(config.auth, RemoteAuth::ApplicationDefault);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn emulator_host_without_scheme() {
        let config = RemoteConfig::new("b").with_endpoint("localhost:4443");
        assert_eq!(config.endpoint_url().unwrap().as_str(), "http://localhost:4443/");
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(RemoteConfig::new("").validate().is_err());
        assert!(RemoteConfig::new("a/b").validate().is_err());
        assert!(RemoteConfig::new("b").with_base_path("x/../y").validate().is_err());
    }

    #[test]
    fn token_is_redacted() {
        let config = RemoteConfig::new("b").with_token("secret-token");
        assert!(!format!("{config:?}").contains("secret-token"));
    }
}
