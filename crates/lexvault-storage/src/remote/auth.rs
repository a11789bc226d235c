//! Bearer token providers for the remote tier.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lexvault_core::{Error, Result};
use object_store::gcp::{GcpCredentialProvider, GoogleCloudStorageBuilder};
use object_store::{ClientOptions, CredentialProvider, RetryConfig};

// Refresh tokens slightly before the server-side expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// How long a token handed out by [`GcpCredentials`] is reused.
pub const CREDENTIAL_REUSE: Duration = Duration::from_secs(5 * 60);

const TOKEN_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A bearer token with an optional expiry.
#[derive(Clone)]
pub struct AccessToken {
    value: String,
    expires_at: Option<Instant>,
}

impl AccessToken {
    /// Creates a token that never expires.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }

    /// Creates a token valid for `lifetime` from now.
    pub fn expiring_in(value: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            value: value.into(),
            expires_at: Some(Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN)),
        }
    }

    /// The raw bearer value.
    pub fn secret(&self) -> &str {
        &self.value
    }

    /// Whether the token can still be used.
    pub fn is_fresh(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() < at)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"***")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of bearer tokens.
///
/// `http` is the dedicated token session owned by the store; providers that
/// do not talk to a token endpoint ignore it.
#[async_trait]
pub trait TokenProvider: Send + Sync + fmt::Debug + 'static {
    /// Obtains a token, or `None` to send requests unauthenticated.
    async fn fetch(&self, http: &reqwest::Client) -> Result<Option<AccessToken>>;

    /// Releases provider-held resources. Called once during shutdown.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Sends no credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

#[async_trait]
impl TokenProvider for NoAuth {
    async fn fetch(&self, _http: &reqwest::Client) -> Result<Option<AccessToken>> {
        Ok(None)
    }
}

/// Always returns the same token.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wraps a bearer token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn fetch(&self, _http: &reqwest::Client) -> Result<Option<AccessToken>> {
        Ok(Some(AccessToken::new(self.0.clone())))
    }
}

/// Google credentials resolved by [`object_store`]'s GCP provider.
///
/// Covers service account key files and application default credentials,
/// which fall back to the instance metadata server. The provider caches
/// tokens itself and hands out ones with minutes of validity left, so the
/// session may reuse each for [`CREDENTIAL_REUSE`]. Failures to obtain a
/// token are reported as
/// [`Authentication`](lexvault_core::ErrorKind::Authentication) and never
/// retried by the store.
#[derive(Clone)]
pub struct GcpCredentials {
    provider: GcpCredentialProvider,
}

impl GcpCredentials {
    /// Application default credentials: `GOOGLE_*` environment variables,
    /// the gcloud credentials file, then the metadata server.
    pub fn application_default(bucket: &str) -> Result<Self> {
        Self::build(GoogleCloudStorageBuilder::from_env(), bucket)
    }

    /// Credentials of the service account key file at `path`.
    pub fn service_account(bucket: &str, path: impl Into<String>) -> Result<Self> {
        Self::build(
            GoogleCloudStorageBuilder::new().with_service_account_path(path),
            bucket,
        )
    }

    fn build(builder: GoogleCloudStorageBuilder, bucket: &str) -> Result<Self> {
        // Retries are left to the store's own policy.
        let mut retry = RetryConfig::default();
        retry.max_retries = 0;

        let store = builder
            .with_bucket_name(bucket)
            .with_retry(retry)
            .with_client_options(
                ClientOptions::new()
                    .with_connect_timeout(TOKEN_CONNECT_TIMEOUT)
                    .with_timeout(TOKEN_REQUEST_TIMEOUT),
            )
            .build()
            .map_err(|err| {
                Error::configuration()
                    .with_message("invalid Google Cloud credentials")
                    .with_source(err)
            })?;

        Ok(Self {
            provider: store.credentials().clone(),
        })
    }
}

impl fmt::Debug for GcpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcpCredentials").finish_non_exhaustive()
    }
}

fn credential_error(err: object_store::Error) -> Error {
    Error::authentication()
        .with_message("failed to obtain Google Cloud credentials")
        .with_source(err)
}

#[async_trait]
impl TokenProvider for GcpCredentials {
    async fn fetch(&self, _http: &reqwest::Client) -> Result<Option<AccessToken>> {
        let credential = self.provider.get_credential().await.map_err(credential_error)?;
        Ok(Some(AccessToken::expiring_in(
            credential.bearer.clone(),
            CREDENTIAL_REUSE,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_freshness() {
        assert!(AccessToken::new("t").is_fresh());
        assert!(AccessToken::expiring_in("t", Duration::from_secs(3600)).is_fresh());
        assert!(!AccessToken::expiring_in("t", Duration::from_secs(30)).is_fresh());
    }

    #[test]
    fn secrets_are_redacted() {
        assert!(!format!("{:?}", StaticToken::new("abc123")).contains("abc123"));
        assert!(!format!("{:?}", AccessToken::new("abc123")).contains("abc123"));
    }

    #[test]
    fn credential_failures_are_not_retryable() {
        let err = credential_error(object_store::Error::Generic {
            store: "GCS",
            source: "metadata server unreachable".into(),
        });
        assert_eq!(err.kind(), lexvault_core::ErrorKind::Authentication);
        assert!(!err.is_retryable());
    }

    #[test]
    fn malformed_service_account_key_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("key.json");
        std::fs::write(&key, "not a key").unwrap();

        let err = GcpCredentials::service_account("legal-docs", key.to_string_lossy()).unwrap_err();
        assert_eq!(err.kind(), lexvault_core::ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn static_and_anonymous_providers() {
        let http = reqwest::Client::new();
        let token = StaticToken::new("abc").fetch(&http).await.unwrap().unwrap();
        assert_eq!(token.secret(), "abc");
        assert!(NoAuth.fetch(&http).await.unwrap().is_none());
    }
}
