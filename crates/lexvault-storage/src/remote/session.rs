//! Lazily created network resources shared by a remote store and its scopes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lexvault_core::{Error, Result};
use tokio::sync::Mutex as AsyncMutex;

use super::auth::{AccessToken, TokenProvider};
use super::config::RemoteConfig;
use crate::TRACING_TARGET_REMOTE;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Token, token session and data-plane pool.
///
/// Nothing is created until the first request needs it. After
/// [`close`](Self::close) every accessor fails with
/// [`Closed`](lexvault_core::ErrorKind::Closed).
pub(crate) struct Session {
    provider: Arc<dyn TokenProvider>,
    max_idle_connections: usize,
    request_timeout: std::time::Duration,
    closed: AtomicBool,
    token: AsyncMutex<Option<AccessToken>>,
    token_http: Mutex<Option<reqwest::Client>>,
    http: Mutex<Option<reqwest::Client>>,
}

impl Session {
    pub(crate) fn new(config: &RemoteConfig, provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            max_idle_connections: config.max_idle_connections(),
            request_timeout: config.request_timeout(),
            closed: AtomicBool::new(false),
            token: AsyncMutex::new(None),
            token_http: Mutex::new(None),
            http: Mutex::new(None),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::closed());
        }
        Ok(())
    }

    fn client_in(&self, slot: &Mutex<Option<reqwest::Client>>, purpose: &str) -> Result<reqwest::Client> {
        self.ensure_open()?;
        let mut slot = lock(slot);
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(self.max_idle_connections)
            .timeout(self.request_timeout)
            .build()
            .map_err(|err| {
                Error::configuration()
                    .with_message(format!("failed to build {purpose} HTTP client"))
                    .with_source(err)
            })?;

        tracing::debug!(target: TRACING_TARGET_REMOTE, purpose, "HTTP session created");
        *slot = Some(client.clone());
        Ok(client)
    }

    /// The shared data-plane connection pool.
    pub(crate) fn http(&self) -> Result<reqwest::Client> {
        self.client_in(&self.http, "data")
    }

    /// Returns a valid bearer token, fetching one if none is cached.
    pub(crate) async fn bearer(&self) -> Result<Option<String>> {
        self.ensure_open()?;
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh()) {
            return Ok(Some(token.secret().to_string()));
        }

        let token_http = self.client_in(&self.token_http, "token")?;
        let fetched = self.provider.fetch(&token_http).await?;
        let secret = fetched.as_ref().map(|token| token.secret().to_string());
        if fetched.is_some() {
            tracing::debug!(target: TRACING_TARGET_REMOTE, "Access token refreshed");
        }
        *cached = fetched;
        Ok(secret)
    }

    /// Drops the cached token so the next request fetches a new one.
    pub(crate) async fn invalidate_token(&self) {
        self.token.lock().await.take();
    }

    /// Releases the token, then the token session, then the data pool.
    ///
    /// Safe to call more than once; failures are logged.
    pub(crate) async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            tracing::trace!(target: TRACING_TARGET_REMOTE, "Session already closed");
            return;
        }

        self.token.lock().await.take();
        if let Err(err) = self.provider.close().await {
            tracing::error!(
                target: TRACING_TARGET_REMOTE,
                error = %err,
                "Failed to release access token"
            );
        }

        if lock(&self.token_http).take().is_some() {
            tracing::debug!(target: TRACING_TARGET_REMOTE, "Token session closed");
        }

        if lock(&self.http).take().is_some() {
            tracing::debug!(target: TRACING_TARGET_REMOTE, "Data session closed");
        }

        tracing::info!(target: TRACING_TARGET_REMOTE, "Remote store shut down");
    }

    #[cfg(test)]
    pub(crate) fn is_initialized(&self) -> bool {
        lock(&self.http).is_some()
    }
}
