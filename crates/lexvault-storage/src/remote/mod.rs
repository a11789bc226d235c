//! Cloud object storage tier speaking the GCS JSON API.
//!
//! [`RemoteStore`] maps object paths onto `{base_path}/{path}` inside one
//! bucket. Every request runs under the configured [`RetryPolicy`]: only
//! transient failures are retried and a 404 surfaces immediately as
//! not-found. The token and the HTTP pools live in a shared, lazily created
//! session; scoped stores reuse their parent's session and leave closing it
//! to the parent.

mod auth;
mod config;
mod listing;
mod session;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt, stream};
use lexvault_core::{Error, Result};
use reqwest::{RequestBuilder, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use url::Url;

pub use self::auth::{
    AccessToken, CREDENTIAL_REUSE, GcpCredentials, NoAuth, StaticToken, TokenProvider,
};
pub use self::config::{RemoteAuth, RemoteConfig};
use self::listing::{ListKind, ObjectList, Page};
use self::session::Session;
use crate::TRACING_TARGET_REMOTE;
use crate::path::{self, StorageLocation};
use crate::retry::RetryPolicy;
use crate::store::{ListStream, ObjectStore};

// Deletes issued concurrently by a prefix removal.
const REMOVE_CONCURRENCY: usize = 8;

/// Object store backed by a cloud storage bucket.
#[derive(Clone)]
pub struct RemoteStore {
    config: Arc<RemoteConfig>,
    base_path: String,
    endpoint: Url,
    public_base: Url,
    session: Arc<Session>,
    owner: bool,
    cancel: CancellationToken,
}

impl RemoteStore {
    /// Creates a store using the credentials source named in `config`.
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let provider: Arc<dyn TokenProvider> = match &config.auth {
            RemoteAuth::None => Arc::new(NoAuth),
            RemoteAuth::Static { token } => Arc::new(StaticToken::new(token.clone())),
            RemoteAuth::ServiceAccount { path } => {
                Arc::new(GcpCredentials::service_account(&config.bucket, path.clone())?)
            }
            RemoteAuth::ApplicationDefault => {
                Arc::new(GcpCredentials::application_default(&config.bucket)?)
            }
        };
        Self::with_provider(config, provider)
    }

    /// Creates a store with a custom token provider.
    pub fn with_provider(config: RemoteConfig, provider: Arc<dyn TokenProvider>) -> Result<Self> {
        config.validate()?;

        let endpoint = config.endpoint_url()?;
        let public_base = config.public_url_base()?;
        let base_path = config.base_path.trim_matches('/').to_string();
        let session = Arc::new(Session::new(&config, provider));

        tracing::info!(
            target: TRACING_TARGET_REMOTE,
            bucket = %config.bucket,
            base_path = %base_path,
            endpoint = %endpoint,
            "Remote store configured"
        );

        Ok(Self {
            config: Arc::new(config),
            base_path,
            endpoint,
            public_base,
            session,
            owner: true,
            cancel: CancellationToken::new(),
        })
    }

    /// Aborts in-flight retries when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the bucket name.
    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    /// Returns the base path inside the bucket.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    fn retry_policy(&self) -> &RetryPolicy {
        &self.config.retry
    }

    fn full_path(&self, path: &str) -> Result<String> {
        path::validate_relative(path)?;
        Ok(path::join(&self.base_path, path))
    }

    /// Full prefix for listing below `path`, ending in `/` unless it is the bucket root.
    fn list_prefix(&self, path: &str) -> Result<String> {
        let full = self.full_path(path)?;
        Ok(if full.is_empty() { full } else { format!("{full}/") })
    }

    fn api_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        {
            let mut parts = url.path_segments_mut().map_err(|()| {
                Error::configuration().with_message("endpoint cannot carry a path")
            })?;
            parts.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    fn object_url(&self, name: &str) -> Result<Url> {
        self.api_url(&["storage", "v1", "b", self.bucket(), "o", name])
    }

    fn public_url_for(&self, name: &str) -> Result<String> {
        let mut url = self.public_base.clone();
        {
            let mut parts = url.path_segments_mut().map_err(|()| {
                Error::configuration().with_message("public host cannot carry a path")
            })?;
            parts
                .pop_if_empty()
                .push(self.bucket())
                .extend(name.split('/'));
        }
        Ok(url.into())
    }

    /// Sends a request under the retry policy and hands the successful
    /// response to `handle`.
    ///
    /// `build` is called once per attempt so that bodies are re-sent.
    async fn call<T, B, H, Fut>(&self, op: &'static str, path: &str, build: B, handle: H) -> Result<T>
    where
        B: Fn(&reqwest::Client) -> RequestBuilder + Send + Sync,
        H: Fn(Response) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let (build, handle) = (&build, &handle);
        self.retry_policy()
            .retry(&self.cancel, move || async move {
                let http = self.session.http()?;
                let mut request = build(&http);
                if let Some(token) = self.session.bearer().await? {
                    request = request.bearer_auth(token);
                }

                let response = request.send().await.map_err(|err| {
                    Error::transient()
                        .with_message(format!("{op} {path}: request failed"))
                        .with_source(err)
                })?;

                let response = self.check_status(op, path, response).await?;
                handle(response).await
            })
            .await
    }

    async fn check_status(&self, op: &'static str, path: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(Error::not_found(path));
        }

        let body = response.text().await.unwrap_or_default();
        Err(self.reject(op, path, status, &body).await)
    }

    /// Turns a failed response into an error, dropping the cached token
    /// first when the server refused it.
    async fn reject(&self, op: &'static str, path: &str, status: StatusCode, body: &str) -> Error {
        if status == StatusCode::UNAUTHORIZED {
            tracing::debug!(target: TRACING_TARGET_REMOTE, op, "Token rejected, refreshing");
            self.session.invalidate_token().await;
        }
        status_error(op, path, status, body)
    }

    async fn read_body(response: Response) -> Result<Bytes> {
        response.bytes().await.map_err(|err| {
            Error::transient()
                .with_message("connection dropped while reading body")
                .with_source(err)
        })
    }

    async fn list_page(&self, prefix: &str, kind: ListKind, cursor: Option<String>) -> Result<Page> {
        let url = self.api_url(&["storage", "v1", "b", self.bucket(), "o"])?;
        let page_size = self.config.page_size().to_string();

        let list = self
            .call(
                "list",
                prefix,
                |http| {
                    let mut query = vec![("prefix", prefix), ("maxResults", page_size.as_str())];
                    if let Some(delimiter) = kind.delimiter() {
                        query.push(("delimiter", delimiter));
                    }
                    if let Some(cursor) = cursor.as_deref() {
                        query.push(("pageToken", cursor));
                    }
                    http.get(url.clone()).query(&query)
                },
                |response| async move {
                    response.json::<ObjectList>().await.map_err(|err| {
                        Error::transient()
                            .with_message("malformed listing response")
                            .with_source(err)
                    })
                },
            )
            .await?;

        Ok(kind.page(prefix, list))
    }

    fn listing<'a>(&'a self, prefix: &'a str, kind: ListKind) -> ListStream<'a> {
        let full = match self.list_prefix(prefix) {
            Ok(full) => full,
            Err(err) => return Box::pin(stream::once(async move { Err::<String, _>(err) })),
        };

        tracing::debug!(
            target: TRACING_TARGET_REMOTE,
            prefix = %full,
            kind = ?kind,
            "Listing objects"
        );

        Box::pin(listing::paginate(self.config.page_size(), move |cursor| {
            let full = full.clone();
            async move { self.list_page(&full, kind, cursor).await }
        }))
    }

    async fn delete_object(&self, name: &str) -> Result<()> {
        let url = self.object_url(name)?;
        let outcome = self
            .call("delete", name, |http| http.delete(url.clone()), |_| async { Ok(()) })
            .await;

        match outcome {
            Err(err) if err.is_not_found() => Ok(()),
            other => other,
        }
    }
}

/// Maps a failed response status: 404 is not-found, anything else transient.
fn status_error(op: &str, path: &str, status: StatusCode, body: &str) -> Error {
    if status == StatusCode::NOT_FOUND {
        return Error::not_found(path);
    }
    let detail: String = body.chars().take(256).collect();
    Error::transient().with_message(format!("{op} {path}: {status} {detail}"))
}

impl fmt::Debug for RemoteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStore")
            .field("bucket", &self.config.bucket)
            .field("base_path", &self.base_path)
            .field("endpoint", &self.endpoint.as_str())
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ObjectStore for RemoteStore {
    #[tracing::instrument(name = "remote.write", skip(self, data), fields(size = data.len()))]
    async fn write(&self, path: &str, data: Bytes) -> Result<()> {
        let name = self.full_path(path)?;
        if name.is_empty() {
            return Err(Error::invalid_input().with_message("cannot write to the bucket root"));
        }
        let url = self.api_url(&["upload", "storage", "v1", "b", self.bucket(), "o"])?;

        self.call(
            "write",
            path,
            |http| {
                http.post(url.clone())
                    .query(&[("uploadType", "media"), ("name", name.as_str())])
                    .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                    .body(data.clone())
            },
            |_| async { Ok(()) },
        )
        .await
    }

    #[tracing::instrument(name = "remote.read", skip(self))]
    async fn read(&self, path: &str) -> Result<Bytes> {
        let url = self.object_url(&self.full_path(path)?)?;
        let data = self
            .call(
                "read",
                path,
                |http| http.get(url.clone()).query(&[("alt", "media")]),
                Self::read_body,
            )
            .await?;

        tracing::debug!(
            target: TRACING_TARGET_REMOTE,
            path = %path,
            size = data.len(),
            "Object downloaded"
        );
        Ok(data)
    }

    fn list<'a>(&'a self, prefix: &'a str) -> ListStream<'a> {
        self.listing(prefix, ListKind::Files)
    }

    fn list_subfolders<'a>(&'a self, prefix: &'a str) -> ListStream<'a> {
        self.listing(prefix, ListKind::Folders)
    }

    fn list_all_files_recursive<'a>(&'a self, prefix: &'a str) -> ListStream<'a> {
        self.listing(prefix, ListKind::Recursive)
    }

    #[tracing::instrument(name = "remote.make_public", skip(self))]
    async fn make_public(&self, path: &str) -> Result<String> {
        let name = self.full_path(path)?;
        let url = self.api_url(&["storage", "v1", "b", self.bucket(), "o", &name, "acl"])?;
        let grant = serde_json::json!({ "entity": "allUsers", "role": "READER" });

        self.call(
            "make_public",
            path,
            |http| http.post(url.clone()).json(&grant),
            |_| async { Ok(()) },
        )
        .await?;

        self.public_url_for(&name)
    }

    async fn public_url(&self, path: &str) -> Result<String> {
        self.public_url_for(&self.full_path(path)?)
    }

    #[tracing::instrument(name = "remote.exists", skip(self))]
    async fn exists(&self, path: &str) -> Result<bool> {
        let url = self.object_url(&self.full_path(path)?)?;
        let outcome = self
            .call("exists", path, |http| http.get(url.clone()), |_| async { Ok(()) })
            .await;

        match outcome {
            Ok(()) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    #[tracing::instrument(name = "remote.remove", skip(self))]
    async fn remove(&self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(Error::invalid_input().with_message("refusing to remove the bucket root"));
        }

        let name = self.full_path(path)?;
        let nested_prefix = self.list_prefix(path)?;
        let nested: Vec<String> = self
            .listing(path, ListKind::Recursive)
            .map_ok(|relative| format!("{nested_prefix}{relative}"))
            .try_collect()
            .await?;

        tracing::debug!(
            target: TRACING_TARGET_REMOTE,
            path = %path,
            objects = nested.len() + 1,
            "Removing objects"
        );

        stream::iter(nested.into_iter().chain(std::iter::once(name)))
            .map(Ok::<_, Error>)
            .try_for_each_concurrent(REMOVE_CONCURRENCY, |object| async move {
                self.delete_object(&object).await
            })
            .await
    }

    #[tracing::instrument(name = "remote.copy", skip(self))]
    async fn copy(&self, path: &str, dest_bucket: &str, dest_path: &str) -> Result<()> {
        let source = self.full_path(path)?;
        path::validate_relative(dest_path)?;
        let dest_bucket = if dest_bucket.is_empty() { self.bucket() } else { dest_bucket };
        let url = self.api_url(&[
            "storage", "v1", "b", self.bucket(), "o", &source, "copyTo", "b", dest_bucket, "o",
            dest_path,
        ])?;

        self.call(
            "copy",
            path,
            |http| http.post(url.clone()).json(&serde_json::json!({})),
            |_| async { Ok(()) },
        )
        .await
    }

    fn new_scoped_store(&self, sub_path: &str) -> Result<Arc<dyn ObjectStore>> {
        path::validate_relative(sub_path)?;
        Ok(Arc::new(Self {
            base_path: path::join(&self.base_path, sub_path),
            owner: false,
            ..self.clone()
        }))
    }

    fn location(&self, path: &str) -> StorageLocation {
        StorageLocation::new(self.bucket(), path::join(&self.base_path, path))
    }

    async fn shutdown(&self) {
        if !self.owner {
            tracing::trace!(
                target: TRACING_TARGET_REMOTE,
                base_path = %self.base_path,
                "Scoped store leaves shutdown to its parent"
            );
            return;
        }
        self.session.close().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use lexvault_core::ErrorKind;

    use super::*;

    /// Hands out a new token on every fetch and counts the fetches.
    #[derive(Debug, Default)]
    struct CountingToken {
        fetches: AtomicU32,
    }

    #[async_trait]
    impl TokenProvider for CountingToken {
        async fn fetch(&self, _http: &reqwest::Client) -> Result<Option<AccessToken>> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Some(AccessToken::new(format!("token-{n}"))))
        }
    }

    #[derive(Debug)]
    struct NoCredentials;

    #[async_trait]
    impl TokenProvider for NoCredentials {
        async fn fetch(&self, _http: &reqwest::Client) -> Result<Option<AccessToken>> {
            Err(Error::authentication().with_message("no credentials on this host"))
        }
    }

    fn store() -> RemoteStore {
        RemoteStore::new(
            RemoteConfig::new("legal-docs")
                .with_base_path("prod")
                .with_auth(RemoteAuth::None),
        )
        .unwrap()
    }

    #[test]
    fn object_urls_encode_the_full_name() {
        let store = store();
        let url = store.object_url("prod/lib/doc/metadata.json").unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/legal-docs/o/prod%2Flib%2Fdoc%2Fmetadata.json"
        );
    }

    #[tokio::test]
    async fn public_urls_are_deterministic() {
        let store = store();
        assert_eq!(
            store.public_url("lib/doc/doc 1.pdf").await.unwrap(),
            "https://storage.googleapis.com/legal-docs/prod/lib/doc/doc%201.pdf"
        );
    }

    #[test]
    fn emulator_endpoint_is_used() {
        let store = RemoteStore::new(
            RemoteConfig::new("b")
                .with_endpoint("http://127.0.0.1:4443")
                .with_auth(RemoteAuth::None),
        )
        .unwrap();
        assert_eq!(
            store.object_url("x").unwrap().as_str(),
            "http://127.0.0.1:4443/storage/v1/b/b/o/x"
        );
    }

    #[test]
    fn listing_prefixes() {
        let store = store();
        assert_eq!(store.list_prefix("lib").unwrap(), "prod/lib/");
        assert_eq!(store.list_prefix("").unwrap(), "prod/");

        let root = RemoteStore::new(RemoteConfig::new("b").with_auth(RemoteAuth::None)).unwrap();
        assert_eq!(root.list_prefix("").unwrap(), "");
    }

    #[tokio::test]
    async fn scoped_store_extends_base_path_and_shares_session() {
        let store = store();
        let scoped = store.new_scoped_store("lib/__tasks__/review").unwrap();
        assert_eq!(
            scoped.location("request.json").to_string(),
            "legal-docs/prod/lib/__tasks__/review/request.json"
        );

        // Closing a scope leaves the parent usable.
        scoped.shutdown().await;
        assert!(store.session.http().is_ok());
    }

    #[tokio::test]
    async fn calls_after_shutdown_fail_closed() {
        let store = store();
        store.shutdown().await;
        store.shutdown().await;

        let err = store.read("lib/doc/metadata.json").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Closed);
    }

    #[test]
    fn only_not_found_escapes_the_retry_loop() {
        let err = status_error("read", "lib/doc.pdf", StatusCode::NOT_FOUND, "");
        assert!(err.is_not_found());
        assert!(!err.is_retryable());

        for status in [
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::UNAUTHORIZED,
            StatusCode::FORBIDDEN,
        ] {
            let err = status_error("read", "lib/doc.pdf", status, "backend error");
            assert_eq!(err.kind(), ErrorKind::Transient, "{status}");
        }
    }

    #[test]
    fn error_detail_is_truncated() {
        let body = "x".repeat(4096);
        let err = status_error("write", "a", StatusCode::BAD_GATEWAY, &body);
        assert!(err.to_string().len() < 512);
    }

    #[tokio::test]
    async fn unauthorized_drops_the_cached_token() {
        let provider = Arc::new(CountingToken::default());
        let store = RemoteStore::with_provider(RemoteConfig::new("legal-docs"), provider.clone())
            .unwrap();

        assert_eq!(store.session.bearer().await.unwrap().as_deref(), Some("token-1"));
        assert_eq!(store.session.bearer().await.unwrap().as_deref(), Some("token-1"));

        let err = store
            .reject("read", "lib/x", StatusCode::SERVICE_UNAVAILABLE, "")
            .await;
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(store.session.bearer().await.unwrap().as_deref(), Some("token-1"));

        let err = store.reject("read", "lib/x", StatusCode::UNAUTHORIZED, "").await;
        assert!(err.is_retryable());
        assert_eq!(store.session.bearer().await.unwrap().as_deref(), Some("token-2"));
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_credentials_fail_without_retrying() {
        let store =
            RemoteStore::with_provider(RemoteConfig::new("legal-docs"), Arc::new(NoCredentials))
                .unwrap();
        assert_eq!(store.retry_policy().max_attempts, None);

        let err = tokio::time::timeout(Duration::from_secs(5), store.read("lib/x"))
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn invalid_paths_never_reach_the_network() {
        let store = store();
        let err = store.read("../secret").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
