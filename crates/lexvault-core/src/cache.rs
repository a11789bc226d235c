//! Bounded time-to-live cache owned by a single component instance.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use moka::sync::Cache;

use crate::{Result, TRACING_TARGET_CACHE};

/// Size-bounded cache whose entries expire a fixed time after insertion.
///
/// Each owner (a library, a document handle) constructs its own instance;
/// there is no global or cross-instance invalidation. Values are cloned out
/// on every hit, so wrap large values in an `Arc`.
pub struct TtlCache<K, V> {
    inner: Cache<K, V>,
    name: &'static str,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache holding at most `max_capacity` entries for `ttl` each.
    pub fn new(name: &'static str, max_capacity: u64, ttl: Duration) -> Self {
        let inner = Cache::builder()
            .name(name)
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self { inner, name }
    }

    /// Returns the cached value for `key`, if present and not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key)
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    /// Returns the cached value or computes, stores and returns a new one.
    ///
    /// Errors from `populate` are returned as-is and nothing is cached.
    pub async fn get_or_try_populate<F, Fut>(&self, key: K, populate: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(cached) = self.inner.get(&key) {
            tracing::trace!(target: TRACING_TARGET_CACHE, cache = self.name, "Cache hit");
            return Ok(cached);
        }

        tracing::trace!(
            target: TRACING_TARGET_CACHE,
            cache = self.name,
            "Cache miss, populating"
        );

        let value = populate().await?;
        self.inner.insert(key, value.clone());
        Ok(value)
    }

    /// Synchronous variant of [`get_or_try_populate`](Self::get_or_try_populate)
    /// for infallible, cheap constructors.
    pub fn get_or_insert_with(&self, key: K, init: impl FnOnce() -> V) -> V {
        self.inner.get_with(key, init)
    }

    /// Drops the entry for `key`.
    pub fn invalidate(&self, key: &K) {
        self.inner.invalidate(key);
    }

    /// Drops every entry.
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
        tracing::debug!(target: TRACING_TARGET_CACHE, cache = self.name, "Cache cleared");
    }

    /// Returns the cache name used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<K, V> fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("name", &self.name)
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::Error;

    fn cache() -> TtlCache<String, u32> {
        TtlCache::new("test", 8, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn populate_runs_once_per_key() {
        let cache = cache();
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let value = cache
                .get_or_try_populate("a".to_string(), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_populate_is_not_cached() {
        let cache = cache();

        let err = cache
            .get_or_try_populate("a".to_string(), || async { Err(Error::transient()) })
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(cache.get(&"a".to_string()).is_none());

        let value = cache
            .get_or_try_populate("a".to_string(), || async { Ok(1) })
            .await
            .unwrap();
        assert_eq!(value, 1);
    }

    #[tokio::test]
    async fn invalidate_forces_repopulate() {
        let cache = cache();
        cache.insert("a".to_string(), 1);
        cache.invalidate(&"a".to_string());

        let value = cache
            .get_or_try_populate("a".to_string(), || async { Ok(2) })
            .await
            .unwrap();
        assert_eq!(value, 2);

        cache.invalidate_all();
        assert!(cache.get(&"a".to_string()).is_none());
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache: TtlCache<u8, u8> = TtlCache::new("short", 4, Duration::from_millis(50));
        cache.insert(1, 1);
        assert_eq!(cache.get(&1), Some(1));

        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(cache.get(&1), None);
    }

    #[test]
    fn get_or_insert_with_memoizes() {
        let cache: TtlCache<&'static str, Arc<String>> =
            TtlCache::new("memo", 2, Duration::from_secs(60));
        let first = cache.get_or_insert_with("k", || Arc::new("v".to_string()));
        let second = cache.get_or_insert_with("k", || Arc::new("other".to_string()));
        assert!(Arc::ptr_eq(&first, &second));
    }
}
