//! Generator result cache
//!
//! An explicit, cloneable cache object owned by the completion engine. Each
//! key holds the last fetched value and at most one in-flight fetch; callers
//! arriving while a fetch runs share it instead of starting another.
//!
//! Fetches are spawned onto the runtime, so a request that times out or is
//! cancelled never leaves an entry stuck half-way: the fetch still lands in
//! the cache for the next caller.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;
use tracing::debug;

use super::suggestion::Suggestion;
use crate::spec::{CacheSpec, CacheStrategy};

/// Value stored per key
pub type Fetched = Arc<Vec<Suggestion>>;

type SharedFetch = Shared<BoxFuture<'static, Fetched>>;

/// Identity of a cached generator result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Working directory, when the generator caches per directory
    pub directory: Option<PathBuf>,
    /// Which generator produced the value
    pub scope: String,
    /// Explicit `cacheKey`, or the joined tokens
    pub key: String,
}

impl CacheKey {
    /// Key for one generator invocation
    ///
    /// # Arguments
    /// * `spec` - The generator's cache declaration
    /// * `scope` - Stable identity of the generator
    /// * `tokens` - Token texts of the command
    /// * `cwd` - Working directory of the shell
    pub fn new(spec: &CacheSpec, scope: impl Into<String>, tokens: &[String], cwd: &Path) -> Self {
        Self {
            directory: spec.cache_by_directory.then(|| cwd.to_path_buf()),
            scope: scope.into(),
            key: spec.cache_key.clone().unwrap_or_else(|| tokens.join(" ")),
        }
    }
}

#[derive(Default)]
struct CacheEntry {
    last_fetch: Option<Instant>,
    in_flight: Option<SharedFetch>,
    last_value: Option<Fetched>,
}

enum Plan {
    Ready(Fetched),
    Wait(SharedFetch),
}

/// In-memory cache of generator results, shared by clones
#[derive(Clone, Default)]
pub struct GeneratorCache {
    entries: Arc<Mutex<HashMap<CacheKey, CacheEntry>>>,
}

fn lock(
    entries: &Mutex<HashMap<CacheKey, CacheEntry>>,
) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

impl GeneratorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry. Fetches already in flight still complete and
    /// repopulate their keys.
    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached value for `key`, fetching per the strategy in `spec`.
    ///
    /// `max-age` serves the last value until it is older than the ttl, then
    /// waits for a new fetch. `stale-while-revalidate` waits only for the
    /// very first fetch and otherwise serves the last value while a refresh
    /// runs in the background. Without a ttl a value never goes stale.
    ///
    /// # Arguments
    /// * `key` - Cache identity
    /// * `spec` - Cache declaration
    /// * `fetch` - Produces the fetch future; only called when a fetch starts
    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, spec: &CacheSpec, fetch: F) -> Fetched
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Vec<Suggestion>> + Send + 'static,
    {
        let plan = {
            let mut entries = lock(&self.entries);
            let entry = entries.entry(key.clone()).or_default();
            let now = Instant::now();
            let stale = entry
                .last_fetch
                .is_none_or(|at| spec.ttl().is_some_and(|ttl| now > at + ttl));

            if stale && entry.in_flight.is_none() {
                debug!("Refreshing cached generator {:?}", key.scope);
                entry.in_flight = Some(self.spawn_fetch(key, fetch()));
            }

            match spec.strategy {
                CacheStrategy::MaxAge => match (&entry.in_flight, &entry.last_value) {
                    (Some(in_flight), _) => Plan::Wait(in_flight.clone()),
                    (None, Some(value)) => Plan::Ready(Arc::clone(value)),
                    (None, None) => Plan::Ready(Fetched::default()),
                },
                CacheStrategy::StaleWhileRevalidate => match (&entry.last_value, &entry.in_flight) {
                    (Some(value), _) => Plan::Ready(Arc::clone(value)),
                    (None, Some(in_flight)) => Plan::Wait(in_flight.clone()),
                    (None, None) => Plan::Ready(Fetched::default()),
                },
            }
        };

        match plan {
            Plan::Ready(value) => value,
            Plan::Wait(in_flight) => in_flight.await,
        }
    }

    /// Start a fetch that stores its result under `key` when done
    fn spawn_fetch<Fut>(&self, key: CacheKey, fut: Fut) -> SharedFetch
    where
        Fut: Future<Output = Vec<Suggestion>> + Send + 'static,
    {
        let entries = Arc::clone(&self.entries);
        let shared = async move {
            let value: Fetched = Arc::new(fut.await);
            let mut entries = lock(&entries);
            let entry = entries.entry(key).or_default();
            entry.last_value = Some(Arc::clone(&value));
            entry.last_fetch = Some(Instant::now());
            entry.in_flight = None;
            value
        }
        .boxed()
        .shared();

        tokio::spawn(shared.clone());
        shared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::suggestion::SuggestionType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn key() -> CacheKey {
        CacheKey::new(&CacheSpec::default(), "test", &["git".to_string()], Path::new("/"))
    }

    fn counting_fetch(
        count: &Arc<AtomicUsize>,
        delay: Duration,
    ) -> impl FnOnce() -> BoxFuture<'static, Vec<Suggestion>> + use<> {
        let count = Arc::clone(count);
        move || {
            async move {
                let n = count.fetch_add(1, Ordering::SeqCst);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                vec![Suggestion::new(format!("v{n}"), SuggestionType::Arg)]
            }
            .boxed()
        }
    }

    fn ttl_spec(strategy: CacheStrategy) -> CacheSpec {
        CacheSpec {
            ttl: Some(1000),
            strategy,
            ..CacheSpec::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_age_reuses_value_within_ttl() {
        let cache = GeneratorCache::new();
        let spec = ttl_spec(CacheStrategy::MaxAge);
        let count = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get_or_fetch(key(), &spec, counting_fetch(&count, Duration::ZERO))
            .await;
        tokio::time::advance(Duration::from_millis(500)).await;
        let second = cache
            .get_or_fetch(key(), &spec, counting_fetch(&count, Duration::ZERO))
            .await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(600)).await;
        let third = cache
            .get_or_fetch(key(), &spec, counting_fetch(&count, Duration::ZERO))
            .await;

        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third[0].name, "v1");
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_fetch() {
        let cache = GeneratorCache::new();
        let spec = ttl_spec(CacheStrategy::MaxAge);
        let count = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.get_or_fetch(key(), &spec, counting_fetch(&count, Duration::from_millis(100))),
            cache.get_or_fetch(key(), &spec, counting_fetch(&count, Duration::from_millis(100))),
        );

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_while_revalidate_serves_old_value() {
        let cache = GeneratorCache::new();
        let spec = ttl_spec(CacheStrategy::StaleWhileRevalidate);
        let count = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get_or_fetch(key(), &spec, counting_fetch(&count, Duration::ZERO))
            .await;
        assert_eq!(first[0].name, "v0");

        tokio::time::advance(Duration::from_millis(1500)).await;
        let stale = cache
            .get_or_fetch(key(), &spec, counting_fetch(&count, Duration::from_millis(50)))
            .await;
        assert!(Arc::ptr_eq(&first, &stale));

        // Let the background refresh land
        tokio::time::sleep(Duration::from_millis(100)).await;
        let refreshed = cache
            .get_or_fetch(key(), &spec, counting_fetch(&count, Duration::ZERO))
            .await;
        assert_eq!(refreshed[0].name, "v1");
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_ttl_never_refetches() {
        let cache = GeneratorCache::new();
        let spec = CacheSpec::default();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            cache
                .get_or_fetch(key(), &spec, counting_fetch(&count, Duration::ZERO))
                .await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_keys_and_clear() {
        let cache = GeneratorCache::new();
        let spec = CacheSpec {
            cache_by_directory: true,
            ..CacheSpec::default()
        };
        let count = Arc::new(AtomicUsize::new(0));
        let tokens = ["ls".to_string()];

        for dir in ["/a", "/b"] {
            let key = CacheKey::new(&spec, "ls", &tokens, Path::new(dir));
            cache
                .get_or_fetch(key, &spec, counting_fetch(&count, Duration::ZERO))
                .await;
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_explicit_cache_key() {
        let spec = CacheSpec {
            cache_key: Some("branches".to_string()),
            ..CacheSpec::default()
        };
        let a = CacheKey::new(&spec, "git", &["git".to_string(), "checkout".to_string()], Path::new("/"));
        let b = CacheKey::new(&spec, "git", &["git".to_string(), "merge".to_string()], Path::new("/x"));
        assert_eq!(a, b);
        assert!(a.directory.is_none());
    }
}
