use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_stream::wrappers::BroadcastStream;

use crate::errors::ClientError;
use crate::services::retry::{with_retry, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Prefix match: `["laborers"]` covers every laborer listing key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub enabled: bool,
    pub retry: RetryPolicy,
    pub stale_time: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Fetching,
    Success,
    Error,
}

/// Read-only view of one cache entry.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    pub data: Option<Arc<T>>,
    pub error: Option<ClientError>,
    pub status: FetchStatus,
    pub is_stale: bool,
    pub is_fetched: bool,
}

impl<T> QueryState<T> {
    fn idle() -> Self {
        Self {
            data: None,
            error: None,
            status: FetchStatus::Idle,
            is_stale: false,
            is_fetched: false,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == FetchStatus::Fetching && self.data.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Updated(QueryKey),
    Invalidated(QueryKey),
    Cleared,
}

type Value = Arc<dyn Any + Send + Sync>;

struct Entry {
    value: Option<Value>,
    error: Option<ClientError>,
    stale: bool,
    generation: u64,
    fetching: bool,
    fetched: bool,
    updated_at: Option<Instant>,
    fetch_lock: Arc<tokio::sync::Mutex<()>>,
}

impl Entry {
    fn new() -> Self {
        Self {
            value: None,
            error: None,
            stale: false,
            generation: 0,
            fetching: false,
            fetched: false,
            updated_at: None,
            fetch_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

pub struct QueryCache {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    // bumped by `clear` while holding `entries`
    epoch: AtomicU64,
    events: broadcast::Sender<CacheEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    epoch: u64,
    generation: u64,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            entries: Mutex::new(HashMap::new()),
            epoch: AtomicU64::new(0),
            events,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached value while fresh, otherwise runs `fetcher` under the
    /// retry policy. Fetches of one key are serialized; a caller that waited on
    /// another fetch reuses its result.
    pub async fn fetch<T, F, Fut>(
        &self,
        key: QueryKey,
        options: &QueryOptions,
        fetcher: F,
    ) -> Result<Arc<T>, ClientError>
    where
        T: Send + Sync + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        if !options.enabled {
            tracing::debug!(key = %key, "query disabled, not fetching");
            return Err(ClientError::NotReady);
        }

        if let Some(value) = self.fresh_value::<T>(&key, options.stale_time)? {
            return Ok(value);
        }

        let lock = self.fetch_lock(&key);
        let _serial = lock.lock().await;

        if let Some(value) = self.fresh_value::<T>(&key, options.stale_time)? {
            return Ok(value);
        }

        let ticket = self.begin_fetch(&key);
        let _in_flight = InFlight {
            cache: self,
            key: &key,
            epoch: ticket.epoch,
        };
        tracing::debug!(key = %key, "fetching");
        let result = with_retry(&options.retry, &key.to_string(), fetcher).await;
        self.finish_fetch(&key, ticket, result)
    }

    /// Marks every entry under any of `prefixes` stale. Returns how many entries
    /// were touched.
    pub fn invalidate(&self, prefixes: &[QueryKey]) -> usize {
        let mut touched = vec![];
        {
            let mut entries = self.entries();
            for (key, entry) in entries.iter_mut() {
                if prefixes.iter().any(|p| key.starts_with(p)) {
                    entry.stale = true;
                    entry.generation += 1;
                    touched.push(key.clone());
                }
            }
        }

        for key in &touched {
            tracing::debug!(key = %key, "invalidated");
            let _ = self.events.send(CacheEvent::Invalidated(key.clone()));
        }
        touched.len()
    }

    /// Drops every entry. Fetches already running when this is called hand
    /// their result to their own caller but never write it back.
    pub fn clear(&self) {
        let mut entries = self.entries();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        entries.clear();
        drop(entries);
        tracing::info!("query cache cleared");
        let _ = self.events.send(CacheEvent::Cleared);
    }

    pub fn state<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QueryState<T> {
        let entries = self.entries();
        let Some(entry) = entries.get(key) else {
            return QueryState::idle();
        };

        let status = if entry.fetching {
            FetchStatus::Fetching
        } else if entry.error.is_some() {
            FetchStatus::Error
        } else if entry.value.is_some() {
            FetchStatus::Success
        } else {
            FetchStatus::Idle
        };

        QueryState {
            data: entry.value.clone().and_then(|v| v.downcast::<T>().ok()),
            error: entry.error.clone(),
            status,
            is_stale: entry.stale,
            is_fetched: entry.fetched,
        }
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<_> = self.entries().keys().cloned().collect();
        keys.sort_by_key(|k| k.to_string());
        keys
    }

    pub fn subscribe(&self) -> BroadcastStream<CacheEvent> {
        BroadcastStream::new(self.events.subscribe())
    }

    fn fresh_value<T: Send + Sync + 'static>(
        &self,
        key: &QueryKey,
        stale_time: Duration,
    ) -> Result<Option<Arc<T>>, ClientError> {
        let entries = self.entries();
        let Some(entry) = entries.get(key) else {
            return Ok(None);
        };
        let fresh = !entry.stale
            && entry
                .updated_at
                .map(|at| at.elapsed() < stale_time)
                .unwrap_or(false);
        match (&entry.value, fresh) {
            (Some(value), true) => Ok(Some(downcast(key, value.clone())?)),
            _ => Ok(None),
        }
    }

    fn fetch_lock(&self, key: &QueryKey) -> Arc<tokio::sync::Mutex<()>> {
        self.entries()
            .entry(key.clone())
            .or_insert_with(Entry::new)
            .fetch_lock
            .clone()
    }

    fn begin_fetch(&self, key: &QueryKey) -> Ticket {
        let mut entries = self.entries();
        let epoch = self.epoch.load(Ordering::SeqCst);
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
        entry.fetching = true;
        Ticket {
            epoch,
            generation: entry.generation,
        }
    }

    fn finish_fetch<T: Send + Sync + 'static>(
        &self,
        key: &QueryKey,
        ticket: Ticket,
        result: Result<T, ClientError>,
    ) -> Result<Arc<T>, ClientError> {
        let mut entries = self.entries();
        if self.epoch.load(Ordering::SeqCst) != ticket.epoch {
            tracing::debug!(key = %key, "cache cleared mid-fetch, result not stored");
            return result.map(Arc::new);
        }
        let Some(entry) = entries.get_mut(key) else {
            return result.map(Arc::new);
        };
        entry.fetching = false;
        entry.fetched = true;

        match result {
            Ok(value) => {
                let value = Arc::new(value);
                let erased: Value = value.clone();
                entry.value = Some(erased);
                entry.error = None;
                entry.updated_at = Some(Instant::now());
                entry.stale = entry.generation != ticket.generation;
                if entry.stale {
                    tracing::debug!(key = %key, "invalidated mid-fetch, result kept stale");
                }
                drop(entries);
                let _ = self.events.send(CacheEvent::Updated(key.clone()));
                Ok(value)
            }
            Err(e) => {
                entry.error = Some(e.clone());
                tracing::warn!(key = %key, error = %e, "query failed");
                Err(e)
            }
        }
    }
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, value: Value) -> Result<Arc<T>, ClientError> {
    value
        .downcast::<T>()
        .map_err(|_| ClientError::Unexpected(format!("cached value for {key} has another type")))
}

// Resets the fetching flag even when the fetch future is dropped mid-flight.
struct InFlight<'a> {
    cache: &'a QueryCache,
    key: &'a QueryKey,
    epoch: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut entries = self.cache.entries();
        if self.cache.epoch.load(Ordering::SeqCst) != self.epoch {
            return;
        }
        if let Some(entry) = entries.get_mut(self.key) {
            entry.fetching = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_stream::StreamExt;

    fn options() -> QueryOptions {
        QueryOptions {
            enabled: true,
            retry: RetryPolicy::none(),
            stale_time: Duration::from_secs(30),
        }
    }

    fn key(parts: &[&str]) -> QueryKey {
        QueryKey::new(parts.iter().copied())
    }

    #[test]
    fn test_prefix_matching() {
        let listing = key(&["laborers", "location", "Downtown", "10"]);
        assert!(listing.starts_with(&key(&["laborers"])));
        assert!(listing.starts_with(&key(&["laborers", "location"])));
        assert!(!listing.starts_with(&key(&["laborers", "neighborhood"])));
        assert!(!key(&["laborers"]).starts_with(&listing));
        assert_eq!(listing.to_string(), "laborers/location/Downtown/10");
    }

    #[tokio::test]
    async fn test_fresh_value_is_served_from_cache() {
        let cache = QueryCache::new();
        let calls = AtomicU32::new(0);
        for _ in 0..3 {
            let value = cache
                .fetch(key(&["callerLaborer"]), &options(), || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, ClientError>(42u32) }
                })
                .await
                .unwrap();
            assert_eq!(*value, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cache = QueryCache::new();
        let calls = AtomicU32::new(0);
        let fetch = || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, ClientError>(n) }
        };

        assert_eq!(*cache.fetch(key(&["callerLaborer"]), &options(), fetch).await.unwrap(), 0);
        assert_eq!(cache.invalidate(&[key(&["callerLaborer"])]), 1);
        assert!(cache.state::<u32>(&key(&["callerLaborer"])).is_stale);
        assert_eq!(*cache.fetch(key(&["callerLaborer"]), &options(), fetch).await.unwrap(), 1);
        assert!(!cache.state::<u32>(&key(&["callerLaborer"])).is_stale);
    }

    #[tokio::test]
    async fn test_invalidation_respects_prefix() {
        let cache = QueryCache::new();
        for k in [
            key(&["laborers", "location", "Downtown", "10"]),
            key(&["laborers", "neighborhood", "Elm"]),
            key(&["currentUserProfile"]),
        ] {
            cache
                .fetch(k, &options(), || async { Ok::<_, ClientError>(1u8) })
                .await
                .unwrap();
        }

        assert_eq!(cache.invalidate(&[key(&["laborers"])]), 2);
        assert!(!cache.state::<u8>(&key(&["currentUserProfile"])).is_stale);
    }

    #[tokio::test]
    async fn test_disabled_query_never_runs() {
        let cache = QueryCache::new();
        let calls = AtomicU32::new(0);
        let mut opts = options();
        opts.enabled = false;

        let result = cache
            .fetch(key(&["callerLaborer"]), &opts, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ClientError>(1u8) }
            })
            .await;

        assert_eq!(result.unwrap_err(), ClientError::NotReady);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let state = cache.state::<u8>(&key(&["callerLaborer"]));
        assert!(!state.is_fetched);
        assert_eq!(state.status, FetchStatus::Idle);
        assert!(cache.keys().is_empty());
    }

    #[tokio::test]
    async fn test_error_keeps_previous_data() {
        let cache = QueryCache::new();
        let k = key(&["callerLaborer"]);
        cache
            .fetch(k.clone(), &options(), || async { Ok::<_, ClientError>(7u8) })
            .await
            .unwrap();
        cache.invalidate(&[k.clone()]);

        let err = cache
            .fetch(k.clone(), &options(), || async {
                Err::<u8, _>(ClientError::Unauthorized("nope".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized(_)));

        let state = cache.state::<u8>(&k);
        assert_eq!(state.status, FetchStatus::Error);
        assert_eq!(state.data.as_deref(), Some(&7));
        assert!(state.is_fetched);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidated_mid_fetch_result_stays_stale() {
        let cache = Arc::new(QueryCache::new());
        let k = key(&["callerLaborer"]);

        let slow = {
            let cache = Arc::clone(&cache);
            let k = k.clone();
            tokio::spawn(async move {
                cache
                    .fetch(k, &options(), || async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok::<_, ClientError>("before")
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cache.state::<&str>(&k).status, FetchStatus::Fetching);
        cache.invalidate(&[k.clone()]);

        assert_eq!(*slow.await.unwrap().unwrap(), "before");
        assert!(cache.state::<&str>(&k).is_stale);

        let next = cache
            .fetch(k.clone(), &options(), || async { Ok::<_, ClientError>("after") })
            .await
            .unwrap();
        assert_eq!(*next, "after");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_running_across_clear_is_not_stored() {
        let cache = Arc::new(QueryCache::new());
        let k = key(&["callerLaborer"]);

        let previous_session = {
            let cache = Arc::clone(&cache);
            let k = k.clone();
            tokio::spawn(async move {
                cache
                    .fetch(k, &options(), || async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok::<_, ClientError>("user-a")
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.clear();

        let current = cache
            .fetch(k.clone(), &options(), || async { Ok::<_, ClientError>("user-b") })
            .await
            .unwrap();
        assert_eq!(*current, "user-b");

        assert_eq!(*previous_session.await.unwrap().unwrap(), "user-a");
        let state = cache.state::<&str>(&k);
        assert_eq!(state.data.as_deref(), Some(&"user-b"));
        assert!(!state.is_stale);
        assert_eq!(state.status, FetchStatus::Success);

        let served = cache
            .fetch(k.clone(), &options(), || async { Ok::<_, ClientError>("refetched") })
            .await
            .unwrap();
        assert_eq!(*served, "user-b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_fetches_share_one_call() {
        let cache = Arc::new(QueryCache::new());
        let calls = Arc::new(AtomicU32::new(0));
        let mut handles = vec![];
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .fetch(key(&["laborers", "id", "b"]), &options(), || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok::<_, ClientError>(5u8)
                        }
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(*handle.await.unwrap().unwrap(), 5);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_time_expiry() {
        let cache = QueryCache::new();
        let calls = AtomicU32::new(0);
        let mut opts = options();
        opts.stale_time = Duration::from_secs(5);
        let fetch = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ClientError>(1u8) }
        };

        cache.fetch(key(&["k"]), &opts, fetch).await.unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        cache.fetch(key(&["k"]), &opts, fetch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        cache.fetch(key(&["k"]), &opts, fetch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_unexpected() {
        let cache = QueryCache::new();
        cache
            .fetch(key(&["k"]), &options(), || async { Ok::<_, ClientError>(1u8) })
            .await
            .unwrap();
        let err = cache
            .fetch(key(&["k"]), &options(), || async { Ok::<_, ClientError>("text") })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Unexpected(_)));
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let cache = QueryCache::new();
        let mut events = cache.subscribe();

        cache
            .fetch(key(&["bookings"]), &options(), || async { Ok::<_, ClientError>(1u8) })
            .await
            .unwrap();
        cache.invalidate(&[key(&["bookings"])]);
        cache.clear();

        assert_eq!(
            events.next().await.unwrap().unwrap(),
            CacheEvent::Updated(key(&["bookings"]))
        );
        assert_eq!(
            events.next().await.unwrap().unwrap(),
            CacheEvent::Invalidated(key(&["bookings"]))
        );
        assert_eq!(events.next().await.unwrap().unwrap(), CacheEvent::Cleared);
        assert!(cache.keys().is_empty());
    }
}
