// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Remote-state cache keyed by resource and parameters.
//!
//! Each [`QueryKey`] maps to one entry holding the last successful value,
//! the fetch status and a `watch` channel notifying subscribers. The cache
//! guarantees:
//!
//! - **De-duplication**: concurrent reads of one key share a single
//!   in-flight fetch.
//! - **Stale-while-revalidate**: a value older than the stale time is
//!   served as-is while a refresh runs in the background.
//!   [`QueryCache::read`] never blocks, even on an invalidated entry.
//! - **Invalidation**: [`QueryCache::invalidate`] marks an entry stale and
//!   refetches at once when someone is subscribed.
//! - **Eviction**: entries without subscribers are dropped after a grace
//!   period.
//!
//! Fetches run in spawned tasks, so all operations that may start one must
//! be called from within a tokio runtime.

use crate::error::TransportError;
use futures::future::BoxFuture;
use futures::FutureExt;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Default time an unobserved entry is kept.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(300);

/// Default age after which a value is refreshed on its next use.
pub const DEFAULT_STALE_TIME: Duration = Duration::ZERO;

type AnyValue = Arc<dyn Any + Send + Sync>;
type ErasedFetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<AnyValue, TransportError>> + Send + Sync>;

/// Cache key: resource name plus parameters.
///
/// Parameters are kept sorted by name, so two keys are equal iff the
/// resource and every parameter value match, regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    resource: &'static str,
    params: BTreeMap<&'static str, String>,
}

impl QueryKey {
    pub fn new(resource: &'static str) -> Self {
        Self {
            resource,
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, name: &'static str, value: impl ToString) -> Self {
        self.params.insert(name, value.to_string());
        self
    }

    /// Add `name` only when `value` is set.
    pub fn opt_param(self, name: &'static str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.param(name, value),
            None => self,
        }
    }

    /// Add every pair; used with request filters.
    pub fn params(self, pairs: impl IntoIterator<Item = (&'static str, String)>) -> Self {
        pairs.into_iter().fold(self, |key, (name, value)| key.param(name, value))
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    /// `resource?a=1&b=2`, or `resource` without parameters.
    pub fn canonical(&self) -> String {
        let mut canonical = self.resource.to_string();
        for (i, (name, value)) in self.params.iter().enumerate() {
            canonical.push(if i == 0 { '?' } else { '&' });
            canonical.push_str(name);
            canonical.push('=');
            canonical.push_str(value);
        }
        canonical
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// A key bound to the fetcher that produces its value.
pub struct Query<T> {
    key: QueryKey,
    fetcher: ErasedFetcher,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Query<T> {
    pub fn new<F, Fut>(key: QueryKey, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, TransportError>> + Send + 'static,
    {
        let fetcher: ErasedFetcher = Arc::new(move || {
            let fut = fetch();
            async move { fut.await.map(|value| Arc::new(value) as AnyValue) }.boxed()
        });
        Self {
            key,
            fetcher,
            _marker: PhantomData,
        }
    }
}

impl<T> Query<T> {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            fetcher: Arc::clone(&self.fetcher),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query").field("key", &self.key).finish_non_exhaustive()
    }
}

/// Fetch status of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Created, no fetch started yet.
    Idle,
    /// A fetch is in flight; earlier data may still be present.
    Loading,
    Success,
    /// The last fetch failed; earlier data is kept.
    Error,
}

#[derive(Clone)]
struct Snapshot {
    status: FetchStatus,
    data: Option<AnyValue>,
    error: Option<TransportError>,
    fetched_at: Option<Instant>,
    stale: bool,
}

impl Snapshot {
    fn idle() -> Self {
        Self {
            status: FetchStatus::Idle,
            data: None,
            error: None,
            fetched_at: None,
            stale: false,
        }
    }

    fn holds<T: 'static>(&self) -> bool {
        self.data.as_ref().is_some_and(|data| (**data).is::<T>())
    }
}

/// Typed view of an entry at one point in time.
#[derive(Debug)]
pub struct CacheEntry<T> {
    pub status: FetchStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<TransportError>,
    pub fetched_at: Option<Instant>,
    pub stale: bool,
}

impl<T: Send + Sync + 'static> CacheEntry<T> {
    fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            status: snapshot.status,
            data: snapshot.data.clone().and_then(|data| data.downcast::<T>().ok()),
            error: snapshot.error.clone(),
            fetched_at: snapshot.fetched_at,
            stale: snapshot.stale,
        }
    }
}

impl<T> CacheEntry<T> {
    /// Nothing to show yet: no data and a fetch in flight.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && matches!(self.status, FetchStatus::Idle | FetchStatus::Loading)
    }
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            fetched_at: self.fetched_at,
            stale: self.stale,
        }
    }
}

/// A parent value and the result of the query declared on it.
#[derive(Debug)]
pub struct Dependent<A, B> {
    pub parent: Arc<A>,
    /// `None` when the dependency was disabled for this parent.
    pub child: Option<Result<Arc<B>, TransportError>>,
}

struct Entry {
    resource: &'static str,
    tx: watch::Sender<Snapshot>,
    fetcher: ErasedFetcher,
    subscribers: usize,
    /// Bumped on invalidation; a fetch started under an older generation
    /// completes stale.
    generation: u64,
    /// Bumped on every lifecycle event; eviction only proceeds if nothing
    /// happened since it was scheduled.
    activity: u64,
}

impl Entry {
    fn status(&self) -> FetchStatus {
        self.tx.borrow().status
    }
}

struct Inner {
    entries: Mutex<FxHashMap<String, Entry>>,
    grace: Duration,
    stale_time: Duration,
}

/// Process-wide remote-state cache. Cloning shares the registry.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.len())
            .field("grace", &self.inner.grace)
            .field("stale_time", &self.inner.stale_time)
            .finish()
    }
}

impl QueryCache {
    /// Create a cache evicting unobserved entries after `grace`.
    pub fn new(grace: Duration) -> Self {
        Self::with_stale_time(grace, DEFAULT_STALE_TIME)
    }

    /// Like [`QueryCache::new`], refreshing values once they are older than `stale_time`.
    pub fn with_stale_time(grace: Duration, stale_time: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(FxHashMap::default()),
                grace,
                stale_time,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FxHashMap<String, Entry>> {
        self.inner.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value of `query`, fetching in the background when the entry
    /// is absent, invalidated, failed, past the stale time, or holds a value
    /// of another type.
    pub fn read<T: Send + Sync + 'static>(&self, query: &Query<T>) -> CacheEntry<T> {
        let (snapshot, _rx) = self.touch(query, false);
        CacheEntry::from_snapshot(&snapshot)
    }

    /// Register a subscriber for `query` and fetch like [`QueryCache::read`].
    ///
    /// While at least one subscription is alive the entry is never evicted
    /// and invalidations refetch immediately.
    pub fn subscribe<T: Send + Sync + 'static>(&self, query: &Query<T>) -> Subscription<T> {
        let (_, rx) = self.touch(query, true);
        Subscription {
            canonical: query.key.canonical(),
            cache: self.clone(),
            rx,
            _marker: PhantomData,
        }
    }

    /// Value of `query`: waits for the in-flight or triggered fetch unless a
    /// value that was not invalidated is cached. A cached value past the
    /// stale time is returned at once while the refresh runs.
    pub async fn fetch<T: Send + Sync + 'static>(&self, query: &Query<T>) -> Result<Arc<T>, TransportError> {
        let mut subscription = self.subscribe(query);
        let mut entry = subscription.current();
        loop {
            if entry.status == FetchStatus::Error {
                return Err(entry
                    .error
                    .unwrap_or_else(|| TransportError::new(None, "fetch failed")));
            }
            if !entry.stale {
                if let Some(data) = entry.data {
                    return Ok(data);
                }
            }
            entry = match subscription.changed().await {
                Some(next) => next,
                None => {
                    return Err(TransportError::new(
                        None,
                        format!("cache entry {} dropped while loading", query.key),
                    ))
                }
            };
        }
    }

    /// Fetch `parent`, then the query `derive` declares on its value.
    ///
    /// The child's failure does not fail the parent.
    pub async fn fetch_dependent<A, B, D>(
        &self,
        parent: &Query<A>,
        derive: D,
    ) -> Result<Dependent<A, B>, TransportError>
    where
        A: Send + Sync + 'static,
        B: Send + Sync + 'static,
        D: FnOnce(&A) -> Option<Query<B>>,
    {
        let parent = self.fetch(parent).await?;
        let child = match derive(&parent) {
            Some(query) => Some(self.fetch(&query).await),
            None => None,
        };
        Ok(Dependent { parent, child })
    }

    /// Mark `key` stale; refetch at once if it has subscribers.
    pub fn invalidate(&self, key: &QueryKey) {
        let canonical = key.canonical();
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(&canonical) {
            self.invalidate_entry(&canonical, entry);
        }
    }

    /// [`QueryCache::invalidate`] every key of `resource`, whatever its parameters.
    pub fn invalidate_resource(&self, resource: &str) {
        let mut entries = self.lock();
        let mut invalidated = 0usize;
        for (canonical, entry) in entries.iter_mut().filter(|(_, e)| e.resource == resource) {
            self.invalidate_entry(canonical, entry);
            invalidated += 1;
        }
        tracing::debug!(resource = %resource, entries = invalidated, "Invalidated resource");
    }

    pub fn status(&self, key: &QueryKey) -> Option<FetchStatus> {
        self.lock().get(&key.canonical()).map(Entry::status)
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.lock().get(&key.canonical()).map_or(0, |e| e.subscribers)
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.lock().contains_key(&key.canonical())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn touch<T: Send + Sync + 'static>(
        &self,
        query: &Query<T>,
        subscribe: bool,
    ) -> (Snapshot, watch::Receiver<Snapshot>) {
        let canonical = query.key.canonical();
        let mut entries = self.lock();
        let entry = entries.entry(canonical.clone()).or_insert_with(|| {
            tracing::debug!(key = %canonical, "Cache entry created");
            Entry {
                resource: query.key.resource,
                tx: watch::channel(Snapshot::idle()).0,
                fetcher: Arc::clone(&query.fetcher),
                subscribers: 0,
                generation: 0,
                activity: 0,
            }
        });

        entry.fetcher = Arc::clone(&query.fetcher);
        entry.activity += 1;
        if subscribe {
            entry.subscribers += 1;
        }

        let needs_fetch = {
            let snapshot = entry.tx.borrow();
            let aged = snapshot.status == FetchStatus::Success
                && snapshot
                    .fetched_at
                    .is_some_and(|at| at.elapsed() >= self.inner.stale_time);
            snapshot.status != FetchStatus::Loading
                && (snapshot.stale || aged || snapshot.status == FetchStatus::Error || !snapshot.holds::<T>())
        };
        if needs_fetch {
            self.start_fetch(&canonical, entry);
        } else {
            tracing::trace!(key = %canonical, "Cache HIT");
        }

        let rx = entry.tx.subscribe();
        let snapshot = rx.borrow().clone();
        drop(entries);

        if !subscribe && !needs_fetch {
            // Plain reads count as activity too; keep the entry for one more grace period.
            self.schedule_eviction_if_unobserved(&canonical);
        }
        (snapshot, rx)
    }

    fn start_fetch(&self, canonical: &str, entry: &mut Entry) {
        entry.tx.send_modify(|s| s.status = FetchStatus::Loading);
        let fetcher = Arc::clone(&entry.fetcher);
        let generation = entry.generation;
        let cache = self.clone();
        let canonical = canonical.to_string();
        tracing::debug!(key = %canonical, generation, "Fetching");

        tokio::spawn(async move {
            let result = fetcher().await;
            cache.complete(&canonical, generation, result);
        });
    }

    fn complete(&self, canonical: &str, generation: u64, result: Result<AnyValue, TransportError>) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(canonical) else {
            return;
        };

        let invalidated = entry.generation != generation;
        entry.activity += 1;
        match result {
            Ok(value) => {
                tracing::debug!(key = %canonical, stale = invalidated, "Fetch complete");
                entry.tx.send_modify(|s| {
                    s.status = FetchStatus::Success;
                    s.data = Some(value);
                    s.error = None;
                    s.fetched_at = Some(Instant::now());
                    s.stale = invalidated;
                });
            }
            Err(error) => {
                tracing::debug!(key = %canonical, error = %error, "Fetch failed");
                entry.tx.send_modify(|s| {
                    s.status = FetchStatus::Error;
                    s.error = Some(error);
                });
            }
        }

        if entry.subscribers > 0 {
            if invalidated {
                self.start_fetch(canonical, entry);
            }
        } else {
            let activity = entry.activity;
            drop(entries);
            self.schedule_eviction(canonical.to_string(), activity);
        }
    }

    fn invalidate_entry(&self, canonical: &str, entry: &mut Entry) {
        entry.generation += 1;
        entry.activity += 1;
        entry.tx.send_modify(|s| s.stale = true);
        if entry.subscribers > 0 && entry.status() != FetchStatus::Loading {
            self.start_fetch(canonical, entry);
        }
    }

    fn unsubscribe(&self, canonical: &str) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(canonical) else {
            return;
        };
        entry.subscribers = entry.subscribers.saturating_sub(1);
        entry.activity += 1;
        if entry.subscribers == 0 {
            let activity = entry.activity;
            drop(entries);
            self.schedule_eviction(canonical.to_string(), activity);
        }
    }

    fn schedule_eviction_if_unobserved(&self, canonical: &str) {
        let activity = {
            let entries = self.lock();
            match entries.get(canonical) {
                Some(entry) if entry.subscribers == 0 && entry.status() != FetchStatus::Loading => {
                    entry.activity
                }
                _ => return,
            }
        };
        self.schedule_eviction(canonical.to_string(), activity);
    }

    fn schedule_eviction(&self, canonical: String, activity: u64) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.evict_if_unchanged(&canonical, activity);
            return;
        };
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let grace = self.inner.grace;
        runtime.spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(inner) = inner.upgrade() {
                QueryCache { inner }.evict_if_unchanged(&canonical, activity);
            }
        });
    }

    fn evict_if_unchanged(&self, canonical: &str, activity: u64) {
        let mut entries = self.lock();
        let evict = entries.get(canonical).is_some_and(|entry| {
            entry.subscribers == 0 && entry.activity == activity && entry.status() != FetchStatus::Loading
        });
        if evict {
            entries.remove(canonical);
            tracing::debug!(key = %canonical, "Cache entry evicted");
        }
    }
}

/// An active observer of one key. Dropping it unregisters the observer.
pub struct Subscription<T> {
    canonical: String,
    cache: QueryCache,
    rx: watch::Receiver<Snapshot>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Subscription<T> {
    pub fn current(&self) -> CacheEntry<T> {
        CacheEntry::from_snapshot(&self.rx.borrow())
    }

    /// Wait for the next update of the key. `None` once the entry is gone.
    pub async fn changed(&mut self) -> Option<CacheEntry<T>> {
        self.rx.changed().await.ok()?;
        Some(CacheEntry::from_snapshot(&self.rx.borrow_and_update()))
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cache.unsubscribe(&self.canonical);
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("key", &self.canonical).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_equality_ignores_param_order() {
        let a = QueryKey::new("assets").param("ifc_file_id", 1).param("condition_status", "Good");
        let b = QueryKey::new("assets").param("condition_status", "Good").param("ifc_file_id", 1);
        assert_eq!(a, b);
        assert_eq!(a.canonical(), "assets?condition_status=Good&ifc_file_id=1");
    }

    #[test]
    fn test_absent_params_are_omitted() {
        let key = QueryKey::new("inspections").opt_param("asset_id", None::<i64>);
        assert_eq!(key, QueryKey::new("inspections"));
        assert_eq!(key.canonical(), "inspections");
        assert_ne!(key, QueryKey::new("inspections").param("asset_id", 2));
        assert_ne!(QueryKey::new("asset").param("id", 2), QueryKey::new("asset").param("id", "3"));
    }
}
