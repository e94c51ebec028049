//! Tag-indexed query cache.
//!
//! Every cached view is stored under a [`QueryKey`] together with the
//! [`Tag`]s it provides and the loader that produced it. A tag index maps each
//! provided tag to the keys that carry it, so a mutation only has to declare
//! tags: [`QueryCache::invalidate`] finds the affected entries, marks them
//! stale before returning, and refetches the ones somebody is still
//! subscribed to.
//!
//! Refetches carry the entry's generation at the time they were scheduled. A
//! result is only applied if no newer invalidation happened in the meantime,
//! so a slow refetch can never resurrect data that predates a later mutation.
//!
//! The mutex guarding the state is never held across an `.await`.

use std::any::Any;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{ApiError, ClientError, ClientResult};
use crate::metrics;
use crate::tags::{Mutation, Tag};

type Payload = Arc<dyn Any + Send + Sync>;
type Loader = Arc<dyn Fn() -> BoxFuture<'static, Result<Payload, ApiError>> + Send + Sync>;

/// Identity of one cached view, e.g. `submissions/my?page=1&limit=20`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for QueryKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for QueryKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    Stale,
}

struct Entry {
    tags: Vec<Tag>,
    /// `None` while the first load is still in flight.
    payload: Option<Payload>,
    staleness: Staleness,
    subscribers: usize,
    /// Loads started by `fetch` that have not completed. Never evicted while
    /// non-zero, so invalidations during the load still find the entry.
    loading: usize,
    loader: Loader,
    generation: u64,
    last_used: u64,
    updates: watch::Sender<Option<Payload>>,
}

#[derive(Default)]
struct State {
    entries: HashMap<QueryKey, Entry>,
    index: HashMap<Tag, HashSet<QueryKey>>,
    clock: u64,
}

impl State {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn index_entry(&mut self, key: &QueryKey, tags: &[Tag]) {
        for tag in tags {
            self.index.entry(tag.clone()).or_default().insert(key.clone());
        }
    }

    fn unindex_entry(&mut self, key: &QueryKey, tags: &[Tag]) {
        for tag in tags {
            if let Some(keys) = self.index.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.index.remove(tag);
                }
            }
        }
    }

    fn remove(&mut self, key: &QueryKey) {
        if let Some(entry) = self.entries.remove(key) {
            self.unindex_entry(key, &entry.tags);
        }
    }

    fn matching_keys(&self, declared: &[Tag]) -> BTreeSet<QueryKey> {
        self.index
            .iter()
            .filter(|(provided, _)| declared.iter().any(|tag| tag.matches(provided)))
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect()
    }

    /// Store a loaded payload as fresh and add one subscriber.
    fn store(
        &mut self,
        key: &QueryKey,
        tags: Vec<Tag>,
        loader: Loader,
        payload: Payload,
    ) -> watch::Receiver<Option<Payload>> {
        let now = self.tick();
        let old_tags = self.entries.get(key).map(|e| e.tags.clone());
        if let Some(old_tags) = old_tags {
            self.unindex_entry(key, &old_tags);
        }
        self.index_entry(key, &tags);

        let entry = self.entries.entry(key.clone()).or_insert_with(|| Entry {
            tags: Vec::new(),
            payload: None,
            staleness: Staleness::Stale,
            subscribers: 0,
            loading: 0,
            loader: loader.clone(),
            generation: 0,
            last_used: now,
            updates: watch::channel(None).0,
        });
        entry.tags = tags;
        entry.loader = loader;
        entry.payload = Some(payload.clone());
        entry.staleness = Staleness::Fresh;
        entry.subscribers += 1;
        entry.last_used = now;
        entry.updates.send_replace(Some(payload));
        entry.updates.subscribe()
    }

    /// Drop least recently used unsubscribed entries until within capacity.
    fn evict_overflow(&mut self, capacity: usize) {
        while self.entries.len() > capacity {
            let victim = self
                .entries
                .iter()
                .filter(|(_, e)| e.subscribers == 0 && e.loading == 0 && e.payload.is_some())
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());

            match victim {
                Some(key) => {
                    debug!(key = %key, "Evicting cache entry");
                    self.remove(&key);
                    metrics::record_cache("evicted");
                }
                None => {
                    warn!(
                        entries = self.entries.len(),
                        capacity, "Cache over capacity but every entry is in use"
                    );
                    break;
                }
            }
        }
    }
}

struct Shared {
    state: Mutex<State>,
    capacity: usize,
}

/// Which entries an invalidation touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invalidation {
    pub stale: Vec<QueryKey>,
    pub refetching: Vec<QueryKey>,
}

/// Shared handle to the cache; clones refer to the same store.
#[derive(Clone)]
pub struct QueryCache {
    shared: Arc<Shared>,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.len())
            .field("capacity", &self.shared.capacity)
            .finish()
    }
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                capacity: capacity.max(1),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the cached payload if fresh, otherwise run `loader` and cache
    /// its result under `key`, indexed by `tags`.
    ///
    /// The returned [`Subscription`] counts as interest in the entry until it
    /// is released or dropped; while it lives, invalidations refetch the
    /// entry and publish the new payload to it.
    pub async fn fetch<T, F, Fut>(
        &self,
        key: impl Into<QueryKey>,
        tags: Vec<Tag>,
        loader: F,
    ) -> ClientResult<Subscription<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let key = key.into();
        let loader: Loader =
            Arc::new(move || loader().map(|r| r.map(|v| Arc::new(v) as Payload)).boxed());

        loop {
            let generation = {
                let mut state = self.state();
                let now = state.tick();
                match state.entries.get_mut(&key) {
                    Some(entry) => match (&entry.payload, entry.staleness) {
                        (Some(payload), Staleness::Fresh) => {
                            let payload = payload.clone();
                            entry.subscribers += 1;
                            entry.last_used = now;
                            let updates = entry.updates.subscribe();
                            drop(state);
                            metrics::record_cache("hit");
                            return self.subscription(key, payload, updates);
                        }
                        _ => {
                            entry.loading += 1;
                            entry.generation
                        }
                    },
                    None => {
                        // Placeholder so invalidations during the first load are seen.
                        state.index_entry(&key, &tags);
                        state.entries.insert(
                            key.clone(),
                            Entry {
                                tags: tags.clone(),
                                payload: None,
                                staleness: Staleness::Stale,
                                subscribers: 0,
                                loading: 1,
                                loader: loader.clone(),
                                generation: 0,
                                last_used: now,
                                updates: watch::channel(None).0,
                            },
                        );
                        0
                    }
                }
            };

            metrics::record_cache("miss");
            debug!(key = %key, "Cache miss, loading");
            let result = loader().await;

            let (payload, updates) = {
                let mut state = self.state();
                let current_generation = state.entries.get_mut(&key).map(|entry| {
                    entry.loading = entry.loading.saturating_sub(1);
                    entry.generation
                });

                let payload = match result {
                    Ok(payload) => payload,
                    Err(e) => {
                        let orphan = state.entries.get(&key).is_some_and(|e| {
                            e.payload.is_none() && e.subscribers == 0 && e.loading == 0
                        });
                        if orphan {
                            state.remove(&key);
                        }
                        state.evict_overflow(self.shared.capacity);
                        return Err(e.into());
                    }
                };

                // A missing entry cannot prove that no mutation happened.
                let invalidated = current_generation != Some(generation);
                if invalidated {
                    debug!(key = %key, "Invalidated while loading, reloading");
                    continue;
                }

                let updates = state.store(&key, tags.clone(), loader.clone(), payload.clone());
                state.evict_overflow(self.shared.capacity);
                (payload, updates)
            };

            return self.subscription(key, payload, updates);
        }
    }

    fn subscription<T: Send + Sync + 'static>(
        &self,
        key: QueryKey,
        payload: Payload,
        updates: watch::Receiver<Option<Payload>>,
    ) -> ClientResult<Subscription<T>> {
        match payload.downcast::<T>() {
            Ok(current) => Ok(Subscription {
                cache: self.clone(),
                key,
                current,
                updates,
            }),
            Err(_) => {
                self.release(&key);
                Err(ClientError::CacheTypeMismatch(key.to_string()))
            }
        }
    }

    /// Mark every entry providing a tag matched by `tags` as stale, then
    /// schedule one refetch for each such entry that has subscribers.
    ///
    /// Staleness is applied before this returns; refetches run as tasks on the
    /// current tokio runtime.
    pub fn invalidate(&self, tags: &[Tag]) -> Invalidation {
        let mut report = Invalidation::default();
        let mut refetches = Vec::new();

        {
            let mut state = self.state();
            for key in state.matching_keys(tags) {
                let Some(entry) = state.entries.get_mut(&key) else {
                    continue;
                };
                entry.staleness = Staleness::Stale;
                entry.generation += 1;
                metrics::record_cache("invalidated");

                if entry.subscribers > 0 && entry.payload.is_some() {
                    refetches.push((key.clone(), entry.loader.clone(), entry.generation));
                    report.refetching.push(key.clone());
                }
                report.stale.push(key);
            }
        }

        debug!(
            tags = ?tags.iter().map(Tag::to_string).collect::<Vec<_>>(),
            stale = report.stale.len(),
            refetching = report.refetching.len(),
            "Invalidated cache tags"
        );

        if refetches.is_empty() {
            return report;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                for (key, loader, generation) in refetches {
                    handle.spawn(self.clone().refetch(key, loader, generation));
                }
            }
            Err(_) => warn!("No async runtime; stale entries reload on next fetch"),
        }
        report
    }

    /// Mark one entry stale without refetching it or touching other entries
    /// that share its tags. Returns whether the entry existed.
    pub fn mark_stale(&self, key: &QueryKey) -> bool {
        let mut state = self.state();
        match state.entries.get_mut(key) {
            Some(entry) => {
                entry.staleness = Staleness::Stale;
                entry.generation += 1;
                true
            }
            None => false,
        }
    }

    /// Invalidate the tags a mutation declares.
    pub fn apply(&self, mutation: &Mutation) -> Invalidation {
        self.invalidate(&mutation.tags())
    }

    async fn refetch(self, key: QueryKey, loader: Loader, generation: u64) {
        metrics::record_cache("refetch");
        let result = loader().await;

        let mut state = self.state();
        let Some(entry) = state.entries.get_mut(&key) else {
            return;
        };
        if entry.generation != generation {
            debug!(key = %key, "Refetch superseded by a newer invalidation");
            return;
        }
        match result {
            Ok(payload) => {
                entry.payload = Some(payload.clone());
                entry.staleness = Staleness::Fresh;
                entry.updates.send_replace(Some(payload));
                debug!(key = %key, "Refetched");
            }
            Err(e) => warn!(key = %key, error = %e, "Refetch failed, entry stays stale"),
        }
    }

    /// Drop one unit of interest in `key`. At zero the entry may be evicted.
    fn release(&self, key: &QueryKey) {
        let mut state = self.state();
        if let Some(entry) = state.entries.get_mut(key) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
            if entry.subscribers == 0 {
                state.evict_overflow(self.shared.capacity);
            }
        }
    }

    pub fn staleness(&self, key: &QueryKey) -> Option<Staleness> {
        self.state()
            .entries
            .get(key)
            .filter(|e| e.payload.is_some())
            .map(|e| e.staleness)
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.state()
            .entries
            .get(key)
            .map(|e| e.subscribers)
            .unwrap_or(0)
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.state().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Interest in one cached view.
///
/// Holds the payload seen at subscription time and receives every refetched
/// payload. Dropping it releases the entry.
pub struct Subscription<T> {
    cache: QueryCache,
    key: QueryKey,
    current: Arc<T>,
    updates: watch::Receiver<Option<Payload>>,
}

impl<T: Send + Sync + 'static> Subscription<T> {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn get(&self) -> &T {
        &self.current
    }

    pub fn value(&self) -> Arc<T> {
        Arc::clone(&self.current)
    }

    pub fn is_stale(&self) -> bool {
        self.cache.staleness(&self.key) == Some(Staleness::Stale)
    }

    /// Wait for the next refetched payload. `None` once the entry is gone.
    pub async fn changed(&mut self) -> Option<Arc<T>> {
        loop {
            self.updates.changed().await.ok()?;
            let payload = self.updates.borrow_and_update().clone();
            if let Some(payload) = payload {
                let current = payload.downcast::<T>().ok()?;
                self.current = Arc::clone(&current);
                return Some(current);
            }
        }
    }

    pub fn release(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cache.release(&self.key);
    }
}

impl<T: fmt::Debug> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("current", &self.current)
            .finish()
    }
}
