//! In-memory query cache with request deduplication and tag invalidation.
//!
//! Each descriptor owns one entry. Entries publish immutable snapshots over
//! a `watch` channel; subscribers read the latest one and await changes.
//! Fetches run as spawned tasks and carry a request id: only the response
//! to the most recent request for an entry is applied.
//!
//! The state lock is never held across an `.await`.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError, ApiRequest, Envelope};

use super::{DescriptorKey, QueryDescriptor, QuerySnapshot, Tag};

/// How long an entry without subscribers is kept for quick back-navigation.
pub const DEFAULT_IDLE_GRACE: Duration = Duration::from_secs(60);

struct Entry {
    /// Distinguishes this entry from a later one under the same key.
    id: u64,
    descriptor: QueryDescriptor,
    tags: BTreeSet<Tag>,
    sender: watch::Sender<Arc<QuerySnapshot>>,
    /// A refetch is needed and has not been issued yet.
    stale: bool,
    subscribers: usize,
    /// Id of the outstanding request whose response will be applied.
    latest_request: Option<u64>,
    /// Bumped on every subscribe and on the last unsubscribe, so a pending
    /// eviction can tell whether the entry was touched in between.
    idle_generation: u64,
}

impl Entry {
    fn new(id: u64, descriptor: QueryDescriptor) -> Self {
        let (sender, _) = watch::channel(Arc::new(QuerySnapshot::initial()));
        Self {
            id,
            descriptor,
            tags: BTreeSet::new(),
            sender,
            stale: false,
            subscribers: 0,
            latest_request: None,
            idle_generation: 0,
        }
    }

    fn snapshot(&self) -> Arc<QuerySnapshot> {
        self.sender.borrow().clone()
    }

    fn publish(&self, snapshot: QuerySnapshot) {
        self.sender.send_replace(Arc::new(snapshot));
    }

    /// A stale entry always needs a new request, even with one in flight:
    /// that request was issued before the invalidation.
    fn needs_fetch(&self) -> bool {
        self.stale || (self.latest_request.is_none() && !self.snapshot().is_success())
    }
}

/// A request that was registered under the lock and must now be sent.
struct PendingFetch {
    key: DescriptorKey,
    request_id: u64,
    request: ApiRequest,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<DescriptorKey, Entry>,
    tag_index: HashMap<Tag, HashSet<DescriptorKey>>,
    next_id: u64,
}

impl CacheState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Register a new request for `key`, superseding any outstanding one.
    fn begin_fetch(&mut self, key: &DescriptorKey) -> Option<PendingFetch> {
        let request_id = self.next_id();
        let entry = self.entries.get_mut(key)?;
        entry.latest_request = Some(request_id);
        entry.stale = false;
        let refreshing = entry.snapshot().refreshing();
        entry.publish(refreshing);

        Some(PendingFetch {
            key: key.clone(),
            request_id,
            request: entry.descriptor.request(),
        })
    }

    fn remove(&mut self, key: &DescriptorKey) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        for tag in &entry.tags {
            if let Some(keys) = self.tag_index.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_index.remove(tag);
                }
            }
        }
        Some(entry)
    }
}

struct Inner {
    client: ApiClient,
    idle_grace: Duration,
    state: Mutex<CacheState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn apply(&self, key: &DescriptorKey, request_id: u64, result: Result<Envelope, ApiError>) {
        let mut state = self.lock();
        let Some(entry) = state.entries.get_mut(key) else {
            debug!(key = %key, request_id, "Response for evicted entry dropped");
            return;
        };
        if entry.latest_request != Some(request_id) {
            debug!(key = %key, request_id, "Dropping superseded response");
            return;
        }
        entry.latest_request = None;

        let current = entry.snapshot();
        let next = match result {
            Ok(envelope) => QuerySnapshot::success(envelope.data.unwrap_or(Value::Null)),
            Err(error) => {
                if current.data.is_some() {
                    warn!(key = %key, error = %error, "Refresh failed, keeping previous data");
                } else {
                    debug!(key = %key, error = %error, "Fetch failed");
                }
                current.failed(error)
            }
        };
        entry.publish(next);
    }

    fn evict_if_idle(&self, key: &DescriptorKey, entry_id: u64, generation: u64) {
        let mut state = self.lock();
        let idle = state
            .entries
            .get(key)
            .map(|e| e.id == entry_id && e.subscribers == 0 && e.idle_generation == generation)
            .unwrap_or(false);
        if idle {
            state.remove(key);
            debug!(key = %key, "Evicted idle cache entry");
        }
    }
}

/// Shared cache of fetched resources.
///
/// Clone is cheap; clones share the same entries. Subscribing and
/// invalidating spawn fetch tasks, so they must run inside a Tokio runtime.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl QueryCache {
    pub fn new(client: ApiClient) -> Self {
        Self::with_idle_grace(client, DEFAULT_IDLE_GRACE)
    }

    pub fn with_idle_grace(client: ApiClient, idle_grace: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                idle_grace,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.inner.client
    }

    /// Subscribe to a descriptor, fetching it when missing, failed or stale.
    ///
    /// Concurrent subscribers of the same descriptor share one request.
    pub fn subscribe(&self, descriptor: QueryDescriptor, tags: &[Tag]) -> Subscription {
        let key = descriptor.key();

        let (entry_id, receiver, fetch) = {
            let mut state = self.inner.lock();
            let candidate_id = state.next_id();
            let entry = state
                .entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(candidate_id, descriptor));

            entry.tags.extend(tags.iter().copied());
            entry.subscribers += 1;
            entry.idle_generation += 1;

            let entry_id = entry.id;
            let receiver = entry.sender.subscribe();
            let in_flight = entry.latest_request.is_some();
            let needs_fetch = entry.needs_fetch();

            for tag in tags {
                state.tag_index.entry(*tag).or_default().insert(key.clone());
            }

            let fetch = if needs_fetch {
                state.begin_fetch(&key)
            } else {
                if in_flight {
                    debug!(key = %key, "Joining in-flight request");
                } else {
                    debug!(key = %key, "Cache hit");
                }
                None
            };

            (entry_id, receiver, fetch)
        };

        if let Some(fetch) = fetch {
            self.spawn_fetch(fetch);
        }

        Subscription {
            cache: self.clone(),
            key,
            entry_id,
            receiver,
        }
    }

    /// Perform a write and, on success, invalidate `invalidates`.
    ///
    /// A failed write invalidates nothing.
    pub async fn mutate(&self, request: &ApiRequest, invalidates: &[Tag]) -> Result<Envelope, ApiError> {
        let envelope = self.inner.client.request(request).await?;
        let refetched = self.invalidate(invalidates);
        debug!(
            method = %request.method,
            path = %request.path,
            refetched,
            "Mutation succeeded"
        );
        Ok(envelope)
    }

    /// Mark every entry carrying one of `tags` stale.
    ///
    /// Subscribed entries refetch right away, once each; the rest refetch
    /// on their next subscribe. Returns the number of refetches started.
    pub fn invalidate(&self, tags: &[Tag]) -> usize {
        let fetches: Vec<PendingFetch> = {
            let mut state = self.inner.lock();
            let keys: BTreeSet<DescriptorKey> = tags
                .iter()
                .filter_map(|tag| state.tag_index.get(tag))
                .flatten()
                .cloned()
                .collect();

            let mut fetches = Vec::new();
            for key in keys {
                let subscribed = match state.entries.get_mut(&key) {
                    Some(entry) => {
                        entry.stale = true;
                        entry.subscribers > 0
                    }
                    None => false,
                };
                if subscribed {
                    fetches.extend(state.begin_fetch(&key));
                }
            }
            fetches
        };

        let count = fetches.len();
        for fetch in fetches {
            self.spawn_fetch(fetch);
        }
        count
    }

    /// Force a new request for a cached descriptor.
    /// Returns `false` when the descriptor is not cached.
    pub fn refetch(&self, descriptor: &QueryDescriptor) -> bool {
        self.refetch_key(&descriptor.key())
    }

    fn refetch_key(&self, key: &DescriptorKey) -> bool {
        let fetch = self.inner.lock().begin_fetch(key);
        match fetch {
            Some(fetch) => {
                self.spawn_fetch(fetch);
                true
            }
            None => false,
        }
    }

    /// Latest snapshot for a descriptor, without subscribing.
    pub fn snapshot(&self, descriptor: &QueryDescriptor) -> Option<Arc<QuerySnapshot>> {
        self.inner
            .lock()
            .entries
            .get(&descriptor.key())
            .map(|e| e.snapshot())
    }

    pub fn is_stale(&self, descriptor: &QueryDescriptor) -> bool {
        self.inner
            .lock()
            .entries
            .get(&descriptor.key())
            .map(|e| e.stale)
            .unwrap_or(false)
    }

    pub fn subscriber_count(&self, descriptor: &QueryDescriptor) -> usize {
        self.inner
            .lock()
            .entries
            .get(&descriptor.key())
            .map(|e| e.subscribers)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. Live subscriptions receive a final error snapshot.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        for (_, entry) in state.entries.drain() {
            let ended = entry
                .snapshot()
                .failed(ApiError::Unauthorized("session ended".to_string()));
            entry.publish(ended);
        }
        state.tag_index.clear();
        debug!("Query cache cleared");
    }

    fn spawn_fetch(&self, fetch: PendingFetch) {
        debug!(key = %fetch.key, request_id = fetch.request_id, "Fetching");
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let result = inner.client.request(&fetch.request).await;
            inner.apply(&fetch.key, fetch.request_id, result);
        });
    }

    fn unsubscribe(&self, key: &DescriptorKey, entry_id: u64) {
        let generation = {
            let mut state = self.inner.lock();
            match state.entries.get_mut(key) {
                Some(entry) if entry.id == entry_id => {
                    entry.subscribers = entry.subscribers.saturating_sub(1);
                    if entry.subscribers == 0 {
                        entry.idle_generation += 1;
                        Some(entry.idle_generation)
                    } else {
                        None
                    }
                }
                _ => None,
            }
        };

        if let Some(generation) = generation {
            self.schedule_eviction(key.clone(), entry_id, generation);
        }
    }

    fn schedule_eviction(&self, key: DescriptorKey, entry_id: u64, generation: u64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(key = %key, "No runtime to schedule eviction, entry kept");
            return;
        };
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let grace = self.inner.idle_grace;
        handle.spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(inner) = weak.upgrade() {
                inner.evict_if_idle(&key, entry_id, generation);
            }
        });
    }
}

/// A live interest in one descriptor. Dropping it unsubscribes.
pub struct Subscription {
    cache: QueryCache,
    key: DescriptorKey,
    entry_id: u64,
    receiver: watch::Receiver<Arc<QuerySnapshot>>,
}

impl Subscription {
    pub fn key(&self) -> &DescriptorKey {
        &self.key
    }

    /// The latest snapshot.
    pub fn current(&self) -> Arc<QuerySnapshot> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next snapshot.
    ///
    /// Once the entry is gone and its final snapshot has been seen, this
    /// never resolves, so it can sit in a `select!` loop without spinning.
    pub async fn changed(&mut self) -> Arc<QuerySnapshot> {
        if self.receiver.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        self.receiver.borrow_and_update().clone()
    }

    /// Wait until the entry is no longer loading.
    pub async fn resolved(&mut self) -> Arc<QuerySnapshot> {
        loop {
            let snapshot = self.receiver.borrow_and_update().clone();
            if !snapshot.is_loading() {
                return snapshot;
            }
            if self.receiver.changed().await.is_err() {
                return self.receiver.borrow().clone();
            }
        }
    }

    /// Force a new request for this descriptor.
    pub fn refetch(&self) -> bool {
        self.cache.refetch_key(&self.key)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cache.unsubscribe(&self.key, self.entry_id);
    }
}
