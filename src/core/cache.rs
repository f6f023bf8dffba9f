//! Keyed cache of asynchronously produced render artifacts.
//!
//! [`RenderCache`] guarantees at most one in-flight computation per key.
//! The first caller for a fresh key inserts a pending slot under the map
//! lock before it awaits anything; callers arriving while the slot is
//! pending join the same [`Flight`](super::flight::Flight) instead of
//! rendering again. Once the computation succeeds the slot is promoted to a
//! resolved entry. A failed or abandoned computation leaves nothing behind,
//! so the next request retries from scratch.
//!
//! Pending slots are never visible to [`RenderCache::peek`] or
//! [`RenderCache::has`].

use super::error::RenderResult;
use super::flight::{Flight, FlightWaiter};
use super::key::CacheKey;
use log::debug;
use lru::LruCache;
use rustc_hash::FxHashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Snapshot of cache counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests served from a resolved entry
    pub hits: usize,
    /// Requests that joined a pending computation
    pub joins: usize,
    /// Requests that started a computation
    pub misses: usize,
    /// Computations that failed or were abandoned
    pub failures: usize,
}

#[derive(Default)]
struct Counters {
    hits: AtomicUsize,
    joins: AtomicUsize,
    misses: AtomicUsize,
    failures: AtomicUsize,
}

struct PendingSlot<E> {
    generation: u64,
    waiter: FlightWaiter<Arc<E>>,
}

struct CacheState<E> {
    resolved: LruCache<CacheKey, Arc<E>>,
    pending: FxHashMap<CacheKey, PendingSlot<E>>,
}

enum Lookup<'a, E> {
    Hit(Arc<E>),
    Join(FlightWaiter<Arc<E>>),
    Own(OwnedFlight<'a, E>),
}

/// Generic keyed store of async-produced artifacts.
///
/// # Example
/// ```
/// use canvas_render::core::{CacheKey, RenderCache};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let cache: RenderCache<String> = RenderCache::new();
/// let key = CacheKey::from("greeting");
///
/// let entry = cache
///     .get_or_render(&key, || async { Ok("hello".to_string()) })
///     .await?;
/// assert_eq!(entry.as_str(), "hello");
/// assert!(cache.has(&key));
/// # Ok::<(), canvas_render::RenderError>(())
/// # }).unwrap();
/// ```
pub struct RenderCache<E> {
    state: Mutex<CacheState<E>>,
    next_generation: AtomicU64,
    counters: Counters,
}

impl<E> RenderCache<E> {
    /// Creates an unbounded cache.
    pub fn new() -> Self {
        Self::with_lru(LruCache::unbounded())
    }

    /// Creates a cache that keeps at most `capacity` resolved entries,
    /// evicting the least recently used one.
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self::with_lru(LruCache::new(capacity))
    }

    fn with_lru(resolved: LruCache<CacheKey, Arc<E>>) -> Self {
        Self {
            state: Mutex::new(CacheState {
                resolved,
                pending: FxHashMap::default(),
            }),
            next_generation: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the entry for `key`, rendering it with `render` if needed.
    ///
    /// `render` runs at most once per key at a time, and only for the caller
    /// that found the key absent.
    pub async fn get_or_render<F, Fut>(&self, key: &CacheKey, render: F) -> RenderResult<Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RenderResult<E>>,
    {
        let owned = match self.lookup(key) {
            Lookup::Hit(entry) => {
                debug!("render cache hit: {}", key);
                return Ok(entry);
            }
            Lookup::Join(waiter) => {
                debug!("render cache join: {}", key);
                return waiter.wait().await;
            }
            Lookup::Own(owned) => owned,
        };

        debug!("render cache miss: {}", key);
        let result = render().await.map(Arc::new);
        owned.finish(result.clone());
        result
    }

    fn lookup(&self, key: &CacheKey) -> Lookup<'_, E> {
        let mut state = self.lock();

        if let Some(entry) = state.resolved.get(key) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Lookup::Hit(Arc::clone(entry));
        }

        if let Some(slot) = state.pending.get(key) {
            self.counters.joins.fetch_add(1, Ordering::Relaxed);
            return Lookup::Join(slot.waiter.clone());
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (flight, waiter) = Flight::new();
        state
            .pending
            .insert(key.clone(), PendingSlot { generation, waiter });

        Lookup::Own(OwnedFlight {
            cache: self,
            key: key.clone(),
            generation,
            flight: Some(flight),
        })
    }

    /// Returns the entry for `key` only if it is fully resolved.
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<E>> {
        self.lock().resolved.get(key).cloned()
    }

    /// Returns true if a resolved entry exists for `key`.
    pub fn has(&self, key: &CacheKey) -> bool {
        self.lock().resolved.contains(key)
    }

    /// Returns true while a computation for `key` is in flight.
    pub fn is_pending(&self, key: &CacheKey) -> bool {
        self.lock().pending.contains_key(key)
    }

    /// Removes the entry for `key`, resolved or pending.
    ///
    /// Callers already awaiting a pending computation still receive its
    /// result, but the result is not stored.
    pub fn invalidate(&self, key: &CacheKey) {
        let mut state = self.lock();
        let removed = state.resolved.pop(key).is_some() | state.pending.remove(key).is_some();
        if removed {
            debug!("render cache invalidated: {}", key);
        }
    }

    /// Removes every entry.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.resolved.clear();
        state.pending.clear();
        debug!("render cache cleared");
    }

    /// Number of resolved entries.
    pub fn len(&self) -> usize {
        self.lock().resolved.len()
    }

    /// Number of computations in flight.
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        let state = self.lock();
        state.resolved.is_empty() && state.pending.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            joins: self.counters.joins.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }
}

impl<E> Default for RenderCache<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// The computation slot held by the caller that missed.
///
/// Dropping it without calling [`OwnedFlight::finish`] removes the pending
/// slot and wakes joiners with
/// [`RenderError::Abandoned`](super::error::RenderError::Abandoned).
struct OwnedFlight<'a, E> {
    cache: &'a RenderCache<E>,
    key: CacheKey,
    generation: u64,
    flight: Option<Flight<Arc<E>>>,
}

impl<E> OwnedFlight<'_, E> {
    fn finish(mut self, result: RenderResult<Arc<E>>) {
        {
            let mut state = self.cache.lock();
            // Only promote our own slot. After an invalidate the slot is gone
            // or belongs to a newer computation.
            let ours = state
                .pending
                .get(&self.key)
                .is_some_and(|slot| slot.generation == self.generation);
            if ours {
                state.pending.remove(&self.key);
                if let Ok(entry) = &result {
                    state.resolved.put(self.key.clone(), Arc::clone(entry));
                }
            } else {
                debug!("render cache dropped stale result: {}", self.key);
            }
        }

        if result.is_err() {
            self.cache.counters.failures.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(flight) = self.flight.take() {
            flight.complete(result);
        }
    }
}

impl<E> Drop for OwnedFlight<'_, E> {
    fn drop(&mut self) {
        if self.flight.is_none() {
            return;
        }

        let mut state = self.cache.lock();
        let ours = state
            .pending
            .get(&self.key)
            .is_some_and(|slot| slot.generation == self.generation);
        if ours {
            state.pending.remove(&self.key);
        }
        self.cache.counters.failures.fetch_add(1, Ordering::Relaxed);
        debug!("render cache abandoned: {}", self.key);
        // Dropping the flight closes the channel; joiners see Abandoned.
    }
}
