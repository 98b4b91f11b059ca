use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{trace, warn};

/// Keyed pool of reusable runtime instances.
///
/// Each key owns its own idle list, so an instance initialized for one key is
/// never handed out for another. A single mutex guards the whole structure and
/// is held only for O(1) bookkeeping, never while an instance is built or
/// used. Instances are dropped outside the lock.
///
/// The pool is generic so the bookkeeping can be exercised without a script
/// engine:
///
/// ```
/// use jsfilter::RuntimePool;
///
/// let pool: RuntimePool<u32> = RuntimePool::new();
/// assert_eq!(pool.acquire("k"), None);
/// pool.register("k", 7);
/// assert_eq!(pool.acquire("k"), Some(7));
/// pool.release("k", 7);
/// assert_eq!(pool.stats("k").unwrap().idle, 1);
/// ```
pub struct RuntimePool<T> {
    entries: Mutex<HashMap<String, PoolEntry<T>>>,
    max_idle: Option<usize>,
}

struct PoolEntry<T> {
    idle: Vec<T>,
    loaded: bool,
    leased: usize,
    created: u64,
    discarded: u64,
}

impl<T> PoolEntry<T> {
    fn new() -> Self {
        Self {
            idle: Vec::new(),
            loaded: false,
            leased: 0,
            created: 0,
            discarded: 0,
        }
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.idle.len(),
            leased: self.leased,
            created: self.created,
            discarded: self.discarded,
            loaded: self.loaded,
        }
    }
}

/// Snapshot of one key's pool entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Instances waiting to be acquired.
    pub idle: usize,
    /// Instances currently held by callers.
    pub leased: usize,
    /// Instances ever built or registered for this key.
    pub created: u64,
    /// Instances dropped instead of being returned to the idle list.
    pub discarded: u64,
    /// Whether an initialized instance has ever been added for this key.
    pub loaded: bool,
}

impl<T> RuntimePool<T> {
    /// Create a pool with no cap on idle instances.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_idle(None)
    }

    /// Create a pool keeping at most `max_idle` idle instances per key.
    #[must_use]
    pub fn with_max_idle(max_idle: Option<usize>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_idle,
        }
    }

    /// Take an idle instance for `key`, if one exists.
    ///
    /// `None` means the caller must build a new instance. The entry for an
    /// unseen key is created either way.
    pub fn acquire(&self, key: &str) -> Option<T> {
        let mut entries = self.lock();
        let entry = entries.entry(key.to_owned()).or_insert_with(PoolEntry::new);
        let instance = entry.idle.pop();
        if instance.is_some() {
            entry.leased += 1;
        }
        trace!(key, hit = instance.is_some(), "acquire");
        instance
    }

    /// Add a freshly built, already initialized instance to `key`'s idle list.
    pub fn register(&self, key: &str, instance: T) {
        let mut entries = self.lock();
        let entry = entries.entry(key.to_owned()).or_insert_with(PoolEntry::new);
        entry.created += 1;
        entry.loaded = true;
        entry.idle.push(instance);
        trace!(key, "register");
    }

    /// Return an acquired instance to `key`'s idle list.
    ///
    /// When the idle list is already at capacity the instance is dropped and
    /// counted as discarded.
    pub fn release(&self, key: &str, instance: T) {
        let overflow = {
            let mut entries = self.lock();
            let entry = entries.entry(key.to_owned()).or_insert_with(PoolEntry::new);
            entry.leased = entry.leased.saturating_sub(1);
            if self.max_idle.is_some_and(|max| entry.idle.len() >= max) {
                entry.discarded += 1;
                Some(instance)
            } else {
                entry.idle.push(instance);
                None
            }
        };
        if let Some(instance) = overflow {
            warn!(key, "idle pool full, dropping released instance");
            drop(instance);
        } else {
            trace!(key, "release");
        }
    }

    /// Drop an acquired instance whose state can no longer be trusted.
    pub fn discard(&self, key: &str, instance: T) {
        {
            let mut entries = self.lock();
            let entry = entries.entry(key.to_owned()).or_insert_with(PoolEntry::new);
            entry.leased = entry.leased.saturating_sub(1);
            entry.discarded += 1;
        }
        warn!(key, "discarding instance");
        drop(instance);
    }

    /// Lease an instance for `key`, building one with `build` when none is idle.
    ///
    /// `build` runs without the lock held. A built instance goes straight to
    /// this caller; it joins the idle list when the lease is dropped. If
    /// `build` fails nothing is recorded for the key.
    ///
    /// # Errors
    ///
    /// Returns whatever error `build` returns.
    pub fn checkout<'a, E>(
        &'a self,
        key: &'a str,
        build: impl FnOnce() -> Result<T, E>,
    ) -> Result<Lease<'a, T>, E> {
        let instance = match self.acquire(key) {
            Some(instance) => instance,
            None => {
                let instance = build()?;
                self.record_created(key);
                instance
            }
        };
        Ok(Lease {
            pool: self,
            key,
            instance: Some(instance),
            poisoned: false,
        })
    }

    /// Statistics for `key`, or `None` if the key was never seen.
    #[must_use]
    pub fn stats(&self, key: &str) -> Option<PoolStats> {
        self.lock().get(key).map(PoolEntry::stats)
    }

    /// Every key seen so far, in arbitrary order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn record_created(&self, key: &str) {
        let mut entries = self.lock();
        let entry = entries.entry(key.to_owned()).or_insert_with(PoolEntry::new);
        entry.created += 1;
        entry.leased += 1;
        entry.loaded = true;
    }

    // Bookkeeping is never left half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, PoolEntry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for RuntimePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for RuntimePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.lock();
        let mut map = f.debug_map();
        for (key, entry) in entries.iter() {
            map.entry(key, &entry.stats());
        }
        map.finish()
    }
}

/// Exclusive use of a pooled instance.
///
/// Dropping the lease releases the instance back to its key, or discards it
/// if the lease was poisoned or the thread is panicking.
pub struct Lease<'a, T> {
    pool: &'a RuntimePool<T>,
    key: &'a str,
    instance: Option<T>,
    poisoned: bool,
}

impl<T> Lease<'_, T> {
    #[must_use]
    pub fn key(&self) -> &str {
        self.key
    }

    /// Mark the instance as unsafe to reuse; it is discarded on drop.
    pub fn poison(&mut self) {
        self.poisoned = true;
    }
}

impl<T> Deref for Lease<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.instance
            .as_ref()
            .expect("lease holds its instance until dropped")
    }
}

impl<T> DerefMut for Lease<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.instance
            .as_mut()
            .expect("lease holds its instance until dropped")
    }
}

impl<T> Drop for Lease<'_, T> {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            if self.poisoned || std::thread::panicking() {
                self.pool.discard(self.key, instance);
            } else {
                self.pool.release(self.key, instance);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_on_unseen_key_creates_empty_entry() {
        let pool: RuntimePool<u32> = RuntimePool::new();
        assert_eq!(pool.acquire("k"), None);
        assert_eq!(pool.stats("k"), Some(PoolStats::default()));
        assert_eq!(pool.stats("other"), None);
    }

    #[test]
    fn register_then_acquire_returns_instance() {
        let pool = RuntimePool::new();
        pool.register("k", 1_u32);
        let stats = pool.stats("k").unwrap();
        assert!(stats.loaded);
        assert_eq!(stats.created, 1);
        assert_eq!(pool.acquire("k"), Some(1));
        assert_eq!(pool.acquire("k"), None);
    }

    #[test]
    fn keys_are_partitioned() {
        let pool = RuntimePool::new();
        pool.register("a", 1_u32);
        assert_eq!(pool.acquire("b"), None);
        assert_eq!(pool.acquire("a"), Some(1));
        let mut keys = pool.keys();
        keys.sort();
        assert_eq!(keys, vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn release_makes_instance_idle_again() {
        let pool = RuntimePool::new();
        pool.register("k", 1_u32);
        let instance = pool.acquire("k").unwrap();
        assert_eq!(pool.stats("k").unwrap().leased, 1);
        pool.release("k", instance);
        let stats = pool.stats("k").unwrap();
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.leased, 0);
    }

    #[test]
    fn max_idle_drops_overflow() {
        let pool = RuntimePool::with_max_idle(Some(1));
        pool.release("k", 1_u32);
        pool.release("k", 2_u32);
        let stats = pool.stats("k").unwrap();
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.discarded, 1);
        assert_eq!(pool.acquire("k"), Some(1));
    }

    #[test]
    fn discard_counts_without_pooling() {
        let pool = RuntimePool::new();
        pool.register("k", 1_u32);
        let instance = pool.acquire("k").unwrap();
        pool.discard("k", instance);
        let stats = pool.stats("k").unwrap();
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.leased, 0);
        assert_eq!(stats.discarded, 1);
    }

    #[test]
    fn checkout_builds_once_then_reuses() {
        let pool = RuntimePool::new();
        let mut builds = 0;
        for _ in 0..3 {
            let lease = pool
                .checkout("k", || {
                    builds += 1;
                    Ok::<_, ()>(builds)
                })
                .unwrap();
            assert_eq!(*lease, 1);
        }
        assert_eq!(builds, 1);
        let stats = pool.stats("k").unwrap();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.leased, 0);
    }

    #[test]
    fn checkout_build_failure_records_nothing() {
        let pool: RuntimePool<u32> = RuntimePool::new();
        let result = pool.checkout("k", || Err("no runtime"));
        assert_eq!(result.err(), Some("no runtime"));
        let stats = pool.stats("k").unwrap();
        assert!(!stats.loaded);
        assert_eq!(stats.created, 0);
        assert_eq!(stats.idle, 0);
    }

    #[test]
    fn concurrent_leases_get_distinct_instances() {
        let pool = RuntimePool::new();
        let mut next = 0_u32;
        let mut build = || {
            next += 1;
            Ok::<_, ()>(next)
        };
        let first = pool.checkout("k", &mut build).unwrap();
        let second = pool.checkout("k", &mut build).unwrap();
        assert_ne!(*first, *second);
        drop(first);
        drop(second);
        assert_eq!(pool.stats("k").unwrap().idle, 2);
    }

    #[test]
    fn poisoned_lease_is_discarded() {
        let pool = RuntimePool::new();
        {
            let mut lease = pool.checkout("k", || Ok::<_, ()>(1_u32)).unwrap();
            *lease += 1;
            lease.poison();
            assert_eq!(lease.key(), "k");
        }
        let stats = pool.stats("k").unwrap();
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.discarded, 1);
    }

    #[test]
    fn lease_dropped_during_panic_is_discarded() {
        let pool = RuntimePool::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _lease = pool.checkout("k", || Ok::<_, ()>(1_u32)).unwrap();
            panic!("evaluation blew up");
        }));
        assert!(result.is_err());
        let stats = pool.stats("k").unwrap();
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.discarded, 1);
    }

    #[test]
    fn debug_lists_keys() {
        let pool = RuntimePool::new();
        pool.register("k", 1_u32);
        assert!(format!("{pool:?}").contains("\"k\""));
    }
}
