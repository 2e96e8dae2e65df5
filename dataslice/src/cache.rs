//! Process-wide result cache with configurable retention
//!
//! Realized results are cached per `(location, internal path)` key under
//! one of three retention strengths, chosen once per process:
//!
//! - `none`: never retain; every non-concurrent request reloads.
//! - `weak`: retain only while some consumer still holds the value.
//! - `soft` (default): retain in an LRU store bounded by a byte budget,
//!   with an explicit [`ResultCache::reclaim`] hook for callers that
//!   detect memory pressure.
//!
//! Independent of retention, concurrent `get_or_load` calls for the same
//! key share a single underlying load (the single-flight guarantee).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use hashbrown::HashMap;
use lru::LruCache;
use tracing::{debug, trace, warn};

use crate::array::RealizedDataset;
use crate::error::{DatasetError, Result};

/// Environment variable naming the process-wide retention policy
pub const POLICY_ENV: &str = "DATASLICE_CACHE_POLICY";

/// Environment variable naming the soft-policy byte budget
pub const BUDGET_ENV: &str = "DATASLICE_CACHE_BYTES";

/// Default soft-policy byte budget (256 MiB)
pub const DEFAULT_BUDGET: usize = 256 * 1024 * 1024;

/// Values that can report their resident size for budget accounting
pub trait CacheWeight {
    /// Approximate resident size in bytes
    fn weight(&self) -> usize;
}

impl CacheWeight for RealizedDataset {
    fn weight(&self) -> usize {
        self.data().byte_len() + self.name().len()
    }
}

/// Request key: storage location plus internal dataset path, both
/// opaque strings
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct CacheKey {
    location: String,
    dataset_path: String,
}

impl CacheKey {
    pub fn new(location: impl Into<String>, dataset_path: impl Into<String>) -> Self {
        CacheKey {
            location: location.into(),
            dataset_path: dataset_path.into(),
        }
    }
}

/// Retention strength applied to cached values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Never retain
    None,
    /// Retain only while an external holder keeps the value alive
    Weak,
    /// Retain in an LRU store bounded by a byte budget
    Soft,
}

impl RetentionPolicy {
    /// Parse a policy name from configuration; unknown names fall back
    /// to the default with a warning rather than failing startup.
    fn from_config(name: &str) -> RetentionPolicy {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" => RetentionPolicy::None,
            "weak" => RetentionPolicy::Weak,
            "soft" => RetentionPolicy::Soft,
            other => {
                warn!(policy = other, "unknown cache policy, using soft");
                RetentionPolicy::Soft
            }
        }
    }
}

/// Hit/miss/eviction counters for one cache
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    loads: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }
}

/// One in-flight load; waiters block on the condvar until the loading
/// caller publishes the outcome.
struct Flight<V> {
    outcome: Mutex<Option<std::result::Result<Arc<V>, String>>>,
    done: Condvar,
}

impl<V> Flight<V> {
    fn new() -> Self {
        Flight {
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn publish(&self, outcome: std::result::Result<Arc<V>, String>) {
        let mut slot = lock(&self.outcome);
        *slot = Some(outcome);
        self.done.notify_all();
    }

    fn wait(&self) -> std::result::Result<Arc<V>, String> {
        let mut slot = lock(&self.outcome);
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            slot = self
                .done
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

struct CacheInner<V> {
    strong: LruCache<CacheKey, Arc<V>>,
    strong_bytes: usize,
    weak: HashMap<CacheKey, Weak<V>>,
    flights: HashMap<CacheKey, Arc<Flight<V>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cache of realized results keyed by request, with single-flight loads
pub struct ResultCache<V> {
    policy: RetentionPolicy,
    max_bytes: usize,
    inner: Mutex<CacheInner<V>>,
    stats: CacheStats,
}

impl<V: CacheWeight> ResultCache<V> {
    /// Create a cache with an explicit policy and soft-policy budget
    pub fn new(policy: RetentionPolicy, max_bytes: usize) -> Self {
        ResultCache {
            policy,
            max_bytes,
            inner: Mutex::new(CacheInner {
                strong: LruCache::unbounded(),
                strong_bytes: 0,
                weak: HashMap::new(),
                flights: HashMap::new(),
            }),
            stats: CacheStats::default(),
        }
    }

    /// The active retention policy
    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Counters for this cache
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Number of strongly retained entries
    pub fn len(&self) -> usize {
        lock(&self.inner).strong.len()
    }

    /// Whether the strong store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached value for `key`, or run `load` to produce it.
    ///
    /// At most one concurrent load runs per key; every concurrent caller
    /// receives the value that load produced. When the load fails, the
    /// loading caller gets the original error and waiting callers get a
    /// `Cache` error carrying its rendered message; nothing is retained,
    /// so a later call retries.
    pub fn get_or_load<F>(&self, key: &CacheKey, load: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Result<V>,
    {
        let flight = {
            let mut inner = lock(&self.inner);
            if let Some(value) = self.lookup(&mut inner, key) {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                trace!(?key, "cache hit");
                return Ok(value);
            }
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            if let Some(flight) = inner.flights.get(key) {
                let flight = Arc::clone(flight);
                drop(inner);
                trace!(?key, "joining in-flight load");
                return flight.wait().map_err(DatasetError::Cache);
            }
            let flight = Arc::new(Flight::new());
            inner.flights.insert(key.clone(), Arc::clone(&flight));
            flight
        };

        self.stats.loads.fetch_add(1, Ordering::Relaxed);
        let outcome = load();

        let mut inner = lock(&self.inner);
        inner.flights.remove(key);
        match outcome {
            Ok(value) => {
                let value = Arc::new(value);
                self.retain(&mut inner, key, &value);
                drop(inner);
                flight.publish(Ok(Arc::clone(&value)));
                Ok(value)
            }
            Err(err) => {
                drop(inner);
                flight.publish(Err(err.to_string()));
                Err(err)
            }
        }
    }

    /// Drop strongly retained entries until at most `target_bytes`
    /// remain. Callers invoke this on memory pressure; the `soft`
    /// policy's stand-in for allocator-driven reclamation.
    pub fn reclaim(&self, target_bytes: usize) {
        let mut inner = lock(&self.inner);
        while inner.strong_bytes > target_bytes {
            match inner.strong.pop_lru() {
                Some((_, evicted)) => {
                    inner.strong_bytes -= evicted.weight();
                    self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                }
                None => break,
            }
        }
        debug!(resident = inner.strong_bytes, "cache reclaimed");
    }

    /// Drop every retained entry
    pub fn clear(&self) {
        let mut inner = lock(&self.inner);
        inner.strong.clear();
        inner.strong_bytes = 0;
        inner.weak.clear();
    }

    fn lookup(&self, inner: &mut CacheInner<V>, key: &CacheKey) -> Option<Arc<V>> {
        match self.policy {
            RetentionPolicy::None => None,
            RetentionPolicy::Weak => match inner.weak.get(key).and_then(Weak::upgrade) {
                Some(value) => Some(value),
                None => {
                    inner.weak.remove(key);
                    None
                }
            },
            RetentionPolicy::Soft => inner.strong.get(key).cloned(),
        }
    }

    fn retain(&self, inner: &mut CacheInner<V>, key: &CacheKey, value: &Arc<V>) {
        match self.policy {
            RetentionPolicy::None => {}
            RetentionPolicy::Weak => {
                inner.weak.retain(|_, held| held.strong_count() > 0);
                inner.weak.insert(key.clone(), Arc::downgrade(value));
            }
            RetentionPolicy::Soft => {
                let weight = value.weight();
                if let Some(previous) = inner.strong.put(key.clone(), Arc::clone(value)) {
                    inner.strong_bytes -= previous.weight();
                }
                inner.strong_bytes += weight;
                while inner.strong_bytes > self.max_bytes {
                    match inner.strong.pop_lru() {
                        Some((_, evicted)) => {
                            inner.strong_bytes -= evicted.weight();
                            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                        }
                        None => break,
                    }
                }
            }
        }
    }
}

impl ResultCache<RealizedDataset> {
    /// The process-wide cache for realized datasets.
    ///
    /// Policy and budget are read from the environment on first use and
    /// stay fixed for the life of the process.
    pub fn global() -> &'static ResultCache<RealizedDataset> {
        static GLOBAL: OnceLock<ResultCache<RealizedDataset>> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let policy = std::env::var(POLICY_ENV)
                .map(|name| RetentionPolicy::from_config(&name))
                .unwrap_or(RetentionPolicy::Soft);
            let max_bytes = std::env::var(BUDGET_ENV)
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_BUDGET);
            debug!(?policy, max_bytes, "result cache configured");
            ResultCache::new(policy, max_bytes)
        })
    }
}
