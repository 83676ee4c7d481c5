//! Time-bounded cache of rendered search pages.
//!
//! Entries expire [`CACHE_TTL`] after insertion. Expiry is checked lazily on
//! lookup: a stale entry is removed the first time [`ResultCache::get`] sees
//! it. Under [`EvictionPolicy::Unbounded`] an entry that is never looked up
//! again stays in memory until [`ResultCache::purge_expired`] runs, either
//! explicitly or from a sweeper started with [`spawn_sweeper`].

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// How long a cached page stays fresh: 30 days.
pub const CACHE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Source of the current time for expiry decisions.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }

    /// Sets the clock to `origin + offset`.
    pub fn set(&self, offset: Duration) {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner) = offset;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Bound on the number of cached pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// No capacity bound; entries leave only through expiry.
    #[default]
    Unbounded,
    /// Keep at most `capacity` entries, evicting the least recently used.
    Lru { capacity: NonZeroUsize },
}

impl EvictionPolicy {
    /// Builds a policy from an optional maximum entry count.
    ///
    /// `None` and `Some(0)` both mean unbounded.
    pub fn from_max_entries(max_entries: Option<usize>) -> Self {
        match max_entries.and_then(NonZeroUsize::new) {
            Some(capacity) => Self::Lru { capacity },
            None => Self::Unbounded,
        }
    }
}

/// A rendered page stored in the cache.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Normalized query the page was rendered for.
    pub key: String,
    /// Rendered response body.
    pub body: Bytes,
    /// Declared MIME type of `body`.
    pub content_type: String,
    /// When the entry was stored.
    pub inserted_at: Instant,
}

/// Shared cache of rendered search pages keyed by query.
///
/// All operations take a short internal lock and never await while holding
/// it, so the cache can be shared freely between request tasks.
pub struct ResultCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
    policy: EvictionPolicy,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    /// Creates a cache with the given policy and the system clock.
    pub fn new(policy: EvictionPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    /// Creates a cache that reads time from `clock`.
    pub fn with_clock(policy: EvictionPolicy, clock: Arc<dyn Clock>) -> Self {
        let entries = match policy {
            EvictionPolicy::Unbounded => LruCache::unbounded(),
            EvictionPolicy::Lru { capacity } => LruCache::new(capacity),
        };
        Self {
            entries: Mutex::new(entries),
            ttl: CACHE_TTL,
            policy,
            clock,
        }
    }

    /// Returns the live entry for `key`.
    ///
    /// An expired entry is removed and reported as absent.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now();
        let mut entries = self.lock();

        let expired = match entries.get(key) {
            Some(entry) if !self.is_expired(entry, now) => return Some(entry.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
            debug!("Evicted expired cache entry for {:?}", key);
        }
        None
    }

    /// Stores a rendered page under `key`, replacing any previous entry.
    pub fn put(&self, key: impl Into<String>, body: impl Into<Bytes>, content_type: impl Into<String>) {
        let key = key.into();
        let entry = CacheEntry {
            key: key.clone(),
            body: body.into(),
            content_type: content_type.into(),
            inserted_at: self.clock.now(),
        };

        // `push` also hands back the old value when `key` was already present.
        let evicted = match self.lock().push(key.clone(), entry) {
            Some((old_key, _)) if old_key != key => Some(old_key),
            _ => None,
        };
        if let Some(old_key) = evicted {
            debug!("Cache at capacity, evicted {:?}", old_key);
        }
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();

        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            entries.pop(key);
        }
        stale.len()
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Time-to-live applied to entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Eviction policy this cache was built with.
    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.inserted_at) > self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("len", &self.len())
            .field("ttl", &self.ttl)
            .field("policy", &self.policy)
            .finish()
    }
}

/// Spawns a task that purges expired entries every `every`.
pub fn spawn_sweeper(cache: Arc<ResultCache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                info!("Cache sweep purged {} expired entries", purged);
            }
        }
    })
}
