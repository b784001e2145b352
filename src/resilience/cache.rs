//! Outbound response cache.
//!
//! # Responsibilities
//! - Store successful dependency results keyed by (dependency, key)
//! - Expire entries by TTL (checked on read)
//! - Optionally bound the entry count with least-recently-used eviction
//!
//! # Design Decisions
//! - Concurrent miss-then-populate races are last-write-wins
//! - Eviction scans for the oldest access tick; O(n) is acceptable for the
//!   bounded sizes this is configured with
//! - Lookups never touch breaker or retry state

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::config::CacheConfig;

/// Cache behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub enabled: bool,
    /// `None` means no expiry.
    pub ttl: Option<Duration>,
    /// `None` means unbounded.
    pub max_entries: Option<usize>,
}

impl CachePolicy {
    /// Unbounded, never-expiring cache.
    pub fn unbounded() -> Self {
        Self {
            enabled: true,
            ttl: None,
            max_entries: None,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ttl: None,
            max_entries: None,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            enabled: true,
            ttl: config.ttl_secs.map(Duration::from_secs),
            max_entries: config.max_entries,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    dependency: String,
    key: String,
}

impl CacheKey {
    fn new(dependency: &str, key: &str) -> Self {
        Self {
            dependency: dependency.to_string(),
            key: key.to_string(),
        }
    }
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Option<Duration>,
    last_access: AtomicU64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.ttl
            .map(|ttl| now.saturating_duration_since(self.inserted_at) >= ttl)
            .unwrap_or(false)
    }
}

/// A thread-safe cache for dependency results.
#[derive(Debug)]
pub struct ResponseCache<V> {
    policy: CachePolicy,
    entries: DashMap<CacheKey, CacheEntry<V>>,
    clock: AtomicU64,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: DashMap::new(),
            clock: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Fetch a live entry. Expired entries are removed and reported as a miss.
    pub fn get(&self, dependency: &str, key: &str) -> Option<V> {
        if !self.policy.enabled {
            return None;
        }
        let cache_key = CacheKey::new(dependency, key);
        let now = Instant::now();

        if let Some(entry) = self.entries.get(&cache_key) {
            if !entry.is_expired(now) {
                entry.last_access.store(self.tick(), Ordering::Relaxed);
                return Some(entry.value.clone());
            }
        } else {
            return None;
        }

        self.entries.remove_if(&cache_key, |_, entry| entry.is_expired(now));
        None
    }

    /// Store a value, evicting the least recently used entry when full.
    pub fn insert(&self, dependency: &str, key: &str, value: V) {
        if !self.policy.enabled {
            return;
        }
        let cache_key = CacheKey::new(dependency, key);

        if let Some(max) = self.policy.max_entries {
            if !self.entries.contains_key(&cache_key) {
                while self.entries.len() >= max {
                    if !self.evict_lru() {
                        break;
                    }
                }
            }
        }

        self.entries.insert(
            cache_key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl: self.policy.ttl,
                last_access: AtomicU64::new(self.tick()),
            },
        );
    }

    pub fn invalidate(&self, dependency: &str, key: &str) {
        self.entries.remove(&CacheKey::new(dependency, key));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn evict_lru(&self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().last_access.load(Ordering::Relaxed))
            .map(|entry| entry.key().clone());

        match oldest {
            Some(key) => {
                tracing::debug!(dependency = %key.dependency, key = %key.key, "Evicting cache entry");
                self.entries.remove(&key);
                true
            }
            None => false,
        }
    }
}
