use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Eviction hint for cached entries. Prefetched pages use `Low` so a warm
/// cache never crowds out responses a user actually asked for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CachePriority {
    Low,
    #[default]
    Normal,
    High,
}

/// A cache backend failure. The fetch layer treats these as misses.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Metadata written alongside a cached value.
#[derive(Clone, Debug)]
pub struct CacheWriteOptions {
    pub ttl: Duration,
    pub priority: CachePriority,
    pub tags: Vec<String>,
}

/// Key-value store with TTL, priority and tag metadata. The in-memory
/// [`MemoryCache`] is the shipped implementation; any conforming backend
/// (e.g. one shared across browser tabs or processes) can be injected.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;
    fn set(&self, key: &str, value: Value, options: CacheWriteOptions) -> Result<(), CacheError>;
    /// Non-counting lookup used to decide whether a prefetch is worthwhile.
    fn contains(&self, key: &str) -> Result<bool, CacheError>;
    fn clear(&self) -> Result<(), CacheError>;
    /// Removes entries carrying at least one of the given tags; returns how
    /// many were removed.
    fn clear_by_tags(&self, tags: &[String]) -> Result<usize, CacheError>;
    fn stats(&self) -> CacheStats;
}

/// Configuration for [`MemoryCache`].
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Maximum number of cached entries before eviction kicks in.
    pub max_entries: usize,
    /// Whether caching is enabled at all.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            enabled: true,
        }
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    value: Value,
    created_at: DateTime<Utc>,
    ttl: Duration,
    priority: CachePriority,
    tags: Vec<String>,
    approx_size: usize,
}

impl CacheEntry {
    fn is_valid(&self) -> bool {
        Utc::now() < self.created_at + self.ttl
    }
}

/// In-memory cache on a `DashMap`. Expiry is evaluated lazily on lookup;
/// capacity pressure evicts expired entries first, then the oldest slice of
/// the lowest-priority entries.
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Removes every expired entry.
    pub fn evict_expired(&self) {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| !entry.value().is_valid())
            .map(|entry| entry.key().clone())
            .collect();

        let count = expired.len();
        for key in expired {
            self.entries.remove(&key);
        }

        if count > 0 {
            log::debug!("evicted {count} expired cache entries");
        }
    }

    /// Removes the oldest quarter of entries, lowest priority first.
    fn evict_oldest(&self) {
        let mut entries: Vec<(String, CachePriority, DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.value().priority,
                    entry.value().created_at,
                )
            })
            .collect();

        entries.sort_by_key(|(_, priority, created_at)| (*priority, *created_at));

        let to_remove = (self.config.max_entries / 4).max(1);
        for (key, _, _) in entries.into_iter().take(to_remove) {
            self.entries.remove(&key);
        }

        log::debug!("evicted up to {to_remove} cache entries to stay under capacity");
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

enum Lookup {
    Hit(Value),
    Expired,
    Miss,
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        if !self.config.enabled {
            return Ok(None);
        }

        // The read guard must be dropped before removing an expired entry.
        let lookup = match self.entries.get(key) {
            Some(entry) if entry.is_valid() => Lookup::Hit(entry.value.clone()),
            Some(_) => Lookup::Expired,
            None => Lookup::Miss,
        };

        match lookup {
            Lookup::Hit(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            Lookup::Expired => {
                self.entries.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Lookup::Miss => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, value: Value, options: CacheWriteOptions) -> Result<(), CacheError> {
        if !self.config.enabled {
            return Ok(());
        }

        if self.entries.len() >= self.config.max_entries {
            self.evict_expired();
            if self.entries.len() >= self.config.max_entries {
                self.evict_oldest();
            }
        }

        let approx_size = value.to_string().len();
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: Utc::now(),
                ttl: options.ttl,
                priority: options.priority,
                tags: options.tags,
                approx_size,
            },
        );

        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool, CacheError> {
        if !self.config.enabled {
            return Ok(false);
        }

        Ok(self
            .entries
            .get(key)
            .map(|entry| entry.is_valid())
            .unwrap_or(false))
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.entries.clear();
        log::info!("cache cleared");
        Ok(())
    }

    fn clear_by_tags(&self, tags: &[String]) -> Result<usize, CacheError> {
        let matching: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.value().tags.iter().any(|tag| tags.contains(tag)))
            .map(|entry| entry.key().clone())
            .collect();

        let count = matching.len();
        for key in matching {
            self.entries.remove(&key);
        }

        log::debug!("invalidated {count} cache entries by tags {tags:?}");
        Ok(count)
    }

    fn stats(&self) -> CacheStats {
        let hit_count = self.hits.load(Ordering::Relaxed);
        let miss_count = self.misses.load(Ordering::Relaxed);
        let total = hit_count + miss_count;
        let hit_rate = if total > 0 {
            hit_count as f64 / total as f64
        } else {
            0.0
        };

        CacheStats {
            size: self.entries.len(),
            hit_rate,
            hit_count,
            miss_count,
            memory_usage: self.entries.iter().map(|entry| entry.value().approx_size).sum(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub hit_rate: f64,
    pub hit_count: u64,
    pub miss_count: u64,
    /// Approximate bytes held, from the serialized size of stored values.
    pub memory_usage: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_options(ttl: Duration) -> CacheWriteOptions {
        CacheWriteOptions {
            ttl,
            priority: CachePriority::Normal,
            tags: vec![],
        }
    }

    #[test]
    fn expired_entries_are_removed_on_lookup() {
        let cache = MemoryCache::default();
        cache
            .set("k", json!({"id": 1}), write_options(Duration::milliseconds(-1)))
            .unwrap();

        assert!(cache.get("k").unwrap().is_none());
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn tag_invalidation_only_touches_matching_entries() {
        let cache = MemoryCache::default();
        let skill = CacheWriteOptions {
            ttl: Duration::minutes(5),
            priority: CachePriority::Normal,
            tags: vec!["skill".to_string()],
        };
        let company = CacheWriteOptions {
            ttl: Duration::minutes(5),
            priority: CachePriority::Normal,
            tags: vec!["company".to_string()],
        };

        cache.set("skills", json!(["rust"]), skill).unwrap();
        cache.set("companies", json!(["acme"]), company).unwrap();

        let removed = cache.clear_by_tags(&["skill".to_string()]).unwrap();

        assert_eq!(removed, 1);
        assert!(cache.get("skills").unwrap().is_none());
        assert!(cache.get("companies").unwrap().is_some());
    }

    #[test]
    fn capacity_eviction_prefers_low_priority() {
        let cache = MemoryCache::new(CacheConfig {
            max_entries: 4,
            enabled: true,
        });
        let low = CacheWriteOptions {
            ttl: Duration::minutes(5),
            priority: CachePriority::Low,
            tags: vec![],
        };

        cache.set("prefetched", json!(1), low).unwrap();
        for key in ["a", "b", "c"] {
            cache
                .set(key, json!(1), write_options(Duration::minutes(5)))
                .unwrap();
        }

        // At capacity; the next write evicts the low-priority entry.
        cache
            .set("d", json!(1), write_options(Duration::minutes(5)))
            .unwrap();

        assert!(!cache.contains("prefetched").unwrap());
        assert!(cache.contains("d").unwrap());
    }

    #[test]
    fn disabled_cache_never_stores() {
        let cache = MemoryCache::new(CacheConfig {
            max_entries: 10,
            enabled: false,
        });

        cache
            .set("k", json!(1), write_options(Duration::minutes(5)))
            .unwrap();

        assert!(cache.get("k").unwrap().is_none());
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn stats_track_hits_and_misses() {
        let cache = MemoryCache::default();
        cache
            .set("k", json!(1), write_options(Duration::minutes(5)))
            .unwrap();

        assert!(cache.get("k").unwrap().is_some());
        assert!(cache.get("absent").unwrap().is_none());

        let stats = cache.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
        assert!(stats.memory_usage > 0);
    }
}
