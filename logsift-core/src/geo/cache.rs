use super::GeoLocation;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    location: GeoLocation,
    expires_at: Instant,
    last_accessed: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}

#[derive(Debug)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    stats: CacheStats,
}

/// IP-keyed memo of lookup results, failures included.
///
/// Holds at most `capacity` entries, evicting the least recently used one,
/// and forgets entries older than `ttl`.
#[derive(Debug)]
pub struct GeoCache {
    inner: Mutex<Inner>,
    capacity: usize,
    ttl: Duration,
}

impl GeoCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                stats: CacheStats::default(),
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, ip: &str) -> Option<GeoLocation> {
        let now = Instant::now();
        let mut inner = self.lock();

        let hit = match inner.entries.get_mut(ip) {
            Some(entry) if !entry.is_expired(now) => {
                entry.last_accessed = now;
                Some(entry.location.clone())
            }
            Some(_) => {
                inner.entries.remove(ip);
                None
            }
            None => None,
        };

        if hit.is_some() {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
        hit
    }

    pub fn put(&self, ip: String, location: GeoLocation) {
        let now = Instant::now();
        let mut inner = self.lock();

        if inner.entries.len() >= self.capacity && !inner.entries.contains_key(&ip) {
            let lru_key = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed)
                .map(|(key, _)| key.clone());
            if let Some(key) = lru_key {
                inner.entries.remove(&key);
                inner.stats.evictions += 1;
            }
        }

        inner.entries.insert(
            ip,
            CacheEntry {
                location,
                expires_at: now + self.ttl,
                last_accessed: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired(now));
        before - inner.entries.len()
    }
}
