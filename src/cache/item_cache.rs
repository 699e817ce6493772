//! In-memory cache of normalized items.
//!
//! Holds the `Arc` handed out by the normalizer so a repeat lookup of the
//! same id returns the very same allocation instead of remapping.

use dashmap::DashMap;
use mediaforge_common::{CanonicalItem, ItemId};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default number of cached items.
pub const DEFAULT_CAPACITY: usize = 5_000;

/// Default time-to-live for a cached item.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Entry in the item cache.
struct CacheEntry {
    item: Arc<CanonicalItem>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Thread-safe, size-bounded TTL cache keyed by [`ItemId`].
///
/// Expiry is checked on read only; there is no background sweep. Reads never
/// write, so a hit does not extend an entry's lifetime.
pub struct ItemCache {
    entries: DashMap<ItemId, CacheEntry>,
    max_entries: usize,
    ttl: Duration,
}

impl ItemCache {
    /// Create a new item cache.
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
            ttl,
        }
    }

    /// Get a live item, treating an expired entry as a miss.
    pub fn get(&self, id: &ItemId) -> Option<Arc<CanonicalItem>> {
        let entry = self.entries.get(id)?;
        if entry.is_expired(Instant::now()) {
            return None;
        }
        Some(Arc::clone(&entry.item))
    }

    /// Insert or replace an item, stamping a fresh expiry.
    pub fn set(&self, item: Arc<CanonicalItem>) {
        let id = item.id.clone();
        if !self.entries.contains_key(&id) && self.entries.len() >= self.max_entries {
            self.make_room();
        }
        self.entries.insert(
            id,
            CacheEntry {
                item,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Remove an entry from the cache.
    pub fn remove(&self, id: &ItemId) {
        self.entries.remove(id);
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drop expired entries, then the entry closest to expiry if still full.
    fn make_room(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));

        if self.entries.len() < self.max_entries {
            return;
        }

        let soonest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.expires_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = soonest {
            self.entries.remove(&key);
        }
    }
}

impl Default for ItemCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaforge_common::ItemType;

    fn item(ext: &str) -> Arc<CanonicalItem> {
        Arc::new(CanonicalItem::new("musicbrainz", ItemType::Artist, ext, ext))
    }

    #[test]
    fn test_set_and_get_returns_same_allocation() {
        let cache = ItemCache::default();
        let original = item("a");
        cache.set(Arc::clone(&original));

        let hit = cache.get(&original.id).unwrap();
        assert!(Arc::ptr_eq(&hit, &original));
    }

    #[test]
    fn test_expired_entry_is_a_miss_but_not_removed() {
        let cache = ItemCache::new(10, Duration::ZERO);
        let it = item("a");
        cache.set(Arc::clone(&it));

        assert!(cache.get(&it.id).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_full_cache_drops_expired_first() {
        let cache = ItemCache::new(2, Duration::ZERO);
        cache.set(item("a"));
        cache.set(item("b"));
        cache.set(item("c"));

        // a and b were expired and swept together
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_full_cache_evicts_soonest_expiry() {
        let cache = ItemCache::new(2, Duration::from_secs(3600));
        let a = item("a");
        let b = item("b");
        let c = item("c");
        cache.set(Arc::clone(&a));
        std::thread::sleep(Duration::from_millis(2));
        cache.set(Arc::clone(&b));
        cache.set(Arc::clone(&c));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&a.id).is_none());
        assert!(cache.get(&b.id).is_some());
        assert!(cache.get(&c.id).is_some());
    }

    #[test]
    fn test_replacing_existing_key_does_not_evict() {
        let cache = ItemCache::new(2, Duration::from_secs(3600));
        let a = item("a");
        let b = item("b");
        cache.set(Arc::clone(&a));
        cache.set(Arc::clone(&b));
        cache.set(Arc::new(a.with_image("https://img/a.jpg")));

        assert_eq!(cache.len(), 2);
        assert_eq!(
            cache.get(&a.id).unwrap().image_url.as_deref(),
            Some("https://img/a.jpg")
        );
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let cache = Arc::new(ItemCache::new(100, Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for n in 0..200 {
                        let it = item(&format!("{}", n % 10));
                        if (n + i) % 2 == 0 {
                            cache.set(it);
                        } else if let Some(hit) = cache.get(&it.id) {
                            assert_eq!(hit.id, it.id);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 10);
    }
}
