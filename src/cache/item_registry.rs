//! Long-lived registry of every item seen, with merge-on-register semantics.
//!
//! The registry is bounded and evicts strictly in insertion order (FIFO).
//! Re-registering an id merges field by field and keeps the entry's
//! original position in the eviction order. Lookups never affect eviction.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use mediaforge_common::{CanonicalItem, Error, ItemId, Result};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default maximum number of registered items.
pub const DEFAULT_REGISTRY_CAPACITY: usize = 2_000;

/// A record the registry can hold.
pub trait RegistryRecord: Clone + Send + Sync {
    fn record_id(&self) -> &ItemId;

    /// Fold a newer copy of the same record into `self` without erasing
    /// populated fields.
    fn merge_from(&mut self, newer: &Self);
}

impl RegistryRecord for CanonicalItem {
    fn record_id(&self) -> &ItemId {
        &self.id
    }

    fn merge_from(&mut self, newer: &Self) {
        CanonicalItem::merge_from(self, newer);
    }
}

/// Durable form of one registry slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry<T> {
    pub id: ItemId,
    pub item: T,
    pub inserted_at_seq: u64,
}

struct Slot<T> {
    item: T,
    seq: u64,
}

struct Inner<T> {
    slots: HashMap<ItemId, Slot<T>>,
    order: BTreeMap<u64, ItemId>,
    next_seq: u64,
}

impl<T> Inner<T> {
    fn evict_overflow(&mut self, capacity: usize) -> usize {
        let mut evicted = 0;
        while self.slots.len() > capacity {
            let Some((_, id)) = self.order.pop_first() else {
                break;
            };
            self.slots.remove(&id);
            evicted += 1;
        }
        evicted
    }
}

/// Bounded, FIFO-evicting registry shared across sessions.
pub struct ItemRegistry<T: RegistryRecord = CanonicalItem> {
    inner: Mutex<Inner<T>>,
    capacity: usize,
}

impl<T: RegistryRecord> ItemRegistry<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                order: BTreeMap::new(),
                next_seq: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a registered item. Does not touch eviction order.
    pub fn get_item(&self, id: &ItemId) -> Option<T> {
        self.inner.lock().slots.get(id).map(|slot| slot.item.clone())
    }

    /// Register or merge a single item.
    pub fn register_item(&self, item: T) {
        let mut inner = self.inner.lock();
        Self::upsert(&mut inner, item);
        let evicted = inner.evict_overflow(self.capacity);
        if evicted > 0 {
            debug!(evicted, "Registry over capacity, evicted oldest entries");
        }
    }

    /// Register or merge a batch under one lock.
    pub fn register_items<I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        let mut inner = self.inner.lock();
        for item in items {
            Self::upsert(&mut inner, item);
        }
        let evicted = inner.evict_overflow(self.capacity);
        if evicted > 0 {
            debug!(evicted, "Registry over capacity, evicted oldest entries");
        }
    }

    fn upsert(inner: &mut Inner<T>, item: T) {
        if let Some(slot) = inner.slots.get_mut(item.record_id()) {
            slot.item.merge_from(&item);
            return;
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let id = item.record_id().clone();
        inner.order.insert(seq, id.clone());
        inner.slots.insert(id, Slot { item, seq });
    }

    /// Entries in insertion order, oldest first.
    pub fn snapshot(&self) -> Vec<RegistryEntry<T>> {
        let inner = self.inner.lock();
        inner
            .order
            .values()
            .filter_map(|id| {
                inner.slots.get(id).map(|slot| RegistryEntry {
                    id: id.clone(),
                    item: slot.item.clone(),
                    inserted_at_seq: slot.seq,
                })
            })
            .collect()
    }

    /// Replace the contents with persisted entries, trimming the oldest
    /// beyond capacity.
    pub fn load(&self, mut entries: Vec<RegistryEntry<T>>) {
        entries.sort_by_key(|e| e.inserted_at_seq);

        let mut inner = self.inner.lock();
        inner.slots.clear();
        inner.order.clear();
        inner.next_seq = 0;

        for entry in entries {
            if let Some(slot) = inner.slots.get_mut(&entry.id) {
                slot.item.merge_from(&entry.item);
                continue;
            }
            // sorted input, so this only moves colliding sequence numbers up
            let seq = entry.inserted_at_seq.max(inner.next_seq);
            if seq != entry.inserted_at_seq {
                debug!(id = %entry.id, from = entry.inserted_at_seq, to = seq, "Re-sequenced registry entry");
            }
            inner.order.insert(seq, entry.id.clone());
            inner.slots.insert(
                entry.id,
                Slot {
                    item: entry.item,
                    seq,
                },
            );
            inner.next_seq = seq.saturating_add(1);
        }

        let trimmed = inner.evict_overflow(self.capacity);
        if trimmed > 0 {
            info!(trimmed, "Trimmed persisted registry to capacity");
        }
    }
}

impl<T> ItemRegistry<T>
where
    T: RegistryRecord + Serialize + DeserializeOwned,
{
    /// Write the registry as a JSON array of entries.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(&self.snapshot())
            .map_err(|e| Error::internal(format!("failed to serialize registry: {e}")))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        debug!(path = %path.display(), entries = self.len(), "Saved item registry");
        Ok(())
    }

    /// Load a registry previously written by [`save_to_path`](Self::save_to_path).
    ///
    /// A missing file yields an empty registry.
    pub fn load_from_path(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            debug!(path = %path.display(), "No persisted registry found");
            return Ok(());
        }
        let content = std::fs::read_to_string(path)?;
        let entries: Vec<RegistryEntry<T>> = serde_json::from_str(&content).map_err(|e| {
            Error::validation(format!("invalid registry file {}: {e}", path.display()))
        })?;
        self.load(entries);
        Ok(())
    }
}

impl<T: RegistryRecord> Default for ItemRegistry<T> {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTRY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaforge_common::ItemType;

    fn item(ext: &str, title: &str) -> CanonicalItem {
        CanonicalItem::new("openlibrary", ItemType::Book, ext, title)
    }

    #[test]
    fn test_register_and_get() {
        let registry = ItemRegistry::default();
        let it = item("OL1W", "Dune");
        registry.register_item(it.clone());
        assert_eq!(registry.get_item(&it.id), Some(it));
    }

    #[test]
    fn test_merge_is_order_independent_for_disjoint_fields() {
        let titled = item("OL1W", "X");
        let mut imaged = item("OL1W", "");
        imaged.image_url = Some("Y".into());

        let forward = ItemRegistry::default();
        forward.register_item(titled.clone());
        forward.register_item(imaged.clone());

        let backward = ItemRegistry::default();
        backward.register_item(imaged);
        backward.register_item(titled.clone());

        let a = forward.get_item(&titled.id).unwrap();
        let b = backward.get_item(&titled.id).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.title, "X");
        assert_eq!(a.image_url.as_deref(), Some("Y"));
    }

    #[test]
    fn test_fifo_eviction_ignores_access() {
        let registry = ItemRegistry::new(3);
        let items: Vec<_> = (0..4).map(|i| item(&format!("OL{i}W"), "t")).collect();
        for it in &items[..3] {
            registry.register_item(it.clone());
        }
        // reading the oldest must not protect it
        assert!(registry.get_item(&items[0].id).is_some());
        registry.register_item(items[3].clone());

        assert_eq!(registry.len(), 3);
        assert!(registry.get_item(&items[0].id).is_none());
        assert!(registry.get_item(&items[3].id).is_some());
    }

    #[test]
    fn test_reregistration_keeps_original_position() {
        let registry = ItemRegistry::new(2);
        let a = item("A", "a");
        let b = item("B", "b");
        registry.register_item(a.clone());
        registry.register_item(b.clone());
        registry.register_item(item("A", "a2"));
        registry.register_item(item("C", "c"));

        assert!(registry.get_item(&a.id).is_none());
        assert!(registry.get_item(&b.id).is_some());
    }

    #[test]
    fn test_load_trims_oldest_and_continues_sequence() {
        let registry = ItemRegistry::new(2);
        let entries: Vec<_> = (0..3u64)
            .map(|i| {
                let it = item(&format!("OL{i}W"), "t");
                RegistryEntry {
                    id: it.id.clone(),
                    item: it,
                    inserted_at_seq: i * 10,
                }
            })
            .rev()
            .collect();
        registry.load(entries);

        let snap = registry.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].inserted_at_seq, 10);
        assert_eq!(snap[1].inserted_at_seq, 20);

        registry.register_item(item("NEW", "n"));
        let snap = registry.snapshot();
        assert_eq!(snap.last().unwrap().inserted_at_seq, 21);
        assert_eq!(snap[0].inserted_at_seq, 20);
    }

    #[test]
    fn test_persisted_form_uses_camel_case() {
        let registry = ItemRegistry::default();
        registry.register_item(item("OL1W", "Dune"));
        let json = serde_json::to_value(registry.snapshot()).unwrap();
        assert_eq!(json[0]["id"], "openlibrary:book:OL1W");
        assert_eq!(json[0]["insertedAtSeq"], 0);
        assert_eq!(json[0]["item"]["title"], "Dune");
    }

    #[test]
    fn test_save_and_load_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("registry.json");

        let registry = ItemRegistry::default();
        registry.register_items(vec![item("A", "a"), item("B", "b")]);
        registry.save_to_path(&path).unwrap();

        let restored: ItemRegistry = ItemRegistry::default();
        restored.load_from_path(&path).unwrap();
        assert_eq!(restored.snapshot(), registry.snapshot());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry: ItemRegistry = ItemRegistry::default();
        registry.load_from_path(&dir.path().join("absent.json")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, "{not json").unwrap();
        let registry: ItemRegistry = ItemRegistry::default();
        assert!(matches!(
            registry.load_from_path(&path),
            Err(Error::Validation(_))
        ));
    }
}
