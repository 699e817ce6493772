//! The two item stores shared by every engine call.
//!
//! - [`item_cache`] -- Short-lived TTL cache of normalized items.
//! - [`item_registry`] -- Long-lived, persistable FIFO registry.

pub mod item_cache;
pub mod item_registry;

pub use item_cache::ItemCache;
pub use item_registry::{ItemRegistry, RegistryEntry, RegistryRecord};
