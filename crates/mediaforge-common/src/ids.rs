//! Stable identifiers for canonical items.
//!
//! An [`ItemId`] is derived from the natural key of an item, the pair of the
//! provider that served it and the provider's own identifier, qualified by
//! the item type so the same upstream id can never collide across types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::ItemType;

/// Unique identifier for a canonical item.
///
/// Rendered as `"{provider_id}:{item_type}:{external_id}"`. The external id
/// is the last segment and may itself contain colons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Derive the id for `external_id` served by `provider_id`.
    #[must_use]
    pub fn new(provider_id: &str, item_type: ItemType, external_id: &str) -> Self {
        Self(format!("{provider_id}:{item_type}:{external_id}"))
    }

    /// Borrow the raw string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The provider segment, if the id is well formed.
    pub fn provider_id(&self) -> Option<&str> {
        self.parts().map(|(p, _, _)| p)
    }

    /// The item type segment, if the id is well formed.
    pub fn item_type(&self) -> Option<ItemType> {
        self.parts().map(|(_, t, _)| t)
    }

    /// The external id segment, if the id is well formed.
    pub fn external_id(&self) -> Option<&str> {
        self.parts().map(|(_, _, e)| e)
    }

    /// Split into `(provider_id, item_type, external_id)`.
    pub fn parts(&self) -> Option<(&str, ItemType, &str)> {
        let mut split = self.0.splitn(3, ':');
        let provider = split.next().filter(|s| !s.is_empty())?;
        let item_type = split.next()?.parse().ok()?;
        let external = split.next().filter(|s| !s.is_empty())?;
        Some((provider, item_type, external))
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
