//! Mediaforge-Common: canonical types shared by every part of mediaforge.
//!
//! This crate provides the vocabulary the engine speaks regardless of which
//! upstream catalog produced the data:
//!
//! - **Types**: item types, categories, and sort orders
//! - **Identifiers**: stable [`ItemId`]s derived from provider + external id
//! - **Canonical records**: [`CanonicalItem`] and [`CanonicalDetails`]
//! - **Search**: [`SearchQuery`], [`FilterValue`], and [`SearchResult`]
//! - **Error Handling**: the [`Error`] taxonomy and a result alias
//!
//! # Examples
//!
//! ```
//! use mediaforge_common::{Category, ItemId, ItemType, SearchQuery};
//!
//! let id = ItemId::new("musicbrainz", ItemType::Artist, "5b11f4ce-a62d-471e-81fc-a69a8278c7da");
//! assert_eq!(id.provider_id(), Some("musicbrainz"));
//! assert_eq!(ItemType::Artist.category(), Category::Music);
//!
//! let query = SearchQuery::new(ItemType::Book, "Fellowship");
//! assert_eq!(query.page, 1);
//! ```

pub mod error;
pub mod ids;
pub mod item;
pub mod search;
pub mod types;

pub use error::{Error, FailureKind, Result};
pub use ids::*;
pub use item::*;
pub use search::*;
pub use types::*;
