//! Metadata provider system.
//!
//! This module defines the [`MetadataProvider`] trait that every upstream
//! catalog implements, and the pieces around it.
//!
//! # Module layout
//!
//! - [`provider`] -- Trait definition and shared provider context.
//! - [`providers`] -- Concrete providers (MusicBrainz, Open Library, TMDB, RAWG, IGDB).
//! - [`registry`] -- Category to provider resolution.
//! - [`normalize`] -- Shared mapping helpers and the cache-aware [`Normalizer`].

pub mod normalize;
pub mod provider;
pub mod providers;
pub mod registry;

pub use normalize::Normalizer;
pub use provider::{MetadataProvider, ProviderContext};
pub use registry::ProviderRegistry;
