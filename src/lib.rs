//! Mediaforge - unified media search over music, book, film and game catalogs
//!
//! The library exposes the engine for the CLI and for integration tests:
//!
//! - [`engine`] -- [`MediaEngine`](engine::MediaEngine), the request facade
//! - [`session`] -- debounced search-as-you-type with next-page prefetch
//! - [`metadata`] -- provider trait, registry, and the bundled providers
//! - [`images`] -- artwork waterfall for MusicBrainz results
//! - [`query`] -- Lucene and IGDB query builders
//! - [`fetch`] -- retrying HTTP client
//! - [`cache`] -- item cache and persistent registry

pub mod cache;
pub mod config;
pub mod engine;
pub mod fetch;
pub mod images;
pub mod metadata;
pub mod query;
pub mod session;

pub use engine::MediaEngine;
pub use session::SearchSession;
