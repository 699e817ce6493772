//! Resilient outbound HTTP for upstream catalogs.
//!
//! - [`client`] -- [`FetchClient`] with retry, backoff, and error classification.
//! - [`retry`] -- The [`RetryPolicy`] budget.

pub mod client;
pub mod retry;

pub use client::{FetchClient, FetchOptions, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
pub use retry::RetryPolicy;
