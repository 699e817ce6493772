//! Search-as-you-type on top of [`MediaEngine`].
//!
//! A [`SearchSession`] serves one input box: it debounces keystrokes, makes
//! sure a superseded request never reports back, and speculatively loads
//! the next page so paging feels instant. Only the page after the latest
//! delivery is kept; a request for it joins the prefetch even if that is
//! still in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use mediaforge_common::{Category, Result, SearchQuery, SearchResult};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::engine::MediaEngine;

/// A next-page search, shared between the background task driving it and
/// whoever asks for that page. `None` means the prefetch failed.
type PrefetchFuture = Shared<BoxFuture<'static, Option<Arc<SearchResult>>>>;

struct PrefetchedPage {
    page: PrefetchFuture,
    started_at: Instant,
}

impl PrefetchedPage {
    fn is_fresh(&self, ttl: std::time::Duration) -> bool {
        self.started_at.elapsed() < ttl
    }
}

pub struct SearchSession {
    engine: Arc<MediaEngine>,
    category: Category,
    provider_id: Option<String>,
    config: SessionConfig,
    generation: AtomicU64,
    pending: Mutex<Option<CancellationToken>>,
    prefetched: Arc<DashMap<String, PrefetchedPage>>,
}

impl SearchSession {
    pub fn new(
        engine: Arc<MediaEngine>,
        category: Category,
        provider_id: Option<String>,
        config: SessionConfig,
    ) -> Self {
        Self {
            engine,
            category,
            provider_id,
            config,
            generation: AtomicU64::new(0),
            pending: Mutex::new(None),
            prefetched: Arc::new(DashMap::new()),
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Start a new generation, cancelling whatever was pending.
    fn supersede(&self) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = self.pending.lock().replace(token.clone()) {
            previous.cancel();
        }
        (generation, token)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Debounced search for a keystroke.
    ///
    /// Resolves to `Ok(None)` when a later call superseded this one, either
    /// during the quiet period or while the request was in flight.
    pub async fn input(&self, query: SearchQuery) -> Result<Option<SearchResult>> {
        let (generation, token) = self.supersede();

        tokio::select! {
            _ = token.cancelled() => {
                debug!(generation, "Input superseded during debounce");
                return Ok(None);
            }
            _ = tokio::time::sleep(self.config.debounce()) => {}
        }

        let result = tokio::select! {
            _ = token.cancelled() => {
                debug!(generation, "Input superseded while in flight");
                return Ok(None);
            }
            result = self.run(&query) => result,
        };

        if !self.is_current(generation) {
            return Ok(None);
        }
        result.map(Some)
    }

    /// Search immediately, superseding any pending input.
    pub async fn search_now(&self, query: SearchQuery) -> Result<SearchResult> {
        let _ = self.supersede();
        self.run(&query).await
    }

    /// Whether the page for `query` has been prefetched and is ready.
    pub fn is_prefetched(&self, query: &SearchQuery) -> bool {
        self.prefetched.get(&query.cache_key()).is_some_and(|entry| {
            entry.is_fresh(self.config.prefetch_ttl())
                && entry.page.peek().is_some_and(Option::is_some)
        })
    }

    /// Claim the prefetch for `query`, waiting for it if still in flight.
    async fn take_prefetched(&self, query: &SearchQuery) -> Option<SearchResult> {
        let (_, entry) = self.prefetched.remove(&query.cache_key())?;
        if !entry.is_fresh(self.config.prefetch_ttl()) {
            return None;
        }
        if entry.page.peek().is_none() {
            debug!(page = query.page, "Joining in-flight prefetch");
        }
        let result = entry.page.await?;
        debug!(page = query.page, "Serving prefetched page");
        Some(Arc::try_unwrap(result).unwrap_or_else(|shared| (*shared).clone()))
    }

    async fn run(&self, query: &SearchQuery) -> Result<SearchResult> {
        if let Some(result) = self.take_prefetched(query).await {
            self.maybe_prefetch(query, &result);
            return Ok(result);
        }

        let result = self
            .engine
            .search(self.category, self.provider_id.as_deref(), query)
            .await?;
        self.maybe_prefetch(query, &result);
        Ok(result)
    }

    fn maybe_prefetch(&self, query: &SearchQuery, delivered: &SearchResult) {
        let next = (self.config.prefetch && delivered.has_more()).then(|| query.next_page());
        let wanted = next.as_ref().map(SearchQuery::cache_key);

        // only the page after the latest delivery can still be asked for
        let ttl = self.config.prefetch_ttl();
        self.prefetched
            .retain(|key, entry| Some(key) == wanted.as_ref() && entry.is_fresh(ttl));

        let (Some(next), Some(key)) = (next, wanted) else {
            return;
        };
        if self.prefetched.contains_key(&key) {
            return;
        }

        let engine = Arc::clone(&self.engine);
        let category = self.category;
        let provider_id = self.provider_id.clone();
        let page = async move {
            match engine.search(category, provider_id.as_deref(), &next).await {
                Ok(result) => {
                    debug!(page = next.page, items = result.items.len(), "Prefetched next page");
                    Some(Arc::new(result))
                }
                Err(e) => {
                    warn!(page = next.page, error = %e, "Prefetch failed");
                    None
                }
            }
        }
        .boxed()
        .shared();

        self.prefetched.insert(
            key,
            PrefetchedPage {
                page: page.clone(),
                started_at: Instant::now(),
            },
        );
        tokio::spawn(page);
    }
}
