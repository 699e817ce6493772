//! HTTP client with transparent retries and uniform error classification.
//!
//! Every provider and image source talks to its upstream through a
//! [`FetchClient`]. A call either eventually succeeds or surfaces exactly one
//! terminal [`Error`]:
//!
//! - HTTP 429 / 503 / 504 and transport failures are retried with linear
//!   backoff according to the [`RetryPolicy`].
//! - Any other non-2xx status is a terminal [`Error::Upstream`].
//! - A 2xx body that does not deserialize is a terminal [`Error::Validation`].
//!
//! Nothing is cached at this layer.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{Quota, RateLimiter};
use mediaforge_common::{Error, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::retry::RetryPolicy;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "mediaforge/",
    env!("CARGO_PKG_VERSION"),
    " ( https://github.com/mediaforge/mediaforge )"
);

/// Upstream error bodies are truncated to this many bytes.
const MAX_ERROR_BODY: usize = 2048;

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Per-call request options.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Query string parameters, appended in order.
    pub query: Vec<(String, String)>,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// Retrying JSON-over-HTTP client.
///
/// Cheap to clone; clones share the connection pool and rate limiter.
#[derive(Clone)]
pub struct FetchClient {
    http: reqwest::Client,
    policy: RetryPolicy,
    limiter: Option<Arc<DirectLimiter>>,
}

impl FetchClient {
    /// Create a client with the given retry policy and request timeout.
    pub fn new(policy: RetryPolicy, timeout: Duration, user_agent: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                reqwest::Client::new()
            });

        Self {
            http,
            policy,
            limiter: None,
        }
    }

    /// Throttle this client (and its clones) to `per_second` requests.
    #[must_use]
    pub fn with_rate_limit(mut self, per_second: u32) -> Self {
        if let Some(rate) = NonZeroU32::new(per_second) {
            self.limiter = Some(Arc::new(RateLimiter::direct(Quota::per_second(rate))));
        }
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// GET `url` and deserialize the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, opts: &FetchOptions) -> Result<T> {
        let body = self.execute(Method::GET, url, None, opts).await?;
        decode(url, &body)
    }

    /// GET `url` as an untyped JSON document.
    pub async fn get_value(&self, url: &str, opts: &FetchOptions) -> Result<serde_json::Value> {
        self.get_json(url, opts).await
    }

    /// GET `url`, mapping a 404 to `Ok(None)`.
    pub async fn get_optional_json<T: DeserializeOwned>(
        &self,
        url: &str,
        opts: &FetchOptions,
    ) -> Result<Option<T>> {
        match self.execute(Method::GET, url, None, opts).await {
            Ok(body) => decode(url, &body).map(Some),
            Err(Error::Upstream { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// POST a plain-text body (e.g. a query-language document) and
    /// deserialize the JSON response.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &str,
        opts: &FetchOptions,
    ) -> Result<T> {
        let response = self.execute(Method::POST, url, Some(body), opts).await?;
        decode(url, &response)
    }

    /// Run one logical request, retrying transient failures.
    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<&str>,
        opts: &FetchOptions,
    ) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }

            debug!(url = %url, method = %method, attempt, "Sending upstream request");

            match self.attempt(method.clone(), url, body, opts).await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_retryable() && self.policy.allows_retry_after(attempt) => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        url = %url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient upstream failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if attempt > 1 {
                        warn!(url = %url, attempts = attempt, error = %err, "Giving up on upstream request");
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(
        &self,
        method: Method,
        url: &str,
        body: Option<&str>,
        opts: &FetchOptions,
    ) -> Result<String> {
        let mut request = self.http.request(method, url).query(&opts.query);
        for (key, value) in &opts.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "text/plain")
                .body(body.to_string());
        }

        let resp = request.send().await.map_err(classify_transport)?;
        let status = resp.status();

        if status.is_success() {
            return resp.text().await.map_err(classify_transport);
        }

        let body = resp.text().await.unwrap_or_default();
        debug!(url = %url, status = status.as_u16(), "Upstream returned non-success status");
        Err(Error::upstream(status.as_u16(), truncate(body)))
    }
}

impl Default for FetchClient {
    fn default() -> Self {
        Self::new(RetryPolicy::default(), DEFAULT_TIMEOUT, DEFAULT_USER_AGENT)
    }
}

fn decode<T: DeserializeOwned>(url: &str, body: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| Error::validation(format!("unexpected response shape from {url}: {e}")))
}

/// Map a reqwest failure onto the error taxonomy by kind, not status.
fn classify_transport(err: reqwest::Error) -> Error {
    if err.is_builder() {
        return Error::invalid_input(format!("invalid request: {err}"));
    }
    if err.is_decode() {
        return Error::validation(err.to_string());
    }
    if let Some(status) = err.status() {
        return Error::upstream(status.as_u16(), err.to_string());
    }
    Error::network(err.to_string())
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
