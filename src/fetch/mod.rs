//! Single-flight fetch cache
//!
//! Many packages in a dependency graph point at the same repository (forks,
//! monorepos, re-publishes) and therefore produce overlapping candidate URLs.
//! `FetchCache` makes sure each distinct URL is requested at most once per
//! run: the first caller starts the request, every concurrent or later
//! caller awaits the same shared result.
//!
//! The network itself sits behind the [`Transport`] trait so the cache and
//! everything built on it can be driven by stubs in tests.

pub mod http;
pub mod racer;

pub use http::HttpTransport;
pub use racer::CandidateRacer;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

// ─── Results ───────────────────────────────────────────────────────

/// Outcome of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// Whether the response indicated success (2xx)
    pub ok: bool,
    /// HTTP status, absent when the request timed out
    pub status: Option<u16>,
    /// The requested URL
    pub url: String,
    /// Response body, empty unless `ok`
    pub body: String,
}

impl FetchResult {
    pub fn success(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            ok: true,
            status: Some(status),
            url: url.into(),
            body: body.into(),
        }
    }

    /// A non-success response or a timed-out request
    pub fn failed(url: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            ok: false,
            status,
            url: url.into(),
            body: String::new(),
        }
    }
}

/// Hard transport failures. Non-success statuses and timeouts are not
/// errors, they are `FetchResult { ok: false, .. }`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }
}

pub type FetchOutcome = Result<FetchResult, FetchError>;

// ─── Transport ─────────────────────────────────────────────────────

/// A way of issuing a single GET request
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> FetchOutcome;
}

// ─── Cache ─────────────────────────────────────────────────────────

type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// Memoizing, single-flight fetch client keyed by exact URL.
///
/// Entries are never evicted; the table is bounded by the candidate URLs of
/// one run. The in-flight request runs as its own task, so a caller that
/// stops waiting does not cancel it for the others.
pub struct FetchCache {
    transport: Arc<dyn Transport>,
    entries: Mutex<HashMap<String, SharedFetch>>,
    requests: AtomicUsize,
}

impl FetchCache {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::with_transport(Arc::new(transport))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            entries: Mutex::new(HashMap::new()),
            requests: AtomicUsize::new(0),
        }
    }

    /// Fetch `url`, joining an in-flight or completed request when one exists.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let shared = {
            let mut entries = self.entries.lock();
            match entries.get(url) {
                Some(existing) => {
                    tracing::debug!("fetch cache hit: {}", url);
                    existing.clone()
                }
                None => {
                    let shared = self.start(url);
                    entries.insert(url.to_string(), shared.clone());
                    shared
                }
            }
        };
        shared.await
    }

    fn start(&self, url: &str) -> SharedFetch {
        self.requests.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("GET {}", url);

        let transport = Arc::clone(&self.transport);
        let owned = url.to_string();
        let handle = tokio::spawn(async move { transport.get(&owned).await });

        let url = url.to_string();
        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(FetchError::transport(url, format!("fetch task aborted: {}", e))),
            }
        }
        .boxed()
        .shared()
    }

    /// Number of underlying requests issued so far
    pub fn requests_issued(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Number of distinct URLs seen
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct SlowTransport {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Transport for SlowTransport {
        async fn get(&self, url: &str) -> FetchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if url.ends_with("/boom") {
                return Err(FetchError::transport(url, "connection reset"));
            }
            Ok(FetchResult::success(url, 200, format!("body of {}", url)))
        }
    }

    fn cache() -> (FetchCache, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = FetchCache::new(SlowTransport { calls: Arc::clone(&calls) });
        (cache, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_request() {
        let (cache, calls) = cache();
        let url = "https://github.com/a/b/raw/1.0.0/LICENSE";

        let results = futures::future::join_all((0..8).map(|_| cache.fetch(url))).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.requests_issued(), 1);
        let first = results[0].clone().unwrap();
        assert!(results.iter().all(|r| r.as_ref() == Ok(&first)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_result_is_retained() {
        let (cache, calls) = cache();
        let url = "https://github.com/a/b/raw/1.0.0/LICENSE";

        let first = cache.fetch(url).await.unwrap();
        let second = cache.fetch(url).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_are_shared_not_retried() {
        let (cache, calls) = cache();
        let url = "https://github.com/a/b/boom";

        let (a, b) = tokio::join!(cache.fetch(url), cache.fetch(url));
        let c = cache.fetch(url).await;

        assert!(matches!(a, Err(FetchError::Transport { .. })));
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_waiter_does_not_restart_request() {
        let (cache, calls) = cache();
        let url = "https://github.com/a/b/raw/2.0.0/LICENSE";

        // Give up on the first wait before the response arrives.
        let gave_up = tokio::time::timeout(Duration::from_millis(10), cache.fetch(url)).await;
        assert!(gave_up.is_err());

        let result = cache.fetch(url).await.unwrap();
        assert!(result.ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_urls_are_fetched_separately() {
        let (cache, calls) = cache();

        let (a, b) = tokio::join!(
            cache.fetch("https://github.com/a/b/raw/1.0.0/LICENSE"),
            cache.fetch("https://github.com/a/b/raw/1.0.0/LICENSE.md"),
        );

        assert_ne!(a.unwrap().body, b.unwrap().body);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }
}
