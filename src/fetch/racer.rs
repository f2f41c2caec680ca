//! Candidate racing — order-preferring "first matching" over several URLs
//!
//! Every candidate is requested at once, but the answer is decided by
//! candidate order, never by which response arrives first: `LICENSE` must
//! beat `LICENSE.md` even when the latter comes back sooner.

use super::{FetchCache, FetchResult};
use futures::stream::{FuturesOrdered, StreamExt};
use std::sync::Arc;

/// Picks the lowest-indexed candidate whose fetch satisfies a predicate
#[derive(Clone)]
pub struct CandidateRacer {
    cache: Arc<FetchCache>,
}

impl CandidateRacer {
    pub fn new(cache: Arc<FetchCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<FetchCache> {
        &self.cache
    }

    /// Dispatch all candidates concurrently and return the first one, in
    /// list order, that passes `predicate`.
    ///
    /// Results are consumed in order, so this returns as soon as every
    /// earlier candidate has completed and failed and the next one passes.
    /// Transport errors count as failed candidates. Returns `None` when no
    /// candidate passes.
    pub async fn first_matching<P>(&self, urls: &[String], predicate: P) -> Option<FetchResult>
    where
        P: Fn(&FetchResult) -> bool,
    {
        let mut pending: FuturesOrdered<_> = urls
            .iter()
            .map(|url| async move { (url.as_str(), self.cache.fetch(url).await) })
            .collect();

        while let Some((url, outcome)) = pending.next().await {
            match outcome {
                Ok(result) if predicate(&result) => return Some(result),
                Ok(result) => {
                    tracing::debug!("Candidate {} rejected (status {:?})", url, result.status);
                }
                Err(e) => {
                    tracing::warn!("Candidate {} failed: {}", url, e);
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchError, FetchOutcome, Transport};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Per-URL latency and response
    struct ScriptedTransport {
        script: HashMap<String, (u64, Result<bool, ()>)>,
    }

    impl ScriptedTransport {
        fn new(entries: &[(&str, u64, Result<bool, ()>)]) -> Self {
            Self {
                script: entries
                    .iter()
                    .map(|(url, delay, outcome)| (url.to_string(), (*delay, *outcome)))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&self, url: &str) -> FetchOutcome {
            let (delay, outcome) = self.script.get(url).copied().unwrap_or((1, Ok(false)));
            tokio::time::sleep(Duration::from_millis(delay)).await;
            match outcome {
                Ok(true) => Ok(FetchResult::success(url, 200, url)),
                Ok(false) => Ok(FetchResult::failed(url, Some(404))),
                Err(()) => Err(FetchError::transport(url, "connection refused")),
            }
        }
    }

    fn racer(transport: ScriptedTransport) -> CandidateRacer {
        CandidateRacer::new(Arc::new(FetchCache::new(transport)))
    }

    fn urls(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_beats_arrival() {
        // Second candidate answers long before the first; both succeed.
        let racer = racer(ScriptedTransport::new(&[
            ("u0", 500, Ok(true)),
            ("u1", 5, Ok(true)),
        ]));

        let hit = racer.first_matching(&urls(&["u0", "u1"]), |r| r.ok).await;
        assert_eq!(hit.map(|r| r.url), Some("u0".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_failed_earlier_candidates() {
        let racer = racer(ScriptedTransport::new(&[
            ("u0", 5, Ok(false)),
            ("u1", 50, Ok(true)),
            ("u2", 1, Ok(true)),
        ]));

        let hit = racer.first_matching(&urls(&["u0", "u1", "u2"]), |r| r.ok).await;
        assert_eq!(hit.map(|r| r.url), Some("u1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_is_a_failed_candidate() {
        let racer = racer(ScriptedTransport::new(&[
            ("u0", 1, Err(())),
            ("u1", 10, Ok(true)),
        ]));

        let hit = racer.first_matching(&urls(&["u0", "u1"]), |r| r.ok).await;
        assert_eq!(hit.map(|r| r.url), Some("u1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_none_when_nothing_passes() {
        let racer = racer(ScriptedTransport::new(&[
            ("u0", 3, Ok(false)),
            ("u1", 1, Err(())),
            ("u2", 2, Ok(false)),
        ]));

        let hit = racer.first_matching(&urls(&["u0", "u1", "u2"]), |r| r.ok).await;
        assert!(hit.is_none());
        assert_eq!(racer.cache().requests_issued(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_predicate_decides_not_status() {
        let racer = racer(ScriptedTransport::new(&[
            ("u0", 1, Ok(true)),
            ("u1", 1, Ok(true)),
        ]));

        let hit = racer
            .first_matching(&urls(&["u0", "u1"]), |r| r.body.ends_with('1'))
            .await;
        assert_eq!(hit.map(|r| r.url), Some("u1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_candidate_list() {
        let racer = racer(ScriptedTransport::new(&[]));
        assert!(racer.first_matching(&[], |r| r.ok).await.is_none());
    }
}
