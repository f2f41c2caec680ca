//! reqwest-backed transport

use super::{FetchError, FetchOutcome, FetchResult, Transport};
use async_trait::async_trait;
use std::time::Duration;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP transport with a bounded per-request timeout.
///
/// Timeouts and non-2xx statuses come back as `ok: false`; connection,
/// TLS and protocol failures come back as [`FetchError::Transport`].
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("collect-licenses/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> FetchOutcome {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                tracing::warn!("Timed out fetching {}", url);
                return Ok(FetchResult::failed(url, None));
            }
            Err(e) => return Err(FetchError::transport(url, e.to_string())),
        };

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("HTTP {} for {}", status, url);
            return Ok(FetchResult::failed(url, Some(status.as_u16())));
        }

        match response.text().await {
            Ok(body) => Ok(FetchResult::success(url, status.as_u16(), body)),
            Err(e) if e.is_timeout() => {
                tracing::warn!("Timed out reading body of {}", url);
                Ok(FetchResult::failed(url, Some(status.as_u16())))
            }
            Err(e) => Err(FetchError::transport(url, e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Local server that sends `response` (or nothing, when `None`) to the
    /// first connection
    async fn serve_once(response: Option<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            match response {
                Some(raw) => {
                    let _ = socket.write_all(raw.as_bytes()).await;
                    let _ = socket.shutdown().await;
                }
                None => tokio::time::sleep(Duration::from_secs(10)).await,
            }
        });
        format!("http://{}/LICENSE", addr)
    }

    #[tokio::test]
    async fn test_success_returns_body() {
        let url = serve_once(Some(
            "HTTP/1.1 200 OK\r\ncontent-length: 11\r\nconnection: close\r\n\r\nMIT License",
        ))
        .await;
        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();

        let result = transport.get(&url).await.unwrap();
        assert_eq!(result, FetchResult::success(url.as_str(), 200, "MIT License"));
    }

    #[tokio::test]
    async fn test_not_found_is_not_ok() {
        let url = serve_once(Some(
            "HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        ))
        .await;
        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();

        let result = transport.get(&url).await.unwrap();
        assert!(!result.ok);
        assert_eq!(result.status, Some(404));
        assert!(result.body.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_is_not_ok() {
        let url = serve_once(None).await;
        let transport = HttpTransport::new(Duration::from_millis(50)).unwrap();

        let result = transport.get(&url).await.unwrap();
        assert!(matches!(result, FetchResult { ok: false, status: None, .. }));
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
        let url = format!("http://{}/LICENSE", addr);

        match transport.get(&url).await {
            Err(FetchError::Transport { url: failed, .. }) => assert_eq!(failed, url),
            other => panic!("expected transport error, got {other:?}"),
        }
    }
}
