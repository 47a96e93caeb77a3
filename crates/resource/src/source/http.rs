//! HTTP(S) source.

use crate::error::{ErrorKind, Result};
use crate::media::{self, strip_parameters};
use crate::source::{Fetched, ResourceSource, enforce_limit};
use crate::{Locator, ResourceKind};
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::path::Path;
use std::time::Duration;

/// Fetches `http://` and `https://` resources.
///
/// Any non-success status is reported as [`NotFound`](ErrorKind::NotFound):
/// from the cache's point of view there is nothing to fingerprint either way.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    /// Create a source whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sieve/", env!("CARGO_PKG_VERSION")))
            .build()
            .or_raise(|| ErrorKind::Network("failed to build HTTP client".to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ResourceSource for HttpSource {
    fn name(&self) -> &str {
        "http"
    }

    fn accepts(&self, locator: &Locator) -> bool {
        locator.as_url().is_some_and(|url| matches!(url.scheme(), "http" | "https"))
    }

    async fn fetch(&self, locator: &Locator, limit: u64) -> Result<Fetched> {
        let Some(url) = locator.as_url() else {
            exn::bail!(ErrorKind::InvalidLocator(locator.identity()));
        };
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ErrorKind::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            exn::bail!(ErrorKind::NotFound(format!("{url} (HTTP {status})")));
        }
        if let Some(declared) = response.content_length() {
            enforce_limit(declared, limit)?;
        }
        let declared_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(strip_parameters)
            .filter(|media_type| !media_type.is_empty());

        // Chunked responses don't declare a length; count as we go.
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| ErrorKind::Network(e.to_string()))? {
            bytes.extend_from_slice(&chunk);
            enforce_limit(u64::try_from(bytes.len()).unwrap_or(u64::MAX), limit)?;
        }
        let media_type = declared_type.unwrap_or_else(|| media::detect(Path::new(url.path()), &bytes));
        Ok(Fetched {
            kind: ResourceKind::Url,
            media_type,
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer every request on a local port with `response`; returns the base URL.
    async fn serve(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                _ = socket.write_all(response.as_bytes()).await;
                _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    fn source() -> HttpSource {
        HttpSource::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_accepts_only_http_urls() {
        let source = HttpSource::new(Duration::from_secs(1)).unwrap();
        assert!(source.accepts(&Locator::parse("http://example.com/a").unwrap()));
        assert!(source.accepts(&Locator::parse("https://example.com/a").unwrap()));
        assert!(!source.accepts(&Locator::parse("/tmp/a").unwrap()));
    }

    #[tokio::test]
    async fn test_rejects_path_locators() {
        let source = HttpSource::new(Duration::from_secs(1)).unwrap();
        let err = source.fetch(&Locator::parse("/tmp/a").unwrap(), 10).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidLocator(_)));
    }

    #[tokio::test]
    async fn test_error_statuses_are_not_found() {
        let base = serve("HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
        let locator = Locator::parse(&format!("{base}/missing.txt")).unwrap();
        let err = source().fetch(&locator, 100).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(message) if message.contains("404")));
    }

    #[tokio::test]
    async fn test_declared_type_loses_its_parameters() {
        let base = serve(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: 11\r\nConnection: close\r\n\r\nhello world",
        )
        .await;
        let locator = Locator::parse(&format!("{base}/greeting")).unwrap();
        let fetched = source().fetch(&locator, 100).await.unwrap();
        assert_eq!(fetched.kind, ResourceKind::Url);
        assert_eq!(fetched.media_type, "text/plain");
        assert_eq!(fetched.size, 11);
        assert_eq!(fetched.bytes, b"hello world");
    }

    #[tokio::test]
    async fn test_declared_length_over_the_cap() {
        let base = serve(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 11\r\nConnection: close\r\n\r\nhello world",
        )
        .await;
        let locator = Locator::parse(&format!("{base}/big.txt")).unwrap();
        let err = source().fetch(&locator, 5).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::TooLarge { size: 11, limit: 5 }));
    }

    #[tokio::test]
    async fn test_streamed_body_over_the_cap() {
        let base = serve(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n4\r\nhell\r\n7\r\no world\r\n0\r\n\r\n",
        )
        .await;
        let locator = Locator::parse(&format!("{base}/stream.txt")).unwrap();
        let err = source().fetch(&locator, 5).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::TooLarge { size, limit: 5 } if *size > 5));
    }
}
