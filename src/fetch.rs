//! Image retrieval over HTTP.
//!
//! The [`Fetcher`] trait is the seam between the pipeline and the network:
//! production code uses [`HttpFetcher`] (reqwest), tests swap in a scripted
//! mock so job orchestration can be exercised without sockets.
//!
//! ## Transport rules
//!
//! - The URL is trimmed and must be an absolute `http`/`https` URI.
//! - Requests carry an explicit `User-Agent`; some image hosts reject empty or
//!   library-default agents.
//! - Connect and read timeouts are always set, so a hung server can stall a
//!   worker for a bounded time only.
//! - Anything other than a 2xx status is a transport failure.
//! - The body is capped at `max_body_bytes` while streaming.
//!
//! Errors are never retried here.

use crate::config::FetchConfig;
use crate::imaging::ImageBuffer;
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Invalid image URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("Could not decode image from {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// Source of decoded images, keyed by URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ImageBuffer, FetchError>;
}

/// Parse and check an image URL before any network I/O.
pub fn parse_image_url(raw: &str) -> Result<Url, FetchError> {
    let trimmed = raw.trim();
    let invalid = |reason: String| FetchError::InvalidUrl {
        url: trimmed.to_string(),
        reason,
    };

    let url = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".into()));
    }
    Ok(url)
}

/// Production fetcher backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_body_bytes: u64,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    async fn download(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let transport = |reason: String| FetchError::Transport {
            url: url.to_string(),
            reason,
        };

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(transport(format!("HTTP status {status}")));
        }
        match response.content_length() {
            Some(len) if len > self.max_body_bytes => {
                return Err(transport(format!(
                    "body of {len} bytes exceeds limit of {}",
                    self.max_body_bytes
                )));
            }
            _ => {}
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| transport(e.to_string()))?
        {
            if (body.len() + chunk.len()) as u64 > self.max_body_bytes {
                return Err(transport(format!(
                    "body exceeds limit of {} bytes",
                    self.max_body_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, raw_url: &str) -> Result<ImageBuffer, FetchError> {
        let url = parse_image_url(raw_url)?;
        debug!(%url, "fetching image");

        let body = self.download(&url).await?;
        debug!(%url, bytes = body.len(), "downloaded image body");

        let decode_err = |reason: String| FetchError::Decode {
            url: url.to_string(),
            reason,
        };
        tokio::task::spawn_blocking(move || ImageBuffer::decode(&body))
            .await
            .map_err(|e| decode_err(e.to_string()))?
            .map_err(|e| decode_err(e.to_string()))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted fetcher: returns a canned result per URL and records calls.
    ///
    /// Unscripted URLs fail with a transport error, like an unreachable host.
    /// An optional delay simulates slow downloads.
    #[derive(Default)]
    pub struct MockFetcher {
        pub responses: Mutex<HashMap<String, Result<ImageBuffer, FetchError>>>,
        pub calls: Mutex<Vec<String>>,
        pub delay: Option<Duration>,
    }

    impl MockFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_delay(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        pub fn respond(&self, url: &str, result: Result<ImageBuffer, FetchError>) {
            self.responses
                .lock()
                .unwrap()
                .insert(url.to_string(), result);
        }

        pub fn respond_image(&self, url: &str, width: u32, height: u32) {
            let img = ImageBuffer::from_fn(width, height, |x, y| {
                [(x % 256) as u8, (y % 256) as u8, 200, 255]
            })
            .unwrap();
            self.respond(url, Ok(img));
        }

        pub fn get_calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self, url: &str) -> Result<ImageBuffer, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.responses
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .unwrap_or_else(|| {
                    Err(FetchError::Transport {
                        url: url.to_string(),
                        reason: "connection refused".into(),
                    })
                })
        }
    }

    #[test]
    fn parse_accepts_http_and_https() {
        assert!(parse_image_url("http://example.com/a.png").is_ok());
        assert!(parse_image_url("https://example.com/a.png").is_ok());
    }

    #[test]
    fn parse_trims_whitespace() {
        let url = parse_image_url("  https://example.com/a.png\n").unwrap();
        assert_eq!(url.as_str(), "https://example.com/a.png");
    }

    #[test]
    fn parse_rejects_malformed() {
        let err = parse_image_url("not a url").unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[test]
    fn parse_rejects_other_schemes() {
        for url in ["ftp://example.com/a.png", "file:///tmp/a.png", "data:image/png;base64,AA"] {
            let err = parse_image_url(url).unwrap_err();
            assert!(matches!(err, FetchError::InvalidUrl { .. }), "{url}");
        }
    }

    #[tokio::test]
    async fn http_fetcher_rejects_invalid_url_without_io() {
        let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
        let err = fetcher.fetch("::nope::").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn http_fetcher_unreachable_host_is_transport_error() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
        let err = fetcher
            .fetch(&format!("http://127.0.0.1:{port}/avatar.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn mock_records_calls_and_fails_unscripted() {
        let fetcher = MockFetcher::new();
        fetcher.respond_image("https://img/ok.png", 10, 20);

        let ok = fetcher.fetch("https://img/ok.png").await.unwrap();
        assert_eq!(ok.dimensions(), (10, 20));
        assert!(fetcher.fetch("https://img/missing.png").await.is_err());
        assert_eq!(
            fetcher.get_calls(),
            vec!["https://img/ok.png", "https://img/missing.png"]
        );
    }
}
