//! HTTP page fetching and per-source politeness delays.
//!
//! # Architecture
//!
//! - [`PageFetcher`]: trait for anything that can turn a URL into a body
//! - [`HttpFetcher`]: the real implementation over a shared `reqwest::Client`
//! - [`RateLimiter`]: owned by each collector; spaces out every request the
//!   source makes by a fixed delay plus random jitter
//!
//! The fetcher never follows redirects on its own. A 3xx comes back as
//! [`Fetched::Redirect`] so the collector can check the target against its
//! allow-list, wait out its delay, and resolve links against the URL the
//! page was actually served from.
//!
//! Every request carries a bounded timeout, so one unresponsive source can
//! only stall its own collector for that long.

use crate::error::{HarvestError, Result};
use async_trait::async_trait;
use rand::{Rng, rng};
use reqwest::header::{ACCEPT, LOCATION, USER_AGENT};
use reqwest::redirect::Policy;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, instrument, warn};
use url::Url;

/// Result of a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    /// A 2xx body.
    Page(String),
    /// A 3xx pointing at this absolute URL.
    Redirect(Url),
}

/// Something that can fetch a page body.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, user_agent: &str) -> Result<Fetched>;
}

/// Fetches pages over HTTP(S) with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| HarvestError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &Url, user_agent: &str) -> Result<Fetched> {
        let http_err = |source| HarvestError::Http {
            url: url.to_string(),
            source,
        };

        let resp = self
            .client
            .get(url.clone())
            .header(USER_AGENT, user_agent)
            .header(
                ACCEPT,
                "text/html,application/xhtml+xml,application/rss+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .await
            .map_err(http_err)?;

        let status = resp.status();
        if status.is_redirection() {
            let location = resp
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| HarvestError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                })?;
            let target = url.join(location).map_err(|source| HarvestError::Url {
                url: location.to_string(),
                source,
            })?;
            debug!(%url, %target, status = status.as_u16(), "Redirected");
            return Ok(Fetched::Redirect(target));
        }
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "Non-success response");
            return Err(HarvestError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(http_err)?;
        debug!(%url, bytes = body.len(), "Fetched page");
        Ok(Fetched::Page(body))
    }
}

/// Minimum spacing between requests made by one source.
///
/// The wait before a request is `delay + uniform(0..=jitter)`, measured from
/// the end of the previous request. Every host on the source's allow-list
/// shares the one slot, so `www.` and bare domains are throttled together.
/// The first request goes out immediately.
#[derive(Debug)]
pub struct RateLimiter {
    delay: Duration,
    jitter: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(delay: Duration, jitter: Duration) -> Self {
        Self {
            delay,
            jitter,
            last_request: Mutex::new(None),
        }
    }

    fn pause(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.delay;
        }
        self.delay
            .saturating_add(Duration::from_millis(rng().random_range(0..=jitter_ms)))
    }

    /// Sleep until the source may send its next request.
    pub async fn wait(&self) {
        let last = self.last_request.lock().ok().and_then(|m| *m);
        if let Some(last) = last {
            let pause = self.pause();
            debug!(?pause, "Rate limiting");
            match last.checked_add(pause) {
                Some(deadline) => sleep_until(deadline).await,
                None => warn!(?pause, "Rate limit pause out of range; not waiting"),
            }
        }
    }

    /// Record that a request just finished.
    pub fn mark(&self) {
        if let Ok(mut m) = self.last_request.lock() {
            *m = Some(Instant::now());
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves canned bodies and redirects by URL; unknown URLs fail like a 404.
    #[derive(Debug, Default)]
    pub struct FakeFetcher {
        pages: HashMap<String, String>,
        redirects: HashMap<String, String>,
        failing_hosts: Vec<String>,
        pub requests: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }

        pub fn with_redirect(mut self, from: &str, to: &str) -> Self {
            self.redirects.insert(from.to_string(), to.to_string());
            self
        }

        pub fn with_failing_host(mut self, host: &str) -> Self {
            self.failing_hosts.push(host.to_string());
            self
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &Url, _user_agent: &str) -> Result<Fetched> {
            self.requests.lock().unwrap().push(url.to_string());
            let host = url.host_str().unwrap_or_default();
            if self.failing_hosts.iter().any(|h| h == host) {
                return Err(HarvestError::Status {
                    url: url.to_string(),
                    status: 503,
                });
            }
            if let Some(to) = self.redirects.get(url.as_str()) {
                return Ok(Fetched::Redirect(Url::parse(to).unwrap()));
            }
            self.pages
                .get(url.as_str())
                .cloned()
                .map(Fetched::Page)
                .ok_or_else(|| HarvestError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    pub fn html_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    pub fn redirect_response(location: &str) -> String {
        format!(
            "HTTP/1.1 302 Found\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        )
    }

    pub fn not_found_response() -> String {
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
    }

    /// Minimal HTTP/1.1 server on 127.0.0.1.
    ///
    /// `respond` gets the server address and the request path and returns
    /// the raw response. Every requested path is recorded in order.
    pub async fn serve<H>(respond: H) -> (SocketAddr, Arc<Mutex<Vec<String>>>)
    where
        H: Fn(SocketAddr, &str) -> String + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let respond = Arc::new(respond);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let log = Arc::clone(&log);
                let respond = Arc::clone(&respond);
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&buf);
                    let path = head
                        .lines()
                        .next()
                        .and_then(|line| line.split_whitespace().nth(1))
                        .unwrap_or("/")
                        .to_string();
                    log.lock().unwrap().push(path.clone());
                    let response = respond(addr, &path);
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (addr, seen)
    }
}
