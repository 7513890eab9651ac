use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::Url;

use gt_core::types::FilterSource;

use crate::config::FetchConfig;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Redirect without usable location from '{0}'")]
    BadRedirect(String),
    #[error("Too many redirects ({0})")]
    TooManyRedirects(u32),
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub location: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

/// Single GET without redirect following.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(HttpResponse {
            status,
            location,
            body,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Base delay; retry `n` waits `n * backoff`
    pub backoff: Duration,
    pub max_redirects: u32,
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self {
            attempts: config.attempts.max(1),
            backoff: config.backoff(),
            max_redirects: config.max_redirects,
        }
    }
}

/// Downloads filter lists, retrying with linear backoff.
pub struct ListFetcher<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> ListFetcher<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Body of `source`, or an empty string once every attempt has failed.
    pub async fn fetch_text(&self, source: &FilterSource) -> String {
        for attempt in 1..=self.policy.attempts {
            match self.fetch_following_redirects(&source.url).await {
                Ok(text) => {
                    log::info!("{} fetched ({} chars)", source.name, text.len());
                    return text;
                }
                Err(e) => {
                    log::warn!(
                        "{} fetch attempt {}/{} failed: {}",
                        source.name,
                        attempt,
                        self.policy.attempts,
                        e
                    );
                    if attempt < self.policy.attempts {
                        tokio::time::sleep(self.policy.backoff * attempt).await;
                    }
                }
            }
        }

        log::warn!("{} unavailable, continuing without it", source.name);
        String::new()
    }

    async fn fetch_following_redirects(&self, url: &str) -> Result<String, FetchError> {
        let mut current = url.to_string();

        for _ in 0..=self.policy.max_redirects {
            let response = self.transport.get(&current).await?;
            if response.is_success() {
                return Ok(response.body);
            }
            if !response.is_redirect() {
                return Err(FetchError::Status(response.status));
            }

            let location = response
                .location
                .as_deref()
                .and_then(|location| resolve_location(&current, location))
                .ok_or_else(|| FetchError::BadRedirect(current.clone()))?;
            log::debug!("Redirected from {} to {}", current, location);
            current = location;
        }

        Err(FetchError::TooManyRedirects(self.policy.max_redirects))
    }
}

fn resolve_location(base: &str, location: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(location).ok().map(String::from)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted transport: each URL answers with its queued responses in
    /// order, repeating the last one. `None` is a network error.
    #[derive(Default)]
    pub(crate) struct MockTransport {
        responses: Mutex<HashMap<String, Vec<Option<HttpResponse>>>>,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn ok(self, url: &str, body: &str) -> Self {
            self.push(url, Some(response(200, None, body)))
        }

        pub(crate) fn status(self, url: &str, status: u16) -> Self {
            self.push(url, Some(response(status, None, "")))
        }

        pub(crate) fn redirect(self, url: &str, location: &str) -> Self {
            self.push(url, Some(response(302, Some(location), "")))
        }

        pub(crate) fn network_error(self, url: &str) -> Self {
            self.push(url, None)
        }

        fn push(self, url: &str, result: Option<HttpResponse>) -> Self {
            self.responses
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push(result);
            self
        }

        pub(crate) fn call_count(&self, url: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
        }
    }

    fn response(status: u16, location: Option<&str>, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            location: location.map(str::to_string),
            body: body.to_string(),
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(url.to_string());
                calls.iter().filter(|u| *u == url).count()
            };

            let responses = self.responses.lock().unwrap();
            let queue = match responses.get(url) {
                Some(queue) if !queue.is_empty() => queue,
                _ => return Err(FetchError::Network(format!("no route to {}", url))),
            };
            match &queue[(call - 1).min(queue.len() - 1)] {
                Some(response) => Ok(response.clone()),
                None => Err(FetchError::Network("connection reset".to_string())),
            }
        }
    }

    pub(crate) fn no_backoff(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            backoff: Duration::ZERO,
            max_redirects: 3,
        }
    }

    fn source(url: &str) -> FilterSource {
        FilterSource::new("Test", url)
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let transport =
            MockTransport::new().ok("https://lists.example/a.txt", "||ads.example.com^");
        let fetcher = ListFetcher::new(transport, no_backoff(3));
        let text = fetcher.fetch_text(&source("https://lists.example/a.txt")).await;
        assert_eq!(text, "||ads.example.com^");
        assert_eq!(fetcher.transport().call_count("https://lists.example/a.txt"), 1);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let url = "https://lists.example/flaky.txt";
        let transport = MockTransport::new()
            .status(url, 503)
            .network_error(url)
            .ok(url, "body");
        let fetcher = ListFetcher::new(transport, no_backoff(3));
        assert_eq!(fetcher.fetch_text(&source(url)).await, "body");
        assert_eq!(fetcher.transport().call_count(url), 3);
    }

    #[tokio::test]
    async fn test_all_attempts_fail_gives_empty() {
        let url = "https://lists.example/down.txt";
        let transport = MockTransport::new().status(url, 500);
        let fetcher = ListFetcher::new(transport, no_backoff(3));
        assert_eq!(fetcher.fetch_text(&source(url)).await, "");
        assert_eq!(fetcher.transport().call_count(url), 3);
    }

    #[tokio::test]
    async fn test_follows_relative_redirect() {
        let transport = MockTransport::new()
            .redirect("https://lists.example/old.txt", "/new.txt")
            .ok("https://lists.example/new.txt", "moved");
        let fetcher = ListFetcher::new(transport, no_backoff(1));
        let text = fetcher.fetch_text(&source("https://lists.example/old.txt")).await;
        assert_eq!(text, "moved");
    }

    #[tokio::test]
    async fn test_redirect_loop_is_bounded() {
        let transport = MockTransport::new()
            .redirect("https://lists.example/a", "https://lists.example/b")
            .redirect("https://lists.example/b", "https://lists.example/a");
        let fetcher = ListFetcher::new(transport, no_backoff(2));
        assert_eq!(fetcher.fetch_text(&source("https://lists.example/a")).await, "");
        // max_redirects = 3 gives 4 requests per attempt
        let calls = fetcher.transport().calls.lock().unwrap().len();
        assert_eq!(calls, 8);
    }

    #[tokio::test]
    async fn test_backoff_grows_linearly() {
        let url = "https://lists.example/slow.txt";
        let transport = MockTransport::new().status(url, 500);
        let policy = RetryPolicy {
            attempts: 3,
            backoff: Duration::from_millis(20),
            max_redirects: 0,
        };
        let fetcher = ListFetcher::new(transport, policy);
        let start = std::time::Instant::now();
        assert_eq!(fetcher.fetch_text(&source(url)).await, "");
        // 20ms before attempt 2, 40ms before attempt 3
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_resolve_location() {
        assert_eq!(
            resolve_location("https://a.example/x/y.txt", "z.txt").as_deref(),
            Some("https://a.example/x/z.txt")
        );
        assert_eq!(
            resolve_location("https://a.example/x", "https://b.example/list").as_deref(),
            Some("https://b.example/list")
        );
        assert_eq!(resolve_location("not a url", "/x"), None);
    }
}
