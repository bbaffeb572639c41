//! Rate feed sources and the retry policy applied at the fetch boundary.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::error::FetchError;

/// Published location of the CNB daily fixing.
pub const CNB_DAILY_URL: &str = "https://www.cnb.cz/en/financial-markets/foreign-exchange-market/central-bank-exchange-rate-fixing/central-bank-exchange-rate-fixing/daily.txt";

/// Trait for sources of raw feed text.
#[async_trait]
pub trait RateFeed: Send + Sync {
    /// Get the feed name.
    fn name(&self) -> &str;

    /// Retrieve the raw feed text.
    async fn fetch_text(&self) -> Result<String, FetchError>;
}

/// Configuration for the HTTP feed.
#[derive(Debug, Clone)]
pub struct HttpFeedConfig {
    /// URL of the daily text file.
    pub url: String,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for HttpFeedConfig {
    fn default() -> Self {
        Self {
            url: CNB_DAILY_URL.to_string(),
            timeout: Duration::from_secs(10),
            user_agent: concat!("cnbfx/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Fetches the feed over HTTPS.
pub struct HttpRateFeed {
    client: reqwest::Client,
    config: HttpFeedConfig,
}

impl HttpRateFeed {
    pub fn new(config: HttpFeedConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }
}

#[async_trait]
impl RateFeed for HttpRateFeed {
    fn name(&self) -> &str {
        "CNB"
    }

    #[instrument(skip(self), fields(url = %self.config.url))]
    async fn fetch_text(&self) -> Result<String, FetchError> {
        let response = self
            .client
            .get(&self.config.url)
            .header(reqwest::header::ACCEPT, "text/plain;charset=UTF-8")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        debug!(bytes = text.len(), "Fetched feed text");
        non_empty(text)
    }
}

/// Serves text that was obtained some other way, e.g. read from a file.
#[derive(Debug, Clone)]
pub struct StaticRateFeed {
    name: String,
    text: String,
}

impl StaticRateFeed {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

#[async_trait]
impl RateFeed for StaticRateFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_text(&self) -> Result<String, FetchError> {
        non_empty(self.text.clone())
    }
}

fn non_empty(text: String) -> Result<String, FetchError> {
    if text.trim().is_empty() {
        return Err(FetchError::Parse("Empty response from CNB API".to_string()));
    }
    Ok(text)
}

/// Exponential backoff for retryable fetch failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries once.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether another attempt should follow a failure on attempt `attempt` (0-based).
    pub fn should_retry(&self, attempt: u32, error: &FetchError) -> bool {
        error.is_retryable() && attempt + 1 < self.max_attempts
    }
}

/// Fetch from `feed`, retrying retryable failures according to `policy`.
pub async fn fetch_with_retry(feed: &dyn RateFeed, policy: &RetryPolicy) -> Result<String, FetchError> {
    let mut attempt = 0;
    loop {
        match feed.fetch_text().await {
            Ok(text) => return Ok(text),
            Err(e) if policy.should_retry(attempt, &e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    feed = feed.name(),
                    attempt = attempt + 1,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Feed fetch failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Mock feed for testing: replays scripted responses, then repeats the last.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateFeed {
    responses: parking_lot::Mutex<std::collections::VecDeque<Result<String, FetchError>>>,
    last: parking_lot::Mutex<Option<Result<String, FetchError>>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateFeed {
    pub fn new(responses: Vec<Result<String, FetchError>>) -> Self {
        Self {
            responses: parking_lot::Mutex::new(responses.into()),
            last: parking_lot::Mutex::new(None),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of fetches made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateFeed for MockRateFeed {
    fn name(&self) -> &str {
        "MOCK"
    }

    async fn fetch_text(&self) -> Result<String, FetchError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let next = self.responses.lock().pop_front();
        let mut last = self.last.lock();
        match next {
            Some(response) => {
                *last = Some(response.clone());
                response
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(FetchError::Network("no scripted response".to_string()))),
        }
    }
}
