//! Proxy crawler module: the harvest stage
//!
//! This module provides:
//! - The per-run HTTP context handed to every fetcher
//! - Concurrent, fault-isolated execution of all fetchers
//! - The union of everything the fetchers found

use crate::error::ProxyError;
use crate::proxy::models::{FetchOutcome, FetchResult, RawProxySet};
use crate::sources::Fetcher;
use crate::Result;
use futures::stream::{self, StreamExt};
use reqwest::header::SET_COOKIE;
use reqwest::{Client, RequestBuilder};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Default timeout for HTTP requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 6;

/// Default pause between pages of a paginating source, in milliseconds
const DEFAULT_CRAWL_DELAY_MS: u64 = 1300;

/// Default user agent for HTTP requests
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Number of fetchers run at once when nothing else is configured
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Configuration for the harvest stage
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Timeout for each HTTP request
    pub timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: String,
    /// Maximum number of fetchers running at once
    pub concurrency: usize,
    /// Pause between successive pages of one source
    pub crawl_delay: Duration,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            concurrency: default_concurrency(),
            crawl_delay: Duration::from_millis(DEFAULT_CRAWL_DELAY_MS),
        }
    }
}

impl CrawlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_crawl_delay(mut self, crawl_delay: Duration) -> Self {
        self.crawl_delay = crawl_delay;
        self
    }
}

/// Everything a fetcher may use during one run
///
/// Cloning is cheap; the underlying client shares its connection pool.
#[derive(Debug, Clone)]
pub struct FetchContext {
    config: CrawlerConfig,
    client: Client,
}

impl FetchContext {
    pub fn new(config: CrawlerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Start a GET request with the run's user agent and timeout
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Send `request` and return the body of a successful response
    pub async fn fetch_text(&self, request: RequestBuilder) -> std::result::Result<String, ProxyError> {
        let response = request.send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    /// Load `url` and return the cookies it sets as a `Cookie` header value
    pub async fn cookies(&self, url: &str) -> std::result::Result<String, ProxyError> {
        let response = self.get(url).send().await?;
        let cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .map(str::trim)
            .filter(|pair| pair.contains('='))
            .collect::<Vec<_>>()
            .join("; ");
        Ok(cookies)
    }

    /// Pause between two pages of the same source
    pub async fn crawl_delay(&self) {
        tokio::time::sleep(self.config.crawl_delay).await;
    }
}

/// Runs every registered fetcher and merges what they find
pub struct ProxyCrawler {
    context: FetchContext,
    fetchers: Vec<Arc<dyn Fetcher>>,
}

impl ProxyCrawler {
    /// Create a crawler over an explicit list of fetchers
    pub fn with_fetchers(config: CrawlerConfig, fetchers: Vec<Arc<dyn Fetcher>>) -> Result<Self> {
        Ok(Self {
            context: FetchContext::new(config)?,
            fetchers,
        })
    }

    /// Run every fetcher, at most `concurrency` at a time
    ///
    /// Each fetcher runs in its own task, so an error or even a panic in one
    /// source is reported as that source's failure and nothing else.
    pub async fn crawl_with_results(&self) -> Vec<FetchResult> {
        let limit = self.context.config().concurrency.max(1);

        stream::iter(self.fetchers.iter().cloned())
            .map(|fetcher| {
                let context = self.context.clone();
                async move {
                    let name = fetcher.name().to_string();
                    let handle = tokio::spawn(async move { fetcher.fetch(&context).await });
                    match handle.await {
                        Ok(Ok(proxies)) => FetchResult::success(name, proxies),
                        Ok(Err(e)) => FetchResult::failure(name, e.to_string()),
                        Err(e) => FetchResult::failure(name, format!("fetcher aborted: {e}")),
                    }
                }
            })
            .buffer_unordered(limit)
            .collect()
            .await
    }

    /// Run every fetcher and return the union of their raw proxies
    #[instrument(level = "info", skip_all, fields(sources = self.fetchers.len()))]
    pub async fn harvest(&self) -> RawProxySet {
        let mut union = RawProxySet::new();

        for result in self.crawl_with_results().await {
            match &result.outcome {
                FetchOutcome::Success => {
                    info!(source = %result.source, count = result.proxies.len(), "Source harvested");
                }
                FetchOutcome::Failure(error) => {
                    warn!(source = %result.source, %error, "Source failed");
                }
            }
            union.extend(result.proxies);
        }

        info!(total = union.len(), "Harvest complete");
        union
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticFetcher {
        name: &'static str,
        proxies: &'static [&'static str],
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, _ctx: &FetchContext) -> std::result::Result<RawProxySet, ProxyError> {
            Ok(self.proxies.iter().map(|p| p.to_string()).collect())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl Fetcher for FailingFetcher {
        fn name(&self) -> &str {
            "failing"
        }

        async fn fetch(&self, _ctx: &FetchContext) -> std::result::Result<RawProxySet, ProxyError> {
            Err(ProxyError::SourceUnavailable("connection refused".to_string()))
        }
    }

    struct PanickingFetcher;

    #[async_trait]
    impl Fetcher for PanickingFetcher {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn fetch(&self, _ctx: &FetchContext) -> std::result::Result<RawProxySet, ProxyError> {
            panic!("parser blew up");
        }
    }

    struct SlowFetcher {
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Fetcher for SlowFetcher {
        fn name(&self) -> &str {
            "slow"
        }

        async fn fetch(&self, _ctx: &FetchContext) -> std::result::Result<RawProxySet, ProxyError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(RawProxySet::new())
        }
    }

    fn crawler(fetchers: Vec<Arc<dyn Fetcher>>) -> ProxyCrawler {
        ProxyCrawler::with_fetchers(CrawlerConfig::new().with_concurrency(4), fetchers).unwrap()
    }

    #[test]
    fn test_crawler_config_default() {
        let config = CrawlerConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.crawl_delay, Duration::from_millis(DEFAULT_CRAWL_DELAY_MS));
        assert!(config.concurrency >= 1);
    }

    #[test]
    fn test_crawler_config_builder() {
        let config = CrawlerConfig::new()
            .with_timeout(Duration::from_secs(20))
            .with_user_agent("Custom Agent".to_string())
            .with_concurrency(3)
            .with_crawl_delay(Duration::from_secs(1));

        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.user_agent, "Custom Agent");
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.crawl_delay, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_harvest_union_bounds() {
        let crawler = crawler(vec![
            Arc::new(StaticFetcher {
                name: "a",
                proxies: &["1.1.1.1:80", "2.2.2.2:80"],
            }),
            Arc::new(StaticFetcher {
                name: "b",
                proxies: &["2.2.2.2:80", "3.3.3.3:80", "4.4.4.4:80"],
            }),
        ]);

        let union = crawler.harvest().await;
        assert!(union.len() >= 3);
        assert!(union.len() <= 5);
        assert_eq!(union.len(), 4);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let healthy: Vec<Arc<dyn Fetcher>> = vec![Arc::new(StaticFetcher {
            name: "healthy",
            proxies: &["1.1.1.1:80", "5.5.5.5:8080"],
        })];
        let baseline = crawler(healthy.clone()).harvest().await;

        let mut mixed = healthy;
        mixed.push(Arc::new(FailingFetcher));
        mixed.push(Arc::new(PanickingFetcher));
        let crawler = crawler(mixed);

        let results = crawler.crawl_with_results().await;
        assert_eq!(results.len(), 3);
        assert_eq!(results.iter().filter(|r| r.is_success()).count(), 1);
        for result in results.iter().filter(|r| !r.is_success()) {
            assert!(result.proxies.is_empty());
        }

        assert_eq!(crawler.harvest().await, baseline);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let fetchers: Vec<Arc<dyn Fetcher>> = (0..10)
            .map(|_| {
                Arc::new(SlowFetcher {
                    in_flight: Arc::clone(&in_flight),
                    peak: Arc::clone(&peak),
                }) as Arc<dyn Fetcher>
            })
            .collect();

        let crawler =
            ProxyCrawler::with_fetchers(CrawlerConfig::new().with_concurrency(3), fetchers).unwrap();
        let results = crawler.crawl_with_results().await;

        assert_eq!(results.len(), 10);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let crawler = crawler(Vec::new());
        assert!(crawler.harvest().await.is_empty());
    }
}
