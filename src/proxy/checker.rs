//! Proxy checker module: liveness probes through each candidate

use crate::error::ProxyError;
use crate::proxy::crawler::DEFAULT_USER_AGENT;
use crate::proxy::models::{CheckResult, Endpoint, EndpointSet};
use futures::stream::{self, StreamExt};
use reqwest::{Client, Proxy as ReqwestProxy};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

/// Default timeout for proxy checks in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 6;

/// Default number of probes in flight
pub const DEFAULT_CONCURRENCY: usize = 100;

/// Default echo service; answers `{"ip": "<client address>", ...}`
pub const DEFAULT_TEST_URL: &str = "http://api.myip.com/";

/// How probes are scheduled
///
/// Both modes produce the same surviving set; they differ only in whether
/// probes share the calling task or are spread over the runtime's workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckMode {
    /// Probes multiplexed on the calling task
    #[default]
    Cooperative,
    /// One spawned task per probe, gated by a semaphore
    Pooled,
}

impl fmt::Display for CheckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckMode::Cooperative => write!(f, "cooperative"),
            CheckMode::Pooled => write!(f, "pooled"),
        }
    }
}

impl FromStr for CheckMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cooperative" | "async" => Ok(CheckMode::Cooperative),
            "pooled" | "threads" => Ok(CheckMode::Pooled),
            _ => Err(format!("Invalid check mode: {s}. Use: cooperative, pooled")),
        }
    }
}

/// Configuration for proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Deadline for each probe
    pub timeout: Duration,
    /// Maximum number of probes in flight
    pub concurrency: usize,
    /// Echo service the probe is routed to
    pub test_url: String,
    pub user_agent: String,
    pub mode: CheckMode,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            test_url: DEFAULT_TEST_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            mode: CheckMode::default(),
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_test_url(mut self, url: String) -> Self {
        self.test_url = url;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_mode(mut self, mode: CheckMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Body returned by the echo service
#[derive(Debug, Deserialize)]
struct EchoResponse {
    ip: String,
}

/// Proxy checker for validating proxies
#[derive(Debug, Clone, Default)]
pub struct ProxyChecker {
    config: CheckerConfig,
}

impl ProxyChecker {
    /// Create a new proxy checker with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new proxy checker with custom configuration
    pub fn with_config(config: CheckerConfig) -> Self {
        Self { config }
    }

    /// Probe a single endpoint
    ///
    /// Alive only if the echo service sees the endpoint's own host as the
    /// client address. A proxy that forwards through a different exit address
    /// counts as dead.
    pub async fn check_proxy(&self, endpoint: &Endpoint) -> CheckResult {
        let start = Instant::now();

        let client = match self.create_client(endpoint) {
            Ok(client) => client,
            Err(e) => return CheckResult::dead(endpoint.clone(), e.to_string()),
        };

        let result = match tokio::time::timeout(self.config.timeout, self.probe(&client)).await {
            Ok(Ok(ip)) if ip == endpoint.host() => {
                CheckResult::alive(endpoint.clone(), start.elapsed().as_millis() as u64)
            }
            Ok(Ok(ip)) => CheckResult::dead(
                endpoint.clone(),
                format!("exit address {ip} does not match proxy host"),
            ),
            Ok(Err(e)) => CheckResult::dead(endpoint.clone(), e.to_string()),
            Err(_) => CheckResult::timeout(endpoint.clone()),
        };

        if result.is_alive() {
            info!(proxy = %endpoint, ms = result.response_time_ms, "Good proxy");
        } else {
            debug!(proxy = %endpoint, status = ?result.status, "Dead proxy");
        }
        result
    }

    /// Probe every endpoint, at most `concurrency` at a time
    pub async fn check_proxies(&self, endpoints: &EndpointSet) -> Vec<CheckResult> {
        let limit = self.config.concurrency.max(1);
        match self.config.mode {
            CheckMode::Cooperative => self.check_cooperative(endpoints, limit).await,
            CheckMode::Pooled => self.check_pooled(endpoints, limit).await,
        }
    }

    /// Return the subset of `endpoints` that passed the probe
    #[instrument(level = "info", skip_all, fields(candidates = endpoints.len(), mode = %self.config.mode))]
    pub async fn check(&self, endpoints: &EndpointSet) -> EndpointSet {
        let alive: EndpointSet = self
            .check_proxies(endpoints)
            .await
            .into_iter()
            .filter(CheckResult::is_alive)
            .map(|result| result.endpoint)
            .collect();

        info!(alive = alive.len(), dead = endpoints.len() - alive.len(), "Check complete");
        alive
    }

    async fn check_cooperative(&self, endpoints: &EndpointSet, limit: usize) -> Vec<CheckResult> {
        stream::iter(endpoints.iter())
            .map(|endpoint| self.check_proxy(endpoint))
            .buffer_unordered(limit)
            .collect()
            .await
    }

    async fn check_pooled(&self, endpoints: &EndpointSet, limit: usize) -> Vec<CheckResult> {
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut tasks = JoinSet::new();

        for endpoint in endpoints.iter().cloned() {
            let checker = self.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                // The semaphore is never closed, so acquiring cannot fail
                let _permit = semaphore.acquire_owned().await.ok();
                checker.check_proxy(&endpoint).await
            });
        }

        let mut results = Vec::with_capacity(endpoints.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => warn!(error = %e, "Probe task failed"),
            }
        }
        results
    }

    async fn probe(&self, client: &Client) -> Result<String, ProxyError> {
        let response = client.get(&self.config.test_url).send().await?;
        if !response.status().is_success() {
            return Err(ProxyError::SourceUnavailable(format!(
                "HTTP status: {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let echo: EchoResponse = serde_json::from_str(&body)?;
        Ok(echo.ip.trim().to_string())
    }

    /// Create a one-off client routing all traffic through `endpoint`
    ///
    /// Nothing is pooled, so an abandoned probe leaves no shared state behind.
    /// The deadline lives in `check_proxy`, so the client carries no timeout
    /// of its own.
    fn create_client(&self, endpoint: &Endpoint) -> Result<Client, ProxyError> {
        let proxy = ReqwestProxy::all(endpoint.url())?;

        let client = Client::builder()
            .proxy(proxy)
            .user_agent(&self.config.user_agent)
            .pool_max_idle_per_host(0)
            .build()?;

        Ok(client)
    }
}
