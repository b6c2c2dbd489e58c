//! Proxy data models

use crate::error::ProxyError;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Scheme every canonical endpoint is written with
pub const CANONICAL_SCHEME: &str = "http";

/// Raw, unvalidated proxy strings as scraped from a source
pub type RawProxySet = HashSet<String>;

/// Normalized endpoints; ordered only so artifacts are stable across runs
pub type EndpointSet = BTreeSet<Endpoint>;

/// A candidate forward proxy
///
/// Fields are private so an `Endpoint` can only exist with a port inside
/// `(0, 65535)` and a non-empty host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint, rejecting ports outside `(0, 65535)`
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, ProxyError> {
        let host = host.into();
        if host.is_empty() || port == 0 || port == u16::MAX {
            return Err(ProxyError::InvalidEndpoint(format!("{host}:{port}")));
        }
        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the canonical proxy URL (`http://host:port`)
    pub fn url(&self) -> String {
        format!("{}://{}:{}", CANONICAL_SCHEME, self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// How a single fetcher invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success,
    Failure(String),
}

/// Result of running one fetcher
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Name of the source that was fetched
    pub source: String,
    /// Raw proxies extracted from the source
    pub proxies: RawProxySet,
    pub outcome: FetchOutcome,
}

impl FetchResult {
    pub fn success(source: String, proxies: RawProxySet) -> Self {
        Self {
            source,
            proxies,
            outcome: FetchOutcome::Success,
        }
    }

    /// A failed source always contributes an empty set
    pub fn failure(source: String, error: String) -> Self {
        Self {
            source,
            proxies: RawProxySet::new(),
            outcome: FetchOutcome::Failure(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Success)
    }
}

/// Result of a liveness probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Alive,
    Dead(String),
    Timeout,
}

/// Detailed result of a liveness probe
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub endpoint: Endpoint,
    pub status: CheckStatus,
    pub response_time_ms: Option<u64>,
}

impl CheckResult {
    pub fn alive(endpoint: Endpoint, response_time_ms: u64) -> Self {
        Self {
            endpoint,
            status: CheckStatus::Alive,
            response_time_ms: Some(response_time_ms),
        }
    }

    pub fn dead(endpoint: Endpoint, reason: String) -> Self {
        Self {
            endpoint,
            status: CheckStatus::Dead(reason),
            response_time_ms: None,
        }
    }

    pub fn timeout(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            status: CheckStatus::Timeout,
            response_time_ms: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        matches!(self.status, CheckStatus::Alive)
    }
}
