//! Proxy Machine - Proxy Harvester and Checker
//!
//! Collects public HTTP proxies from dozens of listing sites, normalizes them
//! into one deduplicated set, optionally keeps only the ones that answer a
//! live probe, and writes the result to a flat text file.

pub mod error;
pub mod proxy;
pub mod sources;

pub use error::ProxyError;
pub use proxy::*;

use std::path::PathBuf;

/// Application result type
pub type Result<T> = anyhow::Result<T>;

/// Configuration for one pipeline run
#[derive(Debug, Clone)]
pub struct Config {
    /// Artifact path, fully replaced at the end of the run
    pub output: PathBuf,
    /// Existing artifact to re-check instead of harvesting
    pub infile: Option<PathBuf>,
    /// Whether to probe every endpoint before writing
    pub check: bool,
    /// Harvest stage settings
    pub crawler: CrawlerConfig,
    /// Liveness stage settings
    pub checker: CheckerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: PathBuf::from("proxies.txt"),
            infile: None,
            check: false,
            crawler: CrawlerConfig::default(),
            checker: CheckerConfig::default(),
        }
    }
}
