//! Proxy module: the harvest-and-validate pipeline
//!
//! This module provides functionality for:
//! - Running every listing source concurrently and merging the results
//! - Normalizing scraped text into canonical `http://host:port` endpoints
//! - Checking endpoints with a live probe through each proxy
//! - Reading and writing the flat artifact format

pub mod checker;
pub mod crawler;
pub mod models;
pub mod parser;
pub mod pipeline;

pub use checker::{CheckMode, CheckerConfig, ProxyChecker};
pub use crawler::{CrawlerConfig, FetchContext, ProxyCrawler};
pub use models::{
    CheckResult, CheckStatus, Endpoint, EndpointSet, FetchOutcome, FetchResult, RawProxySet,
};
pub use parser::ProxyParser;
pub use pipeline::Pipeline;
