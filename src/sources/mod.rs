//! Proxy listing sources.
//!
//! Every source is a value implementing [`Fetcher`]. The full set is declared
//! statically in [`default_fetchers`], so the list of sites a run touches is
//! visible in one place and each source can be exercised on its own.
//!
//! # Source shapes
//!
//! | Shape | Module | Parsing |
//! |-------|--------|---------|
//! | Plain text / loose HTML | [`text`] | IPv4:PORT regex over the body |
//! | HTML tables | [`table`] | CSS row selector, combined or split ip/port cells |
//! | JSON APIs | [`api`] | serde, one adapter per API |
//!
//! A fetcher returns `Ok` with an empty set when a source simply lists
//! nothing; `Err` is reserved for network and parse failures.

pub mod api;
pub mod table;
pub mod text;

use crate::error::ProxyError;
use crate::proxy::crawler::FetchContext;
use crate::proxy::models::RawProxySet;
use async_trait::async_trait;
use std::sync::Arc;

pub use api::{CheckerProxyArchive, Hidester, OpenProxySpace, Proxy11, ProxyListDownload};
pub use table::{HtmlTableSource, TableLayout};
pub use text::TextListSource;

/// A single proxy listing source
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Stable name used in logs
    fn name(&self) -> &str;

    /// Retrieve raw `host:port` strings from the source
    async fn fetch(&self, ctx: &FetchContext) -> Result<RawProxySet, ProxyError>;
}

/// Every source harvested by a default run
pub fn default_fetchers() -> Vec<Arc<dyn Fetcher>> {
    let mut fetchers: Vec<Arc<dyn Fetcher>> = text::sources()
        .into_iter()
        .map(|source| Arc::new(source) as Arc<dyn Fetcher>)
        .collect();

    fetchers.extend(
        table::sources()
            .into_iter()
            .map(|source| Arc::new(source) as Arc<dyn Fetcher>),
    );

    fetchers.push(Arc::new(Proxy11));
    fetchers.push(Arc::new(ProxyListDownload));
    fetchers.push(Arc::new(Hidester));
    fetchers.push(Arc::new(OpenProxySpace));
    fetchers.push(Arc::new(CheckerProxyArchive));

    fetchers
}
