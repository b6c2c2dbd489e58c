//! JSON API sources, one adapter per API shape.

use super::Fetcher;
use crate::error::ProxyError;
use crate::proxy::crawler::FetchContext;
use crate::proxy::models::RawProxySet;
use crate::proxy::parser::ProxyParser;
use async_trait::async_trait;
use chrono::{Local, Utc};
use reqwest::header::{ACCEPT, COOKIE, REFERER};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Render a JSON scalar the way it would appear in `ip:port` text
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn join(ip: &Value, port: &Value) -> Option<String> {
    Some(format!("{}:{}", scalar(ip)?, scalar(port)?))
}

/// proxy11.com demo API: `{"data": [{"ip": .., "port": ..}]}`
pub struct Proxy11;

impl Proxy11 {
    const URL: &'static str = "https://proxy11.com/api/demoweb/proxy.json";

    pub fn parse(body: &str) -> Result<RawProxySet, ProxyError> {
        #[derive(Deserialize)]
        struct Response {
            data: Vec<Value>,
        }

        let response: Response = serde_json::from_str(body)?;
        Ok(response
            .data
            .iter()
            .filter_map(|entry| join(&entry["ip"], &entry["port"]))
            .collect())
    }
}

#[async_trait]
impl Fetcher for Proxy11 {
    fn name(&self) -> &str {
        "proxy11.com"
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<RawProxySet, ProxyError> {
        let body = ctx.fetch_text(ctx.get(Self::URL)).await?;
        Self::parse(&body)
    }
}

/// proxy-list.download: `[{"LISTA": [{"IP": .., "PORT": ..}]}]`
pub struct ProxyListDownload;

impl ProxyListDownload {
    const URL: &'static str = "https://www.proxy-list.download/api/v0/get?l=en&t=http";

    pub fn parse(body: &str) -> Result<RawProxySet, ProxyError> {
        let data: Vec<Value> = serde_json::from_str(body)?;
        let list = data
            .first()
            .and_then(|first| first["LISTA"].as_array())
            .ok_or_else(|| ProxyError::MalformedResponse("missing LISTA".to_string()))?;

        Ok(list
            .iter()
            .filter_map(|entry| join(&entry["IP"], &entry["PORT"]))
            .collect())
    }
}

#[async_trait]
impl Fetcher for ProxyListDownload {
    fn name(&self) -> &str {
        "proxy-list.download"
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<RawProxySet, ProxyError> {
        let request = ctx
            .get(Self::URL)
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8");
        let body = ctx.fetch_text(request).await?;
        Self::parse(&body)
    }
}

/// hidester.com: JSON behind a cookie-guarded endpoint
pub struct Hidester;

impl Hidester {
    const URL: &'static str = "https://hidester.com/proxydata/php/data.php";
    const REFERER_URL: &'static str = "https://hidester.com/ru/public-proxy-ip-list/";
    const TIMEOUT: Duration = Duration::from_secs(10);
    const QUERY: &'static [(&'static str, &'static str)] = &[
        ("mykey", "data"),
        ("offset", "0"),
        ("limit", "50"),
        ("orderBy", "latest_check"),
        ("sortOrder", "DESC"),
        ("country", ""),
        ("port", ""),
        ("type", "15"),
        ("anonymity", "7"),
        ("ping", "7"),
        ("gproxy", "2"),
    ];

    /// Keep only HTTP and HTTPS entries
    pub fn parse(body: &str) -> Result<RawProxySet, ProxyError> {
        let entries: Vec<Value> = serde_json::from_str(body)?;
        Ok(entries
            .iter()
            .filter(|entry| matches!(entry["type"].as_str(), Some("http") | Some("https")))
            .filter_map(|entry| join(&entry["IP"], &entry["PORT"]))
            .collect())
    }
}

#[async_trait]
impl Fetcher for Hidester {
    fn name(&self) -> &str {
        "hidester.com"
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<RawProxySet, ProxyError> {
        let cookies = ctx.cookies(Self::REFERER_URL).await?;
        let request = ctx
            .get(Self::URL)
            .query(Self::QUERY)
            .header(ACCEPT, "application/json, text/plain, */*")
            .header(COOKIE, cookies)
            .header(REFERER, Self::REFERER_URL)
            .timeout(Self::TIMEOUT);
        let body = ctx.fetch_text(request).await?;
        Self::parse(&body)
    }
}

/// openproxy.space: an index of lists, each fetched separately
pub struct OpenProxySpace;

impl OpenProxySpace {
    const BASE_URL: &'static str = "https://api.openproxy.space/list";

    /// Codes of lists that carry both HTTP and HTTPS proxies
    pub fn parse_index(body: &str) -> Result<Vec<String>, ProxyError> {
        let entries: Vec<Value> = serde_json::from_str(body)?;
        Ok(entries
            .iter()
            .filter(|entry| entry["protocols"].as_array().map(Vec::len) == Some(2))
            .filter_map(|entry| scalar(&entry["code"]))
            .collect())
    }

    pub fn parse_list(body: &str) -> Result<RawProxySet, ProxyError> {
        let list: Value = serde_json::from_str(body)?;
        Ok(ProxyParser::extract(&list["data"].to_string()))
    }
}

#[async_trait]
impl Fetcher for OpenProxySpace {
    fn name(&self) -> &str {
        "openproxy.space"
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<RawProxySet, ProxyError> {
        let ts = Utc::now().timestamp_millis().to_string();
        let request = ctx
            .get(Self::BASE_URL)
            .query(&[("skip", "0"), ("ts", ts.as_str())]);
        let codes = Self::parse_index(&ctx.fetch_text(request).await?)?;

        let mut proxies = RawProxySet::new();
        for (index, code) in codes.iter().enumerate() {
            if index > 0 {
                ctx.crawl_delay().await;
            }

            let url = format!("{}/{}", Self::BASE_URL, code);
            let found = match ctx.fetch_text(ctx.get(&url)).await {
                Ok(body) => Self::parse_list(&body),
                Err(e) => Err(e),
            };
            match found {
                Ok(found) => {
                    debug!(%code, count = found.len(), "Parsed list");
                    proxies.extend(found);
                }
                Err(e) => debug!(%code, error = %e, "List failed"),
            }
        }

        Ok(proxies)
    }
}

/// checkerproxy.net daily archive
pub struct CheckerProxyArchive;

impl CheckerProxyArchive {
    /// Keep HTTP(S) entries (types 1 and 2) that answered in 210..6000 ms
    pub fn parse(body: &str) -> Result<RawProxySet, ProxyError> {
        #[derive(Deserialize)]
        struct Entry {
            addr: Option<String>,
            #[serde(rename = "type")]
            kind: Option<i64>,
            timeout: Option<i64>,
        }

        let entries: Vec<Entry> = serde_json::from_str(body)?;
        Ok(entries
            .into_iter()
            .filter(|entry| matches!(entry.kind, Some(1) | Some(2)))
            .filter(|entry| matches!(entry.timeout, Some(t) if 210 < t && t < 6000))
            .filter_map(|entry| entry.addr)
            .collect())
    }
}

#[async_trait]
impl Fetcher for CheckerProxyArchive {
    fn name(&self) -> &str {
        "checkerproxy.net"
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<RawProxySet, ProxyError> {
        let date = Local::now().format("%Y-%m-%d").to_string();
        let url = format!("https://checkerproxy.net/api/archive/{date}");
        let referer = format!("https://checkerproxy.net/archive/{date}");

        let cookies = ctx.cookies(&referer).await?;
        let request = ctx
            .get(&url)
            .header(ACCEPT, "*/*")
            .header(COOKIE, cookies)
            .header(REFERER, referer.as_str());
        let body = ctx.fetch_text(request).await?;
        Self::parse(&body)
    }
}
