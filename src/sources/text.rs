//! Sources whose body is scanned for IPv4:PORT patterns.

use super::Fetcher;
use crate::error::ProxyError;
use crate::proxy::crawler::FetchContext;
use crate::proxy::models::RawProxySet;
use crate::proxy::parser::ProxyParser;
use async_trait::async_trait;
use tracing::debug;

/// A page or plain-text list scanned with the IPv4:PORT regex
#[derive(Debug, Clone)]
pub struct TextListSource {
    pub name: &'static str,
    pub url: &'static str,
    pub query: &'static [(&'static str, &'static str)],
    /// Number of identical requests to issue; some APIs return random samples
    pub repeat: u32,
}

impl TextListSource {
    pub const fn new(name: &'static str, url: &'static str) -> Self {
        Self {
            name,
            url,
            query: &[],
            repeat: 1,
        }
    }

    pub fn with_query(mut self, query: &'static [(&'static str, &'static str)]) -> Self {
        self.query = query;
        self
    }

    pub fn with_repeat(mut self, repeat: u32) -> Self {
        self.repeat = repeat;
        self
    }
}

#[async_trait]
impl Fetcher for TextListSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<RawProxySet, ProxyError> {
        let mut proxies = RawProxySet::new();
        let mut last_error = None;

        for attempt in 0..self.repeat.max(1) {
            let request = ctx.get(self.url).query(self.query);
            match ctx.fetch_text(request).await {
                Ok(body) => proxies.extend(ProxyParser::extract(&body)),
                Err(e) => {
                    debug!(source = self.name, attempt, error = %e, "Request failed");
                    last_error = Some(e);
                }
            }
        }

        // Partial success across repeats still counts as success
        match last_error {
            Some(e) if proxies.is_empty() => Err(e),
            _ => Ok(proxies),
        }
    }
}

/// Plain-text and loosely structured sources
pub fn sources() -> Vec<TextListSource> {
    vec![
        TextListSource::new("proxy50-50.blogspot.com", "https://proxy50-50.blogspot.com/"),
        TextListSource::new(
            "proxysearcher.sourceforge.net",
            "http://proxysearcher.sourceforge.net/Proxy%20List.php?type=http",
        ),
        TextListSource::new("awmproxy.net", "http://awmproxy.net"),
        TextListSource::new("httptunnel.ge", "http://www.httptunnel.ge/ProxyListForFree.aspx"),
        TextListSource::new("spys.me", "https://spys.me/proxy.txt"),
        TextListSource::new("fatezero.org", "http://static.fatezero.org/tmp/proxy.txt"),
        TextListSource::new("pubproxy.com", "http://pubproxy.com/api/proxy").with_query(&[
            ("limit", "200"),
            ("format", "txt"),
            ("type", "http"),
        ]),
        TextListSource::new("proxylists.net", "http://www.proxylists.net/http_highanon.txt"),
        TextListSource::new("ab57.ru", "http://ab57.ru/downloads/proxylist.txt"),
        TextListSource::new(
            "github.com/ShiftyTR/https",
            "https://raw.githubusercontent.com/ShiftyTR/Proxy-List/master/https.txt",
        ),
        TextListSource::new(
            "github.com/ShiftyTR/http",
            "https://raw.githubusercontent.com/ShiftyTR/Proxy-List/master/http.txt",
        ),
        TextListSource::new(
            "github.com/sunny9577",
            "https://raw.githubusercontent.com/sunny9577/proxy-scraper/master/proxies.txt",
        ),
        TextListSource::new("multiproxy.org", "http://multiproxy.org/txt_all/proxy.txt"),
        TextListSource::new("rootjazz.com", "http://rootjazz.com/proxies/proxies.txt"),
        TextListSource::new("proxyscan.io", "http://www.proxyscan.io/api/proxy")
            .with_query(&[
                ("ping", "500"),
                ("limit", "100"),
                ("type", "http,https"),
                ("format", "txt"),
            ])
            .with_repeat(8),
        TextListSource::new("api.proxyscrape.com", "https://api.proxyscrape.com/").with_query(&[
            ("request", "getproxies"),
            ("proxytype", "https"),
            ("timeout", "10000"),
            ("country", "all"),
            ("ssl", "all"),
            ("anonymity", "all"),
        ]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_source_builder() {
        let source = TextListSource::new("test", "https://example.com/proxies.txt")
            .with_query(&[("type", "http")])
            .with_repeat(3);
        assert_eq!(source.name, "test");
        assert_eq!(source.query.len(), 1);
        assert_eq!(source.repeat, 3);
    }

    #[test]
    fn test_sources_are_http_urls() {
        for source in sources() {
            assert!(!source.name.is_empty());
            assert!(source.url.starts_with("http"), "{}", source.url);
            assert!(source.repeat >= 1);
        }
    }

    #[tokio::test]
    async fn test_unreachable_source_fails() {
        let ctx = FetchContext::new(
            crate::proxy::crawler::CrawlerConfig::new()
                .with_timeout(std::time::Duration::from_millis(500)),
        )
        .unwrap();
        let source = TextListSource::new("closed", "http://127.0.0.1:1/");
        assert!(matches!(
            source.fetch(&ctx).await,
            Err(ProxyError::SourceUnavailable(_))
        ));
    }
}
