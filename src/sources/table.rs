//! Sources that publish proxies as rows of an HTML table.

use super::Fetcher;
use crate::error::ProxyError;
use crate::proxy::crawler::FetchContext;
use crate::proxy::models::RawProxySet;
use crate::proxy::parser::ProxyParser;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Countries requested from hidemy.name, concatenated two-letter codes
const HIDEMY_COUNTRIES: &str = "AFALARAMAUATAZBHBDBYBEBZBJBOBABWBRBGBIKHCMCACLCNCOCDCRHRCYCZDKECEGGQFIFRGEDEGRGTHNHKHUINIDIRIQIEILITJPKZKEKRKGLVLSLYLTMKMGMWMYMVMLMTMXMDMNMEMZNPNLNZNGNOPKPSPAPYPEPHPLPTPRRORURWRSSCSGSKSISOZAESSDSESYTWTJTZTHTNTRUGUAAEGBUSUYUZVEVNVGZW";

/// hidemy.name serves 64 rows per page
const HIDEMY_PAGE_SIZE: usize = 64;
const HIDEMY_PAGES: usize = 15;

/// Where the address lives inside a table row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLayout {
    /// The first cell holds `ip:port`, possibly wrapped in other markup
    Combined,
    /// The first cell holds the ip, the second the port
    Split,
    /// `ip:port` may appear anywhere in the row's text
    Row,
}

/// One or more pages, each carrying a proxy table
#[derive(Debug, Clone)]
pub struct HtmlTableSource {
    pub name: &'static str,
    pub pages: Vec<String>,
    /// CSS selector matching the data rows
    pub row_selector: &'static str,
    pub layout: TableLayout,
}

impl HtmlTableSource {
    pub fn new(
        name: &'static str,
        pages: Vec<String>,
        row_selector: &'static str,
        layout: TableLayout,
    ) -> Self {
        Self {
            name,
            pages,
            row_selector,
            layout,
        }
    }

    /// Extract raw proxies from one page
    pub fn parse_page(&self, html: &str) -> Result<RawProxySet, ProxyError> {
        let rows = Selector::parse(self.row_selector)
            .map_err(|e| ProxyError::MalformedResponse(format!("bad selector: {e}")))?;
        let cell = Selector::parse("td").map_err(|e| ProxyError::MalformedResponse(e.to_string()))?;

        let document = Html::parse_document(html);
        let mut proxies = RawProxySet::new();

        for row in document.select(&rows) {
            let cells: Vec<ElementRef<'_>> = row.select(&cell).collect();
            match self.layout {
                TableLayout::Combined => {
                    if let Some(first) = cells.first() {
                        proxies.extend(ProxyParser::extract(&cell_text(first)));
                    }
                }
                TableLayout::Split => {
                    if let [ip, port, ..] = cells.as_slice() {
                        let (ip, port) = (cell_text(ip), cell_text(port));
                        if !ip.is_empty() && !port.is_empty() {
                            proxies.insert(format!("{ip}:{port}"));
                        }
                    }
                }
                TableLayout::Row => {
                    let text = row.text().collect::<Vec<_>>().join(" ");
                    proxies.extend(ProxyParser::extract(&text));
                }
            }
        }

        Ok(proxies)
    }
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

#[async_trait]
impl Fetcher for HtmlTableSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<RawProxySet, ProxyError> {
        let mut proxies = RawProxySet::new();
        let mut last_error = None;

        for (index, page) in self.pages.iter().enumerate() {
            if index > 0 {
                ctx.crawl_delay().await;
            }

            let parsed = match ctx.fetch_text(ctx.get(page)).await {
                Ok(html) => self.parse_page(&html),
                Err(e) => Err(e),
            };
            match parsed {
                Ok(found) => {
                    debug!(source = self.name, %page, count = found.len(), "Parsed page");
                    proxies.extend(found);
                }
                Err(e) => {
                    debug!(source = self.name, %page, error = %e, "Page failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if proxies.is_empty() => Err(e),
            _ => Ok(proxies),
        }
    }
}

/// Page URLs for the hidemy.name list, offset by 64 rows each
fn hidemy_pages() -> Vec<String> {
    (0..HIDEMY_PAGES)
        .map(|page| {
            format!(
                "http://hidemy.name/en/proxy-list/?country={}&maxtime=3000&type=hs&out=plain&lang=en&utf=&start={}",
                HIDEMY_COUNTRIES,
                page * HIDEMY_PAGE_SIZE
            )
        })
        .collect()
}

/// HTML table sources
pub fn sources() -> Vec<HtmlTableSource> {
    let aliveproxy = [
        "fastest-proxies",
        "high-anonymity-proxy-list",
        "anonymous-proxy-list",
        "transparent-proxy-list",
        "us-proxy-list",
        "gb-proxy-list",
        "de-proxy-list",
        "jp-proxy-list",
        "ca-proxy-list",
    ]
    .iter()
    .map(|section| format!("http://aliveproxy.com/{section}"))
    .collect();

    vec![
        HtmlTableSource::new(
            "aliveproxy.com",
            aliveproxy,
            "table.cm.or tr",
            TableLayout::Combined,
        ),
        HtmlTableSource::new(
            "community.aliveproxy.com",
            vec!["http://community.aliveproxy.com/proxy_list_http_fastest".to_string()],
            "table tr",
            TableLayout::Row,
        ),
        HtmlTableSource::new("hidemy.name", hidemy_pages(), "table tr", TableLayout::Split),
        HtmlTableSource::new(
            "free-proxy-list.net",
            vec!["https://free-proxy-list.net/".to_string()],
            "table tbody tr",
            TableLayout::Split,
        ),
        HtmlTableSource::new(
            "sslproxies.org",
            vec!["https://www.sslproxies.org/".to_string()],
            "table tbody tr",
            TableLayout::Split,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALIVEPROXY_PAGE: &str = r#"
<html><body>
<table class="cm or">
  <tr><th>Proxy</th><th>Type</th></tr>
  <tr><td>45.77.1.2:8080<script>document.write('')</script></td><td>HTTP</td></tr>
  <tr><td><b>103.10.20.30:3128</b></td><td>HTTP</td></tr>
  <tr><td>not a proxy</td><td>HTTP</td></tr>
</table>
<table class="other"><tr><td>9.9.9.9:9999</td></tr></table>
</body></html>
"#;

    const SPLIT_PAGE: &str = r#"
<table class="table table-striped">
  <thead><tr><th>IP Address</th><th>Port</th><th>Code</th></tr></thead>
  <tbody>
    <tr><td>181.10.1.1</td><td>999</td><td>AR</td></tr>
    <tr><td> 37.1.2.3 </td><td> 8080 </td><td>RU</td></tr>
    <tr><td>12.0.0.1</td></tr>
  </tbody>
</table>
"#;

    #[test]
    fn test_parse_combined_cells() {
        let source = HtmlTableSource::new("t", vec![], "table.cm.or tr", TableLayout::Combined);
        let proxies = source.parse_page(ALIVEPROXY_PAGE).unwrap();
        assert_eq!(proxies.len(), 2);
        assert!(proxies.contains("45.77.1.2:8080"));
        assert!(proxies.contains("103.10.20.30:3128"));
    }

    #[test]
    fn test_parse_split_cells() {
        let source = HtmlTableSource::new("t", vec![], "table tbody tr", TableLayout::Split);
        let proxies = source.parse_page(SPLIT_PAGE).unwrap();
        assert_eq!(proxies.len(), 2);
        assert!(proxies.contains("181.10.1.1:999"));
        assert!(proxies.contains("37.1.2.3:8080"));
    }

    #[test]
    fn test_parse_whole_row() {
        let page = r#"
<table>
  <tr><td>HTTP</td><td>212.5.6.7:8081</td></tr>
  <tr><td><a href="/p">88.9.10.11:80</a> up</td><td>fast</td></tr>
  <tr><td>none here</td></tr>
</table>
"#;
        let source = HtmlTableSource::new("t", vec![], "table tr", TableLayout::Row);
        let proxies = source.parse_page(page).unwrap();
        assert_eq!(proxies.len(), 2);
        assert!(proxies.contains("212.5.6.7:8081"));
        assert!(proxies.contains("88.9.10.11:80"));

        let registered = sources();
        let community = registered
            .iter()
            .find(|s| s.name == "community.aliveproxy.com")
            .unwrap();
        assert_eq!(community.layout, TableLayout::Row);
    }

    #[test]
    fn test_page_without_table_is_empty() {
        let source = HtmlTableSource::new("t", vec![], "table tr", TableLayout::Split);
        assert!(source.parse_page("<html><body>maintenance</body></html>").unwrap().is_empty());
    }

    #[test]
    fn test_bad_selector_is_malformed() {
        let source = HtmlTableSource::new("t", vec![], "table[", TableLayout::Split);
        assert!(matches!(
            source.parse_page("<table></table>"),
            Err(ProxyError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_hidemy_pagination() {
        let pages = hidemy_pages();
        assert_eq!(pages.len(), HIDEMY_PAGES);
        assert!(pages[0].ends_with("start=0"));
        assert!(pages[1].ends_with("start=64"));
        assert!(pages[14].ends_with("start=896"));
    }
}
