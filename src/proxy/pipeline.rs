//! Pipeline driver: harvest, normalize, optionally check, then write

use crate::proxy::checker::ProxyChecker;
use crate::proxy::crawler::ProxyCrawler;
use crate::proxy::models::EndpointSet;
use crate::proxy::parser::ProxyParser;
use crate::sources::Fetcher;
use crate::{Config, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// One run of the proxy pipeline
///
/// Stages run strictly in sequence; each finishes before the next starts.
pub struct Pipeline {
    config: Config,
    fetchers: Vec<Arc<dyn Fetcher>>,
}

impl Pipeline {
    /// Pipeline over the default source registry
    pub fn new(config: Config) -> Self {
        Self::with_fetchers(config, crate::sources::default_fetchers())
    }

    pub fn with_fetchers(config: Config, fetchers: Vec<Arc<dyn Fetcher>>) -> Self {
        Self { config, fetchers }
    }

    /// Run every stage and return what was written
    pub async fn run(self) -> Result<EndpointSet> {
        let start = Instant::now();
        ProxyParser::ensure_writable(&self.config.output)?;

        let mut endpoints = match &self.config.infile {
            Some(path) => {
                let endpoints = ProxyParser::parse_file(path)?;
                info!(path = %path.display(), count = endpoints.len(), "Loaded proxies");
                endpoints
            }
            None => {
                let crawler = ProxyCrawler::with_fetchers(self.config.crawler.clone(), self.fetchers)?;
                let raw = crawler.harvest().await;
                let endpoints = ProxyParser::normalize(&raw);
                info!(raw = raw.len(), normalized = endpoints.len(), "Normalized proxies");
                endpoints
            }
        };

        if self.config.check {
            info!("Launching the proxy checker");
            let checker = ProxyChecker::with_config(self.config.checker.clone());
            endpoints = checker.check(&endpoints).await;
        }

        ProxyParser::save_to_file(&endpoints, &self.config.output)?;
        info!(
            count = endpoints.len(),
            path = %self.config.output.display(),
            elapsed = ?start.elapsed(),
            "Proxies recorded"
        );

        Ok(endpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProxyError;
    use crate::proxy::checker::CheckerConfig;
    use crate::proxy::crawler::{CrawlerConfig, FetchContext};
    use crate::proxy::models::RawProxySet;
    use async_trait::async_trait;
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;

    struct ListFetcher(&'static str, &'static [&'static str]);

    #[async_trait]
    impl Fetcher for ListFetcher {
        fn name(&self) -> &str {
            self.0
        }

        async fn fetch(&self, _ctx: &FetchContext) -> std::result::Result<RawProxySet, ProxyError> {
            Ok(self.1.iter().map(|p| p.to_string()).collect())
        }
    }

    struct BrokenFetcher;

    #[async_trait]
    impl Fetcher for BrokenFetcher {
        fn name(&self) -> &str {
            "broken"
        }

        async fn fetch(&self, _ctx: &FetchContext) -> std::result::Result<RawProxySet, ProxyError> {
            Err(ProxyError::MalformedResponse("unexpected markup".to_string()))
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("proxy-machine-pipeline-{}-{}", std::process::id(), name))
    }

    fn config(output: PathBuf) -> Config {
        Config {
            output,
            crawler: CrawlerConfig::new().with_concurrency(2),
            checker: CheckerConfig::new().with_timeout(Duration::from_millis(300)),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_end_to_end_without_checker() {
        let output = temp_path("e2e.txt");
        let fetchers: Vec<Arc<dyn Fetcher>> = vec![
            Arc::new(ListFetcher("first", &["1.1.1.1:80"])),
            Arc::new(ListFetcher("second", &["1.1.1.1:80", "2.2.2.2:999999"])),
            Arc::new(BrokenFetcher),
        ];

        let written = Pipeline::with_fetchers(config(output.clone()), fetchers)
            .run()
            .await
            .unwrap();
        let artifact = fs::read_to_string(&output).unwrap();
        fs::remove_file(&output).unwrap();

        assert_eq!(written.len(), 1);
        assert_eq!(artifact, "http://1.1.1.1:80\n");
        assert_eq!(artifact.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_artifact_is_replaced() {
        let output = temp_path("replace.txt");
        fs::write(&output, "http://9.9.9.9:9999\n").unwrap();

        let fetchers: Vec<Arc<dyn Fetcher>> = vec![Arc::new(ListFetcher("only", &["3.3.3.3:3128"]))];
        Pipeline::with_fetchers(config(output.clone()), fetchers)
            .run()
            .await
            .unwrap();
        let artifact = fs::read_to_string(&output).unwrap();
        fs::remove_file(&output).unwrap();

        assert_eq!(artifact, "http://3.3.3.3:3128\n");
    }

    #[tokio::test]
    async fn test_recheck_mode_reads_artifact() {
        let input = temp_path("recheck-in.txt");
        let output = temp_path("recheck-out.txt");
        fs::write(&input, "http://1.1.1.1:80\nhttp://2.2.2.2:8080\n\nbogus\n").unwrap();

        let mut config = config(output.clone());
        config.infile = Some(input.clone());
        // Harvesting is skipped, so this fetcher must never contribute
        let fetchers: Vec<Arc<dyn Fetcher>> = vec![Arc::new(ListFetcher("unused", &["7.7.7.7:77"]))];

        let written = Pipeline::with_fetchers(config, fetchers).run().await.unwrap();
        let artifact = fs::read_to_string(&output).unwrap();
        fs::remove_file(&input).unwrap();
        fs::remove_file(&output).unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(artifact, "http://1.1.1.1:80\nhttp://2.2.2.2:8080\n");
    }

    #[tokio::test]
    async fn test_checker_drops_dead_proxies() {
        let output = temp_path("checked.txt");
        let mut config = config(output.clone());
        config.check = true;

        // Nothing listens on 127.0.0.1:1, so every probe fails
        let fetchers: Vec<Arc<dyn Fetcher>> = vec![Arc::new(ListFetcher("local", &["127.0.0.1:1"]))];
        let written = Pipeline::with_fetchers(config, fetchers).run().await.unwrap();
        let artifact = fs::read_to_string(&output).unwrap();
        fs::remove_file(&output).unwrap();

        assert!(written.is_empty());
        assert!(artifact.is_empty());
    }

    #[tokio::test]
    async fn test_unwritable_output_is_fatal() {
        let output = temp_path("missing-dir").join("proxies.txt");
        let fetchers: Vec<Arc<dyn Fetcher>> = vec![Arc::new(ListFetcher("a", &["1.1.1.1:80"]))];
        assert!(Pipeline::with_fetchers(config(output), fetchers).run().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_infile_is_fatal() {
        let output = temp_path("infile-out.txt");
        let mut config = config(output.clone());
        config.infile = Some(temp_path("does-not-exist.txt"));

        let result = Pipeline::with_fetchers(config, Vec::new()).run().await;
        let _ = fs::remove_file(&output);
        assert!(result.is_err());
    }
}
