use anyhow::Result;
use clap::Parser;
use proxy_machine::{
    proxy::{
        crawler::{default_concurrency, DEFAULT_USER_AGENT},
        CheckMode, CheckerConfig, CrawlerConfig, Pipeline,
    },
    Config,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

/// Harvest public HTTP proxies, optionally check them, and save the result
#[derive(Parser, Debug)]
#[command(name = "proxy-machine")]
#[command(version, about = "Harvest public HTTP proxies, optionally check them, and save the result")]
struct Cli {
    /// Name of the output file (".txt" is appended when missing)
    #[arg(short, long, default_value = "proxies")]
    file_name: String,

    /// Number of sources harvested at once (defaults to available parallelism)
    #[arg(short, long, env = "PROXY_MACHINE_WORKERS")]
    workers: Option<usize>,

    /// Keep only proxies that pass a live probe
    #[arg(short = 'c', long)]
    proxy_checker: bool,

    /// Probe scheduling: cooperative or pooled
    #[arg(short = 'm', long, default_value = "cooperative")]
    check_mode: CheckMode,

    /// Maximum number of probes in flight
    #[arg(short = 'n', long, default_value = "100")]
    concurrency: usize,

    /// Probe timeout in seconds
    #[arg(long, default_value = "6")]
    timeout: u64,

    /// Echo service the probe is routed to
    #[arg(long, default_value = "http://api.myip.com/")]
    test_url: String,

    /// User agent sent to sources and through proxies
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Existing proxy list to check instead of harvesting
    #[arg(short, long)]
    infile: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Config {
        let workers = self.workers.unwrap_or_else(default_concurrency).max(1);

        Config {
            output: output_path(&self.file_name),
            infile: self.infile,
            check: self.proxy_checker,
            crawler: CrawlerConfig::new()
                .with_concurrency(workers)
                .with_user_agent(self.user_agent.clone()),
            checker: CheckerConfig::new()
                .with_user_agent(self.user_agent)
                .with_concurrency(self.concurrency.max(1))
                .with_timeout(Duration::from_secs(self.timeout))
                .with_test_url(self.test_url)
                .with_mode(self.check_mode),
        }
    }
}

fn output_path(file_name: &str) -> PathBuf {
    if file_name.ends_with(".txt") {
        PathBuf::from(file_name)
    } else {
        PathBuf::from(format!("{file_name}.txt"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt().with_env_filter(filter).with_target(true).init();

    let cli = Cli::parse();
    let config = cli.into_config();
    info!(
        output = %config.output.display(),
        workers = config.crawler.concurrency,
        check = config.check,
        "proxy-machine starting"
    );

    if let Err(e) = Pipeline::new(config).run().await {
        error!(error = %e, "Run failed");
        return Err(e);
    }

    Ok(())
}
