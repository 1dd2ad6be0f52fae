use anyhow::Context;
use clap::Parser;
use shopstress::prelude::*;
use shopstress::shop::{shop_scenario, ShopClient, ShopContext, DEFAULT_BASE_URL, DEFAULT_PASSWORD};
#[cfg(feature = "metrics")]
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Exit code when the run finished but at least one threshold was crossed.
const THRESHOLDS_CROSSED: i32 = 99;

#[derive(Parser, Debug)]
#[command(version, about = "Load test the coin-shop API")]
struct Cli {
    /// Base URL of the service under test
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Password used for every generated user
    #[arg(long, default_value = DEFAULT_PASSWORD)]
    password: String,

    /// Number of concurrent virtual users
    #[arg(long, default_value_t = shopstress::core::DEFAULT_VUS)]
    vus: usize,

    /// How long to start new iterations for (e.g. `1m`, `90s`)
    #[arg(long, default_value = "1m", value_parser = humantime::parse_duration)]
    duration: Duration,

    /// How long in-flight iterations may run after the duration before they are aborted
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
    graceful_stop: Duration,

    /// Cap on transactions per second across all virtual users
    #[arg(long)]
    max_tps: Option<NonZeroU32>,

    /// Per-request timeout
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Pass/fail criterion, e.g. `http_req_failed<0.001` or `p(95)<200ms`. Repeatable; replaces
    /// the default.
    #[arg(long = "threshold")]
    thresholds: Vec<Threshold>,

    /// Address for the Prometheus exporter
    #[cfg(feature = "metrics")]
    #[arg(long)]
    metrics_listener: Option<SocketAddr>,

    /// Log filter used when `RUST_LOG` is not set
    #[arg(long, default_value = "shopstress=info")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cli.log_filter)
            .with_context(|| format!("Invalid log filter {}", cli.log_filter))?,
    };
    FmtSubscriber::builder().with_env_filter(filter).init();

    #[cfg(feature = "metrics")]
    if let Some(addr) = cli.metrics_listener {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .with_context(|| format!("Failed to start the Prometheus exporter on {addr}"))?;
        info!("Prometheus exporter listening on {addr}");
    }

    let client = ShopClient::with_timeout(&cli.base_url, cli.timeout)
        .with_context(|| format!("Invalid base URL {}", cli.base_url))?;
    let ctx = Arc::new(ShopContext::new(client, cli.password));
    info!("Targeting {}", ctx.client().base_url());

    let mut scenario = shop_scenario(ctx)
        .vus(cli.vus)
        .duration(cli.duration)
        .graceful_stop(cli.graceful_stop);
    if let Some(tps) = cli.max_tps {
        scenario = scenario.tps(tps);
    }
    if !cli.thresholds.is_empty() {
        scenario = scenario.thresholds(cli.thresholds);
    }

    let stats = scenario.await;
    println!("{stats}");

    if !stats.passed() {
        std::process::exit(THRESHOLDS_CROSSED);
    }
    Ok(())
}
