use mock_service::{run, tps_measure_task, ServiceConfig};
use std::net::SocketAddr;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mock_service=info,tower_http=warn")),
        )
        .init();

    tokio::task::spawn(async { tps_measure_task().await });

    let addr: SocketAddr = ([0, 0, 0, 0], 8080).into();
    run(addr, ServiceConfig::default()).await
}
