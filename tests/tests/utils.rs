use anyhow::Context;
use axum::Router;
use mock_service::ServiceConfig;
use shopstress::shop::{ShopClient, ShopContext, DEFAULT_PASSWORD};
use std::sync::{Arc, OnceLock};
use tracing::error;
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter("shopstress=info,mock_service=info,axum::rejection=trace")
            .try_init();
    });
}

/// Start a fresh mock service and return a client pointed at it.
#[allow(unused)]
pub async fn shop(config: ServiceConfig) -> anyhow::Result<ShopClient> {
    init();
    let addr = mock_service::spawn(config)
        .await
        .context("Failed to start the mock service")?;
    Ok(ShopClient::new(&format!("http://{addr}"))?)
}

#[allow(unused)]
pub async fn shop_context(config: ServiceConfig) -> anyhow::Result<Arc<ShopContext>> {
    Ok(Arc::new(ShopContext::new(shop(config).await?, DEFAULT_PASSWORD)))
}

/// Serve an arbitrary router on an ephemeral port and return a client pointed at it.
#[allow(unused)]
pub async fn serve(router: Router) -> anyhow::Result<ShopClient> {
    init();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            error!("Test server stopped: {err}");
        }
    });
    Ok(ShopClient::new(&format!("http://{addr}"))?)
}
