mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;
    use mock_service::ServiceConfig;
    use shopstress::prelude::*;
    use shopstress::shop::*;
    use std::num::NonZeroU32;
    use std::time::Duration;

    const REQUESTS_PER_ITERATION: u64 = 2 + TRANSFERS_PER_ITERATION as u64 + 1 + ITEMS.len() as u64;

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(30_000)]
    async fn healthy_service_passes() {
        let ctx = shop_context(ServiceConfig::default()).await.unwrap();

        let stats = shop_scenario(ctx)
            .vus(5)
            .duration(Duration::from_secs(2))
            .await;
        println!("{stats}");

        assert!(stats.iterations > 0);
        assert_eq!(stats.interrupted_iterations, 0);
        assert_eq!(stats.requests, stats.iterations * REQUESTS_PER_ITERATION);
        assert_eq!(stats.failed_requests, 0);

        for name in ["auth", "send_coin", "info", "buy"] {
            let check = stats.check(name).unwrap();
            assert_eq!(check.fails, 0, "{name}");
        }
        assert_eq!(stats.check("auth").unwrap().passes, stats.iterations * 2);
        assert_eq!(stats.check("buy").unwrap().passes, stats.iterations * 4);

        assert_eq!(stats.thresholds.len(), 1);
        assert!(stats.passed());
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(30_000)]
    async fn overloaded_service_crosses_threshold() {
        let ctx = shop_context(ServiceConfig {
            max_tps: NonZeroU32::new(20),
            ..Default::default()
        })
        .await
        .unwrap();

        let stats = shop_scenario(ctx)
            .vus(5)
            .duration(Duration::from_secs(2))
            .threshold("checks>0.99".parse().unwrap())
            .await;
        println!("{stats}");

        assert!(stats.failed_requests > 0);
        assert!(stats.error_rate() > 0.001);
        assert_eq!(stats.thresholds.len(), 2);
        assert!(stats.thresholds.iter().all(|t| !t.passed));
        assert!(!stats.passed());
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(30_000)]
    async fn tps_cap_limits_requests() {
        let ctx = shop_context(ServiceConfig::default()).await.unwrap();

        let stats = shop_scenario(ctx)
            .vus(5)
            .duration(Duration::from_secs(2))
            .tps(NonZeroU32::new(50).unwrap())
            .await;

        assert_eq!(stats.failed_requests, 0);
        assert!(stats.requests <= 160, "{}", stats.requests);
        assert!(stats.passed());
    }

    #[cfg(feature = "integration")]
    #[tokio::test(flavor = "multi_thread")]
    async fn full_run() {
        let ctx = shop_context(ServiceConfig {
            delay: Duration::from_millis(5),
            jitter: Duration::from_millis(2),
            max_tps: None,
        })
        .await
        .unwrap();

        let stats = shop_scenario(ctx).await;
        println!("{stats}");

        assert_eq!(stats.vus, 30);
        assert!(stats.elapsed >= Duration::from_secs(60));
        assert!(stats.passed());
    }
}
