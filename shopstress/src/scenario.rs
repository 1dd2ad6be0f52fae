//! Scenario logic and configuration
use crate::data::RunData;
use crate::sampler::{Timer, VuPool};
use shopstress_core::{RunStatistics, ScenarioConfig, Threshold, BASE_INTERVAL};
use std::{
    future::Future,
    num::NonZeroU32,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Load test scenario structure
///
/// Handler for running scenarios. Not intended for manual creation, use the
/// [`#[scenario]`](shopstress_macros::scenario) macro which will add these methods to functions.
#[pin_project::pin_project]
pub struct Scenario<T> {
    func: T,
    runner_fut: Option<Pin<Box<dyn Future<Output = RunStatistics> + Send>>>,
    config: ScenarioConfig,
}

impl<T> Scenario<T> {
    #[doc(hidden)]
    pub fn new(name: &str, func: T) -> Self {
        Self {
            func,
            runner_fut: None,
            config: ScenarioConfig::new(name),
        }
    }
}

impl<T, F> Future for Scenario<T>
where
    T: Fn() -> F + Send + 'static + Clone + Sync,
    F: Future<Output = ()> + Send + 'static,
{
    type Output = RunStatistics;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.runner_fut.is_none() {
            let func = self.func.clone();
            let config = self.config.clone();
            self.runner_fut = Some(Box::pin(async move { run_scenario(func, config).await }));
        }

        if let Some(runner) = &mut self.runner_fut {
            runner.as_mut().poll(cx)
        } else {
            unreachable!()
        }
    }
}

pub trait ConfigurableScenario<T: Send>: Future<Output = T> + Sized + Send {
    fn vus(self, vus: usize) -> Self;
    fn duration(self, duration: Duration) -> Self;
    fn graceful_stop(self, graceful_stop: Duration) -> Self;
    fn tps(self, tps: NonZeroU32) -> Self;
    fn threshold(self, threshold: Threshold) -> Self;
    fn thresholds(self, thresholds: Vec<Threshold>) -> Self;
}

impl<T, F> ConfigurableScenario<RunStatistics> for Scenario<T>
where
    T: Fn() -> F + Send + 'static + Clone + Sync,
    F: Future<Output = ()> + Send + 'static,
{
    /// Run the scenario with the given number of concurrent virtual users (default 30).
    ///
    /// # Example
    /// ```no_run
    /// use shopstress::prelude::*;
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     my_scenario()
    ///         .vus(50)
    ///         .duration(Duration::from_secs(120))
    ///         .await;
    /// }
    ///
    /// #[scenario]
    /// async fn my_scenario() {
    /// }
    /// ```
    fn vus(mut self, vus: usize) -> Self {
        self.config.vus = vus;
        self
    }

    /// Run the scenario for the given wall-clock duration (default 1 minute).
    fn duration(mut self, duration: Duration) -> Self {
        self.config.duration = duration;
        self
    }

    /// How long iterations still running at the end of the duration may take before they are
    /// aborted (default 30 seconds).
    fn graceful_stop(mut self, graceful_stop: Duration) -> Self {
        self.config.graceful_stop = graceful_stop;
        self
    }

    /// Cap the rate of transactions across all virtual users.
    ///
    /// # Example
    /// ```no_run
    /// use shopstress::prelude::*;
    /// use std::num::NonZeroU32;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     my_scenario()
    ///         .tps(NonZeroU32::new(500).unwrap())
    ///         .await;
    /// }
    ///
    /// #[scenario]
    /// async fn my_scenario() {
    /// }
    /// ```
    fn tps(mut self, tps: NonZeroU32) -> Self {
        self.config.max_tps = Some(tps);
        self
    }

    /// Add a threshold on top of those already configured (by default `http_req_failed<0.001`).
    fn threshold(mut self, threshold: Threshold) -> Self {
        self.config.thresholds.push(threshold);
        self
    }

    /// Replace every configured threshold.
    ///
    /// # Example
    /// ```no_run
    /// use shopstress::prelude::*;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let stats = my_scenario()
    ///         .thresholds(vec!["checks>0.99".parse().unwrap()])
    ///         .await;
    ///     assert!(stats.passed());
    /// }
    ///
    /// #[scenario]
    /// async fn my_scenario() {
    /// }
    /// ```
    fn thresholds(mut self, thresholds: Vec<Threshold>) -> Self {
        self.config.thresholds = thresholds;
        self
    }
}

#[instrument(name="scenario", skip_all, fields(name=config.name))]
pub(crate) async fn run_scenario<T, F>(scenario: T, config: ScenarioConfig) -> RunStatistics
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = ()> + Send + 'static,
{
    info!("Running {} with config {:?}", config.name, &config);

    let start = Instant::now();
    let deadline = start + config.duration;

    let mut pool = VuPool::new(scenario, config.max_tps);
    pool.spawn(config.effective_vus());

    let mut timer = Timer::new(BASE_INTERVAL).await;
    debug!("Sampling every {timer}");

    // NOTE: This loop is time-sensitive. Any long awaits or blocking will throw off measurements
    let mut data = RunData::new();
    while Instant::now() < deadline {
        let elapsed = timer.tick_until(deadline).await;
        let measurement = pool.collect(elapsed);
        info!(
            "[{}/{}] {} VUs, {measurement}",
            humantime::format_duration(Duration::from_secs(start.elapsed().as_secs())),
            humantime::format_duration(config.duration),
            pool.concurrency(),
        );
        data.push(&measurement);
    }

    // Counters gathered between the last tick and the stop signal.
    data.push(&pool.collect(timer.lap()));

    let (interrupted, measurement, stop_elapsed) = pool.shutdown(config.graceful_stop).await;
    debug!("Graceful stop took {stop_elapsed:?}: {measurement}");
    data.push(&measurement);

    let stats = data.into_statistics(&config, start.elapsed(), interrupted);

    for outcome in stats.thresholds.iter().filter(|t| !t.passed) {
        warn!("Threshold crossed: {}", outcome.threshold);
    }
    info!("Scenario complete");

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[transaction("flaky")]
    async fn flaky(counter: Arc<AtomicU64>) -> Result<(), ()> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        // Every tenth call fails
        if counter.fetch_add(1, Ordering::Relaxed) % 10 == 9 {
            Err(())
        } else {
            Ok(())
        }
    }

    #[scenario]
    async fn flaky_scenario(counter: Arc<AtomicU64>) {
        let _ = flaky(counter).await;
    }

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn runs_for_duration() {
        let stats = flaky_scenario(Arc::new(AtomicU64::new(0)))
            .vus(2)
            .duration(Duration::from_secs(5))
            .thresholds(vec![
                "http_req_failed<0.2".parse().unwrap(),
                "checks>0.95".parse().unwrap(),
            ])
            .await;

        assert_eq!(stats.name, "flaky_scenario");
        assert_eq!(stats.vus, 2);
        // 2 VUs at 10ms per iteration for 5s, plus the one in flight on each when stopping.
        assert!(stats.requests >= 1000 && stats.requests <= 1004, "{}", stats.requests);
        assert_eq!(stats.iterations, stats.requests);
        assert_eq!(stats.interrupted_iterations, 0);
        assert_eq!(stats.failed_requests, stats.requests / 10);
        assert!(stats.elapsed >= Duration::from_secs(5));

        let check = stats.check("flaky").unwrap();
        assert_eq!(check.total(), stats.requests);

        assert_eq!(stats.thresholds.len(), 2);
        assert!(stats.thresholds[0].passed);
        assert!(!stats.thresholds[1].passed);
        assert!(!stats.passed());
        assert!(logs_contain("Threshold crossed: checks>0.95"));
    }

    #[scenario]
    async fn stuck_scenario() {
        let _: Result<(), ()> = stuck().await;
    }

    #[transaction]
    async fn stuck() -> Result<(), ()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn interrupts_stuck_iterations() {
        let stats = stuck_scenario()
            .vus(3)
            .duration(Duration::from_secs(1))
            .graceful_stop(Duration::from_secs(2))
            .await;

        assert_eq!(stats.requests, 0);
        assert_eq!(stats.iterations, 0);
        assert_eq!(stats.interrupted_iterations, 3);
        assert!(stats.check("stuck").is_none());
        assert!(stats.elapsed >= Duration::from_secs(3));
        // Nothing failed, so the default threshold holds.
        assert!(stats.passed());
    }
}
