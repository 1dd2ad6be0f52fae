mod task_atomics;
mod timer;

use crate::measurement::Measurement;
use crate::transaction::TRANSACTION_HOOK;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use task_atomics::TaskAtomics;
use tokio::task::JoinHandle;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

pub(crate) use timer::Timer;

/// Pool of virtual users, each running the scenario function in a loop.
pub(crate) struct VuPool<T> {
    scenario: T,
    tasks: Vec<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    task_atomics: TaskAtomics,
}

impl<T, F> VuPool<T>
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = ()> + Send + 'static,
{
    pub fn new(scenario: T, tps_limit: Option<NonZeroU32>) -> Self {
        Self {
            scenario,
            tasks: vec![],
            stop: Arc::new(AtomicBool::new(false)),
            task_atomics: TaskAtomics::new(tps_limit),
        }
    }

    /// Start `vus` more virtual users.
    pub fn spawn(&mut self, vus: usize) {
        for _ in 0..vus {
            let scenario = self.scenario.clone();
            let transaction_data = self.task_atomics.clone_to_transaction_data();
            let iterations = self.task_atomics.iterations();
            let stop = self.stop.clone();

            self.tasks.push(tokio::spawn(TRANSACTION_HOOK.scope(
                transaction_data,
                async move {
                    // NOTE: The stop flag is only checked between iterations, so an
                    // iteration which has started always runs to completion (or abort).
                    while !stop.load(Ordering::Relaxed) {
                        scenario().await;
                        iterations.fetch_add(1, Ordering::Relaxed);
                    }
                },
            )));
        }
    }

    pub fn concurrency(&self) -> usize {
        self.tasks.len()
    }

    pub fn collect(&self, elapsed: Duration) -> Measurement {
        self.task_atomics.collect(elapsed)
    }

    /// Stop starting new iterations and give in-flight ones `graceful_stop` to finish.
    ///
    /// Returns the number of aborted iterations, the measurement covering the stop window, and the
    /// length of that window.
    pub async fn shutdown(mut self, graceful_stop: Duration) -> (u64, Measurement, Duration) {
        let start = Instant::now();
        self.stop.store(true, Ordering::Relaxed);

        let deadline = start + graceful_stop;
        let mut interrupted = 0;
        for handle in self.tasks.iter_mut() {
            match tokio::time::timeout_at(deadline, &mut *handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.is_panic() => {
                    error!("Virtual user panicked: {err}");
                }
                Ok(Err(_)) => {}
                Err(_) => {
                    handle.abort();
                    interrupted += 1;
                }
            }
        }

        if interrupted > 0 {
            warn!(
                "{interrupted} iteration(s) still running after the graceful stop of {}; aborted.",
                humantime::format_duration(graceful_stop)
            );
        }

        let elapsed = start.elapsed();
        let measurement = self.task_atomics.collect(elapsed);
        self.tasks.clear();
        (interrupted, measurement, elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::transaction_hook;
    use shopstress_core::generate_labels;

    type BoxedIteration = std::pin::Pin<Box<dyn Future<Output = ()> + Send>>;

    fn sleepy(delay: Duration) -> impl Fn() -> BoxedIteration + Clone + Send + Sync + 'static {
        move || {
            Box::pin(async move {
                let _: Result<(), ()> = transaction_hook(generate_labels!("sleep"), async {
                    tokio::time::sleep(delay).await;
                    Ok(())
                })
                .await;
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn counts_transactions_and_iterations() {
        let mut pool = VuPool::new(sleepy(Duration::from_millis(100)), None);
        pool.spawn(4);
        assert_eq!(pool.concurrency(), 4);

        tokio::time::sleep(Duration::from_millis(1050)).await;
        let measurement = pool.collect(Duration::from_millis(1050));

        assert_eq!(measurement.success, 40);
        assert_eq!(measurement.error, 0);
        assert_eq!(measurement.iterations, 40);
        assert_eq!(measurement.checks.len(), 1);
        assert_eq!(measurement.checks[0].passes, 40);

        let (interrupted, rest, _) = pool.shutdown(Duration::from_secs(1)).await;
        assert_eq!(interrupted, 0);
        // The iteration in flight at shutdown is allowed to finish.
        assert_eq!(rest.iterations, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn aborts_after_graceful_stop() {
        let mut pool = VuPool::new(sleepy(Duration::from_secs(10)), None);
        pool.spawn(3);

        tokio::time::sleep(Duration::from_millis(10)).await;
        let (interrupted, rest, elapsed) = pool.shutdown(Duration::from_secs(1)).await;

        assert_eq!(interrupted, 3);
        assert_eq!(rest.iterations, 0);
        assert!(elapsed >= Duration::from_secs(1) && elapsed < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn spawn_adds_users() {
        let mut pool = VuPool::new(sleepy(Duration::from_millis(100)), None);
        pool.spawn(2);
        pool.spawn(3);
        assert_eq!(pool.concurrency(), 5);

        tokio::time::sleep(Duration::from_millis(150)).await;
        let (interrupted, rest, _) = pool.shutdown(Duration::from_secs(1)).await;
        assert_eq!(interrupted, 0);
        assert_eq!(rest.iterations, 10);
    }

    // NOTE: governor keeps its own clock, so this one runs in real time.
    #[tokio::test]
    #[ntest::timeout(5_000)]
    async fn rate_limited() {
        let mut pool = VuPool::new(sleepy(Duration::from_millis(1)), NonZeroU32::new(20));
        pool.spawn(10);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let measurement = pool.collect(Duration::from_secs(1));
        let _ = pool.shutdown(Duration::from_secs(1)).await;

        assert!(measurement.success >= 10, "{}", measurement.success);
        assert!(measurement.success <= 25, "{}", measurement.success);
    }
}
