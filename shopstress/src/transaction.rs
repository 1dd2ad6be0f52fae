use crate::measurement::CheckTally;
use governor::DefaultDirectRateLimiter;
use metrics_util::AtomicBucket;
use shopstress_core::TransactionLabels;
use std::time::{Duration, Instant};
use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

/// Transaction hook used by the `#[transaction]` macro. Not intended to be used manually.
pub async fn transaction_hook<T, R, E>(labels: TransactionLabels, func: T) -> T::Output
where
    T: Future<Output = Result<R, E>>,
{
    // NOTE: Outside a scenario (e.g. calling the client directly) there is nothing to record.
    let Ok(hook) = TRANSACTION_HOOK.try_with(|v| v.clone()) else {
        tracing::trace!("No hook available for {}.", labels.name);
        return func.await;
    };

    if let Some(limiter) = &hook.limiter {
        limiter.until_ready().await;
    }

    let start = Instant::now();
    let res = func.await;
    let elapsed = start.elapsed();

    hook.latency.push(elapsed);

    #[cfg(feature = "metrics")]
    {
        metrics::histogram!(labels.latency).record(elapsed.as_secs_f64());
        if res.is_ok() {
            metrics::counter!(labels.success).increment(1);
        } else {
            metrics::counter!(labels.error).increment(1);
        }
    }

    if res.is_ok() {
        hook.success.fetch_add(1, Ordering::Relaxed);
    } else {
        hook.error.fetch_add(1, Ordering::Relaxed);
    }

    // A poisoned tally only loses the per-check breakdown; totals above are already recorded.
    if let Ok(mut checks) = hook.checks.lock() {
        checks.record(labels.name, res.is_ok());
    }

    res
}

#[derive(Clone)]
pub(crate) struct TransactionData {
    pub limiter: Option<Arc<DefaultDirectRateLimiter>>,
    pub success: Arc<AtomicU64>,
    pub error: Arc<AtomicU64>,
    pub latency: Arc<AtomicBucket<Duration>>,
    pub checks: Arc<Mutex<CheckTally>>,
}

tokio::task_local! {
    pub(crate) static TRANSACTION_HOOK: TransactionData;
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopstress_core::generate_labels;

    fn data() -> TransactionData {
        TransactionData {
            limiter: None,
            success: Arc::new(AtomicU64::new(0)),
            error: Arc::new(AtomicU64::new(0)),
            latency: Arc::new(AtomicBucket::new()),
            checks: Arc::new(Mutex::new(CheckTally::default())),
        }
    }

    #[tokio::test]
    async fn records_outcomes_inside_scope() {
        let data = data();
        let hook = data.clone();

        TRANSACTION_HOOK
            .scope(data, async {
                let ok: Result<u32, ()> =
                    transaction_hook(generate_labels!("buy"), async { Ok(1) }).await;
                assert_eq!(ok, Ok(1));
                let err: Result<u32, ()> =
                    transaction_hook(generate_labels!("buy"), async { Err(()) }).await;
                assert_eq!(err, Err(()));
                let _: Result<(), ()> =
                    transaction_hook(generate_labels!("auth"), async { Ok(()) }).await;
            })
            .await;

        assert_eq!(hook.success.load(Ordering::Relaxed), 2);
        assert_eq!(hook.error.load(Ordering::Relaxed), 1);

        let mut latencies = 0;
        hook.latency.clear_with(|l| latencies += l.len());
        assert_eq!(latencies, 3);

        let checks = hook.checks.lock().unwrap().snapshot();
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].name, "auth");
        assert_eq!((checks[1].passes, checks[1].fails), (1, 1));
    }

    #[tokio::test]
    async fn passes_through_without_scope() {
        let res: Result<&str, ()> = transaction_hook(generate_labels!("info"), async { Ok("ok") }).await;
        assert_eq!(res, Ok("ok"));
    }
}
