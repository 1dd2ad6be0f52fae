use std::time::Duration;
use tokio::time::{interval, Instant, Interval};

pub(crate) struct Timer {
    interval: Interval,
    last_tick: Instant,
    interval_dur: Duration,
}

impl Timer {
    pub async fn new(interval_dur: Duration) -> Self {
        let mut interval = interval(interval_dur);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // NOTE: First tick completes instantly
        let last_tick = interval.tick().await;
        Self {
            interval,
            last_tick,
            interval_dur,
        }
    }

    /// Wait for the next tick, or the deadline if it comes first. Returns the time since the
    /// previous tick.
    pub async fn tick_until(&mut self, deadline: Instant) -> Duration {
        let next = tokio::select! {
            next = self.interval.tick() => next,
            _ = tokio::time::sleep_until(deadline) => Instant::now(),
        };
        let elapsed = next.saturating_duration_since(self.last_tick);
        self.last_tick = next;
        elapsed
    }

    /// Time since the previous tick, restarting the count.
    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        elapsed
    }
}

impl std::fmt::Display for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", humantime::format_duration(self.interval_dur))
    }
}
