use std::time::Duration;

/// Interval at which the run loop drains counters and logs a measurement.
pub const BASE_INTERVAL: Duration = Duration::from_secs(1);

/// The default number of concurrent virtual users
pub const DEFAULT_VUS: usize = 30;

/// The default wall-clock duration of a run
pub const DEFAULT_DURATION: Duration = Duration::from_secs(60);

/// How long in-flight iterations may keep running once the duration has elapsed
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);

/// The default ceiling on the failed-request rate
pub const DEFAULT_FAILURE_RATE_THRESHOLD: f64 = 0.001;
