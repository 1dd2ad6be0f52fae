mod config;
mod constants;
mod metrics;
mod stats;
mod threshold;

pub use config::*;
pub use constants::*;
pub use metrics::*;
pub use stats::*;
pub use threshold::*;
