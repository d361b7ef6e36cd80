//! Run configuration.
//!
//! [`ThreadConfig`] controls how the passes read the file; [`FitConfig`]
//! wraps it with the knobs the chi-square battery needs.

use std::time::Duration;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::watchdog::StallPolicy;

/// Doubles per read: 10 MiB worth.
pub const DEFAULT_ELEMENTS_PER_READ: usize = 10 * 1024 * 1024 / std::mem::size_of::<f64>();

/// Default watchdog sampling interval.
pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_secs(3);

/// Default critical alpha for accepting a hypothesis.
pub const DEFAULT_CRITICAL_P_VALUE: f64 = 0.05;

/// Upper bound on histogram intervals, whatever the sample count.
pub const DEFAULT_MAX_INTERVALS: usize = 1 << 16;

/// Number of hardware threads, falling back to 1 when unknown.
pub fn hardware_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// How a pass spreads work over threads.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadConfig {
    /// Worker threads per pass.
    pub threads: usize,
    /// Maximum doubles requested from the reader per block.
    pub elements_per_read: usize,
    /// How often the watchdog samples the progress counter.
    pub watchdog_interval: Duration,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            threads: hardware_concurrency(),
            elements_per_read: DEFAULT_ELEMENTS_PER_READ,
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
        }
    }
}

/// Everything a full fitting run needs besides the input path.
#[derive(Debug, Clone, Serialize)]
pub struct FitConfig {
    /// A hypothesis is accepted when its p-value exceeds this.
    pub critical_p_value: f64,
    pub threads: ThreadConfig,
    /// What the watchdog does on a stall. `None` disables the watchdog.
    pub stall_policy: Option<StallPolicy>,
    /// Cap on histogram intervals.
    pub max_intervals: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            critical_p_value: DEFAULT_CRITICAL_P_VALUE,
            threads: ThreadConfig::default(),
            stall_policy: Some(StallPolicy::Warn),
            max_intervals: DEFAULT_MAX_INTERVALS,
        }
    }
}

impl FitConfig {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.critical_p_value > 0.0 && self.critical_p_value < 1.0) {
            return Err(Error::Config(format!(
                "critical p-value must lie in (0, 1), got {}",
                self.critical_p_value
            )));
        }
        if self.threads.threads == 0 {
            return Err(Error::Config("thread count must be at least 1".into()));
        }
        if self.threads.elements_per_read == 0 {
            return Err(Error::Config("block size must be at least 1 element".into()));
        }
        if self.threads.watchdog_interval.is_zero() {
            return Err(Error::Config("watchdog interval must be non-zero".into()));
        }
        if self.max_intervals == 0 {
            return Err(Error::Config("interval cap must be at least 1".into()));
        }
        Ok(())
    }
}
