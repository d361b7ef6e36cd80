//! Background liveness monitor.
//!
//! Workers [`kick`](Watchdog::kick) a shared counter as they finish blocks.
//! A timer thread samples that counter every interval; if it has not moved
//! since the previous sample the run is considered stalled and the
//! configured [`StallPolicy`] applies.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Serialize;

use crate::error::Result;

/// Exit code used when [`StallPolicy::Abort`] terminates the process.
pub const STALL_EXIT_CODE: i32 = 5;

/// What to do when the counter stops moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StallPolicy {
    /// Log a warning and keep going.
    Warn,
    /// Log an error and exit the process with [`STALL_EXIT_CODE`].
    Abort,
}

impl std::fmt::Display for StallPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warn => write!(f, "warn"),
            Self::Abort => write!(f, "abort"),
        }
    }
}

struct Timer {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Progress counter plus an optional timer thread watching it.
pub struct Watchdog {
    progress: Arc<AtomicU64>,
    stalls: Arc<AtomicU64>,
    interval: Duration,
    policy: StallPolicy,
    timer: Mutex<Option<Timer>>,
}

impl Watchdog {
    pub fn new(interval: Duration, policy: StallPolicy) -> Self {
        Self {
            progress: Arc::new(AtomicU64::new(0)),
            stalls: Arc::new(AtomicU64::new(0)),
            interval,
            policy,
            timer: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> StallPolicy {
        self.policy
    }

    /// Start the timer thread. Calling it again while running does nothing.
    pub fn start(&self) -> Result<()> {
        let mut timer = self.timer.lock().unwrap();
        if timer.is_some() {
            return Ok(());
        }

        let (stop, rx) = mpsc::channel::<()>();
        let progress = Arc::clone(&self.progress);
        let stalls = Arc::clone(&self.stalls);
        let interval = self.interval;
        let policy = self.policy;

        let handle = std::thread::Builder::new()
            .name("distfit-watchdog".into())
            .spawn(move || {
                let mut last = progress.load(Ordering::Relaxed);
                loop {
                    match rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        // Stop requested, or the watchdog was dropped.
                        _ => break,
                    }
                    let now = progress.load(Ordering::Relaxed);
                    if now == last {
                        stalls.fetch_add(1, Ordering::Relaxed);
                        on_stall(policy, now, interval);
                    }
                    last = now;
                }
            })?;

        *timer = Some(Timer { stop, handle });
        Ok(())
    }

    /// Record `n` more records of progress. Never blocks.
    pub fn kick(&self, n: u64) {
        self.progress.fetch_add(n, Ordering::Relaxed);
    }

    /// Cumulative progress since construction.
    pub fn progress(&self) -> u64 {
        self.progress.load(Ordering::Relaxed)
    }

    /// How many intervals elapsed with no progress.
    pub fn stall_count(&self) -> u64 {
        self.stalls.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.timer.lock().unwrap().is_some()
    }

    /// Halt and join the timer thread. Safe to call repeatedly.
    pub fn stop(&self) {
        let timer = self.timer.lock().unwrap().take();
        if let Some(Timer { stop, handle }) = timer {
            let _ = stop.send(());
            let _ = handle.join();
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

fn on_stall(policy: StallPolicy, progress: u64, interval: Duration) {
    match policy {
        StallPolicy::Warn => log::warn!(
            "no progress in the last {:.1}s (stuck at {progress} records)",
            interval.as_secs_f64()
        ),
        StallPolicy::Abort => {
            log::error!(
                "no progress in the last {:.1}s (stuck at {progress} records), aborting",
                interval.as_secs_f64()
            );
            std::process::exit(STALL_EXIT_CODE);
        }
    }
}
