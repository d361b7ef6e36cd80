//! First pass: min, max, mean, count and the all-integer flag.
//!
//! Each worker folds its blocks into a private [`FirstPassAccumulator`]
//! (Welford's running mean) and reports once, under a lock, when the reader
//! runs dry. Worker means are combined weighted by their counts, so the
//! result does not depend on how blocks were spread across workers.

use std::num::FpCategory;
use std::sync::Mutex;
use std::time::Instant;

use serde::Serialize;

use crate::config::ThreadConfig;
use crate::error::{Error, Result};
use crate::processor::ProcessorPool;
use crate::reader::{DataBlock, FileReader};
use crate::watchdog::Watchdog;

/// A value takes part in the statistics iff it is NORMAL or ZERO.
pub fn is_valid(x: f64) -> bool {
    matches!(x.classify(), FpCategory::Normal | FpCategory::Zero)
}

/// Running summary statistics for one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct FirstPassAccumulator {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: u64,
    pub all_integers: bool,
}

impl Default for FirstPassAccumulator {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            mean: 0.0,
            count: 0,
            all_integers: true,
        }
    }
}

impl FirstPassAccumulator {
    /// Fold one value in. Invalid values are skipped.
    pub fn push(&mut self, x: f64) {
        if !is_valid(x) {
            return;
        }
        self.count += 1;
        if x < self.min {
            self.min = x;
        }
        if x > self.max {
            self.max = x;
        }
        self.mean += (x - self.mean) / self.count as f64;
        if x.floor() != x.ceil() {
            self.all_integers = false;
        }
    }

    pub fn push_all(&mut self, values: &[f64]) {
        for &x in values {
            self.push(x);
        }
    }

    /// Combine with another worker's statistics. The mean is weighted by
    /// count: workers see unequal numbers of values.
    pub fn merge(&mut self, other: &FirstPassAccumulator) {
        if other.count == 0 {
            return;
        }
        let total = self.count + other.count;
        self.mean += (other.mean - self.mean) * (other.count as f64 / total as f64);
        self.count = total;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.all_integers &= other.all_integers;
    }

    pub fn finish(self) -> FirstPassResult {
        FirstPassResult {
            min: self.min,
            max: self.max,
            mean: self.mean,
            count: self.count,
            all_integers: self.all_integers,
        }
    }
}

/// Summary statistics of every valid value in the file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirstPassResult {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Number of NORMAL-or-ZERO values seen.
    pub count: u64,
    pub all_integers: bool,
}

/// One run of the first pass over a reader.
pub struct FirstPass<'a> {
    reader: &'a FileReader,
    pool: &'a ProcessorPool,
    config: &'a ThreadConfig,
    watchdog: Option<&'a Watchdog>,
}

impl<'a> FirstPass<'a> {
    pub fn new(reader: &'a FileReader, pool: &'a ProcessorPool, config: &'a ThreadConfig) -> Self {
        Self {
            reader,
            pool,
            config,
            watchdog: None,
        }
    }

    /// Kick `watchdog` per block and check full coverage at the end.
    pub fn with_watchdog(mut self, watchdog: &'a Watchdog) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    pub fn run(self) -> Result<FirstPassResult> {
        if self.pool.processor_count() == 0 {
            return Err(Error::Config("no block processors available".into()));
        }
        self.reader.seek_to_start()?;
        let baseline = self.watchdog.map(|wd| wd.progress()).unwrap_or(0);
        let t0 = Instant::now();
        let aggregate = Mutex::new(FirstPassAccumulator::default());

        let this = &self;
        let outcomes: Vec<Result<()>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..self.config.threads)
                .map(|_| {
                    let aggregate = &aggregate;
                    s.spawn(move || this.worker(aggregate))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(Error::Io(std::io::Error::other("first pass worker panicked")))
                    })
                })
                .collect()
        });

        let mut failures = outcomes.into_iter().filter_map(|r| r.err());
        if let Some(first) = failures.next() {
            log::error!(
                "first pass failed: {first} ({} more worker error(s))",
                failures.count()
            );
            return Err(first);
        }

        if let Some(wd) = self.watchdog {
            let processed = wd.progress() - baseline;
            let expected = self.reader.record_count();
            if processed != expected {
                return Err(Error::IncompleteCoverage {
                    processed,
                    expected,
                });
            }
        }

        let result = aggregate.into_inner().unwrap().finish();
        log::info!(
            "first pass: {} valid of {} records in {:.2}s (min={}, max={}, mean={})",
            result.count,
            self.reader.record_count(),
            t0.elapsed().as_secs_f64(),
            result.min,
            result.max,
            result.mean
        );
        Ok(result)
    }

    fn worker(&self, aggregate: &Mutex<FirstPassAccumulator>) -> Result<()> {
        let mut processor = self
            .pool
            .lease()
            .ok_or_else(|| Error::Config("no block processors available".into()))?;
        let mut local = FirstPassAccumulator::default();
        loop {
            match self.reader.read_block(self.config.elements_per_read) {
                DataBlock::Ok(values) => {
                    processor.first_pass(&values, &mut local);
                    if let Some(wd) = self.watchdog {
                        wd.kick(values.len() as u64);
                    }
                    log::debug!("first pass: block of {} values", values.len());
                }
                DataBlock::Eof => break,
                DataBlock::Error(e) => return Err(e.into()),
            }
        }
        aggregate.lock().unwrap().merge(&local);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Validity
    // -----------------------------------------------------------------------

    #[test]
    fn test_is_valid_categories() {
        assert!(is_valid(0.0));
        assert!(is_valid(-0.0));
        assert!(is_valid(1.5));
        assert!(is_valid(-1e300));
        assert!(!is_valid(f64::NAN));
        assert!(!is_valid(f64::INFINITY));
        assert!(!is_valid(f64::NEG_INFINITY));
        assert!(!is_valid(f64::MIN_POSITIVE / 2.0)); // subnormal
    }

    // -----------------------------------------------------------------------
    // Accumulation
    // -----------------------------------------------------------------------

    #[test]
    fn test_push_basic() {
        let mut acc = FirstPassAccumulator::default();
        acc.push_all(&[3.0, -1.0, 4.0, 1.0, 5.0]);
        assert_eq!(acc.count, 5);
        assert_eq!(acc.min, -1.0);
        assert_eq!(acc.max, 5.0);
        assert!((acc.mean - 2.4).abs() < 1e-12);
        assert!(acc.all_integers);
    }

    #[test]
    fn test_push_skips_invalid() {
        let mut acc = FirstPassAccumulator::default();
        acc.push_all(&[1.0, f64::NAN, f64::INFINITY, 3.0, 1e-310]);
        assert_eq!(acc.count, 2);
        assert!((acc.mean - 2.0).abs() < 1e-12);
        assert_eq!(acc.max, 3.0);
    }

    #[test]
    fn test_fraction_clears_integer_flag() {
        let mut acc = FirstPassAccumulator::default();
        acc.push_all(&[1.0, 2.0, 2.5]);
        assert!(!acc.all_integers);
    }

    // -----------------------------------------------------------------------
    // Merging
    // -----------------------------------------------------------------------

    #[test]
    fn test_merge_is_count_weighted() {
        let mut a = FirstPassAccumulator::default();
        a.push_all(&[10.0]);
        let mut b = FirstPassAccumulator::default();
        b.push_all(&[0.0, 0.0, 0.0]);
        a.merge(&b);
        assert_eq!(a.count, 4);
        // An unweighted average of means would give 5.0.
        assert!((a.mean - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_merge_with_empty() {
        let mut a = FirstPassAccumulator::default();
        a.merge(&FirstPassAccumulator::default());
        assert_eq!(a, FirstPassAccumulator::default());

        let mut b = FirstPassAccumulator::default();
        b.push_all(&[1.5, 2.5]);
        let mut empty = FirstPassAccumulator::default();
        empty.merge(&b);
        assert_eq!(empty, b);
    }

    #[test]
    fn test_merge_matches_single_pass_for_any_partition() {
        let values: Vec<f64> = (0..5000)
            .map(|i| ((i * 7919) % 1013) as f64 * 0.37 - 50.0)
            .collect();
        let mut direct = FirstPassAccumulator::default();
        direct.push_all(&values);

        for workers in 1..=32 {
            let mut merged = FirstPassAccumulator::default();
            // Uneven partitions: chunk sizes grow with the worker index.
            let mut start = 0;
            let mut w = 0;
            while start < values.len() {
                let len = (w % workers + 1) * 37;
                let end = (start + len).min(values.len());
                let mut part = FirstPassAccumulator::default();
                part.push_all(&values[start..end]);
                merged.merge(&part);
                start = end;
                w += 1;
            }
            assert_eq!(merged.count, direct.count);
            assert_eq!(merged.min, direct.min);
            assert_eq!(merged.max, direct.max);
            let rel = ((merged.mean - direct.mean) / direct.mean).abs();
            assert!(rel < 1e-9, "workers={workers} rel={rel}");
        }
    }
}
