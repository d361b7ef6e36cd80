//! Second pass: variance around the first-pass mean, plus the histogram.
//!
//! Every worker uses the same global mean and the same `count - 1` divisor,
//! so partial variance sums add directly. Each worker fills a private
//! histogram shaped like the final one and merges it bin by bin at the end.

use std::sync::Mutex;
use std::time::Instant;

use serde::Serialize;

use crate::config::ThreadConfig;
use crate::error::{Error, Result};
use crate::first_pass::{FirstPassResult, is_valid};
use crate::histogram::{Histogram, interval_count};
use crate::processor::ProcessorPool;
use crate::reader::{DataBlock, FileReader};
use crate::watchdog::Watchdog;

/// First-pass values every second-pass worker needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecondPassSeed {
    pub mean: f64,
    /// `count - 1` from the first pass.
    pub divisor: f64,
}

impl SecondPassSeed {
    pub fn from_first_pass(first: &FirstPassResult) -> Result<Self> {
        if first.count < 2 {
            return Err(Error::InsufficientData {
                needed: 2,
                got: first.count,
            });
        }
        Ok(Self {
            mean: first.mean,
            divisor: (first.count - 1) as f64,
        })
    }
}

/// Partial variance and histogram for one worker.
#[derive(Debug, Clone)]
pub struct SecondPassAccumulator {
    pub variance: f64,
    pub histogram: Histogram,
    pub count: u64,
}

impl SecondPassAccumulator {
    pub fn new(histogram: Histogram) -> Self {
        Self {
            variance: 0.0,
            histogram,
            count: 0,
        }
    }

    pub fn push(&mut self, x: f64, seed: &SecondPassSeed) {
        if !is_valid(x) {
            return;
        }
        let d = x - seed.mean;
        self.variance += d * d / seed.divisor;
        self.histogram.add(x);
        self.count += 1;
    }

    pub fn push_all(&mut self, values: &[f64], seed: &SecondPassSeed) {
        for &x in values {
            self.push(x, seed);
        }
    }

    /// Add another worker's partial sum and histogram.
    pub fn merge(&mut self, other: &SecondPassAccumulator) -> Result<()> {
        self.histogram.try_merge(&other.histogram)?;
        self.variance += other.variance;
        self.count += other.count;
        Ok(())
    }

    pub fn finish(self) -> SecondPassResult {
        let variance = self.variance.max(0.0);
        SecondPassResult {
            variance,
            sd: variance.sqrt(),
            count: self.count,
            histogram: self.histogram,
        }
    }
}

/// Sample variance, standard deviation and histogram of the file.
#[derive(Debug, Clone, Serialize)]
pub struct SecondPassResult {
    pub variance: f64,
    pub sd: f64,
    /// Valid values processed; equals the first-pass count.
    pub count: u64,
    #[serde(skip)]
    pub histogram: Histogram,
}

/// One run of the second pass, parameterized by first-pass results.
pub struct SecondPass<'a> {
    reader: &'a FileReader,
    pool: &'a ProcessorPool,
    config: &'a ThreadConfig,
    first: &'a FirstPassResult,
    max_intervals: usize,
    watchdog: Option<&'a Watchdog>,
}

impl<'a> SecondPass<'a> {
    pub fn new(
        reader: &'a FileReader,
        pool: &'a ProcessorPool,
        config: &'a ThreadConfig,
        first: &'a FirstPassResult,
        max_intervals: usize,
    ) -> Self {
        Self {
            reader,
            pool,
            config,
            first,
            max_intervals,
            watchdog: None,
        }
    }

    pub fn with_watchdog(mut self, watchdog: &'a Watchdog) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    /// The empty histogram every worker starts from.
    pub fn histogram_template(&self) -> Histogram {
        let intervals = interval_count(self.first.count, self.max_intervals);
        Histogram::new(self.first.min, self.first.max, intervals)
    }

    pub fn run(self) -> Result<SecondPassResult> {
        let seed = SecondPassSeed::from_first_pass(self.first)?;
        if self.pool.processor_count() == 0 {
            return Err(Error::Config("no block processors available".into()));
        }
        self.reader.seek_to_start()?;
        let baseline = self.watchdog.map(|wd| wd.progress()).unwrap_or(0);
        let t0 = Instant::now();
        let template = self.histogram_template();
        let aggregate = Mutex::new(SecondPassAccumulator::new(template.empty_like()));

        let this = &self;
        let outcomes: Vec<Result<()>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..self.config.threads)
                .map(|_| {
                    let aggregate = &aggregate;
                    let template = &template;
                    let seed = &seed;
                    s.spawn(move || this.worker(template, seed, aggregate))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(Error::Io(std::io::Error::other("second pass worker panicked")))
                    })
                })
                .collect()
        });

        let mut failures = outcomes.into_iter().filter_map(|r| r.err());
        if let Some(first) = failures.next() {
            log::error!(
                "second pass failed: {first} ({} more worker error(s))",
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
        if result.count != self.first.count {
            log::warn!(
                "second pass saw {} valid values, first pass saw {}",
                result.count,
                self.first.count
            );
        }
        log::info!(
            "second pass: variance={} sd={} over {} bins in {:.2}s",
            result.variance,
            result.sd,
            result.histogram.len(),
            t0.elapsed().as_secs_f64()
        );
        Ok(result)
    }

    fn worker(
        &self,
        template: &Histogram,
        seed: &SecondPassSeed,
        aggregate: &Mutex<SecondPassAccumulator>,
    ) -> Result<()> {
        let mut processor = self
            .pool
            .lease()
            .ok_or_else(|| Error::Config("no block processors available".into()))?;
        let mut local = SecondPassAccumulator::new(template.empty_like());
        loop {
            match self.reader.read_block(self.config.elements_per_read) {
                DataBlock::Ok(values) => {
                    processor.second_pass(&values, seed, &mut local);
                    if let Some(wd) = self.watchdog {
                        wd.kick(values.len() as u64);
                    }
                }
                DataBlock::Eof => break,
                DataBlock::Error(e) => return Err(e.into()),
            }
        }
        aggregate.lock().unwrap().merge(&local)
    }
}
