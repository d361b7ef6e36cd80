//! Block processors and the pool that leases them to pass workers.
//!
//! A [`BlockProcessor`] does the per-record work of a pass for one block.
//! [`CpuProcessor`] is the reference implementation; an accelerated backend
//! plugs in by implementing the same trait and folding its partial results
//! with the accumulators' merge rules.
//!
//! The [`ProcessorPool`] is an ordinary object owned by the caller. Workers
//! take a processor with [`ProcessorPool::lease`] and the returned
//! [`ProcessorLease`] hands it back when it goes out of scope.

use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex};

use crate::first_pass::FirstPassAccumulator;
use crate::second_pass::{SecondPassAccumulator, SecondPassSeed};

/// Per-block work for both passes.
pub trait BlockProcessor: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Fold `block` into the worker's first-pass statistics.
    fn first_pass(&mut self, block: &[f64], acc: &mut FirstPassAccumulator);

    /// Fold `block` into the worker's partial variance and histogram.
    fn second_pass(&mut self, block: &[f64], seed: &SecondPassSeed, acc: &mut SecondPassAccumulator);
}

/// Scalar reference processor.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuProcessor;

impl BlockProcessor for CpuProcessor {
    fn name(&self) -> &str {
        "cpu"
    }

    fn first_pass(&mut self, block: &[f64], acc: &mut FirstPassAccumulator) {
        acc.push_all(block);
    }

    fn second_pass(&mut self, block: &[f64], seed: &SecondPassSeed, acc: &mut SecondPassAccumulator) {
        acc.push_all(block, seed);
    }
}

/// Thread-safe set of processors handed out one per worker.
pub struct ProcessorPool {
    idle: Mutex<Vec<Box<dyn BlockProcessor>>>,
    returned: Condvar,
    size: usize,
}

impl ProcessorPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            returned: Condvar::new(),
            size: 0,
        }
    }

    /// Pool of `n` CPU processors.
    pub fn cpu(n: usize) -> Self {
        let mut pool = Self::new();
        for _ in 0..n {
            pool.add_processor(Box::new(CpuProcessor));
        }
        pool
    }

    /// Register a processor.
    pub fn add_processor(&mut self, processor: Box<dyn BlockProcessor>) {
        log::debug!("pool: registered {} processor", processor.name());
        self.idle.get_mut().unwrap().push(processor);
        self.size += 1;
    }

    /// Number of registered processors.
    pub fn processor_count(&self) -> usize {
        self.size
    }

    /// Processors not currently leased.
    pub fn available(&self) -> usize {
        self.idle.lock().unwrap().len()
    }

    /// Take a processor, waiting for one to be returned if all are leased.
    /// Returns `None` only for a pool with no processors at all.
    pub fn lease(&self) -> Option<ProcessorLease<'_>> {
        if self.size == 0 {
            return None;
        }
        let mut idle = self.idle.lock().unwrap();
        loop {
            if let Some(processor) = idle.pop() {
                return Some(ProcessorLease {
                    pool: self,
                    processor: Some(processor),
                });
            }
            idle = self.returned.wait(idle).unwrap();
        }
    }

    fn give_back(&self, processor: Box<dyn BlockProcessor>) {
        self.idle.lock().unwrap().push(processor);
        self.returned.notify_one();
    }
}

impl Default for ProcessorPool {
    fn default() -> Self {
        Self::new()
    }
}

/// A leased processor. Returned to its pool on drop.
pub struct ProcessorLease<'a> {
    pool: &'a ProcessorPool,
    processor: Option<Box<dyn BlockProcessor>>,
}

impl Deref for ProcessorLease<'_> {
    type Target = dyn BlockProcessor;

    fn deref(&self) -> &Self::Target {
        self.processor.as_deref().unwrap()
    }
}

impl DerefMut for ProcessorLease<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.processor.as_deref_mut().unwrap()
    }
}

impl Drop for ProcessorLease<'_> {
    fn drop(&mut self) {
        if let Some(processor) = self.processor.take() {
            self.pool.give_back(processor);
        }
    }
}
