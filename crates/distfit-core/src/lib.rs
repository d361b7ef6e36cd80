//! # distfit-core
//!
//! **Streaming statistics over very large flat files of doubles.**
//!
//! `distfit-core` reads a headerless file of 8-byte IEEE-754 values with a
//! pool of worker threads and computes, in two passes, everything a
//! goodness-of-fit battery needs: min, max, mean, count, an all-integer flag,
//! the sample variance and a histogram.
//!
//! ## Quick Start
//!
//! ```no_run
//! use distfit_core::{FileReader, FirstPass, ProcessorPool, SecondPass, ThreadConfig};
//!
//! let reader = FileReader::open("samples.bin").unwrap();
//! let config = ThreadConfig::default();
//! let pool = ProcessorPool::cpu(config.threads);
//!
//! let first = FirstPass::new(&reader, &pool, &config).run().unwrap();
//! let second = SecondPass::new(&reader, &pool, &config, &first, 1 << 16)
//!     .run()
//!     .unwrap();
//! println!("mean={} sd={} bins={}", first.mean, second.sd, second.histogram.len());
//! ```
//!
//! ## Architecture
//!
//! Reader → First Pass → Second Pass → Histogram
//!
//! - The [`FileReader`] hands out non-overlapping blocks under one lock.
//! - Each pass runs a fresh set of scoped worker threads. Workers keep
//!   private accumulators and report once at the end, so no lock is held
//!   in the per-record loop.
//! - All reductions are order-independent; results do not depend on the
//!   thread count or on which worker got which block.
//! - An optional [`Watchdog`] counts progress and flags stalls.

pub mod config;
pub mod error;
pub mod first_pass;
pub mod histogram;
pub mod processor;
pub mod reader;
pub mod second_pass;
pub mod watchdog;

pub use config::{FitConfig, ThreadConfig, hardware_concurrency};
pub use error::{Error, Result};
pub use first_pass::{FirstPass, FirstPassAccumulator, FirstPassResult, is_valid};
pub use histogram::{Histogram, interval_count};
pub use processor::{BlockProcessor, CpuProcessor, ProcessorLease, ProcessorPool};
pub use reader::{BlockStatus, DataBlock, FileReader, RECORD_SIZE, write_records};
pub use second_pass::{SecondPass, SecondPassAccumulator, SecondPassResult, SecondPassSeed};
pub use watchdog::{STALL_EXIT_CODE, StallPolicy, Watchdog};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
