//! Chi-square goodness-of-fit battery.
//!
//! Tests the histogram from a two-pass run against four candidate families
//! (Normal, Uniform, Exponential, Poisson) and reports which, if any, fits.
//! Each test returns a [`ChiSquareResult`]; the [`TestRunner`] collects them
//! into [`Outcome`] rows and a [`Verdict`].
//!
//! ```no_run
//! use distfit_core::FitConfig;
//! use distfit_tests::fit_file;
//!
//! let report = fit_file("samples.bin", &FitConfig::default()).unwrap();
//! println!("{}", report.verdict);
//! ```

// ═══════════════════════════════════════════════════════════════════════════════
// Numerics
// ═══════════════════════════════════════════════════════════════════════════════

pub mod special;

// ═══════════════════════════════════════════════════════════════════════════════
// Candidates and the test
// ═══════════════════════════════════════════════════════════════════════════════

pub mod cdf;
pub mod chisquare;

// ═══════════════════════════════════════════════════════════════════════════════
// Battery
// ═══════════════════════════════════════════════════════════════════════════════

pub mod pipeline;
pub mod runner;

pub use cdf::{Cdf, Distribution, Exponential, Normal, Poisson, Uniform};
pub use chisquare::{ChiSquareResult, Interval, MIN_EXPECTED, build_intervals, chi_square_test};
pub use pipeline::{FitReport, fit_file, fit_file_with_pool};
pub use runner::{Hypothesis, Outcome, TestRunner, Verdict, compare_results, rank};
pub use special::{chi_square_p_value, ln_factorial, normal_z_probability};
