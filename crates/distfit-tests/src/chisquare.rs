//! Chi-square goodness-of-fit over a histogram.
//!
//! Adjacent bins are grouped into intervals until each interval's expected
//! count reaches [`MIN_EXPECTED`]. An under-powered tail is folded into the
//! interval before it rather than dropped, so every observation is counted.

use serde::Serialize;

use distfit_core::{Error, Histogram, Result};

use crate::cdf::Cdf;
use crate::special::chi_square_p_value;

/// Smallest expected count an interval may have on its own.
pub const MIN_EXPECTED: f64 = 5.0;

/// One group of adjacent bins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interval {
    /// First bin of the group.
    pub first_bin: usize,
    /// One past the last bin of the group.
    pub end_bin: usize,
    pub left: f64,
    pub right: f64,
    pub observed: u64,
    pub expected: f64,
}

impl Interval {
    /// `(O - E)^2 / E`, or 0 when nothing is expected.
    pub fn contribution(&self) -> f64 {
        if self.expected > 0.0 {
            let d = self.observed as f64 - self.expected;
            d * d / self.expected
        } else {
            0.0
        }
    }
}

/// Outcome of one hypothesis test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChiSquareResult {
    pub distribution: String,
    pub statistic: f64,
    pub degrees_of_freedom: i64,
    pub p_value: f64,
    pub accepted: bool,
    pub estimated_parameters: u32,
    /// Admitted intervals, left to right.
    #[serde(skip)]
    pub intervals: Vec<Interval>,
}

impl ChiSquareResult {
    pub fn interval_count(&self) -> usize {
        self.intervals.len()
    }

    /// Total observed count over all intervals.
    pub fn observed_total(&self) -> u64 {
        self.intervals.iter().map(|i| i.observed).sum()
    }
}

/// Expected count in `[left, right)`, matching the half-open bins. The
/// first interval takes the whole lower tail.
fn expected(cdf: &dyn Cdf, n: f64, left: f64, right: f64, first: bool) -> f64 {
    if first {
        n * cdf.cdf_below(right)
    } else {
        n * cdf.mass(left, right)
    }
}

/// Group the bins of `histogram` into intervals with enough expected mass.
pub fn build_intervals(histogram: &Histogram, cdf: &dyn Cdf) -> Vec<Interval> {
    let n = histogram.total_count() as f64;
    let bins = histogram.len();
    let mut admitted: Vec<Interval> = Vec::new();
    let mut start = 0;

    while start < bins {
        let first = admitted.is_empty();
        let left = histogram.lower_edge(start);
        let mut observed = 0;
        let mut end = start;
        let mut right = left;
        let mut e = 0.0;
        while end < bins {
            observed += histogram.bin(end);
            end += 1;
            right = histogram.lower_edge(end);
            e = expected(cdf, n, left, right, first);
            if e >= MIN_EXPECTED {
                break;
            }
        }

        if e >= MIN_EXPECTED {
            admitted.push(Interval {
                first_bin: start,
                end_bin: end,
                left,
                right,
                observed,
                expected: e,
            });
            start = end;
            continue;
        }

        // Out of bins with an under-powered tail: fold it into the previous
        // interval.
        let tail = match admitted.pop() {
            Some(prev) => {
                let observed = (prev.first_bin..bins).map(|i| histogram.bin(i)).sum();
                let first = admitted.is_empty();
                Interval {
                    first_bin: prev.first_bin,
                    end_bin: bins,
                    left: prev.left,
                    right,
                    observed,
                    expected: expected(cdf, n, prev.left, right, first),
                }
            }
            None => Interval {
                first_bin: start,
                end_bin: bins,
                left,
                right,
                observed,
                expected: e,
            },
        };
        admitted.push(tail);
        break;
    }
    admitted
}

/// Test `histogram` against `cdf`.
///
/// `estimated_parameters` is subtracted from the degrees of freedom along
/// with the usual one. The hypothesis is accepted when the p-value exceeds
/// `critical_p_value`.
pub fn chi_square_test(
    histogram: &Histogram,
    cdf: &dyn Cdf,
    estimated_parameters: u32,
    critical_p_value: f64,
) -> Result<ChiSquareResult> {
    if histogram.total_count() == 0 {
        return Err(Error::EmptyHistogram);
    }
    let intervals = build_intervals(histogram, cdf);
    let statistic: f64 = intervals.iter().map(Interval::contribution).sum();
    let degrees_of_freedom = intervals.len() as i64 - 1 - estimated_parameters as i64;
    let p_value = chi_square_p_value(statistic, degrees_of_freedom);
    log::debug!(
        "{}: {} intervals, chi2={statistic:.4}, df={degrees_of_freedom}, p={p_value:.6}",
        cdf.name(),
        intervals.len()
    );
    Ok(ChiSquareResult {
        distribution: cdf.name().to_string(),
        statistic,
        degrees_of_freedom,
        p_value,
        accepted: p_value > critical_p_value,
        estimated_parameters,
        intervals,
    })
}
