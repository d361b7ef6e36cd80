//! Fixed-range frequency table.
//!
//! A histogram over `[min, max]` with `intervals` equal-width bins plus one
//! trailing bin that holds values equal to `max`. Values outside the range
//! are clamped into the nearest edge bin.
//!
//! Indexed access through [`Histogram::bin`] wraps modulo the bin count, so
//! `bin(len)` is `bin(0)` and `bin(len - 1)` is the trailing bin. The
//! chi-square interval builder relies on this when it walks past the end.

use std::ops::AddAssign;

use serde::Serialize;

use crate::error::{Error, Result};

/// `floor(2 * count^(2/5))`, capped at `max_intervals`.
pub fn interval_count(count: u64, max_intervals: usize) -> usize {
    let intervals = (2.0 * (count as f64).powf(0.4)).floor() as usize;
    intervals.min(max_intervals)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    min: f64,
    max: f64,
    interval_size: f64,
    bins: Vec<u64>,
    total: u64,
}

impl Histogram {
    /// Histogram over `[min, max]` with `intervals` regular bins and one
    /// trailing bin.
    pub fn new(min: f64, max: f64, intervals: usize) -> Self {
        let interval_size = if intervals == 0 {
            0.0
        } else {
            let n = intervals as f64;
            let width = max - min;
            // A range wider than f64::MAX still has finite bins.
            if width.is_finite() {
                width / n
            } else {
                max / n - min / n
            }
        };
        Self {
            min,
            max,
            interval_size,
            bins: vec![0; intervals + 1],
            total: 0,
        }
    }

    /// Same range and shape, no counts.
    pub fn empty_like(&self) -> Self {
        Self {
            bins: vec![0; self.bins.len()],
            total: 0,
            ..*self
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn interval_size(&self) -> f64 {
        self.interval_size
    }

    /// Number of regular intervals (bins excluding the trailing one).
    pub fn intervals(&self) -> usize {
        self.bins.len() - 1
    }

    /// Number of bins including the trailing one.
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Lower edge of bin `index`.
    pub fn lower_edge(&self, index: usize) -> f64 {
        if index == 0 {
            return self.min;
        }
        self.min + index as f64 * self.interval_size
    }

    /// Bin that `value` belongs to.
    pub fn index_of(&self, value: f64) -> usize {
        let last = self.bins.len() - 1;
        if value >= self.max {
            return last;
        }
        if value <= self.min || self.interval_size <= 0.0 {
            return 0;
        }
        let offset = value - self.min;
        let scaled = if offset.is_finite() {
            offset / self.interval_size
        } else {
            value / self.interval_size - self.min / self.interval_size
        };
        let index = scaled.floor() as usize;
        // Rounding just below max can land on the trailing bin.
        index.min(last)
    }

    /// Count one value.
    pub fn add(&mut self, value: f64) {
        let index = self.index_of(value);
        self.bins[index] += 1;
        self.total += 1;
    }

    /// Bulk update from an external block processor. Advances the running
    /// total by `count` as well. `index` wraps like [`Histogram::bin`].
    pub fn add_count(&mut self, index: usize, count: u64) {
        let len = self.bins.len();
        self.bins[index % len] += count;
        self.total += count;
    }

    /// Count in bin `index`, wrapping modulo the bin count.
    pub fn bin(&self, index: usize) -> u64 {
        self.bins[index % self.bins.len()]
    }

    pub fn bins(&self) -> &[u64] {
        &self.bins
    }

    /// Running total of inserted values.
    pub fn total_count(&self) -> u64 {
        self.total
    }

    /// Merge `other` into `self`, refusing histograms of a different shape.
    pub fn try_merge(&mut self, other: &Histogram) -> Result<()> {
        if self.bins.len() != other.bins.len() {
            return Err(Error::HistogramShape {
                left: self.bins.len(),
                right: other.bins.len(),
            });
        }
        *self += other;
        Ok(())
    }
}

/// Bin-wise merge over the overlapping index range. Excess bins of the
/// larger histogram are dropped; use [`Histogram::try_merge`] to refuse
/// mismatched shapes instead.
impl AddAssign<&Histogram> for Histogram {
    fn add_assign(&mut self, other: &Histogram) {
        let overlap = self.bins.len().min(other.bins.len());
        if self.bins.len() != other.bins.len() {
            log::warn!(
                "merging histograms of {} and {} bins, dropping the excess",
                self.bins.len(),
                other.bins.len()
            );
        }
        let mut merged = 0;
        for (dst, src) in self.bins[..overlap].iter_mut().zip(&other.bins[..overlap]) {
            *dst += *src;
            merged += *src;
        }
        self.total += merged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_total(h: &Histogram) {
        assert_eq!(h.bins().iter().sum::<u64>(), h.total_count());
    }

    // -----------------------------------------------------------------------
    // Sizing
    // -----------------------------------------------------------------------

    #[test]
    fn test_interval_count_formula() {
        assert_eq!(interval_count(0, 1000), 0);
        assert_eq!(interval_count(1, 1000), 2);
        // 2 * 10000^0.4 = 2 * 39.81 = 79.6
        assert_eq!(interval_count(10_000, 1000), 79);
        assert_eq!(interval_count(1_000_000_000, 1000), 1000);
    }

    #[test]
    fn test_shape() {
        let h = Histogram::new(0.0, 10.0, 5);
        assert_eq!(h.intervals(), 5);
        assert_eq!(h.len(), 6);
        assert!((h.interval_size() - 2.0).abs() < 1e-12);
        assert!((h.lower_edge(3) - 6.0).abs() < 1e-12);
        assert!(h.is_empty());
    }

    // -----------------------------------------------------------------------
    // Insertion
    // -----------------------------------------------------------------------

    #[test]
    fn test_add_places_values() {
        let mut h = Histogram::new(0.0, 10.0, 5);
        for v in [0.0, 1.9, 2.0, 5.5, 9.99] {
            h.add(v);
        }
        assert_eq!(h.bins(), &[2, 1, 1, 0, 1, 0]);
        check_total(&h);
    }

    #[test]
    fn test_max_lands_in_trailing_bin() {
        let mut h = Histogram::new(0.0, 10.0, 5);
        h.add(10.0);
        assert_eq!(h.bin(5), 1);
        check_total(&h);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let mut h = Histogram::new(0.0, 10.0, 5);
        h.add(-3.0);
        h.add(42.0);
        assert_eq!(h.bin(0), 1);
        assert_eq!(h.bin(5), 1);
        assert_eq!(h.total_count(), 2);
    }

    #[test]
    fn test_degenerate_range() {
        let mut h = Histogram::new(4.0, 4.0, 3);
        h.add(4.0);
        h.add(4.0);
        assert_eq!(h.bin(3), 2);
        check_total(&h);

        let mut z = Histogram::new(1.0, 1.0, 0);
        z.add(1.0);
        assert_eq!(z.len(), 1);
        assert_eq!(z.bin(0), 1);
    }

    #[test]
    fn test_range_wider_than_f64_max() {
        let mut h = Histogram::new(-1e308, 1e308, 10);
        assert!(h.interval_size().is_finite());
        assert_eq!(h.lower_edge(0), -1e308);
        assert!((h.lower_edge(5) / 1e308).abs() < 1e-12);
        h.add(-1e308);
        h.add(0.0);
        h.add(9.9e307);
        h.add(1e308);
        assert_eq!(h.bin(0), 1);
        assert_eq!(h.bin(5), 1);
        assert_eq!(h.bin(9), 1);
        assert_eq!(h.bin(10), 1);
        check_total(&h);

        let single = Histogram::new(-1e308, 1e308, 1);
        assert_eq!(single.lower_edge(0), -1e308);
    }

    #[test]
    fn test_bin_wraps() {
        let mut h = Histogram::new(0.0, 3.0, 3);
        h.add(0.5);
        h.add(3.0);
        assert_eq!(h.bin(4), h.bin(0));
        assert_eq!(h.bin(7), h.bin(3));
        assert_eq!(h.bin(h.len()), 1);
    }

    #[test]
    fn test_add_count_advances_total() {
        let mut h = Histogram::new(0.0, 1.0, 4);
        h.add_count(2, 10);
        h.add_count(5, 3); // wraps to bin 0
        assert_eq!(h.bin(2), 10);
        assert_eq!(h.bin(0), 3);
        assert_eq!(h.total_count(), 13);
        check_total(&h);
    }

    // -----------------------------------------------------------------------
    // Merging
    // -----------------------------------------------------------------------

    #[test]
    fn test_merge_same_shape() {
        let mut a = Histogram::new(0.0, 1.0, 2);
        let mut b = a.empty_like();
        a.add(0.1);
        b.add(0.1);
        b.add(0.9);
        a += &b;
        assert_eq!(a.bins(), &[2, 1, 0]);
        assert_eq!(a.total_count(), 3);
        check_total(&a);
    }

    #[test]
    fn test_merge_mismatched_drops_excess() {
        let mut small = Histogram::new(0.0, 1.0, 1);
        let mut large = Histogram::new(0.0, 1.0, 3);
        large.add_count(0, 1);
        large.add_count(3, 5);
        small += &large;
        assert_eq!(small.bins(), &[1, 0]);
        assert_eq!(small.total_count(), 1);
        check_total(&small);
    }

    #[test]
    fn test_try_merge_rejects_mismatch() {
        let mut a = Histogram::new(0.0, 1.0, 2);
        let b = Histogram::new(0.0, 1.0, 4);
        let err = a.try_merge(&b).unwrap_err();
        assert!(matches!(err, Error::HistogramShape { left: 3, right: 5 }));
    }
}
