//! Candidate distributions.
//!
//! Every candidate is a small value type whose constructor validates its
//! parameters and returns [`Error::Domain`] on degenerate input, so a bad
//! hypothesis is dropped before any test runs. Evaluation is pure.

use serde::Serialize;
use statrs::function::erf::erf;

use distfit_core::{Error, Result};

use crate::special::{MAX_FACTORIAL, factorial, ln_factorial};

/// A cumulative distribution function the chi-square engine can test against.
pub trait Cdf {
    /// Display name, e.g. `"Normal"`.
    fn name(&self) -> &'static str;

    /// P(X <= x).
    fn cdf(&self, x: f64) -> f64;

    /// P(X < x). Histogram bins are half-open, so interval edges are
    /// evaluated from the left. Equal to [`Cdf::cdf`] for continuous
    /// families.
    fn cdf_below(&self, x: f64) -> f64 {
        self.cdf(x)
    }

    /// P(left <= X < right).
    fn mass(&self, left: f64, right: f64) -> f64 {
        self.cdf_below(right) - self.cdf_below(left)
    }

    /// Parameters estimated from the data; subtracted from the degrees of
    /// freedom.
    fn estimated_parameters(&self) -> u32;
}

fn require_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::Domain(format!("{name} must be finite, got {value}")))
    }
}

// ---------------------------------------------------------------------------
// Normal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Normal {
    mean: f64,
    variance: f64,
    #[serde(skip)]
    scale: f64,
}

impl Normal {
    pub fn new(mean: f64, variance: f64) -> Result<Self> {
        require_finite("mean", mean)?;
        require_finite("variance", variance)?;
        if variance <= 0.0 {
            return Err(Error::Domain(format!(
                "normal variance must be positive, got {variance}"
            )));
        }
        Ok(Self {
            mean,
            variance,
            scale: (2.0 * variance).sqrt(),
        })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }
}

impl Cdf for Normal {
    fn name(&self) -> &'static str {
        "Normal"
    }

    fn cdf(&self, x: f64) -> f64 {
        0.5 * (1.0 + erf((x - self.mean) / self.scale))
    }

    fn estimated_parameters(&self) -> u32 {
        2
    }
}

// ---------------------------------------------------------------------------
// Uniform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Uniform {
    a: f64,
    b: f64,
}

impl Uniform {
    pub fn new(a: f64, b: f64) -> Result<Self> {
        require_finite("a", a)?;
        require_finite("b", b)?;
        if a >= b {
            return Err(Error::Domain(format!(
                "uniform needs a < b, got a={a} b={b}"
            )));
        }
        require_finite("b - a", b - a)?;
        Ok(Self { a, b })
    }
}

impl Cdf for Uniform {
    fn name(&self) -> &'static str {
        "Uniform"
    }

    fn cdf(&self, x: f64) -> f64 {
        if x <= self.a {
            0.0
        } else if x >= self.b {
            1.0
        } else {
            (x - self.a) / (self.b - self.a)
        }
    }

    fn estimated_parameters(&self) -> u32 {
        2
    }
}

// ---------------------------------------------------------------------------
// Exponential
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Exponential {
    lambda: f64,
}

impl Exponential {
    pub fn new(lambda: f64) -> Result<Self> {
        require_finite("lambda", lambda)?;
        if lambda <= 0.0 {
            return Err(Error::Domain(format!(
                "exponential rate must be positive, got {lambda}"
            )));
        }
        Ok(Self { lambda })
    }

    /// Rate `1 / mean`.
    pub fn from_mean(mean: f64) -> Result<Self> {
        if mean <= 0.0 {
            return Err(Error::Domain(format!(
                "exponential mean must be positive, got {mean}"
            )));
        }
        Self::new(1.0 / mean)
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }
}

impl Cdf for Exponential {
    fn name(&self) -> &'static str {
        "Exponential"
    }

    fn cdf(&self, x: f64) -> f64 {
        if x < 0.0 {
            0.0
        } else {
            1.0 - (-self.lambda * x).exp()
        }
    }

    fn estimated_parameters(&self) -> u32 {
        1
    }
}

// ---------------------------------------------------------------------------
// Poisson
// ---------------------------------------------------------------------------

/// Half-width of the summation window in standard deviations. Mass outside
/// `λ ± 30√λ` is below `e^-450`.
const POISSON_WINDOW_SIGMAS: f64 = 30.0;

/// Extra terms above the window for small λ, where `30√λ` is only a few
/// integers.
const POISSON_WINDOW_SLACK: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Poisson {
    lambda: f64,
}

impl Poisson {
    pub fn new(lambda: f64) -> Result<Self> {
        require_finite("lambda", lambda)?;
        if lambda <= 0.0 {
            return Err(Error::Domain(format!(
                "poisson mean must be positive, got {lambda}"
            )));
        }
        Ok(Self { lambda })
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// P(X = k).
    ///
    /// Uses `e^-λ λ^k / k!` while that is representable and switches to
    /// `exp(k ln λ - λ - ln k!)` once it over- or underflows, or `k!` itself
    /// leaves the `f64` range.
    pub fn pmf(&self, k: u64) -> f64 {
        if k <= MAX_FACTORIAL {
            if let Some(f) = factorial(k) {
                let direct = (-self.lambda).exp() * self.lambda.powi(k as i32) / f;
                if direct.is_finite() && direct > 0.0 {
                    return direct;
                }
            }
        }
        self.log_pmf(k).exp()
    }

    pub fn log_pmf(&self, k: u64) -> f64 {
        k as f64 * self.lambda.ln() - self.lambda - ln_factorial(k)
    }

    /// Integers carrying non-negligible mass.
    fn window(&self) -> (u64, u64) {
        let spread = POISSON_WINDOW_SIGMAS * self.lambda.sqrt();
        let lo = (self.lambda - spread).floor().max(0.0) as u64;
        let hi = (self.lambda + spread + POISSON_WINDOW_SLACK).ceil() as u64;
        (lo, hi)
    }

    /// Sum of `pmf(k)` for `k` in `lo..=hi`, clipped to [`Poisson::window`].
    ///
    /// Starts from `pmf(lo)` and steps with `p(k) = p(k-1) λ / k`, falling
    /// back to `pmf(k)` while the running term is subnormal.
    fn sum_pmf(&self, lo: u64, hi: u64) -> f64 {
        let (first, last) = self.window();
        let lo = lo.max(first);
        let hi = hi.min(last);
        if lo > hi {
            return 0.0;
        }
        let mut term = self.pmf(lo);
        let mut sum = term;
        for k in lo + 1..=hi {
            term = if term >= f64::MIN_POSITIVE {
                term * self.lambda / k as f64
            } else {
                self.pmf(k)
            };
            sum += term;
        }
        sum
    }
}

/// Largest integer strictly below `x`, for `x > 0`.
fn last_integer_below(x: f64) -> u64 {
    (x.ceil() - 1.0) as u64
}

impl Cdf for Poisson {
    fn name(&self) -> &'static str {
        "Poisson"
    }

    /// Sum of `pmf(k)` for `k` in `0..=floor(x)`.
    fn cdf(&self, x: f64) -> f64 {
        if !(x >= 0.0) {
            return 0.0;
        }
        self.sum_pmf(0, x.floor() as u64).min(1.0)
    }

    /// Sum of `pmf(k)` for `k < x`, so an integer on an edge belongs to the
    /// interval that starts there.
    fn cdf_below(&self, x: f64) -> f64 {
        if !(x > 0.0) {
            return 0.0;
        }
        self.sum_pmf(0, last_integer_below(x)).min(1.0)
    }

    fn mass(&self, left: f64, right: f64) -> f64 {
        if !(right > 0.0) || !(right > left) {
            return 0.0;
        }
        let lo = left.max(0.0).ceil() as u64;
        let hi = last_integer_below(right);
        if lo > hi {
            return 0.0;
        }
        self.sum_pmf(lo, hi).min(1.0)
    }

    fn estimated_parameters(&self) -> u32 {
        1
    }
}

// ---------------------------------------------------------------------------
// Distribution
// ---------------------------------------------------------------------------

/// One fitted candidate with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "distribution")]
pub enum Distribution {
    Normal(Normal),
    Uniform(Uniform),
    Exponential(Exponential),
    Poisson(Poisson),
}

impl Distribution {
    fn as_cdf(&self) -> &dyn Cdf {
        match self {
            Self::Normal(d) => d,
            Self::Uniform(d) => d,
            Self::Exponential(d) => d,
            Self::Poisson(d) => d,
        }
    }
}

impl Cdf for Distribution {
    fn name(&self) -> &'static str {
        self.as_cdf().name()
    }

    fn cdf(&self, x: f64) -> f64 {
        self.as_cdf().cdf(x)
    }

    fn cdf_below(&self, x: f64) -> f64 {
        self.as_cdf().cdf_below(x)
    }

    fn mass(&self, left: f64, right: f64) -> f64 {
        self.as_cdf().mass(left, right)
    }

    fn estimated_parameters(&self) -> u32 {
        self.as_cdf().estimated_parameters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statrs::distribution::{ContinuousCDF, DiscreteCDF};

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn test_constructors_reject_degenerate_parameters() {
        assert!(matches!(Normal::new(0.0, 0.0), Err(Error::Domain(_))));
        assert!(matches!(Normal::new(0.0, -1.0), Err(Error::Domain(_))));
        assert!(matches!(Normal::new(f64::NAN, 1.0), Err(Error::Domain(_))));
        assert!(matches!(Uniform::new(1.0, 1.0), Err(Error::Domain(_))));
        assert!(matches!(Uniform::new(2.0, 1.0), Err(Error::Domain(_))));
        assert!(matches!(Uniform::new(-1e308, 1e308), Err(Error::Domain(_))));
        assert!(matches!(Exponential::new(0.0), Err(Error::Domain(_))));
        assert!(matches!(Exponential::from_mean(-3.0), Err(Error::Domain(_))));
        assert!(matches!(Poisson::new(-0.5), Err(Error::Domain(_))));
        assert!(matches!(Poisson::new(f64::INFINITY), Err(Error::Domain(_))));
    }

    #[test]
    fn test_estimated_parameters() {
        let d = Distribution::Normal(Normal::new(0.0, 1.0).unwrap());
        assert_eq!(d.estimated_parameters(), 2);
        let d = Distribution::Uniform(Uniform::new(0.0, 1.0).unwrap());
        assert_eq!(d.estimated_parameters(), 2);
        let d = Distribution::Exponential(Exponential::new(1.0).unwrap());
        assert_eq!(d.estimated_parameters(), 1);
        let d = Distribution::Poisson(Poisson::new(1.0).unwrap());
        assert_eq!(d.estimated_parameters(), 1);
        assert_eq!(d.name(), "Poisson");
    }

    // -----------------------------------------------------------------------
    // Continuous
    // -----------------------------------------------------------------------

    #[test]
    fn test_normal_matches_statrs() {
        let ours = Normal::new(3.0, 4.0).unwrap();
        let theirs = statrs::distribution::Normal::new(3.0, 2.0).unwrap();
        for i in -40..=40 {
            let x = 3.0 + i as f64 * 0.25;
            assert!((ours.cdf(x) - theirs.cdf(x)).abs() < 1e-12, "x={x}");
        }
    }

    #[test]
    fn test_uniform_ramp_and_clamp() {
        let u = Uniform::new(2.0, 6.0).unwrap();
        assert_eq!(u.cdf(-10.0), 0.0);
        assert_eq!(u.cdf(2.0), 0.0);
        assert!((u.cdf(3.0) - 0.25).abs() < 1e-15);
        assert_eq!(u.cdf(6.0), 1.0);
        assert_eq!(u.cdf(60.0), 1.0);
    }

    #[test]
    fn test_exponential_from_mean() {
        let e = Exponential::from_mean(2.0).unwrap();
        assert!((e.lambda() - 0.5).abs() < 1e-15);
        assert_eq!(e.cdf(-1.0), 0.0);
        assert_eq!(e.cdf(0.0), 0.0);
        assert!((e.cdf(2.0) - (1.0 - (-1.0f64).exp())).abs() < 1e-15);
    }

    #[test]
    fn test_cdfs_are_monotone() {
        let candidates = [
            Distribution::Normal(Normal::new(1.0, 2.0).unwrap()),
            Distribution::Uniform(Uniform::new(-1.0, 3.0).unwrap()),
            Distribution::Exponential(Exponential::new(0.7).unwrap()),
            Distribution::Poisson(Poisson::new(2.5).unwrap()),
        ];
        for d in candidates {
            let mut last = 0.0;
            for i in -50..200 {
                let p = d.cdf(i as f64 * 0.1);
                assert!((0.0..=1.0).contains(&p));
                assert!(p >= last - 1e-15, "{} not monotone at {i}", d.name());
                last = p;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Poisson
    // -----------------------------------------------------------------------

    #[test]
    fn test_poisson_matches_statrs() {
        for lambda in [0.5, 4.0, 30.0, 150.0, 400.0] {
            let ours = Poisson::new(lambda).unwrap();
            let theirs = statrs::distribution::Poisson::new(lambda).unwrap();
            for frac in [0.0, 0.3, 0.8, 1.0, 1.2, 1.6, 2.5] {
                let x = (lambda * frac).floor();
                let a = ours.cdf(x);
                let b = theirs.cdf(x as u64);
                assert!((a - b).abs() < 1e-8, "lambda={lambda} x={x}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn test_poisson_cdf_uses_floor() {
        let p = Poisson::new(3.0).unwrap();
        assert_eq!(p.cdf(2.0), p.cdf(2.9));
        assert!(p.cdf(3.0) > p.cdf(2.9));
        assert_eq!(p.cdf(-0.1), 0.0);
    }

    #[test]
    fn test_poisson_pmf_continuous_across_factorial_limit() {
        // k = 170 is still computed directly, k = 171 in log space.
        let p = Poisson::new(20.0).unwrap();
        let below = p.pmf(MAX_FACTORIAL);
        let above = p.pmf(MAX_FACTORIAL + 1);
        assert!(below > 0.0 && above > 0.0);
        let ratio = above / below;
        let expected = 20.0 / (MAX_FACTORIAL + 1) as f64;
        assert!(((ratio - expected) / expected).abs() < 1e-8);
    }

    #[test]
    fn test_poisson_large_lambda_switches_to_log_space() {
        // e^-800 underflows, so the leading terms go through the log path.
        let p = Poisson::new(800.0).unwrap();
        let theirs = statrs::distribution::Poisson::new(800.0).unwrap();
        assert!((-800.0f64).exp() == 0.0);
        for k in [700u64, 800, 900] {
            assert!((p.cdf(k as f64) - theirs.cdf(k)).abs() < 1e-7, "k={k}");
        }
    }

    #[test]
    fn test_poisson_far_tail_terminates() {
        let p = Poisson::new(2.0).unwrap();
        assert!((p.cdf(1e15) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_poisson_edges_are_left_continuous() {
        let p = Poisson::new(4.0).unwrap();
        // An integer edge is excluded from below and included from above.
        assert_eq!(p.cdf_below(3.0), p.cdf(2.0));
        assert_eq!(p.cdf_below(3.25), p.cdf(3.0));
        assert_eq!(p.cdf_below(0.0), 0.0);
        assert!((p.mass(3.0, 4.0) - p.pmf(3)).abs() < 1e-15);
        assert!((p.mass(3.0, 3.5) - p.pmf(3)).abs() < 1e-15);
        assert_eq!(p.mass(3.25, 3.75), 0.0);
        assert!((p.mass(2.0, 6.0) - (p.cdf_below(6.0) - p.cdf_below(2.0))).abs() < 1e-14);

        let d = Distribution::Poisson(p);
        assert_eq!(d.cdf_below(3.0), p.cdf_below(3.0));
        assert_eq!(d.mass(3.0, 4.0), p.mass(3.0, 4.0));
    }

    #[test]
    fn test_continuous_edges_match_cdf() {
        let n = Normal::new(0.0, 1.0).unwrap();
        assert_eq!(n.cdf_below(0.5), n.cdf(0.5));
        assert!((n.mass(-1.0, 1.0) - (n.cdf(1.0) - n.cdf(-1.0))).abs() < 1e-15);
    }

    #[test]
    fn test_poisson_large_lambda_is_fast() {
        let lambda = 1e6;
        let ours = Poisson::new(lambda).unwrap();
        let sd = lambda.sqrt();
        let xs: Vec<f64> = (-100..=100)
            .map(|i| (lambda + i as f64 * 0.05 * sd).floor())
            .collect();

        let start = std::time::Instant::now();
        let values: Vec<f64> = xs.iter().map(|&x| ours.cdf(x)).collect();
        let below = ours.cdf(lambda - 100.0 * sd);
        let above = ours.cdf(3.0 * lambda);
        let elapsed = start.elapsed();
        assert!(elapsed < std::time::Duration::from_secs(5), "took {elapsed:?}");

        let theirs = statrs::distribution::Poisson::new(lambda).unwrap();
        for (&x, &a) in xs.iter().zip(&values) {
            assert!((a - theirs.cdf(x as u64)).abs() < 1e-6, "x={x}");
        }
        assert_eq!(below, 0.0);
        assert!((above - 1.0).abs() < 1e-6);
    }
}
