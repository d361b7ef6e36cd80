//! Special functions behind the chi-square p-value.
//!
//! - [`normal_z_probability`]: lower-tail standard normal probability,
//!   ACM Algorithm 209 (Ibbetson 1963).
//! - [`chi_square_p_value`]: upper-tail chi-square probability for integer
//!   degrees of freedom, ACM Algorithm 299 (Hill & Pike 1967). Even `df`
//!   is a closed-form incomplete-gamma series; odd `df` adds a normal-tail
//!   term from Algorithm 209.
//! - [`ln_factorial`]: exact below the factorial overflow point, Ramanujan's
//!   asymptotic expansion above it.

use std::f64::consts::PI;
use std::sync::OnceLock;

/// Beyond this |z| the normal tail is treated as exactly 0 or 1.
const Z_MAX: f64 = 6.0;

/// `exp(x)` below `-BIGX` is flushed to zero.
const BIGX: f64 = 20.0;

const LOG_SQRT_PI: f64 = 0.572_364_942_924_700_087_071_713_5;
const I_SQRT_PI: f64 = 0.564_189_583_547_756_286_948_079_5;

/// Largest `n` with `n!` representable as a finite `f64`.
pub const MAX_FACTORIAL: u64 = 170;

fn ex(x: f64) -> f64 {
    if x < -BIGX { 0.0 } else { x.exp() }
}

/// P(Z <= z) for a standard normal Z.
pub fn normal_z_probability(z: f64) -> f64 {
    let x = if z == 0.0 {
        0.0
    } else {
        let mut y = 0.5 * z.abs();
        if y >= Z_MAX * 0.5 {
            1.0
        } else if y < 1.0 {
            let w = y * y;
            ((((((((0.000_124_818_987 * w - 0.001_075_204_047) * w + 0.005_198_775_019) * w
                - 0.019_198_292_004)
                * w
                + 0.059_054_035_642)
                * w
                - 0.151_968_751_364)
                * w
                + 0.319_152_932_694)
                * w
                - 0.531_923_007_300)
                * w
                + 0.797_884_560_593)
                * y
                * 2.0
        } else {
            y -= 2.0;
            (((((((((((((-0.000_045_255_659 * y + 0.000_152_529_290) * y - 0.000_019_538_132)
                * y
                - 0.000_676_904_986)
                * y
                + 0.001_390_604_284)
                * y
                - 0.000_794_620_820)
                * y
                - 0.002_034_254_874)
                * y
                + 0.006_549_791_214)
                * y
                - 0.010_557_625_006)
                * y
                + 0.011_630_447_319)
                * y
                - 0.009_279_453_341)
                * y
                + 0.005_353_579_108)
                * y
                - 0.002_141_268_741)
                * y
                + 0.000_535_310_849)
                * y
                + 0.999_936_657_524
        }
    };
    if z > 0.0 {
        (x + 1.0) * 0.5
    } else {
        (1.0 - x) * 0.5
    }
}

/// Upper-tail probability of a chi-square statistic `x` with `df` degrees
/// of freedom.
///
/// Returns 0 when `df < 1` or `x <= 0`: neither describes a usable test.
pub fn chi_square_p_value(x: f64, df: i64) -> f64 {
    if !(x > 0.0) || df < 1 {
        return 0.0;
    }
    let a = 0.5 * x;
    let even = df % 2 == 0;
    let y = if df > 1 { ex(-a) } else { 0.0 };
    let mut s = if even {
        y
    } else {
        2.0 * normal_z_probability(-x.sqrt())
    };
    if df <= 2 {
        return s.clamp(0.0, 1.0);
    }

    let limit = 0.5 * (df as f64 - 1.0);
    let mut z = if even { 1.0 } else { 0.5 };
    let p = if a > BIGX {
        // Log space: y has underflowed.
        let mut e = if even { 0.0 } else { LOG_SQRT_PI };
        let c = a.ln();
        while z <= limit {
            e += z.ln();
            s += ex(c * z - a - e);
            z += 1.0;
        }
        s
    } else {
        let mut e = if even { 1.0 } else { I_SQRT_PI / a.sqrt() };
        let mut c = 0.0;
        while z <= limit {
            e *= a / z;
            c += e;
            z += 1.0;
        }
        c * y + s
    };
    p.clamp(0.0, 1.0)
}

fn factorial_table() -> &'static [f64] {
    static TABLE: OnceLock<Vec<f64>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = Vec::with_capacity(MAX_FACTORIAL as usize + 1);
        let mut f = 1.0;
        table.push(f);
        for k in 1..=MAX_FACTORIAL {
            f *= k as f64;
            table.push(f);
        }
        table
    })
}

/// `n!` for `n <= MAX_FACTORIAL`, `None` beyond.
pub fn factorial(n: u64) -> Option<f64> {
    factorial_table().get(n as usize).copied()
}

/// Ramanujan's approximation to `ln(n!)`.
pub fn ln_factorial_ramanujan(n: u64) -> f64 {
    if n < 2 {
        return 0.0;
    }
    let n = n as f64;
    n * n.ln() - n + (n * (1.0 + 4.0 * n * (1.0 + 2.0 * n))).ln() / 6.0 + 0.5 * PI.ln()
}

/// `ln(n!)`: exact from the table while it lasts, asymptotic after.
pub fn ln_factorial(n: u64) -> f64 {
    match factorial(n) {
        Some(f) => f.ln(),
        None => ln_factorial_ramanujan(n),
    }
}
