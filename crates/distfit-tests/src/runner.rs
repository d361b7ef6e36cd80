//! Test runner: every applicable hypothesis, concurrently, then a verdict.
//!
//! Once both passes are done the histogram and statistics are read-only, so
//! each hypothesis runs on its own scoped thread without further locking.
//! A hypothesis that cannot be built or tested becomes an
//! [`Outcome::Unavailable`] row and never affects its siblings.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use distfit_core::{FirstPassResult, Result, SecondPassResult};

use crate::cdf::{Cdf, Distribution, Exponential, Normal, Poisson, Uniform};
use crate::chisquare::{ChiSquareResult, chi_square_test};

/// The candidate families, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Hypothesis {
    Normal,
    Uniform,
    Exponential,
    Poisson,
}

impl Hypothesis {
    pub const ALL: [Hypothesis; 4] = [
        Hypothesis::Normal,
        Hypothesis::Uniform,
        Hypothesis::Exponential,
        Hypothesis::Poisson,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Uniform => "Uniform",
            Self::Exponential => "Exponential",
            Self::Poisson => "Poisson",
        }
    }

    /// Why this family cannot describe the data, if it cannot.
    pub fn inapplicable_reason(self, first: &FirstPassResult) -> Option<&'static str> {
        match self {
            Self::Normal | Self::Uniform => None,
            Self::Exponential if first.min < 0.0 => Some("data has negative values"),
            Self::Exponential => None,
            Self::Poisson if !first.all_integers => Some("data is not integer-valued"),
            Self::Poisson if first.min < 0.0 => Some("data has negative values"),
            Self::Poisson => None,
        }
    }

    /// Fit the family's parameters to the pass results.
    pub fn fit(self, first: &FirstPassResult, second: &SecondPassResult) -> Result<Distribution> {
        Ok(match self {
            Self::Normal => Distribution::Normal(Normal::new(first.mean, second.variance)?),
            Self::Uniform => Distribution::Uniform(Uniform::new(first.min, first.max)?),
            Self::Exponential => Distribution::Exponential(Exponential::from_mean(first.mean)?),
            Self::Poisson => Distribution::Poisson(Poisson::new(first.mean)?),
        })
    }
}

impl fmt::Display for Hypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Tested {
        hypothesis: Hypothesis,
        parameters: Distribution,
        result: ChiSquareResult,
    },
    /// The data rules this family out before any test.
    Skipped {
        hypothesis: Hypothesis,
        reason: String,
    },
    /// Fitting or testing failed, e.g. zero variance.
    Unavailable {
        hypothesis: Hypothesis,
        reason: String,
    },
}

impl Outcome {
    pub fn hypothesis(&self) -> Hypothesis {
        match self {
            Self::Tested { hypothesis, .. }
            | Self::Skipped { hypothesis, .. }
            | Self::Unavailable { hypothesis, .. } => *hypothesis,
        }
    }

    pub fn result(&self) -> Option<&ChiSquareResult> {
        match self {
            Self::Tested { result, .. } => Some(result),
            _ => None,
        }
    }
}

/// Ranking order: higher p-value first. On equal p-values, a positive df
/// beats a negative one; otherwise the smaller statistic wins.
pub fn compare_results(a: &ChiSquareResult, b: &ChiSquareResult) -> Ordering {
    b.p_value
        .partial_cmp(&a.p_value)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            if a.degrees_of_freedom.signum() * b.degrees_of_freedom.signum() < 0 {
                b.degrees_of_freedom.cmp(&a.degrees_of_freedom)
            } else {
                a.statistic
                    .partial_cmp(&b.statistic)
                    .unwrap_or(Ordering::Equal)
            }
        })
}

/// Tested results, best first.
pub fn rank(outcomes: &[Outcome]) -> Vec<&ChiSquareResult> {
    let mut ranked: Vec<&ChiSquareResult> = outcomes.iter().filter_map(Outcome::result).collect();
    ranked.sort_by(|a, b| compare_results(a, b));
    ranked
}

/// What the battery concluded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    /// Exactly one family accepted.
    Accepted { distribution: String, p_value: f64 },
    /// Several families accepted; `best` ranks first.
    Ambiguous {
        accepted: Vec<String>,
        best: String,
        p_value: f64,
    },
    /// Every tested family rejected; `closest` ranks first.
    NoneAccepted { closest: String, p_value: f64 },
    /// Nothing could be tested.
    Unavailable,
}

impl Verdict {
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        let ranked = rank(outcomes);
        let Some(best) = ranked.first() else {
            return Self::Unavailable;
        };
        let accepted: Vec<String> = ranked
            .iter()
            .filter(|r| r.accepted)
            .map(|r| r.distribution.clone())
            .collect();
        match accepted.len() {
            0 => Self::NoneAccepted {
                closest: best.distribution.clone(),
                p_value: best.p_value,
            },
            1 => Self::Accepted {
                distribution: best.distribution.clone(),
                p_value: best.p_value,
            },
            _ => Self::Ambiguous {
                accepted,
                best: best.distribution.clone(),
                p_value: best.p_value,
            },
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted {
                distribution,
                p_value,
            } => write!(
                f,
                "The data is consistent with a {distribution} distribution (p = {p_value:.4})."
            ),
            Self::Ambiguous {
                accepted,
                best,
                p_value,
            } => write!(
                f,
                "Ambiguous: {} distributions accepted ({}); the best fit is {best} (p = {p_value:.4}).",
                accepted.len(),
                accepted.join(", ")
            ),
            Self::NoneAccepted { closest, p_value } => write!(
                f,
                "No candidate distribution was accepted; the closest is {closest} (p = {p_value:.4})."
            ),
            Self::Unavailable => f.write_str("No candidate distribution could be tested."),
        }
    }
}

/// Runs the chi-square battery over finished pass results.
#[derive(Debug, Clone, Copy)]
pub struct TestRunner {
    critical_p_value: f64,
    hypotheses: &'static [Hypothesis],
}

impl TestRunner {
    pub fn new(critical_p_value: f64) -> Self {
        Self {
            critical_p_value,
            hypotheses: &Hypothesis::ALL,
        }
    }

    /// Restrict the battery to `hypotheses`.
    pub fn with_hypotheses(mut self, hypotheses: &'static [Hypothesis]) -> Self {
        self.hypotheses = hypotheses;
        self
    }

    pub fn critical_p_value(&self) -> f64 {
        self.critical_p_value
    }

    fn test_one(
        &self,
        hypothesis: Hypothesis,
        first: &FirstPassResult,
        second: &SecondPassResult,
    ) -> Outcome {
        let tested = hypothesis.fit(first, second).and_then(|parameters| {
            let result = chi_square_test(
                &second.histogram,
                &parameters,
                parameters.estimated_parameters(),
                self.critical_p_value,
            )?;
            Ok((parameters, result))
        });
        match tested {
            Ok((parameters, result)) => Outcome::Tested {
                hypothesis,
                parameters,
                result,
            },
            Err(e) => {
                log::warn!("{hypothesis} unavailable: {e}");
                Outcome::Unavailable {
                    hypothesis,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Test every hypothesis, each on its own thread. Rows come back in
    /// hypothesis order.
    pub fn run(&self, first: &FirstPassResult, second: &SecondPassResult) -> Vec<Outcome> {
        std::thread::scope(|s| {
            let handles: Vec<_> = self
                .hypotheses
                .iter()
                .map(|&hypothesis| {
                    let reason = hypothesis.inapplicable_reason(first);
                    let handle = match reason {
                        None => Some(s.spawn(move || self.test_one(hypothesis, first, second))),
                        Some(_) => None,
                    };
                    (hypothesis, reason, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(hypothesis, reason, handle)| match (reason, handle) {
                    (_, Some(handle)) => handle.join().unwrap_or_else(|_| {
                        log::error!("{hypothesis} test panicked");
                        Outcome::Unavailable {
                            hypothesis,
                            reason: "test panicked".into(),
                        }
                    }),
                    (reason, None) => Outcome::Skipped {
                        hypothesis,
                        reason: reason.unwrap_or_default().to_string(),
                    },
                })
                .collect()
        })
    }
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new(distfit_core::config::DEFAULT_CRITICAL_P_VALUE)
    }
}
