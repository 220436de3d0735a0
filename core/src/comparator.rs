//! Statistical comparator: Welch's unequal-variance t-test.
//!
//! Each call is an independent two-sided test at the given alpha. No
//! multiple-comparison correction is applied across calls.
//!
//! Samples too small or without spread produce `Comparison::InsufficientData`
//! rather than an error or a NaN statistic.

use crate::stats::{mean, sample_variance, student_t_two_sided};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ALPHA: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleSide {
    A,
    B,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelchTest {
    pub statistic:          f64,
    pub degrees_of_freedom: f64,
    pub p_value:            f64,
    pub alpha:              f64,
    pub reject_null:        bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Comparison {
    Tested(WelchTest),
    InsufficientData { sample: SampleSide, reason: String },
}

impl Comparison {
    pub fn test(&self) -> Option<&WelchTest> {
        match self {
            Self::Tested(t) => Some(t),
            Self::InsufficientData { .. } => None,
        }
    }

    pub fn rejects_null(&self) -> bool {
        self.test().map(|t| t.reject_null).unwrap_or(false)
    }
}

/// Why a single sample cannot enter the test, if it cannot.
fn sample_problem(values: &[f64]) -> Option<String> {
    if values.iter().any(|v| !v.is_finite()) {
        return Some("sample contains non-finite values".into());
    }
    if values.len() < 2 {
        return Some(format!("need at least 2 observations, got {}", values.len()));
    }
    // Compare values, not the variance: rounding leaves a constant sample
    // like [0.1, 0.1, 0.1] with a tiny non-zero variance.
    if values.windows(2).all(|w| w[0] == w[1]) {
        return Some("sample has zero variance".into());
    }
    match sample_variance(values) {
        Some(v) if v.is_finite() => None,
        _ => Some("sample variance is not finite".into()),
    }
}

pub fn welch_t_test(a: &[f64], b: &[f64], alpha: f64) -> Comparison {
    match (sample_problem(a), sample_problem(b)) {
        (Some(ra), Some(rb)) => {
            return Comparison::InsufficientData {
                sample: SampleSide::Both,
                reason: format!("insufficient data for comparison: A: {ra}; B: {rb}"),
            }
        }
        (Some(r), None) => {
            return Comparison::InsufficientData {
                sample: SampleSide::A,
                reason: format!("insufficient data for comparison: {r}"),
            }
        }
        (None, Some(r)) => {
            return Comparison::InsufficientData {
                sample: SampleSide::B,
                reason: format!("insufficient data for comparison: {r}"),
            }
        }
        (None, None) => {}
    }

    let (Some(mean_a), Some(mean_b), Some(var_a), Some(var_b)) =
        (mean(a), mean(b), sample_variance(a), sample_variance(b))
    else {
        return Comparison::InsufficientData {
            sample: SampleSide::Both,
            reason: "insufficient data for comparison".into(),
        };
    };

    let n_a = a.len() as f64;
    let n_b = b.len() as f64;
    let se_a = var_a / n_a;
    let se_b = var_b / n_b;

    let statistic = (mean_a - mean_b) / (se_a + se_b).sqrt();
    let degrees_of_freedom =
        (se_a + se_b).powi(2) / (se_a.powi(2) / (n_a - 1.0) + se_b.powi(2) / (n_b - 1.0));
    let p_value = student_t_two_sided(statistic, degrees_of_freedom);

    if !(statistic.is_finite() && degrees_of_freedom.is_finite() && p_value.is_finite()) {
        return Comparison::InsufficientData {
            sample: SampleSide::Both,
            reason: "insufficient data for comparison: test statistic is not finite".into(),
        };
    }

    Comparison::Tested(WelchTest {
        statistic,
        degrees_of_freedom,
        p_value,
        alpha,
        reject_null: p_value < alpha,
    })
}
