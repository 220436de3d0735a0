use crate::types::{PlanName, YearMonth};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File names of the five input tables, relative to the data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceFiles {
    pub calls:    String,
    pub internet: String,
    pub messages: String,
    pub plans:    String,
    pub users:    String,
}

impl Default for SourceFiles {
    fn default() -> Self {
        Self {
            calls:    "megaline_calls.csv".into(),
            internet: "megaline_internet.csv".into(),
            messages: "megaline_messages.csv".into(),
            plans:    "megaline_plans.csv".into(),
            users:    "megaline_users.csv".into(),
        }
    }
}

/// Two plans compared side by side (hypothesis test, what-if calculator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanPair {
    pub first:  PlanName,
    pub second: PlanName,
}

/// A geographic segment: cities whose name contains any pattern,
/// compared case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    pub label:         String,
    pub city_patterns: Vec<String>,
}

/// Which per-record value the hypothesis tests compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    TotalMonthlyCost,
    MonthlyFee,
}

/// What the billing engine does with a usage row whose user or plan is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityPolicy {
    /// Fail the whole run on the first miss.
    Abort,
    /// Drop offending rows, count them on the run and log the count.
    Exclude,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NormalParams {
    pub mean: f64,
    pub std:  f64,
}

/// Monthly usage distribution for subscribers of one plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageProfile {
    pub plan:     PlanName,
    pub share:    f64,
    pub minutes:  NormalParams,
    pub messages: NormalParams,
    pub data_mb:  NormalParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub seed:               u64,
    pub users:              usize,
    pub first_month:        YearMonth,
    pub last_month:         YearMonth,
    pub cities:             Vec<String>,
    pub churn_probability:  f64,
    pub churn_window_start: NaiveDate,
    pub churn_window_days:  u64,
    pub profiles:           Vec<UsageProfile>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            users: 500,
            first_month: YearMonth { year: 2019, month: 1 },
            last_month: YearMonth { year: 2019, month: 6 },
            cities: [
                "New York",
                "Chicago",
                "Boston",
                "Los Angeles",
                "Miami",
                "Jersey City",
                "San Francisco",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            churn_probability: 0.2,
            churn_window_start: NaiveDate::from_ymd_opt(2019, 1, 1).unwrap_or(NaiveDate::MIN),
            churn_window_days: 180,
            profiles: vec![
                UsageProfile {
                    plan: "surf".into(),
                    share: 0.6,
                    minutes: NormalParams { mean: 450.0, std: 100.0 },
                    messages: NormalParams { mean: 40.0, std: 15.0 },
                    data_mb: NormalParams { mean: 13_000.0, std: 4_000.0 },
                },
                UsageProfile {
                    plan: "ultimate".into(),
                    share: 0.4,
                    minutes: NormalParams { mean: 1_500.0, std: 500.0 },
                    messages: NormalParams { mean: 400.0, std: 200.0 },
                    data_mb: NormalParams { mean: 25_000.0, std: 7_000.0 },
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sources:            SourceFiles,
    pub date_format:        String,
    pub alpha:              f64,
    pub plan_comparison:    PlanPair,
    pub calculator_plans:   PlanPair,
    pub region:             RegionConfig,
    pub comparison_measure: Measure,
    pub integrity_policy:   IntegrityPolicy,
    pub synthetic:          SyntheticConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: SourceFiles::default(),
            date_format: "%Y-%m-%d".into(),
            alpha: 0.05,
            plan_comparison: PlanPair {
                first:  "ultimate".into(),
                second: "surf".into(),
            },
            calculator_plans: PlanPair {
                first:  "surf".into(),
                second: "ultimate".into(),
            },
            region: RegionConfig {
                label: "NY-NJ".into(),
                city_patterns: vec!["new york".into(), "jersey".into()],
            },
            comparison_measure: Measure::TotalMonthlyCost,
            integrity_policy: IntegrityPolicy::Abort,
            synthetic: SyntheticConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load `pipeline.json` from the data directory.
    /// A missing file means defaults; missing keys fall back field by field.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/pipeline.json");
        if !Path::new(&path).exists() {
            log::debug!("config: {path} not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        if !(0.0..1.0).contains(&config.alpha) || config.alpha == 0.0 {
            anyhow::bail!("alpha must be in (0, 1), got {}", config.alpha);
        }
        Ok(config)
    }

    /// Config with a small synthetic population for use in tests.
    pub fn default_test() -> Self {
        let mut config = Self::default();
        config.synthetic.seed = 7;
        config.synthetic.users = 60;
        config
    }
}
