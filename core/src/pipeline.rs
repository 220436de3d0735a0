//! The pipeline: one batch pass from snapshot to billing records.
//!
//! STAGE ORDER (fixed):
//!   1. Monthly aggregator  (normalized events -> user-month usage)
//!   2. Billing engine      (usage + users + rate table -> records)
//!   3. Comparator          (on request, over the record stream)
//!
//! RULES:
//!   - Every stage reads the snapshot by reference and never mutates it.
//!   - Running twice on the same snapshot yields identical records.
//!   - Churn filtering happens after billing, at the caller's request.

use crate::{
    aggregator::{aggregate, MonthlyUsage},
    billing::{BillingEngine, BillingRecord},
    comparator::{welch_t_test, Comparison},
    config::{Measure, PipelineConfig},
    error::PipelineResult,
    segments::{plan_sample, region_samples},
    snapshot::DatasetSnapshot,
    stats::mean,
    types::RunId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id:        RunId,
    pub monthly_usage: Vec<MonthlyUsage>,
    pub records:       Vec<BillingRecord>,
    pub excluded_rows: usize,
}

impl PipelineRun {
    /// Records for months that do not start after the user's churn date.
    pub fn active_records(&self) -> Vec<BillingRecord> {
        self.records.iter().filter(|r| r.is_active()).cloned().collect()
    }
}

/// One hypothesis test with the sample summaries the dashboard shows beside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub label_a: String,
    pub label_b: String,
    pub measure: Measure,
    pub n_a:     usize,
    pub n_b:     usize,
    pub mean_a:  Option<f64>,
    pub mean_b:  Option<f64>,
    pub result:  Comparison,
}

impl Hypothesis {
    fn from_samples(label_a: String, label_b: String, measure: Measure, a: &[f64], b: &[f64], alpha: f64) -> Self {
        Self {
            label_a,
            label_b,
            measure,
            n_a: a.len(),
            n_b: b.len(),
            mean_a: mean(a),
            mean_b: mean(b),
            result: welch_t_test(a, b, alpha),
        }
    }
}

pub struct Pipeline<'a> {
    snapshot: &'a DatasetSnapshot,
    config:   &'a PipelineConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(snapshot: &'a DatasetSnapshot, config: &'a PipelineConfig) -> Self {
        Self { snapshot, config }
    }

    pub fn run(&self) -> PipelineResult<PipelineRun> {
        let run_id = format!("run-{}", uuid::Uuid::new_v4());

        let monthly_usage = aggregate(&self.snapshot.events);

        let engine = BillingEngine::new(
            &self.snapshot.users,
            &self.snapshot.rate_table,
            self.config.integrity_policy,
        );
        let billed = engine.bill(&monthly_usage)?;

        log::info!(
            "{run_id}: {} user-months billed, {} excluded",
            billed.records.len(),
            billed.excluded_rows
        );

        Ok(PipelineRun {
            run_id,
            monthly_usage,
            records: billed.records,
            excluded_rows: billed.excluded_rows,
        })
    }
}

/// First plan vs second plan on the configured measure.
pub fn compare_plans(records: &[BillingRecord], config: &PipelineConfig) -> Hypothesis {
    let measure = config.comparison_measure;
    let pair = &config.plan_comparison;
    let a = plan_sample(records, pair.first.as_str(), measure);
    let b = plan_sample(records, pair.second.as_str(), measure);
    Hypothesis::from_samples(pair.first.to_string(), pair.second.to_string(), measure, &a, &b, config.alpha)
}

/// Configured region vs every other city on the configured measure.
pub fn compare_regions(records: &[BillingRecord], config: &PipelineConfig) -> Hypothesis {
    let measure = config.comparison_measure;
    let (inside, outside) = region_samples(records, &config.region, measure);
    Hypothesis::from_samples(
        config.region.label.clone(),
        "other regions".into(),
        measure,
        &inside,
        &outside,
        config.alpha,
    )
}
