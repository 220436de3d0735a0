//! Segment selection: pull comparison samples out of the record stream.

use crate::{
    billing::BillingRecord,
    config::{Measure, RegionConfig},
};

pub fn measure_value(record: &BillingRecord, measure: Measure) -> f64 {
    match measure {
        Measure::TotalMonthlyCost => record.total_monthly_cost,
        Measure::MonthlyFee => record.monthly_fee,
    }
}

pub fn plan_sample(records: &[BillingRecord], plan_name: &str, measure: Measure) -> Vec<f64> {
    records
        .iter()
        .filter(|r| r.plan_name.as_str() == plan_name)
        .map(|r| measure_value(r, measure))
        .collect()
}

/// Case-insensitive substring match against any of the region's patterns.
pub fn in_region(city: &str, region: &RegionConfig) -> bool {
    let city = city.to_lowercase();
    region
        .city_patterns
        .iter()
        .any(|p| city.contains(&p.to_lowercase()))
}

/// Split the records into (inside region, outside region) samples.
pub fn region_samples(
    records: &[BillingRecord],
    region: &RegionConfig,
    measure: Measure,
) -> (Vec<f64>, Vec<f64>) {
    let (inside, outside): (Vec<&BillingRecord>, Vec<&BillingRecord>) =
        records.iter().partition(|r| in_region(&r.city, region));
    (
        inside.into_iter().map(|r| measure_value(r, measure)).collect(),
        outside.into_iter().map(|r| measure_value(r, measure)).collect(),
    )
}
