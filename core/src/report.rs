//! Dashboard report: every table and figure the front-end renders,
//! computed from one pipeline run.
//!
//! Pure consumer of billing records: nothing here feeds back into billing.

use crate::{
    billing::BillingRecord,
    config::PipelineConfig,
    pipeline::{compare_plans, compare_regions, Hypothesis, PipelineRun},
    rate_table::{Plan, MB_PER_GB},
    snapshot::DatasetSnapshot,
    stats::{describe, mean, sample_variance, Describe},
    types::{PlanName, RunId, UserId, YearMonth},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub total_users:              usize,
    pub churned_users:            usize,
    /// Percentage of users with a churn date.
    pub churn_rate_pct:           f64,
    pub billed_user_months:       usize,
    pub excluded_rows:            usize,
    /// Mean bill across all user-months.
    pub avg_monthly_income:       Option<f64>,
    /// Mean over months of the month's total billed revenue.
    pub avg_total_monthly_income: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Count<K> {
    pub key:   K,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub plan_name:          PlanName,
    pub user_months:        usize,
    pub minutes:            Option<Describe>,
    pub messages:           Option<Describe>,
    pub data_gb:            Option<Describe>,
    pub total_monthly_cost: Option<Describe>,
    /// Share of user-months with any overage charge.
    pub overage_share:      f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPlanRow {
    pub month:             YearMonth,
    pub plan_name:         PlanName,
    pub user_months:       usize,
    pub avg_minutes:       f64,
    pub var_minutes:       Option<f64>,
    pub avg_messages:      f64,
    pub var_messages:      Option<f64>,
    pub avg_usage_mb:      f64,
    pub var_usage_mb:      Option<f64>,
    pub revenue:           f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeBreakdown {
    pub plan_name:      PlanName,
    pub base_fee:       f64,
    pub extra_minutes:  f64,
    pub extra_messages: f64,
    pub extra_data:     f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerUserIncome {
    pub plan_name: PlanName,
    pub income:    Option<Describe>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardReport {
    pub run_id:            RunId,
    pub active_only:       bool,
    pub kpis:              Kpis,
    pub rate_table:        Vec<Plan>,
    pub plan_distribution: Vec<Count<PlanName>>,
    pub city_distribution: Vec<Count<String>>,
    pub plan_summaries:    Vec<PlanSummary>,
    pub monthly:           Vec<MonthlyPlanRow>,
    pub income_breakdown:  Vec<IncomeBreakdown>,
    pub per_user_income:   Vec<PerUserIncome>,
    pub plan_test:         Hypothesis,
    pub region_test:       Hypothesis,
}

fn column(records: &[&BillingRecord], f: impl Fn(&BillingRecord) -> f64) -> Vec<f64> {
    records.iter().map(|&r| f(r)).collect()
}

fn by_plan(records: &[BillingRecord]) -> BTreeMap<PlanName, Vec<&BillingRecord>> {
    let mut groups: BTreeMap<PlanName, Vec<&BillingRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.plan_name.clone()).or_default().push(record);
    }
    groups
}

pub fn kpis(snapshot: &DatasetSnapshot, run: &PipelineRun, records: &[BillingRecord]) -> Kpis {
    let total_users = snapshot.users.len();
    let churned_users = snapshot.churned_users();
    let churn_rate_pct = if total_users == 0 {
        0.0
    } else {
        churned_users as f64 / total_users as f64 * 100.0
    };

    let mut per_month: BTreeMap<YearMonth, f64> = BTreeMap::new();
    for record in records {
        *per_month.entry(record.month).or_default() += record.total_monthly_cost;
    }
    let monthly_totals: Vec<f64> = per_month.into_values().collect();
    let costs: Vec<f64> = records.iter().map(|r| r.total_monthly_cost).collect();

    Kpis {
        total_users,
        churned_users,
        churn_rate_pct,
        billed_user_months: records.len(),
        excluded_rows: run.excluded_rows,
        avg_monthly_income: mean(&costs),
        avg_total_monthly_income: mean(&monthly_totals),
    }
}

pub fn plan_summaries(records: &[BillingRecord]) -> Vec<PlanSummary> {
    by_plan(records)
        .into_iter()
        .map(|(plan_name, rows)| {
            let with_overage = rows.iter().filter(|r| r.has_overage()).count();
            PlanSummary {
                plan_name,
                user_months: rows.len(),
                minutes: describe(&column(&rows, |r| r.total_minutes)),
                messages: describe(&column(&rows, |r| r.messages_count as f64)),
                data_gb: describe(&column(&rows, |r| r.usage_mb / MB_PER_GB)),
                total_monthly_cost: describe(&column(&rows, |r| r.total_monthly_cost)),
                overage_share: with_overage as f64 / rows.len() as f64,
            }
        })
        .collect()
}

pub fn monthly_by_plan(records: &[BillingRecord]) -> Vec<MonthlyPlanRow> {
    let mut groups: BTreeMap<(YearMonth, PlanName), Vec<&BillingRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.month, record.plan_name.clone()))
            .or_default()
            .push(record);
    }

    groups
        .into_iter()
        .map(|((month, plan_name), rows)| {
            let minutes = column(&rows, |r| r.total_minutes);
            let messages = column(&rows, |r| r.messages_count as f64);
            let usage = column(&rows, |r| r.usage_mb);
            MonthlyPlanRow {
                month,
                plan_name,
                user_months: rows.len(),
                avg_minutes: mean(&minutes).unwrap_or(0.0),
                var_minutes: sample_variance(&minutes),
                avg_messages: mean(&messages).unwrap_or(0.0),
                var_messages: sample_variance(&messages),
                avg_usage_mb: mean(&usage).unwrap_or(0.0),
                var_usage_mb: sample_variance(&usage),
                revenue: rows.iter().map(|r| r.total_monthly_cost).sum(),
            }
        })
        .collect()
}

pub fn income_breakdown(records: &[BillingRecord]) -> Vec<IncomeBreakdown> {
    by_plan(records)
        .into_iter()
        .map(|(plan_name, rows)| IncomeBreakdown {
            plan_name,
            base_fee: mean(&column(&rows, |r| r.monthly_fee)).unwrap_or(0.0),
            extra_minutes: mean(&column(&rows, |r| r.extra_minute_cost)).unwrap_or(0.0),
            extra_messages: mean(&column(&rows, |r| r.extra_message_cost)).unwrap_or(0.0),
            extra_data: mean(&column(&rows, |r| r.extra_mb_cost)).unwrap_or(0.0),
        })
        .collect()
}

/// Average bill per user, summarized per plan.
pub fn per_user_income(records: &[BillingRecord]) -> Vec<PerUserIncome> {
    let mut per_user: BTreeMap<(PlanName, UserId), Vec<f64>> = BTreeMap::new();
    for record in records {
        per_user
            .entry((record.plan_name.clone(), record.user_id))
            .or_default()
            .push(record.total_monthly_cost);
    }

    let mut per_plan: BTreeMap<PlanName, Vec<f64>> = BTreeMap::new();
    for ((plan_name, _), bills) in per_user {
        if let Some(avg) = mean(&bills) {
            per_plan.entry(plan_name).or_default().push(avg);
        }
    }

    per_plan
        .into_iter()
        .map(|(plan_name, averages)| PerUserIncome {
            plan_name,
            income: describe(&averages),
        })
        .collect()
}

fn distributions(snapshot: &DatasetSnapshot) -> (Vec<Count<PlanName>>, Vec<Count<String>>) {
    let mut plans: BTreeMap<PlanName, usize> = BTreeMap::new();
    let mut cities: BTreeMap<String, usize> = BTreeMap::new();
    for user in snapshot.users.values() {
        *plans.entry(user.plan_name.clone()).or_default() += 1;
        *cities.entry(user.city.clone()).or_default() += 1;
    }

    let plans = plans
        .into_iter()
        .map(|(key, count)| Count { key, count })
        .collect();
    let mut cities: Vec<Count<String>> = cities
        .into_iter()
        .map(|(key, count)| Count { key, count })
        .collect();
    // Most common first; ties stay alphabetical.
    cities.sort_by(|a, b| b.count.cmp(&a.count));
    (plans, cities)
}

pub fn build_report(
    snapshot: &DatasetSnapshot,
    run: &PipelineRun,
    config: &PipelineConfig,
    active_only: bool,
) -> DashboardReport {
    let records = if active_only {
        run.active_records()
    } else {
        run.records.clone()
    };
    let (plan_distribution, city_distribution) = distributions(snapshot);

    DashboardReport {
        run_id: run.run_id.clone(),
        active_only,
        kpis: kpis(snapshot, run, &records),
        rate_table: snapshot.rate_table.plans().cloned().collect(),
        plan_distribution,
        city_distribution,
        plan_summaries: plan_summaries(&records),
        monthly: monthly_by_plan(&records),
        income_breakdown: income_breakdown(&records),
        per_user_income: per_user_income(&records),
        plan_test: compare_plans(&records, config),
        region_test: compare_regions(&records, config),
    }
}
