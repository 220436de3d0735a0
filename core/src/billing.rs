//! Billing engine: monthly usage joined with users and plans.
//!
//! STEPS (each a pure function of its inputs):
//!   1. join usage to the user table on user_id (plan, city, churn date)
//!   2. join the result to the rate table on plan_name
//!   3. price overage with `Plan::charges`
//!   4. emit one record per usage row
//!
//! Join misses follow the configured `IntegrityPolicy`. Churned months are
//! billed like any other; filtering them is the caller's decision.

use crate::{
    aggregator::MonthlyUsage,
    config::IntegrityPolicy,
    error::{PipelineError, PipelineResult},
    rate_table::RateTable,
    snapshot::User,
    types::{PlanName, UserId, YearMonth},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The canonical per-user-per-month bill. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRecord {
    pub user_id:            UserId,
    pub month:              YearMonth,
    pub plan_name:          PlanName,
    pub city:               String,
    pub churn_date:         Option<NaiveDate>,
    pub total_minutes:      f64,
    pub messages_count:     u64,
    pub usage_mb:           f64,
    pub monthly_fee:        f64,
    pub extra_minutes:      f64,
    pub extra_messages:     u64,
    pub extra_mb:           f64,
    pub extra_minute_cost:  f64,
    pub extra_message_cost: f64,
    pub extra_mb_cost:      f64,
    pub total_monthly_cost: f64,
}

impl BillingRecord {
    /// A month is active unless it starts after the user's churn date.
    pub fn is_active(&self) -> bool {
        match self.churn_date {
            None => true,
            Some(churned) => self.month.first_day() <= churned,
        }
    }

    pub fn has_overage(&self) -> bool {
        self.extra_minutes > 0.0 || self.extra_messages > 0 || self.extra_mb > 0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillingOutput {
    pub records:       Vec<BillingRecord>,
    /// Rows skipped under `IntegrityPolicy::Exclude`. Always 0 under `Abort`.
    pub excluded_rows: usize,
}

pub struct BillingEngine<'a> {
    users:  &'a BTreeMap<UserId, User>,
    rates:  &'a RateTable,
    policy: IntegrityPolicy,
}

impl<'a> BillingEngine<'a> {
    pub fn new(
        users: &'a BTreeMap<UserId, User>,
        rates: &'a RateTable,
        policy: IntegrityPolicy,
    ) -> Self {
        Self { users, rates, policy }
    }

    /// Bill a single user-month, failing on any join miss.
    pub fn bill_row(&self, usage: &MonthlyUsage) -> PipelineResult<BillingRecord> {
        let user = self
            .users
            .get(&usage.user_id)
            .ok_or(PipelineError::UnknownUser { user_id: usage.user_id })?;
        let plan = self
            .rates
            .get(user.plan_name.as_str())
            .ok_or_else(|| PipelineError::UnknownPlan {
                user_id: user.user_id,
                plan_name: user.plan_name.to_string(),
            })?;

        let charges = plan.charges(usage.total_minutes, usage.messages_count, usage.usage_mb);

        Ok(BillingRecord {
            user_id:            usage.user_id,
            month:              usage.month,
            plan_name:          plan.plan_name.clone(),
            city:               user.city.clone(),
            churn_date:         user.churn_date,
            total_minutes:      usage.total_minutes,
            messages_count:     usage.messages_count,
            usage_mb:           usage.usage_mb,
            monthly_fee:        charges.monthly_fee,
            extra_minutes:      charges.extra_minutes,
            extra_messages:     charges.extra_messages,
            extra_mb:           charges.extra_mb,
            extra_minute_cost:  charges.extra_minute_cost,
            extra_message_cost: charges.extra_message_cost,
            extra_mb_cost:      charges.extra_mb_cost,
            total_monthly_cost: charges.total_monthly_cost,
        })
    }

    /// Bill every usage row, in input order.
    pub fn bill(&self, usage: &[MonthlyUsage]) -> PipelineResult<BillingOutput> {
        let mut output = BillingOutput {
            records: Vec::with_capacity(usage.len()),
            excluded_rows: 0,
        };

        for row in usage {
            match self.bill_row(row) {
                Ok(record) => output.records.push(record),
                Err(e) if e.is_integrity() && self.policy == IntegrityPolicy::Exclude => {
                    log::debug!("billing: excluding {} {}: {e}", row.user_id, row.month);
                    output.excluded_rows += 1;
                }
                Err(e) => return Err(e),
            }
        }

        if output.excluded_rows > 0 {
            log::warn!(
                "billing: excluded {} of {} user-months with unknown user or plan",
                output.excluded_rows,
                usage.len()
            );
        }
        log::info!("billing: {} records", output.records.len());
        Ok(output)
    }
}
