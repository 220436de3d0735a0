//! Rate table: per-plan fees, allowances and overage rates.
//!
//! The charge formula lives here, on `Plan`, so the billing engine and the
//! what-if calculator share one implementation.

use crate::{
    error::{PipelineError, PipelineResult},
    types::PlanName,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

pub const MB_PER_GB: f64 = 1024.0;

/// One row of `plans.csv`. Column names follow the source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_name: PlanName,
    #[serde(rename = "usd_monthly_pay")]
    pub monthly_fee: f64,
    pub minutes_included: f64,
    pub messages_included: u64,
    #[serde(rename = "mb_per_month_included")]
    pub data_included_mb: f64,
    #[serde(rename = "usd_per_minute")]
    pub rate_per_extra_minute: f64,
    #[serde(rename = "usd_per_message")]
    pub rate_per_extra_message: f64,
    #[serde(rename = "usd_per_gb")]
    pub rate_per_extra_gb: f64,
}

/// Overage quantities and the resulting monthly bill for one plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Charges {
    pub monthly_fee:        f64,
    pub extra_minutes:      f64,
    pub extra_messages:     u64,
    pub extra_mb:           f64,
    pub extra_minute_cost:  f64,
    pub extra_message_cost: f64,
    pub extra_mb_cost:      f64,
    pub total_monthly_cost: f64,
}

impl Plan {
    /// Bill one month of usage against this plan.
    ///
    /// Overage is `max(0, used - included)` per channel. Extra data is
    /// priced per GB after converting MB to GB.
    pub fn charges(&self, minutes: f64, messages: u64, usage_mb: f64) -> Charges {
        let extra_minutes = (minutes - self.minutes_included).max(0.0);
        let extra_messages = messages.saturating_sub(self.messages_included);
        let extra_mb = (usage_mb - self.data_included_mb).max(0.0);

        let extra_minute_cost = extra_minutes * self.rate_per_extra_minute;
        let extra_message_cost = extra_messages as f64 * self.rate_per_extra_message;
        let extra_mb_cost = (extra_mb / MB_PER_GB) * self.rate_per_extra_gb;

        Charges {
            monthly_fee: self.monthly_fee,
            extra_minutes,
            extra_messages,
            extra_mb,
            extra_minute_cost,
            extra_message_cost,
            extra_mb_cost,
            total_monthly_cost: self.monthly_fee
                + extra_minute_cost
                + extra_message_cost
                + extra_mb_cost,
        }
    }

    pub fn data_included_gb(&self) -> f64 {
        self.data_included_mb / MB_PER_GB
    }
}

/// Immutable plan lookup, exactly one row per plan name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    plans: BTreeMap<PlanName, Plan>,
}

impl RateTable {
    pub fn from_plans(plans: impl IntoIterator<Item = Plan>) -> PipelineResult<Self> {
        let mut table = BTreeMap::new();
        for plan in plans {
            if table.contains_key(&plan.plan_name) {
                return Err(PipelineError::DuplicatePlan {
                    plan_name: plan.plan_name.to_string(),
                });
            }
            table.insert(plan.plan_name.clone(), plan);
        }
        Ok(Self { plans: table })
    }

    /// The two Megaline plans used throughout the dashboard.
    pub fn megaline() -> Self {
        let plans = [
            Plan {
                plan_name: "surf".into(),
                monthly_fee: 20.0,
                minutes_included: 500.0,
                messages_included: 50,
                data_included_mb: 15_360.0,
                rate_per_extra_minute: 0.03,
                rate_per_extra_message: 0.03,
                rate_per_extra_gb: 10.0,
            },
            Plan {
                plan_name: "ultimate".into(),
                monthly_fee: 70.0,
                minutes_included: 3_000.0,
                messages_included: 1_000,
                data_included_mb: 30_720.0,
                rate_per_extra_minute: 0.01,
                rate_per_extra_message: 0.01,
                rate_per_extra_gb: 7.0,
            },
        ];
        Self {
            plans: plans
                .into_iter()
                .map(|p| (p.plan_name.clone(), p))
                .collect(),
        }
    }

    /// This table, or the Megaline plans when nothing was loaded.
    pub fn or_megaline(&self) -> Cow<'_, RateTable> {
        if self.is_empty() {
            log::warn!("rate table: no plans loaded, quoting with the Megaline plans");
            Cow::Owned(Self::megaline())
        } else {
            Cow::Borrowed(self)
        }
    }

    pub fn get(&self, plan_name: &str) -> Option<&Plan> {
        self.plans.get(plan_name)
    }

    pub fn plans(&self) -> impl Iterator<Item = &Plan> {
        self.plans.values()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}
