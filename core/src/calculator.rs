//! What-if calculator: price a hypothetical month under two plans.
//!
//! Uses `Plan::charges`, the same formula the billing engine applies.

use crate::{
    config::PlanPair,
    error::{PipelineError, PipelineResult},
    rate_table::{Charges, RateTable, MB_PER_GB},
    types::PlanName,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WhatIfInput {
    pub minutes:  f64,
    pub messages: u64,
    pub data_gb:  f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanQuote {
    pub plan_name: PlanName,
    pub charges:   Charges,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatIfQuote {
    pub input:   WhatIfInput,
    pub first:   PlanQuote,
    pub second:  PlanQuote,
    /// None when both plans cost exactly the same.
    pub cheaper: Option<PlanName>,
    pub savings: f64,
}

pub fn what_if(rates: &RateTable, plans: &PlanPair, input: WhatIfInput) -> PipelineResult<WhatIfQuote> {
    if !(input.minutes >= 0.0) || !(input.data_gb >= 0.0) {
        return Err(PipelineError::InvalidInput(format!(
            "usage must be non-negative (minutes={}, data_gb={})",
            input.minutes, input.data_gb
        )));
    }

    let quote = |plan_name: &PlanName| -> PipelineResult<PlanQuote> {
        let plan = rates
            .get(plan_name.as_str())
            .ok_or_else(|| PipelineError::PlanNotFound {
                plan_name: plan_name.to_string(),
            })?;
        Ok(PlanQuote {
            plan_name: plan.plan_name.clone(),
            charges: plan.charges(input.minutes, input.messages, input.data_gb * MB_PER_GB),
        })
    };

    let first = quote(&plans.first)?;
    let second = quote(&plans.second)?;

    let first_total = first.charges.total_monthly_cost;
    let second_total = second.charges.total_monthly_cost;
    let cheaper = if first_total < second_total {
        Some(first.plan_name.clone())
    } else if second_total < first_total {
        Some(second.plan_name.clone())
    } else {
        None
    };

    Ok(WhatIfQuote {
        input,
        first,
        second,
        cheaper,
        savings: (first_total - second_total).abs(),
    })
}
