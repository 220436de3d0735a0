//! Dataset snapshot: the immutable input to one pipeline run.
//!
//! Built once from the raw tables, then handed by reference to every stage.
//! Nothing downstream mutates it; a new run means a new snapshot.

use crate::{
    config::PipelineConfig,
    error::{PipelineError, PipelineResult},
    loader::{RawDataset, UserRow},
    normalizer::{normalize, parse_date, NormalizedEvents},
    rate_table::RateTable,
    types::{PlanName, UserId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id:    UserId,
    pub plan_name:  PlanName,
    pub city:       String,
    /// None means the user is still active.
    pub churn_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    pub rate_table: RateTable,
    pub users:      BTreeMap<UserId, User>,
    pub events:     NormalizedEvents,
}

impl DatasetSnapshot {
    pub fn build(raw: &RawDataset, config: &PipelineConfig) -> PipelineResult<Self> {
        let rate_table = RateTable::from_plans(raw.plans.iter().cloned())?;
        let users = build_users(&raw.users, &config.date_format)?;

        let unknown_plans = users
            .values()
            .filter(|u| rate_table.get(u.plan_name.as_str()).is_none())
            .count();
        if unknown_plans > 0 {
            log::warn!("snapshot: {unknown_plans} users reference a plan missing from the rate table");
        }

        let events = normalize(raw, &config.date_format)?;
        log::info!(
            "snapshot: {} plans, {} users, {} events",
            rate_table.len(),
            users.len(),
            events.calls.len() + events.messages.len() + events.sessions.len()
        );
        Ok(Self { rate_table, users, events })
    }

    /// The well-typed stand-in after a failed load.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.events.is_empty()
    }

    pub fn churned_users(&self) -> usize {
        self.users.values().filter(|u| u.churn_date.is_some()).count()
    }
}

fn build_users(rows: &[UserRow], date_format: &str) -> PipelineResult<BTreeMap<UserId, User>> {
    let mut users = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        let churn_date = match row.churn_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => Some(parse_date(value, date_format).ok_or_else(|| {
                PipelineError::DateParse {
                    source_name: "users".into(),
                    line: i + 1,
                    value: value.to_string(),
                }
            })?),
        };
        let user = User {
            user_id: row.user_id,
            plan_name: row.plan.clone(),
            city: row.city.clone(),
            churn_date,
        };
        if users.insert(row.user_id, user).is_some() {
            return Err(PipelineError::DuplicateUser { user_id: row.user_id });
        }
    }
    Ok(users)
}
