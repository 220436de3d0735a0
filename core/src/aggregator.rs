//! Monthly aggregator: one usage row per (user, month).
//!
//! Each channel is reduced on its own, then the three are unioned over the
//! (user, month) key space. A key seen in any channel yields a row; channels
//! with no events for that key contribute zero.

use crate::{
    normalizer::NormalizedEvents,
    types::{UserId, YearMonth},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyUsage {
    pub user_id:        UserId,
    pub month:          YearMonth,
    pub total_minutes:  f64,
    pub messages_count: u64,
    pub usage_mb:       f64,
}

impl MonthlyUsage {
    fn zero(user_id: UserId, month: YearMonth) -> Self {
        Self {
            user_id,
            month,
            total_minutes: 0.0,
            messages_count: 0,
            usage_mb: 0.0,
        }
    }
}

type UsageKey = (UserId, YearMonth);

/// Reduce normalized events to monthly usage, ordered by (user_id, month).
pub fn aggregate(events: &NormalizedEvents) -> Vec<MonthlyUsage> {
    let mut minutes: BTreeMap<UsageKey, f64> = BTreeMap::new();
    for call in &events.calls {
        *minutes.entry((call.user_id, call.month)).or_default() += call.minutes;
    }

    let mut messages: BTreeMap<UsageKey, u64> = BTreeMap::new();
    for message in &events.messages {
        *messages.entry((message.user_id, message.month)).or_default() += 1;
    }

    let mut data: BTreeMap<UsageKey, f64> = BTreeMap::new();
    for session in &events.sessions {
        *data.entry((session.user_id, session.month)).or_default() += session.usage_mb;
    }

    let mut rows: BTreeMap<UsageKey, MonthlyUsage> = BTreeMap::new();
    for (&(user_id, month), &total) in &minutes {
        rows.entry((user_id, month))
            .or_insert_with(|| MonthlyUsage::zero(user_id, month))
            .total_minutes = total;
    }
    for (&(user_id, month), &count) in &messages {
        rows.entry((user_id, month))
            .or_insert_with(|| MonthlyUsage::zero(user_id, month))
            .messages_count = count;
    }
    for (&(user_id, month), &total) in &data {
        rows.entry((user_id, month))
            .or_insert_with(|| MonthlyUsage::zero(user_id, month))
            .usage_mb = total;
    }

    log::debug!(
        "aggregator: {} user-months ({} with calls, {} with messages, {} with data)",
        rows.len(),
        minutes.len(),
        messages.len(),
        data.len()
    );
    rows.into_values().collect()
}
