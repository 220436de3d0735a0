//! Synthetic dataset generator.
//!
//! Produces the five raw tables, so generated data flows through the same
//! normalizer, aggregator and billing engine as loaded data. Usage totals per
//! user-month are drawn from the plan's profile and then split into events.
//! Months beginning after a user's churn date are not generated.

use crate::{
    config::SyntheticConfig,
    loader::{CallRow, MessageRow, RawDataset, SessionRow, UserRow},
    rate_table::RateTable,
    rng::{RngBank, TableRng, TableSlot},
    types::{UserId, YearMonth},
};
use chrono::{Days, NaiveDate};

const DATE_FORMAT: &str = "%Y-%m-%d";
const AVG_CALL_MINUTES: f64 = 7.0;
const AVG_SESSION_MB: f64 = 400.0;
/// Share of user-months that also log an empty session, as real exports do.
const EMPTY_SESSION_RATE: f64 = 0.1;

pub fn generate(config: &SyntheticConfig) -> RawDataset {
    let bank = RngBank::new(config.seed);
    let mut user_rng = bank.for_table(TableSlot::Users);
    let mut call_rng = bank.for_table(TableSlot::Calls);
    let mut message_rng = bank.for_table(TableSlot::Messages);
    let mut internet_rng = bank.for_table(TableSlot::Internet);

    let months = config.first_month.through(config.last_month);
    let shares: Vec<f64> = config.profiles.iter().map(|p| p.share).collect();

    let mut dataset = RawDataset {
        plans: RateTable::megaline().plans().cloned().collect(),
        ..RawDataset::default()
    };

    for user_id in 1..=config.users as UserId {
        let Some(profile) = user_rng
            .pick_weighted(&shares)
            .and_then(|i| config.profiles.get(i))
        else {
            continue;
        };
        let city = if config.cities.is_empty() {
            String::from("Unknown")
        } else {
            let idx = user_rng.next_u64_below(config.cities.len() as u64) as usize;
            config.cities[idx].clone()
        };
        let churn_date = if user_rng.chance(config.churn_probability) {
            let offset = user_rng.next_u64_below(config.churn_window_days.max(1));
            config.churn_window_start.checked_add_days(Days::new(offset))
        } else {
            None
        };

        dataset.users.push(UserRow {
            user_id,
            plan: profile.plan.clone(),
            city,
            churn_date: churn_date.map(|d| d.format(DATE_FORMAT).to_string()),
        });

        for month in &months {
            if churn_date.is_some_and(|churned| month.first_day() > churned) {
                continue;
            }

            let minutes = call_rng
                .normal(profile.minutes.mean, profile.minutes.std)
                .max(0.0);
            push_calls(&mut dataset.calls, &mut call_rng, user_id, *month, minutes);

            let messages = message_rng
                .normal(profile.messages.mean, profile.messages.std)
                .max(0.0)
                .round() as u64;
            for _ in 0..messages {
                let date = random_day(&mut message_rng, *month);
                dataset.messages.push(MessageRow {
                    user_id,
                    message_date: date.format(DATE_FORMAT).to_string(),
                });
            }

            let data_mb = internet_rng
                .normal(profile.data_mb.mean, profile.data_mb.std)
                .max(0.0);
            push_sessions(&mut dataset.internet, &mut internet_rng, user_id, *month, data_mb);
        }
    }

    log::info!(
        "synthetic: seed {} -> {} users, {} calls, {} messages, {} sessions",
        config.seed,
        dataset.users.len(),
        dataset.calls.len(),
        dataset.messages.len(),
        dataset.internet.len()
    );
    dataset
}

fn random_day(rng: &mut TableRng, month: YearMonth) -> NaiveDate {
    let day = rng.next_u64_below(month.days_in_month() as u64) as u32 + 1;
    NaiveDate::from_ymd_opt(month.year, month.month, day).unwrap_or_else(|| month.first_day())
}

fn push_calls(out: &mut Vec<CallRow>, rng: &mut TableRng, user_id: UserId, month: YearMonth, minutes: f64) {
    if minutes <= 0.0 {
        return;
    }
    let count = (minutes / AVG_CALL_MINUTES).ceil().max(1.0) as usize;
    let duration = minutes / count as f64;
    for _ in 0..count {
        out.push(CallRow {
            user_id,
            call_date: random_day(rng, month).format(DATE_FORMAT).to_string(),
            duration,
        });
    }
}

fn push_sessions(out: &mut Vec<SessionRow>, rng: &mut TableRng, user_id: UserId, month: YearMonth, data_mb: f64) {
    if rng.chance(EMPTY_SESSION_RATE) {
        out.push(SessionRow {
            user_id: Some(user_id),
            session_date: random_day(rng, month).format(DATE_FORMAT).to_string(),
            mb_used: Some(0.0),
        });
    }
    if data_mb <= 0.0 {
        return;
    }
    let count = (data_mb / AVG_SESSION_MB).ceil().max(1.0) as usize;
    let volume = data_mb / count as f64;
    for _ in 0..count {
        out.push(SessionRow {
            user_id: Some(user_id),
            session_date: random_day(rng, month).format(DATE_FORMAT).to_string(),
            mb_used: Some(volume),
        });
    }
}
