//! Event normalizer: raw rows to typed, month-bucketed usage events.
//!
//! Every row's date is parsed before any row is filtered, so a bad date
//! anywhere in a table fails that table even if the row would be dropped.
//!
//! Internet sessions are cleaned for billing:
//!   1. blank user id or blank volume: dropped
//!   2. volume <= 0: dropped (not clamped)
//!   3. volume < 1 MB: raised to 1 MB
//!   4. fractional MB: rounded up to the next whole MB

use crate::{
    error::{PipelineError, PipelineResult},
    loader::{CallRow, MessageRow, RawDataset, SessionRow},
    types::{UserId, YearMonth},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEvent {
    pub user_id: UserId,
    pub date:    NaiveDate,
    pub month:   YearMonth,
    pub minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub user_id: UserId,
    pub date:    NaiveDate,
    pub month:   YearMonth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub user_id:  UserId,
    pub date:     NaiveDate,
    pub month:    YearMonth,
    /// Billed volume, always a whole number of MB >= 1.
    pub usage_mb: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvents {
    pub calls:    Vec<CallEvent>,
    pub messages: Vec<MessageEvent>,
    pub sessions: Vec<SessionEvent>,
}

impl NormalizedEvents {
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.messages.is_empty() && self.sessions.is_empty()
    }
}

/// Parse a date under `format`. No fallback formats are tried.
pub fn parse_date(value: &str, format: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), format).ok()
}

fn parse_row_date(value: &str, format: &str, source_name: &str, index: usize) -> PipelineResult<NaiveDate> {
    parse_date(value, format).ok_or_else(|| PipelineError::DateParse {
        source_name: source_name.to_string(),
        line: index + 1,
        value: value.to_string(),
    })
}

/// Billing-grade volume for one session, or None if the session is discarded.
pub fn billed_session_mb(mb_used: f64) -> Option<f64> {
    // NaN fails this comparison too.
    if !(mb_used > 0.0) {
        return None;
    }
    Some(mb_used.max(1.0).ceil())
}

pub fn normalize_calls(rows: &[CallRow], format: &str) -> PipelineResult<Vec<CallEvent>> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let date = parse_row_date(&row.call_date, format, "calls", i)?;
            Ok(CallEvent {
                user_id: row.user_id,
                date,
                month: YearMonth::from_date(date),
                minutes: row.duration,
            })
        })
        .collect()
}

pub fn normalize_messages(rows: &[MessageRow], format: &str) -> PipelineResult<Vec<MessageEvent>> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let date = parse_row_date(&row.message_date, format, "messages", i)?;
            Ok(MessageEvent {
                user_id: row.user_id,
                date,
                month: YearMonth::from_date(date),
            })
        })
        .collect()
}

pub fn normalize_sessions(rows: &[SessionRow], format: &str) -> PipelineResult<Vec<SessionEvent>> {
    let dates = rows
        .iter()
        .enumerate()
        .map(|(i, row)| parse_row_date(&row.session_date, format, "internet", i))
        .collect::<PipelineResult<Vec<_>>>()?;

    let mut sessions = Vec::with_capacity(rows.len());
    let mut dropped_missing = 0usize;
    let mut dropped_non_positive = 0usize;

    for (row, date) in rows.iter().zip(dates) {
        let (Some(user_id), Some(mb_used)) = (row.user_id, row.mb_used) else {
            dropped_missing += 1;
            continue;
        };
        let Some(usage_mb) = billed_session_mb(mb_used) else {
            dropped_non_positive += 1;
            continue;
        };
        sessions.push(SessionEvent {
            user_id,
            date,
            month: YearMonth::from_date(date),
            usage_mb,
        });
    }

    if dropped_missing + dropped_non_positive > 0 {
        log::info!(
            "normalizer: dropped {dropped_missing} internet rows with blank fields, \
             {dropped_non_positive} with non-positive volume"
        );
    }
    Ok(sessions)
}

pub fn normalize(raw: &RawDataset, format: &str) -> PipelineResult<NormalizedEvents> {
    let events = NormalizedEvents {
        calls:    normalize_calls(&raw.calls, format)?,
        messages: normalize_messages(&raw.messages, format)?,
        sessions: normalize_sessions(&raw.internet, format)?,
    };
    log::debug!(
        "normalizer: {} calls, {} messages, {} sessions",
        events.calls.len(),
        events.messages.len(),
        events.sessions.len()
    );
    Ok(events)
}
