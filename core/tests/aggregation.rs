use megaline_core::{
    aggregator::aggregate,
    config::PipelineConfig,
    normalizer::{CallEvent, MessageEvent, NormalizedEvents, SessionEvent},
    snapshot::DatasetSnapshot,
    synthetic,
    types::{UserId, YearMonth},
};
use chrono::NaiveDate;
use std::collections::BTreeSet;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn call(user_id: UserId, d: NaiveDate, minutes: f64) -> CallEvent {
    CallEvent { user_id, date: d, month: YearMonth::from_date(d), minutes }
}

fn message(user_id: UserId, d: NaiveDate) -> MessageEvent {
    MessageEvent { user_id, date: d, month: YearMonth::from_date(d) }
}

fn session(user_id: UserId, d: NaiveDate, usage_mb: f64) -> SessionEvent {
    SessionEvent { user_id, date: d, month: YearMonth::from_date(d), usage_mb }
}

fn keys(events: &NormalizedEvents) -> BTreeSet<(UserId, YearMonth)> {
    let mut keys = BTreeSet::new();
    keys.extend(events.calls.iter().map(|e| (e.user_id, e.month)));
    keys.extend(events.messages.iter().map(|e| (e.user_id, e.month)));
    keys.extend(events.sessions.iter().map(|e| (e.user_id, e.month)));
    keys
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn channels_are_summed_per_user_month() {
    let events = NormalizedEvents {
        calls: vec![
            call(1, date(2019, 1, 3), 10.5),
            call(1, date(2019, 1, 28), 4.5),
            call(1, date(2019, 2, 1), 7.0),
        ],
        messages: vec![message(1, date(2019, 1, 5)), message(1, date(2019, 1, 6))],
        sessions: vec![session(1, date(2019, 1, 9), 100.0), session(1, date(2019, 1, 31), 25.0)],
    };

    let rows = aggregate(&events);

    assert_eq!(rows.len(), 2);
    let jan = &rows[0];
    assert_eq!(jan.month, YearMonth::new(2019, 1).unwrap());
    assert_eq!(jan.total_minutes, 15.0);
    assert_eq!(jan.messages_count, 2);
    assert_eq!(jan.usage_mb, 125.0);

    let feb = &rows[1];
    assert_eq!(feb.month, YearMonth::new(2019, 2).unwrap());
    assert_eq!(feb.total_minutes, 7.0);
    assert_eq!(feb.messages_count, 0);
    assert_eq!(feb.usage_mb, 0.0);
}

#[test]
fn messages_only_month_gets_zero_minutes_and_data() {
    let events = NormalizedEvents {
        calls: vec![],
        messages: vec![message(42, date(2018, 12, 24))],
        sessions: vec![],
    };

    let rows = aggregate(&events);

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, 42);
    assert_eq!(rows[0].total_minutes, 0.0);
    assert_eq!(rows[0].messages_count, 1);
    assert_eq!(rows[0].usage_mb, 0.0);
}

#[test]
fn same_day_number_in_different_years_stays_separate() {
    let events = NormalizedEvents {
        calls: vec![call(1, date(2018, 6, 1), 1.0), call(1, date(2019, 6, 1), 2.0)],
        ..NormalizedEvents::default()
    };
    let rows = aggregate(&events);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].month.to_string(), "2018-06");
    assert_eq!(rows[1].month.to_string(), "2019-06");
}

#[test]
fn empty_events_give_no_rows() {
    assert!(aggregate(&NormalizedEvents::default()).is_empty());
}

/// The (user, month) keys of the output equal the union of the channel keys.
#[test]
fn union_of_channel_keys_is_preserved() {
    let config = PipelineConfig::default_test();
    let raw = synthetic::generate(&config.synthetic);
    let snapshot = DatasetSnapshot::build(&raw, &config).unwrap();

    let rows = aggregate(&snapshot.events);
    let produced: BTreeSet<(UserId, YearMonth)> =
        rows.iter().map(|r| (r.user_id, r.month)).collect();

    assert_eq!(produced.len(), rows.len(), "no duplicate user-months");
    assert_eq!(produced, keys(&snapshot.events));
}
