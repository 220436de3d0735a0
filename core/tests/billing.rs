use megaline_core::{
    aggregator::MonthlyUsage,
    billing::BillingEngine,
    config::{IntegrityPolicy, PipelineConfig},
    error::PipelineError,
    pipeline::Pipeline,
    rate_table::RateTable,
    snapshot::{DatasetSnapshot, User},
    synthetic,
    types::{UserId, YearMonth},
};
use std::collections::BTreeMap;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn jan_2019() -> YearMonth {
    YearMonth::new(2019, 1).unwrap()
}

fn users(entries: &[(UserId, &str, &str)]) -> BTreeMap<UserId, User> {
    entries
        .iter()
        .map(|&(user_id, plan, city)| {
            (
                user_id,
                User {
                    user_id,
                    plan_name: plan.into(),
                    city: city.into(),
                    churn_date: None,
                },
            )
        })
        .collect()
}

fn usage(user_id: UserId, minutes: f64, messages: u64, usage_mb: f64) -> MonthlyUsage {
    MonthlyUsage {
        user_id,
        month: jan_2019(),
        total_minutes: minutes,
        messages_count: messages,
        usage_mb,
    }
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// surf: fee 20, 500 min, 50 msg, 15360 MB, $0.03/min, $0.03/msg, $10/GB.
#[test]
fn surf_user_over_minutes_and_data() {
    let rates = RateTable::megaline();
    let users = users(&[(1000, "surf", "Atlanta-Sandy Springs-Roswell, GA MSA")]);
    let engine = BillingEngine::new(&users, &rates, IntegrityPolicy::Abort);

    let record = engine.bill_row(&usage(1000, 600.0, 40, 16_384.0)).unwrap();

    assert_close(record.extra_minutes, 100.0);
    assert_eq!(record.extra_messages, 0);
    assert_close(record.extra_mb, 1024.0);
    assert_close(record.extra_minute_cost, 3.0);
    assert_close(record.extra_message_cost, 0.0);
    assert_close(record.extra_mb_cost, 10.0);
    assert_close(record.total_monthly_cost, 33.0);
    assert_eq!(record.plan_name.as_str(), "surf");
    assert_eq!(record.monthly_fee, 20.0);
}

#[test]
fn usage_within_allowance_costs_only_the_fee() {
    let rates = RateTable::megaline();
    let users = users(&[(1, "ultimate", "Boston")]);
    let engine = BillingEngine::new(&users, &rates, IntegrityPolicy::Abort);

    let record = engine.bill_row(&usage(1, 2_999.0, 1_000, 30_720.0)).unwrap();

    assert_eq!(record.extra_minutes, 0.0);
    assert_eq!(record.extra_messages, 0);
    assert_eq!(record.extra_mb, 0.0);
    assert_eq!(record.total_monthly_cost, 70.0);
}

#[test]
fn extra_messages_are_billed_per_message() {
    let rates = RateTable::megaline();
    let users = users(&[(1, "surf", "Boston")]);
    let engine = BillingEngine::new(&users, &rates, IntegrityPolicy::Abort);

    let record = engine.bill_row(&usage(1, 0.0, 60, 0.0)).unwrap();

    assert_eq!(record.extra_messages, 10);
    assert_close(record.extra_message_cost, 0.3);
    assert_close(record.total_monthly_cost, 20.3);
}

#[test]
fn unknown_plan_aborts_under_abort_policy() {
    let rates = RateTable::megaline();
    let users = users(&[(1, "surf", "Boston"), (2, "galaxy", "Miami")]);
    let engine = BillingEngine::new(&users, &rates, IntegrityPolicy::Abort);

    let err = engine
        .bill(&[usage(1, 10.0, 1, 1.0), usage(2, 10.0, 1, 1.0)])
        .unwrap_err();

    assert!(
        matches!(err, PipelineError::UnknownPlan { user_id: 2, ref plan_name } if plan_name == "galaxy"),
        "unexpected error: {err}"
    );
}

#[test]
fn unknown_user_is_counted_under_exclude_policy() {
    let rates = RateTable::megaline();
    let users = users(&[(1, "surf", "Boston"), (2, "galaxy", "Miami")]);
    let engine = BillingEngine::new(&users, &rates, IntegrityPolicy::Exclude);

    let output = engine
        .bill(&[
            usage(1, 10.0, 1, 1.0),
            usage(2, 10.0, 1, 1.0),
            usage(3, 10.0, 1, 1.0),
        ])
        .unwrap();

    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].user_id, 1);
    assert_eq!(output.excluded_rows, 2);
}

#[test]
fn unknown_user_aborts_under_abort_policy() {
    let rates = RateTable::megaline();
    let users = users(&[(1, "surf", "Boston")]);
    let engine = BillingEngine::new(&users, &rates, IntegrityPolicy::Abort);

    let err = engine.bill(&[usage(9, 1.0, 0, 0.0)]).unwrap_err();
    assert!(matches!(err, PipelineError::UnknownUser { user_id: 9 }));
}

#[test]
fn duplicate_plan_rows_are_rejected() {
    let surf = RateTable::megaline().get("surf").cloned().unwrap();
    let err = RateTable::from_plans([surf.clone(), surf]).unwrap_err();
    assert!(matches!(err, PipelineError::DuplicatePlan { .. }));
}

/// Every record of a synthetic run satisfies the billing invariants.
#[test]
fn synthetic_run_satisfies_billing_invariants() {
    let config = PipelineConfig::default_test();
    let raw = synthetic::generate(&config.synthetic);
    let snapshot = DatasetSnapshot::build(&raw, &config).unwrap();
    let run = Pipeline::new(&snapshot, &config).run().unwrap();

    assert!(!run.records.is_empty());
    assert_eq!(run.records.len(), run.monthly_usage.len(), "one record per usage row");
    assert_eq!(run.excluded_rows, 0);

    for r in &run.records {
        let plan = snapshot.rate_table.get(r.plan_name.as_str()).unwrap();

        assert!(r.extra_minutes >= 0.0);
        assert!(r.extra_mb >= 0.0);
        assert_eq!(r.extra_minutes, (r.total_minutes - plan.minutes_included).max(0.0));
        assert_eq!(r.extra_messages, r.messages_count.saturating_sub(plan.messages_included));
        assert_eq!(r.extra_mb, (r.usage_mb - plan.data_included_mb).max(0.0));
        assert_eq!(r.extra_mb_cost, (r.extra_mb / 1024.0) * plan.rate_per_extra_gb);

        assert!(r.total_monthly_cost >= r.monthly_fee);
        assert_eq!(
            r.total_monthly_cost,
            r.monthly_fee + r.extra_minute_cost + r.extra_message_cost + r.extra_mb_cost
        );
    }
}
