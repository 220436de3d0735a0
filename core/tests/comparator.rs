use megaline_core::{
    comparator::{welch_t_test, Comparison, SampleSide, DEFAULT_ALPHA},
    rng::{RngBank, TableSlot},
};

fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() < tol,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn matches_reference_welch_values() {
    let a = [20.0, 22.0, 19.0, 24.0, 25.0, 21.0];
    let b = [30.0, 28.0, 35.0, 33.0, 31.0];

    let result = welch_t_test(&a, &b, DEFAULT_ALPHA);
    let test = result.test().expect("both samples are usable");

    assert_close(test.statistic, -6.234_712_308_109_26, 1e-9);
    assert_close(test.degrees_of_freedom, 8.000_229_842_459_921, 1e-9);
    assert_close(test.p_value, 0.000_249_787_571_404, 1e-7);
    assert!(test.reject_null);
}

#[test]
fn moderate_difference_is_not_significant() {
    let a = [1.0, 2.0, 3.0, 4.0];
    let b = [2.0, 3.0, 4.0, 5.0, 6.0];

    let test = welch_t_test(&a, &b, DEFAULT_ALPHA).test().cloned().unwrap();

    assert_close(test.statistic, -1.566_698_903_601_280_6, 1e-9);
    assert_close(test.degrees_of_freedom, 6.980_769_230_769_232, 1e-9);
    assert_close(test.p_value, 0.161_285_856_289_306_9, 1e-6);
    assert!(!test.reject_null);
}

#[test]
fn swapping_samples_flips_only_the_sign() {
    let a = [20.0, 22.0, 19.0, 24.0, 25.0, 21.0];
    let b = [30.0, 28.0, 35.0, 33.0, 31.0];

    let ab = welch_t_test(&a, &b, DEFAULT_ALPHA).test().cloned().unwrap();
    let ba = welch_t_test(&b, &a, DEFAULT_ALPHA).test().cloned().unwrap();

    assert_close(ab.statistic, -ba.statistic, 1e-12);
    assert_close(ab.p_value, ba.p_value, 1e-12);
}

#[test]
fn constant_sample_is_insufficient_data() {
    let a = [33.0, 33.0, 33.0];
    let b = [20.0, 25.0, 30.0];

    match welch_t_test(&a, &b, DEFAULT_ALPHA) {
        Comparison::InsufficientData { sample, reason } => {
            assert_eq!(sample, SampleSide::A);
            assert!(reason.contains("insufficient data"), "reason: {reason}");
            assert!(reason.contains("zero variance"), "reason: {reason}");
        }
        other => panic!("expected insufficient data, got {other:?}"),
    }
}

/// Decimals without an exact binary form still count as constant.
#[test]
fn rounded_constant_samples_are_insufficient_data() {
    let b = [20.0, 25.0, 30.0];
    let constants: [Vec<f64>; 3] = [vec![0.1, 0.1, 0.1], vec![20.3; 10], vec![70.07; 10]];

    for a in &constants {
        match welch_t_test(a, &b, DEFAULT_ALPHA) {
            Comparison::InsufficientData { sample, reason } => {
                assert_eq!(sample, SampleSide::A, "sample {a:?}");
                assert!(reason.contains("zero variance"), "reason: {reason}");
            }
            other => panic!("expected insufficient data for {a:?}, got {other:?}"),
        }
        assert!(matches!(
            welch_t_test(&b, a, DEFAULT_ALPHA),
            Comparison::InsufficientData { sample: SampleSide::B, .. }
        ));
    }
}

#[test]
fn overflowing_variance_is_insufficient_data() {
    let result = welch_t_test(&[1e200, 2e200, 3e200], &[1.0, 2.0, 3.0], DEFAULT_ALPHA);
    assert!(
        matches!(result, Comparison::InsufficientData { sample: SampleSide::A, .. }),
        "unexpected result: {result:?}"
    );
    assert!(!result.rejects_null());
}

/// Each variance fits in an f64 but the degrees-of-freedom terms do not.
#[test]
fn overflowing_degrees_of_freedom_is_insufficient_data() {
    let result = welch_t_test(&[0.0, 2e150, 4e150], &[1.0, 2.0, 3.0], DEFAULT_ALPHA);
    match result {
        Comparison::InsufficientData { sample, reason } => {
            assert_eq!(sample, SampleSide::Both);
            assert!(reason.contains("not finite"), "reason: {reason}");
        }
        other => panic!("expected insufficient data, got {other:?}"),
    }
}

#[test]
fn tiny_samples_are_insufficient_data() {
    let result = welch_t_test(&[1.0, 2.0, 3.0], &[5.0], DEFAULT_ALPHA);
    assert!(matches!(
        result,
        Comparison::InsufficientData { sample: SampleSide::B, .. }
    ));

    let result = welch_t_test(&[], &[7.0, 7.0], DEFAULT_ALPHA);
    assert!(matches!(
        result,
        Comparison::InsufficientData { sample: SampleSide::Both, .. }
    ));
    assert!(!result.rejects_null());
}

#[test]
fn insufficient_data_serializes_as_a_status() {
    let result = welch_t_test(&[1.0], &[1.0, 2.0], DEFAULT_ALPHA);
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["status"], "insufficient_data");
    assert_eq!(json["sample"], "a");
}

/// Same distribution, many fixed seeds: rejections stay near the 5% rate.
#[test]
fn same_distribution_rarely_rejects() {
    let mut rejections = 0;
    for seed in 0..40u64 {
        let bank = RngBank::new(seed);
        let mut rng_a = bank.for_table(TableSlot::Calls);
        let mut rng_b = bank.for_table(TableSlot::Messages);
        let a: Vec<f64> = (0..2_000).map(|_| rng_a.normal(50.0, 12.0)).collect();
        let b: Vec<f64> = (0..2_000).map(|_| rng_b.normal(50.0, 12.0)).collect();

        if welch_t_test(&a, &b, DEFAULT_ALPHA).rejects_null() {
            rejections += 1;
        }
    }
    assert!(rejections <= 8, "{rejections}/40 seeds rejected a true null");
}

#[test]
fn shifted_distribution_is_detected() {
    let bank = RngBank::new(2019);
    let mut rng_a = bank.for_table(TableSlot::Calls);
    let mut rng_b = bank.for_table(TableSlot::Messages);
    let a: Vec<f64> = (0..500).map(|_| rng_a.normal(20.0, 5.0)).collect();
    let b: Vec<f64> = (0..500).map(|_| rng_b.normal(25.0, 15.0)).collect();

    let test = welch_t_test(&a, &b, DEFAULT_ALPHA).test().cloned().unwrap();
    assert!(test.reject_null);
    assert!(test.statistic < 0.0);
    assert!(test.p_value < 1e-6);
}
