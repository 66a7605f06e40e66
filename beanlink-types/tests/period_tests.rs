use beanlink_types::Period;
use proptest::prelude::*;

// ── Construction ─────────────────────────────────────────────────

#[test]
fn weeks_are_days() {
    assert_eq!(Period::of_weeks(2), Period::of_days(14));
}

#[test]
fn zero_is_zero() {
    assert!(Period::ZERO.is_zero());
    assert!(!Period::of_days(1).is_zero());
}

// ── Text form ────────────────────────────────────────────────────

#[test]
fn display_iso() {
    assert_eq!(Period::new(1, 2, 10).to_string(), "P1Y2M10D");
    assert_eq!(Period::of_months(-3).to_string(), "P-3M");
    assert_eq!(Period::ZERO.to_string(), "P0D");
}

#[test]
fn parse_iso() {
    assert_eq!("P1Y2M10D".parse::<Period>().unwrap(), Period::new(1, 2, 10));
    assert_eq!("P3W".parse::<Period>().unwrap(), Period::of_days(21));
    assert_eq!("P1W2D".parse::<Period>().unwrap(), Period::of_days(9));
    assert_eq!("P0D".parse::<Period>().unwrap(), Period::ZERO);
}

#[test]
fn parse_rejects_garbage() {
    for input in ["", "P", "1Y", "PY", "P1D2Y", "P1Y1Y", "P1X", "P1.5D", "P99999999999D"] {
        assert!(input.parse::<Period>().is_err(), "accepted {input:?}");
    }
}

#[test]
fn large_values_roundtrip() {
    for p in [
        Period::of_years(700_000_000),
        Period::of_weeks(70_000_000),
        Period::of_days(10_000_000),
    ] {
        assert_eq!(p.to_string().parse::<Period>().unwrap(), p);
    }
}

proptest! {
    #[test]
    fn text_form_roundtrips(y in any::<i32>(), m in any::<i32>(), d in any::<i32>()) {
        let p = Period::new(y, m, d);
        prop_assert_eq!(p.to_string().parse::<Period>().unwrap(), p);
    }
}
