//! End-to-end scenarios against Jerusalem (31.7683 N, 35.2137 E, 800 m,
//! Asia/Jerusalem), matching the reference table of formula/observable
//! pairs.

use chrono::NaiveDate;
use zmanim_expr::{evaluate_batch, evaluate_formula, DiagnosticKind, NoaaSunCalculator};

const LAT: f64 = 31.7683;
const LON: f64 = 35.2137;
const ELEV: f64 = 800.0;

fn tz() -> chrono_tz::Tz {
    chrono_tz::Asia::Jerusalem
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn sunrise_minus_72_minutes() {
    let calc = NoaaSunCalculator;
    let d = date(2024, 3, 21);
    let sunrise = evaluate_formula("visible_sunrise", d, LAT, LON, ELEV, tz(), &calc).unwrap().as_time().unwrap();
    let result = evaluate_formula("visible_sunrise - 72min", d, LAT, LON, ELEV, tz(), &calc).unwrap().as_time().unwrap();
    assert_eq!((sunrise - result).num_seconds(), 72 * 60);
}

#[test]
fn midpoint_strictly_between_sunrise_and_sunset() {
    let calc = NoaaSunCalculator;
    let d = date(2024, 3, 21);
    let sunrise = evaluate_formula("visible_sunrise", d, LAT, LON, ELEV, tz(), &calc).unwrap().as_time().unwrap();
    let sunset = evaluate_formula("visible_sunset", d, LAT, LON, ELEV, tz(), &calc).unwrap().as_time().unwrap();
    let midpoint = evaluate_formula("midpoint(visible_sunrise, visible_sunset)", d, LAT, LON, ELEV, tz(), &calc)
        .unwrap()
        .as_time()
        .unwrap();
    assert!(midpoint > sunrise && midpoint < sunset);
    let expected = sunrise + (sunset - sunrise) / 2;
    assert!((midpoint - expected).num_seconds().abs() <= 1);
}

#[test]
fn proportional_hours_gra_matches_formula() {
    let calc = NoaaSunCalculator;
    let d = date(2024, 6, 21);
    let sunrise = evaluate_formula("visible_sunrise", d, LAT, LON, ELEV, tz(), &calc).unwrap().as_time().unwrap();
    let sunset = evaluate_formula("visible_sunset", d, LAT, LON, ELEV, tz(), &calc).unwrap().as_time().unwrap();
    let hour3 = evaluate_formula("proportional_hours(3, gra)", d, LAT, LON, ELEV, tz(), &calc).unwrap().as_time().unwrap();
    let expected = sunrise + (sunset - sunrise) * 3 / 12;
    assert!((hour3 - expected).num_seconds().abs() <= 60);
}

#[test]
fn proportional_hours_baal_hatanya_earlier_than_gra() {
    let calc = NoaaSunCalculator;
    let d = date(2024, 3, 21);
    let gra = evaluate_formula("proportional_hours(3, gra)", d, LAT, LON, ELEV, tz(), &calc).unwrap().as_time().unwrap();
    let baal = evaluate_formula("proportional_hours(3, baal_hatanya)", d, LAT, LON, ELEV, tz(), &calc)
        .unwrap()
        .as_time()
        .unwrap();
    assert!(baal < gra);
    assert!((gra - baal).num_minutes() < 10);
}

#[test]
fn conditional_selects_visible_sunrise_branch() {
    let calc = NoaaSunCalculator;
    let d = date(2024, 3, 21);
    let sunrise = evaluate_formula("visible_sunrise", d, LAT, LON, ELEV, tz(), &calc).unwrap().as_time().unwrap();
    let result = evaluate_formula(
        "if (latitude > 30) { visible_sunrise } else { visible_sunset }",
        d,
        LAT,
        LON,
        ELEV,
        tz(),
        &calc,
    )
    .unwrap()
    .as_time()
    .unwrap();
    assert!((result - sunrise).num_seconds().abs() <= 1);
}

#[test]
fn first_valid_picks_first_successful_angle() {
    let calc = NoaaSunCalculator;
    let d = date(2024, 6, 21);
    let expected = evaluate_formula("solar(16.1, before_visible_sunrise)", d, LAT, LON, ELEV, tz(), &calc)
        .unwrap()
        .as_time()
        .unwrap();
    let result = evaluate_formula(
        "first_valid(solar(16.1, before_visible_sunrise), visible_sunrise - 72min)",
        d,
        LAT,
        LON,
        ELEV,
        tz(),
        &calc,
    )
    .unwrap()
    .as_time()
    .unwrap();
    assert!((result - expected).num_seconds().abs() <= 1);
}

#[test]
fn three_way_cycle_reports_all_participants() {
    let calc = NoaaSunCalculator;
    let d = date(2024, 3, 21);
    let formulas = vec![
        ("a".to_string(), "@b + 10min".to_string()),
        ("b".to_string(), "@c + 10min".to_string()),
        ("c".to_string(), "@a + 10min".to_string()),
    ];
    let result = evaluate_batch(&formulas, d, LAT, LON, ELEV, tz(), &calc);
    let cycle = result.cycle.expect("expected a cycle");
    assert_eq!(cycle.len(), 3);
    assert!(result.results.is_empty());
}

#[test]
fn solar_out_of_range_is_semantic_error() {
    let calc = NoaaSunCalculator;
    let d = date(2024, 3, 21);
    let err = evaluate_formula("solar(95, before_visible_sunrise)", d, LAT, LON, ELEV, tz(), &calc).unwrap_err();
    assert_eq!(err.kind, DiagnosticKind::Semantic);
    let err = evaluate_formula("solar(-1, before_visible_sunrise)", d, LAT, LON, ELEV, tz(), &calc).unwrap_err();
    assert_eq!(err.kind, DiagnosticKind::Semantic);
}

#[test]
fn proportional_hours_rejects_out_of_range_index() {
    let calc = NoaaSunCalculator;
    let d = date(2024, 3, 21);
    let err = evaluate_formula("proportional_hours(0, gra)", d, LAT, LON, ELEV, tz(), &calc).unwrap_err();
    assert_eq!(err.kind, DiagnosticKind::Semantic);
    let err = evaluate_formula("proportional_hours(13, gra)", d, LAT, LON, ELEV, tz(), &calc).unwrap_err();
    assert_eq!(err.kind, DiagnosticKind::Semantic);
}

#[test]
fn division_by_zero_is_runtime_error() {
    let calc = NoaaSunCalculator;
    let d = date(2024, 3, 21);
    let err = evaluate_formula("10min / 0", d, LAT, LON, ELEV, tz(), &calc).unwrap_err();
    assert_eq!(err.kind, DiagnosticKind::Runtime);
}

#[test]
fn nonexistent_date_is_runtime_error() {
    let calc = NoaaSunCalculator;
    let d = date(2023, 3, 21); // non-leap year
    let err = evaluate_formula("29-Feb", d, LAT, LON, ELEV, tz(), &calc).unwrap_err();
    assert_eq!(err.kind, DiagnosticKind::Runtime);
}

#[test]
fn reversed_custom_base_is_runtime_error() {
    let calc = NoaaSunCalculator;
    let d = date(2024, 3, 21);
    let err =
        evaluate_formula("proportional_hours(3, custom(visible_sunset, visible_sunrise))", d, LAT, LON, ELEV, tz(), &calc)
            .unwrap_err();
    assert_eq!(err.kind, DiagnosticKind::Runtime);
}
