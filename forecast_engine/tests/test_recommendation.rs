use approx::assert_relative_eq;
use chrono::NaiveDate;
use forecast_engine::data::{PriceBar, PriceSeries};
use forecast_engine::models::{ForecastResult, ModelFamily};
use forecast_engine::recommendation::{
    RecommendationEngine, SellSignal, NOT_AVAILABLE_LABEL, UNREACHABLE_LABEL,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// History ending Friday 2024-12-20 at `last_close`
fn history(last_close: f64) -> PriceSeries {
    PriceSeries::new(vec![
        PriceBar::from_close(date(2024, 12, 19), 95.0),
        PriceBar::from_close(date(2024, 12, 20), last_close),
    ])
    .unwrap()
}

/// Forecast for Dec 23, 24, 25 (holiday), 26, 27 and Dec 30
fn forecast(values: Vec<f64>) -> ForecastResult {
    ForecastResult::new(date(2024, 12, 20), values, None).unwrap()
}

#[test]
fn test_buy_leg_is_today_at_last_close() {
    let rec = RecommendationEngine
        .recommend(
            &history(100.0),
            ModelFamily::Lstm,
            &forecast(vec![101.0; 6]),
            5.0,
            date(2024, 12, 20),
        )
        .unwrap();
    assert_eq!(rec.buy_date, date(2024, 12, 20));
    assert_eq!(rec.buy_price, 100.0);
    assert_relative_eq!(rec.target_price, 105.0);
    assert_eq!(rec.buy_date_label(), "December 20, 2024");
}

#[test]
fn test_zero_target_sells_on_first_day_at_or_above_buy_price() {
    let rec = RecommendationEngine
        .recommend(
            &history(100.0),
            ModelFamily::Xgboost,
            &forecast(vec![99.0, 100.0, 120.0, 130.0, 90.0, 140.0]),
            0.0,
            date(2024, 12, 20),
        )
        .unwrap();
    assert_eq!(rec.target_price, rec.buy_price);
    assert_eq!(rec.sell_date(), Some(date(2024, 12, 24)));
    assert_eq!(rec.sell_price_label(), "100.00");
}

#[test]
fn test_holiday_is_never_the_sell_date() {
    // Only Christmas and the last day qualify.
    let rec = RecommendationEngine
        .recommend(
            &history(100.0),
            ModelFamily::Prophet,
            &forecast(vec![101.0, 102.0, 150.0, 103.0, 104.0, 111.0]),
            10.0,
            date(2024, 12, 20),
        )
        .unwrap();
    assert_eq!(
        rec.sell,
        SellSignal::Reachable {
            date: date(2024, 12, 30),
            forecast_value: 111.0
        }
    );
    assert_eq!(rec.sell_date_label(), "December 30, 2024");
}

#[test]
fn test_dates_before_today_are_ignored() {
    let rec = RecommendationEngine
        .recommend(
            &history(100.0),
            ModelFamily::ArimaGarch,
            &forecast(vec![130.0, 101.0, 102.0, 125.0, 103.0, 104.0]),
            20.0,
            date(2024, 12, 24),
        )
        .unwrap();
    assert_eq!(rec.sell_date(), Some(date(2024, 12, 26)));
}

#[test]
fn test_first_qualifying_day_wins_over_best_price() {
    let rec = RecommendationEngine
        .recommend(
            &history(100.0),
            ModelFamily::Lstm,
            &forecast(vec![100.0, 106.0, 100.0, 100.0, 100.0, 180.0]),
            5.0,
            date(2024, 12, 20),
        )
        .unwrap();
    assert_eq!(rec.sell_date(), Some(date(2024, 12, 24)));
}

#[rstest]
#[case(50.0)]
#[case(1000.0)]
fn test_unreachable_target_is_a_sentinel(#[case] target_pct: f64) {
    let rec = RecommendationEngine
        .recommend(
            &history(100.0),
            ModelFamily::Prophet,
            &forecast(vec![101.0, 102.0, 103.0, 104.0, 105.0, 106.0]),
            target_pct,
            date(2024, 12, 20),
        )
        .unwrap();
    assert!(!rec.is_reachable());
    assert_eq!(rec.sell, SellSignal::Unreachable);
    assert_eq!(rec.sell_date_label(), UNREACHABLE_LABEL);
    assert_eq!(rec.sell_price_label(), NOT_AVAILABLE_LABEL);
}

#[test]
fn test_forecast_entirely_in_the_past_is_unreachable() {
    let rec = RecommendationEngine
        .recommend(
            &history(100.0),
            ModelFamily::Xgboost,
            &forecast(vec![200.0; 6]),
            1.0,
            date(2025, 2, 3),
        )
        .unwrap();
    assert!(!rec.is_reachable());
}

#[test]
fn test_non_finite_target_rejected() {
    assert!(RecommendationEngine
        .recommend(
            &history(100.0),
            ModelFamily::Lstm,
            &forecast(vec![101.0; 6]),
            f64::NAN,
            date(2024, 12, 20),
        )
        .is_err());
}
