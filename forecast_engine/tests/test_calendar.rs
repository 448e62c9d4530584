use chrono::{Datelike, NaiveDate, Weekday};
use forecast_engine::calendar::{
    business_days_after, business_days_between, is_trading_day, is_us_federal_holiday,
    next_business_day, us_federal_holidays,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_business_days_after_skips_weekends() {
    let days = business_days_after(date(2024, 3, 7), 4);
    assert_eq!(
        days,
        vec![date(2024, 3, 8), date(2024, 3, 11), date(2024, 3, 12), date(2024, 3, 13)]
    );
    assert_eq!(next_business_day(date(2024, 3, 9)), date(2024, 3, 11));
}

#[rstest]
#[case(7)]
#[case(30)]
#[case(365)]
fn test_horizon_dates_are_contiguous(#[case] horizon: usize) {
    let last = date(2023, 12, 29);
    let days = business_days_after(last, horizon);
    assert_eq!(days.len(), horizon);
    assert!(days.iter().all(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)));
    for pair in days.windows(2) {
        assert_eq!(next_business_day(pair[0]), pair[1]);
    }
    assert_eq!(business_days_between(days[0], days[horizon - 1]), days);
}

#[test]
fn test_federal_holidays_2024() {
    let holidays = us_federal_holidays(2024);
    for expected in [
        date(2024, 1, 1),
        date(2024, 1, 15),
        date(2024, 2, 19),
        date(2024, 5, 27),
        date(2024, 6, 19),
        date(2024, 7, 4),
        date(2024, 9, 2),
        date(2024, 10, 14),
        date(2024, 11, 11),
        date(2024, 11, 28),
        date(2024, 12, 25),
    ] {
        assert!(holidays.contains(&expected), "missing {}", expected);
    }
    assert_eq!(holidays.len(), 11);
}

#[rstest]
#[case(date(2021, 12, 31), true)] // New Year's Day 2022 observed
#[case(date(2020, 7, 3), true)] // Independence Day observed
#[case(date(2019, 6, 19), false)] // before Juneteenth was a holiday
#[case(date(2024, 12, 24), false)]
fn test_observed_holidays(#[case] day: NaiveDate, #[case] holiday: bool) {
    assert_eq!(is_us_federal_holiday(day), holiday);
}

#[test]
fn test_trading_day_excludes_weekends_and_holidays() {
    assert!(is_trading_day(date(2024, 12, 26)));
    assert!(!is_trading_day(date(2024, 12, 25)));
    assert!(!is_trading_day(date(2024, 12, 21)));
}
