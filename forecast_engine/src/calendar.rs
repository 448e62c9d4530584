//! Business-day and U.S. federal holiday calendar
//!
//! Forecast dates advance over Monday-Friday only. Holidays are applied
//! separately when scanning a forecast for a sell date.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Whether `date` falls on a Saturday or Sunday
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Whether `date` is a Monday-Friday business day
pub fn is_business_day(date: NaiveDate) -> bool {
    !is_weekend(date)
}

/// First business day strictly after `date`
pub fn next_business_day(date: NaiveDate) -> NaiveDate {
    let mut next = date + Duration::days(1);
    while is_weekend(next) {
        next += Duration::days(1);
    }
    next
}

/// The `count` consecutive business days following `last`
pub fn business_days_after(last: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(count);
    let mut current = last;
    for _ in 0..count {
        current = next_business_day(current);
        dates.push(current);
    }
    dates
}

/// Business days from `start` through `end`, inclusive
pub fn business_days_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| is_business_day(*d))
        .collect()
}

/// Saturday holidays move to Friday, Sunday holidays to Monday
fn nearest_workday(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    nth_weekday(year, month, weekday, 5).or_else(|| nth_weekday(year, month, weekday, 4))
}

/// Observed U.S. federal holidays whose nominal date falls in `year`.
///
/// Observed dates can spill into the neighbouring year (New Year's Day on a
/// Saturday is observed on December 31).
pub fn us_federal_holidays(year: i32) -> Vec<NaiveDate> {
    let fixed = |month: u32, day: u32| NaiveDate::from_ymd_opt(year, month, day).map(nearest_workday);

    let mut holidays: Vec<NaiveDate> = [
        fixed(1, 1),
        nth_weekday(year, 1, Weekday::Mon, 3),
        nth_weekday(year, 2, Weekday::Mon, 3),
        last_weekday(year, 5, Weekday::Mon),
        if year >= 2021 { fixed(6, 19) } else { None },
        fixed(7, 4),
        nth_weekday(year, 9, Weekday::Mon, 1),
        nth_weekday(year, 10, Weekday::Mon, 2),
        fixed(11, 11),
        nth_weekday(year, 11, Weekday::Thu, 4),
        fixed(12, 25),
    ]
    .into_iter()
    .flatten()
    .collect();
    holidays.sort();
    holidays
}

/// Whether `date` is an observed U.S. federal holiday
pub fn is_us_federal_holiday(date: NaiveDate) -> bool {
    // Next year's New Year's Day may be observed on Dec 31 of this year.
    [date.year(), date.year() + 1]
        .into_iter()
        .any(|y| us_federal_holidays(y).contains(&date))
}

/// A business day that is not a federal holiday
pub fn is_trading_day(date: NaiveDate) -> bool {
    is_business_day(date) && !is_us_federal_holiday(date)
}
