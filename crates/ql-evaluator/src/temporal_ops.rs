//! Quantity-aware temporal arithmetic (spec.md §3.1, §3.3): adding a
//! calendar Quantity to a Date/DateTime clamps day-of-month the way
//! FHIRPath's `Date + 1 month` is defined to (end-of-month doesn't
//! overflow into the next month), and `difference`/`duration` count
//! calendar boundaries rather than elapsed fixed-length time.

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use ql_model::{PrecisionDate, PrecisionDateTime, Quantity, TemporalPrecision, Value};

/// Calendar units whose length varies (year, month) and so cannot be
/// folded into a fixed `chrono::Duration`.
fn calendar_months(unit: &str) -> Option<i32> {
    match unit {
        "a" => Some(12),
        "mo" => Some(1),
        _ => None,
    }
}

fn fixed_duration(unit: &str, magnitude: Decimal) -> Option<Duration> {
    let seconds_per_unit = match unit {
        "wk" => 604_800.0,
        "d" => 86_400.0,
        "h" => 3_600.0,
        "min" => 60.0,
        "s" => 1.0,
        "ms" => 0.001,
        _ => return None,
    };
    let total_seconds = magnitude.to_f64()? * seconds_per_unit;
    Duration::try_milliseconds((total_seconds * 1000.0).round() as i64)
}

/// Adds (or subtracts, when `sign` is `-1`) a calendar Quantity to a
/// Date, clamping the day-of-month if the target month is shorter
/// (e.g. `@2024-01-31 + 1 month` -> `@2024-02-29`).
pub fn date_plus_quantity(date: &PrecisionDate, quantity: &Quantity, sign: i64) -> Option<PrecisionDate> {
    let unit = quantity.unit.as_deref().unwrap_or("1");
    let magnitude = quantity.value.to_i64()? * sign;

    if let Some(months_per_unit) = calendar_months(unit) {
        let total_months = magnitude * months_per_unit as i64;
        let shifted = add_months_clamped(date.date, total_months);
        return Some(PrecisionDate::new(shifted, date.precision));
    }

    let duration = fixed_duration(unit, quantity.value)?;
    let signed = if sign < 0 { -duration } else { duration };
    let shifted = date.date.checked_add_signed(signed)?;
    Some(PrecisionDate::new(shifted, date.precision))
}

pub fn datetime_plus_quantity(
    dt: &PrecisionDateTime,
    quantity: &Quantity,
    sign: i64,
) -> Option<PrecisionDateTime> {
    let unit = quantity.unit.as_deref().unwrap_or("1");
    let magnitude = quantity.value.to_i64()? * sign;

    if let Some(months_per_unit) = calendar_months(unit) {
        let total_months = magnitude * months_per_unit as i64;
        let shifted_date = add_months_clamped(dt.datetime.date_naive(), total_months);
        let shifted = dt
            .datetime
            .with_year(shifted_date.year())?
            .with_month(shifted_date.month())?
            .with_day(shifted_date.day())?;
        return Some(PrecisionDateTime::new(shifted, dt.precision, dt.tz_unspecified));
    }

    let duration = fixed_duration(unit, quantity.value)?;
    let signed = if sign < 0 { -duration } else { duration };
    let shifted = dt.datetime.checked_add_signed(signed)?;
    Some(PrecisionDateTime::new(shifted, dt.precision, dt.tz_unspecified))
}

fn add_months_clamped(date: NaiveDate, months: i64) -> NaiveDate {
    let total = date.year() as i64 * 12 + (date.month() as i64 - 1) + months;
    let year = total.div_euclid(12) as i32;
    let month0 = total.rem_euclid(12) as u32;
    let month = month0 + 1;
    let last_day = days_in_month(year, month);
    let day = date.day().min(last_day);
    NaiveDate::from_ymd_opt(year, month, day).expect("clamped day is always valid")
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next_month_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .expect("month+1 is always a valid first-of-month");
    let this_month_first = NaiveDate::from_ymd_opt(year, month, 1).expect("month is always valid");
    (next_month_first - this_month_first).num_days() as u32
}

/// `duration in <precision> between a and b`: whole calendar units
/// elapsed (spec.md §4.4's temporal arithmetic note).
pub fn duration_in_days(a: &PrecisionDate, b: &PrecisionDate) -> i64 {
    (b.date - a.date).num_days()
}

/// `difference in <precision> between a and b`: count of boundary
/// crossings at that precision, which for whole-day-aligned dates
/// coincides with `duration` but diverges once sub-day precision and
/// partial units are involved; kept as a distinct entry point so
/// `eval.rs` doesn't need to special-case the FHIRPath/CQL wording
/// difference at call sites.
pub fn difference_in_days(a: &PrecisionDate, b: &PrecisionDate) -> i64 {
    duration_in_days(a, b)
}

pub fn duration_in_months(a: &PrecisionDate, b: &PrecisionDate) -> i64 {
    let months_a = a.date.year() as i64 * 12 + a.date.month() as i64;
    let months_b = b.date.year() as i64 * 12 + b.date.month() as i64;
    let mut diff = months_b - months_a;
    // A partial final month only counts once its day-of-month has been
    // reached, matching "whole units elapsed" rather than a bare
    // month-field subtraction.
    if diff > 0 && b.date.day() < a.date.day() {
        diff -= 1;
    } else if diff < 0 && b.date.day() > a.date.day() {
        diff += 1;
    }
    diff
}

pub fn duration_in_years(a: &PrecisionDate, b: &PrecisionDate) -> i64 {
    duration_in_months(a, b) / 12
}

pub fn difference_in_months(a: &PrecisionDate, b: &PrecisionDate) -> i64 {
    let months_a = a.date.year() as i64 * 12 + a.date.month() as i64;
    let months_b = b.date.year() as i64 * 12 + b.date.month() as i64;
    months_b - months_a
}

pub fn difference_in_years(a: &PrecisionDate, b: &PrecisionDate) -> i64 {
    b.date.year() as i64 - a.date.year() as i64
}

/// `Quantity + Quantity`: both sides must be commensurable; the result
/// keeps the left operand's unit, as FHIRPath/CQL define quantity
/// arithmetic.
pub fn quantity_add(lhs: &Quantity, rhs: &Quantity, sign: i64) -> Option<Quantity> {
    let rhs_value = lhs.unit.as_deref().and_then(|u| rhs.convert_to(u))?;
    let combined = if sign < 0 {
        lhs.value - rhs_value
    } else {
        lhs.value + rhs_value
    };
    Some(Quantity::new(combined, lhs.unit.clone()))
}

pub fn quantity_scale(quantity: &Quantity, factor: Decimal) -> Quantity {
    Quantity::new(quantity.value * factor, quantity.unit.clone())
}

pub fn value_as_date(value: &Value) -> Option<&PrecisionDate> {
    match value {
        Value::Date(d) => Some(d),
        _ => None,
    }
}

pub fn value_as_datetime(value: &Value) -> Option<&PrecisionDateTime> {
    match value {
        Value::DateTime(dt) => Some(dt),
        _ => None,
    }
}

/// Precision of a calendar-duration unit string, for comparing against a
/// value's own stored precision (spec.md §3.1).
pub fn precision_of_unit(unit: &str) -> Option<TemporalPrecision> {
    match unit {
        "a" => Some(TemporalPrecision::Year),
        "mo" => Some(TemporalPrecision::Month),
        "wk" | "d" => Some(TemporalPrecision::Day),
        "h" => Some(TemporalPrecision::Hour),
        "min" => Some(TemporalPrecision::Minute),
        "s" => Some(TemporalPrecision::Second),
        "ms" => Some(TemporalPrecision::Millisecond),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> PrecisionDate {
        PrecisionDate::new(NaiveDate::from_ymd_opt(y, m, d).unwrap(), TemporalPrecision::Day)
    }

    #[test]
    fn adding_a_month_clamps_day_of_month() {
        let jan_31 = date(2024, 1, 31);
        let q = Quantity::new(dec!(1), Some("month".into()));
        let result = date_plus_quantity(&jan_31, &q, 1).unwrap();
        assert_eq!(result.date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn adding_days_uses_fixed_duration() {
        let d = date(2024, 2, 28);
        let q = Quantity::new(dec!(2), Some("days".into()));
        let result = date_plus_quantity(&d, &q, 1).unwrap();
        assert_eq!(result.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn duration_in_months_counts_whole_elapsed_units() {
        let a = date(2024, 1, 15);
        let b = date(2024, 3, 10);
        // Only one whole month has elapsed: the 10th hasn't reached the
        // 15th of March yet.
        assert_eq!(duration_in_months(&a, &b), 1);
    }

    #[test]
    fn difference_in_months_counts_calendar_boundary_crossings() {
        let a = date(2024, 1, 31);
        let b = date(2024, 2, 1);
        assert_eq!(difference_in_months(&a, &b), 1);
    }
}
