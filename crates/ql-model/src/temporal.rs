//! Precision-aware temporal types.
//!
//! Date/DateTime/Time values carry the precision of the literal or field
//! they were built from. Components below that precision are zero-filled
//! in the underlying chrono value for storage, but are never read back --
//! comparisons and formatting always consult `precision` first, per
//! spec.md §3.1's "precision is part of the value" invariant.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum TemporalPrecision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl TemporalPrecision {
    /// Whether `self` is at least as precise as `other` -- i.e. comparing
    /// at `other`'s precision loses no information `self` carries.
    pub fn covers(self, other: TemporalPrecision) -> bool {
        self >= other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrecisionDate {
    pub date: NaiveDate,
    pub precision: TemporalPrecision,
}

impl PrecisionDate {
    pub fn new(date: NaiveDate, precision: TemporalPrecision) -> Self {
        Self { date, precision }
    }

    /// Partial comparison at the coarser of the two precisions; `None`
    /// when neither side dominates a precision mismatch (spec.md §3.1).
    pub fn compare(&self, other: &PrecisionDate) -> Option<Ordering> {
        let common = self.precision.min(other.precision);
        let a = truncate_date(self.date, common);
        let b = truncate_date(other.date, common);
        if self.precision != other.precision && a == b {
            // Same value at common precision but differing precision:
            // neither dominates, so the comparison is unknown.
            return None;
        }
        Some(a.cmp(&b))
    }
}

fn truncate_date(date: NaiveDate, precision: TemporalPrecision) -> (i32, u32, u32) {
    use chrono::Datelike;
    match precision {
        TemporalPrecision::Year => (date.year(), 1, 1),
        TemporalPrecision::Month => (date.year(), date.month(), 1),
        _ => (date.year(), date.month(), date.day()),
    }
}

impl fmt::Display for PrecisionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            TemporalPrecision::Year => write!(f, "{}", self.date.format("%Y")),
            TemporalPrecision::Month => write!(f, "{}", self.date.format("%Y-%m")),
            _ => write!(f, "{}", self.date.format("%Y-%m-%d")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrecisionDateTime {
    pub datetime: DateTime<FixedOffset>,
    pub precision: TemporalPrecision,
    /// True when the original literal carried no timezone offset. Per
    /// spec.md §9's open question, such values are never coerced to UTC;
    /// comparisons against a timezone-bearing value are Null.
    pub tz_unspecified: bool,
}

impl PrecisionDateTime {
    pub fn new(
        datetime: DateTime<FixedOffset>,
        precision: TemporalPrecision,
        tz_unspecified: bool,
    ) -> Self {
        Self {
            datetime,
            precision,
            tz_unspecified,
        }
    }

    pub fn compare(&self, other: &PrecisionDateTime) -> Option<Ordering> {
        if self.tz_unspecified != other.tz_unspecified {
            return None;
        }
        let common = self.precision.min(other.precision);
        let a = truncate_datetime(self.datetime, common);
        let b = truncate_datetime(other.datetime, common);
        if self.precision != other.precision && a == b {
            return None;
        }
        Some(a.cmp(&b))
    }
}

fn truncate_datetime(
    dt: DateTime<FixedOffset>,
    precision: TemporalPrecision,
) -> DateTime<FixedOffset> {
    use chrono::{Datelike, TimeZone};
    let utc = dt;
    match precision {
        TemporalPrecision::Year => utc
            .timezone()
            .with_ymd_and_hms(utc.year(), 1, 1, 0, 0, 0)
            .unwrap(),
        TemporalPrecision::Month => utc
            .timezone()
            .with_ymd_and_hms(utc.year(), utc.month(), 1, 0, 0, 0)
            .unwrap(),
        TemporalPrecision::Day => utc
            .timezone()
            .with_ymd_and_hms(utc.year(), utc.month(), utc.day(), 0, 0, 0)
            .unwrap(),
        TemporalPrecision::Hour => utc
            .timezone()
            .with_ymd_and_hms(utc.year(), utc.month(), utc.day(), utc.hour(), 0, 0)
            .unwrap(),
        TemporalPrecision::Minute => utc
            .timezone()
            .with_ymd_and_hms(
                utc.year(),
                utc.month(),
                utc.day(),
                utc.hour(),
                utc.minute(),
                0,
            )
            .unwrap(),
        TemporalPrecision::Second => utc.with_nanosecond(0).unwrap(),
        TemporalPrecision::Millisecond => {
            utc.with_nanosecond((utc.nanosecond() / 1_000_000) * 1_000_000)
                .unwrap()
        }
    }
}

impl fmt::Display for PrecisionDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            TemporalPrecision::Year => write!(f, "{}", self.datetime.format("%Y")),
            TemporalPrecision::Month => write!(f, "{}", self.datetime.format("%Y-%m")),
            TemporalPrecision::Day => write!(f, "{}", self.datetime.format("%Y-%m-%d")),
            TemporalPrecision::Hour => write!(f, "{}", self.datetime.format("%Y-%m-%dT%H%:z")),
            TemporalPrecision::Minute => {
                write!(f, "{}", self.datetime.format("%Y-%m-%dT%H:%M%:z"))
            }
            TemporalPrecision::Second => {
                write!(f, "{}", self.datetime.format("%Y-%m-%dT%H:%M:%S%:z"))
            }
            TemporalPrecision::Millisecond => {
                write!(f, "{}", self.datetime.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrecisionTime {
    pub time: NaiveTime,
    pub precision: TemporalPrecision,
}

impl PrecisionTime {
    pub fn new(time: NaiveTime, precision: TemporalPrecision) -> Self {
        Self { time, precision }
    }

    pub fn compare(&self, other: &PrecisionTime) -> Option<Ordering> {
        let common = self.precision.min(other.precision);
        let a = truncate_time(self.time, common);
        let b = truncate_time(other.time, common);
        if self.precision != other.precision && a == b {
            return None;
        }
        Some(a.cmp(&b))
    }
}

fn truncate_time(time: NaiveTime, precision: TemporalPrecision) -> NaiveTime {
    match precision {
        TemporalPrecision::Hour => NaiveTime::from_hms_opt(time.hour(), 0, 0).unwrap(),
        TemporalPrecision::Minute => {
            NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap()
        }
        TemporalPrecision::Second => {
            NaiveTime::from_hms_opt(time.hour(), time.minute(), time.second()).unwrap()
        }
        _ => time,
    }
}

impl fmt::Display for PrecisionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            TemporalPrecision::Hour => write!(f, "{}", self.time.format("%H")),
            TemporalPrecision::Minute => write!(f, "{}", self.time.format("%H:%M")),
            TemporalPrecision::Second => write!(f, "{}", self.time.format("%H:%M:%S")),
            _ => write!(f, "{}", self.time.format("%H:%M:%S%.3f")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn same_precision_equal_dates_compare_equal() {
        let a = PrecisionDate::new(
            NaiveDate::from_ymd_opt(2024, 5, 15).unwrap(),
            TemporalPrecision::Day,
        );
        let b = a;
        assert_eq!(a.compare(&b), Some(Ordering::Equal));
    }

    #[test]
    fn mismatched_precision_same_value_is_unknown() {
        let year_only = PrecisionDate::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            TemporalPrecision::Year,
        );
        let day_precise = PrecisionDate::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            TemporalPrecision::Day,
        );
        assert_eq!(year_only.compare(&day_precise), None);
    }

    #[test]
    fn mismatched_precision_dominant_value_compares() {
        let year_2024 = PrecisionDate::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            TemporalPrecision::Year,
        );
        let day_2020 = PrecisionDate::new(
            NaiveDate::from_ymd_opt(2020, 6, 1).unwrap(),
            TemporalPrecision::Day,
        );
        assert_eq!(day_2020.compare(&year_2024), Some(Ordering::Less));
    }
}
