//! Calendar helpers shared by the schedule resolver, the aggregators and the
//! Monte Carlo engine.
//!
//! Every date in the engine is a `jiff::civil::Date`: a plain calendar day with
//! no time zone attached. Instants coming from the outside are converted to
//! their UTC calendar day exactly once, here, so a boundary such as
//! "starts 01.11" can never drift into October because of a local offset.
//!
//! Day differences use Rata Die numbering instead of jiff's `Span` machinery,
//! which is correct but comparatively heavy inside hot loops.

use jiff::Timestamp;
use jiff::civil::Date;
use jiff::tz::TimeZone;

use crate::error::DateParseError;

#[inline]
pub fn is_leap_year(year: i16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

/// Days in `month` (1-based) of `year` without building a `Date`.
#[inline]
pub fn days_in_month(year: i16, month: i8) -> i8 {
    const DAYS: [i8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    if month == 2 && is_leap_year(year) {
        29
    } else {
        DAYS[(month - 1) as usize]
    }
}

/// First day of the month containing `d`.
#[inline]
pub fn month_start(d: Date) -> Date {
    jiff::civil::date(d.year(), d.month(), 1)
}

/// Last day of the month containing `d`.
#[inline]
pub fn month_end(d: Date) -> Date {
    jiff::civil::date(d.year(), d.month(), days_in_month(d.year(), d.month()))
}

/// Shift `d` by `months` calendar months, clamping the day to the target
/// month's length (Jan 31 + 1 month = Feb 28/29).
pub fn add_months(d: Date, months: i32) -> Date {
    let absolute = i32::from(d.year()) * 12 + i32::from(d.month()) - 1 + months;
    let year = absolute.div_euclid(12) as i16;
    let month = (absolute.rem_euclid(12) + 1) as i8;
    let day = d.day().min(days_in_month(year, month));
    jiff::civil::date(year, month, day)
}

/// Whole calendar months from the month of `from` to the month of `to`.
///
/// Days are ignored: 2025-01-31 → 2025-02-01 is one month.
#[inline]
pub fn months_between(from: Date, to: Date) -> i32 {
    (i32::from(to.year()) - i32::from(from.year())) * 12
        + (i32::from(to.month()) - i32::from(from.month()))
}

/// Start of the month `index` months after the month containing `epoch`.
#[inline]
pub fn month_at(epoch: Date, index: u32) -> Date {
    add_months(month_start(epoch), index as i32)
}

/// Rata Die day number (days since 0001-01-01), proleptic Gregorian.
#[inline]
fn rata_die(d: Date) -> i32 {
    let y = d.year() as i32;
    let m = d.month() as i32;
    let day = d.day() as i32;

    // March = month 1 so February closes the "year"
    let a = (14 - m) / 12;
    let y2 = y - a;
    let m2 = m + 12 * a - 3;

    day + (153 * m2 + 2) / 5 + 365 * y2 + y2 / 4 - y2 / 100 + y2 / 400 - 306
}

/// Days from `d1` to `d2`; positive when `d2 > d1`.
#[inline]
pub fn fast_days_between(d1: Date, d2: Date) -> i32 {
    rata_die(d2) - rata_die(d1)
}

#[inline]
pub fn add_days(d: Date, n: i32) -> Date {
    rd_to_date(rata_die(d) + n)
}

#[inline]
fn rd_to_date(rd: i32) -> Date {
    let z = rd + 306;
    let h = 100 * z - 25;
    let a = h / 3_652_425;
    let b = a - a / 4;
    let y = (100 * b + h) / 36_525;
    let c = b + z - 365 * y - y / 4;
    let m = (5 * c + 456) / 153;
    let day = c - (153 * m - 457) / 5;

    let (year, month) = if m > 12 { (y + 1, m - 12) } else { (y, m) };

    jiff::civil::date(year as i16, month as i8, day as i8)
}

/// The UTC calendar day of an instant.
#[must_use]
pub fn to_utc_date(ts: Timestamp) -> Date {
    ts.to_zoned(TimeZone::UTC).date()
}

/// Parse a date as entered by a user or stored by an older front end.
///
/// Accepts `YYYY-MM-DD`, the Swiss/German `DD.MM.YYYY`, and full RFC 3339
/// timestamps. Timestamps are reduced to their UTC day, never to a local one.
pub fn parse_date(input: &str) -> Result<Date, DateParseError> {
    let trimmed = input.trim();
    let err = || DateParseError {
        input: input.to_string(),
    };

    if !trimmed.contains(['-', ':'])
        && let Some((day, rest)) = trimmed.split_once('.')
    {
        let (month, year) = rest.split_once('.').ok_or_else(err)?;
        let day: i8 = day.parse().map_err(|_| err())?;
        let month: i8 = month.parse().map_err(|_| err())?;
        let year: i16 = year.parse().map_err(|_| err())?;
        return Date::new(year, month, day).map_err(|_| err());
    }

    if trimmed.len() == 10 {
        return trimmed.parse::<Date>().map_err(|_| err());
    }

    trimmed
        .parse::<Timestamp>()
        .map(to_utc_date)
        .map_err(|_| err())
}

/// Serde adapter reading dates through [`parse_date`] and writing ISO dates.
pub mod flexible_date {
    use jiff::civil::Date;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(date)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_date(&raw).map_err(D::Error::custom)
    }
}

/// Optional variant of [`flexible_date`]; use together with `#[serde(default)]`.
pub mod flexible_date_opt {
    use jiff::civil::Date;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(date: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => serializer.collect_str(d),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Date>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|s| super::parse_date(&s).map_err(D::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn test_fast_days_between_across_year() {
        // 2024 is a leap year → 366 days
        assert_eq!(fast_days_between(date(2024, 1, 1), date(2025, 1, 1)), 366);
        assert_eq!(fast_days_between(date(2025, 1, 1), date(2026, 1, 1)), 365);
        assert_eq!(fast_days_between(date(2025, 1, 2), date(2025, 1, 1)), -1);
    }

    #[test]
    fn test_fast_days_between_matches_jiff() {
        let pairs = [
            (date(2020, 1, 1), date(2030, 6, 15)),
            (date(2024, 2, 29), date(2025, 2, 28)),
            (date(2000, 3, 1), date(2100, 3, 1)),
        ];
        for (d1, d2) in pairs {
            assert_eq!(fast_days_between(d1, d2), (d2 - d1).get_days());
        }
    }

    #[test]
    fn test_add_days_roundtrip() {
        assert_eq!(add_days(date(2025, 12, 31), 1), date(2026, 1, 1));
        assert_eq!(add_days(date(2024, 3, 1), -1), date(2024, 2, 29));
        for d in [date(2000, 1, 1), date(2024, 2, 29), date(2099, 12, 31)] {
            assert_eq!(rd_to_date(rata_die(d)), d);
        }
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2025, 2), 28);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(2025, 11), 30);
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(month_start(date(2033, 11, 17)), date(2033, 11, 1));
        assert_eq!(month_end(date(2024, 2, 3)), date(2024, 2, 29));
        assert_eq!(month_end(date(2025, 12, 1)), date(2025, 12, 31));
    }

    #[test]
    fn test_add_months_clamps_and_wraps() {
        assert_eq!(add_months(date(2025, 1, 31), 1), date(2025, 2, 28));
        assert_eq!(add_months(date(2025, 11, 15), 3), date(2026, 2, 15));
        assert_eq!(add_months(date(2025, 1, 15), -1), date(2024, 12, 15));
        assert_eq!(add_months(date(2025, 6, 1), 120), date(2035, 6, 1));
    }

    #[test]
    fn test_months_between() {
        assert_eq!(months_between(date(2025, 1, 31), date(2025, 2, 1)), 1);
        assert_eq!(months_between(date(2025, 1, 1), date(2050, 1, 1)), 300);
        assert_eq!(months_between(date(2025, 3, 1), date(2024, 12, 1)), -3);
        assert_eq!(month_at(date(2025, 3, 14), 10), date(2026, 1, 1));
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2033-11-01").unwrap(), date(2033, 11, 1));
        assert_eq!(parse_date("01.11.2033").unwrap(), date(2033, 11, 1));
        assert_eq!(parse_date(" 31.10.2033 ").unwrap(), date(2033, 10, 31));
        assert!(parse_date("31.02.2033").is_err());
        assert!(parse_date("next tuesday").is_err());
    }

    #[test]
    fn test_parse_timestamp_uses_utc_day() {
        // Midnight in UTC+1 is still Oct 31 in UTC
        assert_eq!(
            parse_date("2033-11-01T00:00:00+01:00").unwrap(),
            date(2033, 10, 31)
        );
        // Late evening west of UTC is already the next UTC day
        assert_eq!(
            parse_date("2033-10-31T23:30:00-05:00").unwrap(),
            date(2033, 11, 1)
        );
        assert_eq!(parse_date("2033-11-01T00:00:00Z").unwrap(), date(2033, 11, 1));
    }
}
