//! Calendar helpers over `chrono` UTC timestamps, plus a parser for
//! Go-style duration strings (`1h30m`, `250ms`) used by configuration.

use std::time::Duration;

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc, Weekday};

/// `2006-01-02` style calendar date.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// `15:04:05` style wall-clock time.
pub const TIME_FORMAT: &str = "%H:%M:%S";
/// `2006-01-02 15:04:05` style timestamp.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format the date part of `t`.
#[must_use]
pub fn format_date(t: &DateTime<Utc>) -> String {
    t.format(DATE_FORMAT).to_string()
}

/// Format `t` as `YYYY-MM-DD HH:MM:SS`.
#[must_use]
pub fn format_datetime(t: &DateTime<Utc>) -> String {
    t.format(DATETIME_FORMAT).to_string()
}

/// Format `t` as RFC 3339 with a `Z` suffix.
#[must_use]
pub fn format_rfc3339(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Parse a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns the `chrono` parse error for malformed input.
pub fn parse_date(input: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(input, DATE_FORMAT)
}

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp as UTC.
///
/// # Errors
///
/// Returns the `chrono` parse error for malformed input.
pub fn parse_datetime(input: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(input, DATETIME_FORMAT).map(|naive| naive.and_utc())
}

/// Parse an RFC 3339 timestamp and convert it to UTC.
///
/// # Errors
///
/// Returns the `chrono` parse error for malformed input.
pub fn parse_rfc3339(input: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(input).map(|t| t.with_timezone(&Utc))
}

/// Midnight at the start of the day containing `t`.
#[must_use]
pub fn start_of_day(t: &DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Last nanosecond of the day containing `t`.
#[must_use]
pub fn end_of_day(t: &DateTime<Utc>) -> DateTime<Utc> {
    start_of_day(t) + TimeDelta::days(1) - TimeDelta::nanoseconds(1)
}

/// Monday midnight of the week containing `t`.
#[must_use]
pub fn start_of_week(t: &DateTime<Utc>) -> DateTime<Utc> {
    let since_monday = i64::from(t.weekday().num_days_from_monday());
    start_of_day(&(*t - TimeDelta::days(since_monday)))
}

/// Last nanosecond of the Sunday ending the week containing `t`.
#[must_use]
pub fn end_of_week(t: &DateTime<Utc>) -> DateTime<Utc> {
    end_of_day(&(start_of_week(t) + TimeDelta::days(6)))
}

/// Midnight on the first day of the month containing `t`.
#[must_use]
pub fn start_of_month(t: &DateTime<Utc>) -> DateTime<Utc> {
    let date = t.date_naive();
    let first = date.with_day(1).unwrap_or(date);
    first.and_time(NaiveTime::MIN).and_utc()
}

/// Last nanosecond of the month containing `t`.
#[must_use]
pub fn end_of_month(t: &DateTime<Utc>) -> DateTime<Utc> {
    let start = start_of_month(t);
    start
        .checked_add_months(Months::new(1))
        .map_or_else(|| end_of_day(t), |next| next - TimeDelta::nanoseconds(1))
}

/// Midnight on 1 January of the year containing `t`.
#[must_use]
pub fn start_of_year(t: &DateTime<Utc>) -> DateTime<Utc> {
    let date = t.date_naive();
    let first = date.with_ordinal(1).unwrap_or(date);
    first.and_time(NaiveTime::MIN).and_utc()
}

/// Last nanosecond of 31 December of the year containing `t`.
#[must_use]
pub fn end_of_year(t: &DateTime<Utc>) -> DateTime<Utc> {
    let start = start_of_year(t);
    start
        .checked_add_months(Months::new(12))
        .map_or_else(|| end_of_day(t), |next| next - TimeDelta::nanoseconds(1))
}

/// Saturday or Sunday.
#[must_use]
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Monday to Friday.
#[must_use]
pub fn is_business_day(date: NaiveDate) -> bool {
    !is_weekend(date)
}

/// Move `days` business days forwards (or backwards when negative),
/// skipping weekends. Zero returns `date` unchanged.
#[must_use]
pub fn add_business_days(date: NaiveDate, days: i64) -> NaiveDate {
    let step = if days >= 0 { 1 } else { -1 };
    let mut remaining = days.unsigned_abs();
    let mut current = date;
    while remaining > 0 {
        match current.checked_add_signed(TimeDelta::days(step)) {
            Some(next) => current = next,
            None => break,
        }
        if is_business_day(current) {
            remaining -= 1;
        }
    }
    current
}

/// Whole calendar days from `start` to `end`; negative when `end` is earlier.
#[must_use]
pub fn days_between(start: &DateTime<Utc>, end: &DateTime<Utc>) -> i64 {
    (end.date_naive() - start.date_naive()).num_days()
}

/// Business days in the half-open range `[start, end)`; argument order does
/// not matter.
#[must_use]
pub fn business_days_between(start: NaiveDate, end: NaiveDate) -> u64 {
    let (from, to) = if start <= end { (start, end) } else { (end, start) };
    from.iter_days()
        .take_while(|day| *day < to)
        .filter(|day| is_business_day(*day))
        .map(|_| 1_u64)
        .sum()
}

/// Whether `a` and `b` fall on the same UTC calendar day.
#[must_use]
pub fn is_same_day(a: &DateTime<Utc>, b: &DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}

/// Human-readable elapsed time from `t` to `now`, e.g. `3 hours ago`.
#[must_use]
pub fn time_ago(t: &DateTime<Utc>, now: &DateTime<Utc>) -> String {
    let elapsed = *now - *t;
    let seconds = elapsed.num_seconds();
    if seconds < 60 {
        return if seconds <= 1 {
            "just now".to_owned()
        } else {
            format!("{seconds} seconds ago")
        };
    }
    if elapsed.num_minutes() < 60 {
        return plural(elapsed.num_minutes(), "minute");
    }
    if elapsed.num_hours() < 24 {
        return plural(elapsed.num_hours(), "hour");
    }
    let days = elapsed.num_days();
    if days < 7 {
        return plural(days, "day");
    }
    if days < 28 {
        return plural(days / 7, "week");
    }
    if days < 360 {
        return plural((days / 30).max(1), "month");
    }
    plural((days / 365).max(1), "year")
}

/// Failures from [`parse_duration`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationParseError {
    /// Nothing to parse.
    #[error("empty duration")]
    Empty,
    /// Negative durations are not representable.
    #[error("negative duration '{input}'")]
    Negative { input: String },
    /// A component lacks a unit suffix.
    #[error("missing unit in duration '{input}'")]
    MissingUnit { input: String },
    /// A component uses an unknown unit.
    #[error("unknown unit '{unit}' in duration '{input}'")]
    UnknownUnit { unit: String, input: String },
    /// A numeric component is malformed.
    #[error("invalid duration '{input}'")]
    InvalidNumber { input: String },
    /// The total does not fit in a `Duration`.
    #[error("duration '{input}' overflows")]
    Overflow { input: String },
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(1_000_000_000),
        "m" => Some(60_000_000_000),
        "h" => Some(3_600_000_000_000),
        _ => None,
    }
}

/// Parse a Go-style duration such as `1h`, `1h30m`, `1.5s` or `250ms`.
///
/// The bare string `0` is accepted; every other component needs a unit.
///
/// # Errors
///
/// Returns a [`DurationParseError`] describing the first malformed component.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use service_commons::utils::time::parse_duration;
///
/// assert_eq!(parse_duration("1h30m"), Ok(Duration::from_secs(5400)));
/// assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
/// ```
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::Empty);
    }
    if trimmed.starts_with('-') {
        return Err(DurationParseError::Negative {
            input: input.to_owned(),
        });
    }
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if body == "0" {
        return Ok(Duration::ZERO);
    }

    let invalid = || DurationParseError::InvalidNumber {
        input: input.to_owned(),
    };
    let overflow = || DurationParseError::Overflow {
        input: input.to_owned(),
    };

    let mut total: u128 = 0;
    let mut rest = body;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| DurationParseError::MissingUnit {
                input: input.to_owned(),
            })?;
        let (number, tail) = rest.split_at(number_end);
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);
        let scale = unit_nanos(unit).ok_or_else(|| DurationParseError::UnknownUnit {
            unit: unit.to_owned(),
            input: input.to_owned(),
        })?;

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
            return Err(invalid());
        }
        let whole_value: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut nanos = whole_value.checked_mul(scale).ok_or_else(overflow)?;
        if !fraction.is_empty() {
            let digits = u32::try_from(fraction.len()).map_err(|_| invalid())?;
            let fraction_value: u128 = fraction.parse().map_err(|_| invalid())?;
            let divisor = 10_u128.checked_pow(digits).ok_or_else(overflow)?;
            let scaled = fraction_value.checked_mul(scale).ok_or_else(overflow)?;
            nanos = nanos.checked_add(scaled / divisor).ok_or_else(overflow)?;
        }
        total = total.checked_add(nanos).ok_or_else(overflow)?;
        rest = next;
    }

    u64::try_from(total)
        .map(Duration::from_nanos)
        .map_err(|_| overflow())
}
