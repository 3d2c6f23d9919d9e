use crate::error::{StatsError, StatsResult};
use chrono::{DateTime, Days, Duration, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

static RELATIVE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-(\d+)([dwmy])$").expect("relative date pattern is valid"));

static ISO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4})-(\d{2})-(\d{2})(?:[Tt ](\d{2}):(\d{2})(?::(\d{2})(?:\.(\d{1,9}))?)?([Zz]|[+-]\d{2}:?\d{2})?)?$",
    )
    .expect("iso date pattern is valid")
});

/// Parse a human-friendly date expression into an absolute instant.
///
/// Accepted forms, checked in this order:
/// - `now` (and the empty string): `now` itself
/// - `today`: local midnight of the current day
/// - `-<N><unit>` with unit `d`, `w` (7d), `m` (30d) or `y` (365d)
/// - ISO 8601 date (`2025-01-01`, UTC midnight) or date-time, with an
///   optional `Z`/`±hh:mm` offset (UTC when omitted)
///
/// Day-of-month overflow rolls over into the next month (`2025-02-30` is
/// March 2nd); month 0/13 and out-of-range time fields are rejected.
pub fn parse_flexible_date(expr: &str, now: DateTime<Utc>) -> StatsResult<DateTime<Utc>> {
    match expr {
        "" | "now" => return Ok(now),
        "today" => return Ok(local_midnight(now)),
        _ => {}
    }

    if let Some(caps) = RELATIVE_PATTERN.captures(expr) {
        return parse_relative(expr, &caps[1], &caps[2], now);
    }

    if let Some(caps) = ISO_PATTERN.captures(expr) {
        return parse_iso(expr, &caps);
    }

    Err(invalid(expr))
}

/// Same as [`parse_flexible_date`], treating an absent expression as `now`.
pub fn parse_optional_date(expr: Option<&str>, now: DateTime<Utc>) -> StatsResult<DateTime<Utc>> {
    parse_flexible_date(expr.unwrap_or("now"), now)
}

fn invalid(expr: &str) -> StatsError {
    StatsError::InvalidDateFormat {
        input: expr.to_string(),
    }
}

fn local_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now
        .with_timezone(&Local)
        .date_naive()
        .and_time(NaiveTime::MIN);

    // A DST gap at midnight has no local representation; fall back to UTC.
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

fn parse_relative(
    expr: &str,
    amount: &str,
    unit: &str,
    now: DateTime<Utc>,
) -> StatsResult<DateTime<Utc>> {
    let amount: i64 = amount.parse().map_err(|_| invalid(expr))?;
    let days_per_unit = match unit {
        "d" => 1,
        "w" => 7,
        "m" => 30,
        "y" => 365,
        _ => return Err(invalid(expr)),
    };

    amount
        .checked_mul(days_per_unit)
        .and_then(Duration::try_days)
        .and_then(|offset| now.checked_sub_signed(offset))
        .ok_or_else(|| invalid(expr))
}

fn parse_iso(expr: &str, caps: &regex::Captures<'_>) -> StatsResult<DateTime<Utc>> {
    let field = |index: usize| -> StatsResult<u32> {
        caps.get(index)
            .map(|m| m.as_str().parse::<u32>().map_err(|_| invalid(expr)))
            .unwrap_or(Ok(0))
    };

    let year: i32 = caps[1].parse().map_err(|_| invalid(expr))?;
    let month = field(2)?;
    let day = field(3)?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(invalid(expr));
    }

    // Roll-over: start at the 1st and add the remaining days.
    let date = NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.checked_add_days(Days::new(u64::from(day - 1))))
        .ok_or_else(|| invalid(expr))?;

    let hour = field(4)?;
    let minute = field(5)?;
    let second = field(6)?;
    let nanos = match caps.get(7) {
        Some(fraction) => {
            let digits = format!("{:0<9}", fraction.as_str());
            digits.parse::<u32>().map_err(|_| invalid(expr))?
        }
        None => 0,
    };
    let time =
        NaiveTime::from_hms_nano_opt(hour, minute, second, nanos).ok_or_else(|| invalid(expr))?;
    let naive = date.and_time(time);

    match caps.get(8).map(|m| m.as_str()) {
        None | Some("Z") | Some("z") => Ok(Utc.from_utc_datetime(&naive)),
        Some(offset) => {
            let offset = parse_offset(offset).ok_or_else(|| invalid(expr))?;
            offset
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| invalid(expr))
        }
    }
}

fn parse_offset(offset: &str) -> Option<FixedOffset> {
    let sign = if offset.starts_with('-') { -1 } else { 1 };
    let digits: String = offset[1..].chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 4 {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
