//! Timestamp normalizer
//!
//! Operators export dates from whatever system they are migrating away from,
//! so the same column can hold `1/2/25 5:04 PM`, `01-02-2025` or
//! `2025-01-02 17:04`. Numeric day/month order is decided by the configured
//! locale, never guessed from the values.

use std::str::FromStr;

use chrono::{
    DateTime, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone,
};
use chrono_tz::Tz;

use crate::error::ParseError;

/// Order of day and month in numeric dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLocale {
    /// month/day/year
    Us,
    /// day/month/year
    Intl,
}

impl FromStr for DateLocale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "US" => Ok(Self::Us),
            "INTL" => Ok(Self::Intl),
            other => Err(format!("unknown timestamp format '{}', expected US or INTL", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimestampNormalizer {
    locale: DateLocale,
    timezone: Tz,
}

impl TimestampNormalizer {
    pub fn new(locale: DateLocale, timezone: Tz) -> Self {
        Self { locale, timezone }
    }

    pub fn locale(&self) -> DateLocale {
        self.locale
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Parse `raw` and localize it to the configured timezone.
    pub fn normalize(&self, raw: &str) -> Result<DateTime<FixedOffset>, ParseError> {
        let naive = self.parse_naive(raw)?;

        match self.timezone.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Ok(dt.with_timezone(&dt.offset().fix())),
            // DST fall-back: the wall clock shows this time twice
            LocalResult::Ambiguous(earliest, _) => {
                Ok(earliest.with_timezone(&earliest.offset().fix()))
            }
            LocalResult::None => Err(ParseError::NonexistentLocalTime(raw.trim().to_string())),
        }
    }

    /// Parse `raw` into a wall-clock date and time without a zone.
    pub fn parse_naive(&self, raw: &str) -> Result<NaiveDateTime, ParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParseError::Empty);
        }

        let split = trimmed.split_once(|c: char| c.is_whitespace() || c == 'T');
        let (date_part, time_part) = match split {
            Some((date, time)) => (date, Some(time.trim())),
            None => (trimmed, None),
        };

        let date = self.parse_date(date_part, trimmed)?;
        let time = match time_part {
            Some(t) if !t.is_empty() => parse_time(t, trimmed)?,
            _ => NaiveTime::MIN,
        };

        Ok(date.and_time(time))
    }

    fn parse_date(&self, date_part: &str, raw: &str) -> Result<NaiveDate, ParseError> {
        let unrecognized = || ParseError::Unrecognized(raw.to_string());

        let delimiter = match (date_part.contains('-'), date_part.contains('/')) {
            (true, false) => '-',
            (false, true) => '/',
            _ => return Err(unrecognized()),
        };

        let parts: Vec<&str> = date_part.split(delimiter).collect();
        let numeric = |p: &&str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
        if parts.len() != 3 || !parts.iter().all(numeric) {
            return Err(unrecognized());
        }

        let (year, month, day) = if parts[0].len() == 4 {
            (parts[0], parts[1], parts[2])
        } else {
            match self.locale {
                DateLocale::Us => (parts[2], parts[0], parts[1]),
                DateLocale::Intl => (parts[2], parts[1], parts[0]),
            }
        };

        if month.len() > 2 || day.len() > 2 {
            return Err(unrecognized());
        }

        let year: i32 = match year.len() {
            4 => year.parse().map_err(|_| unrecognized())?,
            2 => expand_two_digit_year(year.parse().map_err(|_| unrecognized())?),
            _ => return Err(unrecognized()),
        };
        let month: u32 = month.parse().map_err(|_| unrecognized())?;
        let day: u32 = day.parse().map_err(|_| unrecognized())?;

        NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| ParseError::InvalidDate(raw.to_string()))
    }
}

/// 00-68 → 2000s, 69-99 → 1900s, same pivot as strptime's `%y`.
fn expand_two_digit_year(yy: i32) -> i32 {
    if yy < 69 {
        2000 + yy
    } else {
        1900 + yy
    }
}

fn parse_time(time_part: &str, raw: &str) -> Result<NaiveTime, ParseError> {
    let unrecognized = || ParseError::Unrecognized(raw.to_string());

    let upper = time_part.to_ascii_uppercase();
    let (clock, meridiem) = if let Some(rest) = upper.strip_suffix("AM") {
        (rest.trim_end().to_string(), Some(false))
    } else if let Some(rest) = upper.strip_suffix("PM") {
        (rest.trim_end().to_string(), Some(true))
    } else {
        (upper, None)
    };

    let fields: Vec<&str> = clock.split(':').collect();
    if !(2..=3).contains(&fields.len())
        || fields
            .iter()
            .any(|f| f.is_empty() || f.len() > 2 || !f.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(unrecognized());
    }

    let hour: u32 = fields[0].parse().map_err(|_| unrecognized())?;
    let minute: u32 = fields[1].parse().map_err(|_| unrecognized())?;
    let second: u32 = match fields.get(2) {
        Some(s) => s.parse().map_err(|_| unrecognized())?,
        None => 0,
    };

    let hour = match meridiem {
        None => hour,
        Some(_) if hour == 0 || hour > 12 => return Err(ParseError::InvalidTime(raw.to_string())),
        Some(false) => hour % 12,
        Some(true) => hour % 12 + 12,
    };

    NaiveTime::from_hms_opt(hour, minute, second)
        .ok_or_else(|| ParseError::InvalidTime(raw.to_string()))
}
