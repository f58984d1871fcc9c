//! Daily operating windows
//!
//! Schedules describe recurring daily intervals as `HHMM` strings. A station
//! is active when the current wall-clock time, in a fixed UTC offset, falls
//! inside any of its intervals. Intervals are half-open, `[start, end)`, and
//! an interval whose start is later than its end wraps past midnight.

use std::fmt;

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::RadarHubError;

/// Offset used for station wall-clock time unless configured otherwise.
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 7;

/// Time of day with minute resolution, written as four digits (`"0130"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hhmm(u16);

impl Hhmm {
    /// Parse a four digit `HHMM` string; hours 00-23, minutes 00-59.
    pub fn parse(value: &str) -> Result<Self, RadarHubError> {
        let bytes = value.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(u8::is_ascii_digit) {
            return Err(RadarHubError::InvalidHhmm(value.to_string()));
        }
        let digit = |i: usize| u16::from(bytes[i] - b'0');
        let hours = digit(0) * 10 + digit(1);
        let minutes = digit(2) * 10 + digit(3);
        if hours > 23 || minutes > 59 {
            return Err(RadarHubError::InvalidHhmm(value.to_string()));
        }
        Ok(Self(hours * 60 + minutes))
    }

    /// Build from hour and minute components.
    pub fn from_hm(hours: u32, minutes: u32) -> Result<Self, RadarHubError> {
        if hours > 23 || minutes > 59 {
            return Err(RadarHubError::InvalidHhmm(format!(
                "{:02}{:02}",
                hours, minutes
            )));
        }
        Ok(Self((hours * 60 + minutes) as u16))
    }

    /// Minutes since midnight.
    pub fn minute_of_day(&self) -> u16 {
        self.0
    }

    pub fn hours(&self) -> u16 {
        self.0 / 60
    }

    pub fn minutes(&self) -> u16 {
        self.0 % 60
    }
}

impl fmt::Display for Hhmm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{:02}", self.hours(), self.minutes())
    }
}

impl TryFrom<String> for Hhmm {
    type Error = RadarHubError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Hhmm {
    type Error = RadarHubError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Hhmm> for String {
    fn from(value: Hhmm) -> Self {
        value.to_string()
    }
}

/// Whether `now` lies in `[start, end)`, wrapping past midnight when
/// `start > end`.
pub fn is_within_window(now: Hhmm, start: Hhmm, end: Hhmm) -> bool {
    if start <= end {
        start <= now && now < end
    } else {
        now >= start || now < end
    }
}

/// Whether any `(start, end)` interval contains `now`. False for no intervals.
pub fn any_window_contains<I>(now: Hhmm, windows: I) -> bool
where
    I: IntoIterator<Item = (Hhmm, Hhmm)>,
{
    windows
        .into_iter()
        .any(|(start, end)| is_within_window(now, start, end))
}

/// Fixed offset for `hours` east of UTC.
pub fn utc_offset(hours: i32) -> Result<FixedOffset, RadarHubError> {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| RadarHubError::ConfigurationError {
            message: format!("UTC offset out of range: {} hours", hours),
        })
}

/// Wall-clock time of day of `instant` in `offset`.
pub fn hhmm_at(instant: DateTime<Utc>, offset: FixedOffset) -> Hhmm {
    let local = instant.with_timezone(&offset);
    // chrono guarantees hour < 24 and minute < 60
    Hhmm((local.hour() * 60 + local.minute()) as u16)
}
