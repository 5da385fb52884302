//! Half-day capacity buckets.
//!
//! Every calendar date has two independent capacity buckets, AM and PM.
//! The clinic sees patients 08:00-12:00 in the morning block and
//! 13:00-17:00 in the afternoon block; the noon hour is not bookable.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opening time of the AM block.
pub const AM_OPEN: NaiveTime = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
/// End of the AM block (exclusive).
pub const AM_CLOSE: NaiveTime = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
/// Opening time of the PM block.
pub const PM_OPEN: NaiveTime = NaiveTime::from_hms_opt(13, 0, 0).unwrap();
/// End of the PM block (exclusive).
pub const PM_CLOSE: NaiveTime = NaiveTime::from_hms_opt(17, 0, 0).unwrap();

/// One of the two half-day capacity buckets of a clinic day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HalfDay {
    /// Morning block, 08:00-12:00.
    Am,
    /// Afternoon block, 13:00-17:00.
    Pm,
}

impl HalfDay {
    /// Classifies a time of day into its half-day bucket.
    ///
    /// Anything before noon is AM, everything else PM. Whether the time
    /// actually falls inside a bookable window is a separate validation
    /// concern (see [`crate::validate::validate_schedule`]).
    #[must_use]
    pub fn of_time(time: NaiveTime) -> Self {
        if time.hour() < 12 { Self::Am } else { Self::Pm }
    }

    /// Stable storage/wire form, `"AM"` or `"PM"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Am => "AM",
            Self::Pm => "PM",
        }
    }
}

impl fmt::Display for HalfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a half-day label fails.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown half-day label: {value}")]
pub struct ParseHalfDayError {
    /// The rejected label.
    pub value: String,
}

impl FromStr for HalfDay {
    type Err = ParseHalfDayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AM" => Ok(Self::Am),
            "PM" => Ok(Self::Pm),
            other => Err(ParseHalfDayError {
                value: other.to_string(),
            }),
        }
    }
}

/// Identifies one capacity bucket: a calendar date plus a half-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    /// The clinic date.
    pub date: NaiveDate,
    /// Which half of that date.
    pub half_day: HalfDay,
}

impl SlotKey {
    /// Creates a slot key.
    #[must_use]
    pub const fn new(date: NaiveDate, half_day: HalfDay) -> Self {
        Self { date, half_day }
    }

    /// The slot a scheduled date-time falls into.
    #[must_use]
    pub fn of(when: NaiveDateTime) -> Self {
        Self {
            date: when.date(),
            half_day: HalfDay::of_time(when.time()),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.half_day)
    }
}
