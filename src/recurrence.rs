//! Expansion of a base instant and a repetition rule into candidate instants.
//!
//! The sequence is lazy and holds no resources: the `k`-th element is always
//! computed from the base instant, so the same three inputs regenerate the
//! same sequence. Monthly steps keep the base day-of-month and clamp to the
//! last day of shorter months (Jan 31 -> Feb 28 -> Mar 31).

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, Months, NaiveDateTime};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorCode};

/// Named repetition rule for a recurring series.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurrencePattern {
    #[sea_orm(string_value = "DAILY")]
    Daily,
    #[sea_orm(string_value = "WEEKLY")]
    Weekly,
    #[sea_orm(string_value = "MONTHLY")]
    Monthly,
}

impl RecurrencePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
        }
    }

    /// The `step`-th occurrence after `base`, or `None` past chrono's range.
    fn nth_after(&self, base: NaiveDateTime, step: u32) -> Option<NaiveDateTime> {
        match self {
            Self::Daily => base.checked_add_signed(Duration::days(i64::from(step))),
            Self::Weekly => base.checked_add_signed(Duration::weeks(i64::from(step))),
            Self::Monthly => base.checked_add_months(Months::new(step)),
        }
    }
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrencePattern {
    type Err = Error;

    /// Case-insensitive, like the wire format has always accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Ok(Self::Daily),
            "WEEKLY" => Ok(Self::Weekly),
            "MONTHLY" => Ok(Self::Monthly),
            _ => Err(Error::rejected(
                ErrorCode::InvalidRecurringPattern,
                format!("Unsupported pattern '{s}'; supported patterns are DAILY, WEEKLY, MONTHLY"),
            )),
        }
    }
}

/// Finite, restartable sequence of occurrences in `[base, end]`.
#[derive(Debug, Clone)]
pub struct Recurrence {
    base: NaiveDateTime,
    pattern: RecurrencePattern,
    end: NaiveDateTime,
    step: u32,
    done: bool,
}

impl Recurrence {
    pub fn new(base: NaiveDateTime, pattern: RecurrencePattern, end: NaiveDateTime) -> Self {
        Self {
            base,
            pattern,
            end,
            step: 0,
            done: false,
        }
    }

    pub fn pattern(&self) -> RecurrencePattern {
        self.pattern
    }

    /// A fresh copy of this sequence positioned at the base instant.
    pub fn restart(&self) -> Self {
        Self::new(self.base, self.pattern, self.end)
    }
}

impl Iterator for Recurrence {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.pattern.nth_after(self.base, self.step) {
            Some(next) if next <= self.end => {
                self.step += 1;
                Some(next)
            }
            _ => {
                self.done = true;
                None
            }
        }
    }
}

impl std::iter::FusedIterator for Recurrence {}

/// Parse `pattern` and expand it; unknown patterns fail with
/// `INVALID_RECURRING_PATTERN`.
pub fn expand(base: NaiveDateTime, pattern: &str, end: NaiveDateTime) -> Result<Recurrence, Error> {
    let pattern = pattern.parse::<RecurrencePattern>()?;
    Ok(Recurrence::new(base, pattern, end))
}
