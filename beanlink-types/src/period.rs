//! Calendar periods (years, months and days).
//!
//! Unlike a duration, a period is not a fixed amount of time: "one month" is
//! resolved against a calendar. It is carried over the wire in its ISO-8601
//! text form, e.g. `P1Y2M10D`.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A date-based amount of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Period {
    years: i32,
    months: i32,
    days: i32,
}

impl Period {
    /// The zero period.
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Creates a period from its components.
    #[must_use]
    pub const fn new(years: i32, months: i32, days: i32) -> Self {
        Self {
            years,
            months,
            days,
        }
    }

    #[must_use]
    pub const fn of_years(years: i32) -> Self {
        Self::new(years, 0, 0)
    }

    #[must_use]
    pub const fn of_months(months: i32) -> Self {
        Self::new(0, months, 0)
    }

    /// Weeks are stored as days; `of_weeks(2)` equals `of_days(14)`.
    #[must_use]
    pub const fn of_weeks(weeks: i32) -> Self {
        Self::new(0, 0, weeks.saturating_mul(7))
    }

    #[must_use]
    pub const fn of_days(days: i32) -> Self {
        Self::new(0, 0, days)
    }

    #[must_use]
    pub const fn years(&self) -> i32 {
        self.years
    }

    #[must_use]
    pub const fn months(&self) -> i32 {
        self.months
    }

    #[must_use]
    pub const fn days(&self) -> i32 {
        self.days
    }

    /// Returns true if every component is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.years == 0 && self.months == 0 && self.days == 0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("P0D");
        }
        f.write_str("P")?;
        if self.years != 0 {
            write!(f, "{}Y", self.years)?;
        }
        if self.months != 0 {
            write!(f, "{}M", self.months)?;
        }
        if self.days != 0 {
            write!(f, "{}D", self.days)?;
        }
        Ok(())
    }
}

impl FromStr for Period {
    type Err = Error;

    /// Parses `P[nY][nM][nW][nD]`. Units must appear in that order, at most
    /// once each, and at least one must be present.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidPeriod(s.to_string());
        let body = s.strip_prefix('P').ok_or_else(invalid)?;
        if body.is_empty() {
            return Err(invalid());
        }

        const UNITS: [char; 4] = ['Y', 'M', 'W', 'D'];
        let mut period = Period::ZERO;
        let mut next_unit = 0;
        let mut rest = body;

        while !rest.is_empty() {
            let split = rest.find(|c: char| c.is_ascii_alphabetic()).ok_or_else(invalid)?;
            let (number, tail) = rest.split_at(split);
            let unit = tail.chars().next().ok_or_else(invalid)?;
            let amount: i32 = number.parse().map_err(|_| invalid())?;

            let position = UNITS[next_unit..]
                .iter()
                .position(|u| *u == unit)
                .ok_or_else(invalid)?;
            next_unit += position + 1;

            match unit {
                'Y' => period.years = amount,
                'M' => period.months = amount,
                'W' => {
                    period.days = amount.checked_mul(7).ok_or_else(invalid)?;
                }
                'D' => {
                    period.days = period.days.checked_add(amount).ok_or_else(invalid)?;
                }
                _ => return Err(invalid()),
            }
            rest = &tail[unit.len_utf8()..];
        }

        Ok(period)
    }
}
