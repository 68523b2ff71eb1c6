//! Display-timezone resolution for normalized event timestamps.
//!
//! Store timestamps arrive as UTC instants. Every calendar-day comparison in
//! the dashboard (date filters, daily buckets, min/max dates) happens after the
//! instant is shifted into one display timezone, so the choice is made once per
//! session and threaded through explicitly.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{DateTime, FixedOffset, Local, Utc};
use chrono_tz::Tz;

pub const DISPLAY_TIMEZONE_LOCAL: &str = "local";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Timezone used to render instants and derive calendar days.
pub enum DisplayTimezone {
    /// Host timezone as reported by the operating system.
    #[default]
    Local,
    Named(Tz),
}

impl DisplayTimezone {
    pub fn utc() -> Self {
        Self::Named(Tz::UTC)
    }

    /// Shifts a UTC instant into this timezone, keeping the offset explicit.
    pub fn to_display(self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            Self::Local => instant.with_timezone(&Local).fixed_offset(),
            Self::Named(tz) => instant.with_timezone(&tz).fixed_offset(),
        }
    }

    pub fn label(self) -> String {
        match self {
            Self::Local => DISPLAY_TIMEZONE_LOCAL.to_string(),
            Self::Named(tz) => tz.name().to_string(),
        }
    }
}

impl FromStr for DisplayTimezone {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(DISPLAY_TIMEZONE_LOCAL) {
            return Ok(Self::Local);
        }
        trimmed
            .parse::<Tz>()
            .map(Self::Named)
            .map_err(|_| anyhow!("unknown timezone '{trimmed}' (expected IANA name or 'local')"))
    }
}

impl fmt::Display for DisplayTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
