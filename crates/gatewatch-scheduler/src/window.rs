//! Quiet-window and pacing math. Pure functions, no clocks read here.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Timelike, Utc};
use gatewatch_core::error::{GatewatchError, Result};

const SECS_PER_DAY: u32 = 86_400;

/// Daily `[start, end)` span, in local wall-clock time, during which no tick
/// runs. Wraps midnight when `start > end`; `start == end` disables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl QuietWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Parse `HH:MM` (or `HH:MM:SS`) bounds.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(Self::new(parse_time(start)?, parse_time(end)?))
    }

    /// A window that never pauses.
    pub fn disabled() -> Self {
        Self::new(NaiveTime::MIN, NaiveTime::MIN)
    }

    pub fn is_disabled(&self) -> bool {
        self.start == self.end
    }
}

fn parse_time(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| GatewatchError::config(format!("invalid time of day '{s}': {e}")))
}

/// Parse a fixed UTC offset: `GMT-3`, `UTC+05:30`, `+02:00`, `-0400`, `UTC`, `Z`.
pub fn parse_offset(s: &str) -> Result<FixedOffset> {
    let raw = s.trim();
    let upper = raw.to_ascii_uppercase();
    let rest = upper
        .strip_prefix("GMT")
        .or_else(|| upper.strip_prefix("UTC"))
        .unwrap_or(&upper);

    if rest.is_empty() || rest == "Z" {
        return Ok(Utc.fix());
    }

    let invalid = || GatewatchError::config(format!("invalid time zone offset '{raw}'"));

    let (sign, digits) = if let Some(d) = rest.strip_prefix('+') {
        (1, d)
    } else if let Some(d) = rest.strip_prefix('-') {
        (-1, d)
    } else {
        return Err(invalid());
    };
    if !digits.is_ascii() {
        return Err(invalid());
    }

    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h, m),
        None if digits.len() == 4 => digits.split_at(2),
        None => (digits, "0"),
    };
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Seconds until ticking may resume. 0 outside the quiet window.
pub fn seconds_until_active(now: DateTime<Utc>, offset: FixedOffset, window: &QuietWindow) -> u64 {
    if window.is_disabled() {
        return 0;
    }

    let local = now.with_timezone(&offset).time().num_seconds_from_midnight();
    let start = window.start.num_seconds_from_midnight();
    let end = window.end.num_seconds_from_midnight();

    let inside = if start < end {
        local >= start && local < end
    } else {
        local >= start || local < end
    };
    if !inside {
        return 0;
    }

    u64::from((end + SECS_PER_DAY - local) % SECS_PER_DAY)
}

/// Remaining part of the nominal interval since the previous tick started.
/// An overrunning tick yields zero.
pub fn pacing_delay(elapsed: Duration, interval: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}
