//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use mt_core::{Clock, Meta, RequestTime};

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").unwrap());

/// Signed compound durations such as `-15m`, `+1h30m` or `90s`.
static SHIFT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-])?(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$").unwrap()
});

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Parse a datetime string as either ISO 8601 or relative time.
///
/// Supports:
/// - ISO 8601: "2026-01-15T10:30:00Z"
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
/// - "now"
///
/// Relative values are measured back from `now`.
pub fn parse_datetime(s: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();
    if s == "now" {
        return Ok(now);
    }

    // Try ISO 8601 first
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Try relative time: "N hours/minutes/days/weeks ago"
    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use ISO 8601 (e.g., 2026-01-15T10:30:00Z) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    // Safe to create Duration now that we've validated the range
    let duration = Duration::minutes(n * minutes_per_unit);
    Ok(now - duration)
}

/// Parse a signed duration like `-15m`, `+1h30m` or `90s`.
pub fn parse_shift(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    let caps = SHIFT_RE
        .captures(s)
        .filter(|caps| caps.get(2).is_some() || caps.get(3).is_some() || caps.get(4).is_some())
        .with_context(|| format!("Invalid shift: {s}. Use e.g. -15m, +1h30m or 90s"))?;

    let mut seconds: i64 = 0;
    for (index, unit_seconds) in [(2, 3600), (3, 60), (4, 1)] {
        if let Some(value) = caps.get(index) {
            let value: i64 = value
                .as_str()
                .parse()
                .with_context(|| format!("shift component too large: {s}"))?;
            seconds = value
                .checked_mul(unit_seconds)
                .and_then(|part| seconds.checked_add(part))
                .filter(|total| *total <= MAX_RELATIVE_MINUTES * 60)
                .with_context(|| format!("shift too large: {s}"))?;
        }
    }

    if caps.get(1).is_some_and(|sign| sign.as_str() == "-") {
        seconds = -seconds;
    }
    Ok(Duration::seconds(seconds))
}

/// Resolve the instant a command acts at from `--at` and `--shift`.
pub fn request_time(
    at: Option<&str>,
    shift: Option<&str>,
    clock: &impl Clock,
) -> anyhow::Result<DateTime<Utc>> {
    let now = clock.now();
    let mut request = match at {
        Some(at) => RequestTime::at(parse_datetime(at, now)?),
        None => RequestTime::now(),
    };
    if let Some(shift) = shift {
        request = request.shifted(parse_shift(shift)?);
    }
    Ok(request.resolve(clock))
}

/// Parse a JSON object given on the command line.
pub fn parse_meta(s: &str) -> anyhow::Result<Meta> {
    serde_json::from_str(s).with_context(|| format!("meta must be a JSON object, got: {s}"))
}

/// Format a duration as "Xh Ym" or "Ym".
pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes();
    if total_minutes < 0 {
        return "0m".to_string();
    }
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Format an instant for text output.
pub fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}
