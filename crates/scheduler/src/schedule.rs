//! Cron parsing: 5-field normalization, descriptors and fixed intervals.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::SchedulerError;

/// When an entry fires.
#[derive(Debug, Clone)]
pub enum Schedule {
    /// Fires at the earliest upcoming time of any of the schedules.
    Cron(Vec<::cron::Schedule>),
    /// `@every <duration>`: fixed delay measured from the previous computation.
    Every(Duration),
}

impl Schedule {
    /// Parse a standard 5-field expression, a 6-field expression with seconds,
    /// a named descriptor (`@daily`, `@hourly`, ...) or `@every <duration>`.
    pub fn parse(spec: &str) -> Result<Self, SchedulerError> {
        let spec = spec.trim();
        let invalid = |reason: &str| SchedulerError::InvalidSchedule {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        if let Some(rest) = spec.strip_prefix("@every") {
            let interval = parse_duration(rest)
                .ok_or_else(|| invalid("expected a duration such as 90s or 1h30m"))?;
            if interval.is_zero() {
                return Err(invalid("interval must be positive"));
            }
            return Ok(Self::Every(interval));
        }

        let exprs = match expand_descriptor(spec) {
            Some(expr) => vec![expr.to_string()],
            None if spec.starts_with('@') => return Err(invalid("unknown descriptor")),
            None => split_day_fields(spec)
                .iter()
                .map(|expr| normalize_cron(expr))
                .collect(),
        };

        exprs
            .iter()
            .map(|expr| ::cron::Schedule::from_str(expr))
            .collect::<Result<Vec<_>, _>>()
            .map(Self::Cron)
            .map_err(|e| invalid(&e.to_string()))
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Cron(schedules) => schedules
                .iter()
                .filter_map(|s| s.after(&after).next())
                .min(),
            Self::Every(interval) => chrono::Duration::from_std(*interval)
                .ok()
                .and_then(|d| after.checked_add_signed(d)),
        }
    }
}

fn expand_descriptor(spec: &str) -> Option<&'static str> {
    match spec {
        "@yearly" | "@annually" => Some("0 0 0 1 1 *"),
        "@monthly" => Some("0 0 0 1 * *"),
        "@weekly" => Some("0 0 0 * * Sun"),
        "@daily" | "@midnight" => Some("0 0 0 * * *"),
        "@hourly" => Some("0 0 * * * *"),
        _ => None,
    }
}

/// Standard cron fires when either day field matches if both are restricted;
/// the `cron` crate requires both. Such a 5-field expression is split into
/// one expression per day field.
fn split_day_fields(expr: &str) -> Vec<String> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    let restricted = |f: &str| f != "*" && f != "?";
    if fields.len() != 5 || !restricted(fields[2]) || !restricted(fields[4]) {
        return vec![expr.trim().to_string()];
    }

    let mut by_month_day = fields.clone();
    by_month_day[4] = "*";
    let mut by_week_day = fields;
    by_week_day[2] = "*";
    vec![by_month_day.join(" "), by_week_day.join(" ")]
}

/// Normalize a 5-field cron expression to the 6-field form the `cron` crate
/// expects, by prepending "0 " for seconds.
///
/// Numeric day-of-week values are shifted as well: standard cron counts
/// Sunday as 0 (or 7), the `cron` crate counts it as 1.
pub fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    if fields.len() != 5 {
        // Already 6-field or non-standard; pass through as-is.
        return trimmed.to_string();
    }
    format!(
        "0 {} {} {} {} {}",
        fields[0],
        fields[1],
        fields[2],
        fields[3],
        translate_day_of_week(fields[4])
    )
}

fn translate_day_of_week(field: &str) -> String {
    if field == "*" || field == "?" {
        return field.to_string();
    }
    field
        .split(',')
        .map(translate_day_of_week_part)
        .collect::<Vec<_>>()
        .join(",")
}

/// Expand one list element (`3`, `1-5`, `*/2`, `1-7/2`) into explicit,
/// shifted day numbers. Anything non-numeric (day names) passes through.
fn translate_day_of_week_part(part: &str) -> String {
    let (base, step) = match part.split_once('/') {
        Some((base, step)) => (base, Some(step)),
        None => (part, None),
    };
    let step = match step.map(str::parse::<usize>) {
        None => 1,
        Some(Ok(n)) if n > 0 => n,
        Some(_) => return part.to_string(),
    };

    let bounds = match base.split_once('-') {
        _ if base == "*" => Some((0, 6)),
        Some((a, b)) => a.parse::<u32>().ok().zip(b.parse::<u32>().ok()),
        None => base
            .parse::<u32>()
            .ok()
            .map(|n| if part.contains('/') { (n, 6) } else { (n, n) }),
    };
    let Some((start, end)) = bounds else {
        return part.to_string();
    };
    if start > end || end > 7 {
        return part.to_string();
    }

    let mut days: Vec<u32> = (start..=end).step_by(step).map(|d| d % 7 + 1).collect();
    days.sort_unstable();
    days.dedup();
    days.iter().map(u32::to_string).collect::<Vec<_>>().join(",")
}

/// Parse a human-readable duration string into a [`Duration`].
///
/// Supports components: `Xd` (days), `Xh` (hours), `Xm` (minutes), `Xs` (seconds).
/// Components can be combined: "2h30m", "1d12h", "90s".
/// Returns `None` if the string is empty or unparseable.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let mut total_secs: u64 = 0;
    let mut num_buf = String::new();
    let mut found_unit = false;

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            num_buf.push(ch);
        } else {
            let n: u64 = num_buf.parse().ok()?;
            num_buf.clear();
            let unit = match ch {
                'd' => 86_400,
                'h' => 3_600,
                'm' => 60,
                's' => 1,
                _ => return None,
            };
            total_secs = total_secs.checked_add(n.checked_mul(unit)?)?;
            found_unit = true;
        }
    }

    // Trailing number without unit is seconds, unless units were already used.
    if !num_buf.is_empty() {
        if found_unit {
            return None;
        }
        total_secs = num_buf.parse().ok()?;
    }

    Some(Duration::from_secs(total_secs))
}
