//! Watering schedule derivations.
//!
//! Everything here is pure: a plant record plus the current time in, a
//! value out. None of these functions fail; "can't tell" is `None` or
//! [`UrgencyStatus::NoIntervalSet`].

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

pub const UNKNOWN_NAME: &str = "Unknown";

const DAY_MS: i64 = 86_400_000;

/// Ordered substring rules, first match wins. More specific phrases sit
/// above the general ones ("every 2 weeks" before "weekly").
const INTERVAL_RULES: &[(&[&str], u32)] = &[
    (&["daily"], 1),
    (&["frequent", "every 2 days", "very often"], 2),
    (&["every 2 weeks", "fortnight"], 14),
    (&["weekly", "once a week"], 7),
    (&["monthly", "once a month"], 30),
    (&["average", "moderate"], 5),
    (&["rare", "minimal", "minimum", "low"], 10),
];

fn day_count_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(\d+)\s*(?:days?|d)\b").expect("day count pattern is valid")
    })
}

/// Guesses a watering interval in days from free-text care guidance.
pub fn infer_interval_days(guidance: Option<&str>) -> Option<u32> {
    let text = guidance?.trim();
    if text.is_empty() {
        return None;
    }
    let lower = text.to_lowercase();

    for (needles, days) in INTERVAL_RULES {
        if needles.iter().any(|n| lower.contains(n)) {
            return Some(*days);
        }
    }

    day_count_pattern()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|days| *days > 0)
}

/// Anything with a watering interval and an optional last watering.
pub trait Waterable {
    fn watering_interval_days(&self) -> Option<u32>;
    fn last_watered_at(&self) -> Option<DateTime<Utc>>;
}

/// Anything that can be shown by name.
pub trait Named {
    fn common_name(&self) -> Option<&str>;
    fn scientific_name(&self) -> Option<&str>;

    fn display_name(&self) -> &str {
        non_blank(self.common_name())
            .or_else(|| non_blank(self.scientific_name()))
            .unwrap_or(UNKNOWN_NAME)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrgencyStatus {
    NoIntervalSet,
    WaterToday,
    NeedsWaterNow,
    WaterTomorrow,
    WaterInNDays(i64),
}

impl fmt::Display for UrgencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrgencyStatus::NoIntervalSet => write!(f, "Sin intervalo de riego"),
            UrgencyStatus::WaterToday => write!(f, "Regar hoy"),
            UrgencyStatus::NeedsWaterNow => write!(f, "Necesita agua ya"),
            UrgencyStatus::WaterTomorrow => write!(f, "Regar mañana"),
            UrgencyStatus::WaterInNDays(n) => write!(f, "Regar en {} días", n),
        }
    }
}

pub fn next_watering_due(
    interval_days: Option<u32>,
    last_watered_at: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    let days = interval_days?;
    let last = last_watered_at?;
    last.checked_add_signed(Duration::days(i64::from(days)))
}

pub fn compute_urgency_status(
    interval_days: Option<u32>,
    last_watered_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> UrgencyStatus {
    if interval_days.is_none() {
        return UrgencyStatus::NoIntervalSet;
    }
    let Some(next) = next_watering_due(interval_days, last_watered_at) else {
        return UrgencyStatus::WaterToday;
    };

    match ceil_days((next - now).num_milliseconds()) {
        d if d <= 0 => UrgencyStatus::NeedsWaterNow,
        1 => UrgencyStatus::WaterTomorrow,
        d => UrgencyStatus::WaterInNDays(d),
    }
}

pub fn urgency_of<T: Waterable>(record: &T, now: DateTime<Utc>) -> UrgencyStatus {
    compute_urgency_status(record.watering_interval_days(), record.last_watered_at(), now)
}

// Integer division truncates toward zero, which is already the ceiling for
// negative numerators.
fn ceil_days(ms: i64) -> i64 {
    let whole = ms / DAY_MS;
    if ms % DAY_MS > 0 {
        whole + 1
    } else {
        whole
    }
}

/// Time left until the record is due. A plant with an interval that was
/// never watered is due now; one without an interval has no due time.
fn due_in<T: Waterable>(record: &T, now: DateTime<Utc>) -> Option<Duration> {
    record.watering_interval_days()?;
    match next_watering_due(record.watering_interval_days(), record.last_watered_at()) {
        Some(next) => Some(next - now),
        None => Some(Duration::zero()),
    }
}

/// Most urgent first; records without a due time go last. Stable.
pub fn sort_by_urgency<T: Waterable>(mut records: Vec<T>, now: DateTime<Utc>) -> Vec<T> {
    records.sort_by(|a, b| match (due_in(a, now), due_in(b, now)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    records
}

/// Keeps the first record for each display name, case-insensitively.
/// Records without a usable name are all kept.
pub fn dedupe_by_display_name<T: Named>(records: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            let name = record.display_name();
            name == UNKNOWN_NAME || seen.insert(name.to_lowercase())
        })
        .collect()
}
