//! Regex-based field extraction from ride notification text.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::model::SupportedApp;

static FARE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"₹\s*([0-9,]+(?:\.[0-9]{2})?)").expect("fare pattern"));
static DISTANCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9.]+)\s*(?i:km)").expect("distance pattern"));
static DURATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]+)\s*(?i:minutes|minute|mins|min)").expect("duration pattern")
});
static RATING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([0-9.]+)\s*(?:★|star|rating)").expect("rating pattern"));

/// Ride signals pulled out of one notification.
///
/// `earnings_per_km` is present only when `distance_km` is present and
/// positive; `earnings_per_hour` only when `duration_mins` is present and
/// positive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedRideSignals {
    pub fare_amount: f64,
    pub distance_km: Option<f64>,
    pub duration_mins: Option<u32>,
    pub rider_rating: Option<f64>,
    pub earnings_per_km: Option<f64>,
    pub earnings_per_hour: Option<f64>,
    pub source_app: String,
    pub raw_text: String,
}

/// Cheap relevance check: does `text` contain any of the app's markers,
/// ignoring case?
pub fn is_ride_notification(text: &str, app: &SupportedApp) -> bool {
    let haystack = text.to_lowercase();
    app.notification_patterns
        .iter()
        .any(|pattern| haystack.contains(&pattern.to_lowercase()))
}

/// Extracts fare, distance, duration and rating from `text`.
///
/// Never fails. Fields with no match (or an unparseable number) are `None`;
/// the fare falls back to `0.0`. Only the first match of each pattern counts.
pub fn parse_notification(text: &str, app_name: &str) -> ParsedRideSignals {
    let fare_amount = extract_fare(text);
    let distance_km = extract_distance(text);
    let duration_mins = extract_duration(text);
    let rider_rating = extract_rating(text);

    ParsedRideSignals {
        fare_amount,
        distance_km,
        duration_mins,
        rider_rating,
        earnings_per_km: earnings_per_km(fare_amount, distance_km),
        earnings_per_hour: earnings_per_hour(fare_amount, duration_mins),
        source_app: app_name.to_string(),
        raw_text: text.to_string(),
    }
}

fn first_capture<'t>(pattern: &Regex, text: &'t str) -> Option<&'t str> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn extract_fare(text: &str) -> f64 {
    first_capture(&FARE_PATTERN, text)
        .and_then(|amount| amount.replace(',', "").parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn extract_distance(text: &str) -> Option<f64> {
    first_capture(&DISTANCE_PATTERN, text).and_then(|d| d.parse().ok())
}

fn extract_duration(text: &str) -> Option<u32> {
    first_capture(&DURATION_PATTERN, text).and_then(|d| d.parse().ok())
}

fn extract_rating(text: &str) -> Option<f64> {
    first_capture(&RATING_PATTERN, text).and_then(|r| r.parse().ok())
}

fn earnings_per_km(fare: f64, distance_km: Option<f64>) -> Option<f64> {
    distance_km.filter(|d| *d > 0.0).map(|d| fare / d)
}

fn earnings_per_hour(fare: f64, duration_mins: Option<u32>) -> Option<f64> {
    duration_mins
        .filter(|m| *m > 0)
        .map(|m| fare / f64::from(m) * 60.0)
}
