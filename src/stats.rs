use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::model::{Ride, RideAction, RideClassification};

/// Headline numbers for one day.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct TodayStats {
    pub rides_received: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// Fares of accepted rides.
    pub earnings: f64,
    /// Distance of accepted rides.
    pub distance_km: f64,
}

/// Per-day breakdown of a user's rides.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RideAnalytics {
    pub user_id: String,
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub total_rides: usize,

    // by action
    pub pending: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub missed: usize,
    pub expired: usize,

    // by classification
    pub good: usize,
    pub average: usize,
    pub bad: usize,
    pub unknown: usize,

    pub total_earnings: f64,
    pub total_distance_km: f64,
    /// Mean over the rides that have the metric; `None` when none do.
    pub avg_earnings_per_km: Option<f64>,
    pub avg_earnings_per_hour: Option<f64>,
    pub acceptance_rate: f64,
}

fn on_day(rides: &[Ride], date: NaiveDate) -> impl Iterator<Item = &Ride> {
    rides
        .iter()
        .filter(move |r| r.recorded_at().date_naive() == date)
}

pub fn today_stats(rides: &[Ride], date: NaiveDate) -> TodayStats {
    let mut s = TodayStats::default();

    for ride in on_day(rides, date) {
        s.rides_received += 1;
        match ride.action {
            RideAction::Accepted => {
                s.accepted += 1;
                s.earnings += ride.fare_amount;
                s.distance_km += ride.distance_km.unwrap_or(0.0);
            }
            RideAction::Rejected => s.rejected += 1,
            _ => {}
        }
    }

    s
}

pub fn daily_analytics(user_id: &str, date: NaiveDate, rides: &[Ride]) -> RideAnalytics {
    let mut s = RideAnalytics {
        user_id: user_id.to_string(),
        date,
        generated_at: Utc::now(),
        total_rides: 0,
        pending: 0,
        accepted: 0,
        rejected: 0,
        missed: 0,
        expired: 0,
        good: 0,
        average: 0,
        bad: 0,
        unknown: 0,
        total_earnings: 0.0,
        total_distance_km: 0.0,
        avg_earnings_per_km: None,
        avg_earnings_per_hour: None,
        acceptance_rate: 0.0,
    };

    let mut per_km = Vec::new();
    let mut per_hour = Vec::new();

    for ride in on_day(rides, date).filter(|r| r.user_id == user_id) {
        s.total_rides += 1;

        match ride.action {
            RideAction::Pending => s.pending += 1,
            RideAction::Accepted => {
                s.accepted += 1;
                s.total_earnings += ride.fare_amount;
                s.total_distance_km += ride.distance_km.unwrap_or(0.0);
            }
            RideAction::Rejected => s.rejected += 1,
            RideAction::Missed => s.missed += 1,
            RideAction::Expired => s.expired += 1,
        }

        match ride.classification {
            RideClassification::Good => s.good += 1,
            RideClassification::Average => s.average += 1,
            RideClassification::Bad => s.bad += 1,
            RideClassification::Unknown => s.unknown += 1,
        }

        if let Some(v) = ride.earnings_per_km {
            per_km.push(v);
        }
        if let Some(v) = ride.earnings_per_hour {
            per_hour.push(v);
        }
    }

    s.avg_earnings_per_km = mean(&per_km);
    s.avg_earnings_per_hour = mean(&per_hour);
    s.acceptance_rate = pct(s.accepted, s.total_rides);
    s
}

pub fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
