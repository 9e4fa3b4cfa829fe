//! The persisted ride record and its decision state.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the driver did with an offered ride.
///
/// Every ride starts as [`RideAction::Pending`]. The other variants are
/// terminal: once a ride has been accepted, rejected, missed or expired it
/// never moves again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideAction {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Missed,
    Expired,
}

impl RideAction {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RideAction::Pending)
    }

    /// Returns `true` if a ride currently in `self` may move to `next`.
    ///
    /// Re-applying the current terminal action is allowed so that a retried
    /// user tap is harmless.
    pub fn can_transition_to(self, next: RideAction) -> bool {
        match self {
            RideAction::Pending => next.is_terminal(),
            current => current == next,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RideAction::Pending => "pending",
            RideAction::Accepted => "accepted",
            RideAction::Rejected => "rejected",
            RideAction::Missed => "missed",
            RideAction::Expired => "expired",
        }
    }
}

impl fmt::Display for RideAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RideAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(RideAction::Pending),
            "accepted" => Ok(RideAction::Accepted),
            "rejected" => Ok(RideAction::Rejected),
            "missed" => Ok(RideAction::Missed),
            "expired" => Ok(RideAction::Expired),
            other => Err(format!(
                "unknown ride action '{other}' \
                 (expected pending, accepted, rejected, missed or expired)"
            )),
        }
    }
}

/// Overall quality verdict for a ride.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideClassification {
    Good,
    Average,
    Bad,
    /// No metric was available to judge the ride.
    #[default]
    Unknown,
}

impl RideClassification {
    pub fn label(self) -> &'static str {
        match self {
            RideClassification::Good => "GOOD",
            RideClassification::Average => "AVERAGE",
            RideClassification::Bad => "BAD",
            RideClassification::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for RideClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A ride offer as stored locally and mirrored to the backend `rides` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub source_app: String,

    #[serde(default)]
    pub pickup_location: Option<String>,
    #[serde(default)]
    pub dropoff_location: Option<String>,
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub estimated_duration_mins: Option<u32>,

    pub fare_amount: f64,
    #[serde(default)]
    pub surge_multiplier: Option<f64>,
    #[serde(default)]
    pub tip_amount: Option<f64>,

    #[serde(default)]
    pub earnings_per_km: Option<f64>,
    #[serde(default)]
    pub earnings_per_hour: Option<f64>,
    #[serde(default)]
    pub rider_rating: Option<f64>,

    #[serde(default)]
    pub action: RideAction,
    #[serde(default)]
    pub action_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub classification: RideClassification,

    pub notification_received_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub raw_notification_data: Option<String>,
}

impl Ride {
    /// Timestamp used to bucket a ride into a day: creation time when known,
    /// otherwise the arrival of its notification.
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.created_at.unwrap_or(self.notification_received_at)
    }
}

/// Data handed to the overlay presenter for one processed ride.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RideDisplayInfo {
    pub fare_amount: f64,
    pub distance_km: Option<f64>,
    pub earnings_per_km: Option<f64>,
    pub earnings_per_hour: Option<f64>,
    pub rider_rating: Option<f64>,
    pub classification: RideClassification,
    pub source_app: String,
    pub pickup_location: Option<String>,
    pub dropoff_location: Option<String>,
}
