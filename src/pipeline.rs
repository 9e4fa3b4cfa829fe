//! One notification in, one stored and displayed ride out.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::classifier::classify;
use crate::model::{
    Ride, RideAction, RideClassification, RideDisplayInfo, SupportedApp, UserSettings,
};
use crate::parser::{ParsedRideSignals, parse_notification};
use crate::services::{OverlayPresenter, RideRepository};

const LOGGED_TEXT_CHARS: usize = 100;

/// Everything produced for one processed notification.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedRide {
    /// The stored ride: the backend's copy when it accepted the write,
    /// otherwise the local one.
    pub ride: Ride,
    pub display: RideDisplayInfo,
    pub signals: ParsedRideSignals,
}

/// Runs extract, classify, store and show for a single notification, in that
/// order. A failed step stops the rest, so a ride that could not be stored
/// is never shown.
pub struct RideProcessor<R, P> {
    rides: R,
    overlay: P,
}

impl<R: RideRepository, P: OverlayPresenter> RideProcessor<R, P> {
    pub fn new(rides: R, overlay: P) -> Self {
        Self { rides, overlay }
    }

    pub fn rides(&self) -> &R {
        &self.rides
    }

    #[tracing::instrument(skip_all, fields(user_id = %user_id, app = %app.app_name))]
    pub async fn process(
        &self,
        user_id: &str,
        text: &str,
        app: &SupportedApp,
        settings: &UserSettings,
    ) -> Result<ProcessedRide> {
        debug!(text = %truncate(text, LOGGED_TEXT_CHARS), "Processing notification");

        let signals = parse_notification(text, &app.app_name);
        let classification = classify(
            signals.earnings_per_km,
            signals.earnings_per_hour,
            signals.rider_rating,
            &settings.thresholds(),
        );

        let ride = build_ride(user_id, &signals, classification);
        let ride = self
            .rides
            .insert(ride)
            .await
            .context("failed to store ride")?;

        let display = display_info(&ride);
        self.overlay
            .show(&display, &settings.overlay())
            .context("overlay presenter failed")?;

        info!(
            ride_id = ride.id.as_deref().unwrap_or_default(),
            fare = ride.fare_amount,
            classification = %ride.classification,
            "Ride processed"
        );

        Ok(ProcessedRide {
            ride,
            display,
            signals,
        })
    }
}

fn build_ride(
    user_id: &str,
    signals: &ParsedRideSignals,
    classification: RideClassification,
) -> Ride {
    Ride {
        id: None,
        user_id: user_id.to_string(),
        source_app: signals.source_app.clone(),
        pickup_location: None,
        dropoff_location: None,
        distance_km: signals.distance_km,
        estimated_duration_mins: signals.duration_mins,
        fare_amount: signals.fare_amount,
        surge_multiplier: None,
        tip_amount: None,
        earnings_per_km: signals.earnings_per_km,
        earnings_per_hour: signals.earnings_per_hour,
        rider_rating: signals.rider_rating,
        action: RideAction::Pending,
        action_timestamp: None,
        classification,
        notification_received_at: Utc::now(),
        created_at: None,
        raw_notification_data: Some(signals.raw_text.clone()),
    }
}

/// Display payload for a stored ride. Locations are passed through as-is;
/// the extractor never fills them.
pub fn display_info(ride: &Ride) -> RideDisplayInfo {
    RideDisplayInfo {
        fare_amount: ride.fare_amount,
        distance_km: ride.distance_km,
        earnings_per_km: ride.earnings_per_km,
        earnings_per_hour: ride.earnings_per_hour,
        rider_rating: ride.rider_rating,
        classification: ride.classification,
        source_app: ride.source_app.clone(),
        pickup_location: ride.pickup_location.clone(),
        dropoff_location: ride.dropoff_location.clone(),
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
