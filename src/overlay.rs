//! Headless overlay: renders each ride as a one-line card in the log.

use anyhow::Result;
use tracing::info;

use crate::model::{OverlaySettings, RideDisplayInfo};
use crate::services::OverlayPresenter;

#[derive(Debug, Default, Clone, Copy)]
pub struct LogOverlay;

impl OverlayPresenter for LogOverlay {
    fn show(&self, info: &RideDisplayInfo, settings: &OverlaySettings) -> Result<()> {
        info!(
            target: "overlay",
            position = settings.position.as_str(),
            duration_ms = settings.duration_ms,
            font_size = settings.font_size,
            opacity = settings.opacity,
            classification = %info.classification,
            "{}",
            render_card(info)
        );
        Ok(())
    }
}

/// `[GOOD] Uber Driver ₹250.00 | 8.5 km | ₹29.41/km | 2.0★`
///
/// Metrics that are absent are left out.
pub fn render_card(info: &RideDisplayInfo) -> String {
    let mut parts = vec![format!(
        "[{}] {} ₹{:.2}",
        info.classification.label(),
        info.source_app,
        info.fare_amount
    )];

    if let Some(km) = info.distance_km {
        parts.push(format!("{km:.1} km"));
    }
    if let Some(per_km) = info.earnings_per_km {
        parts.push(format!("₹{per_km:.2}/km"));
    }
    if let Some(per_hour) = info.earnings_per_hour {
        parts.push(format!("₹{per_hour:.0}/hr"));
    }
    if let Some(rating) = info.rider_rating {
        parts.push(format!("{rating:.1}★"));
    }
    if let (Some(pickup), Some(dropoff)) = (&info.pickup_location, &info.dropoff_location) {
        parts.push(format!("{pickup} → {dropoff}"));
    }

    parts.join(" | ")
}
