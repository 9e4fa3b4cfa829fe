//! Per-user thresholds, overlay preferences and the supported-app catalog.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Three cut points for one metric. Expected, but not required, to satisfy
/// `bad < avg < good`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricThresholds {
    pub good: f64,
    pub avg: f64,
    pub bad: f64,
}

impl MetricThresholds {
    pub const fn new(good: f64, avg: f64, bad: f64) -> Self {
        Self { good, avg, bad }
    }
}

/// Immutable threshold snapshot used for a single classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationThresholds {
    pub earnings_per_km: MetricThresholds,
    pub earnings_per_hour: MetricThresholds,
    pub rating: MetricThresholds,
}

impl Default for ClassificationThresholds {
    fn default() -> Self {
        UserSettings::default().thresholds()
    }
}

/// Screen anchor for the ride overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverlayPosition {
    TopLeft,
    #[default]
    TopRight,
    Center,
    BottomLeft,
    BottomRight,
}

impl OverlayPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            OverlayPosition::TopLeft => "TOP_LEFT",
            OverlayPosition::TopRight => "TOP_RIGHT",
            OverlayPosition::Center => "CENTER",
            OverlayPosition::BottomLeft => "BOTTOM_LEFT",
            OverlayPosition::BottomRight => "BOTTOM_RIGHT",
        }
    }
}

impl FromStr for OverlayPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TOP_LEFT" => Ok(OverlayPosition::TopLeft),
            "TOP_RIGHT" => Ok(OverlayPosition::TopRight),
            "CENTER" => Ok(OverlayPosition::Center),
            "BOTTOM_LEFT" => Ok(OverlayPosition::BottomLeft),
            "BOTTOM_RIGHT" => Ok(OverlayPosition::BottomRight),
            other => Err(format!("unknown overlay position '{other}'")),
        }
    }
}

/// Presentation parameters passed to the overlay presenter alongside the ride.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlaySettings {
    pub duration_ms: u64,
    pub font_size: u32,
    pub position: OverlayPosition,
    /// Always within `0.0..=1.0`.
    pub opacity: f32,
}

/// A user's configuration row, as stored in the backend `user_settings` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub user_id: String,

    pub good_earnings_per_km: f64,
    pub avg_earnings_per_km: f64,
    pub bad_earnings_per_km: f64,

    pub good_earnings_per_hour: f64,
    pub avg_earnings_per_hour: f64,
    pub bad_earnings_per_hour: f64,

    pub good_rating: f64,
    pub avg_rating: f64,
    pub bad_rating: f64,

    pub overlay_font_size: u32,
    pub overlay_position: String,
    pub overlay_duration_ms: u64,
    pub overlay_opacity: f32,

    pub smart_assist_enabled: bool,
    pub track_profits_enabled: bool,
    pub auto_suggest_ranges: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            good_earnings_per_km: 15.0,
            avg_earnings_per_km: 10.0,
            bad_earnings_per_km: 5.0,
            good_earnings_per_hour: 300.0,
            avg_earnings_per_hour: 200.0,
            bad_earnings_per_hour: 100.0,
            good_rating: 4.5,
            avg_rating: 4.0,
            bad_rating: 3.5,
            overlay_font_size: 14,
            overlay_position: OverlayPosition::TopRight.as_str().to_string(),
            overlay_duration_ms: 5000,
            overlay_opacity: 0.9,
            smart_assist_enabled: true,
            track_profits_enabled: true,
            auto_suggest_ranges: false,
        }
    }
}

impl UserSettings {
    /// Default settings owned by `user_id`.
    pub fn for_user(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    pub fn thresholds(&self) -> ClassificationThresholds {
        ClassificationThresholds {
            earnings_per_km: MetricThresholds::new(
                self.good_earnings_per_km,
                self.avg_earnings_per_km,
                self.bad_earnings_per_km,
            ),
            earnings_per_hour: MetricThresholds::new(
                self.good_earnings_per_hour,
                self.avg_earnings_per_hour,
                self.bad_earnings_per_hour,
            ),
            rating: MetricThresholds::new(self.good_rating, self.avg_rating, self.bad_rating),
        }
    }

    /// Overlay parameters; an unrecognised position falls back to top-right.
    pub fn overlay(&self) -> OverlaySettings {
        let opacity = if self.overlay_opacity.is_nan() {
            1.0
        } else {
            self.overlay_opacity.clamp(0.0, 1.0)
        };

        OverlaySettings {
            duration_ms: self.overlay_duration_ms,
            font_size: self.overlay_font_size,
            position: self.overlay_position.parse().unwrap_or_default(),
            opacity,
        }
    }
}

/// Partial change to a user's settings. Unset fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, clap::Args)]
pub struct SettingsPatch {
    /// Earnings per km at or above which a ride counts as good
    #[arg(long)]
    pub good_km: Option<f64>,
    #[arg(long)]
    pub avg_km: Option<f64>,
    #[arg(long)]
    pub bad_km: Option<f64>,

    /// Earnings per hour at or above which a ride counts as good
    #[arg(long)]
    pub good_hour: Option<f64>,
    #[arg(long)]
    pub avg_hour: Option<f64>,
    #[arg(long)]
    pub bad_hour: Option<f64>,

    /// Rider rating at or above which a ride counts as good
    #[arg(long)]
    pub good_rating: Option<f64>,
    #[arg(long)]
    pub avg_rating: Option<f64>,
    #[arg(long)]
    pub bad_rating: Option<f64>,

    #[arg(long)]
    pub font_size: Option<u32>,
    /// top_left, top_right, center, bottom_left or bottom_right
    #[arg(long)]
    pub position: Option<OverlayPosition>,
    #[arg(long)]
    pub duration_ms: Option<u64>,
    #[arg(long)]
    pub opacity: Option<f32>,

    #[arg(long)]
    pub smart_assist: Option<bool>,
    #[arg(long)]
    pub track_profits: Option<bool>,
    /// Apply the city's suggested thresholds whenever `settings suggest` runs
    #[arg(long)]
    pub auto_suggest: Option<bool>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, settings: &mut UserSettings) {
        fn set<T: Clone>(field: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *field = v.clone();
            }
        }

        set(&mut settings.good_earnings_per_km, &self.good_km);
        set(&mut settings.avg_earnings_per_km, &self.avg_km);
        set(&mut settings.bad_earnings_per_km, &self.bad_km);
        set(&mut settings.good_earnings_per_hour, &self.good_hour);
        set(&mut settings.avg_earnings_per_hour, &self.avg_hour);
        set(&mut settings.bad_earnings_per_hour, &self.bad_hour);
        set(&mut settings.good_rating, &self.good_rating);
        set(&mut settings.avg_rating, &self.avg_rating);
        set(&mut settings.bad_rating, &self.bad_rating);

        set(&mut settings.overlay_font_size, &self.font_size);
        if let Some(position) = self.position {
            settings.overlay_position = position.as_str().to_string();
        }
        set(&mut settings.overlay_duration_ms, &self.duration_ms);
        set(&mut settings.overlay_opacity, &self.opacity);

        set(&mut settings.smart_assist_enabled, &self.smart_assist);
        set(&mut settings.track_profits_enabled, &self.track_profits);
        set(&mut settings.auto_suggest_ranges, &self.auto_suggest);
    }
}

/// Admin-maintained thresholds for a city, from the `admin_suggested_ranges`
/// table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedRanges {
    #[serde(default)]
    pub id: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default = "default_country")]
    pub country: String,

    pub suggested_good_per_km: f64,
    pub suggested_avg_per_km: f64,
    pub suggested_bad_per_km: f64,

    pub suggested_good_per_hour: f64,
    pub suggested_avg_per_hour: f64,
    pub suggested_bad_per_hour: f64,

    pub suggested_good_rating: f64,
    pub suggested_avg_rating: f64,
    pub suggested_bad_rating: f64,

    #[serde(default = "active")]
    pub is_active: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_by: Option<String>,
}

fn default_country() -> String {
    "India".to_string()
}

impl SuggestedRanges {
    /// Replaces all nine thresholds; overlay and toggles are untouched.
    pub fn apply_to(&self, settings: &mut UserSettings) {
        settings.good_earnings_per_km = self.suggested_good_per_km;
        settings.avg_earnings_per_km = self.suggested_avg_per_km;
        settings.bad_earnings_per_km = self.suggested_bad_per_km;
        settings.good_earnings_per_hour = self.suggested_good_per_hour;
        settings.avg_earnings_per_hour = self.suggested_avg_per_hour;
        settings.bad_earnings_per_hour = self.suggested_bad_per_hour;
        settings.good_rating = self.suggested_good_rating;
        settings.avg_rating = self.suggested_avg_rating;
        settings.bad_rating = self.suggested_bad_rating;
    }
}

/// A ride-hailing driver app whose notifications are watched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedApp {
    pub package_name: String,
    pub app_name: String,
    /// Case-insensitive substrings that mark a notification as a ride offer.
    #[serde(default)]
    pub notification_patterns: Vec<String>,
    #[serde(default = "active")]
    pub is_active: bool,
}

fn active() -> bool {
    true
}

impl SupportedApp {
    pub fn new(package_name: &str, app_name: &str, patterns: &[&str]) -> Self {
        Self {
            package_name: package_name.to_string(),
            app_name: app_name.to_string(),
            notification_patterns: patterns.iter().map(|p| p.to_string()).collect(),
            is_active: true,
        }
    }
}

/// Built-in catalog used until the backend supplies one.
pub fn default_supported_apps() -> Vec<SupportedApp> {
    vec![
        SupportedApp::new(
            "com.ubercab.driver",
            "Uber Driver",
            &["New trip request", "Trip nearby", "₹"],
        ),
        SupportedApp::new(
            "com.olacabs.oladriver",
            "Ola Driver",
            &["New ride", "Booking", "₹"],
        ),
        SupportedApp::new(
            "com.rapido.rider",
            "Rapido Captain",
            &["New order", "Trip request", "₹"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_row_fills_defaults() {
        let json = r#"{"user_id":"u-1","good_earnings_per_km":20.0,"smart_assist_enabled":false}"#;
        let settings: UserSettings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.user_id, "u-1");
        assert_eq!(settings.good_earnings_per_km, 20.0);
        assert_eq!(settings.avg_earnings_per_km, 10.0);
        assert!(!settings.smart_assist_enabled);
        assert_eq!(settings.overlay_duration_ms, 5000);
    }

    #[test]
    fn test_thresholds_snapshot() {
        let thresholds = UserSettings::for_user("u-1").thresholds();

        assert_eq!(thresholds.earnings_per_hour, MetricThresholds::new(300.0, 200.0, 100.0));
        assert_eq!(thresholds.rating, MetricThresholds::new(4.5, 4.0, 3.5));
    }

    #[test]
    fn test_overlay_falls_back_and_clamps() {
        let settings = UserSettings {
            overlay_position: "bottom_left".to_string(),
            overlay_opacity: 1.7,
            ..Default::default()
        };
        let overlay = settings.overlay();
        assert_eq!(overlay.position, OverlayPosition::BottomLeft);
        assert_eq!(overlay.opacity, 1.0);

        let settings = UserSettings {
            overlay_position: "SIDEWAYS".to_string(),
            overlay_opacity: -0.2,
            ..Default::default()
        };
        let overlay = settings.overlay();
        assert_eq!(overlay.position, OverlayPosition::TopRight);
        assert_eq!(overlay.opacity, 0.0);
    }

    #[test]
    fn test_default_catalog_covers_three_apps() {
        let apps = default_supported_apps();
        let packages: Vec<_> = apps.iter().map(|a| a.package_name.as_str()).collect();

        assert_eq!(
            packages,
            ["com.ubercab.driver", "com.olacabs.oladriver", "com.rapido.rider"]
        );
        assert!(apps.iter().all(|a| a.notification_patterns.contains(&"₹".to_string())));
    }

    #[test]
    fn test_patch_changes_only_given_fields() {
        let mut settings = UserSettings::for_user("u-1");
        let patch = SettingsPatch {
            good_km: Some(20.0),
            position: Some(OverlayPosition::BottomLeft),
            smart_assist: Some(false),
            ..Default::default()
        };
        assert!(!patch.is_empty());

        patch.apply(&mut settings);

        assert_eq!(settings.good_earnings_per_km, 20.0);
        assert_eq!(settings.avg_earnings_per_km, 10.0);
        assert_eq!(settings.overlay_position, "BOTTOM_LEFT");
        assert!(!settings.smart_assist_enabled);
        assert!(settings.track_profits_enabled);
        assert!(SettingsPatch::default().is_empty());
    }

    #[test]
    fn test_suggested_ranges_replace_thresholds() {
        let json = r#"{
            "city": "Pune",
            "suggested_good_per_km": 18.0, "suggested_avg_per_km": 12.0,
            "suggested_bad_per_km": 7.0,
            "suggested_good_per_hour": 350.0, "suggested_avg_per_hour": 250.0,
            "suggested_bad_per_hour": 150.0,
            "suggested_good_rating": 4.6, "suggested_avg_rating": 4.2, "suggested_bad_rating": 3.8,
            "updated_at": "2026-10-01T10:00:00+00:00"
        }"#;
        let ranges: SuggestedRanges = serde_json::from_str(json).unwrap();
        assert_eq!(ranges.country, "India");
        assert!(ranges.is_active);

        let mut settings = UserSettings {
            overlay_font_size: 18,
            ..UserSettings::for_user("u-1")
        };
        ranges.apply_to(&mut settings);

        assert_eq!(
            settings.thresholds().earnings_per_km,
            MetricThresholds::new(18.0, 12.0, 7.0)
        );
        assert_eq!(settings.thresholds().rating, MetricThresholds::new(4.6, 4.2, 3.8));
        assert_eq!(settings.overlay_font_size, 18);
    }
}
