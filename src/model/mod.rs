//! Data contracts shared by the extractor, classifier, stores and presenter.

pub mod event;
pub mod ride;
pub mod settings;

pub use event::NotificationEvent;
pub use ride::{Ride, RideAction, RideClassification, RideDisplayInfo};
pub use settings::{
    ClassificationThresholds, MetricThresholds, OverlayPosition, OverlaySettings, SettingsPatch,
    SuggestedRanges, SupportedApp, UserSettings, default_supported_apps,
};
