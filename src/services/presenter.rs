use anyhow::Result;

use crate::model::{OverlaySettings, RideDisplayInfo};

/// Sink for processed ride summaries.
///
/// Implementations own everything about display: timing, placement,
/// dismissal. The pipeline only hands over data.
pub trait OverlayPresenter: Send + Sync {
    fn show(&self, info: &RideDisplayInfo, settings: &OverlaySettings) -> Result<()>;
}
