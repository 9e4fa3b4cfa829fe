//! Local-first persistence for rides and settings.

pub mod cache;
pub mod lock;
pub mod rides;
pub mod settings;

pub use cache::{PendingRide, RideCache};
pub use lock::StoreLock;
pub use rides::RideStore;
pub use settings::{SettingsCache, SettingsStore, Suggestion};
