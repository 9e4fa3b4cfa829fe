//! Traits at the boundaries of the ingestion pipeline.
//!
//! [`RideApi`] and [`SettingsApi`] describe the remote backend.
//! [`RideRepository`] and [`SettingsRepository`] are the local-first stores
//! built on top of it. [`OverlayPresenter`] receives finished ride summaries.

mod backend_api;
mod presenter;
mod repository;

pub use backend_api::{RideApi, SettingsApi};
pub use presenter::OverlayPresenter;
pub use repository::{RideRepository, SettingsRepository};
