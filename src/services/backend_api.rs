use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::model::{Ride, SuggestedRanges, SupportedApp, UserSettings};

/// Remote storage for ride records.
#[async_trait::async_trait]
pub trait RideApi: Send + Sync {
    /// Inserts or replaces the ride with the same `id` and returns the stored row.
    async fn upsert_ride(&self, ride: &Ride) -> Result<Ride>;

    /// Returns a page of the user's rides, newest first.
    async fn list_rides(&self, user_id: &str, limit: usize, offset: usize) -> Result<Vec<Ride>>;

    /// Returns the user's rides whose notification arrived within `[start, end]`.
    async fn list_rides_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Ride>>;
}

/// Remote source of truth for user settings and the supported-app catalog.
#[async_trait::async_trait]
pub trait SettingsApi: Send + Sync {
    async fn get_user_settings(&self, user_id: &str) -> Result<Option<UserSettings>>;

    async fn upsert_user_settings(&self, settings: &UserSettings) -> Result<()>;

    /// Returns the active supported apps.
    async fn list_supported_apps(&self) -> Result<Vec<SupportedApp>>;

    /// Returns the active admin-suggested thresholds for `city`, if any.
    async fn get_suggested_ranges(&self, city: &str) -> Result<Option<SuggestedRanges>>;
}

#[async_trait::async_trait]
impl<T: RideApi + ?Sized> RideApi for std::sync::Arc<T> {
    async fn upsert_ride(&self, ride: &Ride) -> Result<Ride> {
        (**self).upsert_ride(ride).await
    }

    async fn list_rides(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Ride>> {
        (**self).list_rides(user_id, limit, offset).await
    }

    async fn list_rides_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Ride>> {
        (**self).list_rides_between(user_id, start, end).await
    }
}

#[async_trait::async_trait]
impl<T: SettingsApi + ?Sized> SettingsApi for std::sync::Arc<T> {
    async fn get_user_settings(&self, user_id: &str) -> Result<Option<UserSettings>> {
        (**self).get_user_settings(user_id).await
    }

    async fn upsert_user_settings(&self, settings: &UserSettings) -> Result<()> {
        (**self).upsert_user_settings(settings).await
    }

    async fn list_supported_apps(&self) -> Result<Vec<SupportedApp>> {
        (**self).list_supported_apps().await
    }

    async fn get_suggested_ranges(&self, city: &str) -> Result<Option<SuggestedRanges>> {
        (**self).get_suggested_ranges(city).await
    }
}
