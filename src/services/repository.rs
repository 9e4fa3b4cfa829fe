use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{Ride, RideAction, SupportedApp, UserSettings};

/// Local-first ride persistence.
#[async_trait]
pub trait RideRepository: Send + Sync {
    /// Stores a new ride. Succeeds once the local write has landed, whether or
    /// not the remote copy could be written.
    async fn insert(&self, ride: Ride) -> Result<Ride>;

    async fn update_action(&self, ride_id: &str, action: RideAction) -> Result<()>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get_settings(&self, user_id: &str) -> Result<Option<UserSettings>>;

    async fn get_supported_apps(&self) -> Result<Vec<SupportedApp>>;
}

#[async_trait]
impl<T: RideRepository + ?Sized> RideRepository for Arc<T> {
    async fn insert(&self, ride: Ride) -> Result<Ride> {
        (**self).insert(ride).await
    }

    async fn update_action(&self, ride_id: &str, action: RideAction) -> Result<()> {
        (**self).update_action(ride_id, action).await
    }
}

#[async_trait]
impl<T: SettingsRepository + ?Sized> SettingsRepository for Arc<T> {
    async fn get_settings(&self, user_id: &str) -> Result<Option<UserSettings>> {
        (**self).get_settings(user_id).await
    }

    async fn get_supported_apps(&self) -> Result<Vec<SupportedApp>> {
        (**self).get_supported_apps().await
    }
}
