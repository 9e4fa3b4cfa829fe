//! Remote backend access.
//!
//! [`BackendClient`] talks to the hosted PostgREST API. [`Remote`] wraps it
//! with an offline variant so the rest of the app behaves the same whether
//! or not a backend is configured: offline, every remote call fails and
//! the stores fall back to their local caches.

mod client;

pub use client::{AuthedClient, BackendClient};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::AppConfig;
use crate::model::{Ride, SuggestedRanges, SupportedApp, UserSettings};
use crate::services::{RideApi, SettingsApi};

pub enum Remote {
    Online(BackendClient<AuthedClient>),
    Offline,
}

impl Remote {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        match (&config.backend_url, &config.api_key) {
            (Some(url), Some(api_key)) => {
                let token = config.access_token.as_deref().unwrap_or(api_key);
                Ok(Remote::Online(BackendClient::connect(url, api_key, token)?))
            }
            _ => Ok(Remote::Offline),
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, Remote::Online(_))
    }
}

fn offline<T>() -> Result<T> {
    bail!("no backend configured")
}

#[async_trait]
impl RideApi for Remote {
    async fn upsert_ride(&self, ride: &Ride) -> Result<Ride> {
        match self {
            Remote::Online(client) => client.upsert_ride(ride).await,
            Remote::Offline => offline(),
        }
    }

    async fn list_rides(&self, user_id: &str, limit: usize, offset: usize) -> Result<Vec<Ride>> {
        match self {
            Remote::Online(client) => client.list_rides(user_id, limit, offset).await,
            Remote::Offline => offline(),
        }
    }

    async fn list_rides_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Ride>> {
        match self {
            Remote::Online(client) => client.list_rides_between(user_id, start, end).await,
            Remote::Offline => offline(),
        }
    }
}

#[async_trait]
impl SettingsApi for Remote {
    async fn get_user_settings(&self, user_id: &str) -> Result<Option<UserSettings>> {
        match self {
            Remote::Online(client) => client.get_user_settings(user_id).await,
            Remote::Offline => offline(),
        }
    }

    async fn upsert_user_settings(&self, settings: &UserSettings) -> Result<()> {
        match self {
            Remote::Online(client) => client.upsert_user_settings(settings).await,
            Remote::Offline => offline(),
        }
    }

    async fn list_supported_apps(&self) -> Result<Vec<SupportedApp>> {
        match self {
            Remote::Online(client) => client.list_supported_apps().await,
            Remote::Offline => offline(),
        }
    }

    async fn get_suggested_ranges(&self, city: &str) -> Result<Option<SuggestedRanges>> {
        match self {
            Remote::Online(client) => client.get_suggested_ranges(city).await,
            Remote::Offline => offline(),
        }
    }
}
