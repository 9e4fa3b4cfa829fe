//! Read-only view of settings and supported apps shared by ingestion tasks.
//!
//! Tasks read the current [`ServiceSnapshot`] from a `watch` channel. A
//! refresh builds a whole new snapshot and swaps it in, so a reader sees
//! either the old one or the new one, never a mix.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::model::{SupportedApp, UserSettings, default_supported_apps};
use crate::services::SettingsRepository;

#[derive(Debug, Clone, Default)]
pub struct ServiceSnapshot {
    /// False until the first refresh has completed.
    pub initialized: bool,
    pub user_id: Option<String>,
    pub settings: Option<UserSettings>,
    pub supported_apps: Vec<SupportedApp>,
}

impl ServiceSnapshot {
    pub fn app_for_package(&self, package_name: &str) -> Option<&SupportedApp> {
        self.supported_apps
            .iter()
            .find(|app| app.is_active && app.package_name == package_name)
    }
}

/// Sole writer of the snapshot channel.
pub struct SnapshotRefresher<S> {
    settings: S,
    user_id: Option<String>,
    tx: watch::Sender<Arc<ServiceSnapshot>>,
}

impl<S: SettingsRepository> SnapshotRefresher<S> {
    pub fn new(settings: S, user_id: Option<String>) -> Self {
        let (tx, _) = watch::channel(Arc::new(ServiceSnapshot::default()));
        Self {
            settings,
            user_id,
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ServiceSnapshot>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Arc<ServiceSnapshot> {
        self.tx.borrow().clone()
    }

    /// Reloads settings and supported apps and publishes the result.
    ///
    /// A failed fetch keeps the previous value. Without one, supported apps
    /// fall back to the built-in list and settings to the user's defaults.
    #[tracing::instrument(skip(self), fields(user_id = ?self.user_id))]
    pub async fn refresh(&self) -> Arc<ServiceSnapshot> {
        let previous = self.current();

        let supported_apps = match self.settings.get_supported_apps().await {
            Ok(apps) if !apps.is_empty() => apps,
            Ok(_) => {
                warn!("Backend returned no supported apps, using defaults");
                default_supported_apps()
            }
            Err(e) if !previous.supported_apps.is_empty() => {
                warn!(error = %e, "Supported app refresh failed, keeping previous list");
                previous.supported_apps.clone()
            }
            Err(e) => {
                warn!(error = %e, "Supported app refresh failed, using defaults");
                default_supported_apps()
            }
        };

        let settings = match &self.user_id {
            None => None,
            Some(user_id) => match self.settings.get_settings(user_id).await {
                Ok(Some(settings)) => Some(settings),
                Ok(None) => Some(UserSettings::for_user(user_id)),
                Err(e) => {
                    warn!(error = %e, "Settings refresh failed, keeping previous settings");
                    previous
                        .settings
                        .clone()
                        .or_else(|| Some(UserSettings::for_user(user_id)))
                }
            },
        };

        let snapshot = Arc::new(ServiceSnapshot {
            initialized: true,
            user_id: self.user_id.clone(),
            settings,
            supported_apps,
        });
        self.tx.send_replace(snapshot.clone());

        info!(
            apps = snapshot.supported_apps.len(),
            has_settings = snapshot.settings.is_some(),
            "Snapshot refreshed"
        );
        snapshot
    }
}
