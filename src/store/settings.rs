//! User settings and supported-app catalog, backend first with a local JSON cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::model::{SuggestedRanges, SupportedApp, UserSettings};
use crate::services::{SettingsApi, SettingsRepository};

/// On-disk shape of the settings cache:
/// ```json
/// {
///   "users": { "u-1": { "user_id": "u-1", "good_earnings_per_km": 15.0, ... } },
///   "supported_apps": [ { "package_name": "com.ubercab.driver", ... } ]
/// }
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
struct CachedSettings {
    #[serde(default)]
    users: HashMap<String, UserSettings>,
    #[serde(default)]
    supported_apps: Vec<SupportedApp>,
}

pub struct SettingsCache {
    path: PathBuf,
    state: Mutex<CachedSettings>,
}

impl SettingsCache {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("corrupt settings cache {}", path.display()))?
        } else {
            CachedSettings::default()
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub async fn get(&self, user_id: &str) -> Option<UserSettings> {
        self.state.lock().await.users.get(user_id).cloned()
    }

    pub async fn put(&self, settings: &UserSettings) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .users
            .insert(settings.user_id.clone(), settings.clone());
        save(&self.path, &state)
    }

    pub async fn supported_apps(&self) -> Vec<SupportedApp> {
        self.state.lock().await.supported_apps.clone()
    }

    pub async fn put_supported_apps(&self, apps: &[SupportedApp]) -> Result<()> {
        let mut state = self.state.lock().await;
        state.supported_apps = apps.to_vec();
        save(&self.path, &state)
    }
}

fn save(path: &Path, state: &CachedSettings) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let body = serde_json::to_vec_pretty(state)?;
    std::fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))
}

/// Settings access with the backend as the source of truth.
///
/// Successful backend reads refresh the local cache; failed reads are served
/// from it.
pub struct SettingsStore<A> {
    cache: SettingsCache,
    remote: A,
}

impl<A: SettingsApi> SettingsStore<A> {
    pub fn new(cache: SettingsCache, remote: A) -> Self {
        Self { cache, remote }
    }

    /// Saves locally, then on the backend. Returns whether the backend took
    /// the change; a failed backend write is logged and the local copy kept.
    pub async fn update_settings(&self, settings: &UserSettings) -> Result<bool> {
        self.cache.put(settings).await?;
        match self.remote.upsert_user_settings(settings).await {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(
                    user_id = %settings.user_id,
                    error = %e,
                    "Settings saved locally, backend update failed"
                );
                Ok(false)
            }
        }
    }

    /// The user's settings, or defaults when neither the backend nor the
    /// cache has a row.
    pub async fn effective_settings(&self, user_id: &str) -> UserSettings {
        match self.get_settings(user_id).await {
            Ok(Some(settings)) => settings,
            Ok(None) => UserSettings::for_user(user_id),
            Err(e) => {
                warn!(error = %e, "Settings unavailable, using defaults");
                UserSettings::for_user(user_id)
            }
        }
    }

    /// Admin-suggested thresholds for `city`. Only the backend has them.
    pub async fn suggested_ranges(&self, city: &str) -> Result<Option<SuggestedRanges>> {
        self.remote
            .get_suggested_ranges(city)
            .await
            .with_context(|| format!("failed to load suggested ranges for {city}"))
    }

    /// Looks up the suggestion for `city` and saves it into the user's
    /// thresholds when `apply` is set or the user turned on auto-suggest.
    pub async fn suggest(&self, user_id: &str, city: &str, apply: bool) -> Result<Suggestion> {
        let mut settings = self.effective_settings(user_id).await;
        let ranges = self.suggested_ranges(city).await?;

        let applied = match &ranges {
            Some(r) if apply || settings.auto_suggest_ranges => {
                r.apply_to(&mut settings);
                self.update_settings(&settings).await?;
                info!(user_id, city, "Suggested ranges applied");
                true
            }
            Some(_) => false,
            None => {
                info!(city, "No suggested ranges for this city");
                false
            }
        };

        Ok(Suggestion {
            ranges,
            applied,
            settings,
        })
    }
}

/// Result of [`SettingsStore::suggest`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub ranges: Option<SuggestedRanges>,
    pub applied: bool,
    /// The user's settings after the call.
    pub settings: UserSettings,
}

#[async_trait]
impl<A: SettingsApi> SettingsRepository for SettingsStore<A> {
    async fn get_settings(&self, user_id: &str) -> Result<Option<UserSettings>> {
        match self.remote.get_user_settings(user_id).await {
            Ok(Some(settings)) => {
                if let Err(e) = self.cache.put(&settings).await {
                    warn!(error = %e, "Failed to cache user settings");
                }
                Ok(Some(settings))
            }
            // A local edit may not have reached the backend yet.
            Ok(None) => Ok(self.cache.get(user_id).await),
            Err(e) => {
                warn!(error = %e, "Backend unavailable, using cached settings");
                Ok(self.cache.get(user_id).await)
            }
        }
    }

    async fn get_supported_apps(&self) -> Result<Vec<SupportedApp>> {
        match self.remote.list_supported_apps().await {
            Ok(apps) => {
                let apps: Vec<_> = apps.into_iter().filter(|a| a.is_active).collect();
                if let Err(e) = self.cache.put_supported_apps(&apps).await {
                    warn!(error = %e, "Failed to cache supported apps");
                }
                Ok(apps)
            }
            Err(e) => {
                let cached = self.cache.supported_apps().await;
                if cached.is_empty() {
                    return Err(e.context("no cached supported apps"));
                }
                warn!(error = %e, "Backend unavailable, using cached supported apps");
                Ok(cached)
            }
        }
    }
}
