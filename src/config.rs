//! Environment-driven configuration.
//!
//! | Variable                  | Meaning                                   | Default     |
//! |---------------------------|-------------------------------------------|-------------|
//! | `EARNMETER_BACKEND_URL`   | Backend base URL; unset runs offline      | unset       |
//! | `EARNMETER_API_KEY`       | Project key sent as the `apikey` header   | unset       |
//! | `EARNMETER_ACCESS_TOKEN`  | Session token for `Authorization: Bearer` | the API key |
//! | `EARNMETER_USER_ID`       | Signed-in user                            | unset       |
//! | `EARNMETER_DATA_DIR`      | Directory for the local caches            | `data`      |
//! | `EARNMETER_REFRESH_SECS`  | Settings/app-list refresh interval        | `86400`     |

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_REFRESH_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend_url: Option<String>,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub user_id: Option<String>,
    pub data_dir: PathBuf,
    pub refresh_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            api_key: None,
            access_token: None,
            user_id: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_SECS),
        }
    }
}

impl AppConfig {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let refresh_interval = match get("EARNMETER_REFRESH_SECS") {
            Some(raw) => Duration::from_secs(raw.trim().parse().with_context(|| {
                format!("EARNMETER_REFRESH_SECS must be seconds, got '{raw}'")
            })?),
            None => Duration::from_secs(DEFAULT_REFRESH_SECS),
        };

        Ok(Self {
            backend_url: get("EARNMETER_BACKEND_URL"),
            api_key: get("EARNMETER_API_KEY"),
            access_token: get("EARNMETER_ACCESS_TOKEN"),
            user_id: get("EARNMETER_USER_ID"),
            data_dir: get("EARNMETER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            refresh_interval,
        })
    }

    pub fn rides_path(&self) -> PathBuf {
        self.data_dir.join("rides.csv")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    /// Held by the running process so two instances never share the caches.
    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join(".earnmeter.lock")
    }
}
