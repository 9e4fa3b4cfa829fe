//! CSV-backed local ride cache.
//!
//! All rows live in memory behind an async mutex and the whole file is
//! rewritten after every change (temp file, then rename), so a crash never
//! leaves a half-written cache behind. A change reaches memory only after
//! its rewrite succeeded.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::model::{Ride, RideAction, RideClassification};

/// One cached ride plus its sync bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RideRow {
    id: String,
    user_id: String,
    source_app: String,
    pickup_location: Option<String>,
    dropoff_location: Option<String>,
    distance_km: Option<f64>,
    estimated_duration_mins: Option<u32>,
    fare_amount: f64,
    surge_multiplier: Option<f64>,
    tip_amount: Option<f64>,
    earnings_per_km: Option<f64>,
    earnings_per_hour: Option<f64>,
    rider_rating: Option<f64>,
    action: RideAction,
    action_timestamp: Option<DateTime<Utc>>,
    classification: RideClassification,
    notification_received_at: DateTime<Utc>,
    created_at: Option<DateTime<Utc>>,
    raw_notification_data: Option<String>,
    is_synced: bool,
    /// Bumped on every local write; a sync may only clear the flag it read.
    #[serde(default)]
    revision: u64,
}

impl RideRow {
    fn from_ride(ride: &Ride, is_synced: bool) -> Result<Self> {
        let id = ride
            .id
            .clone()
            .ok_or_else(|| anyhow!("cannot cache a ride without an id"))?;

        Ok(Self {
            id,
            user_id: ride.user_id.clone(),
            source_app: ride.source_app.clone(),
            pickup_location: ride.pickup_location.clone(),
            dropoff_location: ride.dropoff_location.clone(),
            distance_km: ride.distance_km,
            estimated_duration_mins: ride.estimated_duration_mins,
            fare_amount: ride.fare_amount,
            surge_multiplier: ride.surge_multiplier,
            tip_amount: ride.tip_amount,
            earnings_per_km: ride.earnings_per_km,
            earnings_per_hour: ride.earnings_per_hour,
            rider_rating: ride.rider_rating,
            action: ride.action,
            action_timestamp: ride.action_timestamp,
            classification: ride.classification,
            notification_received_at: ride.notification_received_at,
            created_at: ride.created_at,
            raw_notification_data: ride.raw_notification_data.clone(),
            is_synced,
            revision: 0,
        })
    }

    fn to_ride(&self) -> Ride {
        Ride {
            id: Some(self.id.clone()),
            user_id: self.user_id.clone(),
            source_app: self.source_app.clone(),
            pickup_location: self.pickup_location.clone(),
            dropoff_location: self.dropoff_location.clone(),
            distance_km: self.distance_km,
            estimated_duration_mins: self.estimated_duration_mins,
            fare_amount: self.fare_amount,
            surge_multiplier: self.surge_multiplier,
            tip_amount: self.tip_amount,
            earnings_per_km: self.earnings_per_km,
            earnings_per_hour: self.earnings_per_hour,
            rider_rating: self.rider_rating,
            action: self.action,
            action_timestamp: self.action_timestamp,
            classification: self.classification,
            notification_received_at: self.notification_received_at,
            created_at: self.created_at,
            raw_notification_data: self.raw_notification_data.clone(),
        }
    }
}

/// A dirty ride together with the revision it had when it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRide {
    pub ride: Ride,
    pub revision: u64,
}

pub struct RideCache {
    path: PathBuf,
    rows: Mutex<Vec<RideRow>>,
}

impl RideCache {
    /// Opens the cache at `path`, loading existing rows if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let rows = if path.exists() {
            load_rows(&path)?
        } else {
            Vec::new()
        };
        debug!(path = %path.display(), rows = rows.len(), "Ride cache opened");

        Ok(Self {
            path,
            rows: Mutex::new(rows),
        })
    }

    /// Inserts `ride`, or replaces the row with the same id. Returns the new
    /// revision of the row.
    pub async fn upsert(&self, ride: &Ride, is_synced: bool) -> Result<u64> {
        let mut row = RideRow::from_ride(ride, is_synced)?;
        let mut rows = self.rows.lock().await;
        let mut next = rows.clone();

        match next.iter_mut().find(|r| r.id == row.id) {
            Some(existing) => {
                row.revision = existing.revision + 1;
                *existing = row.clone();
            }
            None => {
                row.revision = 1;
                next.push(row.clone());
            }
        }

        *rows = persist(&self.path, next).await?;
        Ok(row.revision)
    }

    /// Stores rides fetched from the backend as synced. Rows with local
    /// changes still waiting for sync are left alone.
    pub async fn store_remote(&self, rides: &[Ride]) -> Result<()> {
        let mut rows = self.rows.lock().await;
        let mut next = rows.clone();
        let mut changed = false;

        for ride in rides {
            let Ok(mut row) = RideRow::from_ride(ride, true) else {
                continue;
            };
            match next.iter_mut().find(|r| r.id == row.id) {
                Some(existing) if !existing.is_synced => {}
                Some(existing) => {
                    row.revision = existing.revision + 1;
                    *existing = row;
                    changed = true;
                }
                None => {
                    row.revision = 1;
                    next.push(row);
                    changed = true;
                }
            }
        }

        if changed {
            *rows = persist(&self.path, next).await?;
        }
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Option<Ride> {
        self.rows
            .lock()
            .await
            .iter()
            .find(|r| r.id == id)
            .map(RideRow::to_ride)
    }

    /// Clears the sync flag if the row is still at `revision`. Returns
    /// `false` when the row changed after it was read for sync; it then
    /// stays dirty for the next pass.
    pub async fn mark_synced(&self, id: &str, revision: u64) -> Result<bool> {
        let mut rows = self.rows.lock().await;
        let Some(pos) = rows.iter().position(|r| r.id == id) else {
            return Err(anyhow!("ride {id} is not in the local cache"));
        };
        if rows[pos].revision != revision {
            return Ok(false);
        }
        if rows[pos].is_synced {
            return Ok(true);
        }

        let mut next = rows.clone();
        next[pos].is_synced = true;
        *rows = persist(&self.path, next).await?;
        Ok(true)
    }

    /// Rides written locally but not yet confirmed by the backend.
    pub async fn unsynced(&self) -> Vec<PendingRide> {
        self.rows
            .lock()
            .await
            .iter()
            .filter(|r| !r.is_synced)
            .map(|r| PendingRide {
                ride: r.to_ride(),
                revision: r.revision,
            })
            .collect()
    }

    /// A page of the user's rides, newest notification first.
    pub async fn list(&self, user_id: &str, limit: usize, offset: usize) -> Vec<Ride> {
        let mut rides = self.all_for(user_id).await;
        rides.sort_by(|a, b| b.notification_received_at.cmp(&a.notification_received_at));
        rides.into_iter().skip(offset).take(limit).collect()
    }

    /// The user's rides whose notification arrived in `[start, end]`, newest first.
    pub async fn list_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<Ride> {
        let mut rides: Vec<Ride> = self
            .all_for(user_id)
            .await
            .into_iter()
            .filter(|r| r.notification_received_at >= start && r.notification_received_at <= end)
            .collect();
        rides.sort_by(|a, b| b.notification_received_at.cmp(&a.notification_received_at));
        rides
    }

    pub async fn all_for(&self, user_id: &str) -> Vec<Ride> {
        self.rows
            .lock()
            .await
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(RideRow::to_ride)
            .collect()
    }

    /// Removes every cached ride and returns how many there were.
    pub async fn clear(&self) -> Result<usize> {
        let mut rows = self.rows.lock().await;
        let removed = rows.len();
        *rows = persist(&self.path, Vec::new()).await?;
        Ok(removed)
    }
}

/// Writes `rows` on the blocking pool and hands them back once they are on
/// disk. Callers swap them into memory only on success.
async fn persist(path: &Path, rows: Vec<RideRow>) -> Result<Vec<RideRow>> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_rows(&path, &rows).map(|()| rows))
        .await
        .context("ride cache writer panicked")?
}

fn load_rows(path: &Path) -> Result<Vec<RideRow>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut rdr = csv::Reader::from_reader(file);

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: RideRow = result.with_context(|| format!("corrupt row in {}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

fn write_rows(path: &Path, rows: &[RideRow]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    let tmp = path.with_extension("csv.tmp");
    {
        let file = File::create(&tmp)?;
        let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))?;

    Ok(())
}
