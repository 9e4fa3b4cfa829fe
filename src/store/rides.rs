//! Local-first ride store with best-effort backend sync.

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::model::{Ride, RideAction};
use crate::services::{RideApi, RideRepository};
use crate::store::cache::{PendingRide, RideCache};

/// Writes every ride to the local cache first, then mirrors it to the backend.
///
/// A ride stays flagged for sync until the backend has confirmed it; the flag
/// is cleared either right after the write or by a later [`sync_pending`]
/// pass. Backend writes are upserts keyed by ride id, so retries never
/// duplicate a ride.
///
/// [`sync_pending`]: RideStore::sync_pending
pub struct RideStore<A> {
    cache: RideCache,
    remote: A,
}

impl<A: RideApi> RideStore<A> {
    pub fn new(cache: RideCache, remote: A) -> Self {
        Self { cache, remote }
    }

    /// Pushes every unsynced ride to the backend. Returns how many are now
    /// confirmed; a ride changed locally during its push stays pending.
    #[tracing::instrument(skip(self))]
    pub async fn sync_pending(&self) -> Result<usize> {
        let pending = self.cache.unsynced().await;
        let mut synced = 0;

        for PendingRide { ride, revision } in &pending {
            let Some(id) = ride.id.as_deref() else {
                continue;
            };
            match self.remote.upsert_ride(ride).await {
                Ok(_) => {
                    if self.cache.mark_synced(id, *revision).await? {
                        synced += 1;
                    } else {
                        debug!(ride_id = id, "Ride changed during sync, will resend");
                    }
                }
                Err(e) => warn!(ride_id = id, error = %e, "Ride sync failed, will retry"),
            }
        }

        info!(pending = pending.len(), synced, "Sync pass complete");
        Ok(synced)
    }

    /// Number of rides still waiting to reach the backend.
    pub async fn pending_sync_count(&self) -> usize {
        self.cache.unsynced().await.len()
    }

    /// A page of the user's rides: from the backend when reachable (and cached
    /// locally), otherwise from the local cache.
    pub async fn get_rides(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Ride>> {
        match self.remote.list_rides(user_id, limit, offset).await {
            Ok(rides) => {
                if let Err(e) = self.cache.store_remote(&rides).await {
                    warn!(error = %e, "Failed to cache fetched rides");
                }
                Ok(rides)
            }
            Err(e) => {
                warn!(error = %e, "Backend unavailable, reading rides from local cache");
                Ok(self.cache.list(user_id, limit, offset).await)
            }
        }
    }

    /// The user's rides within `[start, end]`, with the same fallback as
    /// [`RideStore::get_rides`].
    pub async fn get_rides_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Ride>> {
        match self.remote.list_rides_between(user_id, start, end).await {
            Ok(rides) => Ok(rides),
            Err(e) => {
                warn!(error = %e, "Backend unavailable, reading rides from local cache");
                Ok(self.cache.list_between(user_id, start, end).await)
            }
        }
    }

    /// Every locally cached ride for the user.
    pub async fn local_rides(&self, user_id: &str) -> Vec<Ride> {
        self.cache.all_for(user_id).await
    }

    /// Deletes all locally cached rides. Backend copies are kept.
    pub async fn clear_local(&self) -> Result<usize> {
        let removed = self.cache.clear().await?;
        info!(removed, "Local ride cache cleared");
        Ok(removed)
    }

    async fn push(&self, ride: &Ride, id: &str, revision: u64) -> Result<Option<Ride>> {
        match self.remote.upsert_ride(ride).await {
            Ok(stored) => {
                self.cache.mark_synced(id, revision).await?;
                Ok(Some(stored))
            }
            Err(e) => {
                warn!(ride_id = id, error = %e, "Backend write failed, ride kept for later sync");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl<A: RideApi> RideRepository for RideStore<A> {
    #[tracing::instrument(skip_all, fields(user_id = %ride.user_id, source_app = %ride.source_app))]
    async fn insert(&self, mut ride: Ride) -> Result<Ride> {
        let id = ride
            .id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        ride.created_at.get_or_insert_with(Utc::now);

        let revision = self.cache.upsert(&ride, false).await?;
        debug!(ride_id = %id, "Ride written to local cache");

        Ok(self.push(&ride, &id, revision).await?.unwrap_or(ride))
    }

    #[tracing::instrument(skip(self))]
    async fn update_action(&self, ride_id: &str, action: RideAction) -> Result<()> {
        let Some(mut ride) = self.cache.get(ride_id).await else {
            bail!("ride {ride_id} not found");
        };

        if !ride.action.can_transition_to(action) {
            bail!("ride {ride_id} cannot move from {} to {action}", ride.action);
        }
        if ride.action == action {
            debug!("Action already recorded");
            return Ok(());
        }

        ride.action = action;
        ride.action_timestamp = Some(Utc::now());
        let revision = self.cache.upsert(&ride, false).await?;
        self.push(&ride, ride_id, revision).await?;

        Ok(())
    }
}
