use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use earnmeter::classifier::classify;
use earnmeter::model::{
    NotificationEvent, Ride, RideClassification, UserSettings, default_supported_apps,
};
use earnmeter::infra::backend::Remote;
use earnmeter::overlay::LogOverlay;
use earnmeter::parser::parse_notification;
use earnmeter::pipeline::RideProcessor;
use earnmeter::service::{NotificationService, SkipReason};
use earnmeter::services::{RideApi, RideRepository};
use earnmeter::snapshot::ServiceSnapshot;
use earnmeter::store::{RideCache, RideStore, SettingsCache, SettingsStore, StoreLock};
use tokio::sync::watch;

/// Backend that can be taken offline; stores rows by id like an upsert.
#[derive(Default)]
struct FlakyBackend {
    down: AtomicBool,
    rows: Mutex<HashMap<String, Ride>>,
}

#[async_trait]
impl RideApi for FlakyBackend {
    async fn upsert_ride(&self, ride: &Ride) -> Result<Ride> {
        if self.down.load(Ordering::SeqCst) {
            bail!("503 service unavailable");
        }
        let Some(id) = ride.id.clone() else {
            bail!("ride without id");
        };
        self.rows.lock().unwrap().insert(id, ride.clone());
        Ok(ride.clone())
    }

    async fn list_rides(&self, _user_id: &str, _limit: usize, _offset: usize) -> Result<Vec<Ride>> {
        bail!("not used")
    }

    async fn list_rides_between(
        &self,
        _user_id: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<Ride>> {
        bail!("not used")
    }
}

fn ready_snapshot() -> ServiceSnapshot {
    ServiceSnapshot {
        initialized: true,
        user_id: Some("driver-1".to_string()),
        settings: Some(UserSettings::for_user("driver-1")),
        supported_apps: default_supported_apps(),
    }
}

#[test]
fn test_fare_distance_rating_tie_is_average() {
    let signals = parse_notification("New trip request ₹250, 8.5 km, 2★", "Uber Driver");

    assert_eq!(signals.fare_amount, 250.0);
    assert_eq!(signals.distance_km, Some(8.5));
    assert_eq!(signals.rider_rating, Some(2.0));
    assert!((signals.earnings_per_km.unwrap() - 29.41).abs() < 0.01);
    assert_eq!(signals.earnings_per_hour, None);

    let classification = classify(
        signals.earnings_per_km,
        signals.earnings_per_hour,
        signals.rider_rating,
        &UserSettings::default().thresholds(),
    );
    assert_eq!(classification, RideClassification::Average);
}

#[test]
fn test_text_without_currency_is_unknown() {
    let signals = parse_notification("Trip nearby, open the app for details", "Uber Driver");

    assert_eq!(signals.fare_amount, 0.0);
    assert_eq!(signals.earnings_per_km, None);
    assert_eq!(signals.earnings_per_hour, None);
    assert_eq!(signals.rider_rating, None);
    assert_eq!(
        classify(None, None, None, &UserSettings::default().thresholds()),
        RideClassification::Unknown
    );
}

#[test]
fn test_duration_only_rates_per_hour() {
    let signals = parse_notification("₹500 fare, 10 min", "Rapido Captain");

    assert_eq!(signals.earnings_per_hour, Some(3000.0));
    assert_eq!(signals.earnings_per_km, None);
    assert_eq!(
        classify(
            signals.earnings_per_km,
            signals.earnings_per_hour,
            signals.rider_rating,
            &UserSettings::default().thresholds(),
        ),
        RideClassification::Good
    );
}

#[tokio::test]
async fn test_unsupported_package_is_rejected_before_processing() {
    let dir = tempfile::tempdir().unwrap();
    let rides = Arc::new(RideStore::new(
        RideCache::open(dir.path().join("rides.csv")).unwrap(),
        FlakyBackend::default(),
    ));
    let (_tx, rx) = watch::channel(Arc::new(ready_snapshot()));
    let service = NotificationService::new(
        Arc::new(RideProcessor::new(rides.clone(), LogOverlay)),
        rx,
    );

    let event = NotificationEvent::new("com.example.chat", "New trip request ₹250, 8.5 km");
    assert_eq!(service.dispatch(event).unwrap_err(), SkipReason::UnsupportedApp);
    service.shutdown().await;

    assert!(rides.local_rides("driver-1").await.is_empty());
}

#[tokio::test]
async fn test_offline_insert_syncs_later_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(FlakyBackend::default());
    backend.down.store(true, Ordering::SeqCst);
    let rides = Arc::new(RideStore::new(
        RideCache::open(dir.path().join("rides.csv")).unwrap(),
        backend.clone(),
    ));
    let (_tx, rx) = watch::channel(Arc::new(ready_snapshot()));
    let service = NotificationService::new(
        Arc::new(RideProcessor::new(rides.clone(), LogOverlay)),
        rx,
    );

    let event =
        NotificationEvent::new("com.ubercab.driver", "New trip request ₹250, 8.5 km, 2★");
    let processed = service.dispatch(event).unwrap().await.unwrap().unwrap();

    assert!(processed.ride.id.is_some());
    assert_eq!(processed.ride.classification, RideClassification::Average);
    assert_eq!(rides.pending_sync_count().await, 1);
    assert!(backend.rows.lock().unwrap().is_empty());

    backend.down.store(false, Ordering::SeqCst);
    assert_eq!(rides.sync_pending().await.unwrap(), 1);
    assert_eq!(rides.sync_pending().await.unwrap(), 0);
    assert_eq!(rides.pending_sync_count().await, 0);
    assert_eq!(backend.rows.lock().unwrap().len(), 1);

    // Survives a restart from the CSV cache.
    let reopened = RideCache::open(dir.path().join("rides.csv")).unwrap();
    let cached = reopened.get(processed.ride.id.as_deref().unwrap()).await.unwrap();
    assert_eq!(cached.fare_amount, 250.0);

    service.shutdown().await;
}

#[tokio::test]
async fn test_insert_through_repository_trait_with_backend_down() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FlakyBackend::default();
    backend.down.store(true, Ordering::SeqCst);
    let store = RideStore::new(RideCache::open(dir.path().join("rides.csv")).unwrap(), backend);

    let ride = Ride {
        id: None,
        user_id: "driver-1".to_string(),
        source_app: "Ola Driver".to_string(),
        pickup_location: None,
        dropoff_location: None,
        distance_km: None,
        estimated_duration_mins: Some(10),
        fare_amount: 500.0,
        surge_multiplier: None,
        tip_amount: None,
        earnings_per_km: None,
        earnings_per_hour: Some(3000.0),
        rider_rating: None,
        action: Default::default(),
        action_timestamp: None,
        classification: RideClassification::Good,
        notification_received_at: Utc::now(),
        created_at: None,
        raw_notification_data: Some("₹500 fare, 10 min".to_string()),
    };

    let saved = store.insert(ride).await.unwrap();
    assert!(saved.id.is_some());
    assert_eq!(store.pending_sync_count().await, 1);
}

#[tokio::test]
async fn test_parse_uses_saved_user_thresholds() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::new(
        SettingsCache::open(dir.path().join("settings.json")).unwrap(),
        Remote::Offline,
    );
    let lenient = UserSettings {
        good_earnings_per_km: 25.0,
        good_rating: 2.0,
        ..UserSettings::for_user("driver-1")
    };
    // Offline: kept locally, reported as not synced.
    assert!(!store.update_settings(&lenient).await.unwrap());

    let signals = parse_notification("New trip request ₹250, 8.5 km, 2★", "Uber Driver");
    let classify_with = |settings: &UserSettings| {
        classify(
            signals.earnings_per_km,
            signals.earnings_per_hour,
            signals.rider_rating,
            &settings.thresholds(),
        )
    };

    let saved = store.effective_settings("driver-1").await;
    assert_eq!(classify_with(&saved), RideClassification::Good);
    let fresh = store.effective_settings("driver-2").await;
    assert_eq!(classify_with(&fresh), RideClassification::Average);
}

#[test]
fn test_data_dir_has_a_single_owner() {
    let dir = tempfile::tempdir().unwrap();
    let lock_path = dir.path().join(".earnmeter.lock");

    let running = StoreLock::acquire(&lock_path).unwrap();
    assert!(StoreLock::acquire(&lock_path).is_err());
    drop(running);
    assert!(StoreLock::acquire(&lock_path).is_ok());
}
