use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Method, Request, Url};
use tracing::debug;

use crate::fetch::auth::ApiKey;
use crate::fetch::{BasicClient, HttpClient, fetch_json, json_request};
use crate::model::{Ride, SuggestedRanges, SupportedApp, UserSettings};
use crate::services::{RideApi, SettingsApi};

/// Transport used against the real backend: project key plus bearer session.
pub type AuthedClient = ApiKey<ApiKey<BasicClient>>;

const PREFER: HeaderName = HeaderName::from_static("prefer");
const UPSERT_RETURNING_ROWS: &str = "resolution=merge-duplicates,return=representation";

/// Client for the backend's PostgREST interface (`/rest/v1/<table>`).
pub struct BackendClient<C> {
    base_url: String,
    http: C,
}

impl BackendClient<AuthedClient> {
    /// Connects with the project `api_key` and the user's `access_token`.
    pub fn connect(base_url: &str, api_key: &str, access_token: &str) -> Result<Self> {
        let http = ApiKey::new(
            ApiKey::bearer(BasicClient::new()?, access_token)?,
            "apikey",
            api_key,
        )?;
        Ok(Self::new(base_url, http))
    }
}

impl<C: HttpClient> BackendClient<C> {
    pub fn new(base_url: &str, http: C) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    fn table_url(&self, table: &str, query: &[(&str, String)]) -> Result<String> {
        let mut url = Url::parse(&format!("{}/rest/v1/{table}", self.base_url))
            .map_err(|e| anyhow!("invalid backend url '{}': {e}", self.base_url))?;

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url.into())
    }

    fn upsert_request<B: serde::Serialize>(
        &self,
        table: &str,
        conflict_column: &str,
        body: &B,
    ) -> Result<Request> {
        let url = self.table_url(table, &[("on_conflict", conflict_column.to_string())])?;
        let mut req = json_request(Method::POST, &url, Some(body))?;
        req.headers_mut()
            .insert(PREFER, HeaderValue::from_static(UPSERT_RETURNING_ROWS));
        Ok(req)
    }

    async fn select<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let url = self.table_url(table, query)?;
        let req = json_request::<()>(Method::GET, &url, None)?;
        fetch_json(&self.http, req).await
    }
}

fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl<C: HttpClient> RideApi for BackendClient<C> {
    #[tracing::instrument(skip_all, fields(ride_id = ride.id.as_deref().unwrap_or("")))]
    async fn upsert_ride(&self, ride: &Ride) -> Result<Ride> {
        let req = self.upsert_request("rides", "id", ride)?;
        let rows: Vec<Ride> = fetch_json(&self.http, req).await?;
        debug!(returned = rows.len(), "Ride upserted");

        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("backend returned no row for ride upsert"))
    }

    async fn list_rides(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Ride>> {
        self.select(
            "rides",
            &[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{user_id}")),
                ("order", "notification_received_at.desc".to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ],
        )
        .await
    }

    async fn list_rides_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Ride>> {
        self.select(
            "rides",
            &[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{user_id}")),
                ("notification_received_at", format!("gte.{}", timestamp(start))),
                ("notification_received_at", format!("lte.{}", timestamp(end))),
                ("order", "notification_received_at.desc".to_string()),
            ],
        )
        .await
    }
}

#[async_trait]
impl<C: HttpClient> SettingsApi for BackendClient<C> {
    async fn get_user_settings(&self, user_id: &str) -> Result<Option<UserSettings>> {
        let rows: Vec<UserSettings> = self
            .select(
                "user_settings",
                &[
                    ("select", "*".to_string()),
                    ("user_id", format!("eq.{user_id}")),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_user_settings(&self, settings: &UserSettings) -> Result<()> {
        let req = self.upsert_request("user_settings", "user_id", settings)?;
        let _: Vec<UserSettings> = fetch_json(&self.http, req).await?;
        Ok(())
    }

    async fn list_supported_apps(&self) -> Result<Vec<SupportedApp>> {
        self.select(
            "supported_apps",
            &[
                ("select", "*".to_string()),
                ("is_active", "eq.true".to_string()),
            ],
        )
        .await
    }

    async fn get_suggested_ranges(&self, city: &str) -> Result<Option<SuggestedRanges>> {
        let rows: Vec<SuggestedRanges> = self
            .select(
                "admin_suggested_ranges",
                &[
                    ("select", "*".to_string()),
                    ("city", format!("eq.{city}")),
                    ("is_active", "eq.true".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::ScriptedClient;
    use chrono::TimeZone;

    const RIDE_ROW: &str = r#"[{
        "id": "0b7c7f9e-4f5e-4c31-9d0e-3a1d2f6b8c11",
        "user_id": "u-1",
        "source_app": "Uber Driver",
        "fare_amount": 250.0,
        "distance_km": 8.5,
        "classification": "average",
        "action": "pending",
        "notification_received_at": "2026-10-18T09:30:00Z",
        "created_at": "2026-10-18T09:30:01Z"
    }]"#;

    fn sample_ride() -> Ride {
        Ride {
            id: Some("0b7c7f9e-4f5e-4c31-9d0e-3a1d2f6b8c11".to_string()),
            user_id: "u-1".to_string(),
            source_app: "Uber Driver".to_string(),
            pickup_location: None,
            dropoff_location: None,
            distance_km: Some(8.5),
            estimated_duration_mins: None,
            fare_amount: 250.0,
            surge_multiplier: None,
            tip_amount: None,
            earnings_per_km: Some(250.0 / 8.5),
            earnings_per_hour: None,
            rider_rating: Some(2.0),
            action: Default::default(),
            action_timestamp: None,
            classification: crate::model::RideClassification::Average,
            notification_received_at: Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap(),
            created_at: None,
            raw_notification_data: Some("New trip request ₹250, 8.5 km, 2★".to_string()),
        }
    }

    fn backend(status: u16, body: &str) -> BackendClient<ScriptedClient> {
        BackendClient::new("https://backend.test/", ScriptedClient::default().respond(status, body))
    }

    #[tokio::test]
    async fn test_upsert_ride_posts_with_conflict_target() {
        let backend = backend(201, RIDE_ROW);

        let stored = backend.upsert_ride(&sample_ride()).await.unwrap();

        assert!(stored.created_at.is_some());
        let req = &backend.http.requests()[0];
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.url, "https://backend.test/rest/v1/rides?on_conflict=id");
        assert_eq!(req.headers["prefer"], UPSERT_RETURNING_ROWS);
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["fare_amount"], 250.0);
        assert_eq!(body["classification"], "average");
    }

    #[tokio::test]
    async fn test_upsert_ride_without_returned_row_fails() {
        let backend = backend(201, "[]");
        assert!(backend.upsert_ride(&sample_ride()).await.is_err());
    }

    #[tokio::test]
    async fn test_list_rides_filters_and_pages() {
        let backend = backend(200, RIDE_ROW);

        let rides = backend.list_rides("u-1", 20, 40).await.unwrap();

        assert_eq!(rides.len(), 1);
        let url = &backend.http.requests()[0].url;
        assert!(url.contains("user_id=eq.u-1"));
        assert!(url.contains("limit=20"));
        assert!(url.contains("offset=40"));
        assert!(url.contains("order=notification_received_at.desc"));
    }

    #[tokio::test]
    async fn test_list_rides_between_sends_both_bounds() {
        let backend = BackendClient::new("https://backend.test", ScriptedClient::default());
        let start = Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 10, 18, 23, 59, 59).unwrap()
            + chrono::Duration::milliseconds(999);

        backend.list_rides_between("u-1", start, end).await.unwrap();

        let url = &backend.http.requests()[0].url;
        assert!(url.contains("notification_received_at=gte.2026-10-18T00%3A00%3A00.000Z"));
        assert!(url.contains("notification_received_at=lte.2026-10-18T23%3A59%3A59.999Z"));
    }

    #[tokio::test]
    async fn test_get_user_settings_missing_row_is_none() {
        let backend = backend(200, "[]");
        assert_eq!(backend.get_user_settings("u-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_supported_apps_decodes_patterns() {
        let body = r#"[{
            "id": "a1",
            "package_name": "com.ubercab.driver",
            "app_name": "Uber Driver",
            "notification_patterns": ["New trip request", "₹"],
            "is_active": true
        }]"#;
        let backend = backend(200, body);

        let apps = backend.list_supported_apps().await.unwrap();

        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].notification_patterns, vec!["New trip request", "₹"]);
        assert!(backend.http.requests()[0].url.contains("is_active=eq.true"));
    }

    #[tokio::test]
    async fn test_server_error_propagates() {
        let backend = backend(503, "down");
        let err = backend.list_supported_apps().await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_get_suggested_ranges_filters_city_and_active() {
        let body = r#"[{
            "id": "r1",
            "city": "Pune",
            "state": "Maharashtra",
            "suggested_good_per_km": 18.0,
            "suggested_avg_per_km": 12.0,
            "suggested_bad_per_km": 7.0,
            "suggested_good_per_hour": 350.0,
            "suggested_avg_per_hour": 250.0,
            "suggested_bad_per_hour": 150.0,
            "suggested_good_rating": 4.6,
            "suggested_avg_rating": 4.2,
            "suggested_bad_rating": 3.8,
            "is_active": true
        }]"#;
        let backend = backend(200, body);

        let ranges = backend.get_suggested_ranges("Pune").await.unwrap().unwrap();

        assert_eq!(ranges.suggested_good_per_km, 18.0);
        assert_eq!(ranges.state.as_deref(), Some("Maharashtra"));
        let url = &backend.http.requests()[0].url;
        assert!(url.starts_with("https://backend.test/rest/v1/admin_suggested_ranges?"));
        assert!(url.contains("city=eq.Pune"));
        assert!(url.contains("is_active=eq.true"));
        assert!(url.contains("limit=1"));
    }

    #[tokio::test]
    async fn test_get_suggested_ranges_unknown_city_is_none() {
        let backend = backend(200, "[]");
        assert_eq!(backend.get_suggested_ranges("Nowhere").await.unwrap(), None);
    }
}
