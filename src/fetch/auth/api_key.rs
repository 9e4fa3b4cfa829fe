use crate::fetch::client::HttpClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};

/// An [`HttpClient`] wrapper that injects a credential as an HTTP header.
///
/// The backend expects two of these stacked: the project key in an `apikey`
/// header and the user's session token as `Authorization: Bearer <token>`.
pub struct ApiKey<C> {
    inner: C,
    header_name: HeaderName,
    value: HeaderValue,
}

impl<C> ApiKey<C> {
    pub fn new(inner: C, header_name: &str, key: &str) -> Result<Self> {
        let header_name = HeaderName::from_bytes(header_name.as_bytes())
            .with_context(|| format!("invalid header name '{header_name}'"))?;
        let mut value =
            HeaderValue::from_str(key).context("credential is not a valid header value")?;
        value.set_sensitive(true);

        Ok(Self {
            inner,
            header_name,
            value,
        })
    }

    /// Uses `Authorization: Bearer <key>`.
    pub fn bearer(inner: C, key: &str) -> Result<Self> {
        Self::new(inner, "Authorization", &format!("Bearer {key}"))
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(self.header_name.clone(), self.value.clone());
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::json_request;
    use crate::fetch::testing::ScriptedClient;
    use reqwest::Method;

    #[tokio::test]
    async fn test_stacked_keys_set_both_headers() {
        let client = ApiKey::new(
            ApiKey::bearer(ScriptedClient::default(), "session-token").unwrap(),
            "apikey",
            "anon-key",
        )
        .unwrap();

        let url = "https://backend.test/rest/v1/rides";
        let req = json_request::<()>(Method::GET, url, None).unwrap();
        client.execute(req).await.unwrap();

        let captured = client.inner.inner.requests();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].headers["apikey"], "anon-key");
        assert_eq!(captured[0].headers["authorization"], "Bearer session-token");
    }

    #[test]
    fn test_rejects_invalid_header_name() {
        assert!(ApiKey::new(ScriptedClient::default(), "bad header", "k").is_err());
    }

    #[test]
    fn test_rejects_invalid_header_value() {
        assert!(ApiKey::new(ScriptedClient::default(), "apikey", "line\nbreak").is_err());
    }
}
