mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result, anyhow};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Builds a request for `url`, serializing `body` as JSON when given.
pub fn json_request<B: Serialize + ?Sized>(
    method: Method,
    url: &str,
    body: Option<&B>,
) -> Result<Request> {
    let mut req = Request::new(
        method,
        url.parse().with_context(|| format!("invalid url '{url}'"))?,
    );

    if let Some(body) = body {
        let bytes = serde_json::to_vec(body)?;
        req.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *req.body_mut() = Some(bytes.into());
    }

    Ok(req)
}

/// Executes `req` and decodes a JSON response body.
///
/// # Errors
///
/// Fails on transport errors, on any non-2xx status (the status and body are
/// included in the message), and when the body is not valid JSON for `T`.
pub async fn fetch_json<C: HttpClient + ?Sized, T: DeserializeOwned>(
    client: &C,
    req: Request,
) -> Result<T> {
    let method = req.method().clone();
    let url = req.url().clone();

    let resp = client
        .execute(req)
        .await
        .map_err(|e| anyhow!("{method} {} failed: {e}", url.path()))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(anyhow!(
            "{method} {} returned status {status}: {body}",
            url.path()
        ));
    }

    resp.json()
        .await
        .with_context(|| format!("failed to decode {method} {} response", url.path()))
}

#[cfg(test)]
pub(crate) mod testing {
    //! A scripted [`HttpClient`] that records requests and replays responses.

    use super::HttpClient;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub struct Captured {
        pub method: reqwest::Method,
        pub url: String,
        pub headers: reqwest::header::HeaderMap,
        pub body: Option<String>,
    }

    #[derive(Default)]
    pub struct ScriptedClient {
        responses: Mutex<VecDeque<(u16, String)>>,
        pub captured: Mutex<Vec<Captured>>,
    }

    impl ScriptedClient {
        pub fn respond(self, status: u16, body: &str) -> Self {
            self.responses
                .lock()
                .unwrap()
                .push_back((status, body.to_string()));
            self
        }

        pub fn requests(&self) -> Vec<Captured> {
            self.captured.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedClient {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            self.captured.lock().unwrap().push(Captured {
                method: req.method().clone(),
                url: req.url().to_string(),
                headers: req.headers().clone(),
                body: req
                    .body()
                    .and_then(|b| b.as_bytes())
                    .map(|b| String::from_utf8_lossy(b).into_owned()),
            });

            let (status, body) = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or((200, "[]".to_string()));

            let resp = http::Response::builder()
                .status(status)
                .body(body)
                .unwrap();
            Ok(reqwest::Response::from(resp))
        }
    }
}
