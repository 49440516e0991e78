// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HelioWatch.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Telemetry retrieval with per-host protocol strategies
//!
//! Device endpoints fall into three families, each with its own ladder
//! of attempts (short-circuiting on the first usable payload):
//!
//! - dedicated weather feed: single GET, body returned as-is
//! - known vendor cloud: POST `{wifiSn}` with `tokenId` header, then GET
//! - unknown host: GET first, then the vendor-cloud POST convention
//!
//! There are no retries beyond the ladder; callers own any retry policy.

use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use crate::classify::looks_like_weather;
use crate::errors::{FetchError, FetchResult};

/// Request timeout for telemetry providers.
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Header carrying the provider credential.
const TOKEN_HEADER: &str = "tokenId";

/// Hosts served by the dedicated weather feed.
const WEATHER_HOSTS: &[&str] = &["solaxcloud.dynac.space"];

/// Known vendor-cloud hosts.
const CLOUD_HOSTS: &[&str] = &["solaxcloud.com", "global.solaxcloud"];

/// Vendor-cloud realtime endpoint, used as the secondary source when a
/// device's configured URL turns out to be unusable.
pub const CLOUD_FALLBACK_URL: &str =
    "https://global.solaxcloud.com/api/v2/dataAccess/realtimeInfo/get";

/// HTTP client for heterogeneous telemetry providers.
#[derive(Debug, Clone)]
pub struct ProviderFetcher {
    client: Client,
    weather_hosts: Vec<String>,
    cloud_hosts: Vec<String>,
}

impl ProviderFetcher {
    pub fn new() -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Client(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            weather_hosts: WEATHER_HOSTS.iter().map(|h| (*h).to_owned()).collect(),
            cloud_hosts: CLOUD_HOSTS.iter().map(|h| (*h).to_owned()).collect(),
        })
    }

    /// Register an additional host substring treated as a weather feed.
    pub fn with_weather_host(mut self, host: impl Into<String>) -> Self {
        self.weather_hosts.push(host.into().to_lowercase());
        self
    }

    /// Register an additional host substring treated as a vendor cloud.
    pub fn with_cloud_host(mut self, host: impl Into<String>) -> Self {
        self.cloud_hosts.push(host.into().to_lowercase());
        self
    }

    /// Fetch realtime data from a device endpoint.
    ///
    /// `token` is forwarded as a credential header; `serial` becomes the
    /// POST body field for vendor-cloud style endpoints. Returns the raw
    /// JSON payload (with any `result` envelope already unwrapped) or a
    /// typed failure after the strategy ladder is exhausted.
    pub async fn fetch(&self, api_url: &str, token: &str, serial: &str) -> FetchResult<Value> {
        let url = api_url.trim();
        if url.is_empty() {
            return Err(FetchError::MissingUrl);
        }

        if self.is_weather_url(url) {
            debug!("🌤️ [FETCH] weather endpoint, GET only: {url}");
            return self.get_json(url, token).await;
        }

        if self.is_cloud_url(url) {
            debug!("☁️ [FETCH] vendor cloud endpoint, POST then GET: {url}");
            match self.post_json(url, token, serial).await {
                Ok(body) => {
                    if let Some(payload) = usable_payload(&body) {
                        return Ok(payload);
                    }
                    debug!("☁️ [FETCH] POST body unusable, falling back to GET");
                }
                Err(e) => warn!("⚠️ [FETCH] cloud POST failed, trying GET: {e}"),
            }
            let body = self.get_json(url, token).await?;
            return usable_payload(&body).ok_or(FetchError::InvalidFormat);
        }

        debug!("🔌 [FETCH] unknown host, GET then POST: {url}");
        match self.get_json(url, token).await {
            Ok(body) => {
                if looks_like_weather(&body) {
                    return Ok(body);
                }
                if let Some(payload) = usable_payload(&body) {
                    return Ok(payload);
                }
                debug!("🔌 [FETCH] GET body unusable, falling back to POST");
            }
            Err(e) => warn!("⚠️ [FETCH] GET failed, trying POST: {e}"),
        }
        let body = self.post_json(url, token, serial).await?;
        usable_payload(&body).ok_or(FetchError::InvalidFormat)
    }

    fn is_weather_url(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        self.weather_hosts.iter().any(|host| url.contains(host))
    }

    fn is_cloud_url(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        self.cloud_hosts.iter().any(|host| url.contains(host))
    }

    async fn get_json(&self, url: &str, token: &str) -> FetchResult<Value> {
        let mut request = self.client.get(url);
        if !token.is_empty() {
            request = request.header(TOKEN_HEADER, token);
        }
        let response = request.send().await.map_err(transport_error)?;
        read_json_body(response).await
    }

    async fn post_json(&self, url: &str, token: &str, serial: &str) -> FetchResult<Value> {
        let body = if serial.is_empty() {
            json!({})
        } else {
            json!({ "wifiSn": serial })
        };

        let response = self
            .client
            .post(url)
            .header(TOKEN_HEADER, token)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        read_json_body(response).await
    }
}

/// Unwrap the payload a response body carries, if any.
///
/// Vendor clouds wrap readings in a `result` envelope; bare objects are
/// accepted as-is. Scalars and arrays are not usable.
fn usable_payload(body: &Value) -> Option<Value> {
    if let Some(result) = body.get("result")
        && result.is_object()
    {
        return Some(result.clone());
    }
    body.is_object().then(|| body.clone())
}

fn transport_error(err: reqwest::Error) -> FetchError {
    FetchError::Http {
        message: err.to_string(),
        status: err.status().map(|status| status.as_u16()),
    }
}

async fn read_json_body(response: reqwest::Response) -> FetchResult<Value> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(FetchError::Http {
            message: if message.is_empty() {
                format!("provider returned HTTP {status}")
            } else {
                message
            },
            status: Some(status.as_u16()),
        });
    }

    response
        .json::<Value>()
        .await
        .map_err(|_| FetchError::InvalidFormat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use serde_json::json;

    fn fetcher() -> ProviderFetcher {
        ProviderFetcher::new().unwrap()
    }

    #[tokio::test]
    async fn weather_url_uses_single_get() {
        let mut server = Server::new_async().await;
        let get = server
            .mock("GET", "/realtime")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "hour": 11, "windSpeed": 3.1 }).to_string())
            .create_async()
            .await;
        let post = server
            .mock("POST", "/realtime")
            .expect(0)
            .create_async()
            .await;

        let fetcher = fetcher().with_weather_host(server.host_with_port());
        let body = fetcher
            .fetch(&format!("{}/realtime", server.url()), "", "")
            .await
            .unwrap();

        assert_eq!(body["hour"], 11);
        get.assert_async().await;
        post.assert_async().await;
    }

    #[tokio::test]
    async fn cloud_url_prefers_post_and_unwraps_result() {
        let mut server = Server::new_async().await;
        let post = server
            .mock("POST", "/api/realtime")
            .match_header("tokenId", "tok-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({ "success": true, "result": { "acpower": 812.0 } }).to_string(),
            )
            .create_async()
            .await;

        let fetcher = fetcher().with_cloud_host(server.host_with_port());
        let body = fetcher
            .fetch(&format!("{}/api/realtime", server.url()), "tok-1", "SNABC")
            .await
            .unwrap();

        assert_eq!(body["acpower"], 812.0);
        post.assert_async().await;
    }

    #[tokio::test]
    async fn cloud_post_failure_falls_back_to_get() {
        let mut server = Server::new_async().await;
        let post = server
            .mock("POST", "/api/realtime")
            .with_status(503)
            .create_async()
            .await;
        let get = server
            .mock("GET", "/api/realtime")
            .match_header("tokenId", "tok-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "acpower": 640.0 }).to_string())
            .create_async()
            .await;

        let fetcher = fetcher().with_cloud_host(server.host_with_port());
        let body = fetcher
            .fetch(&format!("{}/api/realtime", server.url()), "tok-1", "SNABC")
            .await
            .unwrap();

        assert_eq!(body["acpower"], 640.0);
        post.assert_async().await;
        get.assert_async().await;
    }

    #[tokio::test]
    async fn unknown_host_tries_get_before_post() {
        let mut server = Server::new_async().await;
        let get = server
            .mock("GET", "/data")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "acpower": 50.0 }).to_string())
            .create_async()
            .await;
        let post = server.mock("POST", "/data").expect(0).create_async().await;

        let fetcher = fetcher();
        let body = fetcher
            .fetch(&format!("{}/data", server.url()), "tok", "SN1")
            .await
            .unwrap();

        assert_eq!(body["acpower"], 50.0);
        get.assert_async().await;
        post.assert_async().await;
    }

    #[tokio::test]
    async fn unknown_host_get_failure_falls_back_to_post() {
        let mut server = Server::new_async().await;
        let get = server.mock("GET", "/data").with_status(500).create_async().await;
        let post = server
            .mock("POST", "/data")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "result": { "acpower": 75.0 } }).to_string())
            .create_async()
            .await;

        let fetcher = fetcher();
        let body = fetcher
            .fetch(&format!("{}/data", server.url()), "tok", "SN1")
            .await
            .unwrap();

        assert_eq!(body["acpower"], 75.0);
        get.assert_async().await;
        post.assert_async().await;
    }

    #[tokio::test]
    async fn weather_shaped_get_response_is_accepted_as_is() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/data")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "hour": 9, "radiation": 120.0 }).to_string())
            .create_async()
            .await;

        let fetcher = fetcher();
        let body = fetcher
            .fetch(&format!("{}/data", server.url()), "", "")
            .await
            .unwrap();

        assert_eq!(body["radiation"], 120.0);
    }

    #[tokio::test]
    async fn non_object_responses_exhaust_to_invalid_format() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/data")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("\"plain text\"")
            .create_async()
            .await;
        let _post = server
            .mock("POST", "/data")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[1, 2, 3]")
            .create_async()
            .await;

        let fetcher = fetcher();
        let err = fetcher
            .fetch(&format!("{}/data", server.url()), "tok", "SN1")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::InvalidFormat));
    }

    #[tokio::test]
    async fn missing_url_is_rejected_before_any_request() {
        let fetcher = ProviderFetcher::new().unwrap();
        let err = fetcher.fetch("   ", "tok", "SN1").await.unwrap_err();
        assert!(matches!(err, FetchError::MissingUrl));
    }

    #[tokio::test]
    async fn http_errors_carry_the_status_code() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/realtime")
            .with_status(401)
            .with_body("bad token")
            .create_async()
            .await;

        let fetcher = fetcher().with_weather_host(server.host_with_port());
        let err = fetcher
            .fetch(&format!("{}/realtime", server.url()), "", "")
            .await
            .unwrap_err();

        assert_eq!(err.http_status(), Some(401));
    }
}
