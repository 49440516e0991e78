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

//! Weather provider client
//!
//! Weather is mandatory for fault detection (unlike telemetry, which is
//! best-effort): an unreachable weather feed aborts the detection run.

use chrono::{DateTime, Datelike, Local, Timelike};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use heliowatch_providers::to_number;
use heliowatch_types::WeatherSample;

use crate::errors::{CoreError, CoreResult};

pub const DEFAULT_WEATHER_URL: &str =
    "https://solaxcloud.dynac.space/api/v2/dataAccess/realtimeInfo/get";

const WEATHER_TIMEOUT: Duration = Duration::from_secs(10);

/// Defaults substituted for fields the provider omits.
const DEFAULT_AIR_PRESSURE_HPA: f64 = 1010.0;
const DEFAULT_AIR_TEMPERATURE_C: f64 = 25.0;
const DEFAULT_RELATIVE_HUMIDITY: f64 = 60.0;

#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    url: String,
}

impl WeatherClient {
    pub fn new(url: impl Into<String>) -> CoreResult<Self> {
        let client = Client::builder()
            .timeout(WEATHER_TIMEOUT)
            .build()
            .map_err(|e| CoreError::upstream("weather", format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Fetch the current environmental sample, with clock-derived and
    /// climatological defaults for any missing field.
    pub async fn current(&self) -> CoreResult<WeatherSample> {
        debug!("🌤️ [WEATHER] Fetching current sample from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CoreError::upstream("weather", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::upstream(
                "weather",
                format!("provider returned HTTP {status}"),
            ));
        }

        let raw = response
            .json::<Value>()
            .await
            .map_err(|e| CoreError::upstream("weather", e))?;

        Ok(map_weather(&raw, Local::now()))
    }
}

fn field_number(raw: &Value, key: &str, fallback: f64) -> f64 {
    raw.get(key).map_or(fallback, |value| to_number(value, fallback))
}

fn field_u32(raw: &Value, key: &str, fallback: u32) -> u32 {
    let number = field_number(raw, key, f64::from(fallback));
    if (0.0..=f64::from(u32::MAX)).contains(&number) {
        number as u32
    } else {
        fallback
    }
}

/// Map a raw weather payload onto [`WeatherSample`].
///
/// Calendar fields default to the supplied clock; physical fields fall
/// back to neutral climatological values so the classifier always gets a
/// complete feature vector.
pub fn map_weather(raw: &Value, now: DateTime<Local>) -> WeatherSample {
    WeatherSample {
        month: field_u32(raw, "month", now.month()),
        day: field_u32(raw, "day", now.day()),
        hour: field_u32(raw, "hour", now.hour()),
        minute: field_u32(raw, "minute", now.minute()),
        wind_speed: field_number(raw, "windSpeed", 0.0),
        sunshine: field_number(raw, "sunshine", 0.0),
        air_pressure: field_number(raw, "airPressure", DEFAULT_AIR_PRESSURE_HPA),
        radiation: field_number(raw, "radiation", 0.0),
        air_temperature: field_number(raw, "airTemperature", DEFAULT_AIR_TEMPERATURE_C),
        relative_air_humidity: field_number(raw, "relativeAirHumidity", DEFAULT_RELATIVE_HUMIDITY),
        last_updated: raw
            .get("last_updated")
            .and_then(Value::as_str)
            .map_or_else(|| now.to_rfc3339(), ToOwned::to_owned),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockito::Server;
    use serde_json::json;

    fn reference_clock() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 15, 14, 42, 5).unwrap()
    }

    #[test]
    fn provider_fields_take_precedence_over_defaults() {
        let raw = json!({
            "month": 3,
            "day": 9,
            "hour": 11,
            "minute": 30,
            "windSpeed": 6.5,
            "sunshine": 48.0,
            "airPressure": 996.0,
            "radiation": 410.0,
            "airTemperature": 17.5,
            "relativeAirHumidity": 81.0,
            "last_updated": "2025-03-09T11:30:00"
        });

        let sample = map_weather(&raw, reference_clock());
        assert_eq!(sample.hour, 11);
        assert_eq!(sample.air_pressure, 996.0);
        assert_eq!(sample.last_updated, "2025-03-09T11:30:00");
    }

    #[test]
    fn missing_fields_get_clock_and_climate_defaults() {
        let sample = map_weather(&json!({}), reference_clock());
        assert_eq!(sample.month, 6);
        assert_eq!(sample.day, 15);
        assert_eq!(sample.hour, 14);
        assert_eq!(sample.wind_speed, 0.0);
        assert_eq!(sample.air_pressure, 1010.0);
        assert_eq!(sample.air_temperature, 25.0);
        assert_eq!(sample.relative_air_humidity, 60.0);
    }

    #[test]
    fn zero_values_from_the_provider_are_kept() {
        // 0 is a legitimate reading (calm wind, midnight hour), not a gap.
        let raw = json!({ "hour": 0, "windSpeed": 0.0, "airTemperature": 0.0 });
        let sample = map_weather(&raw, reference_clock());
        assert_eq!(sample.hour, 0);
        assert_eq!(sample.air_temperature, 0.0);
    }

    #[tokio::test]
    async fn current_maps_the_provider_response() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/weather")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "hour": 10, "radiation": 350.0 }).to_string())
            .create_async()
            .await;

        let client = WeatherClient::new(format!("{}/weather", server.url())).unwrap();
        let sample = client.current().await.unwrap();

        assert_eq!(sample.hour, 10);
        assert_eq!(sample.radiation, 350.0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn upstream_failure_is_terminal() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/weather")
            .with_status(502)
            .create_async()
            .await;

        let client = WeatherClient::new(format!("{}/weather", server.url())).unwrap();
        let err = client.current().await.unwrap_err();
        assert!(matches!(err, CoreError::Upstream { .. }));
    }
}
