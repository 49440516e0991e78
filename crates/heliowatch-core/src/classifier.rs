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

//! Client for the external fault-classification service
//!
//! The classifier is consumed as an opaque HTTP service with three
//! endpoints: `/predict` (weather → predicted production), `/detect-fault`
//! (weather + actual production → full verdict) and `/forecast`. Feature
//! names on the wire follow the model's training columns (PascalCase).

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use heliowatch_types::{FaultSeverity, FaultType, Prediction, WeatherSample};

use crate::errors::{CoreError, CoreResult};

pub const DEFAULT_CLASSIFIER_URL: &str = "http://localhost:5002";

/// Prediction-only calls are lightweight and used in backfill fan-out.
const PREDICT_TIMEOUT: Duration = Duration::from_secs(5);
const DETECT_TIMEOUT: Duration = Duration::from_secs(15);
const FORECAST_TIMEOUT: Duration = Duration::from_secs(30);

const SERVICE: &str = "classifier";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct WeatherFeatures {
    hour: u32,
    day: u32,
    month: u32,
    wind_speed: f64,
    sunshine: f64,
    air_pressure: f64,
    radiation: f64,
    air_temperature: f64,
    relative_air_humidity: f64,
}

impl From<&WeatherSample> for WeatherFeatures {
    fn from(sample: &WeatherSample) -> Self {
        Self {
            hour: sample.hour,
            day: sample.day,
            month: sample.month,
            wind_speed: sample.wind_speed,
            sunshine: sample.sunshine,
            air_pressure: sample.air_pressure,
            radiation: sample.radiation,
            air_temperature: sample.air_temperature,
            relative_air_humidity: sample.relative_air_humidity,
        }
    }
}

#[derive(Debug, Serialize)]
struct DetectRequest {
    #[serde(flatten)]
    features: WeatherFeatures,
    #[serde(rename = "actualProduction")]
    actual_production: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ForecastRequest {
    hours_ahead: u32,
    current_wind_speed: f64,
    current_air_pressure: f64,
    current_humidity: f64,
    /// Hook for a real hourly forecast feed; empty lets the service
    /// estimate from the current sample.
    weather_forecast: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    success: bool,
    #[serde(default, rename = "predictedSystemProduction")]
    predicted_system_production: f64,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictionWire {
    #[serde(default)]
    predicted_production: f64,
    #[serde(default)]
    actual_production: f64,
    #[serde(default)]
    fault_detected: bool,
    #[serde(default)]
    fault_type: FaultType,
    #[serde(default)]
    fault_severity: FaultSeverity,
    #[serde(default)]
    deviation: f64,
}

impl From<PredictionWire> for Prediction {
    fn from(wire: PredictionWire) -> Self {
        Self {
            predicted_production_w: wire.predicted_production,
            actual_production_w: wire.actual_production,
            fault_detected: wire.fault_detected,
            fault_type: wire.fault_type,
            fault_severity: wire.fault_severity,
            deviation_percent: wire.deviation,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    prediction: Option<PredictionWire>,
    #[serde(default)]
    error: Option<String>,
}

/// One point of an hours-ahead production forecast.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPoint {
    pub timestamp: String,
    pub hour: u32,
    pub predicted_production: f64,
    #[serde(default)]
    pub weather: Value,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    forecasts: Vec<ForecastPoint>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClassifierClient {
    client: Client,
    base_url: String,
}

impl ClassifierClient {
    pub fn new(base_url: impl Into<String>) -> CoreResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| CoreError::upstream(SERVICE, format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    /// Predicted production for a weather sample, in watts.
    pub async fn predict(&self, weather: &WeatherSample) -> CoreResult<f64> {
        let url = format!("{}/predict", self.base_url);
        debug!("🧠 [CLASSIFIER] POST {url} (hour={})", weather.hour);

        let response: PredictResponse = self
            .post_json(&url, &WeatherFeatures::from(weather), PREDICT_TIMEOUT)
            .await?;

        if !response.success {
            return Err(CoreError::upstream(
                SERVICE,
                response.error.unwrap_or_else(|| "prediction failed".to_owned()),
            ));
        }
        Ok(response.predicted_system_production)
    }

    /// Full fault verdict for a weather sample and measured AC power.
    pub async fn detect_fault(
        &self,
        weather: &WeatherSample,
        actual_production: f64,
    ) -> CoreResult<Prediction> {
        let url = format!("{}/detect-fault", self.base_url);
        debug!("🧠 [CLASSIFIER] POST {url} (actual={actual_production}W)");

        let request = DetectRequest {
            features: WeatherFeatures::from(weather),
            actual_production,
        };
        let response: DetectResponse = self.post_json(&url, &request, DETECT_TIMEOUT).await?;

        match response.prediction {
            Some(prediction) if response.success => Ok(prediction.into()),
            Some(_) | None => Err(CoreError::upstream(
                SERVICE,
                response.error.unwrap_or_else(|| "fault detection failed".to_owned()),
            )),
        }
    }

    /// Hourly production forecast derived from the current sample.
    pub async fn forecast(
        &self,
        weather: &WeatherSample,
        hours_ahead: u32,
    ) -> CoreResult<Vec<ForecastPoint>> {
        let url = format!("{}/forecast", self.base_url);
        debug!("🧠 [CLASSIFIER] POST {url} (hours_ahead={hours_ahead})");

        let request = ForecastRequest {
            hours_ahead,
            current_wind_speed: weather.wind_speed,
            current_air_pressure: weather.air_pressure,
            current_humidity: weather.relative_air_humidity,
            weather_forecast: Vec::new(),
        };
        let response: ForecastResponse = self.post_json(&url, &request, FORECAST_TIMEOUT).await?;

        if !response.success {
            return Err(CoreError::upstream(
                SERVICE,
                response.error.unwrap_or_else(|| "forecast failed".to_owned()),
            ));
        }
        Ok(response.forecasts)
    }

    async fn post_json<Req, Resp>(&self, url: &str, body: &Req, timeout: Duration) -> CoreResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| CoreError::upstream(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::upstream(
                SERVICE,
                format!("service returned HTTP {status}"),
            ));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| CoreError::upstream(SERVICE, e))
    }
}
