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

//! Fault-detection orchestration
//!
//! One pass per request, no retries at this layer:
//! load → refresh telemetry (best-effort) → fetch weather (mandatory) →
//! daylight gate → classify → persist. Telemetry failures degrade to
//! stale data; weather and classifier failures abort the run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info, warn};

use heliowatch_types::{
    Device, FaultRecord, LatestFaultStatus, Prediction, SolarSnapshot, WeatherSample,
};

use crate::classifier::{ClassifierClient, ForecastPoint};
use crate::errors::{CoreError, CoreResult};
use crate::refresh::DeviceRefresher;
use crate::traits::{DeviceStore, FaultStore};
use crate::weather::WeatherClient;

/// Local hours during which fault classification runs. Outside this
/// window a detection call short-circuits to a zero-fault result and
/// persists nothing, so history is not flooded with night entries.
pub const DAYLIGHT_HOURS: Range<u32> = 6..18;

/// Result of one detection call.
#[derive(Debug, Clone, Serialize)]
pub struct FaultDetectionOutcome {
    pub prediction: Prediction,
    pub weather: WeatherSample,
    pub timestamp: DateTime<Utc>,
    /// False when the daylight gate suppressed persistence.
    pub persisted: bool,
}

pub struct FaultOrchestrator {
    devices: Arc<dyn DeviceStore>,
    history: Arc<dyn FaultStore>,
    refresher: DeviceRefresher,
    weather: WeatherClient,
    classifier: ClassifierClient,
}

impl FaultOrchestrator {
    pub fn new(
        devices: Arc<dyn DeviceStore>,
        history: Arc<dyn FaultStore>,
        refresher: DeviceRefresher,
        weather: WeatherClient,
        classifier: ClassifierClient,
    ) -> Self {
        Self {
            devices,
            history,
            refresher,
            weather,
            classifier,
        }
    }

    /// Run fault detection for one device.
    pub async fn detect(&self, user_id: &str, device_id: i64) -> CoreResult<FaultDetectionOutcome> {
        let now = Utc::now();
        let mut device = self.load_device(user_id, device_id).await?;

        // Telemetry is best-effort: a dead provider still leaves us the
        // cached (possibly stale, possibly absent) reading.
        let refresh = self.refresher.refresh_if_stale(&mut device, now).await;
        if let Some(reason) = &refresh.error {
            warn!(
                "⚠️ [DETECT] telemetry refresh failed for {}: {reason}",
                device.serial
            );
        }

        let weather = self.weather.current().await?;

        if !DAYLIGHT_HOURS.contains(&weather.hour) {
            debug!(
                "🌙 [DETECT] hour {} outside daylight window, suppressing classification",
                weather.hour
            );
            return Ok(FaultDetectionOutcome {
                prediction: Prediction::default(),
                weather,
                timestamp: now,
                persisted: false,
            });
        }

        let actual_production = device
            .latest_data
            .as_ref()
            .map_or(0.0, |data| data.ac_power_w);
        let prediction = self.classifier.detect_fault(&weather, actual_production).await?;

        let record = FaultRecord {
            id: 0,
            device_id: device.id,
            user_id: user_id.to_owned(),
            timestamp: now,
            weather: weather.clone(),
            solar: SolarSnapshot::from_reading(device.latest_data.as_ref()),
            prediction: prediction.clone(),
        };
        let record = self.history.append(record).await?;

        info!(
            "✅ [DETECT] device {} fault={} type={} severity={}",
            device.serial,
            prediction.fault_detected,
            prediction.fault_type,
            prediction.fault_severity
        );

        Ok(FaultDetectionOutcome {
            prediction,
            weather,
            timestamp: record.timestamp,
            persisted: true,
        })
    }

    /// Most recent fault record summary; `None` when history is empty.
    pub async fn latest_status(
        &self,
        user_id: &str,
        device_id: i64,
    ) -> CoreResult<Option<LatestFaultStatus>> {
        let device = self.load_device(user_id, device_id).await?;
        let latest = self.history.latest(user_id, device.id).await?;
        Ok(latest.map(LatestFaultStatus::from))
    }

    /// Hours-ahead production forecast from current weather.
    pub async fn forecast(
        &self,
        user_id: &str,
        device_id: i64,
        hours_ahead: u32,
    ) -> CoreResult<Vec<ForecastPoint>> {
        let device = self.load_device(user_id, device_id).await?;
        debug!("🔮 [FORECAST] device {} for {hours_ahead}h", device.serial);

        let weather = self.weather.current().await?;
        self.classifier.forecast(&weather, hours_ahead).await
    }

    async fn load_device(&self, user_id: &str, device_id: i64) -> CoreResult<Device> {
        self.devices
            .get(user_id, device_id)
            .await?
            .ok_or_else(|| CoreError::not_found("device"))
    }
}
