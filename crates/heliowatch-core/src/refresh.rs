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

//! Cached device state and the staleness-gated refresh path
//!
//! Refresh is best-effort by contract: it never fails the enclosing
//! operation. A successful fetch replaces `latest_data` and marks the
//! device `active`; any failure keeps the previous reading (stale data
//! beats no data) and marks the device `error`.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use heliowatch_providers::{CLOUD_FALLBACK_URL, ProviderFetcher, looks_like_weather, normalize};
use heliowatch_types::{CanonicalReading, Device, DeviceStatus};

use crate::errors::CoreResult;
use crate::traits::DeviceStore;

/// Refresh failure reason when a device endpoint serves weather data.
pub const WEATHER_PAYLOAD_ERROR: &str = "API returned weather data instead of device data";

/// Staleness gate: decides whether a cached reading is fresh enough to
/// skip a refetch.
#[derive(Debug, Clone, Copy)]
pub struct RefreshPolicy {
    pub horizon: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            horizon: Duration::minutes(5),
        }
    }
}

impl RefreshPolicy {
    pub fn with_horizon(horizon: Duration) -> Self {
        Self { horizon }
    }

    /// True when no reading is cached or its age has reached the horizon.
    pub fn should_refresh(&self, last_fetched_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_fetched_at {
            None => true,
            Some(last) => now.signed_duration_since(last) >= self.horizon,
        }
    }
}

/// Outcome of a single device refresh attempt.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshOutcome {
    pub success: bool,
    /// The staleness gate decided the cached reading was fresh enough.
    pub skipped: bool,
    pub error: Option<String>,
}

impl RefreshOutcome {
    fn fresh() -> Self {
        Self {
            success: true,
            skipped: true,
            error: None,
        }
    }

    fn refreshed() -> Self {
        Self {
            success: true,
            skipped: false,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            skipped: false,
            error: Some(error),
        }
    }
}

/// Per-device entry of a batch refresh report.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceRefreshReport {
    pub device_id: i64,
    pub device_name: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Refreshes cached device state from the telemetry provider.
#[derive(Clone)]
pub struct DeviceRefresher {
    devices: Arc<dyn DeviceStore>,
    fetcher: ProviderFetcher,
    policy: RefreshPolicy,
    fallback_url: String,
}

impl DeviceRefresher {
    pub fn new(devices: Arc<dyn DeviceStore>, fetcher: ProviderFetcher) -> Self {
        Self {
            devices,
            fetcher,
            policy: RefreshPolicy::default(),
            fallback_url: CLOUD_FALLBACK_URL.to_owned(),
        }
    }

    pub fn with_policy(mut self, policy: RefreshPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_fallback_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = url.into();
        self
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    /// Unconditionally refresh a device and persist the updated row.
    pub async fn refresh(&self, device: &mut Device, now: DateTime<Utc>) -> RefreshOutcome {
        let outcome = match self.acquire_reading(device, now).await {
            Ok(reading) => {
                debug!(
                    "✅ [REFRESH] {} updated (ac_power={}W)",
                    device.serial, reading.ac_power_w
                );
                device.latest_data = Some(reading);
                device.status = DeviceStatus::Active;
                RefreshOutcome::refreshed()
            }
            Err(reason) => {
                warn!("⚠️ [REFRESH] {} failed: {reason}", device.serial);
                // stale data is preferred over no data
                device.status = DeviceStatus::Error;
                RefreshOutcome::failed(reason)
            }
        };

        device.updated_at = now;
        if let Err(e) = self.devices.update(device).await {
            warn!("⚠️ [REFRESH] failed to persist device {}: {e}", device.id);
        }

        outcome
    }

    /// Refresh only when the cached reading is older than the horizon.
    pub async fn refresh_if_stale(&self, device: &mut Device, now: DateTime<Utc>) -> RefreshOutcome {
        if !self.policy.should_refresh(device.last_fetched_at(), now) {
            debug!("⏳ [REFRESH] {} still fresh, skipping", device.serial);
            return RefreshOutcome::fresh();
        }
        self.refresh(device, now).await
    }

    /// Refresh every device a user owns, one independent task per device.
    ///
    /// Failures are isolated: a dead endpoint on one device leaves the
    /// others untouched, and the report carries one entry per device.
    pub async fn refresh_all(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<DeviceRefreshReport>> {
        let devices = self.devices.list(user_id).await?;
        if devices.is_empty() {
            return Ok(Vec::new());
        }

        let mut tasks: JoinSet<DeviceRefreshReport> = JoinSet::new();
        for mut device in devices {
            let refresher = self.clone();
            tasks.spawn(async move {
                let outcome = refresher.refresh(&mut device, now).await;
                DeviceRefreshReport {
                    device_id: device.id,
                    device_name: device.name,
                    success: outcome.success,
                    error: outcome.error,
                }
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => warn!("⚠️ [REFRESH] batch task panicked: {e}"),
            }
        }
        reports.sort_by_key(|report| report.device_id);
        Ok(reports)
    }

    /// Run the fetch ladder and normalize, with one vendor-cloud retry.
    async fn acquire_reading(
        &self,
        device: &Device,
        now: DateTime<Utc>,
    ) -> Result<CanonicalReading, String> {
        let primary = self.attempt(&device.api_url, device, now).await;
        let primary_err = match primary {
            Ok(reading) => return Ok(reading),
            Err(reason) => reason,
        };

        // The vendor cloud can answer by serial even when the configured
        // endpoint is unusable, but only with full credentials.
        if !device.serial.is_empty()
            && !device.token.is_empty()
            && device.api_url != self.fallback_url
        {
            debug!(
                "☁️ [REFRESH] {} primary endpoint unusable, trying vendor cloud",
                device.serial
            );
            match self.attempt(&self.fallback_url, device, now).await {
                Ok(reading) => return Ok(reading),
                Err(fallback_err) => {
                    debug!("☁️ [REFRESH] vendor cloud fallback failed: {fallback_err}");
                }
            }
        }

        Err(primary_err)
    }

    async fn attempt(
        &self,
        url: &str,
        device: &Device,
        now: DateTime<Utc>,
    ) -> Result<CanonicalReading, String> {
        let raw = self
            .fetcher
            .fetch(url, &device.token, &device.serial)
            .await
            .map_err(|e| e.to_string())?;

        if looks_like_weather(&raw) {
            return Err(WEATHER_PAYLOAD_ERROR.to_owned());
        }

        Ok(normalize(&raw, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        rfc3339.parse().unwrap()
    }

    #[test]
    fn missing_reading_forces_refresh() {
        let policy = RefreshPolicy::default();
        assert!(policy.should_refresh(None, at("2025-06-15T10:00:00Z")));
    }

    #[test]
    fn age_below_horizon_skips_refresh() {
        let policy = RefreshPolicy::default();
        // 4:59 old
        assert!(!policy.should_refresh(
            Some(at("2025-06-15T10:00:01Z")),
            at("2025-06-15T10:05:00Z")
        ));
    }

    #[test]
    fn age_at_horizon_triggers_refresh() {
        let policy = RefreshPolicy::default();
        // exactly 5:00 old
        assert!(policy.should_refresh(
            Some(at("2025-06-15T10:00:00Z")),
            at("2025-06-15T10:05:00Z")
        ));
    }

    #[test]
    fn future_reading_is_considered_fresh() {
        let policy = RefreshPolicy::default();
        assert!(!policy.should_refresh(
            Some(at("2025-06-15T10:10:00Z")),
            at("2025-06-15T10:00:00Z")
        ));
    }

    #[test]
    fn custom_horizon_is_honored() {
        let policy = RefreshPolicy::with_horizon(Duration::minutes(1));
        assert!(policy.should_refresh(
            Some(at("2025-06-15T10:00:00Z")),
            at("2025-06-15T10:01:00Z")
        ));
    }
}
