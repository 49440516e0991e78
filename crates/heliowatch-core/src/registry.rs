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

//! Device registration

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use heliowatch_types::{Device, DeviceStatus};

use crate::errors::{CoreError, CoreResult};
use crate::refresh::DeviceRefresher;
use crate::traits::DeviceStore;

/// Registration request, validated before any network call.
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub user_id: String,
    pub name: String,
    pub api_url: String,
    pub serial: String,
    pub token: String,
}

/// A registered device plus an optional warning about the initial probe.
#[derive(Debug, Clone)]
pub struct RegistrationResult {
    pub device: Device,
    /// Set when the initial connectivity probe failed. The device is
    /// still registered (partial success), just in `error` status.
    pub warning: Option<String>,
}

/// Creates devices and runs the initial connectivity probe.
#[derive(Clone)]
pub struct DeviceRegistry {
    devices: Arc<dyn DeviceStore>,
    refresher: DeviceRefresher,
}

impl DeviceRegistry {
    pub fn new(devices: Arc<dyn DeviceStore>, refresher: DeviceRefresher) -> Self {
        Self { devices, refresher }
    }

    /// Register a device for a user.
    ///
    /// Validation failures and duplicate serials are terminal; a failed
    /// initial fetch is not — the device is stored with whatever status
    /// the probe produced and the failure is reported as a warning.
    pub async fn register(&self, new: NewDevice) -> CoreResult<RegistrationResult> {
        validate(&new)?;

        if self.devices.find_by_serial(&new.serial).await?.is_some() {
            return Err(CoreError::validation(format!(
                "device with serial '{}' already exists",
                new.serial
            )));
        }

        let now = Utc::now();
        let device = Device {
            id: 0,
            user_id: new.user_id,
            name: new.name,
            api_url: new.api_url,
            serial: new.serial,
            token: new.token,
            latest_data: None,
            status: DeviceStatus::Active,
            created_at: now,
            updated_at: now,
        };

        let mut device = self.devices.insert(device).await?;
        info!("📟 [REGISTRY] registered device {} ({})", device.id, device.serial);

        // Initial probe; also seeds latest_data when the endpoint answers.
        let outcome = self.refresher.refresh(&mut device, now).await;
        let warning = outcome
            .error
            .map(|reason| format!("device registered but initial fetch failed: {reason}"));

        Ok(RegistrationResult { device, warning })
    }
}

fn validate(new: &NewDevice) -> CoreResult<()> {
    let missing: Vec<&str> = [
        ("name", new.name.trim()),
        ("api_url", new.api_url.trim()),
        ("serial", new.serial.trim()),
        ("token", new.token.trim()),
    ]
    .iter()
    .filter(|(_, value)| value.is_empty())
    .map(|(field, _)| *field)
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(CoreError::validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )))
    }
}
