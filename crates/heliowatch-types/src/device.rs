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

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::reading::CanonicalReading;

/// Health status of a registered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    /// Last refresh attempt succeeded.
    #[default]
    Active,
    /// Device exists but has been disabled by its owner.
    Inactive,
    /// Last refresh attempt failed; `latest_data` keeps the last good reading.
    Error,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Error => "error",
        }
    }

    /// List all statuses
    pub fn all() -> &'static [DeviceStatus] {
        &[Self::Active, Self::Inactive, Self::Error]
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "error" => Ok(Self::Error),
            _ => Err(anyhow::anyhow!(
                "Unknown device status: '{}'. Supported values: {}",
                s,
                Self::all()
                    .iter()
                    .map(DeviceStatus::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}

/// A registered inverter installation.
///
/// `serial` is the provider-facing identity and is unique system-wide;
/// `id` is the store-assigned opaque identifier used by the API surface.
/// `latest_data` and `status` are the cached device state: they are
/// rewritten on every refresh attempt, and a failed refresh degrades
/// `status` without discarding the previous reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    /// Endpoint queried for realtime telemetry.
    pub api_url: String,
    /// Provider identity string (wifi module serial for vendor clouds).
    pub serial: String,
    /// Opaque credential forwarded to the provider as a header.
    pub token: String,
    pub latest_data: Option<CanonicalReading>,
    pub status: DeviceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// Timestamp of the last successful telemetry fetch, if any.
    pub fn last_fetched_at(&self) -> Option<DateTime<Utc>> {
        self.latest_data.as_ref().map(|data| data.fetched_at)
    }
}
