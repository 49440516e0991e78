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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Normalized, provider-agnostic telemetry snapshot for one device.
///
/// Produced by the schema normalizer from whatever shape the provider
/// returned. Numeric fields are always finite: absent or malformed
/// values are coerced to 0.0 before this struct is built, so consumers
/// never see NaN or missing power data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalReading {
    #[serde(default)]
    pub inverter_sn: String,
    #[serde(default)]
    pub inverter_type: String,
    #[serde(default)]
    pub inverter_status: String,
    /// Provider-supplied upload timestamp, kept as an opaque string.
    #[serde(default)]
    pub upload_time: String,

    #[serde(default)]
    pub ac_power_w: f64,
    #[serde(default)]
    pub yield_today_kwh: f64,
    #[serde(default)]
    pub yield_total_kwh: f64,
    #[serde(default)]
    pub feed_in_power_w: f64,
    #[serde(default)]
    pub feed_in_energy_kwh: f64,
    #[serde(default)]
    pub consume_energy_kwh: f64,

    #[serde(default)]
    pub soc_percent: f64,
    #[serde(default)]
    pub battery_power_w: f64,

    #[serde(default)]
    pub power_dc1_w: f64,
    #[serde(default)]
    pub power_dc2_w: f64,
    #[serde(default)]
    pub power_dc3_w: f64,
    #[serde(default)]
    pub power_dc4_w: f64,

    /// When HelioWatch retrieved this reading (not the provider upload time).
    #[serde(default)]
    pub fetched_at: DateTime<Utc>,

    /// Unrecognized provider fields, preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
