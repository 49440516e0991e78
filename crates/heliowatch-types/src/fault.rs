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
use std::fmt;

use crate::reading::CanonicalReading;
use crate::weather::WeatherSample;

/// Fault category reported by the classifier.
///
/// Wire form is snake_case (`low_production`, ...) to match the
/// classifier service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FaultType {
    #[default]
    None,
    LowProduction,
    Overheating,
    LowRadiation,
    Other,
}

impl FaultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::LowProduction => "low_production",
            Self::Overheating => "overheating",
            Self::LowRadiation => "low_radiation",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity grade attached to a detected fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FaultSeverity {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl FaultSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for FaultSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classifier verdict for one detection run.
///
/// The default value is the synthetic zero-fault result used when the
/// daylight gate suppresses classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub predicted_production_w: f64,
    #[serde(default)]
    pub actual_production_w: f64,
    #[serde(default)]
    pub fault_detected: bool,
    #[serde(default)]
    pub fault_type: FaultType,
    #[serde(default)]
    pub fault_severity: FaultSeverity,
    /// Percentage difference between actual and predicted production.
    #[serde(default)]
    pub deviation_percent: f64,
}

/// Solar-side summary embedded into a fault record, taken from the
/// device's cached reading at detection time (zero/empty fallbacks).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolarSnapshot {
    #[serde(default)]
    pub ac_power_w: f64,
    #[serde(default)]
    pub yield_today_kwh: f64,
    #[serde(default)]
    pub yield_total_kwh: f64,
    #[serde(default)]
    pub consume_energy_kwh: f64,
    #[serde(default)]
    pub inverter_sn: String,
    #[serde(default)]
    pub inverter_type: String,
    #[serde(default)]
    pub inverter_status: String,
    #[serde(default)]
    pub battery_power_w: f64,
    #[serde(default)]
    pub soc_percent: f64,
}

impl SolarSnapshot {
    /// Build a snapshot from a cached reading; `None` yields all-zero data.
    pub fn from_reading(reading: Option<&CanonicalReading>) -> Self {
        reading.map_or_else(Self::default, |data| Self {
            ac_power_w: data.ac_power_w,
            yield_today_kwh: data.yield_today_kwh,
            yield_total_kwh: data.yield_total_kwh,
            consume_energy_kwh: data.consume_energy_kwh,
            inverter_sn: data.inverter_sn.clone(),
            inverter_type: data.inverter_type.clone(),
            inverter_status: data.inverter_status.clone(),
            battery_power_w: data.battery_power_w,
            soc_percent: data.soc_percent,
        })
    }
}

/// Immutable history entry, appended once per persisted detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultRecord {
    /// Store-assigned identifier (0 until appended).
    pub id: i64,
    pub device_id: i64,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub weather: WeatherSample,
    pub solar: SolarSnapshot,
    pub prediction: Prediction,
}

/// Condensed view of the most recent fault record for a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestFaultStatus {
    pub timestamp: DateTime<Utc>,
    pub fault_detected: bool,
    pub fault_type: FaultType,
    pub fault_severity: FaultSeverity,
    pub predicted_production_w: f64,
    pub actual_production_w: f64,
    pub deviation_percent: f64,
}

impl From<FaultRecord> for LatestFaultStatus {
    fn from(record: FaultRecord) -> Self {
        Self {
            timestamp: record.timestamp,
            fault_detected: record.prediction.fault_detected,
            fault_type: record.prediction.fault_type,
            fault_severity: record.prediction.fault_severity,
            predicted_production_w: record.prediction.predicted_production_w,
            actual_production_w: record.prediction.actual_production_w,
            deviation_percent: record.prediction.deviation_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_type_wire_form_is_snake_case() {
        let json = serde_json::to_string(&FaultType::LowProduction).unwrap();
        assert_eq!(json, "\"low_production\"");
        let parsed: FaultType = serde_json::from_str("\"low_radiation\"").unwrap();
        assert_eq!(parsed, FaultType::LowRadiation);
    }

    #[test]
    fn default_prediction_is_zero_fault() {
        let prediction = Prediction::default();
        assert!(!prediction.fault_detected);
        assert_eq!(prediction.fault_type, FaultType::None);
        assert_eq!(prediction.fault_severity, FaultSeverity::None);
        assert_eq!(prediction.predicted_production_w, 0.0);
    }

    #[test]
    fn snapshot_from_missing_reading_is_zeroed() {
        let snapshot = SolarSnapshot::from_reading(None);
        assert_eq!(snapshot.ac_power_w, 0.0);
        assert!(snapshot.inverter_sn.is_empty());
    }
}
