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

//! Schema normalization for heterogeneous inverter payloads
//!
//! Provider APIs are not consistent across regions and firmware
//! versions (lowercase vs camelCase vs snake_case keys). Normalization
//! is an ordered key-preference lookup per canonical field; the first
//! present, non-null spelling wins. The canonical name leads every list
//! so an already-normalized payload maps onto itself.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use heliowatch_types::CanonicalReading;

const INVERTER_SN_KEYS: &[&str] = &["inverter_sn", "inverterSN", "inverterSn", "sn"];
const INVERTER_TYPE_KEYS: &[&str] = &["inverter_type", "inverterType"];
const INVERTER_STATUS_KEYS: &[&str] = &["inverter_status", "inverterStatus", "status"];
const UPLOAD_TIME_KEYS: &[&str] = &[
    "upload_time",
    "uploadTime",
    "utcDateTime",
    "utc_date_time",
];

const AC_POWER_KEYS: &[&str] = &["ac_power_w", "acpower", "acPower", "ac_power"];
const YIELD_TODAY_KEYS: &[&str] = &["yield_today_kwh", "yieldtoday", "yieldToday", "yield_today"];
const YIELD_TOTAL_KEYS: &[&str] = &["yield_total_kwh", "yieldtotal", "yieldTotal", "yield_total"];
const FEED_IN_POWER_KEYS: &[&str] = &[
    "feed_in_power_w",
    "feedinpower",
    "feedInPower",
    "feedin_power",
];
const FEED_IN_ENERGY_KEYS: &[&str] = &[
    "feed_in_energy_kwh",
    "feedinenergy",
    "feedInEnergy",
    "feedin_energy",
];
const CONSUME_ENERGY_KEYS: &[&str] = &[
    "consume_energy_kwh",
    "consumeenergy",
    "consumeEnergy",
    "consume_energy",
];

const SOC_KEYS: &[&str] = &["soc_percent", "soc", "SOC"];
const BATTERY_POWER_KEYS: &[&str] = &["battery_power_w", "batPower", "bat_power", "batteryPower"];

const POWER_DC1_KEYS: &[&str] = &["power_dc1_w", "powerdc1", "powerDc1", "power_dc1"];
const POWER_DC2_KEYS: &[&str] = &["power_dc2_w", "powerdc2", "powerDc2", "power_dc2"];
const POWER_DC3_KEYS: &[&str] = &["power_dc3_w", "powerdc3", "powerDc3", "power_dc3"];
const POWER_DC4_KEYS: &[&str] = &["power_dc4_w", "powerdc4", "powerDc4", "power_dc4"];

/// Every candidate list, used to decide which source keys were consumed.
const FIELD_KEYS: &[&[&str]] = &[
    INVERTER_SN_KEYS,
    INVERTER_TYPE_KEYS,
    INVERTER_STATUS_KEYS,
    UPLOAD_TIME_KEYS,
    AC_POWER_KEYS,
    YIELD_TODAY_KEYS,
    YIELD_TOTAL_KEYS,
    FEED_IN_POWER_KEYS,
    FEED_IN_ENERGY_KEYS,
    CONSUME_ENERGY_KEYS,
    SOC_KEYS,
    BATTERY_POWER_KEYS,
    POWER_DC1_KEYS,
    POWER_DC2_KEYS,
    POWER_DC3_KEYS,
    POWER_DC4_KEYS,
];

/// Coerce an arbitrary JSON value to a finite number.
///
/// Accepts numbers and numeric strings; anything else (including NaN
/// and infinities) yields the fallback.
pub fn to_number(value: &Value, fallback: f64) -> f64 {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    };

    match parsed {
        Some(number) if number.is_finite() => number,
        Some(_) | None => fallback,
    }
}

fn pick<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

fn pick_number(obj: &Map<String, Value>, keys: &[&str]) -> f64 {
    pick(obj, keys).map_or(0.0, |value| to_number(value, 0.0))
}

fn pick_string(obj: &Map<String, Value>, keys: &[&str]) -> String {
    pick(obj, keys).map_or_else(String::new, |value| match value {
        Value::String(text) => text.clone(),
        Value::Number(_) | Value::Bool(_) => value.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    })
}

fn is_consumed(key: &str) -> bool {
    key == "fetched_at" || FIELD_KEYS.iter().any(|keys| keys.contains(&key))
}

/// Map an arbitrary provider payload onto the canonical reading shape.
///
/// Total function: a non-object or empty payload produces an all-zero
/// reading. Unconsumed source fields are carried along in `extra`, with
/// normalized keys taking precedence on re-serialization.
pub fn normalize(raw: &Value, fetched_at: DateTime<Utc>) -> CanonicalReading {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);

    let mut reading = CanonicalReading {
        inverter_sn: pick_string(obj, INVERTER_SN_KEYS),
        inverter_type: pick_string(obj, INVERTER_TYPE_KEYS),
        inverter_status: pick_string(obj, INVERTER_STATUS_KEYS),
        upload_time: pick_string(obj, UPLOAD_TIME_KEYS),

        ac_power_w: pick_number(obj, AC_POWER_KEYS),
        yield_today_kwh: pick_number(obj, YIELD_TODAY_KEYS),
        yield_total_kwh: pick_number(obj, YIELD_TOTAL_KEYS),
        feed_in_power_w: pick_number(obj, FEED_IN_POWER_KEYS),
        feed_in_energy_kwh: pick_number(obj, FEED_IN_ENERGY_KEYS),
        consume_energy_kwh: pick_number(obj, CONSUME_ENERGY_KEYS),

        soc_percent: pick_number(obj, SOC_KEYS),
        battery_power_w: pick_number(obj, BATTERY_POWER_KEYS),

        power_dc1_w: pick_number(obj, POWER_DC1_KEYS),
        power_dc2_w: pick_number(obj, POWER_DC2_KEYS),
        power_dc3_w: pick_number(obj, POWER_DC3_KEYS),
        power_dc4_w: pick_number(obj, POWER_DC4_KEYS),

        fetched_at,
        extra: Map::new(),
    };

    for (key, value) in obj {
        if !is_consumed(key) {
            reading.extra.insert(key.clone(), value.clone());
        }
    }

    reading
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        "2025-06-15T10:30:00Z".parse().unwrap()
    }

    #[test]
    fn lowercase_vendor_payload_is_normalized() {
        let raw = json!({
            "inverterSN": "SX991",
            "acpower": 2450.5,
            "yieldtoday": 11.2,
            "yieldtotal": 8321.0,
            "feedinpower": 120.0,
            "soc": 78,
            "batPower": -300.0,
            "powerdc1": 1300.0,
            "powerdc2": 1150.5,
            "uploadTime": "2025-06-15 10:29:41"
        });

        let reading = normalize(&raw, now());
        assert_eq!(reading.inverter_sn, "SX991");
        assert_eq!(reading.ac_power_w, 2450.5);
        assert_eq!(reading.yield_today_kwh, 11.2);
        assert_eq!(reading.soc_percent, 78.0);
        assert_eq!(reading.battery_power_w, -300.0);
        assert_eq!(reading.power_dc2_w, 1150.5);
        assert_eq!(reading.upload_time, "2025-06-15 10:29:41");
        assert_eq!(reading.fetched_at, now());
    }

    #[test]
    fn snake_case_spellings_are_accepted() {
        let raw = json!({
            "inverter_sn": "SX992",
            "ac_power": "1875.25",
            "yield_today": 4.5,
            "feedin_power": 0,
            "power_dc1": 940
        });

        let reading = normalize(&raw, now());
        assert_eq!(reading.inverter_sn, "SX992");
        assert_eq!(reading.ac_power_w, 1875.25);
        assert_eq!(reading.power_dc1_w, 940.0);
    }

    #[test]
    fn first_present_key_wins() {
        let raw = json!({
            "acpower": 500.0,
            "acPower": 900.0
        });
        assert_eq!(normalize(&raw, now()).ac_power_w, 500.0);
    }

    #[test]
    fn null_keys_are_skipped_in_preference_order() {
        let raw = json!({
            "acpower": null,
            "acPower": 900.0
        });
        assert_eq!(normalize(&raw, now()).ac_power_w, 900.0);
    }

    #[test]
    fn malformed_numbers_become_zero() {
        let raw = json!({
            "acpower": "not-a-number",
            "yieldtoday": {},
            "soc": [1, 2]
        });

        let reading = normalize(&raw, now());
        assert_eq!(reading.ac_power_w, 0.0);
        assert_eq!(reading.yield_today_kwh, 0.0);
        assert_eq!(reading.soc_percent, 0.0);
    }

    #[test]
    fn missing_payload_yields_zeroed_reading() {
        let reading = normalize(&Value::Null, now());
        assert_eq!(reading.ac_power_w, 0.0);
        assert!(reading.inverter_sn.is_empty());
        assert!(reading.extra.is_empty());
    }

    #[test]
    fn unknown_fields_are_preserved() {
        let raw = json!({
            "acpower": 100.0,
            "batStatus": "idle",
            "gridFrequency": 50.02
        });

        let reading = normalize(&raw, now());
        assert_eq!(reading.extra.get("batStatus"), Some(&json!("idle")));
        assert_eq!(reading.extra.get("gridFrequency"), Some(&json!(50.02)));
        // consumed spellings must not leak into extras
        assert!(!reading.extra.contains_key("acpower"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let raw = json!({
            "inverterSn": "SX100",
            "acPower": 321.5,
            "yieldToday": "2.75",
            "soc": 44,
            "batStatus": "charging"
        });

        let once = normalize(&raw, now());
        let twice = normalize(&serde_json::to_value(&once).unwrap(), now());
        assert_eq!(once, twice);
    }

    #[test]
    fn to_number_handles_edge_inputs() {
        assert_eq!(to_number(&json!(12.5), 0.0), 12.5);
        assert_eq!(to_number(&json!("  7.25 "), 0.0), 7.25);
        assert_eq!(to_number(&json!("NaN"), 3.0), 3.0);
        assert_eq!(to_number(&json!(null), 9.0), 9.0);
        assert_eq!(to_number(&json!(true), 1.5), 1.5);
    }
}
