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

use serde_json::Value;

/// Keys that mark a payload as coming from the weather feed rather than
/// an inverter.
const WEATHER_MARKERS: &[&str] = &["month", "day", "hour", "airTemperature", "windSpeed"];

/// Heuristic check for weather-shaped payloads.
///
/// Used to catch devices whose configured endpoint is accidentally a
/// weather feed, and to judge whether a cloud fallback response is
/// usable. This is not a schema validator: a device payload that happens
/// to carry an `hour` field will be misclassified, and callers treat the
/// result as a misconfiguration signal rather than a hard error.
pub fn looks_like_weather(payload: &Value) -> bool {
    payload.as_object().is_some_and(|obj| {
        WEATHER_MARKERS
            .iter()
            .any(|key| obj.get(*key).is_some_and(|value| !value.is_null()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn weather_payload_is_recognized() {
        let payload = json!({
            "hour": 13,
            "windSpeed": 4.2,
            "airTemperature": 21.5,
            "radiation": 310.0
        });
        assert!(looks_like_weather(&payload));
    }

    #[test]
    fn single_marker_is_enough() {
        assert!(looks_like_weather(&json!({ "month": 6 })));
    }

    #[test]
    fn device_payload_is_not_weather() {
        let payload = json!({
            "acpower": 1530.0,
            "yieldtoday": 8.4,
            "inverterSN": "SX123456"
        });
        assert!(!looks_like_weather(&payload));
    }

    #[test]
    fn null_markers_do_not_count() {
        assert!(!looks_like_weather(&json!({ "hour": null, "day": null })));
    }

    #[test]
    fn non_objects_are_never_weather() {
        assert!(!looks_like_weather(&json!([1, 2, 3])));
        assert!(!looks_like_weather(&json!("hour")));
        assert!(!looks_like_weather(&Value::Null));
    }
}
