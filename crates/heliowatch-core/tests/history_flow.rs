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

//! Integration tests for history bucketing, dedup and backfill

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockito::{Matcher, Server};
use serde_json::json;

use heliowatch_core::{ClassifierClient, FaultStore, HistoryAggregator, MemoryStore};
use heliowatch_types::{
    Device, DeviceStatus, FaultRecord, Prediction, SolarSnapshot, WeatherSample,
};

fn device() -> Device {
    let now = Utc::now();
    Device {
        id: 1,
        user_id: "user-1".to_owned(),
        name: "Roof array".to_owned(),
        api_url: "https://example.com/api".to_owned(),
        serial: "SN-H".to_owned(),
        token: "tok".to_owned(),
        latest_data: None,
        status: DeviceStatus::Active,
        created_at: now,
        updated_at: now,
    }
}

fn record(rfc3339: &str, hour: u32, predicted: f64) -> FaultRecord {
    let timestamp: DateTime<Utc> = rfc3339.parse().unwrap();
    FaultRecord {
        id: 0,
        device_id: 1,
        user_id: "user-1".to_owned(),
        timestamp,
        weather: WeatherSample {
            month: 6,
            day: 15,
            hour,
            radiation: 300.0,
            air_pressure: 1010.0,
            air_temperature: 24.0,
            relative_air_humidity: 60.0,
            ..WeatherSample::default()
        },
        solar: SolarSnapshot::default(),
        prediction: Prediction {
            predicted_production_w: predicted,
            actual_production_w: 800.0,
            ..Prediction::default()
        },
    }
}

async fn seed(store: &MemoryStore, records: Vec<FaultRecord>) {
    for entry in records {
        store.append(entry).await.unwrap();
    }
}

#[tokio::test]
async fn same_bucket_keeps_the_latest_record() {
    let server = Server::new_async().await;
    let store = Arc::new(MemoryStore::new());
    seed(
        &store,
        vec![
            // both land in the [10:00, 10:05) bucket
            record("2025-06-15T10:02:10Z", 10, 500.0),
            record("2025-06-15T10:04:50Z", 10, 700.0),
            record("2025-06-15T10:06:00Z", 10, 800.0),
        ],
    )
    .await;

    let aggregator = HistoryAggregator::new(
        Arc::clone(&store) as Arc<dyn FaultStore>,
        ClassifierClient::new(server.url()).unwrap(),
    );
    let history = aggregator.day_history("user-1", &device(), None).await.unwrap();

    assert_eq!(history.len(), 2);
    // most-recent-first
    assert_eq!(history[0].timestamp.to_rfc3339(), "2025-06-15T10:06:00+00:00");
    assert_eq!(history[1].timestamp.to_rfc3339(), "2025-06-15T10:04:50+00:00");
    assert_eq!(history[1].prediction.predicted_production_w, 700.0);
}

#[tokio::test]
async fn night_records_are_filtered_out() {
    let server = Server::new_async().await;
    let store = Arc::new(MemoryStore::new());
    seed(
        &store,
        vec![
            record("2025-06-15T03:10:00Z", 3, 100.0),
            record("2025-06-15T10:10:00Z", 10, 900.0),
            record("2025-06-15T19:10:00Z", 19, 200.0),
        ],
    )
    .await;

    let aggregator = HistoryAggregator::new(
        Arc::clone(&store) as Arc<dyn FaultStore>,
        ClassifierClient::new(server.url()).unwrap(),
    );
    let history = aggregator.day_history("user-1", &device(), None).await.unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].weather.hour, 10);
}

#[tokio::test]
async fn backfill_failure_is_isolated_per_record() {
    let mut server = Server::new_async().await;
    // recompute for hour 10 fails, hour 11 succeeds
    let failing = server
        .mock("POST", "/predict")
        .match_body(Matcher::PartialJson(json!({ "Hour": 10 })))
        .with_status(500)
        .create_async()
        .await;
    let succeeding = server
        .mock("POST", "/predict")
        .match_body(Matcher::PartialJson(json!({ "Hour": 11 })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "success": true, "predictedSystemProduction": 1500.0 }).to_string())
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    seed(
        &store,
        vec![
            record("2025-06-15T10:02:00Z", 10, 0.0),
            record("2025-06-15T11:02:00Z", 11, 0.0),
            record("2025-06-15T12:02:00Z", 12, 900.0),
        ],
    )
    .await;

    let aggregator = HistoryAggregator::new(
        Arc::clone(&store) as Arc<dyn FaultStore>,
        ClassifierClient::new(server.url()).unwrap(),
    );
    let history = aggregator.day_history("user-1", &device(), None).await.unwrap();

    assert_eq!(history.len(), 3);
    let by_hour = |hour: u32| {
        history
            .iter()
            .find(|entry| entry.weather.hour == hour)
            .unwrap()
    };
    assert_eq!(by_hour(10).prediction.predicted_production_w, 0.0);
    assert_eq!(by_hour(11).prediction.predicted_production_w, 1500.0);
    assert_eq!(by_hour(12).prediction.predicted_production_w, 900.0);

    failing.assert_async().await;
    succeeding.assert_async().await;
}

#[tokio::test]
async fn backfill_does_not_mutate_stored_records() {
    let mut server = Server::new_async().await;
    let _predict = server
        .mock("POST", "/predict")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "success": true, "predictedSystemProduction": 1200.0 }).to_string())
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    seed(&store, vec![record("2025-06-15T10:02:00Z", 10, 0.0)]).await;

    let aggregator = HistoryAggregator::new(
        Arc::clone(&store) as Arc<dyn FaultStore>,
        ClassifierClient::new(server.url()).unwrap(),
    );
    let history = aggregator.day_history("user-1", &device(), None).await.unwrap();
    assert_eq!(history[0].prediction.predicted_production_w, 1200.0);

    // the store still holds the original record
    let stored = store.latest("user-1", 1).await.unwrap().unwrap();
    assert_eq!(stored.prediction.predicted_production_w, 0.0);
}

#[tokio::test]
async fn date_filter_restricts_the_day() {
    let server = Server::new_async().await;
    let store = Arc::new(MemoryStore::new());
    seed(
        &store,
        vec![
            record("2025-06-14T10:02:00Z", 10, 500.0),
            record("2025-06-15T10:02:00Z", 10, 600.0),
        ],
    )
    .await;

    let aggregator = HistoryAggregator::new(
        Arc::clone(&store) as Arc<dyn FaultStore>,
        ClassifierClient::new(server.url()).unwrap(),
    );
    let day = "2025-06-14".parse().unwrap();
    let history = aggregator
        .day_history("user-1", &device(), Some(day))
        .await
        .unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].prediction.predicted_production_w, 500.0);
}

#[tokio::test]
async fn empty_day_yields_empty_list() {
    let server = Server::new_async().await;
    let store = Arc::new(MemoryStore::new());

    let aggregator = HistoryAggregator::new(
        Arc::clone(&store) as Arc<dyn FaultStore>,
        ClassifierClient::new(server.url()).unwrap(),
    );
    let history = aggregator.day_history("user-1", &device(), None).await.unwrap();
    assert!(history.is_empty());
}
