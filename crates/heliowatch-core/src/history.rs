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

//! Day-history aggregation: daylight filter, 5-minute dedup, backfill
//!
//! Raw detection records are irregularly spaced (scheduled runs plus
//! manual re-detections). Queries collapse them into a regular series by
//! truncating each timestamp to its 5-minute bucket and keeping the last
//! record per bucket — latest wins, a deliberate policy rather than an
//! accident of iteration order. Records are bucketed in ascending
//! timestamp order so "latest" is well-defined.
//!
//! Backfill recomputes the predicted-production field for records that
//! lack it, as a read-time view only; stored records are never mutated.

use chrono::{Local, NaiveDate, Timelike};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use heliowatch_types::{Device, FaultRecord, WeatherSample};

use crate::classifier::ClassifierClient;
use crate::detection::DAYLIGHT_HOURS;
use crate::errors::CoreResult;
use crate::traits::FaultStore;
use crate::weather::map_weather;

/// One day at 5-minute resolution.
const MAX_DAY_ENTRIES: usize = 288;

/// Hard cap on raw rows examined per query.
const RAW_ROW_CAP: usize = 2000;

/// Bucket width in seconds.
const BUCKET_SECS: i64 = 300;

/// Upper bound on concurrent backfill calls against the classifier.
const BACKFILL_CONCURRENCY: usize = 8;

/// Answers day-history queries over the fault store.
#[derive(Clone)]
pub struct HistoryAggregator {
    history: Arc<dyn FaultStore>,
    classifier: ClassifierClient,
}

impl HistoryAggregator {
    pub fn new(history: Arc<dyn FaultStore>, classifier: ClassifierClient) -> Self {
        Self { history, classifier }
    }

    /// History for one device and day, most-recent-first, capped at 288
    /// entries. An empty day yields an empty list, not an error.
    pub async fn day_history(
        &self,
        user_id: &str,
        device: &Device,
        date: Option<NaiveDate>,
    ) -> CoreResult<Vec<FaultRecord>> {
        let raw = self
            .history
            .for_day(user_id, device.id, date, RAW_ROW_CAP)
            .await?;
        let raw_count = raw.len();

        // Ascending insertion means later records overwrite earlier ones
        // within the same bucket.
        let mut buckets: BTreeMap<i64, FaultRecord> = BTreeMap::new();
        for record in raw {
            if !DAYLIGHT_HOURS.contains(&record_hour(&record)) {
                continue;
            }
            buckets.insert(record.timestamp.timestamp().div_euclid(BUCKET_SECS), record);
        }

        let mut records: Vec<FaultRecord> = buckets.into_values().collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(MAX_DAY_ENTRIES);

        debug!(
            "📊 [HISTORY] device {}: {} raw rows -> {} bucketed entries",
            device.id,
            raw_count,
            records.len()
        );

        self.backfill_predictions(&mut records).await;
        Ok(records)
    }

    /// Recompute missing predicted-production values via the classifier's
    /// prediction-only endpoint. Best effort per record: a failed call
    /// leaves that record unchanged and never fails the query.
    async fn backfill_predictions(&self, records: &mut [FaultRecord]) {
        let semaphore = Arc::new(Semaphore::new(BACKFILL_CONCURRENCY));
        let mut tasks: JoinSet<Option<(usize, f64)>> = JoinSet::new();

        for (index, record) in records.iter().enumerate() {
            if record.prediction.predicted_production_w > 0.0 {
                continue;
            }

            let classifier = self.classifier.clone();
            let weather = backfill_weather(record);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                match classifier.predict(&weather).await {
                    Ok(predicted) => Some((index, predicted)),
                    Err(e) => {
                        debug!("⚠️ [HISTORY] backfill recompute failed: {e}");
                        None
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some((index, predicted))) => {
                    records[index].prediction.predicted_production_w = predicted;
                }
                Ok(None) => {}
                Err(e) => warn!("⚠️ [HISTORY] backfill task panicked: {e}"),
            }
        }
    }
}

/// Daylight-filter hour for a record: its own weather hour, or the write
/// time for rows that predate weather embedding.
fn record_hour(record: &FaultRecord) -> u32 {
    if record.weather.month == 0 {
        record.timestamp.hour()
    } else {
        record.weather.hour
    }
}

/// Weather features used to recompute a record's prediction. Rows
/// without embedded weather get clock-derived defaults from their own
/// timestamp.
fn backfill_weather(record: &FaultRecord) -> WeatherSample {
    if record.weather.month == 0 {
        map_weather(&Value::Null, record.timestamp.with_timezone(&Local))
    } else {
        record.weather.clone()
    }
}
