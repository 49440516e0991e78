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

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use rusqlite::{Row, params};
use std::path::Path;
use std::sync::Mutex;

use heliowatch_core::{CoreError, CoreResult, DeviceStore, FaultStore};
use heliowatch_types::{Device, FaultRecord};

/// SQLite-backed implementation of the device and fault-history stores.
///
/// Weather, solar and prediction sub-objects are stored as JSON columns;
/// a few prediction fields are extracted into plain columns for
/// dashboard-style filtering without JSON parsing.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let conn = rusqlite::Connection::open(path)
            .with_context(|| format!("Failed to open database: {path}"))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS devices (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id        TEXT NOT NULL,
                name           TEXT NOT NULL,
                api_url        TEXT NOT NULL,
                serial         TEXT NOT NULL UNIQUE,
                token          TEXT NOT NULL,
                status         TEXT NOT NULL DEFAULT 'active',
                latest_data    TEXT,
                created_at     TEXT NOT NULL,
                updated_at     TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_devices_user ON devices(user_id);

            CREATE TABLE IF NOT EXISTS fault_history (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id               INTEGER NOT NULL,
                user_id                 TEXT NOT NULL,
                timestamp               TEXT NOT NULL,
                weather_json            TEXT NOT NULL,
                solar_json              TEXT NOT NULL,
                prediction_json         TEXT NOT NULL,
                fault_detected          BOOLEAN,
                fault_severity          TEXT,
                predicted_production_w  REAL,
                actual_production_w     REAL,
                FOREIGN KEY (device_id) REFERENCES devices(id)
            );

            CREATE INDEX IF NOT EXISTS idx_fault_history_device_time
                ON fault_history(device_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_fault_history_user_time
                ON fault_history(user_id, timestamp);",
        )
        .context("Failed to initialize database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Liveness probe for the health endpoint.
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .context("Database ping failed")?;
        Ok(())
    }
}

fn storage(err: impl Into<anyhow::Error>) -> CoreError {
    CoreError::Storage(err.into())
}

fn row_to_device(row: &Row<'_>) -> rusqlite::Result<Device> {
    let status: String = row.get(6)?;
    let latest: Option<String> = row.get(7)?;
    Ok(Device {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        api_url: row.get(3)?,
        serial: row.get(4)?,
        token: row.get(5)?,
        status: status.parse().unwrap_or_default(),
        latest_data: latest.as_deref().and_then(|json| serde_json::from_str(json).ok()),
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

const DEVICE_COLUMNS: &str =
    "id, user_id, name, api_url, serial, token, status, latest_data, created_at, updated_at";

fn row_to_fault_record(row: &Row<'_>) -> rusqlite::Result<FaultRecord> {
    let weather: String = row.get(4)?;
    let solar: String = row.get(5)?;
    let prediction: String = row.get(6)?;
    Ok(FaultRecord {
        id: row.get(0)?,
        device_id: row.get(1)?,
        user_id: row.get(2)?,
        timestamp: row.get(3)?,
        weather: serde_json::from_str(&weather).unwrap_or_default(),
        solar: serde_json::from_str(&solar).unwrap_or_default(),
        prediction: serde_json::from_str(&prediction).unwrap_or_default(),
    })
}

const FAULT_COLUMNS: &str =
    "id, device_id, user_id, timestamp, weather_json, solar_json, prediction_json";

#[async_trait]
impl DeviceStore for SqliteStore {
    async fn insert(&self, mut device: Device) -> CoreResult<Device> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let latest_json = device
            .latest_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(storage)?;

        conn.execute(
            "INSERT INTO devices (user_id, name, api_url, serial, token, status, latest_data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                device.user_id,
                device.name,
                device.api_url,
                device.serial,
                device.token,
                device.status.as_str(),
                latest_json,
                device.created_at,
                device.updated_at,
            ],
        )
        .map_err(storage)?;

        device.id = conn.last_insert_rowid();
        Ok(device)
    }

    async fn get(&self, user_id: &str, device_id: i64) -> CoreResult<Option<Device>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE id = ?1 AND user_id = ?2");
        let device = conn
            .query_row(&sql, params![device_id, user_id], row_to_device)
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(storage(other)),
            })?;
        Ok(device)
    }

    async fn find_by_serial(&self, serial: &str) -> CoreResult<Option<Device>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE serial = ?1");
        let device = conn
            .query_row(&sql, params![serial], row_to_device)
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(storage(other)),
            })?;
        Ok(device)
    }

    async fn list(&self, user_id: &str) -> CoreResult<Vec<Device>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let sql = format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE user_id = ?1 ORDER BY created_at DESC"
        );
        let mut stmt = conn.prepare(&sql).map_err(storage)?;
        let devices = stmt
            .query_map(params![user_id], row_to_device)
            .map_err(storage)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage)?;
        Ok(devices)
    }

    async fn update(&self, device: &Device) -> CoreResult<()> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let latest_json = device
            .latest_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(storage)?;

        conn.execute(
            "UPDATE devices
             SET name = ?1, api_url = ?2, token = ?3, status = ?4, latest_data = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                device.name,
                device.api_url,
                device.token,
                device.status.as_str(),
                latest_json,
                device.updated_at,
                device.id,
            ],
        )
        .map_err(storage)?;
        Ok(())
    }

    async fn delete(&self, user_id: &str, device_id: i64) -> CoreResult<bool> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let deleted = conn
            .execute(
                "DELETE FROM devices WHERE id = ?1 AND user_id = ?2",
                params![device_id, user_id],
            )
            .map_err(storage)?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl FaultStore for SqliteStore {
    async fn append(&self, mut record: FaultRecord) -> CoreResult<FaultRecord> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let weather_json = serde_json::to_string(&record.weather).map_err(storage)?;
        let solar_json = serde_json::to_string(&record.solar).map_err(storage)?;
        let prediction_json = serde_json::to_string(&record.prediction).map_err(storage)?;

        conn.execute(
            "INSERT INTO fault_history (device_id, user_id, timestamp, weather_json, solar_json, prediction_json, fault_detected, fault_severity, predicted_production_w, actual_production_w)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.device_id,
                record.user_id,
                record.timestamp,
                weather_json,
                solar_json,
                prediction_json,
                record.prediction.fault_detected,
                record.prediction.fault_severity.as_str(),
                record.prediction.predicted_production_w,
                record.prediction.actual_production_w,
            ],
        )
        .map_err(storage)?;

        record.id = conn.last_insert_rowid();
        Ok(record)
    }

    async fn for_day(
        &self,
        user_id: &str,
        device_id: i64,
        date: Option<NaiveDate>,
        limit: usize,
    ) -> CoreResult<Vec<FaultRecord>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let records = if let Some(day) = date {
            let start = day.and_hms_opt(0, 0, 0).expect("midnight is valid").and_utc();
            let end = start + Duration::days(1);
            let sql = format!(
                "SELECT {FAULT_COLUMNS} FROM fault_history
                 WHERE device_id = ?1 AND user_id = ?2 AND timestamp >= ?3 AND timestamp < ?4
                 ORDER BY timestamp ASC LIMIT ?5"
            );
            let mut stmt = conn.prepare(&sql).map_err(storage)?;
            stmt.query_map(
                params![device_id, user_id, start, end, limit],
                row_to_fault_record,
            )
            .map_err(storage)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage)?
        } else {
            let sql = format!(
                "SELECT {FAULT_COLUMNS} FROM fault_history
                 WHERE device_id = ?1 AND user_id = ?2
                 ORDER BY timestamp ASC LIMIT ?3"
            );
            let mut stmt = conn.prepare(&sql).map_err(storage)?;
            stmt.query_map(params![device_id, user_id, limit], row_to_fault_record)
                .map_err(storage)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(storage)?
        };

        Ok(records)
    }

    async fn latest(&self, user_id: &str, device_id: i64) -> CoreResult<Option<FaultRecord>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let sql = format!(
            "SELECT {FAULT_COLUMNS} FROM fault_history
             WHERE device_id = ?1 AND user_id = ?2
             ORDER BY timestamp DESC LIMIT 1"
        );
        let record = conn
            .query_row(&sql, params![device_id, user_id], row_to_fault_record)
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(storage(other)),
            })?;
        Ok(record)
    }
}
