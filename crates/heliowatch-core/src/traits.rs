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

//! Store traits decoupling orchestration from the persistence engine

use async_trait::async_trait;
use chrono::NaiveDate;

use heliowatch_types::{Device, FaultRecord};

use crate::errors::CoreResult;

/// Persistent registry of devices and their cached state.
///
/// A refresh is a read-modify-write against a single device row;
/// last-writer-wins is the intended semantics, so no cross-device
/// locking is required of implementations.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Insert a new device and return it with its assigned id.
    async fn insert(&self, device: Device) -> CoreResult<Device>;

    /// Fetch a device by id, scoped to its owner.
    async fn get(&self, user_id: &str, device_id: i64) -> CoreResult<Option<Device>>;

    /// Look a device up by its provider serial (unique system-wide).
    async fn find_by_serial(&self, serial: &str) -> CoreResult<Option<Device>>;

    /// All devices owned by a user, newest first.
    async fn list(&self, user_id: &str) -> CoreResult<Vec<Device>>;

    /// Overwrite a device row (cached state, status, editable fields).
    async fn update(&self, device: &Device) -> CoreResult<()>;

    /// Delete a device; returns false when it did not exist.
    async fn delete(&self, user_id: &str, device_id: i64) -> CoreResult<bool>;
}

/// Append-only fault-detection history.
#[async_trait]
pub trait FaultStore: Send + Sync {
    /// Append a record and return it with its assigned id.
    async fn append(&self, record: FaultRecord) -> CoreResult<FaultRecord>;

    /// Records for a device ascending by timestamp, optionally restricted
    /// to one calendar day, capped at `limit` rows.
    async fn for_day(
        &self,
        user_id: &str,
        device_id: i64,
        date: Option<NaiveDate>,
        limit: usize,
    ) -> CoreResult<Vec<FaultRecord>>;

    /// Most recent record for a device, if any.
    async fn latest(&self, user_id: &str, device_id: i64) -> CoreResult<Option<FaultRecord>>;
}
